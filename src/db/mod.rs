//! Database access: connection pool and embedded migrations

mod pool;

pub use pool::{create_pool, run_migrations};
