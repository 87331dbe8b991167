//! InternHub Platform Backend
//!
//! REST API for an internship/course management platform.
//!
//! ## Features
//!
//! - **Student Portal**: Browse internships, request enrollment, submit
//!   tasks, manage resume, download generated documents
//! - **Admin Back-office**: Approve/reject enrollments, review completions,
//!   issue certificates, decide withdrawals, review submissions
//! - **Document Generation**: Lifecycle-gated letters and certificates
//!   rendered from templates

mod config;
mod db;
mod documents;
mod handlers;
mod lifecycle;
mod models;
mod notify;
mod validation;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use handlers::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "internhub=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Starting InternHub backend");
    tracing::info!("Environment: {:?}", config.environment);

    // Create database pool
    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    // Ensure storage directories exist
    let upload_dir = PathBuf::from(&config.upload_dir);
    let docs_dir = upload_dir.join("documents");
    fs::create_dir_all(&upload_dir).await?;
    fs::create_dir_all(&docs_dir).await?;
    tracing::info!("Upload directory: {:?}", upload_dir);

    // Load document templates
    let template_glob = format!("{}/**/*.html", config.template_dir.trim_end_matches('/'));
    let templates = Arc::new(tera::Tera::new(&template_glob)?);
    tracing::info!(
        "Loaded {} document templates from {}",
        templates.get_template_names().count(),
        config.template_dir
    );

    // Create application state
    let state = AppState {
        pool: pool.clone(),
        upload_dir,
        docs_dir,
        templates,
        max_upload_size: config.max_upload_size,
        is_production: config.is_production(),
    };

    // Build CORS layer
    let cors = if config.is_production() {
        CorsLayer::new()
            .allow_origin(
                config
                    .cors_origins
                    .iter()
                    .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
                    .collect::<Vec<_>>(),
            )
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::permissive()
    };

    // Student routes (any authenticated caller)
    let student_routes = Router::new()
        .route("/internships", get(handlers::list_internships))
        .route("/internships/:id/tasks", get(handlers::list_tasks))
        .route("/internships/:id/enroll", post(handlers::create_enrollment))
        .route(
            "/internships/:id/submissions",
            get(handlers::list_my_submissions),
        )
        .route("/enrollments", get(handlers::list_my_enrollments))
        .route("/enrollments/:id", get(handlers::get_enrollment))
        .route(
            "/enrollments/:id/request-completion",
            post(handlers::request_completion),
        )
        .route(
            "/enrollments/:id/request-withdrawal",
            post(handlers::request_withdrawal),
        )
        .route(
            "/enrollments/:id/documents/:doc_type",
            get(handlers::download_document),
        )
        .route("/tasks/:id/submissions", post(handlers::create_submission))
        .route("/profile", get(handlers::get_profile))
        .route("/profile/resume", put(handlers::set_resume_file))
        .route("/profile/resume", delete(handlers::delete_resume))
        .route("/profile/resume-url", put(handlers::set_resume_url))
        .route("/notifications", get(handlers::list_notifications))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            handlers::middleware::require_actor,
        ));

    // Admin routes
    let admin_routes = Router::new()
        .route("/enrollments", get(handlers::list_enrollments))
        .route(
            "/enrollments/:id/approve",
            post(handlers::approve_enrollment),
        )
        .route("/enrollments/:id/reject", post(handlers::reject_enrollment))
        .route(
            "/enrollments/:id/review-completion",
            post(handlers::review_completion),
        )
        .route(
            "/enrollments/:id/issue-certificate",
            post(handlers::issue_certificate),
        )
        .route(
            "/enrollments/:id/withdrawal/approve",
            post(handlers::approve_withdrawal),
        )
        .route(
            "/enrollments/:id/withdrawal/reject",
            post(handlers::reject_withdrawal),
        )
        .route("/submissions", get(handlers::list_pending_submissions))
        .route("/submissions/:id/review", post(handlers::review_submission))
        .route("/dashboard", get(handlers::get_dashboard_stats))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            handlers::middleware::require_admin,
        ));

    // Public routes
    let public_routes = Router::new().route(
        "/certificates/verify/:code",
        get(handlers::verify_certificate),
    );

    // Build main router; the public routes merge in without the auth layer
    let app = Router::new()
        .nest("/api", student_routes.merge(public_routes))
        .nest("/api/admin", admin_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            handlers::middleware::security_headers,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.max_upload_size))
        .layer(cors)
        .with_state(state);

    // Start server
    let addr = config.server_addr();
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
