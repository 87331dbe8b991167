//! Application configuration
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database connection URL
    pub database_url: String,
    /// Upload directory for resumes and generated documents
    pub upload_dir: String,
    /// Directory containing the tera document templates
    pub template_dir: String,
    /// Maximum upload file size in bytes
    pub max_upload_size: usize,
    /// CORS allowed origins
    pub cors_origins: Vec<String>,
    /// Environment (development/production)
    pub environment: Environment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        // DATABASE_URL, or built from individual components
        let database_url = env::var("DATABASE_URL")
            .or_else(|_| {
                let host = env::var("DATABASE_HOST").map_err(|_| env::VarError::NotPresent)?;
                let port = env::var("DATABASE_PORT").unwrap_or_else(|_| "5432".to_string());
                let user = env::var("DATABASE_USER").map_err(|_| env::VarError::NotPresent)?;
                let password =
                    env::var("DATABASE_PASSWORD").map_err(|_| env::VarError::NotPresent)?;
                let db = env::var("DATABASE_DB").map_err(|_| env::VarError::NotPresent)?;
                Ok(format!(
                    "postgres://{}:{}@{}:{}/{}",
                    user, password, host, port, db
                ))
            })
            .map_err(|_: env::VarError| {
                ConfigError::Missing(
                    "DATABASE_URL or DATABASE_HOST + DATABASE_USER + DATABASE_PASSWORD + DATABASE_DB is required".to_string(),
                )
            })?;

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            database_url,
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "/app/uploads".to_string()),
            template_dir: env::var("TEMPLATE_DIR").unwrap_or_else(|_| "./templates".to_string()),
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10 * 1024 * 1024), // 10MB default
            cors_origins: env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|o| o.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["http://localhost:8080".to_string()]),
            environment,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, thiserror::Error)]
#[allow(dead_code)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
