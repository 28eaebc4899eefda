use crate::errors::AppError;
use crate::jwt::JwtConfig;

const DEFAULT_PORT: u16 = 8000;

/// Process configuration read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Shared secret new accounts must present. Registration is open when unset.
    pub registration_code: Option<String>,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let port = match std::env::var("APP_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|_| AppError::configuration("APP_PORT must be a valid port number"))?,
            Err(_) => DEFAULT_PORT,
        };

        let registration_code = std::env::var("REGISTRATION_CODE")
            .ok()
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty());

        Ok(Self {
            port,
            registration_code,
            jwt: JwtConfig::from_env()?,
        })
    }

    pub fn database_url() -> Result<String, AppError> {
        std::env::var("DATABASE_URL").map_err(|_| AppError::configuration("DATABASE_URL not set"))
    }
}
