/// Error types for PlantBuddy
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Access to an image or other local resource was refused by the OS
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Any failed outbound HTTP call, including non-2xx responses
    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// The identification call failed in transport or answered non-2xx
    #[error("Identification request failed: {0}")]
    Identification(reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The local key-value store could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// Missing session or credentials rejected by the auth service
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode or decode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl AppError {
    /// Message shown to the user. Upstream detail stays in the log.
    pub fn notice(&self) -> String {
        match self {
            AppError::PermissionDenied(what) => format!("Permiso requerido: {}", what),
            AppError::Upstream(_) => "No se pudo completar la solicitud.".to_string(),
            AppError::Identification(_) => "No se pudo analizar la imagen.".to_string(),
            AppError::Auth(msg) => format!("Error de autenticación: {}", msg),
            other => format!("Error: {}", other),
        }
    }
}

/// Type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;
