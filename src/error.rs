use thiserror::Error;

/// Everything a user action can fail with.
///
/// No variant is retried automatically. The terminal front end maps each
/// one to a toast and the action is simply abandoned.
#[derive(Debug, Error)]
pub enum AppError {
    /// Transport failure: DNS, TLS, timeout, non-JSON body.
    #[error("Error de conexión")]
    Network(#[from] reqwest::Error),

    /// The API answered `success: false`. Carries `mensaje` when present.
    #[error("{}", .0.as_deref().unwrap_or("La operación fue rechazada"))]
    Rejected(Option<String>),

    /// Client-side check failed before any request was issued.
    #[error("{0}")]
    Validation(String),

    /// The current session is not allowed to perform the action.
    #[error("{0}")]
    Forbidden(String),

    /// The action needs a session of a different kind.
    #[error("Inicia sesión para continuar")]
    NoSession,

    #[error("Error de almacenamiento: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Datos inválidos: {0}")]
    Decode(#[from] serde_json::Error),
}

impl AppError {
    /// Message to show the user, using `fallback` when the server rejected
    /// the action without explaining why.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            AppError::Rejected(None) => fallback.to_string(),
            other => other.to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No se pudo leer la configuración: {0}")]
    Read(#[from] std::io::Error),
    #[error("Configuración inválida: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("No se pudo guardar la configuración: {0}")]
    Write(#[from] toml::ser::Error),
    #[error("URL inválida en {0}: {1}")]
    InvalidUrl(&'static str, String),
}
