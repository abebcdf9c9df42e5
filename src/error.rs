use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum StealthError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid {field} {value:?}. Must be one of: {}", .allowed.join(", "))]
    Config {
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Window operation failed: {0}")]
    WindowOp(String),

    #[error("No window handle available")]
    NoWindow,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl StealthError {
    pub fn config(field: &str, value: impl Into<String>, allowed: &[&str]) -> Self {
        StealthError::Config {
            field: field.to_string(),
            value: value.into(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Taxonomy name reported across the IPC boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            StealthError::Auth(_) => "AuthError",
            StealthError::Config { .. } => "ConfigError",
            StealthError::Transport(_) => "TransportError",
            StealthError::WindowOp(_) | StealthError::NoWindow => "WindowOpError",
            StealthError::Io(_) | StealthError::Json(_) | StealthError::Image(_) => "IoError",
        }
    }
}

impl Serialize for StealthError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StealthError>;

/// `{success, error?}` envelope returned by window and config calls.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OpStatus {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl OpStatus {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            kind: None,
        }
    }
}

impl<T> From<Result<T>> for OpStatus {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(_) => OpStatus::ok(),
            Err(e) => OpStatus {
                success: false,
                error: Some(e.to_string()),
                kind: Some(e.kind().to_string()),
            },
        }
    }
}
