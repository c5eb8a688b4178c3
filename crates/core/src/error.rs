use crate::PanelId;

/// Result alias that carries the custom [`FlameCanvasError`] type.
pub type Result<T> = std::result::Result<T, FlameCanvasError>;

/// Common error type for the core crate.
///
/// Rendering, clustering and layout never fail; they clamp. Errors only surface
/// at ingestion boundaries such as settings parsing and tree validation.
#[derive(Debug, thiserror::Error)]
pub enum FlameCanvasError {
    /// Free-form message surfaced to the caller.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Settings or tree data that failed to (de)serialize.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// A source node that cannot be rendered.
    #[error("node `{name}` is invalid: {reason}")]
    InvalidNode { name: String, reason: &'static str },
    /// A panel id that does not belong to the engine.
    #[error("unknown panel {0}")]
    UnknownPanel(PanelId),
}

impl FlameCanvasError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for FlameCanvasError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for FlameCanvasError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
