use thiserror::Error;

/// Stable error taxonomy shared by every crate in the workspace.
///
/// Each variant corresponds to one of the error kinds in the core's
/// error-handling design: `invalid_config`, `source_open`, `decode`,
/// `quantize`, `encode`, `invalid_state`, `cancelled`, `timeout`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsciiFrameError {
    #[error("[{component}] invalid_config: {message}")]
    InvalidConfig { component: &'static str, message: String },

    #[error("[{component}] source_open: {message}")]
    SourceOpen { component: &'static str, message: String },

    #[error("[{component}] decode: {message}")]
    Decode { component: &'static str, message: String },

    #[error("[{component}] quantize: {message}")]
    Quantize { component: &'static str, message: String },

    #[error("[{component}] encode: {message}")]
    Encode { component: &'static str, message: String },

    #[error("[{component}] invalid_state: {message}")]
    InvalidState { component: &'static str, message: String },

    #[error("[{component}] cancelled: {message}")]
    Cancelled { component: &'static str, message: String },

    #[error("[{component}] timeout: {message}")]
    Timeout { component: &'static str, message: String },
}

impl AsciiFrameError {
    /// Stable short code for logging and monitoring, mirroring the
    /// `GifPipeError::code()`-style stable short code.
    pub fn kind(&self) -> &'static str {
        match self {
            AsciiFrameError::InvalidConfig { .. } => "invalid_config",
            AsciiFrameError::SourceOpen { .. } => "source_open",
            AsciiFrameError::Decode { .. } => "decode",
            AsciiFrameError::Quantize { .. } => "quantize",
            AsciiFrameError::Encode { .. } => "encode",
            AsciiFrameError::InvalidState { .. } => "invalid_state",
            AsciiFrameError::Cancelled { .. } => "cancelled",
            AsciiFrameError::Timeout { .. } => "timeout",
        }
    }

    pub fn component(&self) -> &'static str {
        match self {
            AsciiFrameError::InvalidConfig { component, .. }
            | AsciiFrameError::SourceOpen { component, .. }
            | AsciiFrameError::Decode { component, .. }
            | AsciiFrameError::Quantize { component, .. }
            | AsciiFrameError::Encode { component, .. }
            | AsciiFrameError::InvalidState { component, .. }
            | AsciiFrameError::Cancelled { component, .. }
            | AsciiFrameError::Timeout { component, .. } => component,
        }
    }

    pub fn invalid_config(component: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidConfig { component, message: message.into() }
    }

    pub fn source_open(component: &'static str, message: impl Into<String>) -> Self {
        Self::SourceOpen { component, message: message.into() }
    }

    pub fn decode(component: &'static str, message: impl Into<String>) -> Self {
        Self::Decode { component, message: message.into() }
    }

    pub fn quantize(component: &'static str, message: impl Into<String>) -> Self {
        Self::Quantize { component, message: message.into() }
    }

    pub fn encode(component: &'static str, message: impl Into<String>) -> Self {
        Self::Encode { component, message: message.into() }
    }

    pub fn invalid_state(component: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidState { component, message: message.into() }
    }

    pub fn cancelled(component: &'static str, message: impl Into<String>) -> Self {
        Self::Cancelled { component, message: message.into() }
    }

    pub fn timeout(component: &'static str, message: impl Into<String>) -> Self {
        Self::Timeout { component, message: message.into() }
    }
}
