/// Result alias that carries the custom [`MeterError`] type.
pub type Result<T> = std::result::Result<T, MeterError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum MeterError {
    /// The display range is empty, inverted or not finite.
    #[error("invalid display range: max_db ({max_db}) must be greater than min_db ({min_db})")]
    InvalidRange { min_db: f32, max_db: f32 },
    /// Segmented meters need at least one cell.
    #[error("segment count must be at least 1")]
    InvalidSegments,
    /// A time constant or decay rate is negative or not finite.
    #[error("invalid {field}: {value} (expected a finite, non-negative number)")]
    InvalidTiming { field: &'static str, value: f32 },
    /// Scale marks are not finite or not strictly ascending.
    #[error("invalid scale marks: {0}")]
    InvalidScale(String),
    /// A gate threshold is zero, negative or not finite.
    #[error("invalid {field}: {value} (expected a finite, positive number)")]
    InvalidThreshold { field: &'static str, value: f32 },
    #[error("unknown preset `{0}` (expected one of: peak, ppm, vu)")]
    UnknownPreset(String),
    /// Raised by a pull source. The source adapter never lets it escape a frame.
    #[error("level source failed: {0}")]
    Source(String),
    /// The frame clock was torn down and cannot be restarted.
    #[error("frame clock has been stopped")]
    ClockStopped,
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl MeterError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Creates a pull-source failure.
    pub fn pull_failed<T: Into<String>>(msg: T) -> Self {
        Self::Source(msg.into())
    }
}

impl From<&str> for MeterError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MeterError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
