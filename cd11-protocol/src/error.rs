#[derive(Debug, thiserror::Error)]
pub enum Cd11Error {
    #[error("frame too short: expected {expected}, actual {actual}")]
    FrameTooShort { expected: usize, actual: usize },

    #[error("unknown frame type code: {0}")]
    UnknownFrameType(i32),

    #[error("invalid trailer offset {offset} (header is {header} bytes)")]
    InvalidTrailerOffset { offset: i32, header: usize },

    #[error("field {field} too long: {len} bytes exceeds width {width}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        width: usize,
    },

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("invalid compression format byte: {0}")]
    InvalidCompressionFormat(u8),

    #[error("invalid sensor type byte: {0}")]
    InvalidSensorType(u8),
}

pub type Result<T> = std::result::Result<T, Cd11Error>;
