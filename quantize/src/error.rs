use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Configuration errors. Pattern declines are never errors.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Unknown inference type name.
    #[snafu(display("{variable}: unknown inference type {value:?} (expected qint8, quint8, qint16 or float32)"))]
    InvalidInferenceType { variable: String, value: String, source: strum::ParseError },

    /// Boolean flag with a value that is neither truthy nor falsy.
    #[snafu(display("{variable}: expected a boolean flag, got {value:?}"))]
    InvalidFlag { variable: String, value: String },

    /// Numeric setting that does not parse as a positive integer.
    #[snafu(display("{variable}: expected a positive integer, got {value:?}"))]
    InvalidCount { variable: String, value: String },
}
