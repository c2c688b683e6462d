use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid numeric value for '{field}': {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("recovery arrays have mismatched lengths: t={t}, v={v}, s={s}")]
    MismatchedRecoveryArrays { t: usize, v: usize, s: usize },
}

pub type Result<T> = std::result::Result<T, PayloadError>;
