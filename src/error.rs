use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid zone: {width}x{height}px is below the {min}px minimum")]
    InvalidZone { width: u32, height: u32, min: u32 },
    #[error("cannot start detection: {0}")]
    Precondition(String),
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
    #[error("failed to persist zones: {0}")]
    Persist(String),
    #[error("state lock poisoned")]
    StateLock,
}
