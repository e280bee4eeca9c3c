use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid execution record: {0}")]
    InvalidRecord(String),

    #[error("Invalid job id: {0}")]
    InvalidJobId(String),
}

pub type Result<T> = std::result::Result<T, Error>;
