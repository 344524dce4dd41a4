//! Errors raised by the fleetgrid state store.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot open state store: {0}")]
    Open(String),

    #[error("state store transaction failed: {0}")]
    Transaction(String),

    #[error("cannot open catalog table: {0}")]
    Table(String),

    #[error("reading record failed: {0}")]
    Read(String),

    #[error("writing record failed: {0}")]
    Write(String),

    #[error("encoding record failed: {0}")]
    Serialize(String),

    #[error("stored record is corrupt: {0}")]
    Deserialize(String),

    /// A read-modify-write hit a key with no record, e.g. an unknown
    /// context id in `plans` or a group without a lifecycle log.
    #[error("no record '{key}' in table '{table}'")]
    NotFound { table: String, key: String },
}
