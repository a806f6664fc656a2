use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("user with email {0:?} already exists")]
    UserExists(String),

    #[error("user email must not be empty")]
    EmptyEmail,

    #[error("user with email {0:?} does not exist")]
    UserNotFound(String),
}
