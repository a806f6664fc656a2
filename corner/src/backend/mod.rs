//! In-memory backend behind the corner providers
//!
//! Stands in for a remote API: users keyed by email and a fixed list of
//! regions. Every provider in this crate talks to it through [`Client`].

mod client;
mod error;

pub use client::Client;
pub use error::BackendError;

pub type Result<T> = std::result::Result<T, BackendError>;

/// Language assigned to users created without one
pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct User {
    pub email: String,
    pub name: String,
    pub age: i64,
    /// Set by the backend on create, RFC 3339 UTC
    pub date_joined: String,
    pub language: String,
}

impl User {
    pub fn new(email: &str, name: &str, age: i64) -> Self {
        Self {
            email: email.to_string(),
            name: name.to_string(),
            age,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_leaves_backend_fields_empty() {
        let user = User::new("ford@prefect.co", "Ford Prefect", 200);

        assert_eq!(user.age, 200);
        assert!(user.date_joined.is_empty());
        assert!(user.language.is_empty());
    }
}
