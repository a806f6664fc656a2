use super::{BackendError, Region, Result, User, DEFAULT_LANGUAGE};
use chrono::{SecondsFormat, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const REGIONS: [&str; 3] = ["us-east-1", "eu-west-1", "ap-southeast-2"];

/// Handle to the backend store. Clones share the same users
#[derive(Clone, Default)]
pub struct Client {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_user(&self, user: &User) -> Result<()> {
        tracing::debug!("Creating user {}", user.email);

        if user.email.is_empty() {
            return Err(BackendError::EmptyEmail);
        }

        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Err(BackendError::UserExists(user.email.clone()));
        }

        let mut stored = user.clone();
        stored.date_joined = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        if stored.language.is_empty() {
            stored.language = DEFAULT_LANGUAGE.to_string();
        }
        users.insert(stored.email.clone(), stored);

        Ok(())
    }

    /// `Ok(None)` when no user has this email
    pub async fn read_user(&self, email: &str) -> Result<Option<User>> {
        tracing::debug!("Reading user {}", email);
        Ok(self.users.read().await.get(email).cloned())
    }

    /// Replaces name, age and language. `date_joined` is kept
    pub async fn update_user(&self, user: &User) -> Result<()> {
        tracing::debug!("Updating user {}", user.email);

        let mut users = self.users.write().await;
        let existing = users
            .get_mut(&user.email)
            .ok_or_else(|| BackendError::UserNotFound(user.email.clone()))?;

        existing.name = user.name.clone();
        existing.age = user.age;
        existing.language = if user.language.is_empty() {
            DEFAULT_LANGUAGE.to_string()
        } else {
            user.language.clone()
        };

        Ok(())
    }

    /// Deleting a missing user succeeds
    pub async fn delete_user(&self, email: &str) -> Result<()> {
        tracing::debug!("Deleting user {}", email);

        if self.users.write().await.remove(email).is_none() {
            tracing::warn!("User {} was already gone", email);
        }
        Ok(())
    }

    pub async fn read_regions(&self) -> Result<Vec<Region>> {
        Ok(REGIONS
            .iter()
            .map(|name| Region {
                name: name.to_string(),
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn ford() -> User {
        User::new("ford@prefect.co", "Ford Prefect", 200)
    }

    #[tokio::test]
    async fn create_fills_backend_fields() {
        let client = Client::new();
        client.create_user(&ford()).await.unwrap();

        let user = client.read_user("ford@prefect.co").await.unwrap().unwrap();
        assert_eq!(user.name, "Ford Prefect");
        assert_eq!(user.age, 200);
        assert_eq!(user.language, "en");
        assert!(chrono::DateTime::parse_from_rfc3339(&user.date_joined).is_ok());
    }

    #[tokio::test]
    async fn create_keeps_explicit_language() {
        let client = Client::new();
        let mut user = ford();
        user.language = "de".to_string();
        client.create_user(&user).await.unwrap();

        let stored = client.read_user("ford@prefect.co").await.unwrap().unwrap();
        assert_eq!(stored.language, "de");
    }

    #[tokio::test]
    async fn create_rejects_duplicate_and_empty_email() {
        let client = Client::new();
        client.create_user(&ford()).await.unwrap();

        assert_eq!(
            client.create_user(&ford()).await,
            Err(BackendError::UserExists("ford@prefect.co".to_string()))
        );
        assert_eq!(
            client.create_user(&User::new("", "Nobody", 1)).await,
            Err(BackendError::EmptyEmail)
        );
    }

    #[tokio::test]
    async fn read_missing_user_is_none() {
        let client = Client::new();
        assert_eq!(client.read_user("arthur@dent.co").await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_keeps_date_joined() {
        let client = Client::new();
        client.create_user(&ford()).await.unwrap();
        let created = client.read_user("ford@prefect.co").await.unwrap().unwrap();

        let mut changed = ford();
        changed.name = "Ford Prefect II".to_string();
        changed.age = 201;
        client.update_user(&changed).await.unwrap();

        let updated = client.read_user("ford@prefect.co").await.unwrap().unwrap();
        assert_eq!(updated.name, "Ford Prefect II");
        assert_eq!(updated.age, 201);
        assert_eq!(updated.language, "en");
        assert_eq!(updated.date_joined, created.date_joined);
    }

    #[tokio::test]
    async fn update_missing_user_fails() {
        let client = Client::new();
        let err = assert_err!(client.update_user(&ford()).await);
        assert_eq!(err, BackendError::UserNotFound("ford@prefect.co".to_string()));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let client = Client::new();
        client.create_user(&ford()).await.unwrap();

        assert_ok!(client.delete_user("ford@prefect.co").await);
        assert_ok!(client.delete_user("ford@prefect.co").await);
        assert_eq!(client.read_user("ford@prefect.co").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clones_share_the_store() {
        let client = Client::new();
        let other = client.clone();
        client.create_user(&ford()).await.unwrap();

        assert!(other.read_user("ford@prefect.co").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn regions_are_fixed() {
        let names: Vec<String> = Client::new()
            .read_regions()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["us-east-1", "eu-west-1", "ap-southeast-2"]);
    }
}
