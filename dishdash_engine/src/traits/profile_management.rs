use thiserror::Error;

use crate::db_types::UserProfile;

#[derive(Debug, Clone, Error)]
pub enum ProfileError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid profile: {0}")]
    Validation(String),
    #[error("User {0} has no profile")]
    NotFound(String),
}

impl From<sqlx::Error> for ProfileError {
    fn from(e: sqlx::Error) -> Self {
        ProfileError::DatabaseError(e.to_string())
    }
}

/// The slice of the user service that orchestration depends on.
#[allow(async_fn_in_trait)]
pub trait ProfileManagement {
    async fn upsert_profile(&self, profile: UserProfile) -> Result<UserProfile, ProfileError>;

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<UserProfile>, ProfileError>;

    /// Appends an address to the user's list. The first address added is the default delivery address.
    async fn add_address(&self, user_id: &str, address: &str) -> Result<(), ProfileError>;

    /// In the order they were added
    async fn addresses_for_user(&self, user_id: &str) -> Result<Vec<String>, ProfileError>;

    /// The first courier, in registration order, who is marked available and is not on an active delivery.
    async fn first_available_courier(&self) -> Result<Option<String>, ProfileError>;
}
