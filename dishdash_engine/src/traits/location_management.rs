use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::LocationRecord;

#[derive(Debug, Clone, Error)]
pub enum LocationError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid location: {0}")]
    Validation(String),
    #[error("{0} has never reported a location")]
    NotFound(String),
}

impl From<sqlx::Error> for LocationError {
    fn from(e: sqlx::Error) -> Self {
        LocationError::DatabaseError(e.to_string())
    }
}

/// A last-value-wins projection of courier positions. There is no history.
#[allow(async_fn_in_trait)]
pub trait LocationManagement {
    async fn upsert_location(
        &self,
        agent_id: &str,
        latitude: f64,
        longitude: f64,
        at: DateTime<Utc>,
    ) -> Result<LocationRecord, LocationError>;

    async fn fetch_location(&self, agent_id: &str) -> Result<Option<LocationRecord>, LocationError>;
}
