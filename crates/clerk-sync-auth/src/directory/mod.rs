//! Provider directory access
//!
//! The session engine needs two things from the provider's REST API: the
//! published signing keys and individual user records. [`RemoteDirectory`] is
//! the seam; [`HttpDirectoryClient`] is the production implementation.

mod http_client;

pub use http_client::{DEFAULT_API_BASE_URL, DirectoryConfig, HttpDirectoryClient};

use async_trait::async_trait;
use clerk_sync_types::{DirectoryError, KeySet, UserRecord};

/// Read access to the provider's directory
#[async_trait]
pub trait RemoteDirectory: Send + Sync + std::fmt::Debug {
    /// Fetch the provider's current public signing keys
    async fn fetch_key_set(&self) -> Result<KeySet, DirectoryError>;

    /// Fetch a single user record by id
    async fn fetch_user(&self, user_id: &str) -> Result<UserRecord, DirectoryError>;
}
