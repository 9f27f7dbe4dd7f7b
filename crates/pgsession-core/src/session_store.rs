//! Session store trait
//!
//! The `SessionStore` trait is the capability set a session-management host
//! needs from a storage backend. Backends only persist; ID generation, cookie
//! handling and renewal policy stay with the host.

use async_trait::async_trait;

use crate::{Result, session::Session};

/// Session store trait
///
/// Implementations:
/// - `PostgresSessionStore`: PostgreSQL table with a background expiration sweep
///
/// Every method maps to a single statement, so implementations may be shared
/// across tasks without extra locking. Dropping a returned future cancels the
/// in-flight operation.
///
/// # Example
/// ```no_run
/// # use pgsession_core::{Session, SessionStore};
/// # async fn example(store: &dyn SessionStore, session: Session) -> pgsession_core::Result<()> {
/// store.create(&session).await?;
///
/// if let Some(found) = store.fetch_by_id(&session.id).await? {
///     // Sign the user out everywhere except here
///     store
///         .delete_by_user_key(&found.user_key, &[found.id.clone()])
///         .await?;
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session
    ///
    /// # Errors
    /// - `Error::DuplicateId` if a session with the same ID already exists
    /// - `Error::Database` for any other storage failure
    async fn create(&self, session: &Session) -> Result<()>;

    /// Get the active session with the given ID
    ///
    /// Expired sessions that have not been swept yet are treated as absent.
    /// A missing session is `Ok(None)`, not an error.
    ///
    /// # Errors
    /// - `Error::Database` for storage failures
    async fn fetch_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// Get every session owned by a user, active or not
    ///
    /// # Errors
    /// - `Error::Database` for storage failures
    async fn fetch_by_user_key(&self, user_key: &str) -> Result<Vec<Session>>;

    /// Delete a session; deleting an unknown ID succeeds
    ///
    /// # Errors
    /// - `Error::Database` for storage failures
    async fn delete_by_id(&self, id: &str) -> Result<()>;

    /// Delete every session owned by a user except those listed in `except`
    ///
    /// # Errors
    /// - `Error::Database` for storage failures
    async fn delete_by_user_key(&self, user_key: &str, except: &[String]) -> Result<()>;
}
