//! User profile lookup.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use quickcart_core::UserId;

use crate::db::{RepositoryError, UserRepository};
use crate::models::User;

/// Errors returned by [`UserService`].
#[derive(Debug, Error)]
pub enum UserError {
    /// No caller identity on the request.
    #[error("Unauthorized - No user ID found")]
    Unauthenticated,

    /// The caller has no mirrored user record yet.
    #[error("User not found with ID: {id}. Database has {total} users.")]
    NotFound { id: UserId, total: u64 },

    /// A store operation failed.
    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

/// Reads the caller's own user record.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
}

impl UserService {
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Fetch the caller's profile.
    ///
    /// # Errors
    ///
    /// Returns `UserError::Unauthenticated` without a caller,
    /// `UserError::NotFound` if the user has not been synced, or
    /// `UserError::Storage` if the store fails.
    #[instrument(skip(self))]
    pub async fn profile(&self, caller: Option<&UserId>) -> Result<User, UserError> {
        let id = caller.ok_or(UserError::Unauthenticated)?;

        match self.users.get_by_id(id).await? {
            Some(user) => Ok(user),
            None => Err(UserError::NotFound {
                id: id.clone(),
                total: self.users.count().await?,
            }),
        }
    }
}
