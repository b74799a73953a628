//! Identity-provider user synchronization.
//!
//! Mirrors the identity provider's user lifecycle (`created`, `updated`,
//! `deleted`) into the `users` collection. Every operation is idempotent so
//! the bus can redeliver freely. A payload without a subject id can never
//! succeed, so it is reported as [`SyncOutcome::Skipped`] instead of an error
//! that would be redelivered forever.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use quickcart_core::{Email, EmailError, UserId};

use crate::db::{RepositoryError, UserRepository};
use crate::events::payloads::IdentityUserPayload;
use crate::models::{CartItems, User, UserPatch};

/// Name stored when the identity provider has neither a first nor last name.
pub const ANONYMOUS_NAME: &str = "Anonymous";

/// How strictly incoming user records are validated on creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Missing email or image are stored as empty strings.
    #[default]
    Lenient,
    /// Missing email or image fail the event, and the email must parse.
    Strict,
}

impl std::str::FromStr for SyncPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown user sync policy: {other}")),
        }
    }
}

/// Why an event was skipped without touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The payload carried no subject id.
    MissingId,
}

/// Result of a successful sync operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The store was changed.
    Applied,
    /// The store already reflected the event (redelivery).
    AlreadyApplied,
    /// The event was ignored.
    Skipped(SkipReason),
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => f.write_str("applied"),
            Self::AlreadyApplied => f.write_str("already_applied"),
            Self::Skipped(SkipReason::MissingId) => f.write_str("skipped_missing_id"),
        }
    }
}

/// Errors that make the bus redeliver a sync event.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A field required by the strict policy is absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The email address is malformed (strict policy).
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// The user to update does not exist yet.
    #[error("user not found: {0}")]
    NotFound(UserId),

    /// A store operation failed.
    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

/// Applies identity-provider user events to the store.
#[derive(Clone)]
pub struct UserSync {
    users: Arc<dyn UserRepository>,
    policy: SyncPolicy,
}

impl UserSync {
    /// Create a sync service over the users collection.
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>, policy: SyncPolicy) -> Self {
        Self { users, policy }
    }

    /// Handle `identity/user.created`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::MissingField` or `SyncError::InvalidEmail` under the
    /// strict policy, or `SyncError::Storage` if the store fails.
    #[instrument(skip_all, fields(user_id = payload.subject()))]
    pub async fn on_created(
        &self,
        payload: &IdentityUserPayload,
    ) -> Result<SyncOutcome, SyncError> {
        let Some(id) = payload.subject() else {
            warn!("Ignoring user.created without id");
            return Ok(SyncOutcome::Skipped(SkipReason::MissingId));
        };
        let id = UserId::new(id);

        let user = self.build_user(id.clone(), payload)?;

        if self.users.get_by_id(&id).await?.is_some() {
            debug!("User already exists");
            return Ok(SyncOutcome::AlreadyApplied);
        }

        match self.users.create(&user).await {
            Ok(()) => Ok(SyncOutcome::Applied),
            // A concurrent delivery created it between the read and the insert.
            Err(RepositoryError::Conflict(_)) => Ok(SyncOutcome::AlreadyApplied),
            Err(e) => Err(e.into()),
        }
    }

    /// Handle `identity/user.updated`.
    ///
    /// Only non-empty payload fields are written.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotFound` if the user does not exist, or
    /// `SyncError::Storage` if the store fails.
    #[instrument(skip_all, fields(user_id = payload.subject()))]
    pub async fn on_updated(
        &self,
        payload: &IdentityUserPayload,
    ) -> Result<SyncOutcome, SyncError> {
        let Some(id) = payload.subject() else {
            warn!("Ignoring user.updated without id");
            return Ok(SyncOutcome::Skipped(SkipReason::MissingId));
        };
        let id = UserId::new(id);

        let patch = UserPatch {
            email: non_empty(payload.primary_email()),
            name: display_name(payload.first_name.as_deref(), payload.last_name.as_deref()),
            image_url: non_empty(payload.image_url.as_deref()),
        };

        if patch.is_empty() {
            // Still surface a missing record so the create can catch up.
            return match self.users.get_by_id(&id).await? {
                Some(_) => Ok(SyncOutcome::AlreadyApplied),
                None => Err(SyncError::NotFound(id)),
            };
        }

        match self.users.update(&id, &patch).await? {
            Some(_) => Ok(SyncOutcome::Applied),
            None => Err(SyncError::NotFound(id)),
        }
    }

    /// Handle `identity/user.deleted`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Storage` if the store fails.
    #[instrument(skip_all, fields(user_id = payload.subject()))]
    pub async fn on_deleted(
        &self,
        payload: &IdentityUserPayload,
    ) -> Result<SyncOutcome, SyncError> {
        let Some(id) = payload.subject() else {
            warn!("Ignoring user.deleted without id");
            return Ok(SyncOutcome::Skipped(SkipReason::MissingId));
        };

        if self.users.delete(&UserId::new(id)).await? {
            Ok(SyncOutcome::Applied)
        } else {
            Ok(SyncOutcome::AlreadyApplied)
        }
    }

    fn build_user(&self, id: UserId, payload: &IdentityUserPayload) -> Result<User, SyncError> {
        let email = non_empty(payload.primary_email());
        let image_url = non_empty(payload.image_url.as_deref());

        let (email, image_url) = match self.policy {
            SyncPolicy::Lenient => (email.unwrap_or_default(), image_url.unwrap_or_default()),
            SyncPolicy::Strict => {
                let email = email.ok_or(SyncError::MissingField("email_addresses"))?;
                let image_url = image_url.ok_or(SyncError::MissingField("image_url"))?;
                (Email::parse(&email)?.into_inner(), image_url)
            }
        };

        let name = display_name(payload.first_name.as_deref(), payload.last_name.as_deref())
            .unwrap_or_else(|| ANONYMOUS_NAME.to_owned());

        Ok(User {
            id,
            email,
            name,
            image_url,
            cart_items: CartItems::new(),
        })
    }
}

/// Join first and last name, ignoring blank parts.
///
/// Returns `None` when both parts are blank or absent.
#[must_use]
pub fn display_name(first: Option<&str>, last: Option<&str>) -> Option<String> {
    let parts: Vec<&str> = [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::db::MemoryStore;

    fn sync(policy: SyncPolicy) -> (UserSync, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (UserSync::new(store.clone(), policy), store)
    }

    fn payload(value: serde_json::Value) -> IdentityUserPayload {
        IdentityUserPayload::from_value(&value).unwrap()
    }

    fn ada() -> IdentityUserPayload {
        payload(json!({
            "id": "user_ada",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email_addresses": [{ "email_address": "ada@example.com" }],
            "image_url": "https://img.example.com/ada.png"
        }))
    }

    async fn stored(store: &MemoryStore, id: &str) -> Option<User> {
        UserRepository::get_by_id(store, &UserId::new(id)).await.unwrap()
    }

    /// Misses on read, then loses the insert to a concurrent writer.
    struct RacingUsers;

    #[async_trait]
    impl UserRepository for RacingUsers {
        async fn get_by_id(&self, _id: &UserId) -> Result<Option<User>, RepositoryError> {
            Ok(None)
        }

        async fn create(&self, _user: &User) -> Result<(), RepositoryError> {
            Err(RepositoryError::Conflict("user already exists".to_owned()))
        }

        async fn update(
            &self,
            _id: &UserId,
            _patch: &UserPatch,
        ) -> Result<Option<User>, RepositoryError> {
            Ok(None)
        }

        async fn set_cart_items(
            &self,
            _id: &UserId,
            _cart: &CartItems,
        ) -> Result<bool, RepositoryError> {
            Ok(false)
        }

        async fn delete(&self, _id: &UserId) -> Result<bool, RepositoryError> {
            Ok(false)
        }

        async fn count(&self) -> Result<u64, RepositoryError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_created_losing_insert_race_is_already_applied() {
        let sync = UserSync::new(Arc::new(RacingUsers), SyncPolicy::Lenient);

        let outcome = sync.on_created(&ada()).await.unwrap();

        assert_eq!(outcome, SyncOutcome::AlreadyApplied);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Some("Ada"), Some("Lovelace")).unwrap(), "Ada Lovelace");
        assert_eq!(display_name(Some(" Ada "), None).unwrap(), "Ada");
        assert_eq!(display_name(None, Some("Lovelace")).unwrap(), "Lovelace");
        assert_eq!(display_name(Some(""), Some("  ")), None);
        assert_eq!(display_name(None, None), None);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("strict".parse::<SyncPolicy>().unwrap(), SyncPolicy::Strict);
        assert_eq!("Lenient".parse::<SyncPolicy>().unwrap(), SyncPolicy::Lenient);
        assert!("loose".parse::<SyncPolicy>().is_err());
    }

    #[tokio::test]
    async fn test_created_builds_user() {
        let (sync, store) = sync(SyncPolicy::Lenient);

        let outcome = sync.on_created(&ada()).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Applied);
        let user = stored(&store, "user_ada").await.unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.name, "Ada Lovelace");
        assert_eq!(user.image_url, "https://img.example.com/ada.png");
        assert!(user.cart_items.is_empty());
    }

    #[tokio::test]
    async fn test_created_twice_stores_one_user() {
        let (sync, store) = sync(SyncPolicy::Lenient);

        assert_eq!(sync.on_created(&ada()).await.unwrap(), SyncOutcome::Applied);
        assert_eq!(
            sync.on_created(&ada()).await.unwrap(),
            SyncOutcome::AlreadyApplied
        );
        assert_eq!(UserRepository::count(store.as_ref()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_created_lenient_defaults() {
        let (sync, store) = sync(SyncPolicy::Lenient);

        sync.on_created(&payload(json!({ "id": "user_bare" })))
            .await
            .unwrap();

        let user = stored(&store, "user_bare").await.unwrap();
        assert_eq!(user.email, "");
        assert_eq!(user.image_url, "");
        assert_eq!(user.name, ANONYMOUS_NAME);
    }

    #[tokio::test]
    async fn test_created_strict_requires_email_and_image() {
        let (sync, store) = sync(SyncPolicy::Strict);

        let err = sync
            .on_created(&payload(json!({ "id": "user_bare", "image_url": "x" })))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::MissingField("email_addresses")));

        let err = sync
            .on_created(&payload(json!({
                "id": "user_bare",
                "email_addresses": [{ "email_address": "bare@example.com" }]
            })))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::MissingField("image_url")));

        let err = sync
            .on_created(&payload(json!({
                "id": "user_bare",
                "email_addresses": [{ "email_address": "not-an-email" }],
                "image_url": "x"
            })))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidEmail(_)));

        assert!(stored(&store, "user_bare").await.is_none());
        assert_eq!(sync.on_created(&ada()).await.unwrap(), SyncOutcome::Applied);
    }

    #[tokio::test]
    async fn test_missing_id_is_skipped() {
        let (sync, store) = sync(SyncPolicy::Strict);
        let empty = IdentityUserPayload::default();
        let skipped = SyncOutcome::Skipped(SkipReason::MissingId);

        assert_eq!(sync.on_created(&empty).await.unwrap(), skipped);
        assert_eq!(sync.on_updated(&empty).await.unwrap(), skipped);
        assert_eq!(sync.on_deleted(&empty).await.unwrap(), skipped);
        assert_eq!(UserRepository::count(store.as_ref()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_updated_image_only_keeps_other_fields() {
        let (sync, store) = sync(SyncPolicy::Lenient);
        sync.on_created(&ada()).await.unwrap();

        let outcome = sync
            .on_updated(&payload(json!({
                "id": "user_ada",
                "image_url": "https://img.example.com/new.png"
            })))
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::Applied);
        let user = stored(&store, "user_ada").await.unwrap();
        assert_eq!(user.image_url, "https://img.example.com/new.png");
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_updated_ignores_empty_fields() {
        let (sync, store) = sync(SyncPolicy::Lenient);
        sync.on_created(&ada()).await.unwrap();

        sync.on_updated(&payload(json!({
            "id": "user_ada",
            "first_name": "Augusta",
            "last_name": "",
            "email_addresses": [],
            "image_url": ""
        })))
        .await
        .unwrap();

        let user = stored(&store, "user_ada").await.unwrap();
        assert_eq!(user.name, "Augusta");
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.image_url, "https://img.example.com/ada.png");
    }

    #[tokio::test]
    async fn test_updated_missing_user_fails() {
        let (sync, _store) = sync(SyncPolicy::Lenient);

        let err = sync.on_updated(&ada()).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(id) if id.as_str() == "user_ada"));

        let err = sync
            .on_updated(&payload(json!({ "id": "user_ada" })))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_deleted_is_idempotent() {
        let (sync, store) = sync(SyncPolicy::Lenient);
        sync.on_created(&ada()).await.unwrap();
        let delete = payload(json!({ "id": "user_ada" }));

        assert_eq!(sync.on_deleted(&delete).await.unwrap(), SyncOutcome::Applied);
        assert_eq!(
            sync.on_deleted(&delete).await.unwrap(),
            SyncOutcome::AlreadyApplied
        );
        assert!(stored(&store, "user_ada").await.is_none());
    }
}
