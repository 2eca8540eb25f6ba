//! The interactor layer between presenters and data sources.
//!
//! Each presenter depends on a narrow trait (`MainInteractor`,
//! `CurrentInteractor`, `FollowerListInteractor`), all of which extend
//! `NavInteractor`. `SyncInteractor` is the single concrete implementation
//! and owns the cache-or-network decisions.

pub mod back_nav;
pub mod sync;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::models::{Member, UserProfile};
use crate::nav::NavError;

pub use back_nav::BackNavInterest;
pub use sync::SyncInteractor;

/// Sync failures. `UserNotStored` and `MemberNotStored` only end best-effort
/// persistence and are logged. `NoAvatar` is returned by avatar lookups.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("User {0} was not stored; skipping avatar sync")]
    UserNotStored(i64),

    #[error("Member {0} was not stored; skipping avatar and relation sync")]
    MemberNotStored(i64),

    #[error("No avatar image cached for {0}")]
    NoAvatar(i64),
}

#[async_trait]
pub trait NavInteractor: Send + Sync {
    /// Pop the navigator and return the popped logical id.
    async fn request_back_nav(&self) -> Result<String, NavError>;

    /// Push `id` and return an interest that fires when exactly that entry
    /// is popped.
    async fn push_and_register_back_nav_interest(
        &self,
        id: &str,
    ) -> Result<BackNavInterest, NavError>;

    /// Interest that fires on the first pop matching `id`: exact string
    /// equality when `exact_match`, otherwise any entry ending in `"|{id}"`.
    fn register_back_nav_interest(&self, id: &str, exact_match: bool) -> BackNavInterest;

    /// The logical id on top of the navigator.
    async fn fetch_last_user_requested(&self) -> Result<String, NavError>;
}

#[async_trait]
pub trait AvatarInteractor: Send + Sync {
    async fn fetch_avatar_image(&self, user_id: i64) -> Result<Vec<u8>>;
}

#[async_trait]
pub trait MainInteractor: NavInteractor {
    async fn fetch_cache_invalidation_interval(&self, default_ms: i64) -> Result<i64>;
    async fn store_cache_invalidation_interval(&self, interval_ms: i64) -> Result<()>;
}

#[async_trait]
pub trait CurrentInteractor: NavInteractor + AvatarInteractor {
    async fn fetch_user(&self, username: &str) -> Result<UserProfile>;

    /// Usernames selected anywhere in the app from now on.
    fn user_selected(&self) -> broadcast::Receiver<String>;
}

#[async_trait]
pub trait FollowerListInteractor: NavInteractor + AvatarInteractor {
    /// Broadcast that `username` was selected.
    fn store_user_selected_action(&self, username: &str);

    /// Followers (or org members) of `username`, sorted ascending by
    /// lower-cased login. Yields a single `Err` if nothing usable exists.
    fn fetch_followers_of(
        &self,
        username: &str,
        login_filter: Option<&str>,
    ) -> BoxStream<'static, Result<Member>>;

    /// The cached profile for `login` regardless of age.
    async fn fetch_cached_user(&self, login: &str) -> Result<Option<UserProfile>>;
}
