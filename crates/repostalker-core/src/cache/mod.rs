//! Local caching module for offline data access.
//!
//! `CacheStore` is the seam the sync interactor reads through and writes
//! back to. `CacheManager` implements it with JSON files in the cache
//! directory. Every row carries the time it was last written, which is what
//! the invalidation interval is checked against.
//!
//! Cached data types include:
//! - User profiles
//! - Follower/member records and the follower-of relation
//! - Avatar images

pub mod manager;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Member, UserProfile};

pub use manager::{CacheManager, CachedData};

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a profile by login that was written at or after `not_modified_before`.
    async fn get_user(
        &self,
        login: &str,
        not_modified_before: DateTime<Utc>,
    ) -> Result<Option<UserProfile>>;

    /// Insert or replace a profile. Returns the number of rows written.
    async fn put_user(&self, user: &UserProfile) -> Result<usize>;

    /// Insert or replace a member record. Returns the number of rows written.
    async fn put_member(&self, member: &Member) -> Result<usize>;

    /// Record that `member_id` follows `user_id`, refreshing `synced_at` if
    /// the pair already exists.
    async fn upsert_follower(
        &self,
        user_id: i64,
        member_id: i64,
        synced_at: DateTime<Utc>,
    ) -> Result<usize>;

    /// Members related to `user_id`, sorted ascending by lower-cased login.
    ///
    /// With `not_modified_before` set, only relations synchronized at or
    /// after it are returned. `login_filter` is a case-insensitive substring
    /// match. An empty result means nothing usable is cached.
    async fn get_followers(
        &self,
        user_id: i64,
        not_modified_before: Option<DateTime<Utc>>,
        login_filter: Option<&str>,
    ) -> Result<Vec<Member>>;

    /// Store the avatar for `user_id`, replacing any previous image.
    async fn put_avatar(&self, user_id: i64, image: &[u8]) -> Result<usize>;

    async fn get_avatar(&self, user_id: i64) -> Result<Option<Vec<u8>>>;
}
