//! Cache-or-network synchronization for profiles, follower lists and avatars.
//!
//! Reads consult the cache first with a validity window taken from the
//! user's invalidation interval. On a miss the network is used and the
//! result written back. Write-backs are best-effort: their failures are
//! logged and never change what the caller receives.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::api::{ApiError, RemoteSource};
use crate::cache::CacheStore;
use crate::config::SettingsStore;
use crate::models::{Member, UserProfile};
use crate::nav::{strip_sequence, NavError, Navigator};
use crate::presenter::DEFAULT_INVALIDATION_INTERVAL_SECS;
use crate::utils::{cmp_ignore_case, contains_ignore_case};

use super::{
    AvatarInteractor, BackNavInterest, CurrentInteractor, FollowerListInteractor,
    MainInteractor, NavInteractor, SyncError,
};

// ============================================================================
// Constants
// ============================================================================

/// Invalidation interval used when settings cannot be read.
const DEFAULT_INVALIDATION_INTERVAL_MS: i64 = DEFAULT_INVALIDATION_INTERVAL_SECS * 1000;

/// Maximum members synchronized concurrently during a follower sync.
const MAX_CONCURRENT_MEMBER_SYNCS: usize = 8;

/// Selections buffered for slow subscribers.
const USER_SELECTED_CAPACITY: usize = 16;

/// The single interactor behind every screen.
/// Clone is cheap - every collaborator is shared.
#[derive(Clone)]
pub struct SyncInteractor {
    navigator: Navigator,
    settings: Arc<dyn SettingsStore>,
    store: Arc<dyn CacheStore>,
    remote: Arc<dyn RemoteSource>,
    user_selected: broadcast::Sender<String>,
}

impl SyncInteractor {
    pub fn new(
        navigator: Navigator,
        settings: Arc<dyn SettingsStore>,
        store: Arc<dyn CacheStore>,
        remote: Arc<dyn RemoteSource>,
    ) -> Self {
        let (user_selected, _) = broadcast::channel(USER_SELECTED_CAPACITY);
        Self {
            navigator,
            settings,
            store,
            remote,
            user_selected,
        }
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub async fn fetch_cache_invalidation_interval(&self, default_ms: i64) -> Result<i64> {
        self.settings.invalidation_interval_ms(default_ms).await
    }

    pub async fn store_cache_invalidation_interval(&self, interval_ms: i64) -> Result<()> {
        self.settings.set_invalidation_interval_ms(interval_ms).await
    }

    /// Rows written before the returned instant are stale. An interval
    /// reaching past the representable range keeps everything fresh.
    async fn validity_cutoff(&self) -> DateTime<Utc> {
        let interval_ms = match self
            .fetch_cache_invalidation_interval(DEFAULT_INVALIDATION_INTERVAL_MS)
            .await
        {
            Ok(ms) => ms,
            Err(e) => {
                warn!(error = %e, "Failed to read invalidation interval, using default");
                DEFAULT_INVALIDATION_INTERVAL_MS
            }
        };
        Duration::try_milliseconds(interval_ms)
            .and_then(|interval| Utc::now().checked_sub_signed(interval))
            .unwrap_or_else(|| {
                debug!(interval_ms, "Invalidation interval out of range, treating cache as fresh");
                DateTime::<Utc>::MIN_UTC
            })
    }

    // =========================================================================
    // User profiles
    // =========================================================================

    /// The profile for `username`, from cache if fresh, otherwise from the
    /// network. A network result is written back together with its avatar.
    pub async fn fetch_user(&self, username: &str) -> Result<UserProfile> {
        let cutoff = self.validity_cutoff().await;
        match self.store.get_user(username, cutoff).await {
            Ok(Some(user)) => {
                debug!(username, "User cache hit");
                return Ok(user);
            }
            Ok(None) => debug!(username, "User cache miss"),
            Err(e) => warn!(username, error = %e, "User cache lookup failed"),
        }

        let user = self
            .remote
            .user(username)
            .await
            .with_context(|| format!("Failed to fetch user {}", username))?;
        self.sync_user_with_avatar(&user).await;
        Ok(user)
    }

    pub async fn fetch_cached_user(&self, login: &str) -> Result<Option<UserProfile>> {
        self.store.get_user(login, DateTime::<Utc>::MIN_UTC).await
    }

    pub async fn fetch_avatar_image(&self, user_id: i64) -> Result<Vec<u8>> {
        self.store
            .get_avatar(user_id)
            .await?
            .ok_or_else(|| SyncError::NoAvatar(user_id).into())
    }

    async fn sync_user_with_avatar(&self, user: &UserProfile) {
        if let Err(e) = self.try_sync_user_with_avatar(user).await {
            warn!(login = %user.login, error = %e, "Best-effort user sync failed");
        }
    }

    async fn try_sync_user_with_avatar(&self, user: &UserProfile) -> Result<()> {
        if self.store.put_user(user).await? == 0 {
            return Err(SyncError::UserNotStored(user.id).into());
        }
        self.sync_avatar(user.id, &user.avatar_url).await
    }

    async fn sync_avatar(&self, user_id: i64, avatar_url: &str) -> Result<()> {
        let image = self
            .remote
            .download(avatar_url)
            .await
            .context("Failed to download avatar")?;
        self.store
            .put_avatar(user_id, &image)
            .await
            .context("Failed to store avatar")?;
        Ok(())
    }

    // =========================================================================
    // Followers
    // =========================================================================

    /// Followers (or org members) of `username`, sorted ascending by
    /// lower-cased login and emitted in that order.
    pub fn fetch_followers_of(
        &self,
        username: &str,
        login_filter: Option<&str>,
    ) -> BoxStream<'static, Result<Member>> {
        let this = self.clone();
        let username = username.to_string();
        let login_filter = login_filter.map(str::to_string);

        stream::once(async move {
            this.resolve_followers(&username, login_filter.as_deref())
                .await
        })
        .flat_map(|resolved| match resolved {
            Ok(members) => stream::iter(members.into_iter().map(Ok)).left_stream(),
            Err(e) => stream::iter(std::iter::once(Err(e))).right_stream(),
        })
        .boxed()
    }

    async fn resolve_followers(
        &self,
        username: &str,
        login_filter: Option<&str>,
    ) -> Result<Vec<Member>> {
        let user = self.fetch_user(username).await?;

        let cutoff = self.validity_cutoff().await;
        match self.store.get_followers(user.id, Some(cutoff), login_filter).await {
            Ok(members) if !members.is_empty() => {
                debug!(username, count = members.len(), "Follower cache hit");
                return Ok(members);
            }
            Ok(_) => debug!(username, "Follower cache miss"),
            Err(e) => warn!(username, error = %e, "Follower cache lookup failed"),
        }

        self.sync_followers(username, &user, login_filter).await
    }

    async fn sync_followers(
        &self,
        username: &str,
        user: &UserProfile,
        login_filter: Option<&str>,
    ) -> Result<Vec<Member>> {
        let synced_at = Utc::now();
        let listing = if user.is_organization() {
            self.remote.members_of_org(&user.login).await
        } else {
            self.remote.followers_of_user(username).await
        };

        let members = match listing {
            Ok(members) => members,
            Err(e) => return self.stale_followers(user, login_filter, e).await,
        };
        info!(username, count = members.len(), "Synchronizing followers");

        let user_id = user.id;
        let mut synced: Vec<Member> = stream::iter(members)
            .map(|member| {
                let this = self.clone();
                async move { this.sync_follower(user_id, member, synced_at).await }
            })
            .buffered(MAX_CONCURRENT_MEMBER_SYNCS)
            .collect()
            .await;

        if let Some(filter) = login_filter {
            synced.retain(|member| contains_ignore_case(&member.login, filter));
        }
        synced.sort_by(|a, b| cmp_ignore_case(&a.login, &b.login));
        Ok(synced)
    }

    /// Cached followers of any age, used when the network listing failed.
    async fn stale_followers(
        &self,
        user: &UserProfile,
        login_filter: Option<&str>,
        remote_error: anyhow::Error,
    ) -> Result<Vec<Member>> {
        let transient = remote_error
            .downcast_ref::<ApiError>()
            .map_or(false, ApiError::is_transient);
        warn!(
            login = %user.login,
            error = %remote_error,
            transient,
            "Follower listing failed, falling back to cached followers"
        );

        match self.store.get_followers(user.id, None, login_filter).await {
            Ok(members) if !members.is_empty() => Ok(members),
            Ok(_) => Err(remote_error.context(format!(
                "Unable to retrieve followers of {} and none are cached",
                user.login
            ))),
            Err(store_error) => {
                warn!(login = %user.login, error = %store_error, "Stale follower lookup failed");
                Err(remote_error.context(format!("Unable to retrieve followers of {}", user.login)))
            }
        }
    }

    /// Refresh everything known about one member. Always yields the member,
    /// whatever part of the refresh failed.
    async fn sync_follower(&self, user_id: i64, member: Member, synced_at: DateTime<Utc>) -> Member {
        if let Err(e) = self.try_sync_follower(user_id, &member, synced_at).await {
            warn!(login = %member.login, error = %e, "Best-effort follower sync failed");
        }
        member
    }

    async fn try_sync_follower(
        &self,
        user_id: i64,
        member: &Member,
        synced_at: DateTime<Utc>,
    ) -> Result<()> {
        self.fetch_user(&member.login).await?;
        if self.store.put_member(member).await? == 0 {
            return Err(SyncError::MemberNotStored(member.id).into());
        }

        if let Err(e) = self.sync_avatar(member.id, &member.avatar_url).await {
            debug!(login = %member.login, error = %e, "Member avatar not synchronized");
        }
        self.store
            .upsert_follower(user_id, member.id, synced_at)
            .await
            .context("Failed to store follower relation")?;
        Ok(())
    }

    // =========================================================================
    // Selection and navigation
    // =========================================================================

    pub fn store_user_selected_action(&self, username: &str) {
        // No current-user screen listening is fine
        let _ = self.user_selected.send(username.to_string());
    }

    pub fn user_selected(&self) -> broadcast::Receiver<String> {
        self.user_selected.subscribe()
    }

    pub async fn fetch_last_user_requested(&self) -> Result<String, NavError> {
        let top = self.navigator.peek().await?;
        Ok(strip_sequence(&top).to_string())
    }

    pub async fn request_back_nav(&self) -> Result<String, NavError> {
        let popped = self.navigator.pop().await?;
        Ok(strip_sequence(&popped).to_string())
    }

    pub async fn push_and_register_back_nav_interest(
        &self,
        id: &str,
    ) -> Result<BackNavInterest, NavError> {
        let back_events = self.navigator.back_events();
        let pushed = self.navigator.push(id).await?;
        Ok(BackNavInterest::new(pushed, true, back_events))
    }

    pub fn register_back_nav_interest(&self, id: &str, exact_match: bool) -> BackNavInterest {
        BackNavInterest::new(id, exact_match, self.navigator.back_events())
    }
}

// ============================================================================
// Presenter-facing traits
// ============================================================================

#[async_trait]
impl NavInteractor for SyncInteractor {
    async fn request_back_nav(&self) -> Result<String, NavError> {
        SyncInteractor::request_back_nav(self).await
    }

    async fn push_and_register_back_nav_interest(
        &self,
        id: &str,
    ) -> Result<BackNavInterest, NavError> {
        SyncInteractor::push_and_register_back_nav_interest(self, id).await
    }

    fn register_back_nav_interest(&self, id: &str, exact_match: bool) -> BackNavInterest {
        SyncInteractor::register_back_nav_interest(self, id, exact_match)
    }

    async fn fetch_last_user_requested(&self) -> Result<String, NavError> {
        SyncInteractor::fetch_last_user_requested(self).await
    }
}

#[async_trait]
impl AvatarInteractor for SyncInteractor {
    async fn fetch_avatar_image(&self, user_id: i64) -> Result<Vec<u8>> {
        SyncInteractor::fetch_avatar_image(self, user_id).await
    }
}

#[async_trait]
impl MainInteractor for SyncInteractor {
    async fn fetch_cache_invalidation_interval(&self, default_ms: i64) -> Result<i64> {
        SyncInteractor::fetch_cache_invalidation_interval(self, default_ms).await
    }

    async fn store_cache_invalidation_interval(&self, interval_ms: i64) -> Result<()> {
        SyncInteractor::store_cache_invalidation_interval(self, interval_ms).await
    }
}

#[async_trait]
impl CurrentInteractor for SyncInteractor {
    async fn fetch_user(&self, username: &str) -> Result<UserProfile> {
        SyncInteractor::fetch_user(self, username).await
    }

    fn user_selected(&self) -> broadcast::Receiver<String> {
        SyncInteractor::user_selected(self)
    }
}

#[async_trait]
impl FollowerListInteractor for SyncInteractor {
    fn store_user_selected_action(&self, username: &str) {
        SyncInteractor::store_user_selected_action(self, username)
    }

    fn fetch_followers_of(
        &self,
        username: &str,
        login_filter: Option<&str>,
    ) -> BoxStream<'static, Result<Member>> {
        SyncInteractor::fetch_followers_of(self, username, login_filter)
    }

    async fn fetch_cached_user(&self, login: &str) -> Result<Option<UserProfile>> {
        SyncInteractor::fetch_cached_user(self, login).await
    }
}
