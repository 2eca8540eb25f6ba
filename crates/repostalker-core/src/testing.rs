//! In-memory collaborators and fixtures shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::api::{ApiError, RemoteSource};
use crate::cache::CacheStore;
use crate::config::SettingsStore;
use crate::interactor::SyncInteractor;
use crate::models::{FollowerOf, Member, UserProfile, ORGANIZATION_TYPE};
use crate::nav::Navigator;
use crate::utils::{cmp_ignore_case, contains_ignore_case};

const EVENT_TIMEOUT: StdDuration = StdDuration::from_secs(2);
const QUIET_PERIOD: StdDuration = StdDuration::from_millis(100);

// ============================================================================
// Fixtures
// ============================================================================

/// A directory path unique to this test. Not created.
pub fn temp_cache_dir() -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!("repostalker-test-{}-{}", std::process::id(), n))
}

fn fixture_id(login: &str) -> i64 {
    match login {
        "bypasslane" => 8720137,
        "pedlar" => 1011,
        "steveChalker" => 1012,
        "ryansgot" => 1013,
        other => 5000 + other.bytes().map(i64::from).sum::<i64>(),
    }
}

pub fn fixture_user(login: &str) -> UserProfile {
    let account_type = if login == "bypasslane" {
        ORGANIZATION_TYPE
    } else {
        "User"
    };
    let id = fixture_id(login);
    UserProfile {
        login: login.to_string(),
        id,
        node_id: String::new(),
        avatar_url: format!("https://avatars.example/u/{}", id),
        gravatar_id: String::new(),
        html_url: format!("https://github.com/{}", login),
        followers_url: String::new(),
        organizations_url: String::new(),
        repos_url: String::new(),
        account_type: account_type.to_string(),
        site_admin: false,
        name: Some(format!("{} name", login)),
        company: None,
        blog: None,
        location: Some(format!("{} location", login)),
        email: Some(format!("{}@example.com", login)),
        bio: None,
        public_repos: Some(3),
        public_gists: Some(0),
        followers: Some(2),
        following: Some(1),
        created_at: None,
        updated_at: None,
    }
}

pub fn fixture_member(login: &str) -> Member {
    let id = fixture_id(login);
    Member {
        login: login.to_string(),
        id,
        node_id: String::new(),
        avatar_url: format!("https://avatars.example/u/{}", id),
        gravatar_id: String::new(),
        html_url: format!("https://github.com/{}", login),
        followers_url: String::new(),
        account_type: "User".to_string(),
        site_admin: false,
    }
}

/// The bypasslane members in the order the network returns them.
pub fn fixture_members() -> Vec<Member> {
    ["steveChalker", "pedlar", "ryansgot"]
        .into_iter()
        .map(fixture_member)
        .collect()
}

pub fn logins(members: &[Member]) -> Vec<String> {
    members.iter().map(|m| m.login.clone()).collect()
}

// ============================================================================
// FakeStore
// ============================================================================

#[derive(Default)]
struct StoreTables {
    users: HashMap<String, (UserProfile, DateTime<Utc>)>,
    members: HashMap<i64, Member>,
    followers: Vec<FollowerOf>,
    avatars: HashMap<i64, Vec<u8>>,
}

/// In-memory `CacheStore` that records every call as `"{method}:{key}"`.
#[derive(Default)]
pub struct FakeStore {
    tables: Mutex<StoreTables>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    zero_rows: Mutex<HashSet<&'static str>>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every call to `method` fail.
    pub fn fail(&self, method: &'static str) {
        self.failing.lock().insert(method);
    }

    /// Make every call to `method` report zero rows written.
    pub fn write_nothing(&self, method: &'static str) {
        self.zero_rows.lock().insert(method);
    }

    pub fn seed_user(&self, user: UserProfile, written_at: DateTime<Utc>) {
        self.tables
            .lock()
            .users
            .insert(user.login.clone(), (user, written_at));
    }

    pub fn seed_followers(&self, user_id: i64, members: Vec<Member>, synced_at: DateTime<Utc>) {
        let mut tables = self.tables.lock();
        for member in members {
            tables.followers.push(FollowerOf {
                user_id,
                member_id: member.id,
                synced_at,
            });
            tables.members.insert(member.id, member);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        let prefix = format!("{}:", method);
        self.calls.lock().iter().filter(|c| c.starts_with(&prefix)).count()
    }

    pub fn follower_rows(&self) -> Vec<FollowerOf> {
        self.tables.lock().followers.clone()
    }

    pub fn avatar(&self, user_id: i64) -> Option<Vec<u8>> {
        self.tables.lock().avatars.get(&user_id).cloned()
    }

    pub fn has_user(&self, login: &str) -> bool {
        self.tables.lock().users.contains_key(login)
    }

    fn record(&self, method: &'static str, key: impl std::fmt::Display) -> Result<usize> {
        self.calls.lock().push(format!("{}:{}", method, key));
        if self.failing.lock().contains(method) {
            bail!("{} failed", method);
        }
        Ok(if self.zero_rows.lock().contains(method) { 0 } else { 1 })
    }
}

#[async_trait]
impl CacheStore for FakeStore {
    async fn get_user(
        &self,
        login: &str,
        not_modified_before: DateTime<Utc>,
    ) -> Result<Option<UserProfile>> {
        self.record("get_user", login)?;
        Ok(self
            .tables
            .lock()
            .users
            .get(login)
            .filter(|(_, written_at)| *written_at >= not_modified_before)
            .map(|(user, _)| user.clone()))
    }

    async fn put_user(&self, user: &UserProfile) -> Result<usize> {
        let rows = self.record("put_user", &user.login)?;
        if rows > 0 {
            self.seed_user(user.clone(), Utc::now());
        }
        Ok(rows)
    }

    async fn put_member(&self, member: &Member) -> Result<usize> {
        let rows = self.record("put_member", &member.login)?;
        if rows > 0 {
            self.tables.lock().members.insert(member.id, member.clone());
        }
        Ok(rows)
    }

    async fn upsert_follower(
        &self,
        user_id: i64,
        member_id: i64,
        synced_at: DateTime<Utc>,
    ) -> Result<usize> {
        self.record("upsert_follower", member_id)?;
        let mut tables = self.tables.lock();
        match tables
            .followers
            .iter()
            .position(|f| f.user_id == user_id && f.member_id == member_id)
        {
            Some(idx) => tables.followers[idx].synced_at = synced_at,
            None => tables.followers.push(FollowerOf {
                user_id,
                member_id,
                synced_at,
            }),
        }
        Ok(1)
    }

    async fn get_followers(
        &self,
        user_id: i64,
        not_modified_before: Option<DateTime<Utc>>,
        login_filter: Option<&str>,
    ) -> Result<Vec<Member>> {
        let key = if not_modified_before.is_some() { "fresh" } else { "any" };
        self.record("get_followers", key)?;
        let tables = self.tables.lock();
        let mut members: Vec<Member> = tables
            .followers
            .iter()
            .filter(|f| f.user_id == user_id)
            .filter(|f| not_modified_before.map_or(true, |cutoff| f.synced_at >= cutoff))
            .filter_map(|f| tables.members.get(&f.member_id).cloned())
            .filter(|m| login_filter.map_or(true, |filter| contains_ignore_case(&m.login, filter)))
            .collect();
        members.sort_by(|a, b| cmp_ignore_case(&a.login, &b.login));
        Ok(members)
    }

    async fn put_avatar(&self, user_id: i64, image: &[u8]) -> Result<usize> {
        let rows = self.record("put_avatar", user_id)?;
        self.tables.lock().avatars.insert(user_id, image.to_vec());
        Ok(rows)
    }

    async fn get_avatar(&self, user_id: i64) -> Result<Option<Vec<u8>>> {
        self.record("get_avatar", user_id)?;
        Ok(self.tables.lock().avatars.get(&user_id).cloned())
    }
}

// ============================================================================
// FakeRemote
// ============================================================================

/// In-memory `RemoteSource` serving the fixture accounts.
///
/// `bypasslane` is an organization whose members are `fixture_members()`.
/// Every other fixture user is followed by `pedlar` only.
#[derive(Default)]
pub struct FakeRemote {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    followers: Mutex<HashMap<String, Vec<Member>>>,
    latency: Mutex<Option<StdDuration>>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, method: &'static str) {
        self.failing.lock().insert(method);
    }

    pub fn set_followers(&self, login: &str, members: Vec<Member>) {
        self.followers.lock().insert(login.to_string(), members);
    }

    /// Delay every follower or member listing.
    pub fn set_latency(&self, latency: StdDuration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        let prefix = format!("{}:", method);
        self.calls.lock().iter().filter(|c| c.starts_with(&prefix)).count()
    }

    fn record(&self, method: &'static str, key: &str) -> Result<()> {
        self.calls.lock().push(format!("{}:{}", method, key));
        if self.failing.lock().contains(method) {
            return Err(ApiError::ServerError(format!("{} unavailable", method)).into());
        }
        Ok(())
    }

    async fn listing(&self, method: &'static str, login: &str) -> Result<Vec<Member>> {
        self.record(method, login)?;
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let configured = self.followers.lock().get(login).cloned();
        Ok(configured.unwrap_or_else(|| match login {
            "bypasslane" => fixture_members(),
            _ => vec![fixture_member("pedlar")],
        }))
    }
}

#[async_trait]
impl RemoteSource for FakeRemote {
    async fn user(&self, login: &str) -> Result<UserProfile> {
        self.record("user", login)?;
        if login == "ghost" {
            return Err(ApiError::NotFound(format!("users/{}", login)).into());
        }
        Ok(fixture_user(login))
    }

    async fn followers_of_user(&self, login: &str) -> Result<Vec<Member>> {
        self.listing("followers_of_user", login).await
    }

    async fn members_of_org(&self, org: &str) -> Result<Vec<Member>> {
        self.listing("members_of_org", org).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.record("download", url)?;
        Ok(format!("image:{}", url).into_bytes())
    }
}

// ============================================================================
// FakeSettings
// ============================================================================

#[derive(Default)]
pub struct FakeSettings {
    interval_ms: Mutex<Option<i64>>,
    fail_writes: Mutex<bool>,
}

impl FakeSettings {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stored(&self) -> Option<i64> {
        *self.interval_ms.lock()
    }

    pub fn fail_writes(&self) {
        *self.fail_writes.lock() = true;
    }
}

#[async_trait]
impl SettingsStore for FakeSettings {
    async fn invalidation_interval_ms(&self, default_ms: i64) -> Result<i64> {
        Ok(self.interval_ms.lock().unwrap_or(default_ms))
    }

    async fn set_invalidation_interval_ms(&self, interval_ms: i64) -> Result<()> {
        if *self.fail_writes.lock() {
            return Err(anyhow!("settings are read-only"));
        }
        *self.interval_ms.lock() = Some(interval_ms);
        Ok(())
    }
}

// ============================================================================
// Wiring
// ============================================================================

pub struct Harness {
    pub navigator: Navigator,
    pub settings: Arc<FakeSettings>,
    pub store: Arc<FakeStore>,
    pub remote: Arc<FakeRemote>,
    pub interactor: SyncInteractor,
}

/// A `SyncInteractor` over fresh fakes and a running navigator.
pub fn harness() -> Harness {
    let navigator = Navigator::spawn();
    let settings = FakeSettings::new();
    let store = FakeStore::new();
    let remote = FakeRemote::new();
    let interactor = SyncInteractor::new(
        navigator.clone(),
        settings.clone(),
        store.clone(),
        remote.clone(),
    );
    Harness {
        navigator,
        settings,
        store,
        remote,
        interactor,
    }
}

// ============================================================================
// Alarming event collection
// ============================================================================

/// The next event on `rx`. Panics on lag, close, or timeout.
pub async fn next_event<T: Clone>(rx: &mut broadcast::Receiver<T>) -> T {
    match tokio::time::timeout(EVENT_TIMEOUT, rx.recv()).await {
        Ok(Ok(event)) => event,
        Ok(Err(RecvError::Lagged(n))) => panic!("event stream lagged by {} events", n),
        Ok(Err(RecvError::Closed)) => panic!("event stream closed unexpectedly"),
        Err(_) => panic!("timed out waiting for event"),
    }
}

pub async fn next_events<T: Clone>(rx: &mut broadcast::Receiver<T>, n: usize) -> Vec<T> {
    let mut events = Vec::with_capacity(n);
    for _ in 0..n {
        events.push(next_event(rx).await);
    }
    events
}

/// Panics if anything arrives on `rx` within a short quiet period.
pub async fn assert_quiet<T: Clone + std::fmt::Debug>(rx: &mut broadcast::Receiver<T>) {
    if let Ok(received) = tokio::time::timeout(QUIET_PERIOD, rx.recv()).await {
        panic!("expected no event, received {:?}", received);
    }
}

/// Wait until the navigator's top entry is `expected`.
pub async fn wait_for_nav_top(navigator: &Navigator, expected: &str) {
    let waited = tokio::time::timeout(EVENT_TIMEOUT, async {
        loop {
            if navigator.peek().await.ok().as_deref() == Some(expected) {
                return;
            }
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
    })
    .await;
    if waited.is_err() {
        panic!("navigator never reached {:?}", expected);
    }
}
