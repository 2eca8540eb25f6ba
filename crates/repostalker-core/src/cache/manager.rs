use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{FollowerOf, Member, UserProfile};
use crate::utils::{cmp_ignore_case, contains_ignore_case};

use super::CacheStore;

const USERS_FILE: &str = "users";
const MEMBERS_FILE: &str = "members";
const FOLLOWERS_FILE: &str = "followers";
const AVATAR_DIR: &str = "avatars";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Negative ages come from clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            let remaining_mins = minutes % 60;
            if remaining_mins >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            let remaining_hours = (minutes % 1440) / 60;
            if remaining_hours >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    /// Whether this row was written at or after `cutoff`.
    pub fn is_fresh_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.cached_at >= cutoff
    }
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, CachedData<UserProfile>>,
    members: BTreeMap<i64, CachedData<Member>>,
    followers: Vec<FollowerOf>,
}

/// JSON-file-backed cache. Tables are held in memory and written through to
/// disk on every change.
pub struct CacheManager {
    cache_dir: PathBuf,
    tables: Mutex<Tables>,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(cache_dir.join(AVATAR_DIR))
            .with_context(|| format!("Failed to create cache directory {}", cache_dir.display()))?;

        let tables = Tables {
            users: load_or_default(&cache_dir, USERS_FILE),
            members: load_or_default(&cache_dir, MEMBERS_FILE),
            followers: load_or_default(&cache_dir, FOLLOWERS_FILE),
        };
        debug!(
            users = tables.users.len(),
            members = tables.members.len(),
            followers = tables.followers.len(),
            "Cache loaded"
        );

        Ok(Self {
            cache_dir,
            tables: Mutex::new(tables),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// The cached row for `login` regardless of age, for age display.
    pub fn cached_user(&self, login: &str) -> Option<CachedData<UserProfile>> {
        let tables = self.tables.lock();
        tables.users.values().find(|row| row.data.login == login).cloned()
    }

    /// Remove every cached row and avatar image.
    pub fn clear(&self) -> Result<()> {
        let mut tables = self.tables.lock();
        *tables = Tables::default();
        for name in [USERS_FILE, MEMBERS_FILE, FOLLOWERS_FILE] {
            let path = cache_path(&self.cache_dir, name);
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove cache file: {}", name))?;
            }
        }
        let avatar_dir = self.cache_dir.join(AVATAR_DIR);
        if avatar_dir.exists() {
            std::fs::remove_dir_all(&avatar_dir).context("Failed to remove avatar cache")?;
        }
        std::fs::create_dir_all(&avatar_dir).context("Failed to recreate avatar cache")?;
        Ok(())
    }

    fn avatar_path(&self, user_id: i64) -> PathBuf {
        self.cache_dir.join(AVATAR_DIR).join(format!("{}.bin", user_id))
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let path = cache_path(&self.cache_dir, name);
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(data)?;
        std::fs::write(&tmp, contents)
            .with_context(|| format!("Failed to write cache file: {}", name))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace cache file: {}", name))?;
        Ok(())
    }
}

fn cache_path(cache_dir: &Path, name: &str) -> PathBuf {
    cache_dir.join(format!("{}.json", name))
}

fn load<T: DeserializeOwned>(cache_dir: &Path, name: &str) -> Result<Option<T>> {
    let path = cache_path(cache_dir, name);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read cache file: {}", name))?;

    let parsed: T = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse cache file: {}", name))?;

    Ok(Some(parsed))
}

/// An unreadable table is treated as empty; it is rewritten on the next sync.
fn load_or_default<T: DeserializeOwned + Default>(cache_dir: &Path, name: &str) -> T {
    match load(cache_dir, name) {
        Ok(Some(data)) => data,
        Ok(None) => T::default(),
        Err(e) => {
            warn!(cache = name, error = %e, "Discarding unreadable cache file");
            T::default()
        }
    }
}

#[async_trait]
impl CacheStore for CacheManager {
    async fn get_user(
        &self,
        login: &str,
        not_modified_before: DateTime<Utc>,
    ) -> Result<Option<UserProfile>> {
        let tables = self.tables.lock();
        Ok(tables
            .users
            .values()
            .find(|row| row.data.login == login && row.is_fresh_since(not_modified_before))
            .map(|row| row.data.clone()))
    }

    async fn put_user(&self, user: &UserProfile) -> Result<usize> {
        let mut tables = self.tables.lock();
        tables.users.insert(user.id, CachedData::new(user.clone()));
        self.save(USERS_FILE, &tables.users)?;
        Ok(1)
    }

    async fn put_member(&self, member: &Member) -> Result<usize> {
        let mut tables = self.tables.lock();
        tables.members.insert(member.id, CachedData::new(member.clone()));
        self.save(MEMBERS_FILE, &tables.members)?;
        Ok(1)
    }

    async fn upsert_follower(
        &self,
        user_id: i64,
        member_id: i64,
        synced_at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut tables = self.tables.lock();
        let existing = tables
            .followers
            .iter()
            .position(|row| row.user_id == user_id && row.member_id == member_id);
        match existing {
            Some(idx) => tables.followers[idx].synced_at = synced_at,
            None => tables.followers.push(FollowerOf {
                user_id,
                member_id,
                synced_at,
            }),
        }
        self.save(FOLLOWERS_FILE, &tables.followers)?;
        Ok(1)
    }

    async fn get_followers(
        &self,
        user_id: i64,
        not_modified_before: Option<DateTime<Utc>>,
        login_filter: Option<&str>,
    ) -> Result<Vec<Member>> {
        let tables = self.tables.lock();
        let mut members: Vec<Member> = tables
            .followers
            .iter()
            .filter(|row| row.user_id == user_id)
            .filter(|row| not_modified_before.map_or(true, |cutoff| row.synced_at >= cutoff))
            .filter_map(|row| tables.members.get(&row.member_id))
            .map(|row| row.data.clone())
            .filter(|member| login_filter.map_or(true, |f| contains_ignore_case(&member.login, f)))
            .collect();
        members.sort_by(|a, b| cmp_ignore_case(&a.login, &b.login));
        Ok(members)
    }

    async fn put_avatar(&self, user_id: i64, image: &[u8]) -> Result<usize> {
        let path = self.avatar_path(user_id);
        std::fs::write(&path, image)
            .with_context(|| format!("Failed to write avatar for {}", user_id))?;
        Ok(1)
    }

    async fn get_avatar(&self, user_id: i64) -> Result<Option<Vec<u8>>> {
        let path = self.avatar_path(user_id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read avatar for {}", user_id))?;
        Ok(Some(bytes))
    }
}

// ============================================================================
// Tests
// ============================================================================
