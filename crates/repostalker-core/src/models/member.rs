use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A GitHub account as it appears in `users/{login}/followers` and
/// `orgs/{org}/members`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub login: String,
    pub id: i64,
    #[serde(default)]
    pub node_id: String,
    pub avatar_url: String,
    #[serde(default)]
    pub gravatar_id: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub followers_url: String,
    #[serde(rename = "type")]
    pub account_type: String,
    #[serde(default)]
    pub site_admin: bool,
}

/// Relation row: `member_id` follows (or belongs to) `user_id`.
///
/// Unique per `(user_id, member_id)`. Resynchronizing updates `synced_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowerOf {
    pub user_id: i64,
    pub member_id: i64,
    pub synced_at: DateTime<Utc>,
}
