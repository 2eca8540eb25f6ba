use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ORGANIZATION_TYPE;

/// A GitHub account as returned by `GET users/{login}`.
///
/// `id` is the join key for every related entity. `login` is the lookup key
/// and is matched case-sensitively for identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
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
    #[serde(default)]
    pub organizations_url: String,
    #[serde(default)]
    pub repos_url: String,
    #[serde(rename = "type")]
    pub account_type: String,
    #[serde(default)]
    pub site_admin: bool,
    pub name: Option<String>,
    pub company: Option<String>,
    pub blog: Option<String>,
    pub location: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub public_repos: Option<u32>,
    pub public_gists: Option<u32>,
    pub followers: Option<u32>,
    pub following: Option<u32>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn is_organization(&self) -> bool {
        self.account_type == ORGANIZATION_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_profile() {
        let json = r#"{"login":"bypasslane","id":8720137,"node_id":"MDEyOk9yZ2FuaXphdGlvbjg3MjAxMzc=","avatar_url":"https://avatars.githubusercontent.com/u/8720137?v=4","gravatar_id":"","html_url":"https://github.com/bypasslane","type":"Organization","site_admin":false,"name":"Bypass","company":null,"blog":"http://bypassmobile.com","location":"Nashville, TN","email":null,"bio":null,"public_repos":41,"public_gists":0,"followers":0,"following":0,"created_at":"2014-09-10T16:49:44Z","updated_at":"2018-06-25T20:03:35Z"}"#;

        let user: UserProfile = serde_json::from_str(json).expect("Failed to parse user JSON");
        assert_eq!(user.login, "bypasslane");
        assert_eq!(user.id, 8720137);
        assert!(user.is_organization());
        assert_eq!(user.location.as_deref(), Some("Nashville, TN"));
        assert_eq!(user.public_repos, Some(41));
        assert!(user.created_at.is_some());
        assert_eq!(user.name.as_deref(), Some("Bypass"));
    }

    #[test]
    fn test_user_account_is_not_organization() {
        let json = r#"{"login":"ryansgot","id":1,"avatar_url":"a","type":"User","name":"","company":null,"blog":null,"location":null,"email":null,"bio":null,"public_repos":null,"public_gists":null,"followers":null,"following":null,"created_at":null,"updated_at":null}"#;
        let user: UserProfile = serde_json::from_str(json).expect("Failed to parse user JSON");
        assert!(!user.is_organization());
        assert_eq!(user.name.as_deref(), Some(""));
    }
}
