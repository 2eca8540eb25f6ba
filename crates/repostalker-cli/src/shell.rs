//! Line commands and how display events are printed.

use repostalker_core::presenter::{
    CurrentViewEvent, FollowerDetails, FollowerListViewEvent, MainViewEvent,
};
use repostalker_core::utils::{format_optional, truncate_string};

/// Longest login or location printed before truncation.
const MAX_FIELD_WIDTH: usize = 32;

pub const HELP: &str = "\
Commands:
  follow <login>   show <login> and its followers
  filter [text]    filter the follower list (empty clears the filter)
  back             navigate back
  settings         show the cache invalidation interval
  save <seconds>   store a new cache invalidation interval
  cancel           close the settings
  clear-cache      remove every cached profile, follower and avatar
  help             show this message
  quit             exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Follow(String),
    Filter(String),
    Back,
    Settings,
    Save(String),
    Cancel,
    ClearCache,
    Help,
    Quit,
}

impl Command {
    /// `Ok(None)` for a blank line, `Err` with a message for anything unknown.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };

        let command = match (name, arg) {
            ("follow", "") => return Err("usage: follow <login>".to_string()),
            ("follow", login) => Self::Follow(login.to_string()),
            ("filter", text) => Self::Filter(text.to_string()),
            ("save", "") => return Err("usage: save <seconds>".to_string()),
            ("save", seconds) => Self::Save(seconds.to_string()),
            ("back", _) => Self::Back,
            ("settings", _) => Self::Settings,
            ("cancel", _) => Self::Cancel,
            ("clear-cache", _) => Self::ClearCache,
            ("help", _) | ("?", _) => Self::Help,
            ("quit", _) | ("exit", _) => Self::Quit,
            (other, _) => return Err(format!("unknown command '{}', try 'help'", other)),
        };
        Ok(Some(command))
    }
}

pub fn render_main(event: &MainViewEvent) -> Option<String> {
    match event {
        MainViewEvent::ShowSettings { interval_secs } => Some(format!(
            "Cache invalidation interval: {}s (save <seconds> or cancel)",
            interval_secs
        )),
        MainViewEvent::HideSettings { message: Some(message) } => Some(message.clone()),
        MainViewEvent::HideSettings { message: None } => Some("Settings closed".to_string()),
        MainViewEvent::NavBack => None,
    }
}

/// `cached_age` is the "cached N ago" annotation for the shown user, if known.
pub fn render_current(event: &CurrentViewEvent, cached_age: Option<String>) -> String {
    match event {
        CurrentViewEvent::Loading => "Loading user...".to_string(),
        CurrentViewEvent::Empty => "No user to show".to_string(),
        CurrentViewEvent::UserDetails(details) => {
            let mut line = format!(
                "== {} <{}> {}",
                truncate_string(&details.user_name, MAX_FIELD_WIDTH),
                format_optional(&details.email, "no public email"),
                truncate_string(&format_optional(&details.location, "-"), MAX_FIELD_WIDTH),
            );
            if details.has_avatar() {
                line.push_str(&format!(" [avatar {} bytes]", details.avatar_bytes.len()));
            }
            if let Some(age) = cached_age {
                line.push_str(&format!(" (cached {})", age));
            }
            line
        }
    }
}

fn render_follower(details: &FollowerDetails) -> String {
    let mut line = format!("  - {}", truncate_string(&details.user_name, MAX_FIELD_WIDTH));
    if let Some(location) = &details.location {
        line.push_str(&format!(" ({})", truncate_string(location, MAX_FIELD_WIDTH)));
    }
    if details.has_avatar() {
        line.push_str(" *");
    }
    line
}

pub fn render_follower_list(event: &FollowerListViewEvent) -> String {
    match event {
        FollowerListViewEvent::Loading { .. } => "Loading followers...".to_string(),
        FollowerListViewEvent::ShowNewList { first, .. } => {
            format!("Followers:\n{}", render_follower(first))
        }
        FollowerListViewEvent::AddFollower(details) => render_follower(details),
        FollowerListViewEvent::Finished { has_followers: true } => "(end of list)".to_string(),
        FollowerListViewEvent::Finished { has_followers: false } => "No followers".to_string(),
        FollowerListViewEvent::Error { message, .. } => format!("Error: {}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("follow pedlar"),
            Ok(Some(Command::Follow("pedlar".to_string())))
        );
        assert_eq!(
            Command::parse("  filter  Ste "),
            Ok(Some(Command::Filter("Ste".to_string())))
        );
        assert_eq!(Command::parse("filter"), Ok(Some(Command::Filter(String::new()))));
        assert_eq!(Command::parse("save 30"), Ok(Some(Command::Save("30".to_string()))));
        assert_eq!(Command::parse("clear-cache"), Ok(Some(Command::ClearCache)));
        assert_eq!(Command::parse("exit"), Ok(Some(Command::Quit)));
        assert_eq!(Command::parse("   "), Ok(None));
    }

    #[test]
    fn test_parse_rejects_missing_arguments() {
        assert!(Command::parse("follow").is_err());
        assert!(Command::parse("save").is_err());
        assert!(Command::parse("unfollow pedlar").is_err());
    }

    #[test]
    fn test_render_user_details() {
        let details = repostalker_core::presenter::UserDetails {
            user_name: "pedlar".to_string(),
            avatar_bytes: vec![1, 2, 3],
            email: None,
            location: Some("Nashville, TN".to_string()),
        };
        let line = render_current(
            &CurrentViewEvent::UserDetails(details),
            Some("5m ago".to_string()),
        );
        assert_eq!(
            line,
            "== pedlar <no public email> Nashville, TN [avatar 3 bytes] (cached 5m ago)"
        );
    }

    #[test]
    fn test_render_follower_list_events() {
        let first = FollowerDetails {
            user_name: "pedlar".to_string(),
            avatar_bytes: Vec::new(),
            email: None,
            location: None,
        };
        assert_eq!(
            render_follower_list(&FollowerListViewEvent::ShowNewList {
                clear_filter_text: true,
                first,
            }),
            "Followers:\n  - pedlar"
        );
        assert_eq!(
            render_follower_list(&FollowerListViewEvent::Finished { has_followers: false }),
            "No followers"
        );
    }

    #[test]
    fn test_nav_back_prints_nothing() {
        assert_eq!(render_main(&MainViewEvent::NavBack), None);
    }
}
