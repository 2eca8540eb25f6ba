//! Data models for GitHub entities.
//!
//! - `UserProfile`: the full profile from `users/{login}`
//! - `Member`: the narrower shape returned by follower and org member listings
//! - `FollowerOf`: the cached relation between a user and one of its members

pub mod member;
pub mod user;

pub use member::{FollowerOf, Member};
pub use user::UserProfile;

/// GitHub reports organizations with this account type.
pub const ORGANIZATION_TYPE: &str = "Organization";
