//! REST client module for the GitHub API.
//!
//! `RemoteSource` is the seam the sync interactor consumes. `GithubClient`
//! implements it over HTTP; tests substitute in-memory fakes.

pub mod client;
pub mod error;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Member, UserProfile};

pub use client::GithubClient;
pub use error::ApiError;

#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch the profile for `login`.
    async fn user(&self, login: &str) -> Result<UserProfile>;

    /// Fetch the followers of the user `login`.
    async fn followers_of_user(&self, login: &str) -> Result<Vec<Member>>;

    /// Fetch the public members of the organization `org`.
    async fn members_of_org(&self, org: &str) -> Result<Vec<Member>>;

    /// Download an arbitrary binary resource such as an avatar image.
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}
