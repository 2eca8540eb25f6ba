//! repostalker-core - browse GitHub accounts and their followers, cache first.
//!
//! The crate is organized bottom-up:
//! - [`api`] fetches profiles, follower lists and avatars from GitHub
//! - [`cache`] stores them on disk with per-row write timestamps
//! - [`config`] holds the user settings, including the invalidation interval
//! - [`nav`] is the logical back stack shared by every screen
//! - [`interactor`] decides between cache and network and broadcasts selections
//! - [`presenter`] turns interactor results into per-screen display events

pub mod api;
pub mod cache;
pub mod config;
pub mod interactor;
pub mod models;
pub mod nav;
pub mod presenter;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
