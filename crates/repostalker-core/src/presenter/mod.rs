//! Presenters translate interactor calls into one display-event stream per screen.
//!
//! A presenter lives for as long as its screen is visible. Consumers must
//! take `events()` before calling `on_ready()`; the stream is multicast and
//! late subscribers miss what was already emitted. `on_unready()` cancels
//! every task the presenter started.

pub mod current;
pub mod follower_list;
pub mod main_screen;
mod scope;

use tokio::sync::broadcast;

use crate::interactor::NavInteractor;

pub use current::{CurrentPresenter, CurrentViewEvent, UserDetails};
pub use follower_list::{FollowerDetails, FollowerListPresenter, FollowerListViewEvent};
pub use main_screen::{MainPresenter, MainViewEvent};

/// One hour, in seconds.
pub const DEFAULT_INVALIDATION_INTERVAL_SECS: i64 = 60 * 60;

pub const LOWEST_INVALIDATION_INTERVAL_SECS: i64 = 10;

/// Account shown before anything has been selected.
pub const DEFAULT_USER: &str = "bypasslane";

/// Navigator entry pushed by the main screen.
pub const MAIN_STACK_ENTRY: &str = "main";

/// Display events buffered for slow consumers.
const EVENT_CAPACITY: usize = 256;

pub trait Presenter {
    type Event: Clone + Send + 'static;

    fn events(&self) -> broadcast::Receiver<Self::Event>;

    fn on_ready(&self);

    fn on_unready(&self);
}

/// The username whose data should be on screen: the top of the navigator,
/// or `default_user` when the navigator is empty or only holds the main entry.
async fn resolve_last_user<I>(interactor: &I, default_user: &str) -> String
where
    I: NavInteractor + ?Sized,
{
    match interactor.fetch_last_user_requested().await {
        Ok(username) if username != MAIN_STACK_ENTRY => username,
        Ok(_) => default_user.to_string(),
        Err(e) => {
            tracing::debug!(error = %e, "No last user requested, using default");
            default_user.to_string()
        }
    }
}
