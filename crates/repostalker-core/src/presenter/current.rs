//! The profile of whichever user is currently selected.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use super::scope::TaskScope;
use super::{resolve_last_user, Presenter, EVENT_CAPACITY};
use crate::interactor::CurrentInteractor;
use crate::models::UserProfile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDetails {
    pub user_name: String,
    /// Empty when no avatar is cached.
    pub avatar_bytes: Vec<u8>,
    pub email: Option<String>,
    pub location: Option<String>,
}

impl UserDetails {
    fn from_profile(user: &UserProfile, avatar_bytes: Vec<u8>) -> Self {
        Self {
            user_name: user.login.clone(),
            avatar_bytes,
            email: user.email.clone(),
            location: user.location.clone(),
        }
    }

    pub fn has_avatar(&self) -> bool {
        !self.avatar_bytes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurrentViewEvent {
    Loading,
    UserDetails(UserDetails),
    /// The profile could not be loaded.
    Empty,
}

pub struct CurrentPresenter {
    inner: Arc<CurrentInner>,
}

struct CurrentInner {
    interactor: Arc<dyn CurrentInteractor>,
    default_user: String,
    events: broadcast::Sender<CurrentViewEvent>,
    subscriptions: TaskScope<CurrentViewEvent>,
    fetch: TaskScope<CurrentViewEvent>,
}

impl CurrentPresenter {
    pub fn new(interactor: Arc<dyn CurrentInteractor>, default_user: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(CurrentInner {
                interactor,
                default_user: default_user.into(),
                subscriptions: TaskScope::new("current-subscriptions", events.clone()),
                fetch: TaskScope::new("current-fetch", events.clone()),
                events,
            }),
        }
    }
}

impl CurrentInner {
    fn fetch_for_last_requested(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.fetch.replace(move |emitter| async move {
            let username = resolve_last_user(this.interactor.as_ref(), &this.default_user).await;
            if username != this.default_user {
                this.watch_back_nav(&username);
            }

            emitter.emit(CurrentViewEvent::Loading);
            let event = match this.load_details(&username).await {
                Ok(details) => CurrentViewEvent::UserDetails(details),
                Err(e) => {
                    warn!(username = %username, error = %e, "Failed to load user details");
                    CurrentViewEvent::Empty
                }
            };
            emitter.emit(event);
        });
    }

    async fn load_details(&self, username: &str) -> Result<UserDetails> {
        let user = self.interactor.fetch_user(username).await?;
        let avatar = match self.interactor.fetch_avatar_image(user.id).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(username, error = %e, "No avatar for user");
                Vec::new()
            }
        };
        Ok(UserDetails::from_profile(&user, avatar))
    }

    /// Refetch once `username` is popped off the navigator.
    fn watch_back_nav(self: &Arc<Self>, username: &str) {
        let interest = self.interactor.register_back_nav_interest(username, false);
        let this = Arc::clone(self);
        self.subscriptions.spawn(move |_| async move {
            match interest.fired().await {
                Ok(popped) => {
                    debug!(popped = %popped, "Navigated back from user");
                    this.fetch_for_last_requested();
                }
                Err(e) => warn!(error = %e, "Back nav interest ended"),
            }
        });
    }

    fn watch_selections(self: &Arc<Self>) {
        let mut selections = self.interactor.user_selected();
        let this = Arc::clone(self);
        self.subscriptions.spawn(move |_| async move {
            loop {
                match selections.recv().await {
                    Ok(username) => {
                        debug!(username = %username, "User selected");
                        this.fetch_for_last_requested();
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Selection listener lagged, refetching");
                        this.fetch_for_last_requested();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
}

impl Presenter for CurrentPresenter {
    type Event = CurrentViewEvent;

    fn events(&self) -> broadcast::Receiver<CurrentViewEvent> {
        self.inner.events.subscribe()
    }

    fn on_ready(&self) {
        self.inner.subscriptions.open();
        self.inner.fetch.open();
        self.inner.watch_selections();
        self.inner.fetch_for_last_requested();
    }

    fn on_unready(&self) {
        self.inner.fetch.close();
        self.inner.subscriptions.close();
    }
}
