//! The follower (or organization member) list of the selected user.
//!
//! Every fetch emits `Loading`, then `ShowNewList` for the first follower and
//! `AddFollower` for each one after it, in sorted order, and ends with
//! either `Finished` or `Error`.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::scope::{Emitter, TaskScope};
use super::{resolve_last_user, Presenter, EVENT_CAPACITY};
use crate::interactor::FollowerListInteractor;
use crate::models::Member;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowerDetails {
    pub user_name: String,
    pub avatar_bytes: Vec<u8>,
    /// From the follower's own synced profile, when one is cached.
    pub email: Option<String>,
    pub location: Option<String>,
}

impl FollowerDetails {
    pub fn has_avatar(&self) -> bool {
        !self.avatar_bytes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowerListViewEvent {
    Loading {
        clear_filter_text: bool,
    },
    ShowNewList {
        clear_filter_text: bool,
        first: FollowerDetails,
    },
    AddFollower(FollowerDetails),
    Finished {
        has_followers: bool,
    },
    Error {
        has_followers: bool,
        message: String,
    },
}

/// How a fetch ties itself to the navigator.
#[derive(Debug, Clone, Copy)]
enum BackNav {
    /// Push the user, then watch for exactly that entry.
    Push,
    /// Watch for any entry naming the user.
    Register,
}

pub struct FollowerListPresenter {
    inner: Arc<FollowerListInner>,
}

struct FollowerListInner {
    interactor: Arc<dyn FollowerListInteractor>,
    default_user: String,
    events: broadcast::Sender<FollowerListViewEvent>,
    subscriptions: TaskScope<FollowerListViewEvent>,
    fetch: TaskScope<FollowerListViewEvent>,
}

impl FollowerListPresenter {
    pub fn new(
        interactor: Arc<dyn FollowerListInteractor>,
        default_user: impl Into<String>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(FollowerListInner {
                interactor,
                default_user: default_user.into(),
                subscriptions: TaskScope::new("follower-list-subscriptions", events.clone()),
                fetch: TaskScope::new("follower-list-fetch", events.clone()),
                events,
            }),
        }
    }

    /// Navigate to `username` and list its followers, starting a new filter session.
    pub fn user_requested_follower(&self, username: &str) {
        self.inner.fetch_selected(username.to_string());
    }

    /// Narrow the displayed user's followers. Does not touch the navigator.
    pub fn user_requested_follower_list_filter(&self, filter: &str) {
        self.inner.fetch_for_last_requested(Some(filter.to_string()));
    }
}

impl FollowerListInner {
    fn fetch_for_last_requested(self: &Arc<Self>, filter: Option<String>) {
        let clear_filter_text = filter.as_deref().map_or(true, str::is_empty);
        let this = Arc::clone(self);
        self.fetch.replace(move |emitter| async move {
            let username = resolve_last_user(this.interactor.as_ref(), &this.default_user).await;
            if filter.is_none() {
                this.register_back_nav(&username, BackNav::Register).await;
            }
            this.stream_followers(&emitter, &username, filter.as_deref(), clear_filter_text)
                .await;
        });
    }

    fn fetch_selected(self: &Arc<Self>, username: String) {
        let this = Arc::clone(self);
        self.fetch.replace(move |emitter| async move {
            this.register_back_nav(&username, BackNav::Push).await;
            this.interactor.store_user_selected_action(&username);
            this.stream_followers(&emitter, &username, None, true).await;
        });
    }

    async fn register_back_nav(self: &Arc<Self>, username: &str, mode: BackNav) {
        if username == self.default_user {
            return;
        }
        let interest = match mode {
            BackNav::Push => {
                match self
                    .interactor
                    .push_and_register_back_nav_interest(username)
                    .await
                {
                    Ok(interest) => interest,
                    Err(e) => {
                        warn!(username, error = %e, "Failed to push user onto navigator");
                        return;
                    }
                }
            }
            BackNav::Register => self.interactor.register_back_nav_interest(username, false),
        };

        let this = Arc::clone(self);
        self.subscriptions.spawn(move |_| async move {
            match interest.fired().await {
                Ok(popped) => {
                    debug!(popped = %popped, "Navigated back, reloading followers");
                    this.fetch_for_last_requested(None);
                }
                Err(e) => warn!(error = %e, "Back nav interest ended"),
            }
        });
    }

    async fn stream_followers(
        &self,
        emitter: &Emitter<FollowerListViewEvent>,
        username: &str,
        filter: Option<&str>,
        clear_filter_text: bool,
    ) {
        emitter.emit(FollowerListViewEvent::Loading {
            clear_filter_text: filter.is_none(),
        });

        let mut followers = self.interactor.fetch_followers_of(username, filter);
        let mut has_followers = false;
        while let Some(next) = followers.next().await {
            match next {
                Ok(member) => {
                    let details = self.follower_details(&member).await;
                    let event = if has_followers {
                        FollowerListViewEvent::AddFollower(details)
                    } else {
                        FollowerListViewEvent::ShowNewList {
                            clear_filter_text,
                            first: details,
                        }
                    };
                    emitter.emit(event);
                    has_followers = true;
                }
                Err(e) => {
                    warn!(username, error = %e, "Failed to list followers");
                    emitter.emit(FollowerListViewEvent::Error {
                        has_followers,
                        message: e.to_string(),
                    });
                    return;
                }
            }
        }
        emitter.emit(FollowerListViewEvent::Finished { has_followers });
    }

    async fn follower_details(&self, member: &Member) -> FollowerDetails {
        let avatar_bytes = self
            .interactor
            .fetch_avatar_image(member.id)
            .await
            .unwrap_or_default();
        let profile = match self.interactor.fetch_cached_user(&member.login).await {
            Ok(profile) => profile,
            Err(e) => {
                debug!(login = %member.login, error = %e, "No cached profile for follower");
                None
            }
        };
        FollowerDetails {
            user_name: member.login.clone(),
            avatar_bytes,
            email: profile.as_ref().and_then(|p| p.email.clone()),
            location: profile.and_then(|p| p.location),
        }
    }
}

impl Presenter for FollowerListPresenter {
    type Event = FollowerListViewEvent;

    fn events(&self) -> broadcast::Receiver<FollowerListViewEvent> {
        self.inner.events.subscribe()
    }

    fn on_ready(&self) {
        self.inner.subscriptions.open();
        self.inner.fetch.open();
        self.inner.fetch_for_last_requested(None);
    }

    fn on_unready(&self) {
        self.inner.fetch.close();
        self.inner.subscriptions.close();
    }
}
