use std::num::ParseIntError;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::scope::TaskScope;
use super::{
    Presenter, DEFAULT_INVALIDATION_INTERVAL_SECS, EVENT_CAPACITY,
    LOWEST_INVALIDATION_INTERVAL_SECS, MAIN_STACK_ENTRY,
};
use crate::interactor::MainInteractor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MainViewEvent {
    ShowSettings { interval_secs: i64 },
    /// `message` is set when the user should be told what happened to their input.
    HideSettings { message: Option<String> },
    /// The main entry was popped, or there was nothing left to pop.
    NavBack,
}

/// Owns the main navigator entry and the settings dialog.
pub struct MainPresenter {
    inner: Arc<MainInner>,
}

struct MainInner {
    interactor: Arc<dyn MainInteractor>,
    events: broadcast::Sender<MainViewEvent>,
    tasks: TaskScope<MainViewEvent>,
}

/// Seconds to persist for `input`, plus the warning to show if it was clamped.
pub fn parse_interval(input: &str) -> Result<(i64, Option<String>), ParseIntError> {
    let interval: i64 = input.parse()?;
    if interval >= LOWEST_INVALIDATION_INTERVAL_SECS {
        Ok((interval, None))
    } else {
        let message = format!(
            "Invalid cache invalidation interval ({}); storing lowest allowed ({})",
            interval, LOWEST_INVALIDATION_INTERVAL_SECS
        );
        Ok((LOWEST_INVALIDATION_INTERVAL_SECS, Some(message)))
    }
}

fn store_failure_message(input: &str) -> String {
    format!("Unable to store cache invalidation interval: {}", input)
}

impl MainPresenter {
    pub fn new(interactor: Arc<dyn MainInteractor>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let tasks = TaskScope::new("main", events.clone());
        // Back navigation must work before the screen is ready
        tasks.open();
        Self {
            inner: Arc::new(MainInner {
                interactor,
                events,
                tasks,
            }),
        }
    }

    pub fn user_requested_settings(&self) {
        let interactor = Arc::clone(&self.inner.interactor);
        self.inner.tasks.spawn(move |emitter| async move {
            let default_ms = DEFAULT_INVALIDATION_INTERVAL_SECS * 1000;
            let interval_ms = interactor
                .fetch_cache_invalidation_interval(default_ms)
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Failed to read invalidation interval");
                    default_ms
                });
            emitter.emit(MainViewEvent::ShowSettings {
                interval_secs: interval_ms / 1000,
            });
        });
    }

    pub fn user_canceled_settings(&self) {
        let _ = self.inner.events.send(MainViewEvent::HideSettings { message: None });
    }

    pub fn user_saved_settings(&self, input: &str) {
        let (interval_secs, message) = match parse_interval(input) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(input, error = %e, "Unparseable invalidation interval");
                let _ = self.inner.events.send(MainViewEvent::HideSettings {
                    message: Some(store_failure_message(input)),
                });
                return;
            }
        };

        let interactor = Arc::clone(&self.inner.interactor);
        let input = input.to_string();
        self.inner.tasks.spawn(move |emitter| async move {
            let stored = match interval_secs.checked_mul(1000) {
                Some(interval_ms) => interactor.store_cache_invalidation_interval(interval_ms).await,
                None => Err(anyhow::anyhow!("Interval {} overflows", interval_secs)),
            };
            let message = match stored {
                Ok(()) => message,
                Err(e) => {
                    warn!(input = %input, error = %e, "Failed to store invalidation interval");
                    Some(store_failure_message(&input))
                }
            };
            emitter.emit(MainViewEvent::HideSettings { message });
        });
    }

    /// Pop the navigator. Emits `NavBack` itself if nothing could be popped.
    pub fn user_requested_back_nav(&self) {
        let interactor = Arc::clone(&self.inner.interactor);
        self.inner.tasks.spawn(move |emitter| async move {
            match interactor.request_back_nav().await {
                Ok(popped) => debug!(popped = %popped, "Popped nav back stack"),
                Err(e) => {
                    debug!(error = %e, "Nothing to navigate back to");
                    emitter.emit(MainViewEvent::NavBack);
                }
            }
        });
    }
}

impl Presenter for MainPresenter {
    type Event = MainViewEvent;

    fn events(&self) -> broadcast::Receiver<MainViewEvent> {
        self.inner.events.subscribe()
    }

    fn on_ready(&self) {
        let interactor = Arc::clone(&self.inner.interactor);
        self.inner.tasks.spawn(move |emitter| async move {
            let interest = match interactor
                .push_and_register_back_nav_interest(MAIN_STACK_ENTRY)
                .await
            {
                Ok(interest) => interest,
                Err(e) => {
                    warn!(error = %e, "Failed to push main stack entry");
                    return;
                }
            };
            match interest.fired().await {
                Ok(_) => {
                    emitter.emit(MainViewEvent::NavBack);
                }
                Err(e) => warn!(error = %e, "Main back nav interest ended"),
            }
        });
    }

    fn on_unready(&self) {
        self.inner.tasks.clear();
    }
}
