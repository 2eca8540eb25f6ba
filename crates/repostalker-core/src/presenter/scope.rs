//! Cancellation scopes for presenter work.
//!
//! A presenter owns two scopes: one for long-lived subscriptions (back-nav
//! interests, the selection broadcast) and one holding the single in-flight
//! fetch. Work spawned into a scope emits through an [`Emitter`] tied to the
//! scope generation it was spawned in. Clearing the scope aborts its tasks and
//! bumps the generation, so an emit racing the abort is dropped instead of
//! reaching the display-event stream.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::trace;

struct ScopeState {
    generation: u64,
    open: bool,
    tasks: Vec<AbortHandle>,
}

impl ScopeState {
    fn abort_all(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.generation += 1;
    }
}

pub(crate) struct TaskScope<E> {
    name: &'static str,
    state: Arc<Mutex<ScopeState>>,
    events: broadcast::Sender<E>,
}

/// Emits display events on behalf of one task, only while its generation is current.
pub(crate) struct Emitter<E> {
    generation: u64,
    state: Arc<Mutex<ScopeState>>,
    events: broadcast::Sender<E>,
}

impl<E: Clone + Send + 'static> TaskScope<E> {
    /// A closed scope. Nothing runs until [`TaskScope::open`].
    pub fn new(name: &'static str, events: broadcast::Sender<E>) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(ScopeState {
                generation: 0,
                open: false,
                tasks: Vec::new(),
            })),
            events,
        }
    }

    pub fn open(&self) {
        self.state.lock().open = true;
    }

    /// Abort everything and refuse new work until reopened.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.open = false;
        state.abort_all();
        trace!(scope = self.name, "Closed task scope");
    }

    /// Abort everything but keep accepting new work.
    pub fn clear(&self) {
        self.state.lock().abort_all();
    }

    /// Run alongside whatever is already in the scope.
    pub fn spawn<F, Fut>(&self, task: F)
    where
        F: FnOnce(Emitter<E>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.state.lock().generation;
        self.spawn_in(generation, task);
    }

    /// Abort whatever is in the scope, then run `task` as its only member.
    pub fn replace<F, Fut>(&self, task: F)
    where
        F: FnOnce(Emitter<E>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = {
            let mut state = self.state.lock();
            state.abort_all();
            state.generation
        };
        self.spawn_in(generation, task);
    }

    fn spawn_in<F, Fut>(&self, generation: u64, task: F)
    where
        F: FnOnce(Emitter<E>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let future = task(Emitter {
            generation,
            state: Arc::clone(&self.state),
            events: self.events.clone(),
        });

        let mut state = self.state.lock();
        if !state.open || state.generation != generation {
            trace!(scope = self.name, "Dropped task spawned into inactive scope");
            return;
        }
        state.tasks.retain(|task| !task.is_finished());
        state.tasks.push(tokio::spawn(future).abort_handle());
    }
}

impl<E> Emitter<E> {
    /// Returns false if the scope moved on and the event was dropped.
    pub fn emit(&self, event: E) -> bool {
        let state = self.state.lock();
        if !state.open || state.generation != self.generation {
            return false;
        }
        // No subscriber is not an error
        let _ = self.events.send(event);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assert_quiet, next_event};
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn scope() -> (TaskScope<u32>, broadcast::Receiver<u32>) {
        let (tx, rx) = broadcast::channel(16);
        let scope = TaskScope::new("test", tx);
        scope.open();
        (scope, rx)
    }

    #[tokio::test]
    async fn test_closed_scope_runs_nothing() {
        let (tx, mut rx) = broadcast::channel(16);
        let scope = TaskScope::new("test", tx);
        scope.spawn(|emitter| async move {
            emitter.emit(1);
        });
        assert_quiet(&mut rx).await;
    }

    #[tokio::test]
    async fn test_replace_discards_previous_task() {
        let (scope, mut rx) = scope();
        let (release, gate) = oneshot::channel::<()>();
        scope.replace(|emitter| async move {
            let _ = gate.await;
            emitter.emit(1);
        });
        scope.replace(|emitter| async move {
            emitter.emit(2);
        });
        let _ = release.send(());

        assert_eq!(next_event(&mut rx).await, 2);
        assert_quiet(&mut rx).await;
    }

    #[tokio::test]
    async fn test_stale_emitter_is_silenced() {
        let (scope, mut rx) = scope();
        let (hand_back, handed) = oneshot::channel();
        scope.spawn(|emitter| async move {
            let _ = hand_back.send(emitter);
        });
        let emitter = handed.await.unwrap();

        scope.clear();

        assert!(!emitter.emit(7));
        assert_quiet(&mut rx).await;
    }

    #[tokio::test]
    async fn test_spawn_keeps_siblings_running() {
        let (scope, mut rx) = scope();
        scope.spawn(|emitter| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            emitter.emit(1);
        });
        scope.spawn(|emitter| async move {
            emitter.emit(2);
        });

        let mut seen = vec![next_event(&mut rx).await, next_event(&mut rx).await];
        seen.sort();
        assert_eq!(seen, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_close_then_reopen() {
        let (scope, mut rx) = scope();
        scope.close();
        scope.spawn(|emitter| async move {
            emitter.emit(1);
        });
        assert_quiet(&mut rx).await;

        scope.open();
        scope.spawn(|emitter| async move {
            emitter.emit(2);
        });
        assert_eq!(next_event(&mut rx).await, 2);
    }
}
