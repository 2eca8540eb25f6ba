use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

use super::{NavError, NAV_DELIMITER};

/// Buffer size for navigator commands.
const COMMAND_BUFFER_SIZE: usize = 32;

/// Back events retained for slow subscribers before they start lagging.
const BACK_EVENT_CAPACITY: usize = 64;

enum Command {
    Push(String, oneshot::Sender<String>),
    Pop(oneshot::Sender<Result<String, NavError>>),
    Peek(oneshot::Sender<Result<String, NavError>>),
}

/// Handle to the navigation stack.
///
/// The stack lives inside a single task; every push, pop and peek is
/// serialized through it no matter which task the caller runs on. Clones
/// share the same stack.
///
/// The base entry is the id pushed onto an empty stack. Pushing the base id
/// again does not grow the stack and returns `"0|{base}"`.
#[derive(Clone)]
pub struct Navigator {
    commands: mpsc::Sender<Command>,
    back_events: broadcast::Sender<String>,
}

struct NavStack {
    base: Option<String>,
    sequence_number: u64,
    entries: Vec<String>,
    back_events: broadcast::Sender<String>,
}

impl Navigator {
    /// Start the navigator task on the current tokio runtime.
    pub fn spawn() -> Self {
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER_SIZE);
        let (back_events, _) = broadcast::channel(BACK_EVENT_CAPACITY);
        let stack = NavStack {
            base: None,
            sequence_number: 0,
            entries: Vec::new(),
            back_events: back_events.clone(),
        };
        tokio::spawn(stack.run(rx));
        Self {
            commands,
            back_events,
        }
    }

    pub async fn push(&self, id: &str) -> Result<String, NavError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Push(id.to_string(), tx)).await?;
        rx.await.map_err(|_| NavError::Closed)
    }

    /// Remove and return the top entry, then broadcast it as a back event.
    pub async fn pop(&self) -> Result<String, NavError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Pop(tx)).await?;
        rx.await.map_err(|_| NavError::Closed)?
    }

    pub async fn peek(&self) -> Result<String, NavError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Peek(tx)).await?;
        rx.await.map_err(|_| NavError::Closed)?
    }

    /// Every entry popped after this call. Earlier pops are not replayed.
    pub fn back_events(&self) -> broadcast::Receiver<String> {
        self.back_events.subscribe()
    }

    async fn send(&self, command: Command) -> Result<(), NavError> {
        self.commands.send(command).await.map_err(|_| NavError::Closed)
    }
}

impl NavStack {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Push(id, reply) => {
                    let _ = reply.send(self.push(id));
                }
                Command::Pop(reply) => {
                    let popped = self.pop();
                    if let Ok(ref entry) = popped {
                        // Nobody listening is fine
                        let _ = self.back_events.send(entry.clone());
                    }
                    let _ = reply.send(popped);
                }
                Command::Peek(reply) => {
                    let _ = reply.send(self.peek());
                }
            }
        }
        debug!("Navigator stopped");
    }

    fn push(&mut self, id: String) -> String {
        if self.entries.is_empty() {
            self.base = Some(id.clone());
        } else if self.base.as_deref() == Some(id.as_str()) {
            return format!("0{}{}", NAV_DELIMITER, id);
        }
        let entry = format!("{}{}{}", self.sequence_number, NAV_DELIMITER, id);
        self.sequence_number += 1;
        debug!(entry = %entry, depth = self.entries.len() + 1, "Pushed onto nav stack");
        self.entries.push(entry.clone());
        entry
    }

    fn pop(&mut self) -> Result<String, NavError> {
        match self.entries.pop() {
            Some(entry) => {
                debug!(entry = %entry, depth = self.entries.len(), "Popped nav stack");
                Ok(entry)
            }
            None => {
                warn!("Attempted to pop empty nav stack");
                Err(NavError::EmptyStack)
            }
        }
    }

    fn peek(&self) -> Result<String, NavError> {
        self.entries.last().cloned().ok_or(NavError::EmptyStack)
    }
}
