use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::nav::{NavError, NAV_DELIMITER};

/// One-shot subscription to the navigator's back events.
///
/// The subscription starts when the interest is created, so a pop that
/// happens before `fired` is awaited is not missed.
pub struct BackNavInterest {
    id: String,
    exact_match: bool,
    back_events: broadcast::Receiver<String>,
}

impl BackNavInterest {
    pub(crate) fn new(
        id: impl Into<String>,
        exact_match: bool,
        back_events: broadcast::Receiver<String>,
    ) -> Self {
        Self {
            id: id.into(),
            exact_match,
            back_events,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn matches(&self, popped: &str) -> bool {
        if self.exact_match {
            popped == self.id
        } else {
            popped
                .strip_suffix(self.id.as_str())
                .map_or(false, |rest| rest.ends_with(NAV_DELIMITER))
        }
    }

    /// Resolves with the popped entry the first time a match is popped.
    pub async fn fired(mut self) -> Result<String, NavError> {
        loop {
            match self.back_events.recv().await {
                Ok(popped) if self.matches(&popped) => {
                    debug!(id = %self.id, popped = %popped, "Back nav interest fired");
                    return Ok(popped);
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(id = %self.id, skipped, "Back nav interest lagged behind navigator");
                }
                Err(RecvError::Closed) => return Err(NavError::Closed),
            }
        }
    }
}
