//! Bus doubles for tests.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{Event, EventBus, PublishError};

/// Bus that records published events instead of delivering them.
#[derive(Debug, Default)]
pub struct RecordingBus {
    events: Mutex<Vec<Event>>,
    closed: bool,
}

impl RecordingBus {
    /// A bus that accepts every event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus that rejects every event with [`PublishError::Closed`].
    #[must_use]
    pub fn closed() -> Self {
        Self {
            events: Mutex::default(),
            closed: true,
        }
    }

    /// Events accepted so far, in publication order.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl EventBus for RecordingBus {
    async fn publish(&self, event: Event) -> Result<(), PublishError> {
        if self.closed {
            return Err(PublishError::Closed);
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}
