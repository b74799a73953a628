//! In-process event bus.
//!
//! Events are queued on an unbounded channel and dispatched by a
//! [`BusWorker`] running as its own task. Each event is fanned out to every
//! handler subscribed to its name; each handler is retried independently with
//! exponential backoff until it succeeds or [`RetryPolicy::max_attempts`] is
//! reached, after which the delivery is dropped and logged at `error`.
//!
//! ```rust,ignore
//! let (bus, worker) = BusBuilder::new(RetryPolicy::default())
//!     .subscribe(names::ORDER_CREATED, Arc::new(OrderCreatedHandler::new(orders)))
//!     .build();
//! tokio::spawn(worker.run());
//! bus.publish(event).await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{Instrument, debug, error, info_span, warn};

use super::{Event, EventBus, EventHandler, PublishError};

/// Redelivery policy for failing handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total deliveries per handler, first attempt included.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles on each further attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based count of failures so far).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// Handlers keyed by event name.
pub struct Subscriptions {
    handlers: HashMap<String, Vec<Arc<dyn EventHandler>>>,
    retry: RetryPolicy,
}

impl Subscriptions {
    /// Number of handlers subscribed to `name`.
    #[must_use]
    pub fn handler_count(&self, name: &str) -> usize {
        self.handlers.get(name).map_or(0, Vec::len)
    }

    /// Deliver an event to every subscribed handler, retrying failures.
    ///
    /// Returns the number of handlers that still failed after the last
    /// attempt.
    pub async fn dispatch(&self, event: &Event) -> usize {
        let Some(handlers) = self.handlers.get(&event.name) else {
            debug!(event = %event.name, event_id = %event.id, "No subscribers for event");
            return 0;
        };

        let deliveries = handlers
            .iter()
            .map(|handler| self.deliver(handler.as_ref(), event));
        let results = futures::future::join_all(deliveries).await;

        results.into_iter().filter(|delivered| !delivered).count()
    }

    async fn deliver(&self, handler: &dyn EventHandler, event: &Event) -> bool {
        let mut attempt = 1;
        loop {
            match handler.handle(event).await {
                Ok(()) => return true,
                Err(e) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        handler = handler.name(),
                        event = %event.name,
                        event_id = %event.id,
                        attempt,
                        retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Event handler failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        handler = handler.name(),
                        event = %event.name,
                        event_id = %event.id,
                        attempts = attempt,
                        error = %e,
                        "Event handler failed, dropping delivery"
                    );
                    return false;
                }
            }
        }
    }
}

/// Collects subscriptions before the bus starts.
pub struct BusBuilder {
    subscriptions: Subscriptions,
}

impl BusBuilder {
    /// Start a builder with the given retry policy.
    #[must_use]
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            subscriptions: Subscriptions {
                handlers: HashMap::new(),
                retry,
            },
        }
    }

    /// Subscribe a handler to an event name.
    #[must_use]
    pub fn subscribe(mut self, name: &str, handler: Arc<dyn EventHandler>) -> Self {
        self.subscriptions
            .handlers
            .entry(name.to_owned())
            .or_default()
            .push(handler);
        self
    }

    /// Finish subscribing without starting a worker, e.g. to dispatch events
    /// synchronously in tests.
    #[must_use]
    pub fn into_subscriptions(self) -> Subscriptions {
        self.subscriptions
    }

    /// Create the publishing handle and the worker that dispatches events.
    #[must_use]
    pub fn build(self) -> (InProcessBus, BusWorker) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            InProcessBus { sender },
            BusWorker {
                receiver,
                subscriptions: Arc::new(self.subscriptions),
            },
        )
    }
}

/// Publishing handle for the in-process bus.
#[derive(Debug, Clone)]
pub struct InProcessBus {
    sender: mpsc::UnboundedSender<Event>,
}

#[async_trait]
impl EventBus for InProcessBus {
    async fn publish(&self, event: Event) -> Result<(), PublishError> {
        debug!(event = %event.name, event_id = %event.id, "Publishing event");
        self.sender.send(event).map_err(|_| PublishError::Closed)
    }
}

/// Receives published events and dispatches them.
pub struct BusWorker {
    receiver: mpsc::UnboundedReceiver<Event>,
    subscriptions: Arc<Subscriptions>,
}

impl BusWorker {
    /// Run until every [`InProcessBus`] handle has been dropped and every
    /// in-flight delivery, retries included, has finished.
    ///
    /// Each event is dispatched on its own task so a handler waiting on a
    /// retry does not hold up unrelated events.
    pub async fn run(mut self) {
        let mut inflight = JoinSet::new();

        loop {
            tokio::select! {
                received = self.receiver.recv() => {
                    let Some(event) = received else { break };
                    let subscriptions = Arc::clone(&self.subscriptions);
                    let span = info_span!("event", name = %event.name, id = %event.id);
                    inflight.spawn(
                        async move {
                            subscriptions.dispatch(&event).await;
                        }
                        .instrument(span),
                    );
                }
                Some(finished) = inflight.join_next(), if !inflight.is_empty() => {
                    log_join(&finished);
                }
            }
        }

        debug!(inflight = inflight.len(), "Event bus closed, draining deliveries");
        while let Some(finished) = inflight.join_next().await {
            log_join(&finished);
        }
        debug!("Event bus drained, worker exiting");
    }
}

fn log_join(finished: &Result<(), JoinError>) {
    if let Err(e) = finished {
        error!(error = %e, "Event delivery task panicked");
    }
}
