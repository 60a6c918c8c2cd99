// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus
//!
//! Every event is written to the durable session log before any fan-out,
//! so a slow or absent subscriber can never lose history. Subscribers get
//! bounded channels; when one is full the event is dropped for that
//! subscriber only.

use orchestra_core::{Event, EventSink};
use parking_lot::Mutex;
use tokio::sync::mpsc;

type Logger = Box<dyn Fn(&Event) + Send + Sync>;

pub struct EventBus {
    logger: Logger,
    subscribers: Mutex<Vec<mpsc::Sender<Event>>>,
}

impl EventBus {
    /// `logger` is the durability point; typically it appends to the
    /// session's `events.log`.
    pub fn new(logger: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        Self {
            logger: Box::new(logger),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Bus that only writes to the log (no subscribers yet).
    pub fn sink_only() -> Self {
        Self::new(|_| {})
    }

    /// Register a subscriber with a bounded queue.
    pub fn subscribe(&self, capacity: usize) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn emit(&self, event: Event) {
        (self.logger)(&event);
        tracing::debug!(event = %event.log_summary(), "event");

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                // UI surfaces may drop; the log already has it.
                tracing::debug!(event = event.name(), "subscriber full, dropping");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: Event) {
        EventBus::emit(self, event);
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
