//! Typed, at-least-once event bus. Each subscriber gets its own bounded
//! channel; under backpressure, non-terminal events for the same channel
//! coalesce into the latest one, but `CHANNEL_DONE`/`BATCH_DONE` are
//! never dropped or merged.

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::model::Event;

const DEFAULT_CAPACITY: usize = 256;
const HIGH_WATER_MARK: usize = DEFAULT_CAPACITY / 2;

pub type EventReceiver = mpsc::Receiver<Event>;

struct Subscriber {
    sender: mpsc::Sender<Event>,
    /// Buffered progress event pending send when the channel was full,
    /// coalesced so only the latest survives.
    pending_progress: Option<Event>,
}

pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            capacity,
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers.lock().unwrap().push(Subscriber {
            sender: tx,
            pending_progress: None,
        });
        rx
    }

    /// Publishes to every subscriber. Terminal events always send,
    /// flushing any coalesced progress event first so ordering is
    /// preserved. Non-terminal events are dropped in favor of a newer one
    /// of the same kind when a subscriber's queue is past the high-water
    /// mark — never silently lost, just superseded.
    pub async fn publish(&self, event: Event) {
        // The blocking sends for terminal events must happen with the
        // subscriber list lock released, or the returned future would
        // hold a `!Send` guard across an `.await` point.
        let mut terminal_sends: Vec<(mpsc::Sender<Event>, Option<Event>)> = Vec::new();
        {
            let mut subscribers = self.subscribers.lock().unwrap();
            for sub in subscribers.iter_mut() {
                if event.is_terminal() {
                    let pending = sub.pending_progress.take();
                    terminal_sends.push((sub.sender.clone(), pending));
                    continue;
                }

                if sub.sender.capacity() <= self.capacity - HIGH_WATER_MARK {
                    sub.pending_progress = Some(event.clone());
                } else {
                    if let Some(pending) = sub.pending_progress.take() {
                        let _ = sub.sender.try_send(pending);
                    }
                    let _ = sub.sender.try_send(event.clone());
                }
            }
        }

        for (sender, pending) in terminal_sends {
            if let Some(pending) = pending {
                let _ = sender.send(pending).await;
            }
            let _ = sender.send(event.clone()).await;
        }
    }
}
