//! Bridge between the receiver's callback context and a regular consumer thread.
//!
//! The producer side ([`Notifier`]) only performs a lock-free enqueue and a wakeup, so it
//! is safe to call from the receiver's restricted context. Everything that reads from the
//! receiver, touches the cache or talks to the search state machine happens on the
//! consumer thread in [`Relay::run`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

use event_listener::{Event, Listener};
use heapless::mpmc::MpMcQueue;

use crate::cache::FixCache;
use crate::gnss::{PositionFix, Receiver, ReceiverEvent};
use crate::signal::{EventSignal, Events};

mod outcome;

pub use outcome::Outcome;

/// Depth of the notification queue; must be a power of two
pub const NOTIFICATION_QUEUE_DEPTH: usize = 16;

/// Non-blocking destination for receiver notifications.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: ReceiverEvent);
}

/// Counters describing what went through the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayStats {
    /// Notifications that made it into the queue
    pub accepted: usize,
    /// Notifications dropped because the queue was full
    pub dropped: usize,
    /// Notifications taken off the queue and handled
    pub processed: usize,
    /// Read-backs that failed after an announcement
    pub read_failures: usize,
}

struct Shared {
    queue: MpMcQueue<ReceiverEvent, NOTIFICATION_QUEUE_DEPTH>,
    available: Event,
    closed: AtomicBool,

    accepted: AtomicUsize,
    dropped: AtomicUsize,
    processed: AtomicUsize,
    read_failures: AtomicUsize,
}

impl Shared {
    fn new() -> Self {
        Self {
            queue: MpMcQueue::new(),
            available: Event::new(),
            closed: AtomicBool::new(false),
            accepted: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
            processed: AtomicUsize::new(0),
            read_failures: AtomicUsize::new(0),
        }
    }

    fn stats(&self) -> RelayStats {
        RelayStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
        }
    }
}

/// Producer handle given to the receiver (and to the inactivity supervisor).
#[derive(Clone)]
pub struct Notifier {
    shared: Arc<Shared>,
}

impl Notifier {
    /// Let the consumer finish what is queued and then return.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.available.notify(usize::MAX);
    }

    pub fn stats(&self) -> RelayStats {
        self.shared.stats()
    }
}

impl EventSink for Notifier {
    fn notify(&self, event: ReceiverEvent) {
        match self.shared.queue.enqueue(event) {
            Ok(()) => {
                self.shared.accepted.fetch_add(1, Ordering::Relaxed);
                self.shared.available.notify(1);
            }
            Err(_) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl core::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Notifier")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Consumer side of the relay; owns all cache writes.
pub struct Relay<R: Receiver> {
    shared: Arc<Shared>,
    receiver: Arc<R>,
    cache: Arc<FixCache>,
    signal: Arc<EventSignal>,
    outcomes: mpsc::Sender<Outcome>,

    cache_sentences_before_fix: bool,
    fixed: bool,
}

impl<R: Receiver> Relay<R> {
    pub fn new(
        receiver: Arc<R>,
        cache: Arc<FixCache>,
        signal: Arc<EventSignal>,
        outcomes: mpsc::Sender<Outcome>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            receiver,
            cache,
            signal,
            outcomes,
            cache_sentences_before_fix: false,
            fixed: false,
        }
    }

    /// Keep raw sentences even while no valid fix has been seen yet.
    pub fn with_sentences_before_fix(mut self, enabled: bool) -> Self {
        self.cache_sentences_before_fix = enabled;
        self
    }

    pub fn notifier(&self) -> Notifier {
        Notifier {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Drain notifications until the relay is closed and the queue is empty.
    pub fn run(mut self) {
        log::info!("[relay] draining receiver notifications");

        while let Some(event) = self.next_event() {
            self.handle(event);
            self.shared.processed.fetch_add(1, Ordering::Relaxed);
        }

        log::info!("[relay] closed, stats: {:?}", self.shared.stats());
    }

    fn next_event(&self) -> Option<ReceiverEvent> {
        loop {
            if let Some(event) = self.shared.queue.dequeue() {
                return Some(event);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                return None;
            }

            // Register before the second look so a concurrent enqueue cannot be missed
            let listener = self.shared.available.listen();

            if let Some(event) = self.shared.queue.dequeue() {
                return Some(event);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                return None;
            }

            listener.wait();
        }
    }

    fn handle(&mut self, event: ReceiverEvent) {
        log::debug!("[relay] {:?}", event);

        match event {
            ReceiverEvent::PositionUpdate => match self.receiver.read_position() {
                Ok(fix) => self.accept_position(fix),
                Err(e) => self.read_failed("position", e),
            },

            ReceiverEvent::RawSentenceAvailable => {
                if !(self.fixed || self.cache_sentences_before_fix) {
                    return;
                }

                match self.receiver.read_raw_sentence() {
                    Ok(sentence) => self.cache.store_sentence(sentence),
                    Err(e) => self.read_failed("sentence", e),
                }
            }

            ReceiverEvent::LinkBlocked => self.forward(Outcome::Link { blocked: true }),
            ReceiverEvent::LinkUnblocked => self.forward(Outcome::Link { blocked: false }),
            ReceiverEvent::TimedOut => self.forward(Outcome::TimedOut),
            ReceiverEvent::WatchdogExpired { generation } => {
                self.forward(Outcome::WatchdogExpired { generation })
            }
        }
    }

    fn accept_position(&mut self, fix: PositionFix) {
        if fix.is_valid() {
            self.fixed = true;
        }

        self.cache.store_position(fix);
        self.forward(Outcome::Position(fix));
    }

    fn read_failed(&self, kind: &str, error: crate::gnss::GnssError) {
        self.shared.read_failures.fetch_add(1, Ordering::Relaxed);
        log::warn!("[relay] failed to read {} from the receiver: {}", kind, error);
    }

    fn forward(&self, outcome: Outcome) {
        // The search thread is gone during shutdown; nothing left to tell
        if self.outcomes.send(outcome).is_ok() {
            self.signal.post(Events::RECEIVER_OUTCOME);
        }
    }
}
