//! Watchdog for acquisitions the receiver never concludes.
//!
//! Some receiver firmware never reports its own timeout. The supervisor is armed whenever
//! a search starts and, if nobody disarms it in time, pushes a synthetic
//! [`ReceiverEvent::WatchdogExpired`] through the same sink the receiver uses.
//!
//! Every `arm` hands out a new generation and the expiry carries the generation it was
//! armed with, so an expiry still in flight when the next search starts can be told apart.

use core::time::Duration;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::Error;
use crate::gnss::ReceiverEvent;
use crate::relay::EventSink;
use crate::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerPhase {
    Disarmed,
    Armed,
    /// The timeout is being delivered
    Fired,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Disarmed,
    Armed { deadline: Instant, generation: u32 },
    Fired,
    Closed,
}

struct Shared {
    state: Mutex<State>,
    changed: Condvar,
    fired: AtomicUsize,
    generation: AtomicU32,
}

pub struct InactivitySupervisor {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl InactivitySupervisor {
    /// Start the timer thread; expirations are delivered to `sink`.
    pub fn spawn<S>(sink: S, stack_size: usize) -> Result<Self, Error>
    where
        S: EventSink + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::Disarmed),
            changed: Condvar::new(),
            fired: AtomicUsize::new(0),
            generation: AtomicU32::new(0),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            thread::spawn("watchdog", stack_size, move || {
                watch(&shared, &sink);
                Ok(())
            })?
        };

        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Start counting down from `duration`; a pending countdown is replaced.
    ///
    /// Returns the generation an expiry of this countdown will carry.
    pub fn arm(&self, duration: Duration) -> u32 {
        let mut state = self.shared.state.lock();
        if matches!(*state, State::Closed) {
            return self.generation();
        }

        let generation = self
            .shared
            .generation
            .fetch_add(1, Ordering::SeqCst)
            .wrapping_add(1);

        // An unrepresentable deadline never fires
        *state = match Instant::now().checked_add(duration) {
            Some(deadline) => State::Armed {
                deadline,
                generation,
            },
            None => State::Disarmed,
        };
        self.shared.changed.notify_all();

        generation
    }

    /// Cancel the countdown. Safe to call at any time, including after it fired.
    pub fn disarm(&self) {
        let mut state = self.shared.state.lock();
        if matches!(*state, State::Armed { .. } | State::Fired) {
            *state = State::Disarmed;
            self.shared.changed.notify_all();
        }
    }

    pub fn phase(&self) -> TimerPhase {
        match *self.shared.state.lock() {
            State::Armed { .. } => TimerPhase::Armed,
            State::Fired => TimerPhase::Fired,
            State::Disarmed | State::Closed => TimerPhase::Disarmed,
        }
    }

    /// Generation of the most recent `arm`; zero before the first one
    pub fn generation(&self) -> u32 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    /// How many synthetic timeouts were delivered so far
    pub fn fired_count(&self) -> usize {
        self.shared.fired.load(Ordering::SeqCst)
    }

    /// Stop the timer thread. Pending countdowns are dropped.
    pub fn shutdown(&self) -> Result<(), Error> {
        {
            let mut state = self.shared.state.lock();
            *state = State::Closed;
            self.shared.changed.notify_all();
        }

        match self.worker.lock().take() {
            Some(worker) => worker
                .join()
                .map_err(|_| Error::ThreadPanicked("watchdog")),
            None => Ok(()),
        }
    }
}

impl Drop for InactivitySupervisor {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("[watchdog] {}", e);
        }
    }
}

fn watch<S: EventSink>(shared: &Shared, sink: &S) {
    let mut state = shared.state.lock();

    loop {
        match *state {
            State::Closed => return,

            State::Disarmed | State::Fired => shared.changed.wait(&mut state),

            State::Armed {
                deadline,
                generation,
            } => {
                if Instant::now() < deadline {
                    // Woken early by arm/disarm or the deadline itself; re-evaluate either way
                    shared.changed.wait_until(&mut state, deadline);
                    continue;
                }

                fire(shared, sink, &mut state, generation);
            }
        }
    }
}

fn fire<S: EventSink>(
    shared: &Shared,
    sink: &S,
    state: &mut MutexGuard<'_, State>,
    generation: u32,
) {
    **state = State::Fired;
    shared.fired.fetch_add(1, Ordering::SeqCst);
    log::warn!(
        "[watchdog] acquisition {} inactive for too long, synthesizing timeout",
        generation
    );

    MutexGuard::unlocked(state, || {
        sink.notify(ReceiverEvent::WatchdogExpired { generation })
    });

    // Rearmed or disarmed meanwhile: leave that decision alone
    if matches!(**state, State::Fired) {
        **state = State::Disarmed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as Recorder;
    use std::thread::sleep;

    #[derive(Clone, Default)]
    struct Recorded(Arc<Recorder<Vec<ReceiverEvent>>>);

    impl Recorded {
        fn count(&self) -> usize {
            self.0.lock().len()
        }
    }

    impl EventSink for Recorded {
        fn notify(&self, event: ReceiverEvent) {
            self.0.lock().push(event);
        }
    }

    const STACK: usize = 64 * 1024;

    #[test]
    fn fires_once_after_duration() {
        let sink = Recorded::default();
        let supervisor = InactivitySupervisor::spawn(sink.clone(), STACK).unwrap();

        let generation = supervisor.arm(Duration::from_millis(40));
        assert_eq!(supervisor.phase(), TimerPhase::Armed);

        sleep(Duration::from_millis(250));

        assert_eq!(
            *sink.0.lock(),
            vec![ReceiverEvent::WatchdogExpired { generation }]
        );
        assert_eq!(supervisor.phase(), TimerPhase::Disarmed);
        assert_eq!(supervisor.fired_count(), 1);
    }

    #[test]
    fn disarm_before_deadline_never_fires() {
        let sink = Recorded::default();
        let supervisor = InactivitySupervisor::spawn(sink.clone(), STACK).unwrap();

        for _ in 0..10 {
            supervisor.arm(Duration::from_millis(60));
            sleep(Duration::from_millis(40));
            supervisor.disarm();
        }
        sleep(Duration::from_millis(120));

        assert_eq!(sink.count(), 0);
        assert_eq!(supervisor.phase(), TimerPhase::Disarmed);
    }

    #[test]
    fn rearming_restarts_the_countdown() {
        let sink = Recorded::default();
        let supervisor = InactivitySupervisor::spawn(sink.clone(), STACK).unwrap();

        let first = supervisor.arm(Duration::from_millis(100));
        sleep(Duration::from_millis(60));
        let second = supervisor.arm(Duration::from_millis(100));
        sleep(Duration::from_millis(60));

        // The first deadline has passed, the second has not
        assert_eq!(sink.count(), 0);

        sleep(Duration::from_millis(200));
        assert_ne!(first, second);
        assert_eq!(
            *sink.0.lock(),
            vec![ReceiverEvent::WatchdogExpired { generation: second }]
        );
    }

    #[test]
    fn every_arm_gets_a_new_generation() {
        let supervisor = InactivitySupervisor::spawn(Recorded::default(), STACK).unwrap();
        assert_eq!(supervisor.generation(), 0);

        let first = supervisor.arm(Duration::from_secs(60));
        supervisor.disarm();
        let second = supervisor.arm(Duration::from_secs(60));

        assert_eq!((first, second), (1, 2));
        assert_eq!(supervisor.generation(), 2);

        // Closed supervisors hand out nothing new
        supervisor.shutdown().unwrap();
        assert_eq!(supervisor.arm(Duration::from_secs(60)), 2);
    }

    #[test]
    fn disarm_after_fire_is_harmless() {
        let sink = Recorded::default();
        let supervisor = InactivitySupervisor::spawn(sink.clone(), STACK).unwrap();

        supervisor.arm(Duration::from_millis(10));
        sleep(Duration::from_millis(100));
        supervisor.disarm();
        supervisor.disarm();

        assert_eq!(sink.count(), 1);
        assert_eq!(supervisor.phase(), TimerPhase::Disarmed);
    }

    #[test]
    fn shutdown_drops_pending_countdown() {
        let sink = Recorded::default();
        let supervisor = InactivitySupervisor::spawn(sink.clone(), STACK).unwrap();

        supervisor.arm(Duration::from_millis(50));
        supervisor.shutdown().unwrap();
        sleep(Duration::from_millis(100));

        assert_eq!(sink.count(), 0);

        // Arming a closed supervisor does nothing
        supervisor.arm(Duration::from_millis(1));
        assert_eq!(supervisor.phase(), TimerPhase::Disarmed);
    }
}
