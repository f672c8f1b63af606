use core::time::Duration;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

mod events;

pub use events::Events;

/// How long a wait on the [`EventSignal`] may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Poll: report the current bits immediately
    NoWait,
    After(Duration),
    Forever,
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        if duration.is_zero() {
            Timeout::NoWait
        } else {
            Timeout::After(duration)
        }
    }
}

/// Process-wide bitmask used by every thread to publish and observe state.
///
/// All mutation happens under a single lock, so [`EventSignal::set_masked`] cannot erase
/// a concurrent [`EventSignal::post`].
#[derive(Debug, Default)]
pub struct EventSignal {
    bits: Mutex<u32>,
    changed: Condvar,
}

impl EventSignal {
    pub const fn new() -> Self {
        Self {
            bits: Mutex::new(0),
            changed: Condvar::new(),
        }
    }

    /// OR `events` into the signal and wake every waiter.
    pub fn post(&self, events: Events) {
        let mut bits = self.bits.lock();
        *bits |= events.bits();
        self.changed.notify_all();
    }

    /// Replace the signal with `(current & keep) | value`.
    pub fn set_masked(&self, value: Events, keep: Events) {
        let mut bits = self.bits.lock();
        *bits = (*bits & keep.bits()) | value.bits();
        self.changed.notify_all();
    }

    pub fn clear(&self, events: Events) {
        self.set_masked(Events::NONE, !events);
    }

    pub fn current(&self) -> Events {
        Events::from_bits(*self.bits.lock())
    }

    /// Block until any flag of `mask` is set, or until `timeout` elapses.
    ///
    /// Returns every flag currently set; nothing is cleared.
    pub fn wait_any(&self, mask: Events, timeout: impl Into<Timeout>) -> Events {
        self.wait_until(timeout.into(), |bits| bits.intersects(mask))
    }

    /// Block until every flag of `mask` is set, or until `timeout` elapses.
    pub fn wait_all(&self, mask: Events, timeout: impl Into<Timeout>) -> Events {
        self.wait_until(timeout.into(), |bits| bits.contains(mask))
    }

    fn wait_until(&self, timeout: Timeout, satisfied: impl Fn(Events) -> bool) -> Events {
        // An unrepresentable deadline is as good as forever
        let deadline = match timeout {
            Timeout::After(duration) => Instant::now().checked_add(duration),
            _ => None,
        };

        let mut bits = self.bits.lock();
        loop {
            let current = Events::from_bits(*bits);
            if satisfied(current) {
                return current;
            }

            match (timeout, deadline) {
                (Timeout::NoWait, _) => return current,
                (Timeout::After(_), Some(deadline)) => {
                    if self.changed.wait_until(&mut bits, deadline).timed_out() {
                        return Events::from_bits(*bits);
                    }
                }
                _ => self.changed.wait(&mut bits),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn set_masked_clears_only_unkept_bits() {
        let signal = EventSignal::new();
        signal.post(Events::SEARCHING | Events::REQUEST_ACQUISITION | Events::SMS_INITIALIZED);

        signal.set_masked(Events::POSITION_FIXED, !Events::SEARCHING);

        assert_eq!(
            signal.current(),
            Events::REQUEST_ACQUISITION | Events::SMS_INITIALIZED | Events::POSITION_FIXED
        );
    }

    #[test]
    fn waits_are_level_triggered() {
        let signal = EventSignal::new();
        signal.post(Events::POSITION_FIXED);

        let first = signal.wait_any(Events::POSITION_FIXED, Timeout::Forever);
        let second = signal.wait_any(Events::POSITION_FIXED, Timeout::NoWait);

        assert!(first.contains(Events::POSITION_FIXED));
        assert!(second.contains(Events::POSITION_FIXED));

        signal.clear(Events::POSITION_FIXED);
        assert!(signal.wait_any(Events::POSITION_FIXED, Timeout::NoWait).is_empty());
    }

    #[test]
    fn zero_duration_polls() {
        let signal = EventSignal::new();
        let started = Instant::now();

        let bits = signal.wait_any(Events::SEARCHING, Duration::ZERO);

        assert!(bits.is_empty());
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn wait_any_times_out_without_matching_bits() {
        let signal = EventSignal::new();
        signal.post(Events::SMS_INITIALIZED);
        let started = Instant::now();

        let bits = signal.wait_any(Events::POSITION_FIXED, Duration::from_millis(60));

        assert!(started.elapsed() >= Duration::from_millis(60));
        assert_eq!(bits, Events::SMS_INITIALIZED);
    }

    #[test]
    fn wait_any_wakes_promptly_after_post() {
        let signal = Arc::new(EventSignal::new());

        let poster = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                signal.post(Events::TIMED_OUT);
                Instant::now()
            })
        };

        let bits = signal.wait_any(Events::POSITION_FIXED | Events::TIMED_OUT, Timeout::Forever);
        let woke = Instant::now();
        let posted = poster.join().unwrap();

        assert!(bits.contains(Events::TIMED_OUT));
        assert!(woke.saturating_duration_since(posted) < Duration::from_millis(200));
    }

    #[test]
    fn wait_all_needs_every_bit() {
        let signal = Arc::new(EventSignal::new());
        let mask = Events::ACQUISITION_INITIALIZED | Events::SMS_INITIALIZED;
        signal.post(Events::ACQUISITION_INITIALIZED);

        let partial = signal.wait_all(mask, Duration::from_millis(20));
        assert!(!partial.contains(mask));

        let poster = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                signal.post(Events::SMS_INITIALIZED);
            })
        };

        let all = signal.wait_all(mask, Timeout::Forever);
        poster.join().unwrap();

        assert!(all.contains(mask));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Post(u32),
        SetMasked { value: u32, keep: u32 },
    }

    const LANE_WIDTH: u32 = 4;
    const LANES: usize = 4;

    fn lane_mask(lane: usize) -> u32 {
        0b1111 << (lane as u32 * LANE_WIDTH)
    }

    fn arb_lane_ops() -> impl Strategy<Value = Vec<Op>> {
        let op = prop_oneof![
            (0u32..16).prop_map(Op::Post),
            (0u32..16, 0u32..16).prop_map(|(value, keep)| Op::SetMasked { value, keep }),
        ];
        prop::collection::vec(op, 1..64)
    }

    fn apply(bits: u32, op: &Op, lane: usize) -> u32 {
        let shift = lane as u32 * LANE_WIDTH;
        match *op {
            Op::Post(value) => bits | (value << shift),
            Op::SetMasked { value, keep } => {
                (bits & ((keep << shift) | !lane_mask(lane))) | (value << shift)
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Each thread only touches its own lane of bits, so every lane must end exactly
        /// where its own operations, applied in order, put it. A lost update in another
        /// thread's read-modify-write would show up as a wrong lane.
        #[test]
        fn concurrent_updates_are_never_lost(
            lanes in prop::collection::vec(arb_lane_ops(), LANES..=LANES)
        ) {
            let signal = Arc::new(EventSignal::new());

            let workers: Vec<_> = lanes
                .iter()
                .cloned()
                .enumerate()
                .map(|(lane, ops)| {
                    let signal = Arc::clone(&signal);
                    thread::spawn(move || {
                        let shift = lane as u32 * LANE_WIDTH;
                        for op in ops {
                            match op {
                                Op::Post(value) => signal.post(Events::from_bits(value << shift)),
                                Op::SetMasked { value, keep } => signal.set_masked(
                                    Events::from_bits(value << shift),
                                    Events::from_bits((keep << shift) | !lane_mask(lane)),
                                ),
                            }
                        }
                    })
                })
                .collect();

            for worker in workers {
                worker.join().unwrap();
            }

            let expected = lanes.iter().enumerate().fold(0u32, |bits, (lane, ops)| {
                ops.iter().fold(bits, |bits, op| apply(bits, op, lane))
            });

            prop_assert_eq!(signal.current().bits(), expected);
        }
    }
}
