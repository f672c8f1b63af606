//! Host stand-in for the positioning receiver.
//!
//! Behaves like the vendor modem from the orchestrator's point of view: control calls
//! can be made to fail, read-back returns whatever was last scripted, and
//! [`SimulatedReceiver::emit`] invokes the registered handler the same way the modem
//! callback would.

use core::time::Duration;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::NaiveDateTime;
use parking_lot::Mutex;

use super::{
    Dilution, FixFlags, GnssError, PositionFix, RawSentence, ReceiverEvent, SatelliteSummary,
    SearchParameters,
};
use crate::relay::{EventSink, Notifier};

/// How many times each control call reached the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceiverCalls {
    pub configure: usize,
    pub start: usize,
    pub stop: usize,
}

/// A plausible frame at the given place and time.
///
/// Satellite counts follow `flags`: a valid fix uses seven satellites, anything else none.
pub fn synthetic_fix(
    latitude: f64,
    longitude: f64,
    datetime: NaiveDateTime,
    flags: FixFlags,
) -> PositionFix {
    let in_fix = if flags.contains(FixFlags::FIX_VALID) { 7 } else { 0 };

    PositionFix {
        latitude,
        longitude,
        altitude: 31.5,
        accuracy: 4.2,
        speed: 0.3,
        speed_accuracy: 0.5,
        heading: 271.0,
        datetime,
        dilution: Dilution {
            pdop: 1.8,
            hdop: 0.9,
            vdop: 1.5,
            tdop: 1.1,
        },
        satellites: SatelliteSummary {
            tracked: 9,
            in_fix,
            unhealthy: 0,
        },
        flags,
    }
}

#[derive(Default)]
struct Failures {
    handler: Option<i32>,
    configure: Option<i32>,
    start: Option<i32>,
}

#[derive(Default)]
pub struct SimulatedReceiver {
    handler: Mutex<Option<Notifier>>,
    position: Mutex<Option<PositionFix>>,
    sentence: Mutex<Option<RawSentence>>,
    parameters: Mutex<Option<SearchParameters>>,
    failures: Mutex<Failures>,
    read_delay: Mutex<Duration>,

    running: AtomicBool,
    configure_calls: AtomicUsize,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
}

impl SimulatedReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the frame returned by the next `read_position` calls.
    pub fn set_position(&self, fix: PositionFix) {
        *self.position.lock() = Some(fix);
    }

    /// Make `read_position` fail as if the frame were already consumed.
    pub fn clear_position(&self) {
        *self.position.lock() = None;
    }

    pub fn set_sentence(&self, sentence: RawSentence) {
        *self.sentence.lock() = Some(sentence);
    }

    /// Make every `read_position` take `delay`, like a modem busy with the cellular link.
    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock() = delay;
    }

    /// Refuse the next handler registration with `code`.
    pub fn refuse_handler(&self, code: i32) {
        self.failures.lock().handler = Some(code);
    }

    /// Fail the next `configure` call with `code`.
    pub fn fail_configure(&self, code: i32) {
        self.failures.lock().configure = Some(code);
    }

    /// Fail the next `start` call with `code`.
    pub fn fail_start(&self, code: i32) {
        self.failures.lock().start = Some(code);
    }

    /// Raise `event` through the registered handler.
    ///
    /// Returns `false` when no handler is registered yet.
    pub fn emit(&self, event: ReceiverEvent) -> bool {
        match self.handler.lock().as_ref() {
            Some(handler) => {
                handler.notify(event);
                true
            }
            None => false,
        }
    }

    /// Script `fix` and announce it.
    pub fn report(&self, fix: PositionFix) -> bool {
        self.set_position(fix);
        self.emit(ReceiverEvent::PositionUpdate)
    }

    /// Script `sentence` and announce it.
    pub fn report_sentence(&self, sentence: RawSentence) -> bool {
        self.set_sentence(sentence);
        self.emit(ReceiverEvent::RawSentenceAvailable)
    }

    pub fn calls(&self) -> ReceiverCalls {
        ReceiverCalls {
            configure: self.configure_calls.load(Ordering::SeqCst),
            start: self.start_calls.load(Ordering::SeqCst),
            stop: self.stop_calls.load(Ordering::SeqCst),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Parameters from the last successful `configure` call
    pub fn parameters(&self) -> Option<SearchParameters> {
        self.parameters.lock().clone()
    }
}

impl super::Receiver for SimulatedReceiver {
    fn set_event_handler(&self, handler: Notifier) -> Result<(), GnssError> {
        if let Some(code) = self.failures.lock().handler.take() {
            return Err(GnssError::Rejected {
                operation: "set_event_handler",
                code,
            });
        }

        *self.handler.lock() = Some(handler);
        Ok(())
    }

    fn configure(&self, parameters: &SearchParameters) -> Result<(), GnssError> {
        self.configure_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(code) = self.failures.lock().configure.take() {
            return Err(GnssError::Rejected {
                operation: "configure",
                code,
            });
        }

        *self.parameters.lock() = Some(parameters.clone());
        Ok(())
    }

    fn start(&self) -> Result<(), GnssError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(code) = self.failures.lock().start.take() {
            return Err(GnssError::Rejected {
                operation: "start",
                code,
            });
        }

        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<(), GnssError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn read_position(&self) -> Result<PositionFix, GnssError> {
        let delay = *self.read_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        self.position.lock().ok_or(GnssError::NoData("position"))
    }

    fn read_raw_sentence(&self) -> Result<RawSentence, GnssError> {
        self.sentence
            .lock()
            .clone()
            .ok_or(GnssError::NoData("sentence"))
    }
}
