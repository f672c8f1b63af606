//! The search state machine: decides when the receiver searches and publishes the
//! outcome of every search on the [`EventSignal`].
//!
//! All influence from other threads arrives either as bits on the signal
//! (`REQUEST_ACQUISITION`, `STOP_ACQUISITION`, `SHUTDOWN`) or as [`Outcome`]s from the
//! relay, announced by `RECEIVER_OUTCOME`. The acquisition state itself is only ever
//! touched by the thread running [`SearchStateMachine::run`].

use core::time::Duration;
use std::sync::mpsc;
use std::sync::Arc;

use crate::config::Config;
use crate::gnss::{GnssError, PositionFix, Receiver, SearchParameters};
use crate::relay::{Notifier, Outcome};
use crate::signal::{EventSignal, Events, Timeout};
use crate::supervisor::InactivitySupervisor;

mod state;

pub use state::{AcquisitionState, MachineStats, MachineStatus, ModuleState};

/// Bits the state machine wakes up for
const SERVED: Events = Events::REQUEST_ACQUISITION
    .union(Events::STOP_ACQUISITION)
    .union(Events::RECEIVER_OUTCOME)
    .union(Events::SHUTDOWN);

pub struct SearchStateMachine<R: Receiver> {
    receiver: Arc<R>,
    signal: Arc<EventSignal>,
    supervisor: Arc<InactivitySupervisor>,
    outcomes: mpsc::Receiver<Outcome>,
    status: Arc<MachineStatus>,

    parameters: SearchParameters,
    watchdog_timeout: Duration,
    await_application: bool,

    module: ModuleState,
    state: AcquisitionState,
    // Started and not stopped since; a timeout does not clear it
    receiver_active: bool,
    // Watchdog generation of the search in flight
    watchdog_generation: u32,
}

impl<R: Receiver> SearchStateMachine<R> {
    pub fn new(
        receiver: Arc<R>,
        signal: Arc<EventSignal>,
        supervisor: Arc<InactivitySupervisor>,
        outcomes: mpsc::Receiver<Outcome>,
        config: &Config,
    ) -> Self {
        if config.watchdog_preempts_receiver() {
            log::warn!(
                "[search] watchdog ({:?}) does not outlast the receiver retry budget ({:?})",
                config.watchdog_timeout,
                config.search.retry_budget
            );
        }

        Self {
            receiver,
            signal,
            supervisor,
            outcomes,
            status: Arc::new(MachineStatus::default()),
            parameters: config.search.clone(),
            watchdog_timeout: config.watchdog_timeout,
            await_application: config.await_application,
            module: ModuleState::StartingUp,
            state: AcquisitionState::Idle,
            receiver_active: false,
            watchdog_generation: 0,
        }
    }

    pub fn status(&self) -> Arc<MachineStatus> {
        Arc::clone(&self.status)
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn module_state(&self) -> ModuleState {
        self.module
    }

    /// Hook the relay up to the receiver and announce that acquisition is available.
    pub fn initialize(&mut self, notifier: Notifier) -> Result<(), GnssError> {
        if let Err(e) = self.receiver.set_event_handler(notifier) {
            log::error!("[search] failed to set receiver event handler: {}", e);
            return Err(e);
        }

        self.module = ModuleState::Initialized;
        self.status.set_module_state(ModuleState::Initialized);
        self.signal.post(Events::ACQUISITION_INITIALIZED);

        log::info!("[search] initialized");
        Ok(())
    }

    /// Serve requests and relay outcomes until `SHUTDOWN` is posted.
    pub fn run(mut self) {
        if self.module != ModuleState::Initialized {
            log::error!("[search] not initialized, refusing to run");
            return;
        }

        if self.await_application {
            let events = self.signal.wait_any(
                Events::APPLICATION_INITIALIZED | Events::SHUTDOWN,
                Timeout::Forever,
            );
            if events.contains(Events::SHUTDOWN) {
                self.shut_down();
                return;
            }
        }

        loop {
            let events = self.signal.wait_any(SERVED, Timeout::Forever);
            if !self.dispatch(events) {
                break;
            }
        }

        self.shut_down();
    }

    /// Handle one wakeup. Returns `false` once shutdown has been requested.
    pub fn dispatch(&mut self, events: Events) -> bool {
        if events.contains(Events::SHUTDOWN) {
            return false;
        }

        if events.contains(Events::RECEIVER_OUTCOME) {
            // Clear before draining: an outcome sent after the drain re-posts the bit
            self.signal.clear(Events::RECEIVER_OUTCOME);
            while let Ok(outcome) = self.outcomes.try_recv() {
                self.on_outcome(outcome);
            }
        }

        if events.contains(Events::STOP_ACQUISITION) {
            self.on_stop();
        }

        if events.contains(Events::REQUEST_ACQUISITION) {
            self.on_request();
        }

        true
    }

    fn on_request(&mut self) {
        if self.state == AcquisitionState::Searching {
            log::debug!("[search] already searching, request ignored");
            self.signal.clear(Events::REQUEST_ACQUISITION);
            return;
        }

        match self.start_search() {
            Ok(()) => {
                self.watchdog_generation = self.supervisor.arm(self.watchdog_timeout);
                self.enter(AcquisitionState::Searching);
                self.status.count_search();
                self.signal.set_masked(
                    Events::SEARCHING,
                    !(Events::REQUEST_ACQUISITION | Events::POSITION_FIXED | Events::TIMED_OUT),
                );

                log::info!("[search] searching for position");
            }
            Err(e) => {
                // A new request is needed to try again
                self.signal.clear(Events::REQUEST_ACQUISITION);
                self.status.count_start_failure();

                log::error!("[search] failed to start search: {}", e);
            }
        }
    }

    fn start_search(&mut self) -> Result<(), GnssError> {
        if self.receiver_active {
            self.stop_receiver();
        }

        self.receiver.configure(&self.parameters)?;
        self.receiver.start()?;
        self.receiver_active = true;

        Ok(())
    }

    fn on_stop(&mut self) {
        self.stop_receiver();

        match self.state {
            AcquisitionState::Searching => {
                self.supervisor.disarm();
                self.enter(AcquisitionState::Idle);
                self.status.count_stop();
                self.signal
                    .clear(Events::SEARCHING | Events::STOP_ACQUISITION);

                log::info!("[search] search stopped on request");
            }
            AcquisitionState::Idle => {
                self.signal.clear(Events::STOP_ACQUISITION);
            }
        }
    }

    fn stop_receiver(&mut self) {
        if let Err(e) = self.receiver.stop() {
            log::warn!("[search] failed to stop receiver: {}", e);
        }
        self.receiver_active = false;
    }

    fn on_outcome(&mut self, outcome: Outcome) {
        match (self.state, outcome) {
            (_, Outcome::Link { blocked: true }) => {
                log::info!("[search] receiver blocked by the cellular link");
                self.signal.post(Events::LINK_BLOCKED);
            }
            (_, Outcome::Link { blocked: false }) => {
                log::info!("[search] receiver unblocked");
                self.signal.clear(Events::LINK_BLOCKED);
            }

            (AcquisitionState::Searching, Outcome::Position(fix)) if fix.is_valid() => {
                self.on_fix(&fix);
            }
            (AcquisitionState::Searching, Outcome::Position(frame)) => {
                log::debug!(
                    "[search] Tracking: {:2} Using: {:2} Unhealthy: {}",
                    frame.satellites.tracked,
                    frame.satellites.in_fix,
                    frame.satellites.unhealthy
                );
            }
            (AcquisitionState::Searching, Outcome::TimedOut) => {
                log::warn!("[search] receiver gave up without a fix");
                self.on_timeout();
            }
            (AcquisitionState::Searching, Outcome::WatchdogExpired { generation })
                if generation == self.watchdog_generation =>
            {
                log::warn!("[search] no outcome before the watchdog expired");
                self.on_timeout();
            }

            (AcquisitionState::Idle, Outcome::Position(_)) => {
                log::trace!("[search] frame outside of a search");
            }
            (AcquisitionState::Idle, Outcome::TimedOut) => {
                log::debug!("[search] stale timeout ignored");
            }
            (_, Outcome::WatchdogExpired { generation }) => {
                log::debug!(
                    "[search] stale watchdog expiry {} ignored (current {})",
                    generation,
                    self.watchdog_generation
                );
            }
        }
    }

    fn on_fix(&mut self, fix: &PositionFix) {
        self.supervisor.disarm();
        self.enter(AcquisitionState::Idle);
        self.status.count_fix();
        self.signal
            .set_masked(Events::POSITION_FIXED, !Events::SEARCHING);

        log::info!("[search] position fixed\n{}", fix);
    }

    fn on_timeout(&mut self) {
        self.supervisor.disarm();
        self.enter(AcquisitionState::Idle);
        self.status.count_timeout();
        self.signal
            .set_masked(Events::TIMED_OUT, !Events::SEARCHING);
    }

    fn enter(&mut self, state: AcquisitionState) {
        self.state = state;
        self.status.set_acquisition_state(state);
    }

    fn shut_down(&mut self) {
        self.module = ModuleState::ShuttingDown;
        self.status.set_module_state(ModuleState::ShuttingDown);

        if self.state == AcquisitionState::Searching {
            self.stop_receiver();
            self.supervisor.disarm();
            self.enter(AcquisitionState::Idle);
        }

        // SHUTDOWN stays set for any collaborator that waits on it
        self.signal
            .clear(Events::SEARCHING | Events::ACQUISITION_INITIALIZED);

        log::info!("[search] shut down");
    }
}
