use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::cache::{FixCache, FixReader};
use crate::config::Config;
use crate::error::Error;
use crate::gnss::Receiver;
use crate::relay::{Notifier, Relay, RelayStats};
use crate::search::{AcquisitionState, MachineStats, MachineStatus, ModuleState, SearchStateMachine};
use crate::signal::{EventSignal, Events};
use crate::supervisor::{InactivitySupervisor, TimerPhase};
use crate::thread;

/// The running acquisition core: relay, watchdog and search threads around one receiver.
pub struct Tracker {
    signal: Arc<EventSignal>,
    reader: FixReader,
    notifier: Notifier,
    supervisor: Arc<InactivitySupervisor>,
    status: Arc<MachineStatus>,

    machine: Option<JoinHandle<()>>,
    relay: Option<JoinHandle<()>>,
}

impl Tracker {
    /// Wire everything up around `receiver` and start serving `signal`.
    ///
    /// Registration with the receiver happens before this returns, so
    /// `ACQUISITION_INITIALIZED` is already posted on success.
    pub fn start<R>(receiver: Arc<R>, signal: Arc<EventSignal>, config: Config) -> Result<Self, Error>
    where
        R: Receiver + 'static,
    {
        log::info!("[tracker] starting with {:?}", config);

        // Left over from a previous run on the same signal
        signal.clear(Events::SHUTDOWN);

        let cache = Arc::new(FixCache::new());
        let (outcomes_tx, outcomes_rx) = mpsc::channel();

        let relay = Relay::new(
            Arc::clone(&receiver),
            Arc::clone(&cache),
            Arc::clone(&signal),
            outcomes_tx,
        )
        .with_sentences_before_fix(config.cache_sentences_before_fix);
        let notifier = relay.notifier();

        let supervisor = Arc::new(InactivitySupervisor::spawn(
            notifier.clone(),
            config.stack_size,
        )?);

        let mut machine = SearchStateMachine::new(
            receiver,
            Arc::clone(&signal),
            Arc::clone(&supervisor),
            outcomes_rx,
            &config,
        );
        machine.initialize(notifier.clone())?;
        let status = machine.status();

        let relay = thread::spawn("relay", config.stack_size, move || {
            relay.run();
            Ok(())
        })?;

        let machine = match thread::spawn("search", config.stack_size, move || {
            machine.run();
            Ok(())
        }) {
            Ok(machine) => machine,
            Err(e) => {
                notifier.close();
                if relay.join().is_err() {
                    log::error!("[tracker] relay thread panicked");
                }
                return Err(e);
            }
        };

        let reader = FixReader::new(cache, Arc::clone(&signal));

        Ok(Self {
            signal,
            reader,
            notifier,
            supervisor,
            status,
            machine: Some(machine),
            relay: Some(relay),
        })
    }

    pub fn signal(&self) -> &Arc<EventSignal> {
        &self.signal
    }

    /// Read access to the last fix, for the threads reporting it.
    pub fn reader(&self) -> FixReader {
        self.reader.clone()
    }

    /// The handler registered with the receiver.
    pub fn notifier(&self) -> Notifier {
        self.notifier.clone()
    }

    pub fn request_acquisition(&self) {
        self.signal.post(Events::REQUEST_ACQUISITION);
    }

    pub fn stop_acquisition(&self) {
        self.signal.post(Events::STOP_ACQUISITION);
    }

    pub fn acquisition_state(&self) -> AcquisitionState {
        self.status.acquisition_state()
    }

    pub fn module_state(&self) -> ModuleState {
        self.status.module_state()
    }

    pub fn watchdog_phase(&self) -> TimerPhase {
        self.supervisor.phase()
    }

    pub fn watchdog_fired_count(&self) -> usize {
        self.supervisor.fired_count()
    }

    pub fn relay_stats(&self) -> RelayStats {
        self.notifier.stats()
    }

    pub fn machine_stats(&self) -> MachineStats {
        self.status.stats()
    }

    /// Stop searching and join every thread. Calling it again does nothing.
    pub fn shutdown(&mut self) -> Result<(), Error> {
        let Some(machine) = self.machine.take() else {
            return Ok(());
        };

        self.signal.post(Events::SHUTDOWN);
        let search = machine
            .join()
            .map_err(|_| Error::ThreadPanicked("search"));

        // The search thread is gone, so nothing re-arms the watchdog from here on
        let watchdog = self.supervisor.shutdown();

        self.notifier.close();
        let relay = match self.relay.take() {
            Some(relay) => relay.join().map_err(|_| Error::ThreadPanicked("relay")),
            None => Ok(()),
        };

        log::info!("[tracker] stopped");
        search.and(watchdog).and(relay)
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("[tracker] {}", e);
        }
    }
}
