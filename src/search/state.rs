use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Lifecycle of the acquisition module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModuleState {
    StartingUp,
    Initialized,
    ShuttingDown,
}

/// Whether an acquisition is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquisitionState {
    Idle,
    Searching,
}

/// Counters kept by the search state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MachineStats {
    pub searches: usize,
    pub fixes: usize,
    pub timeouts: usize,
    pub stops: usize,
    pub start_failures: usize,
}

/// Read-only window into the state machine for other threads.
///
/// Only the search thread writes here.
#[derive(Debug)]
pub struct MachineStatus {
    module: AtomicU8,
    acquisition: AtomicU8,

    searches: AtomicUsize,
    fixes: AtomicUsize,
    timeouts: AtomicUsize,
    stops: AtomicUsize,
    start_failures: AtomicUsize,
}

impl Default for MachineStatus {
    fn default() -> Self {
        Self {
            module: AtomicU8::new(ModuleState::StartingUp as u8),
            acquisition: AtomicU8::new(AcquisitionState::Idle as u8),
            searches: AtomicUsize::new(0),
            fixes: AtomicUsize::new(0),
            timeouts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            start_failures: AtomicUsize::new(0),
        }
    }
}

impl MachineStatus {
    pub fn module_state(&self) -> ModuleState {
        match self.module.load(Ordering::SeqCst) {
            0 => ModuleState::StartingUp,
            1 => ModuleState::Initialized,
            _ => ModuleState::ShuttingDown,
        }
    }

    pub fn acquisition_state(&self) -> AcquisitionState {
        match self.acquisition.load(Ordering::SeqCst) {
            0 => AcquisitionState::Idle,
            _ => AcquisitionState::Searching,
        }
    }

    pub fn stats(&self) -> MachineStats {
        MachineStats {
            searches: self.searches.load(Ordering::SeqCst),
            fixes: self.fixes.load(Ordering::SeqCst),
            timeouts: self.timeouts.load(Ordering::SeqCst),
            stops: self.stops.load(Ordering::SeqCst),
            start_failures: self.start_failures.load(Ordering::SeqCst),
        }
    }

    pub(super) fn set_module_state(&self, state: ModuleState) {
        self.module.store(state as u8, Ordering::SeqCst);
    }

    pub(super) fn set_acquisition_state(&self, state: AcquisitionState) {
        self.acquisition.store(state as u8, Ordering::SeqCst);
    }

    pub(super) fn count_search(&self) {
        self.searches.fetch_add(1, Ordering::SeqCst);
    }

    pub(super) fn count_fix(&self) {
        self.fixes.fetch_add(1, Ordering::SeqCst);
    }

    pub(super) fn count_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::SeqCst);
    }

    pub(super) fn count_stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    pub(super) fn count_start_failure(&self) {
        self.start_failures.fetch_add(1, Ordering::SeqCst);
    }
}
