use core::time::Duration;

use crate::gnss::SearchParameters;

// Comfortably above the receiver's own retry budget
const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(150);
const STACK_SIZE: usize = 16 * 1024;

/// Configuration of the acquisition core.
#[derive(Debug, Clone)]
pub struct Config {
    /// Written to the receiver before every search
    pub search: SearchParameters,
    /// How long a search may run without an outcome before a timeout is synthesized
    pub watchdog_timeout: Duration,
    /// Cache raw sentences before the first valid fix has been seen
    pub cache_sentences_before_fix: bool,
    /// Serve acquisition requests only after `APPLICATION_INITIALIZED` is posted
    pub await_application: bool,
    /// Stack size of every worker thread
    pub stack_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search: SearchParameters::default(),
            watchdog_timeout: WATCHDOG_TIMEOUT,
            cache_sentences_before_fix: false,
            await_application: false,
            stack_size: STACK_SIZE,
        }
    }
}

impl Config {
    pub fn with_search(mut self, search: SearchParameters) -> Self {
        self.search = search;
        self
    }

    pub fn with_watchdog_timeout(mut self, watchdog_timeout: Duration) -> Self {
        self.watchdog_timeout = watchdog_timeout;
        self
    }

    pub fn with_sentences_before_fix(mut self, enabled: bool) -> Self {
        self.cache_sentences_before_fix = enabled;
        self
    }

    pub fn with_await_application(mut self, enabled: bool) -> Self {
        self.await_application = enabled;
        self
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    /// True when the watchdog could cut a search short that the receiver would still
    /// be allowed to finish.
    pub fn watchdog_preempts_receiver(&self) -> bool {
        self.watchdog_timeout <= self.search.retry_budget
    }
}
