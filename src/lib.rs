//! Position-acquisition orchestrator for a cellular tracker.
//!
//! Requests for a position arrive as flags on a shared [`EventSignal`]; the
//! [`Tracker`] drives the positioning receiver through a search, relays its
//! notifications out of the receiver's callback context, guards every search with an
//! inactivity watchdog and publishes the outcome back on the signal.

pub mod cache;
pub mod config;
pub mod error;
pub mod gnss;
pub mod relay;
pub mod search;
pub mod signal;
pub mod supervisor;
pub mod thread;
mod tracker;

#[cfg(test)]
mod test_support;

pub use cache::{FixCache, FixReader};
pub use config::Config;
pub use error::Error;
pub use signal::{EventSignal, Events, Timeout};
pub use tracker::Tracker;
