mod config;
mod error;
pub mod positioning;
mod sentence;
pub mod sim;

pub use config::{SearchParameters, SentenceMask, SystemMask};
pub use error::GnssError;
pub use positioning::{Dilution, FixFlags, PositionFix, SatelliteSummary};
pub use sentence::{RawSentence, SentencePosition, MAX_SENTENCE_LEN};

use crate::relay::Notifier;

/// Notification tags the receiver raises from its own execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReceiverEvent {
    /// A new PVT frame can be read back
    PositionUpdate,
    /// A new NMEA sentence can be read back
    RawSentenceAvailable,
    /// The cellular link is holding the radio
    LinkBlocked,
    LinkUnblocked,
    /// The receiver gave up and went to sleep
    TimedOut,
    /// Synthesized by the inactivity supervisor for the countdown armed as `generation`
    WatchdogExpired { generation: u32 },
}

/// Control and read-back surface of the positioning receiver.
///
/// Every method may be called from the relay thread and the search thread
/// concurrently, so implementations synchronize internally.
pub trait Receiver: Send + Sync {
    /// Register the handler the receiver calls for every [`ReceiverEvent`].
    ///
    /// The receiver invokes it from a restricted context; the handler never blocks.
    fn set_event_handler(&self, handler: Notifier) -> Result<(), GnssError>;

    fn configure(&self, parameters: &SearchParameters) -> Result<(), GnssError>;

    fn start(&self) -> Result<(), GnssError>;

    fn stop(&self) -> Result<(), GnssError>;

    fn read_position(&self) -> Result<PositionFix, GnssError>;

    fn read_raw_sentence(&self) -> Result<RawSentence, GnssError>;
}
