use crate::gnss::PositionFix;

/// What the relay tells the search state machine after handling a notification.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// A frame was read back and cached; it may or may not carry a valid fix
    Position(PositionFix),
    Link { blocked: bool },
    /// The receiver gave up on the acquisition
    TimedOut,
    /// The inactivity supervisor expired; only the current `generation` ends a search
    WatchdogExpired { generation: u32 },
}
