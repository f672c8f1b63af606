use core::fmt;
use core::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

/// A set of flags carried by the [`EventSignal`](super::EventSignal).
///
/// Each flag is a level, not an edge: it stays set until someone clears it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Events(u32);

impl Events {
    pub const NONE: Events = Events(0);

    /// The acquisition core is up and the receiver handler is registered
    pub const ACQUISITION_INITIALIZED: Events = Events(1 << 0);
    /// Someone wants a position; consumed by the search state machine
    pub const REQUEST_ACQUISITION: Events = Events(1 << 1);
    /// An acquisition is in flight
    pub const SEARCHING: Events = Events(1 << 2);
    /// Force the receiver to stop; consumed by the search state machine
    pub const STOP_ACQUISITION: Events = Events(1 << 3);
    /// A valid fix is in the cache
    pub const POSITION_FIXED: Events = Events(1 << 4);
    pub const SMS_INITIALIZED: Events = Events(1 << 5);
    pub const SMS_LOG_SEND: Events = Events(1 << 6);
    pub const MOVEMENT_TRIGGERED: Events = Events(1 << 7);
    pub const APPLICATION_INITIALIZED: Events = Events(1 << 8);
    /// The last acquisition ended without a fix
    pub const TIMED_OUT: Events = Events(1 << 9);
    /// The relay has queued outcomes for the search state machine
    pub const RECEIVER_OUTCOME: Events = Events(1 << 10);
    pub const SHUTDOWN: Events = Events(1 << 11);
    /// The receiver reported that the cellular link is blocking it
    pub const LINK_BLOCKED: Events = Events(1 << 12);

    const NAMES: [(Events, &'static str); 13] = [
        (Events::ACQUISITION_INITIALIZED, "ACQUISITION_INITIALIZED"),
        (Events::REQUEST_ACQUISITION, "REQUEST_ACQUISITION"),
        (Events::SEARCHING, "SEARCHING"),
        (Events::STOP_ACQUISITION, "STOP_ACQUISITION"),
        (Events::POSITION_FIXED, "POSITION_FIXED"),
        (Events::SMS_INITIALIZED, "SMS_INITIALIZED"),
        (Events::SMS_LOG_SEND, "SMS_LOG_SEND"),
        (Events::MOVEMENT_TRIGGERED, "MOVEMENT_TRIGGERED"),
        (Events::APPLICATION_INITIALIZED, "APPLICATION_INITIALIZED"),
        (Events::TIMED_OUT, "TIMED_OUT"),
        (Events::RECEIVER_OUTCOME, "RECEIVER_OUTCOME"),
        (Events::SHUTDOWN, "SHUTDOWN"),
        (Events::LINK_BLOCKED, "LINK_BLOCKED"),
    ];

    pub const fn from_bits(bits: u32) -> Self {
        Events(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every flag in `other` is set in `self`
    pub const fn contains(self, other: Events) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when at least one flag in `other` is set in `self`
    pub const fn intersects(self, other: Events) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn union(self, other: Events) -> Events {
        Events(self.0 | other.0)
    }
}

impl BitOr for Events {
    type Output = Events;

    fn bitor(self, rhs: Events) -> Events {
        Events(self.0 | rhs.0)
    }
}

impl BitOrAssign for Events {
    fn bitor_assign(&mut self, rhs: Events) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Events {
    type Output = Events;

    fn bitand(self, rhs: Events) -> Events {
        Events(self.0 & rhs.0)
    }
}

impl BitAndAssign for Events {
    fn bitand_assign(&mut self, rhs: Events) {
        self.0 &= rhs.0;
    }
}

impl Not for Events {
    type Output = Events;

    fn not(self) -> Events {
        Events(!self.0)
    }
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("Events(NONE)");
        }

        f.write_str("Events(")?;

        let mut remaining = self.0;
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                remaining &= !flag.0;
                first = false;
            }
        }

        // Flags owned by collaborators outside this crate
        if remaining != 0 {
            if !first {
                f.write_str(" | ")?;
            }
            write!(f, "{:#x}", remaining)?;
        }

        f.write_str(")")
    }
}
