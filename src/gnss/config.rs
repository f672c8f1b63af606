use core::ops::BitOr;
use core::time::Duration;

/// Satellite constellations the receiver may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SystemMask(pub u8);

impl SystemMask {
    pub const GPS: SystemMask = SystemMask(0x01);
    pub const SBAS: SystemMask = SystemMask(0x02);
    pub const QZSS: SystemMask = SystemMask(0x04);
}

impl BitOr for SystemMask {
    type Output = SystemMask;

    fn bitor(self, rhs: SystemMask) -> SystemMask {
        SystemMask(self.0 | rhs.0)
    }
}

/// NMEA sentences the receiver should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SentenceMask(pub u16);

impl SentenceMask {
    pub const GGA: SentenceMask = SentenceMask(0x01);
    pub const GLL: SentenceMask = SentenceMask(0x02);
    pub const GSA: SentenceMask = SentenceMask(0x04);
    pub const GSV: SentenceMask = SentenceMask(0x08);
    pub const RMC: SentenceMask = SentenceMask(0x10);
}

impl BitOr for SentenceMask {
    type Output = SentenceMask;

    fn bitor(self, rhs: SentenceMask) -> SentenceMask {
        SentenceMask(self.0 | rhs.0)
    }
}

// Retry budget per fix attempt
const RETRY_BUDGET: Duration = Duration::from_secs(120);
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Parameters written to the receiver before every search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParameters {
    /// How long the receiver keeps trying before it gives up and sleeps
    pub retry_budget: Duration,
    /// Time between position reports while searching
    pub report_interval: Duration,
    pub system_mask: SystemMask,
    pub sentence_mask: SentenceMask,
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            retry_budget: RETRY_BUDGET,
            report_interval: REPORT_INTERVAL,
            // Only use the GPS, not QZSS
            system_mask: SystemMask::GPS,
            sentence_mask: SentenceMask::RMC
                | SentenceMask::GGA
                | SentenceMask::GLL
                | SentenceMask::GSA
                | SentenceMask::GSV,
        }
    }
}

impl SearchParameters {
    pub fn with_retry_budget(mut self, retry_budget: Duration) -> Self {
        self.retry_budget = retry_budget;
        self
    }

    pub fn with_report_interval(mut self, report_interval: Duration) -> Self {
        self.report_interval = report_interval;
        self
    }

    pub fn with_system_mask(mut self, system_mask: SystemMask) -> Self {
        self.system_mask = system_mask;
        self
    }

    pub fn with_sentence_mask(mut self, sentence_mask: SentenceMask) -> Self {
        self.sentence_mask = sentence_mask;
        self
    }
}
