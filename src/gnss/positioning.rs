use chrono::{Datelike, NaiveDateTime, Timelike};
use core::fmt;

/// Quality flags reported alongside a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FixFlags(pub u8);

impl FixFlags {
    pub const FIX_VALID: FixFlags = FixFlags(0x01);
    pub const VELOCITY_VALID: FixFlags = FixFlags(0x02);
    /// Receiver is running with reduced search windows (e.g. blocked by the cellular link)
    pub const DEGRADED: FixFlags = FixFlags(0x04);

    pub const fn contains(self, other: FixFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn with(self, other: FixFlags) -> FixFlags {
        FixFlags(self.0 | other.0)
    }
}

/// Satellite counts from the receiver's tracking table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SatelliteSummary {
    pub tracked: u8,
    pub in_fix: u8,
    pub unhealthy: u8,
}

/// Dilution of precision figures.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Dilution {
    pub pdop: f32,
    pub hdop: f32,
    pub vdop: f32,
    pub tdop: f32,
}

/// One position/velocity/time frame read back from the receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above the WGS-84 ellipsoid
    pub altitude: f32,
    /// Horizontal accuracy in meters
    pub accuracy: f32,
    /// Meters per second
    pub speed: f32,
    pub speed_accuracy: f32,
    /// Degrees from true north
    pub heading: f32,
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub datetime: NaiveDateTime,
    pub dilution: Dilution,
    pub satellites: SatelliteSummary,
    pub flags: FixFlags,
}

impl PositionFix {
    pub fn is_valid(&self) -> bool {
        self.flags.contains(FixFlags::FIX_VALID)
    }

    pub fn is_degraded(&self) -> bool {
        self.flags.contains(FixFlags::DEGRADED)
    }
}

impl fmt::Display for PositionFix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Latitude:       {:.06}", self.latitude)?;
        writeln!(f, "Longitude:      {:.06}", self.longitude)?;
        writeln!(f, "Altitude:       {:.01} m", self.altitude)?;
        writeln!(f, "Accuracy:       {:.01} m", self.accuracy)?;
        writeln!(f, "Speed:          {:.01} m/s", self.speed)?;
        writeln!(f, "Speed accuracy: {:.01} m/s", self.speed_accuracy)?;
        writeln!(f, "Heading:        {:.01} deg", self.heading)?;
        writeln!(
            f,
            "Date:           {:04}-{:02}-{:02}",
            self.datetime.year(),
            self.datetime.month(),
            self.datetime.day()
        )?;
        writeln!(
            f,
            "Time (UTC):     {:02}:{:02}:{:02}.{:03}",
            self.datetime.hour(),
            self.datetime.minute(),
            self.datetime.second(),
            self.datetime.nanosecond() / 1_000_000
        )?;
        writeln!(f, "PDOP:           {:.01}", self.dilution.pdop)?;
        writeln!(f, "HDOP:           {:.01}", self.dilution.hdop)?;
        writeln!(f, "VDOP:           {:.01}", self.dilution.vdop)?;
        write!(f, "TDOP:           {:.01}", self.dilution.tdop)
    }
}
