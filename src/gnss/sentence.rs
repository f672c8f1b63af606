use core::fmt;

use chrono::{NaiveDate, NaiveTime};
use heapless::String;
use nmea::sentences::rmc::RmcStatusOfFix;
use nmea::ParseResult;

use super::error::GnssError;

/// Longest sentence the receiver hands out, including `$` and the checksum
pub const MAX_SENTENCE_LEN: usize = 83;

/// A single NMEA sentence as read back from the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSentence {
    text: String<MAX_SENTENCE_LEN>,
}

impl RawSentence {
    pub fn new(sentence: &str) -> Result<Self, GnssError> {
        let mut text = String::new();
        text.push_str(sentence.trim_end())
            .map_err(|_| GnssError::SentenceTooLong(MAX_SENTENCE_LEN))?;

        Ok(Self { text })
    }

    pub fn as_str(&self) -> &str {
        self.text.as_str()
    }

    /// Parse the sentence and extract the position it carries, if any.
    pub fn decode(&self) -> Result<SentencePosition, GnssError> {
        nmea::parse_str(self.as_str())
            .map_err(|e| {
                log::debug!("NMEA parse error: {:?}", e);

                GnssError::ParseError
            })
            .and_then(SentencePosition::try_from)
    }
}

impl TryFrom<&str> for RawSentence {
    type Error = GnssError;

    fn try_from(sentence: &str) -> Result<Self, Self::Error> {
        Self::new(sentence)
    }
}

impl fmt::Display for RawSentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position carried by an RMC or GGA sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct SentencePosition {
    pub time: NaiveTime,
    /// Only RMC carries the date
    pub date: Option<NaiveDate>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f32>,
    /// Knots over ground
    pub speed: Option<f32>,
    pub heading: Option<f32>,
    pub satellites: Option<u32>,
}

impl TryFrom<ParseResult> for SentencePosition {
    type Error = GnssError;

    fn try_from(data: ParseResult) -> Result<Self, Self::Error> {
        match data {
            ParseResult::RMC(rmc) => {
                if rmc.status_of_fix == RmcStatusOfFix::Invalid {
                    return Err(GnssError::NoFix);
                }

                Ok(SentencePosition {
                    time: rmc
                        .fix_time
                        .ok_or_else(|| GnssError::MissingField("fix_time"))?,
                    date: rmc.fix_date,
                    latitude: rmc.lat.ok_or_else(|| GnssError::MissingField("latitude"))?,
                    longitude: rmc
                        .lon
                        .ok_or_else(|| GnssError::MissingField("longitude"))?,
                    altitude: None,
                    speed: rmc.speed_over_ground,
                    heading: rmc.true_course,
                    satellites: None,
                })
            }

            ParseResult::GGA(gga) => {
                if !gga.fix_type.is_some_and(|fix| fix.is_valid()) {
                    return Err(GnssError::NoFix);
                }

                Ok(SentencePosition {
                    time: gga
                        .fix_time
                        .ok_or_else(|| GnssError::MissingField("fix_time"))?,
                    date: None,
                    latitude: gga
                        .latitude
                        .ok_or_else(|| GnssError::MissingField("latitude"))?,
                    longitude: gga
                        .longitude
                        .ok_or_else(|| GnssError::MissingField("longitude"))?,
                    altitude: gga.altitude,
                    speed: None,
                    heading: None,
                    satellites: gga.fix_satellites,
                })
            }

            _ => Err(GnssError::UnsupportedSentence),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_checksum(body: &str) -> std::string::String {
        let checksum = body.bytes().fold(0u8, |acc, byte| acc ^ byte);
        format!("${}*{:02X}", body, checksum)
    }

    #[test]
    fn rmc_sentence_decodes_to_position() {
        let sentence = RawSentence::new(
            "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n",
        )
        .unwrap();

        let position = sentence.decode().unwrap();

        assert!((position.latitude - 48.1173).abs() < 1e-4);
        assert!((position.longitude - 11.516_666).abs() < 1e-4);
        assert!(position.date.is_some());
        assert_eq!(position.time, NaiveTime::from_hms_opt(12, 35, 19).unwrap());
        assert_eq!(position.speed, Some(22.4));
    }

    #[test]
    fn gga_sentence_carries_altitude_and_satellites() {
        let sentence =
            RawSentence::new("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47")
                .unwrap();

        let position = sentence.decode().unwrap();

        assert_eq!(position.satellites, Some(8));
        assert_eq!(position.altitude, Some(545.4));
        assert_eq!(position.date, None);
    }

    #[test]
    fn void_rmc_has_no_fix() {
        let sentence =
            RawSentence::new(&with_checksum("GPRMC,123519,V,,,,,,,230394,,")).unwrap();

        assert_eq!(sentence.decode(), Err(GnssError::NoFix));
    }

    #[test]
    fn corrupted_checksum_is_a_parse_error() {
        let sentence = RawSentence::new(
            "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*00",
        )
        .unwrap();

        assert_eq!(sentence.decode(), Err(GnssError::ParseError));
    }

    #[test]
    fn oversized_sentence_is_rejected() {
        let text = format!("${}", "A".repeat(MAX_SENTENCE_LEN));

        assert_eq!(
            RawSentence::new(&text),
            Err(GnssError::SentenceTooLong(MAX_SENTENCE_LEN))
        );
    }
}
