use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GnssError {
    /// The receiver refused a control call
    #[error("receiver rejected {operation} (code {code})")]
    Rejected { operation: &'static str, code: i32 },
    /// The receiver announced data but has none to hand out
    #[error("receiver has no {0} data available")]
    NoData(&'static str),
    #[error("sentence carries no valid fix")]
    NoFix,
    #[error("sentence is missing the {0} field")]
    MissingField(&'static str), // Specify which field is missing
    #[error("unsupported sentence")]
    UnsupportedSentence, // Only RMC and GGA carry a position
    #[error("malformed sentence")]
    ParseError,
    #[error("sentence does not fit in {0} bytes")]
    SentenceTooLong(usize),
}
