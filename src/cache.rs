use std::sync::Arc;

use parking_lot::RwLock;

use crate::gnss::{PositionFix, RawSentence};
use crate::signal::{EventSignal, Events};

/// Last known receiver data.
///
/// Written only by the relay thread. Readers always get a copy of a complete
/// snapshot, never a partially updated one.
#[derive(Debug, Default)]
pub struct FixCache {
    fix: RwLock<Option<PositionFix>>,
    latest: RwLock<Option<PositionFix>>,
    sentence: RwLock<Option<RawSentence>>,
}

impl FixCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame; it only replaces the last fix when it is valid.
    pub fn store_position(&self, frame: PositionFix) {
        *self.latest.write() = Some(frame);

        if frame.is_valid() {
            *self.fix.write() = Some(frame);
        }
    }

    pub fn store_sentence(&self, sentence: RawSentence) {
        *self.sentence.write() = Some(sentence);
    }

    /// Last valid fix, regardless of what is going on right now
    pub fn last_fix(&self) -> Option<PositionFix> {
        *self.fix.read()
    }

    /// Most recent frame, valid or not
    pub fn latest_frame(&self) -> Option<PositionFix> {
        *self.latest.read()
    }

    pub fn last_sentence(&self) -> Option<RawSentence> {
        self.sentence.read().clone()
    }
}

/// Read access for downstream consumers (SMS reporting, status LEDs).
#[derive(Debug, Clone)]
pub struct FixReader {
    cache: Arc<FixCache>,
    signal: Arc<EventSignal>,
}

impl FixReader {
    pub fn new(cache: Arc<FixCache>, signal: Arc<EventSignal>) -> Self {
        Self { cache, signal }
    }

    /// The fix of the last acquisition cycle.
    ///
    /// `None` unless that cycle ended with `POSITION_FIXED`: a search in flight, a timed out
    /// cycle and an outcome already cleared by its consumer all hide older fixes.
    pub fn get_last_fix(&self) -> Option<PositionFix> {
        let current = self.signal.current();
        if !current.contains(Events::POSITION_FIXED) || current.contains(Events::SEARCHING) {
            return None;
        }

        self.cache.last_fix()
    }

    pub fn last_sentence(&self) -> Option<RawSentence> {
        self.cache.last_sentence()
    }
}
