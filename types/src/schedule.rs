//! Append-only, height-indexed schedules.
//!
//! Used for fee schedules and payload version activation. A lookup returns the
//! value of the latest entry whose effective height is at or below the queried
//! height. Entries only ever extend the schedule past its latest height, so a
//! lookup for a height already answered never changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::BsqError;

/// A monotonic "effective-as-of" schedule.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightSchedule<T> {
    entries: BTreeMap<u32, T>,
}

impl<T> HeightSchedule<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Build a schedule with a single entry effective from `height`.
    pub fn starting_at(height: u32, value: T) -> Self {
        Self {
            entries: BTreeMap::from([(height, value)]),
        }
    }

    /// Record `value` as effective from `height`.
    ///
    /// `height` must be above every recorded height.
    pub fn record(&mut self, height: u32, value: T) -> Result<(), BsqError> {
        if let Some(latest) = self.latest_height() {
            if height <= latest {
                return Err(BsqError::ScheduleOutOfOrder { height, latest });
            }
        }
        self.entries.insert(height, value);
        Ok(())
    }

    /// Height of the newest entry.
    pub fn latest_height(&self) -> Option<u32> {
        self.entries.keys().next_back().copied()
    }

    /// The value effective at `height`, if any entry is at or below it.
    pub fn effective_at(&self, height: u32) -> Option<&T> {
        self.entries.range(..=height).next_back().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.entries.iter().map(|(h, v)| (*h, v))
    }
}
