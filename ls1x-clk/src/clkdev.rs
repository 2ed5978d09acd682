//! # Legacy consumer clock lookup
//!
//! Peripheral drivers that do not address clocks through description-based
//! cell indices resolve them by `(consumer device name, connection id)`
//! instead. The table is populated from the profile's alias list once the
//! graph is built and stays immutable afterwards.
use heapless::Vec;

use crate::clocks::{Clock, ClockGraph};
use crate::profile::VariantProfile;

/// Upper bound of alias entries for one variant.
pub const ALIAS_CAPACITY: usize = 32;

#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
pub enum AliasError {
    /// The alias list references a clock name the graph does not hold, which
    /// is a profile-authoring bug.
    #[error("alias target {0} is not a registered clock")]
    UnknownAliasTarget(&'static str),
    #[error("alias table capacity exhausted")]
    AllocationFailure,
}

/// Lookup miss, to be treated by the requesting driver as its own probe
/// failure.
#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
#[error("no clock registered for this consumer")]
pub struct ConsumerNotFound;

#[derive(Debug)]
struct AliasEntry {
    consumer: &'static str,
    con_id: Option<&'static str>,
    clock: Clock,
}

/// Maps `(consumer name, connection id)` pairs to clocks of one graph.
///
/// Handles stored here index into the graph the table was built against.
#[derive(Debug)]
pub struct ConsumerAliasTable {
    entries: Vec<AliasEntry, ALIAS_CAPACITY>,
}

impl ConsumerAliasTable {
    /// Resolve the profile's alias list against a built graph.
    ///
    /// All-or-nothing like the graph build itself: a single unresolvable
    /// entry discards the whole table.
    pub fn build(graph: &ClockGraph, profile: &VariantProfile) -> Result<Self, AliasError> {
        let mut entries = Vec::new();
        for alias in profile.aliases {
            let clock = graph
                .by_name(alias.clock)
                .ok_or(AliasError::UnknownAliasTarget(alias.clock))?;
            entries
                .push(AliasEntry {
                    consumer: alias.consumer,
                    con_id: alias.con_id,
                    clock,
                })
                .map_err(|_| AliasError::AllocationFailure)?;
        }
        log::debug!(
            "{}: registered {} consumer aliases",
            profile.compatible,
            entries.len()
        );
        Ok(Self { entries })
    }

    /// Look up the clock for a consumer.
    ///
    /// A query without connection id only matches entries that also carry
    /// none, mirroring legacy single-clock-per-device lookups.
    pub fn lookup(&self, consumer: &str, con_id: Option<&str>) -> Option<Clock> {
        self.entries
            .iter()
            .find(|entry| entry.consumer == consumer && entry.con_id == con_id)
            .map(|entry| entry.clock)
    }

    /// [Self::lookup] in error form for callers propagating probe failures.
    pub fn get(&self, consumer: &str, con_id: Option<&str>) -> Result<Clock, ConsumerNotFound> {
        self.lookup(consumer, con_id).ok_or(ConsumerNotFound)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
