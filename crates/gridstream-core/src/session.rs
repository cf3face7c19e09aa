//! Session state, metadata records, and lap markers.
//!
//! A session is one logical run of timestamped telemetry on a topic,
//! identified by a stream id and described by a [`SessionRecord`] that is
//! re-sent whenever its metadata changes.

use std::collections::BTreeMap;
use std::fmt;

use crate::dependency::DependencyKind;

/// Lifecycle state of a session.
///
/// Output sessions move `Unpublished -> Open -> Closed`; the wire only
/// ever carries `Open` or `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Declared locally but not yet announced on the topic.
    #[default]
    Unpublished,

    /// Actively producing samples.
    Open,

    /// Finished; no further samples follow. Terminal.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unpublished => write!(f, "Unpublished"),
            SessionState::Open => write!(f, "Open"),
            SessionState::Closed => write!(f, "Closed"),
        }
    }
}

/// Session metadata carried alongside a stream's data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionRecord {
    /// Current lifecycle state.
    pub state: SessionState,

    /// Session start, nanoseconds since the Unix epoch.
    pub start_nanos: i64,

    /// Extent of the session so far, nanoseconds since `start_nanos`.
    /// Monotonically non-decreasing while the session is open.
    pub duration_nanos: i64,

    /// Human-readable session identifier.
    pub identifier: String,

    /// Published descriptors this session depends on.
    pub dependencies: BTreeMap<DependencyKind, String>,
}

/// A sub-segment marker within a session's timeline.
///
/// Content is opaque to the pipeline: laps observed on an input session
/// are mirrored unmodified onto the paired output session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lap {
    /// Opaque lap content.
    pub content: String,
}

impl Lap {
    /// Creates a lap marker.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record_is_unpublished() {
        let record = SessionRecord::default();
        assert_eq!(record.state, SessionState::Unpublished);
        assert_eq!(record.duration_nanos, 0);
        assert!(record.dependencies.is_empty());
    }

    #[test]
    fn state_display() {
        assert_eq!(SessionState::Open.to_string(), "Open");
        assert_eq!(SessionState::Closed.to_string(), "Closed");
    }

    #[test]
    fn dependencies_key_by_kind() {
        let mut record = SessionRecord::default();
        record
            .dependencies
            .insert(DependencyKind::DataFormat, "fmt-1".into());
        record
            .dependencies
            .insert(DependencyKind::DataFormat, "fmt-2".into());
        assert_eq!(record.dependencies.len(), 1);
        assert_eq!(
            record.dependencies[&DependencyKind::DataFormat],
            "fmt-2".to_string()
        );
    }
}
