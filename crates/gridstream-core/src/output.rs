//! Output session writer and output feeds.
//!
//! A [`SessionWriter`] owns the output side of one stream: its session
//! metadata record (sent on every change via
//! [`SessionWriter::send_session`]), lap forwarding, and the named output
//! feeds that carry telemetry buffers.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::data::TelemetryData;
use crate::dependency::DependencyKind;
use crate::error::StreamError;
use crate::session::{Lap, SessionRecord, SessionState};
use crate::transport::{OutputTopic, TopicMessage};

/// Write-side wrapper for one stream's session on an output topic.
pub struct SessionWriter {
    topic: Arc<dyn OutputTopic>,
    stream_id: String,
    data_format_id: String,
    session: Mutex<SessionRecord>,
}

impl SessionWriter {
    /// Creates a writer for `stream_id` on `topic`.
    ///
    /// `data_format_id` is the published format all of this writer's
    /// feeds carry; feed binds reuse it rather than re-declaring formats.
    #[must_use]
    pub fn new(
        topic: Arc<dyn OutputTopic>,
        stream_id: impl Into<String>,
        data_format_id: impl Into<String>,
    ) -> Self {
        Self {
            topic,
            stream_id: stream_id.into(),
            data_format_id: data_format_id.into(),
            session: Mutex::new(SessionRecord::default()),
        }
    }

    /// The stream id this writer produces.
    #[must_use]
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// The published data format id this writer's feeds carry.
    #[must_use]
    pub fn data_format_id(&self) -> &str {
        &self.data_format_id
    }

    /// Snapshot of the session metadata as it would be sent now.
    #[must_use]
    pub fn session(&self) -> SessionRecord {
        self.session.lock().clone()
    }

    /// Declares a published descriptor this session depends on.
    ///
    /// Must be called before the session is first sent; repeated
    /// declarations of the same kind replace the id.
    pub fn add_dependency(&self, kind: DependencyKind, id: impl Into<String>) {
        self.session.lock().dependencies.insert(kind, id.into());
    }

    /// Advances the session state.
    ///
    /// States only move forward (`Unpublished -> Open -> Closed`);
    /// a backwards transition is ignored.
    pub fn set_state(&self, state: SessionState) {
        let mut session = self.session.lock();
        let forward = matches!(
            (session.state, state),
            (SessionState::Unpublished, SessionState::Open | SessionState::Closed)
                | (SessionState::Open, SessionState::Closed)
        );
        if forward {
            session.state = state;
        } else if session.state != state {
            debug!(
                stream_id = %self.stream_id,
                from = %session.state,
                to = %state,
                "ignoring backwards session state transition"
            );
        }
    }

    /// Sets the session start, nanoseconds since the Unix epoch.
    pub fn set_start_nanos(&self, start_nanos: i64) {
        self.session.lock().start_nanos = start_nanos;
    }

    /// Sets the session identifier.
    pub fn set_identifier(&self, identifier: impl Into<String>) {
        self.session.lock().identifier = identifier.into();
    }

    /// Raises the session duration to `duration_nanos`.
    ///
    /// The duration is monotonically non-decreasing; a smaller value is
    /// ignored.
    pub fn set_duration_nanos(&self, duration_nanos: i64) {
        let mut session = self.session.lock();
        if duration_nanos > session.duration_nanos {
            session.duration_nanos = duration_nanos;
        }
    }

    /// Publishes the current session metadata on the topic.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidState`] if the session has not been
    /// opened, or [`StreamError::TopicClosed`] if the topic is gone.
    pub fn send_session(&self) -> Result<(), StreamError> {
        let session = self.session.lock().clone();
        if session.state == SessionState::Unpublished {
            return Err(StreamError::InvalidState {
                expected: "Open or Closed".into(),
                actual: session.state.to_string(),
            });
        }
        self.topic.send(TopicMessage::Session {
            stream_id: self.stream_id.clone(),
            session,
        })
    }

    /// Mirrors a lap marker onto the output session.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::TopicClosed`] if the topic is gone.
    pub fn send_lap(&self, lap: Lap) -> Result<(), StreamError> {
        self.topic.send(TopicMessage::Lap {
            stream_id: self.stream_id.clone(),
            lap,
        })
    }

    /// Binds an output feed by id.
    #[must_use]
    pub fn bind_feed(&self, feed_id: impl Into<String>) -> OutputFeed {
        OutputFeed {
            topic: Arc::clone(&self.topic),
            stream_id: self.stream_id.clone(),
            feed_id: feed_id.into(),
        }
    }
}

/// A bound output feed; sends buffers on its feed id.
pub struct OutputFeed {
    topic: Arc<dyn OutputTopic>,
    stream_id: String,
    feed_id: String,
}

impl OutputFeed {
    /// The feed id this binding covers.
    #[must_use]
    pub fn feed_id(&self) -> &str {
        &self.feed_id
    }

    /// Sends a buffer on this feed, taking ownership of it.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::TopicClosed`] if the topic is gone.
    pub fn enqueue_and_send(&self, data: TelemetryData) -> Result<(), StreamError> {
        self.topic.send(TopicMessage::Data {
            stream_id: self.stream_id.clone(),
            feed_id: self.feed_id.clone(),
            data,
        })
    }
}
