//! Transport traits and topic message types.
//!
//! The pipeline core is transport-agnostic: it consumes the interfaces
//! here and never a concrete broker. [`crate::memory`] provides the
//! in-process implementation; real brokers implement the same traits
//! out of tree.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::data::TelemetryData;
use crate::error::StreamError;
use crate::input::SessionInput;
use crate::lifecycle::PipelineState;
use crate::session::{Lap, SessionRecord};

/// One message on a topic, always tagged with its stream id.
#[derive(Debug, Clone)]
pub enum TopicMessage {
    /// Session metadata announcement or update.
    Session {
        /// Stream the session belongs to.
        stream_id: String,
        /// Snapshot of the session metadata.
        session: SessionRecord,
    },

    /// A lap boundary.
    Lap {
        /// Stream the lap belongs to.
        stream_id: String,
        /// The lap marker.
        lap: Lap,
    },

    /// A buffered run of telemetry samples on one feed.
    Data {
        /// Stream the buffer belongs to.
        stream_id: String,
        /// Feed the buffer was sent on.
        feed_id: String,
        /// The samples.
        data: TelemetryData,
    },
}

impl TopicMessage {
    /// The stream id this message is tagged with.
    #[must_use]
    pub fn stream_id(&self) -> &str {
        match self {
            TopicMessage::Session { stream_id, .. }
            | TopicMessage::Lap { stream_id, .. }
            | TopicMessage::Data { stream_id, .. } => stream_id,
        }
    }
}

/// Write handle for one topic.
pub trait OutputTopic: Send + Sync {
    /// The topic's name.
    fn topic_name(&self) -> &str;

    /// Appends a message to the topic.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::TopicClosed`] if the topic can no longer
    /// carry messages.
    fn send(&self, message: TopicMessage) -> Result<(), StreamError>;
}

/// Creates the per-stream input binding for a newly discovered stream.
///
/// Invoked by the transport at most once per distinct stream id. The
/// returned [`SessionInput`] has its handlers registered and receives
/// every subsequent message for that stream.
pub type StreamInputFactory =
    Arc<dyn Fn(&str) -> Result<Arc<SessionInput>, StreamError> + Send + Sync>;

/// A running subscription consuming one input topic.
#[async_trait]
pub trait StreamPipeline: Send {
    /// Current lifecycle state.
    fn state(&self) -> PipelineState;

    /// Stops accepting new streams; open bindings continue flushing
    /// in-flight messages.
    fn drain(&self);

    /// Waits until the pipeline stops, bounded by `timeout`.
    ///
    /// Returns `true` if all bindings finished naturally, `false` if the
    /// timeout elapsed and the remaining bindings were forcibly stopped.
    /// In both cases the pipeline is `Stopped` afterwards.
    async fn wait_until_stopped(&mut self, timeout: Duration) -> bool;
}

/// Connection to a streaming broker.
#[async_trait]
pub trait StreamClient: Send + Sync {
    /// Opens a write handle for `topic_name`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::ConnectionFailed`] if the broker is
    /// unreachable.
    async fn open_output_topic(
        &self,
        topic_name: &str,
    ) -> Result<Arc<dyn OutputTopic>, StreamError>;

    /// Subscribes to `topic_name` on behalf of `consumer_group`,
    /// invoking `factory` once per newly observed stream id.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::ConnectionFailed`] if the subscription
    /// cannot be established.
    async fn stream_topic(
        &self,
        topic_name: &str,
        consumer_group: &str,
        factory: StreamInputFactory,
    ) -> Result<Box<dyn StreamPipeline>, StreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_stream_id() {
        let msg = TopicMessage::Lap {
            stream_id: "s1".into(),
            lap: Lap::new("lap 1"),
        };
        assert_eq!(msg.stream_id(), "s1");

        let msg = TopicMessage::Session {
            stream_id: "s2".into(),
            session: SessionRecord::default(),
        };
        assert_eq!(msg.stream_id(), "s2");
    }
}
