//! The topic transform capability trait.
//!
//! A [`TopicTransform`] supplies everything stream-specific a
//! [`crate::pipeline::TopicPipeline`] needs: the descriptors to publish,
//! the consumer group, the feed ids, the drain timeout, and the
//! buffer-processing function. One trait object replaces a subclass per
//! model; any implementation is valid.

use std::time::Duration;

use crate::data::TelemetryData;
use crate::display::DisplayConfiguration;
use crate::error::StreamError;
use crate::format::DataFormat;

/// Feed id used when a transform doesn't name its feeds.
pub const DEFAULT_FEED_ID: &str = "default";

/// Drain timeout used when a transform doesn't override it.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a topic-modeling pipeline needs from its model.
///
/// The pipeline reads the descriptor methods once at startup; `process`
/// is then invoked once per input buffer, potentially concurrently
/// across streams. A transform holding per-stream state must not share
/// it between concurrent stream bindings; shared state must be
/// synchronized by the transform itself.
pub trait TopicTransform: Send + Sync + 'static {
    /// Consumer group identifying this pipeline on the input topic.
    fn consumer_group(&self) -> &str;

    /// Bound on the cooperative drain phase at shutdown.
    fn drain_timeout(&self) -> Duration {
        DEFAULT_DRAIN_TIMEOUT
    }

    /// Feed to bind on each input session.
    fn input_feed_id(&self) -> &str {
        DEFAULT_FEED_ID
    }

    /// Feed to bind on each output session.
    fn output_feed_id(&self) -> &str {
        DEFAULT_FEED_ID
    }

    /// Data format expected on the input feed.
    fn input_format(&self) -> DataFormat;

    /// Data format of the produced buffers; published once per run.
    fn output_format(&self) -> DataFormat;

    /// Display configuration for the produced parameters; published once
    /// per run.
    fn configuration(&self) -> DisplayConfiguration;

    /// Processes one input buffer into one output buffer.
    ///
    /// The transform owns `data` for the duration of the call; mutating
    /// in place and returning the same buffer is the common case.
    ///
    /// # Errors
    ///
    /// An error fails the owning stream's binding; sibling streams and
    /// the pipeline keep running.
    fn process(&self, data: TelemetryData) -> Result<TelemetryData, StreamError>;
}
