//! Sample stream reader.
//!
//! Subscribes to a topic directly through the session input wrapper
//! (no topic model involved) and prints every sample of the first
//! parameter channel as a timestamped ASCII bar.

use std::sync::Arc;

use tracing::info;

use gridstream_core::error::StreamError;
use gridstream_core::format::DataFormat;
use gridstream_core::input::SessionInput;
use gridstream_core::memory::MemoryStreamClient;
use gridstream_core::session::SessionState;
use gridstream_core::transport::{StreamClient, StreamInputFactory, StreamPipeline};

use crate::bar::{format_elapsed, value_bar};

/// Attaches a printing reader to `topic`.
///
/// The returned pipeline keeps printing until it is drained or dropped.
/// `range` bounds the bar rendering.
///
/// # Errors
///
/// Fails if the subscription cannot be established.
pub async fn attach(
    client: &MemoryStreamClient,
    topic: &str,
    format: DataFormat,
    range: (f64, f64),
) -> Result<Box<dyn StreamPipeline>, StreamError> {
    let factory: StreamInputFactory = Arc::new(move |stream_id| {
        info!(stream_id, "new stream");
        let input = Arc::new(SessionInput::new(stream_id));

        input.on_session_updated(|session| {
            if session.state == SessionState::Closed {
                info!(identifier = %session.identifier, "--------");
            }
            Ok(())
        });

        input.on_lap_started(|lap| {
            info!(content = %lap.content, "lap");
            Ok(())
        });

        let feed = input.bind_feed("default", format.clone());
        feed.on_data_buffered(move |data| {
            let Some(parameter) = data.parameters.first() else {
                return Ok(());
            };
            for (timestamp, value) in data.timestamps_nanos.iter().zip(&parameter.avg_values) {
                info!(
                    "{} {}",
                    format_elapsed(*timestamp),
                    value_bar(*value, range.0, range.1)
                );
            }
            Ok(())
        });

        Ok(input)
    });

    client.stream_topic(topic, "read-sample", factory).await
}
