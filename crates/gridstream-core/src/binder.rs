//! Session pair construction and feed routing for one stream.
//!
//! When the transport discovers a stream, the [`SessionBinder`] builds
//! the paired input/output sessions: it declares the pipeline's published
//! dependencies on the output session, derives the output identifier from
//! the input identifier and the output topic name, and links session
//! metadata and lap markers from input to output. The [`FeedRouter`]
//! then wires the transform between the bound input and output feeds.
//!
//! Dropping the returned [`SessionInput`] releases both sides of the
//! pair.

use std::sync::Arc;

use crate::dependency::DependencyKind;
use crate::error::StreamError;
use crate::input::SessionInput;
use crate::output::SessionWriter;
use crate::transform::TopicTransform;
use crate::transport::OutputTopic;

/// Builds bound session pairs for streams discovered on the input topic.
pub struct SessionBinder {
    output_topic: Arc<dyn OutputTopic>,
    data_format_id: String,
    config_id: String,
    transform: Arc<dyn TopicTransform>,
}

impl SessionBinder {
    /// Creates a binder for one pipeline run.
    ///
    /// `data_format_id` and `config_id` are the ids published at pipeline
    /// start; every session bound here carries exactly these two
    /// dependencies.
    #[must_use]
    pub fn new(
        output_topic: Arc<dyn OutputTopic>,
        data_format_id: impl Into<String>,
        config_id: impl Into<String>,
        transform: Arc<dyn TopicTransform>,
    ) -> Self {
        Self {
            output_topic,
            data_format_id: data_format_id.into(),
            config_id: config_id.into(),
            transform,
        }
    }

    /// Binds one discovered stream.
    ///
    /// Constructs the input wrapper and the paired output session,
    /// attaches the dependency declarations, registers the metadata and
    /// lap links, and routes the feeds through the transform.
    ///
    /// # Errors
    ///
    /// Returns an error if feed routing cannot be established.
    pub fn bind_stream(&self, stream_id: &str) -> Result<Arc<SessionInput>, StreamError> {
        let input = Arc::new(SessionInput::new(stream_id));
        let writer = Arc::new(SessionWriter::new(
            Arc::clone(&self.output_topic),
            stream_id,
            self.data_format_id.clone(),
        ));

        // Dependencies are declared before the session is ever sent.
        writer.add_dependency(DependencyKind::DataFormat, self.data_format_id.clone());
        writer.add_dependency(DependencyKind::Configuration, self.config_id.clone());

        // Every input metadata change is applied to the output session
        // and published. The identifier is re-derived on each update so
        // it always reflects the announced input identifier.
        let identifier_suffix = self.output_topic.topic_name().to_string();
        let link = Arc::clone(&writer);
        input.on_session_updated(move |session| {
            link.set_identifier(format!("{}_{}", session.identifier, identifier_suffix));
            link.set_start_nanos(session.start_nanos);
            link.set_duration_nanos(session.duration_nanos);
            link.set_state(session.state);
            link.send_session()
        });

        let laps = Arc::clone(&writer);
        input.on_lap_started(move |lap| laps.send_lap(lap.clone()));

        FeedRouter::bind(&input, &writer, &self.transform);

        Ok(input)
    }
}

/// Routes buffered telemetry from a bound input feed, through the
/// transform, to the bound output feed.
pub struct FeedRouter;

impl FeedRouter {
    /// Binds the transform's feeds on a session pair and installs the
    /// buffer handler.
    ///
    /// For each input buffer, `process` runs exactly once, synchronously;
    /// the result is sent on the output feed immediately. The session
    /// duration is raised to the processed buffer's latest timestamp
    /// before the send. A `process` error propagates out of the handler,
    /// failing only the owning stream's binding.
    pub fn bind(
        input: &Arc<SessionInput>,
        writer: &Arc<SessionWriter>,
        transform: &Arc<dyn TopicTransform>,
    ) {
        let input_feed = input.bind_feed(transform.input_feed_id(), transform.input_format());
        let output_feed = writer.bind_feed(transform.output_feed_id());

        let transform = Arc::clone(transform);
        let writer = Arc::clone(writer);
        input_feed.on_data_buffered(move |data| {
            let processed = transform.process(data)?;
            if let Some(latest) = processed.latest_timestamp_nanos() {
                writer.set_duration_nanos(latest);
            }
            output_feed.enqueue_and_send(processed)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TelemetryData;
    use crate::session::{Lap, SessionRecord, SessionState};
    use crate::testing::{
        sample_format, single_sample, DoublingTransform, FailingTransform, RecordingTopic,
    };
    use crate::transport::TopicMessage;

    fn binder_with(transform: Arc<dyn TopicTransform>) -> (SessionBinder, Arc<RecordingTopic>) {
        let topic = RecordingTopic::new("enriched");
        let binder = SessionBinder::new(topic.clone(), "fmt-1", "cfg-1", transform);
        (binder, topic)
    }

    fn open_session(identifier: &str, duration: i64) -> TopicMessage {
        let mut session = SessionRecord::default();
        session.state = SessionState::Open;
        session.identifier = identifier.into();
        session.start_nanos = 1_000;
        session.duration_nanos = duration;
        TopicMessage::Session {
            stream_id: "s1".into(),
            session,
        }
    }

    #[test]
    fn output_session_mirrors_input_metadata() {
        let transform: Arc<dyn TopicTransform> = Arc::new(DoublingTransform::new("group", "p"));
        let (binder, topic) = binder_with(transform);

        let input = binder.bind_stream("s1").unwrap();
        input.dispatch(open_session("quali", 5_000)).unwrap();

        let sessions = topic.sessions();
        assert_eq!(sessions.len(), 1);
        let session = &sessions[0];
        assert_eq!(session.identifier, "quali_enriched");
        assert_eq!(session.state, SessionState::Open);
        assert_eq!(session.start_nanos, 1_000);
        assert_eq!(session.duration_nanos, 5_000);
    }

    #[test]
    fn dependencies_are_exactly_the_published_pair() {
        let transform: Arc<dyn TopicTransform> = Arc::new(DoublingTransform::new("group", "p"));
        let (binder, topic) = binder_with(transform);

        let input = binder.bind_stream("s1").unwrap();
        input.dispatch(open_session("quali", 0)).unwrap();

        let session = &topic.sessions()[0];
        assert_eq!(session.dependencies.len(), 2);
        assert_eq!(
            session.dependencies[&DependencyKind::DataFormat],
            "fmt-1".to_string()
        );
        assert_eq!(
            session.dependencies[&DependencyKind::Configuration],
            "cfg-1".to_string()
        );
    }

    #[test]
    fn buffers_route_through_the_transform() {
        let transform: Arc<dyn TopicTransform> = Arc::new(DoublingTransform::new("group", "p"));
        let (binder, topic) = binder_with(transform);

        let input = binder.bind_stream("s1").unwrap();
        input.dispatch(open_session("quali", 0)).unwrap();
        input
            .dispatch(TopicMessage::Data {
                stream_id: "s1".into(),
                feed_id: "default".into(),
                data: single_sample(&sample_format(&["p"]), 7_000, &[3.0]),
            })
            .unwrap();

        let buffers = topic.data_buffers();
        assert_eq!(buffers.len(), 1);
        assert_eq!(buffers[0].parameters[0].avg_values, vec![6.0]);
        assert_eq!(buffers[0].timestamps_nanos, vec![7_000]);
    }

    #[test]
    fn duration_tracks_processed_timestamps() {
        let transform: Arc<dyn TopicTransform> = Arc::new(DoublingTransform::new("group", "p"));
        let (binder, topic) = binder_with(transform);

        let input = binder.bind_stream("s1").unwrap();
        input.dispatch(open_session("quali", 0)).unwrap();
        input
            .dispatch(TopicMessage::Data {
                stream_id: "s1".into(),
                feed_id: "default".into(),
                data: single_sample(&sample_format(&["p"]), 9_000, &[1.0]),
            })
            .unwrap();
        // The next session update publishes a duration at least as large
        // as the latest processed timestamp.
        input.dispatch(open_session("quali", 2_000)).unwrap();

        let sessions = topic.sessions();
        assert_eq!(sessions.last().unwrap().duration_nanos, 9_000);
    }

    #[test]
    fn laps_are_mirrored_in_order() {
        let transform: Arc<dyn TopicTransform> = Arc::new(DoublingTransform::new("group", "p"));
        let (binder, topic) = binder_with(transform);

        let input = binder.bind_stream("s1").unwrap();
        input.dispatch(open_session("quali", 0)).unwrap();
        for n in 1..=3 {
            input
                .dispatch(TopicMessage::Lap {
                    stream_id: "s1".into(),
                    lap: Lap::new(format!("lap {n}")),
                })
                .unwrap();
        }

        let laps = topic.laps();
        assert_eq!(
            laps.iter().map(|l| l.content.as_str()).collect::<Vec<_>>(),
            ["lap 1", "lap 2", "lap 3"]
        );
    }

    #[test]
    fn transform_error_fails_only_this_binding() {
        let transform: Arc<dyn TopicTransform> = Arc::new(FailingTransform::new("group", "p"));
        let (binder, topic) = binder_with(transform);

        let input = binder.bind_stream("s1").unwrap();
        input.dispatch(open_session("quali", 0)).unwrap();
        let result = input.dispatch(TopicMessage::Data {
            stream_id: "s1".into(),
            feed_id: "default".into(),
            data: single_sample(&sample_format(&["p"]), 1_000, &[1.0]),
        });

        assert!(matches!(result, Err(StreamError::Transform(_))));
        assert!(input.is_failed());
        // The failed buffer was never forwarded.
        assert!(topic.data_buffers().is_empty());
    }

    #[test]
    fn identity_survives_byte_for_byte() {
        let transform: Arc<dyn TopicTransform> =
            Arc::new(crate::testing::IdentityTransform::new("group", &["a", "b"]));
        let (binder, topic) = binder_with(transform);

        let input = binder.bind_stream("s1").unwrap();
        input.dispatch(open_session("quali", 0)).unwrap();

        let mut original = TelemetryData::with_format(&sample_format(&["a", "b"]), 2, 123);
        original.timestamps_nanos = vec![10, 20];
        original.parameters[0].avg_values = vec![0.25, 0.5];
        original.parameters[1].avg_values = vec![1.5, 2.5];

        input
            .dispatch(TopicMessage::Data {
                stream_id: "s1".into(),
                feed_id: "default".into(),
                data: original.clone(),
            })
            .unwrap();

        assert_eq!(topic.data_buffers()[0], original);
    }
}
