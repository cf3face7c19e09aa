//! Test fixtures.
//!
//! Shared helpers for exercising the pipeline core: a recording output
//! topic, buffer builders, and a handful of canned transforms.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::data::{DataStatus, TelemetryData};
use crate::display::{DisplayConfiguration, ParameterDisplay};
use crate::error::StreamError;
use crate::format::DataFormat;
use crate::session::{Lap, SessionRecord};
use crate::transform::TopicTransform;
use crate::transport::{OutputTopic, TopicMessage};

/// An output topic that records every message for inspection.
pub struct RecordingTopic {
    name: String,
    messages: Mutex<Vec<TopicMessage>>,
}

impl RecordingTopic {
    /// Creates a recording topic named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            messages: Mutex::new(Vec::new()),
        })
    }

    /// All recorded messages, in send order.
    #[must_use]
    pub fn messages(&self) -> Vec<TopicMessage> {
        self.messages.lock().clone()
    }

    /// The session snapshots sent so far, in order.
    #[must_use]
    pub fn sessions(&self) -> Vec<SessionRecord> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                TopicMessage::Session { session, .. } => Some(session),
                _ => None,
            })
            .collect()
    }

    /// The laps sent so far, in order.
    #[must_use]
    pub fn laps(&self) -> Vec<Lap> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                TopicMessage::Lap { lap, .. } => Some(lap),
                _ => None,
            })
            .collect()
    }

    /// The data buffers sent so far, in order.
    #[must_use]
    pub fn data_buffers(&self) -> Vec<TelemetryData> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                TopicMessage::Data { data, .. } => Some(data),
                _ => None,
            })
            .collect()
    }
}

impl OutputTopic for RecordingTopic {
    fn topic_name(&self) -> &str {
        &self.name
    }

    fn send(&self, message: TopicMessage) -> Result<(), StreamError> {
        self.messages.lock().push(message);
        Ok(())
    }
}

/// Builds a format with the given parameters at 100 Hz.
#[must_use]
pub fn sample_format(parameters: &[&str]) -> DataFormat {
    DataFormat::define_feed()
        .parameters(parameters.iter().copied())
        .at_frequency(100.0)
        .build_format()
}

/// Builds a one-sample buffer with the given timestamp and one value per
/// parameter of `format`.
///
/// # Panics
///
/// Panics if `values` doesn't match the format's parameter count.
#[must_use]
pub fn single_sample(format: &DataFormat, timestamp_nanos: i64, values: &[f64]) -> TelemetryData {
    assert_eq!(values.len(), format.parameters.len());
    let mut data = TelemetryData::with_format(format, 1, 0);
    data.timestamps_nanos[0] = timestamp_nanos;
    for (parameter, value) in data.parameters.iter_mut().zip(values) {
        parameter.avg_values[0] = *value;
        parameter.statuses[0] = DataStatus::Sample;
    }
    data
}

fn grouped_configuration(parameters: &[String]) -> DisplayConfiguration {
    let mut builder = DisplayConfiguration::builder();
    for parameter in parameters {
        builder = builder.parameter("app", "group", parameter, ParameterDisplay::new(parameter));
    }
    builder.build()
}

/// Returns its input unchanged.
pub struct IdentityTransform {
    consumer_group: String,
    parameters: Vec<String>,
}

impl IdentityTransform {
    /// Creates an identity transform over the given parameters.
    #[must_use]
    pub fn new(consumer_group: impl Into<String>, parameters: &[&str]) -> Self {
        Self {
            consumer_group: consumer_group.into(),
            parameters: parameters.iter().map(ToString::to_string).collect(),
        }
    }
}

impl TopicTransform for IdentityTransform {
    fn consumer_group(&self) -> &str {
        &self.consumer_group
    }

    fn input_format(&self) -> DataFormat {
        sample_format(&self.parameters.iter().map(String::as_str).collect::<Vec<_>>())
    }

    fn output_format(&self) -> DataFormat {
        self.input_format()
    }

    fn configuration(&self) -> DisplayConfiguration {
        grouped_configuration(&self.parameters)
    }

    fn process(&self, data: TelemetryData) -> Result<TelemetryData, StreamError> {
        Ok(data)
    }
}

/// Doubles every value of a single-parameter feed in place.
pub struct DoublingTransform {
    consumer_group: String,
    parameter: String,
}

impl DoublingTransform {
    /// Creates a doubling transform over `parameter`.
    #[must_use]
    pub fn new(consumer_group: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            consumer_group: consumer_group.into(),
            parameter: parameter.into(),
        }
    }
}

impl TopicTransform for DoublingTransform {
    fn consumer_group(&self) -> &str {
        &self.consumer_group
    }

    fn input_format(&self) -> DataFormat {
        sample_format(&[&self.parameter])
    }

    fn output_format(&self) -> DataFormat {
        self.input_format()
    }

    fn configuration(&self) -> DisplayConfiguration {
        grouped_configuration(std::slice::from_ref(&self.parameter))
    }

    fn process(&self, mut data: TelemetryData) -> Result<TelemetryData, StreamError> {
        for parameter in &mut data.parameters {
            for value in &mut parameter.avg_values {
                *value *= 2.0;
            }
        }
        Ok(data)
    }
}

/// Fails every buffer.
pub struct FailingTransform {
    consumer_group: String,
    parameter: String,
}

impl FailingTransform {
    /// Creates a transform whose `process` always errors.
    #[must_use]
    pub fn new(consumer_group: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            consumer_group: consumer_group.into(),
            parameter: parameter.into(),
        }
    }
}

impl TopicTransform for FailingTransform {
    fn consumer_group(&self) -> &str {
        &self.consumer_group
    }

    fn input_format(&self) -> DataFormat {
        sample_format(&[&self.parameter])
    }

    fn output_format(&self) -> DataFormat {
        self.input_format()
    }

    fn configuration(&self) -> DisplayConfiguration {
        grouped_configuration(std::slice::from_ref(&self.parameter))
    }

    fn process(&self, _data: TelemetryData) -> Result<TelemetryData, StreamError> {
        Err(StreamError::Transform("synthetic failure".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_sample_marks_values_present() {
        let format = sample_format(&["a", "b"]);
        let data = single_sample(&format, 42, &[1.0, 2.0]);
        assert_eq!(data.timestamps_nanos, vec![42]);
        assert_eq!(data.parameters[1].avg_values, vec![2.0]);
        assert_eq!(data.parameters[0].statuses, vec![DataStatus::Sample]);
    }

    #[test]
    fn doubling_transform_doubles() {
        let transform = DoublingTransform::new("group", "p");
        let data = single_sample(&transform.input_format(), 1, &[2.5]);
        let out = transform.process(data).unwrap();
        assert_eq!(out.parameters[0].avg_values, vec![5.0]);
    }

    #[test]
    fn recording_topic_partitions_by_kind() {
        let topic = RecordingTopic::new("out");
        topic
            .send(TopicMessage::Lap {
                stream_id: "s".into(),
                lap: Lap::new("lap 1"),
            })
            .unwrap();
        assert_eq!(topic.laps().len(), 1);
        assert!(topic.sessions().is_empty());
        assert!(topic.data_buffers().is_empty());
    }
}
