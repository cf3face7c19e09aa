//! Telemetry buffers and parameter channels.
//!
//! A [`TelemetryData`] buffer holds an ordered run of timestamped samples
//! for one feed: a shared timestamp vector plus one value/status channel
//! per parameter. Timestamps are nanoseconds since the session epoch.
//!
//! Buffers are handed to transforms by value; a transform may mutate the
//! channels in place and return the same buffer for sending.

use crate::format::DataFormat;

/// Per-sample status flag for a parameter channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataStatus {
    /// No sample was captured at this timestamp.
    #[default]
    Missing,

    /// A valid sample.
    Sample,
}

/// One parameter channel within a buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterData {
    /// Parameter identifier, e.g. `"vCar:Chassis"`.
    pub identifier: String,

    /// Aggregate value per sample, aligned with the buffer's timestamps.
    pub avg_values: Vec<f64>,

    /// Status flag per sample, aligned with the buffer's timestamps.
    pub statuses: Vec<DataStatus>,
}

impl ParameterData {
    /// Creates a channel of `samples` missing values.
    #[must_use]
    pub fn new(identifier: impl Into<String>, samples: usize) -> Self {
        Self {
            identifier: identifier.into(),
            avg_values: vec![0.0; samples],
            statuses: vec![DataStatus::Missing; samples],
        }
    }
}

/// An ordered run of timestamped samples across one feed's parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryData {
    /// Session epoch, nanoseconds since the Unix epoch. Timestamps in
    /// this buffer are relative to it.
    pub epoch_nanos: i64,

    /// Sample timestamps, nanoseconds since `epoch_nanos`, ascending.
    pub timestamps_nanos: Vec<i64>,

    /// One channel per parameter declared by the feed's data format.
    pub parameters: Vec<ParameterData>,
}

impl TelemetryData {
    /// Creates an empty buffer of `samples` slots shaped by `format`.
    ///
    /// All timestamps start at zero and all channels start missing;
    /// writers fill them in before sending.
    #[must_use]
    pub fn with_format(format: &DataFormat, samples: usize, epoch_nanos: i64) -> Self {
        Self {
            epoch_nanos,
            timestamps_nanos: vec![0; samples],
            parameters: format
                .parameters
                .iter()
                .map(|id| ParameterData::new(id.clone(), samples))
                .collect(),
        }
    }

    /// Number of samples in the buffer.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.timestamps_nanos.len()
    }

    /// Looks up a channel by parameter identifier.
    #[must_use]
    pub fn parameter(&self, identifier: &str) -> Option<&ParameterData> {
        self.parameters.iter().find(|p| p.identifier == identifier)
    }

    /// Mutable lookup of a channel by parameter identifier.
    pub fn parameter_mut(&mut self, identifier: &str) -> Option<&mut ParameterData> {
        self.parameters
            .iter_mut()
            .find(|p| p.identifier == identifier)
    }

    /// The latest sample timestamp, if the buffer is non-empty.
    #[must_use]
    pub fn latest_timestamp_nanos(&self) -> Option<i64> {
        self.timestamps_nanos.iter().copied().max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_param_format() -> DataFormat {
        DataFormat::define_feed()
            .parameter("Sin(x)")
            .parameter("Cos(x)")
            .at_frequency(100.0)
            .build_format()
    }

    #[test]
    fn with_format_shapes_channels() {
        let data = TelemetryData::with_format(&two_param_format(), 4, 1_000);
        assert_eq!(data.sample_count(), 4);
        assert_eq!(data.parameters.len(), 2);
        assert_eq!(data.parameters[0].identifier, "Sin(x)");
        assert!(data
            .parameters
            .iter()
            .all(|p| p.statuses.iter().all(|s| *s == DataStatus::Missing)));
    }

    #[test]
    fn parameter_lookup() {
        let mut data = TelemetryData::with_format(&two_param_format(), 1, 0);
        assert!(data.parameter("Sin(x)").is_some());
        assert!(data.parameter("vCar").is_none());

        let cos = data.parameter_mut("Cos(x)").unwrap();
        cos.avg_values[0] = 0.5;
        cos.statuses[0] = DataStatus::Sample;
        assert_eq!(data.parameters[1].avg_values[0], 0.5);
    }

    #[test]
    fn latest_timestamp() {
        let mut data = TelemetryData::with_format(&two_param_format(), 3, 0);
        assert_eq!(data.latest_timestamp_nanos(), Some(0));
        data.timestamps_nanos = vec![10, 30, 20];
        assert_eq!(data.latest_timestamp_nanos(), Some(30));

        let empty = TelemetryData::with_format(&two_param_format(), 0, 0);
        assert_eq!(empty.latest_timestamp_nanos(), None);
    }
}
