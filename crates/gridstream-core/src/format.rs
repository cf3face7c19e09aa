//! Data format descriptors and the feed format builder.
//!
//! A [`DataFormat`] names the parameters carried by one feed and their
//! sampling frequency. Formats are published to the dependency service
//! once per pipeline run and referenced by id thereafter.

use serde::{Deserialize, Serialize};

/// Sampling frequency used when a feed builder doesn't specify one.
pub const DEFAULT_FREQUENCY_HZ: f64 = 100.0;

/// Describes the parameters and sampling frequency of one feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFormat {
    /// Parameter identifiers, in channel order.
    pub parameters: Vec<String>,

    /// Sampling frequency in Hz.
    pub frequency_hz: f64,
}

impl DataFormat {
    /// Starts building a feed format.
    ///
    /// ```
    /// use gridstream_core::format::DataFormat;
    ///
    /// let format = DataFormat::define_feed()
    ///     .parameter("vCar:Chassis")
    ///     .at_frequency(100.0)
    ///     .build_format();
    /// assert_eq!(format.parameters, vec!["vCar:Chassis"]);
    /// ```
    #[must_use]
    pub fn define_feed() -> FeedFormatBuilder {
        FeedFormatBuilder {
            parameters: Vec::new(),
            frequency_hz: DEFAULT_FREQUENCY_HZ,
        }
    }

    /// Period between samples at this format's frequency, in nanoseconds.
    #[must_use]
    pub fn sample_interval_nanos(&self) -> i64 {
        #[allow(clippy::cast_possible_truncation)]
        let interval = (1_000_000_000.0 / self.frequency_hz) as i64;
        interval
    }
}

/// Builder for [`DataFormat`].
#[derive(Debug, Clone)]
pub struct FeedFormatBuilder {
    parameters: Vec<String>,
    frequency_hz: f64,
}

impl FeedFormatBuilder {
    /// Appends one parameter identifier.
    #[must_use]
    pub fn parameter(mut self, identifier: impl Into<String>) -> Self {
        self.parameters.push(identifier.into());
        self
    }

    /// Appends several parameter identifiers.
    #[must_use]
    pub fn parameters<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters.extend(identifiers.into_iter().map(Into::into));
        self
    }

    /// Sets the sampling frequency in Hz.
    #[must_use]
    pub fn at_frequency(mut self, frequency_hz: f64) -> Self {
        self.frequency_hz = frequency_hz;
        self
    }

    /// Finishes the format.
    #[must_use]
    pub fn build_format(self) -> DataFormat {
        DataFormat {
            parameters: self.parameters,
            frequency_hz: self.frequency_hz,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_parameters() {
        let format = DataFormat::define_feed()
            .parameters(["Sin(x)", "Cos(x)"])
            .at_frequency(100.0)
            .build_format();
        assert_eq!(format.parameters, vec!["Sin(x)", "Cos(x)"]);
        assert_eq!(format.frequency_hz, 100.0);
    }

    #[test]
    fn default_frequency_applies() {
        let format = DataFormat::define_feed().parameter("p").build_format();
        assert_eq!(format.frequency_hz, DEFAULT_FREQUENCY_HZ);
    }

    #[test]
    fn sample_interval() {
        let format = DataFormat::define_feed()
            .parameter("p")
            .at_frequency(100.0)
            .build_format();
        assert_eq!(format.sample_interval_nanos(), 10_000_000);
    }

    #[test]
    fn serializes_stably() {
        let format = DataFormat::define_feed()
            .parameter("p")
            .at_frequency(50.0)
            .build_format();
        let a = serde_json::to_string(&format).unwrap();
        let b = serde_json::to_string(&format.clone()).unwrap();
        assert_eq!(a, b);
    }
}
