//! Sample topic transforms.
//!
//! Each model implements [`TopicTransform`] and is run by the shared
//! [`gridstream_core::pipeline::TopicPipeline`]; the pipeline owns all
//! session and feed plumbing, the models only describe formats and
//! process buffers.

use gridstream_core::data::TelemetryData;
use gridstream_core::display::{DisplayConfiguration, ParameterDisplay};
use gridstream_core::error::StreamError;
use gridstream_core::format::DataFormat;
use gridstream_core::transform::TopicTransform;

/// Sums the `Sin(x)` and `Cos(x)` channels into one output parameter.
pub struct SinCosModel {
    frequency_hz: f64,
}

impl SinCosModel {
    /// Output parameter identifier.
    pub const OUTPUT_PARAMETER: &'static str = "Sin(x)+Cos(x)";

    /// Creates the model at the given sampling frequency.
    pub fn new(frequency_hz: f64) -> Self {
        Self { frequency_hz }
    }
}

impl TopicTransform for SinCosModel {
    fn consumer_group(&self) -> &str {
        "sincos-model"
    }

    fn input_format(&self) -> DataFormat {
        DataFormat::define_feed()
            .parameters(["Sin(x)", "Cos(x)"])
            .at_frequency(self.frequency_hz)
            .build_format()
    }

    fn output_format(&self) -> DataFormat {
        DataFormat::define_feed()
            .parameter(Self::OUTPUT_PARAMETER)
            .at_frequency(self.frequency_hz)
            .build_format()
    }

    fn configuration(&self) -> DisplayConfiguration {
        DisplayConfiguration::builder()
            .parameter(
                "app",
                "group",
                Self::OUTPUT_PARAMETER,
                ParameterDisplay::new(Self::OUTPUT_PARAMETER)
                    .with_physical_range(-2.0, 2.0),
            )
            .build()
    }

    fn process(&self, data: TelemetryData) -> Result<TelemetryData, StreamError> {
        let sin = data
            .parameter("Sin(x)")
            .ok_or_else(|| StreamError::Transform("missing Sin(x) channel".into()))?;
        let cos = data
            .parameter("Cos(x)")
            .ok_or_else(|| StreamError::Transform("missing Cos(x) channel".into()))?;

        let mut out =
            TelemetryData::with_format(&self.output_format(), data.sample_count(), data.epoch_nanos);
        out.timestamps_nanos.clone_from(&data.timestamps_nanos);
        for i in 0..data.sample_count() {
            out.parameters[0].avg_values[i] = sin.avg_values[i] + cos.avg_values[i];
            out.parameters[0].statuses[i] = sin.statuses[i];
        }
        Ok(out)
    }
}

/// Doubles the `vCar:Chassis` channel in place.
pub struct VCar2Model {
    frequency_hz: f64,
}

impl VCar2Model {
    /// Input parameter identifier.
    pub const INPUT_PARAMETER: &'static str = "vCar:Chassis";

    /// Output parameter identifier.
    pub const OUTPUT_PARAMETER: &'static str = "vCar2:Chassis";

    /// Creates the model at the given sampling frequency.
    pub fn new(frequency_hz: f64) -> Self {
        Self { frequency_hz }
    }
}

impl TopicTransform for VCar2Model {
    fn consumer_group(&self) -> &str {
        "vcar2-model"
    }

    fn input_format(&self) -> DataFormat {
        DataFormat::define_feed()
            .parameter(Self::INPUT_PARAMETER)
            .at_frequency(self.frequency_hz)
            .build_format()
    }

    fn output_format(&self) -> DataFormat {
        DataFormat::define_feed()
            .parameter(Self::OUTPUT_PARAMETER)
            .at_frequency(self.frequency_hz)
            .build_format()
    }

    fn configuration(&self) -> DisplayConfiguration {
        DisplayConfiguration::builder()
            .parameter(
                "app",
                "group",
                Self::OUTPUT_PARAMETER,
                ParameterDisplay::new("vCar2")
                    .with_units("kmh")
                    .with_description("Double speed!"),
            )
            .build()
    }

    fn process(&self, mut data: TelemetryData) -> Result<TelemetryData, StreamError> {
        let vcar = data
            .parameter_mut(Self::INPUT_PARAMETER)
            .ok_or_else(|| StreamError::Transform("missing vCar:Chassis channel".into()))?;

        // Buffers can be modified inline and sent on as-is.
        vcar.identifier = Self::OUTPUT_PARAMETER.to_string();
        for value in &mut vcar.avg_values {
            *value *= 2.0;
        }
        Ok(data)
    }
}

/// Replaces a signal with its absolute value in place.
pub struct AbsModel {
    frequency_hz: f64,
}

impl AbsModel {
    /// Input parameter identifier.
    pub const INPUT_PARAMETER: &'static str = "Signal";

    /// Output parameter identifier.
    pub const OUTPUT_PARAMETER: &'static str = "Abs(Signal)";

    /// Creates the model at the given sampling frequency.
    pub fn new(frequency_hz: f64) -> Self {
        Self { frequency_hz }
    }
}

impl TopicTransform for AbsModel {
    fn consumer_group(&self) -> &str {
        "abs-model"
    }

    fn input_format(&self) -> DataFormat {
        DataFormat::define_feed()
            .parameter(Self::INPUT_PARAMETER)
            .at_frequency(self.frequency_hz)
            .build_format()
    }

    fn output_format(&self) -> DataFormat {
        DataFormat::define_feed()
            .parameter(Self::OUTPUT_PARAMETER)
            .at_frequency(self.frequency_hz)
            .build_format()
    }

    fn configuration(&self) -> DisplayConfiguration {
        DisplayConfiguration::builder()
            .parameter(
                "app",
                "group",
                Self::OUTPUT_PARAMETER,
                ParameterDisplay::new(Self::OUTPUT_PARAMETER).with_physical_range(0.0, 1.0),
            )
            .build()
    }

    fn process(&self, mut data: TelemetryData) -> Result<TelemetryData, StreamError> {
        let signal = data
            .parameter_mut(Self::INPUT_PARAMETER)
            .ok_or_else(|| StreamError::Transform("missing Signal channel".into()))?;

        signal.identifier = Self::OUTPUT_PARAMETER.to_string();
        for value in &mut signal.avg_values {
            *value = value.abs();
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridstream_core::data::DataStatus;

    fn buffer_for(format: &DataFormat, values: &[&[f64]]) -> TelemetryData {
        let samples = values[0].len();
        let mut data = TelemetryData::with_format(format, samples, 0);
        for (i, ts) in data.timestamps_nanos.iter_mut().enumerate() {
            *ts = (i as i64 + 1) * 10_000_000;
        }
        for (parameter, channel) in data.parameters.iter_mut().zip(values) {
            parameter.avg_values = channel.to_vec();
            parameter.statuses = vec![DataStatus::Sample; samples];
        }
        data
    }

    #[test]
    fn sincos_sums_channels() {
        let model = SinCosModel::new(100.0);
        let data = buffer_for(&model.input_format(), &[&[0.5, -0.5], &[0.25, 0.75]]);
        let out = model.process(data).unwrap();

        assert_eq!(out.parameters.len(), 1);
        assert_eq!(out.parameters[0].identifier, SinCosModel::OUTPUT_PARAMETER);
        assert_eq!(out.parameters[0].avg_values, vec![0.75, 0.25]);
        assert_eq!(out.timestamps_nanos, vec![10_000_000, 20_000_000]);
    }

    #[test]
    fn sincos_rejects_wrong_channels() {
        let model = SinCosModel::new(100.0);
        let wrong = buffer_for(
            &DataFormat::define_feed().parameter("vCar").build_format(),
            &[&[1.0]],
        );
        assert!(matches!(
            model.process(wrong),
            Err(StreamError::Transform(_))
        ));
    }

    #[test]
    fn vcar2_doubles_in_place() {
        let model = VCar2Model::new(100.0);
        let data = buffer_for(&model.input_format(), &[&[100.0, 150.0]]);
        let out = model.process(data).unwrap();

        assert_eq!(out.parameters[0].identifier, VCar2Model::OUTPUT_PARAMETER);
        assert_eq!(out.parameters[0].avg_values, vec![200.0, 300.0]);
    }

    #[test]
    fn abs_flips_negatives() {
        let model = AbsModel::new(100.0);
        let data = buffer_for(&model.input_format(), &[&[-0.5, 0.25, -1.0]]);
        let out = model.process(data).unwrap();

        assert_eq!(out.parameters[0].avg_values, vec![0.5, 0.25, 1.0]);
    }
}
