//! Sample session generators.
//!
//! Writers that declare a session on an output topic (dependencies,
//! state, start, identifier), emit paced telemetry with the session
//! duration tracking the latest timestamp, and close the session when
//! done or cancelled.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::info;

use gridstream_core::data::{DataStatus, TelemetryData};
use gridstream_core::dependency::{DependencyClient, DependencyKind};
use gridstream_core::display::{DisplayConfiguration, ParameterDisplay};
use gridstream_core::error::StreamError;
use gridstream_core::format::DataFormat;
use gridstream_core::memory::MemoryStreamClient;
use gridstream_core::output::SessionWriter;
use gridstream_core::session::SessionState;
use gridstream_core::time::{nanos_to_millis, wall_clock_nanos};
use gridstream_core::transport::StreamClient;

/// Pacing of a generated session.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorConfig {
    /// Number of samples to emit.
    pub steps: u32,

    /// Sampling frequency in Hz.
    pub frequency_hz: f64,
}

/// A bounded random walk, reflecting off its range limits.
pub struct RandomRangeWalker {
    min: f64,
    max: f64,
    value: f64,
    rng: StdRng,
}

impl RandomRangeWalker {
    /// Creates a walker over `[min, max]`, starting at the midpoint.
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            value: (min + max) / 2.0,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Advances the walk one step and returns the new value.
    pub fn next_value(&mut self) -> f64 {
        let mut change = (self.rng.random::<f64>() - 0.5) / 4.0;
        if self.value + change < self.min || self.value + change > self.max {
            change = -change;
        }
        self.value += change;
        self.value
    }
}

/// Generates a sin/cos session on each of `topics` concurrently.
///
/// # Errors
///
/// Fails if descriptors cannot be published or a topic cannot be opened.
pub async fn sincos_sessions(
    client: &MemoryStreamClient,
    dependencies: &Arc<dyn DependencyClient>,
    topics: &[String],
    config: GeneratorConfig,
    cancel: CancellationToken,
) -> Result<(), StreamError> {
    let mut tasks = Vec::new();
    for topic in topics {
        tasks.push(tokio::spawn(sincos_session(
            client.clone(),
            Arc::clone(dependencies),
            topic.clone(),
            config,
            cancel.clone(),
        )));
    }
    for task in tasks {
        task.await
            .map_err(|e| StreamError::Internal(format!("generator task panicked: {e}")))??;
    }
    Ok(())
}

async fn sincos_session(
    client: MemoryStreamClient,
    dependencies: Arc<dyn DependencyClient>,
    topic: String,
    config: GeneratorConfig,
    cancel: CancellationToken,
) -> Result<(), StreamError> {
    let format = DataFormat::define_feed()
        .parameters(["Sin(x)", "Cos(x)"])
        .at_frequency(config.frequency_hz)
        .build_format();
    let display = DisplayConfiguration::builder()
        .parameter(
            "app",
            "group",
            "Sin(x)",
            ParameterDisplay::new("Sin(x)").with_physical_range(-1.0, 1.0),
        )
        .parameter(
            "app",
            "group",
            "Cos(x)",
            ParameterDisplay::new("Cos(x)").with_physical_range(-1.0, 1.0),
        )
        .build();

    let session = GeneratedSession::declare(&client, &dependencies, &topic, &format, &display, "sincos").await?;

    let mut emit = |step: u32, data: &mut TelemetryData| {
        let t = f64::from(step);
        data.parameters[0].avg_values[0] = (t / 50.0).sin();
        data.parameters[1].avg_values[0] = (t / 100.0).cos();
    };
    session.pace(&format, config, cancel, &mut emit).await
}

/// Generates a random-walk session for one parameter on `topic`.
///
/// # Errors
///
/// Fails if descriptors cannot be published or the topic cannot be
/// opened.
pub async fn random_walk_session(
    client: &MemoryStreamClient,
    dependencies: &Arc<dyn DependencyClient>,
    topic: &str,
    parameter: &str,
    min: f64,
    max: f64,
    config: GeneratorConfig,
    cancel: CancellationToken,
) -> Result<(), StreamError> {
    let format = DataFormat::define_feed()
        .parameter(parameter)
        .at_frequency(config.frequency_hz)
        .build_format();
    let display = DisplayConfiguration::builder()
        .parameter(
            "app",
            "group",
            parameter,
            ParameterDisplay::new(parameter).with_physical_range(min, max),
        )
        .build();

    let session =
        GeneratedSession::declare(client, dependencies, topic, &format, &display, "random_walk")
            .await?;

    let mut walker = RandomRangeWalker::new(min, max);
    let mut emit = |_step: u32, data: &mut TelemetryData| {
        data.parameters[0].avg_values[0] = walker.next_value();
    };
    session.pace(&format, config, cancel, &mut emit).await
}

/// A declared output session ready to emit paced samples.
struct GeneratedSession {
    writer: SessionWriter,
    topic: String,
}

impl GeneratedSession {
    /// Publishes the descriptors and announces an open session.
    async fn declare(
        client: &MemoryStreamClient,
        dependencies: &Arc<dyn DependencyClient>,
        topic: &str,
        format: &DataFormat,
        display: &DisplayConfiguration,
        name: &str,
    ) -> Result<Self, StreamError> {
        let format_id = dependencies.put_data_format(format).await?;
        let config_id = dependencies.put_configuration(display).await?;

        let out = client.open_output_topic(topic).await?;
        let start = wall_clock_nanos();
        let stream_id = format!("{name}-{}", nanos_to_millis(start));

        let writer = SessionWriter::new(out, stream_id, format_id.clone());
        writer.add_dependency(DependencyKind::DataFormat, format_id);
        writer.add_dependency(DependencyKind::Configuration, config_id);
        writer.set_state(SessionState::Open);
        writer.set_start_nanos(start);
        writer.set_identifier(format!("{name}_{}", nanos_to_millis(start)));
        writer.send_session()?;
        info!(topic, stream_id = writer.stream_id(), "session opened");

        Ok(Self {
            writer,
            topic: topic.to_string(),
        })
    }

    /// Emits one sample per step at the configured frequency, then
    /// closes the session. `fill` writes the sample values for a step.
    async fn pace(
        self,
        format: &DataFormat,
        config: GeneratorConfig,
        cancel: CancellationToken,
        fill: &mut (dyn FnMut(u32, &mut TelemetryData) + Send),
    ) -> Result<(), StreamError> {
        let interval = format.sample_interval_nanos();
        let feed = self.writer.bind_feed("default");
        let mut data = TelemetryData::with_format(format, 1, self.writer.session().start_nanos);
        for parameter in &mut data.parameters {
            parameter.statuses[0] = DataStatus::Sample;
        }

        for step in 1..=config.steps {
            tokio::time::sleep(std::time::Duration::from_nanos(
                u64::try_from(interval).unwrap_or(0),
            ))
            .await;
            if cancel.is_cancelled() {
                break;
            }

            // One data point per buffer for simplicity; chunked sends
            // work the same way.
            let elapsed = i64::from(step) * interval;
            data.timestamps_nanos[0] = elapsed;
            fill(step, &mut data);

            self.writer.set_duration_nanos(elapsed);
            feed.enqueue_and_send(data.clone())?;

            if step % 100 == 0 {
                info!(topic = %self.topic, step, "generating");
            }
        }

        self.writer.set_state(SessionState::Closed);
        self.writer.send_session()?;
        info!(topic = %self.topic, "session closed");
        Ok(())
    }
}
