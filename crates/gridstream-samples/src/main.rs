//! Gridstream sample programs.
//!
//! Demonstrates the telemetry streaming toolkit end to end over the
//! in-process transport: session generators, a printing reader, and
//! topic models run by the shared pipeline.
//!
//! ```bash
//! gridstream-samples sin-cos-model --steps 1000
//! gridstream-samples read --topic Data
//! ```
//!
//! Every command runs until it finishes its configured steps or Ctrl-C
//! fires; model commands then drain the pipeline before exiting.

mod bar;
mod generate;
mod models;
mod read;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use gridstream_core::dependency::{DependencyClient, MemoryDependencyClient};
use gridstream_core::memory::{MemoryBroker, MemoryStreamClient};
use gridstream_core::pipeline::{PipelineConfig, TopicPipeline};
use gridstream_core::transform::TopicTransform;

use generate::GeneratorConfig;
use models::{AbsModel, SinCosModel, VCar2Model};

/// Telemetry streaming sample programs.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log file, written alongside console output.
    #[arg(long, default_value = "gridstream-samples.log")]
    log_file: String,
}

/// Pacing shared by all generating commands.
#[derive(clap::Args, Debug, Clone, Copy)]
struct Pace {
    /// Samples to generate.
    #[arg(long, default_value_t = 500)]
    steps: u32,

    /// Sampling frequency in Hz.
    #[arg(long, default_value_t = 100.0)]
    frequency: f64,
}

impl Pace {
    fn config(self) -> GeneratorConfig {
        GeneratorConfig {
            steps: self.steps,
            frequency_hz: self.frequency,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a random-walk session and print it as ASCII bars.
    Read {
        /// Topic to read.
        #[arg(long, default_value = "Data")]
        topic: String,

        #[command(flatten)]
        pace: Pace,
    },

    /// Write a random-walk session.
    Write {
        /// Topic to write.
        #[arg(long, default_value = "Data")]
        topic: String,

        #[command(flatten)]
        pace: Pace,
    },

    /// Generate sin/cos sessions on one or more topics.
    SinCosGenerator {
        /// Topics to generate onto, comma-separated.
        #[arg(long, value_delimiter = ',', default_value = "SinCos")]
        topics: Vec<String>,

        #[command(flatten)]
        pace: Pace,
    },

    /// Run the model summing Sin(x) and Cos(x) into one parameter.
    SinCosModel {
        /// Input topic.
        #[arg(long, default_value = "SinCos")]
        input_topic: String,

        /// Output topic.
        #[arg(long, default_value = "SinPlusCos")]
        output_topic: String,

        #[command(flatten)]
        pace: Pace,
    },

    /// Run the model doubling vCar into vCar2.
    Vcar2Model {
        /// Input topic.
        #[arg(long, default_value = "vCar")]
        input_topic: String,

        /// Output topic.
        #[arg(long, default_value = "vCar2")]
        output_topic: String,

        #[command(flatten)]
        pace: Pace,
    },

    /// Run the model emitting absolute values of a signed signal.
    AbsModel {
        /// Input topic.
        #[arg(long, default_value = "Signal")]
        input_topic: String,

        /// Output topic.
        #[arg(long, default_value = "AbsSignal")]
        output_topic: String,

        #[command(flatten)]
        pace: Pace,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let file_appender = tracing_appender::rolling::never(".", &args.log_file);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .init();
    info!(log_file = %args.log_file, "logging configured");

    let cancel = CancellationToken::new();
    watch_ctrl_c(cancel.clone());

    match args.command {
        Command::Read { topic, pace } => run_read(&topic, pace, cancel).await,
        Command::Write { topic, pace } => run_write(&topic, pace, cancel).await,
        Command::SinCosGenerator { topics, pace } => {
            let harness = Harness::new();
            generate::sincos_sessions(
                &harness.client,
                &harness.dependencies,
                &topics,
                pace.config(),
                cancel,
            )
            .await?;
            Ok(())
        }
        Command::SinCosModel {
            input_topic,
            output_topic,
            pace,
        } => {
            let transform: Arc<dyn TopicTransform> = Arc::new(SinCosModel::new(pace.frequency));
            let input = input_topic.clone();
            run_model_demo(
                transform,
                &input_topic,
                &output_topic,
                (-2.0, 2.0),
                cancel,
                move |client, dependencies, cancel| async move {
                    generate::sincos_sessions(
                        &client,
                        &dependencies,
                        &[input],
                        pace.config(),
                        cancel,
                    )
                    .await
                },
            )
            .await
        }
        Command::Vcar2Model {
            input_topic,
            output_topic,
            pace,
        } => {
            let transform: Arc<dyn TopicTransform> = Arc::new(VCar2Model::new(pace.frequency));
            let input = input_topic.clone();
            run_model_demo(
                transform,
                &input_topic,
                &output_topic,
                (0.0, 2.0),
                cancel,
                move |client, dependencies, cancel| async move {
                    generate::random_walk_session(
                        &client,
                        &dependencies,
                        &input,
                        VCar2Model::INPUT_PARAMETER,
                        0.0,
                        1.0,
                        pace.config(),
                        cancel,
                    )
                    .await
                },
            )
            .await
        }
        Command::AbsModel {
            input_topic,
            output_topic,
            pace,
        } => {
            let transform: Arc<dyn TopicTransform> = Arc::new(AbsModel::new(pace.frequency));
            let input = input_topic.clone();
            run_model_demo(
                transform,
                &input_topic,
                &output_topic,
                (0.0, 1.0),
                cancel,
                move |client, dependencies, cancel| async move {
                    generate::random_walk_session(
                        &client,
                        &dependencies,
                        &input,
                        AbsModel::INPUT_PARAMETER,
                        -1.0,
                        1.0,
                        pace.config(),
                        cancel,
                    )
                    .await
                },
            )
            .await
        }
    }
}

/// Cancels the token when Ctrl-C fires.
fn watch_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            cancel.cancel();
        }
    });
}

/// One in-process broker plus its dependency service.
struct Harness {
    client: MemoryStreamClient,
    dependencies: Arc<dyn DependencyClient>,
}

impl Harness {
    fn new() -> Self {
        let broker = MemoryBroker::new();
        Self {
            client: broker.client(),
            dependencies: Arc::new(MemoryDependencyClient::new()),
        }
    }
}

async fn run_read(topic: &str, pace: Pace, cancel: CancellationToken) -> Result<()> {
    let harness = Harness::new();

    let format = gridstream_core::format::DataFormat::define_feed()
        .parameter("vCar:Chassis")
        .at_frequency(pace.frequency)
        .build_format();
    let mut reader = read::attach(&harness.client, topic, format, (0.0, 1.0)).await?;

    generate::random_walk_session(
        &harness.client,
        &harness.dependencies,
        topic,
        "vCar:Chassis",
        0.0,
        1.0,
        pace.config(),
        cancel,
    )
    .await?;

    reader.drain();
    reader.wait_until_stopped(Duration::from_secs(5)).await;
    Ok(())
}

async fn run_write(topic: &str, pace: Pace, cancel: CancellationToken) -> Result<()> {
    let harness = Harness::new();
    generate::random_walk_session(
        &harness.client,
        &harness.dependencies,
        topic,
        "vCar:Chassis",
        0.0,
        1.0,
        pace.config(),
        cancel,
    )
    .await?;
    Ok(())
}

/// Runs a model demo: the pipeline, a printing reader on the output
/// topic, and a generator feeding the input topic, all over one broker.
async fn run_model_demo<F, Fut>(
    transform: Arc<dyn TopicTransform>,
    input_topic: &str,
    output_topic: &str,
    reader_range: (f64, f64),
    cancel: CancellationToken,
    generate: F,
) -> Result<()>
where
    F: FnOnce(MemoryStreamClient, Arc<dyn DependencyClient>, CancellationToken) -> Fut,
    Fut: std::future::Future<Output = Result<(), gridstream_core::StreamError>>,
{
    let harness = Harness::new();

    let pipeline = TopicPipeline::new(
        Arc::new(harness.client.clone()),
        Arc::clone(&harness.dependencies),
        PipelineConfig::new(input_topic, output_topic),
        Arc::clone(&transform),
    );
    let pipeline_task = pipeline.spawn(cancel.clone());

    let mut reader = read::attach(
        &harness.client,
        output_topic,
        transform.output_format(),
        reader_range,
    )
    .await?;

    generate(
        harness.client.clone(),
        Arc::clone(&harness.dependencies),
        cancel.clone(),
    )
    .await?;

    // Let the model flush the tail of the session before draining.
    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();
    pipeline_task.await??;

    reader.drain();
    reader.wait_until_stopped(Duration::from_secs(5)).await;
    Ok(())
}
