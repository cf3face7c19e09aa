//! The topic-modeling pipeline orchestrator.
//!
//! A [`TopicPipeline`] composes a transport client, a dependency client,
//! and a [`TopicTransform`] into a running model: descriptors are
//! published once, streams on the input topic are bound as they appear,
//! and cancellation triggers a cooperative drain bounded by the
//! transform's drain timeout.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::binder::SessionBinder;
use crate::dependency::DependencyClient;
use crate::error::StreamError;
use crate::transform::TopicTransform;
use crate::transport::{StreamClient, StreamInputFactory};

/// Topics a pipeline run operates on.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Topic streams are discovered on.
    pub input_topic: String,

    /// Topic transformed sessions are produced to.
    pub output_topic: String,
}

impl PipelineConfig {
    /// Creates a config.
    #[must_use]
    pub fn new(input_topic: impl Into<String>, output_topic: impl Into<String>) -> Self {
        Self {
            input_topic: input_topic.into(),
            output_topic: output_topic.into(),
        }
    }
}

/// Orchestrates one topic model over a transport.
pub struct TopicPipeline {
    client: Arc<dyn StreamClient>,
    dependencies: Arc<dyn DependencyClient>,
    config: PipelineConfig,
    transform: Arc<dyn TopicTransform>,
}

impl TopicPipeline {
    /// Creates a pipeline.
    ///
    /// All collaborators are passed in explicitly; nothing is looked up
    /// from ambient state.
    #[must_use]
    pub fn new(
        client: Arc<dyn StreamClient>,
        dependencies: Arc<dyn DependencyClient>,
        config: PipelineConfig,
        transform: Arc<dyn TopicTransform>,
    ) -> Self {
        Self {
            client,
            dependencies,
            config,
            transform,
        }
    }

    /// Runs the pipeline until `cancel` fires, then drains and stops.
    ///
    /// In order: publish the output format and the display configuration
    /// (exactly once each, however many streams follow), open the output
    /// topic, subscribe to the input topic with a per-stream binding
    /// factory, suspend until cancellation, drain, and wait for the stop
    /// bounded by the transform's drain timeout. A drain timeout is
    /// reported but not an error. Teardown releases the subscription,
    /// then the output topic; the client handle is the caller's and must
    /// outlive both.
    ///
    /// # Errors
    ///
    /// Publishing, opening the output topic, and subscribing are startup
    /// steps; any failure there aborts the run, releasing whatever had
    /// already started.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), StreamError> {
        let data_format_id = self
            .dependencies
            .put_data_format(&self.transform.output_format())
            .await?;
        let config_id = self
            .dependencies
            .put_configuration(&self.transform.configuration())
            .await?;
        info!(%data_format_id, %config_id, "pipeline descriptors published");

        let output_topic = self.client.open_output_topic(&self.config.output_topic).await?;

        let binder = Arc::new(SessionBinder::new(
            Arc::clone(&output_topic),
            data_format_id,
            config_id,
            Arc::clone(&self.transform),
        ));
        let factory: StreamInputFactory =
            Arc::new(move |stream_id| binder.bind_stream(stream_id));

        let mut subscription = self
            .client
            .stream_topic(
                &self.config.input_topic,
                self.transform.consumer_group(),
                factory,
            )
            .await?;
        info!(
            input_topic = %self.config.input_topic,
            output_topic = %self.config.output_topic,
            consumer_group = %self.transform.consumer_group(),
            "pipeline running"
        );

        cancel.cancelled().await;
        info!(input_topic = %self.config.input_topic, "cancellation received, draining");

        subscription.drain();
        let drain_timeout = self.transform.drain_timeout();
        if !subscription.wait_until_stopped(drain_timeout).await {
            warn!(?drain_timeout, "drain timed out, remaining bindings stopped");
        }

        // Subscription before topic: the transport must outlive any
        // handle it created.
        drop(subscription);
        drop(output_topic);
        Ok(())
    }

    /// Spawns [`TopicPipeline::run`] on a background task.
    #[must_use]
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<Result<(), StreamError>> {
        tokio::spawn(self.run(cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::MemoryDependencyClient;
    use crate::display::DisplayConfiguration;
    use crate::format::DataFormat;
    use crate::memory::MemoryBroker;
    use crate::output::SessionWriter;
    use crate::session::SessionState;
    use crate::testing::{sample_format, single_sample, DoublingTransform};
    use crate::time::wall_clock_nanos;
    use async_trait::async_trait;
    use std::time::Duration;

    async fn write_stream(broker: &Arc<MemoryBroker>, topic: &str, stream_id: &str) {
        let client = broker.client();
        let out = client.open_output_topic(topic).await.unwrap();
        let writer = SessionWriter::new(out, stream_id, "fmt-in");
        writer.set_state(SessionState::Open);
        writer.set_start_nanos(wall_clock_nanos());
        writer.set_identifier(stream_id.to_string());
        writer.send_session().unwrap();

        let feed = writer.bind_feed("default");
        feed.enqueue_and_send(single_sample(&sample_format(&["p"]), 1_000, &[1.0]))
            .unwrap();

        writer.set_state(SessionState::Closed);
        writer.send_session().unwrap();
    }

    #[tokio::test]
    async fn descriptors_publish_once_for_many_streams() {
        let broker = MemoryBroker::new();
        let dependencies = Arc::new(MemoryDependencyClient::new());

        let pipeline = TopicPipeline::new(
            Arc::new(broker.client()),
            Arc::clone(&dependencies) as Arc<dyn DependencyClient>,
            PipelineConfig::new("in", "out"),
            Arc::new(DoublingTransform::new("group", "p")),
        );

        let cancel = CancellationToken::new();
        let handle = pipeline.spawn(cancel.clone());

        write_stream(&broker, "in", "s1").await;
        write_stream(&broker, "in", "s2").await;
        write_stream(&broker, "in", "s3").await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(dependencies.format_put_count(), 1);
        assert_eq!(dependencies.configuration_put_count(), 1);
    }

    struct UnreachableDependencies;

    #[async_trait]
    impl DependencyClient for UnreachableDependencies {
        async fn put_data_format(&self, _format: &DataFormat) -> Result<String, StreamError> {
            Err(StreamError::ConnectionFailed("dependency service".into()))
        }

        async fn put_configuration(
            &self,
            _config: &DisplayConfiguration,
        ) -> Result<String, StreamError> {
            Err(StreamError::ConnectionFailed("dependency service".into()))
        }
    }

    #[tokio::test]
    async fn startup_failure_aborts_the_run() {
        let broker = MemoryBroker::new();
        let pipeline = TopicPipeline::new(
            Arc::new(broker.client()),
            Arc::new(UnreachableDependencies),
            PipelineConfig::new("in", "out"),
            Arc::new(DoublingTransform::new("group", "p")),
        );

        let result = pipeline.run(CancellationToken::new()).await;
        assert!(matches!(result, Err(StreamError::ConnectionFailed(_))));
    }
}
