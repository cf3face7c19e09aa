//! In-process transport over tokio channels.
//!
//! [`MemoryBroker`] carries topic messages between producers and
//! subscribers inside one process: each topic keeps a replayable log and
//! fans new messages out to one subscriber per consumer group. This is
//! the transport the samples and tests run against; real brokers live
//! behind the same [`crate::transport`] traits out of tree.
//!
//! Subscriptions run a dispatcher task that routes messages to
//! per-stream [`SessionInput`] bindings, creating each binding at most
//! once per distinct stream id via the subscription's factory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::StreamError;
use crate::input::SessionInput;
use crate::lifecycle::{Lifecycle, PipelineState};
use crate::session::SessionState;
use crate::transport::{
    OutputTopic, StreamClient, StreamInputFactory, StreamPipeline, TopicMessage,
};

#[derive(Default)]
struct TopicState {
    log: Vec<TopicMessage>,
    groups: HashMap<String, mpsc::UnboundedSender<TopicMessage>>,
    taps: Vec<mpsc::UnboundedSender<TopicMessage>>,
}

/// An in-process broker holding named topics.
#[derive(Default)]
pub struct MemoryBroker {
    topics: Mutex<HashMap<String, TopicState>>,
}

impl MemoryBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a client connected to this broker.
    #[must_use]
    pub fn client(self: &Arc<Self>) -> MemoryStreamClient {
        MemoryStreamClient {
            broker: Arc::clone(self),
        }
    }

    /// Opens an inspection channel on `topic_name`: the topic's full log
    /// is replayed, then every subsequent message is delivered.
    ///
    /// Taps see all consumer groups' traffic; they exist for tests and
    /// diagnostics, not for consumption accounting.
    #[must_use]
    pub fn tap(&self, topic_name: &str) -> mpsc::UnboundedReceiver<TopicMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut topics = self.topics.lock();
        let topic = topics.entry(topic_name.to_string()).or_default();
        for message in &topic.log {
            let _ = tx.send(message.clone());
        }
        topic.taps.push(tx);
        rx
    }

    fn publish(&self, topic_name: &str, message: TopicMessage) {
        let mut topics = self.topics.lock();
        let topic = topics.entry(topic_name.to_string()).or_default();
        topic.log.push(message.clone());
        topic
            .groups
            .retain(|_, tx| tx.send(message.clone()).is_ok());
        topic.taps.retain(|tx| tx.send(message.clone()).is_ok());
    }

    fn subscribe(
        &self,
        topic_name: &str,
        consumer_group: &str,
    ) -> mpsc::UnboundedReceiver<TopicMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut topics = self.topics.lock();
        let topic = topics.entry(topic_name.to_string()).or_default();
        for message in &topic.log {
            let _ = tx.send(message.clone());
        }
        // One consumer per group; a newer subscription supersedes the
        // previous one, whose channel then closes.
        topic.groups.insert(consumer_group.to_string(), tx);
        rx
    }
}

/// Write handle for one topic on a [`MemoryBroker`].
pub struct MemoryOutputTopic {
    broker: Arc<MemoryBroker>,
    topic_name: String,
}

impl OutputTopic for MemoryOutputTopic {
    fn topic_name(&self) -> &str {
        &self.topic_name
    }

    fn send(&self, message: TopicMessage) -> Result<(), StreamError> {
        self.broker.publish(&self.topic_name, message);
        Ok(())
    }
}

/// Client connected to a [`MemoryBroker`].
#[derive(Clone)]
pub struct MemoryStreamClient {
    broker: Arc<MemoryBroker>,
}

#[async_trait]
impl StreamClient for MemoryStreamClient {
    async fn open_output_topic(
        &self,
        topic_name: &str,
    ) -> Result<Arc<dyn OutputTopic>, StreamError> {
        Ok(Arc::new(MemoryOutputTopic {
            broker: Arc::clone(&self.broker),
            topic_name: topic_name.to_string(),
        }))
    }

    async fn stream_topic(
        &self,
        topic_name: &str,
        consumer_group: &str,
        factory: StreamInputFactory,
    ) -> Result<Box<dyn StreamPipeline>, StreamError> {
        let rx = self.broker.subscribe(topic_name, consumer_group);
        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle.advance(PipelineState::Running);

        let drain = CancellationToken::new();
        let task = tokio::spawn(dispatch_loop(
            topic_name.to_string(),
            rx,
            factory,
            Arc::clone(&lifecycle),
            drain.clone(),
        ));

        Ok(Box::new(MemorySubscription {
            lifecycle,
            drain,
            task: Some(task),
        }))
    }
}

/// A running subscription on a [`MemoryBroker`] topic.
pub struct MemorySubscription {
    lifecycle: Arc<Lifecycle>,
    drain: CancellationToken,
    task: Option<JoinHandle<()>>,
}

#[async_trait]
impl StreamPipeline for MemorySubscription {
    fn state(&self) -> PipelineState {
        self.lifecycle.state()
    }

    fn drain(&self) {
        self.drain.cancel();
    }

    async fn wait_until_stopped(&mut self, timeout: Duration) -> bool {
        if self.lifecycle.wait_for_stopped(timeout).await {
            if let Some(task) = self.task.take() {
                let _ = task.await;
            }
            true
        } else {
            // Deadline passed: stop waiting for the remaining bindings.
            if let Some(task) = self.task.take() {
                task.abort();
            }
            self.lifecycle.advance(PipelineState::Stopped);
            false
        }
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Per-stream binding table: `None` marks a stream whose binding ended
/// (closed, failed, or refused), keeping the factory at-most-once.
type Bindings = HashMap<String, Option<Arc<SessionInput>>>;

async fn dispatch_loop(
    topic_name: String,
    mut rx: mpsc::UnboundedReceiver<TopicMessage>,
    factory: StreamInputFactory,
    lifecycle: Arc<Lifecycle>,
    drain: CancellationToken,
) {
    let mut bindings: Bindings = HashMap::new();

    loop {
        tokio::select! {
            biased;
            () = drain.cancelled() => break,
            message = rx.recv() => match message {
                Some(message) => {
                    deliver(&topic_name, &factory, &mut bindings, message, true);
                }
                None => {
                    // Producer side gone; nothing further can arrive.
                    lifecycle.advance(PipelineState::Stopped);
                    return;
                }
            },
        }
    }

    lifecycle.advance(PipelineState::Draining);
    info!(topic = %topic_name, "draining subscription");

    // Flush in-flight messages for already-open bindings; new stream ids
    // are no longer accepted. Yield between buffers so a forced stop can
    // land between deliveries.
    while let Ok(message) = rx.try_recv() {
        deliver(&topic_name, &factory, &mut bindings, message, false);
        tokio::task::yield_now().await;
    }

    lifecycle.advance(PipelineState::Stopped);
}

fn deliver(
    topic_name: &str,
    factory: &StreamInputFactory,
    bindings: &mut Bindings,
    message: TopicMessage,
    accept_new: bool,
) {
    let stream_id = message.stream_id().to_string();

    let input = match bindings.get(&stream_id) {
        Some(Some(input)) => Arc::clone(input),
        // Binding already ended; late messages are dropped.
        Some(None) => return,
        None => {
            if !accept_new {
                warn!(topic = %topic_name, stream_id = %stream_id, "ignoring new stream during drain");
                bindings.insert(stream_id, None);
                return;
            }
            match factory(&stream_id) {
                Ok(input) => {
                    info!(topic = %topic_name, stream_id = %stream_id, "new stream");
                    bindings.insert(stream_id.clone(), Some(Arc::clone(&input)));
                    input
                }
                Err(e) => {
                    error!(topic = %topic_name, stream_id = %stream_id, error = %e, "stream binding failed");
                    bindings.insert(stream_id, None);
                    return;
                }
            }
        }
    };

    let closes_stream = matches!(
        &message,
        TopicMessage::Session { session, .. } if session.state == SessionState::Closed
    );

    if let Err(e) = input.dispatch(message) {
        error!(topic = %topic_name, stream_id = %stream_id, error = %e, "stream binding failed");
        bindings.insert(stream_id, None);
        return;
    }

    if closes_stream {
        // The stream is finished; dispose the binding (and with it the
        // paired output session resources).
        bindings.insert(stream_id, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TelemetryData;
    use crate::format::DataFormat;
    use crate::session::SessionRecord;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn open_session(stream_id: &str, identifier: &str) -> TopicMessage {
        let mut session = SessionRecord::default();
        session.state = SessionState::Open;
        session.identifier = identifier.into();
        TopicMessage::Session {
            stream_id: stream_id.into(),
            session,
        }
    }

    fn data(stream_id: &str) -> TopicMessage {
        let format = DataFormat::define_feed().parameter("p").build_format();
        TopicMessage::Data {
            stream_id: stream_id.into(),
            feed_id: "default".into(),
            data: TelemetryData::with_format(&format, 1, 0),
        }
    }

    fn counting_factory() -> (StreamInputFactory, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let factory: StreamInputFactory = Arc::new(move |stream_id| {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(Arc::new(SessionInput::new(stream_id)))
        });
        (factory, calls)
    }

    #[tokio::test]
    async fn factory_runs_once_per_stream() {
        let broker = MemoryBroker::new();
        let client = broker.client();
        let (factory, calls) = counting_factory();

        let mut pipeline = client
            .stream_topic("sessions", "group", factory)
            .await
            .unwrap();

        let out = client.open_output_topic("sessions").await.unwrap();
        out.send(open_session("s1", "a")).unwrap();
        out.send(data("s1")).unwrap();
        out.send(data("s1")).unwrap();
        out.send(open_session("s2", "b")).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::Relaxed), 2);

        pipeline.drain();
        assert!(pipeline.wait_until_stopped(Duration::from_secs(1)).await);
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }

    #[tokio::test]
    async fn subscription_replays_backlog() {
        let broker = MemoryBroker::new();
        let client = broker.client();

        let out = client.open_output_topic("sessions").await.unwrap();
        out.send(open_session("s1", "a")).unwrap();
        out.send(data("s1")).unwrap();

        let (factory, calls) = counting_factory();
        let mut pipeline = client
            .stream_topic("sessions", "group", factory)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::Relaxed), 1);

        pipeline.drain();
        assert!(pipeline.wait_until_stopped(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn new_streams_are_refused_during_drain() {
        let broker = MemoryBroker::new();
        let client = broker.client();
        let out = client.open_output_topic("sessions").await.unwrap();

        let (factory, calls) = counting_factory();
        let mut pipeline = client
            .stream_topic("sessions", "group", factory)
            .await
            .unwrap();

        out.send(open_session("s1", "a")).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        pipeline.drain();
        // Already queued before the drain completes, but the stream is
        // new, so no binding may be created for it.
        out.send(open_session("s2", "b")).unwrap();

        assert!(pipeline.wait_until_stopped(Duration::from_secs(1)).await);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn closed_session_disposes_binding() {
        let broker = MemoryBroker::new();
        let client = broker.client();
        let out = client.open_output_topic("sessions").await.unwrap();

        let (factory, calls) = counting_factory();
        let mut pipeline = client
            .stream_topic("sessions", "group", factory)
            .await
            .unwrap();

        out.send(open_session("s1", "a")).unwrap();
        let mut closed = SessionRecord::default();
        closed.state = SessionState::Closed;
        closed.identifier = "a".into();
        out.send(TopicMessage::Session {
            stream_id: "s1".into(),
            session: closed,
        })
        .unwrap();
        // After close the id is tombstoned: no new binding, no redelivery.
        out.send(data("s1")).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::Relaxed), 1);

        pipeline.drain();
        assert!(pipeline.wait_until_stopped(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn tap_sees_log_and_new_messages() {
        let broker = MemoryBroker::new();
        let client = broker.client();
        let out = client.open_output_topic("sessions").await.unwrap();

        out.send(open_session("s1", "a")).unwrap();
        let mut tap = broker.tap("sessions");
        out.send(data("s1")).unwrap();

        let first = tap.recv().await.unwrap();
        assert!(matches!(first, TopicMessage::Session { .. }));
        let second = tap.recv().await.unwrap();
        assert!(matches!(second, TopicMessage::Data { .. }));
    }
}
