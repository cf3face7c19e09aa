//! Per-stream input session wrapper.
//!
//! A [`SessionInput`] is created by the transport's per-stream factory
//! when a new stream id is first observed. Callers register handlers for
//! session updates, laps, and buffered data on named feeds; the transport
//! then dispatches every message for that stream through
//! [`SessionInput::dispatch`].
//!
//! Registration is explicit and single-slot: each event carries exactly
//! one handler, and registering again replaces the previous one. Handlers
//! may be invoked from any worker the transport dispatches on, so they
//! must be `Send + Sync`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::data::TelemetryData;
use crate::error::StreamError;
use crate::format::DataFormat;
use crate::session::{Lap, SessionRecord};
use crate::transport::TopicMessage;

type DataBufferedHandler = Arc<dyn Fn(TelemetryData) -> Result<(), StreamError> + Send + Sync>;
type SessionUpdatedHandler = Arc<dyn Fn(&SessionRecord) -> Result<(), StreamError> + Send + Sync>;
type LapStartedHandler = Arc<dyn Fn(&Lap) -> Result<(), StreamError> + Send + Sync>;

#[derive(Default)]
struct FeedState {
    handler: Mutex<Option<DataBufferedHandler>>,
}

/// A bound input feed; receives buffers sent on its feed id.
pub struct InputFeed {
    feed_id: String,
    format: DataFormat,
    state: Arc<FeedState>,
}

impl InputFeed {
    /// The feed id this binding covers.
    #[must_use]
    pub fn feed_id(&self) -> &str {
        &self.feed_id
    }

    /// The data format the feed was bound with.
    #[must_use]
    pub fn format(&self) -> &DataFormat {
        &self.format
    }

    /// Registers the buffer handler, replacing any previous one.
    ///
    /// The handler takes ownership of each buffer; an error return fails
    /// the owning stream's binding.
    pub fn on_data_buffered<F>(&self, handler: F)
    where
        F: Fn(TelemetryData) -> Result<(), StreamError> + Send + Sync + 'static,
    {
        *self.state.handler.lock() = Some(Arc::new(handler));
    }
}

/// Input-side wrapper for one discovered stream.
pub struct SessionInput {
    stream_id: String,
    session: Mutex<SessionRecord>,
    session_handler: Mutex<Option<SessionUpdatedHandler>>,
    lap_handler: Mutex<Option<LapStartedHandler>>,
    feeds: Mutex<HashMap<String, Arc<FeedState>>>,
    failed: AtomicBool,
}

impl SessionInput {
    /// Creates a wrapper for `stream_id`.
    #[must_use]
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            session: Mutex::new(SessionRecord::default()),
            session_handler: Mutex::new(None),
            lap_handler: Mutex::new(None),
            feeds: Mutex::new(HashMap::new()),
            failed: AtomicBool::new(false),
        }
    }

    /// The stream id this wrapper receives.
    #[must_use]
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Snapshot of the latest session metadata seen on this stream.
    #[must_use]
    pub fn session(&self) -> SessionRecord {
        self.session.lock().clone()
    }

    /// Whether a handler failure has terminated this binding.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    /// Binds `feed_id` with an explicit input data format.
    ///
    /// Buffers arriving on other feed ids are ignored.
    pub fn bind_feed(&self, feed_id: impl Into<String>, format: DataFormat) -> InputFeed {
        let feed_id = feed_id.into();
        let state = Arc::clone(
            self.feeds
                .lock()
                .entry(feed_id.clone())
                .or_insert_with(|| Arc::new(FeedState::default())),
        );
        InputFeed {
            feed_id,
            format,
            state,
        }
    }

    /// Registers the session-update handler, replacing any previous one.
    pub fn on_session_updated<F>(&self, handler: F)
    where
        F: Fn(&SessionRecord) -> Result<(), StreamError> + Send + Sync + 'static,
    {
        *self.session_handler.lock() = Some(Arc::new(handler));
    }

    /// Registers the lap handler, replacing any previous one.
    pub fn on_lap_started<F>(&self, handler: F)
    where
        F: Fn(&Lap) -> Result<(), StreamError> + Send + Sync + 'static,
    {
        *self.lap_handler.lock() = Some(Arc::new(handler));
    }

    /// Delivers one message for this stream.
    ///
    /// Messages arriving after a handler failure are dropped. A handler
    /// error marks the binding failed and is returned to the transport,
    /// which tears the binding down; sibling streams are unaffected.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by a registered handler.
    pub fn dispatch(&self, message: TopicMessage) -> Result<(), StreamError> {
        if self.is_failed() {
            debug!(stream_id = %self.stream_id, "dropping message for failed binding");
            return Ok(());
        }
        let result = match message {
            TopicMessage::Session { session, .. } => {
                *self.session.lock() = session.clone();
                let handler = self.session_handler.lock().clone();
                handler.map_or(Ok(()), |h| h(&session))
            }
            TopicMessage::Lap { lap, .. } => {
                let handler = self.lap_handler.lock().clone();
                handler.map_or(Ok(()), |h| h(&lap))
            }
            TopicMessage::Data { feed_id, data, .. } => {
                let feed = self.feeds.lock().get(&feed_id).map(Arc::clone);
                match feed {
                    Some(feed) => {
                        let handler = feed.handler.lock().clone();
                        handler.map_or(Ok(()), |h| h(data))
                    }
                    None => {
                        debug!(
                            stream_id = %self.stream_id,
                            feed_id = %feed_id,
                            "ignoring buffer for unbound feed"
                        );
                        Ok(())
                    }
                }
            }
        };
        if result.is_err() {
            self.failed.store(true, Ordering::Relaxed);
        }
        result
    }
}
