//! # Gridstream Core
//!
//! Telemetry streaming toolkit: the session/feed data model, the transport
//! and dependency-service traits, an in-process transport, and the
//! per-stream topic-modeling pipeline built on top of them.
//!
//! ## Topic modeling
//!
//! A [`pipeline::TopicPipeline`] wraps a caller-supplied
//! [`transform::TopicTransform`] and:
//!
//! - publishes the output data format and display configuration once,
//! - discovers distinct streams arriving on the input topic,
//! - binds an input/output session pair per stream
//!   ([`binder::SessionBinder`]), propagating session metadata and laps,
//! - routes each buffered input through the transform to the output feed
//!   ([`binder::FeedRouter`]),
//! - drains cooperatively on cancellation, bounded by the transform's
//!   drain timeout.
//!
//! ```text
//! input topic ──► subscription ──► SessionInput ──► FeedRouter ──► OutputFeed ──► output topic
//!                    │                  │ session/laps                 ▲
//!                    │ per-stream       └──────► SessionWriter ────────┘
//!                    └─ factory (once per stream id)
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(
    test,
    allow(
        clippy::field_reassign_with_default,
        clippy::float_cmp,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss,
        clippy::unreadable_literal
    )
)]

/// Error types shared across the toolkit.
pub mod error;

/// Nanosecond timestamp helpers.
pub mod time;

/// Telemetry buffers and parameter channels.
pub mod data;

/// Data format descriptors and the feed format builder.
pub mod format;

/// Display configuration descriptors (parameter grouping metadata).
pub mod display;

/// Dependency publishing client trait and the in-memory implementation.
pub mod dependency;

/// Session state, metadata records, and lap markers.
pub mod session;

/// Transport traits and topic message types.
pub mod transport;

/// Pipeline lifecycle state machine.
pub mod lifecycle;

/// In-process transport over tokio channels.
pub mod memory;

/// Per-stream input session wrapper with event registration.
pub mod input;

/// Output session writer and output feeds.
pub mod output;

/// The topic transform capability trait.
pub mod transform;

/// Session pair construction and feed routing for one stream.
pub mod binder;

/// The topic-modeling pipeline orchestrator.
pub mod pipeline;

/// Test fixtures (transforms, buffer builders, session scripts).
pub mod testing;

pub use error::StreamError;
pub use pipeline::{PipelineConfig, TopicPipeline};
pub use transform::TopicTransform;
