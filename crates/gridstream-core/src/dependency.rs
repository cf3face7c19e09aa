//! Dependency publishing client.
//!
//! Data formats and display configurations are published once to a
//! dependency service, which returns a stable id for each descriptor.
//! Sessions then declare the ids they depend on instead of carrying the
//! descriptors inline.
//!
//! [`DependencyClient`] is the interface the pipeline core needs;
//! [`MemoryDependencyClient`] is an in-process implementation that
//! derives content-addressed ids, used by the samples and tests.

use std::collections::HashMap;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::display::DisplayConfiguration;
use crate::error::StreamError;
use crate::format::DataFormat;

/// The kind of descriptor a session dependency refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DependencyKind {
    /// A published [`DataFormat`].
    DataFormat,

    /// A published [`DisplayConfiguration`].
    Configuration,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKind::DataFormat => write!(f, "DataFormat"),
            DependencyKind::Configuration => write!(f, "Configuration"),
        }
    }
}

/// Put-and-identify client for published descriptors.
///
/// Both operations are idempotent: publishing the same descriptor twice
/// returns the same id.
#[async_trait]
pub trait DependencyClient: Send + Sync {
    /// Publishes a data format and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::PublishFailed`] if the service rejects the
    /// descriptor, or [`StreamError::ConnectionFailed`] if it is
    /// unreachable.
    async fn put_data_format(&self, format: &DataFormat) -> Result<String, StreamError>;

    /// Publishes a display configuration and returns its id.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`DependencyClient::put_data_format`].
    async fn put_configuration(
        &self,
        config: &DisplayConfiguration,
    ) -> Result<String, StreamError>;
}

/// In-process dependency service with content-addressed ids.
///
/// The id of a descriptor is a hash of its canonical JSON form, so
/// republishing an identical descriptor always yields the same id.
#[derive(Debug, Default)]
pub struct MemoryDependencyClient {
    formats: Mutex<HashMap<String, DataFormat>>,
    configs: Mutex<HashMap<String, DisplayConfiguration>>,
    format_puts: AtomicU64,
    config_puts: AtomicU64,
}

impl MemoryDependencyClient {
    /// Creates an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a published data format by id.
    #[must_use]
    pub fn data_format(&self, id: &str) -> Option<DataFormat> {
        self.formats.lock().get(id).cloned()
    }

    /// Looks up a published display configuration by id.
    #[must_use]
    pub fn configuration(&self, id: &str) -> Option<DisplayConfiguration> {
        self.configs.lock().get(id).cloned()
    }

    /// Number of `put_data_format` calls made so far.
    #[must_use]
    pub fn format_put_count(&self) -> u64 {
        self.format_puts.load(Ordering::Relaxed)
    }

    /// Number of `put_configuration` calls made so far.
    #[must_use]
    pub fn configuration_put_count(&self) -> u64 {
        self.config_puts.load(Ordering::Relaxed)
    }

    fn content_id(prefix: &str, json: &str) -> String {
        let mut hasher = DefaultHasher::new();
        json.hash(&mut hasher);
        format!("{prefix}-{:016x}", hasher.finish())
    }
}

#[async_trait]
impl DependencyClient for MemoryDependencyClient {
    async fn put_data_format(&self, format: &DataFormat) -> Result<String, StreamError> {
        self.format_puts.fetch_add(1, Ordering::Relaxed);
        let json = serde_json::to_string(format)?;
        let id = Self::content_id("fmt", &json);
        self.formats.lock().insert(id.clone(), format.clone());
        Ok(id)
    }

    async fn put_configuration(
        &self,
        config: &DisplayConfiguration,
    ) -> Result<String, StreamError> {
        self.config_puts.fetch_add(1, Ordering::Relaxed);
        let json = serde_json::to_string(config)?;
        let id = Self::content_id("cfg", &json);
        self.configs.lock().insert(id.clone(), config.clone());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::ParameterDisplay;

    fn vcar_format() -> DataFormat {
        DataFormat::define_feed()
            .parameter("vCar:Chassis")
            .at_frequency(100.0)
            .build_format()
    }

    #[tokio::test]
    async fn put_is_idempotent() {
        let client = MemoryDependencyClient::new();
        let a = client.put_data_format(&vcar_format()).await.unwrap();
        let b = client.put_data_format(&vcar_format()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(client.format_put_count(), 2);
    }

    #[tokio::test]
    async fn distinct_descriptors_get_distinct_ids() {
        let client = MemoryDependencyClient::new();
        let a = client.put_data_format(&vcar_format()).await.unwrap();
        let other = DataFormat::define_feed()
            .parameter("vCar2:Chassis")
            .at_frequency(100.0)
            .build_format();
        let b = client.put_data_format(&other).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn published_descriptors_resolve_by_id() {
        let client = MemoryDependencyClient::new();
        let format_id = client.put_data_format(&vcar_format()).await.unwrap();
        assert_eq!(client.data_format(&format_id), Some(vcar_format()));

        let config = DisplayConfiguration::builder()
            .parameter("app", "group", "vCar:Chassis", ParameterDisplay::new("vCar"))
            .build();
        let config_id = client.put_configuration(&config).await.unwrap();
        assert_eq!(client.configuration(&config_id), Some(config));
        assert!(client.configuration("cfg-bogus").is_none());
    }

    #[test]
    fn dependency_kind_display() {
        assert_eq!(DependencyKind::DataFormat.to_string(), "DataFormat");
        assert_eq!(DependencyKind::Configuration.to_string(), "Configuration");
    }
}
