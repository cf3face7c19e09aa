//! Display configuration descriptors.
//!
//! A [`DisplayConfiguration`] describes how a feed's parameters are
//! grouped and rendered by downstream viewers: application groups contain
//! parameter groups, which contain per-parameter display metadata. The
//! descriptor is published to the dependency service alongside the data
//! format and referenced by id from every output session.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Inclusive physical range of a parameter's values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    /// Lower bound.
    pub min: f64,

    /// Upper bound.
    pub max: f64,
}

impl ValueRange {
    /// Creates a range.
    #[must_use]
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// Display metadata for one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDisplay {
    /// Human-readable name.
    pub name: String,

    /// Engineering units, e.g. `"kmh"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,

    /// Free-text description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Expected physical range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_range: Option<ValueRange>,
}

impl ParameterDisplay {
    /// Creates display metadata with just a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: None,
            description: None,
            physical_range: None,
        }
    }

    /// Sets the units.
    #[must_use]
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the physical range.
    #[must_use]
    pub fn with_physical_range(mut self, min: f64, max: f64) -> Self {
        self.physical_range = Some(ValueRange::new(min, max));
        self
    }
}

/// A named group of parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterGroup {
    /// Parameter display metadata keyed by parameter identifier.
    pub parameters: BTreeMap<String, ParameterDisplay>,
}

/// A named group of parameter groups, typically one per application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationGroup {
    /// Parameter groups keyed by group name.
    pub groups: BTreeMap<String, ParameterGroup>,
}

/// Parameter grouping and rendering metadata for one feed.
///
/// Maps are ordered so the serialized form (and therefore the published
/// content id) is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfiguration {
    /// Application groups keyed by application name.
    pub app_groups: BTreeMap<String, ApplicationGroup>,
}

impl DisplayConfiguration {
    /// Starts building a configuration.
    #[must_use]
    pub fn builder() -> DisplayConfigurationBuilder {
        DisplayConfigurationBuilder {
            config: DisplayConfiguration::default(),
        }
    }
}

/// Builder for [`DisplayConfiguration`].
///
/// ```
/// use gridstream_core::display::{DisplayConfiguration, ParameterDisplay};
///
/// let config = DisplayConfiguration::builder()
///     .parameter(
///         "app",
///         "group",
///         "vCar:Chassis",
///         ParameterDisplay::new("vCar").with_units("kmh"),
///     )
///     .build();
/// assert_eq!(config.app_groups.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct DisplayConfigurationBuilder {
    config: DisplayConfiguration,
}

impl DisplayConfigurationBuilder {
    /// Adds display metadata for a parameter, creating the application
    /// and parameter groups as needed.
    #[must_use]
    pub fn parameter(
        mut self,
        app_group: impl Into<String>,
        group: impl Into<String>,
        identifier: impl Into<String>,
        display: ParameterDisplay,
    ) -> Self {
        self.config
            .app_groups
            .entry(app_group.into())
            .or_default()
            .groups
            .entry(group.into())
            .or_default()
            .parameters
            .insert(identifier.into(), display);
        self
    }

    /// Finishes the configuration.
    #[must_use]
    pub fn build(self) -> DisplayConfiguration {
        self.config
    }
}
