//! Measurement template carried by each interceptor.

use crate::point::{Fields, Tags};

/// Measurement name, destination namespace, and the per-call tag and field
/// sets of one observation.
///
/// An interceptor holds one template and clones it for every call, replacing
/// `tags` and `fields`, so no state is shared between concurrent calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricOptions {
    pub measurement: String,
    pub namespace: String,
    pub tags: Tags,
    pub fields: Fields,
}

impl MetricOptions {
    /// Create options with empty tag and field sets. Names are not validated here.
    pub fn new(measurement: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            namespace: namespace.into(),
            tags: Tags::new(),
            fields: Fields::new(),
        }
    }

    /// Copy of this template carrying the given tags and fields.
    pub fn for_call(&self, tags: Tags, fields: Fields) -> Self {
        Self {
            measurement: self.measurement.clone(),
            namespace: self.namespace.clone(),
            tags,
            fields,
        }
    }
}
