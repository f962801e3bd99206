//! Batches of points bound for one namespace.

use crate::error::BatchError;
use crate::point::Point;
use rpcstats_common::Precision;

#[derive(Debug, Clone)]
pub struct BatchPoints {
    namespace: String,
    precision: Precision,
    points: Vec<Point>,
}

impl BatchPoints {
    /// Open an empty batch. Fails if the namespace contains control characters.
    pub fn new(namespace: impl Into<String>, precision: Precision) -> Result<Self, BatchError> {
        let namespace = namespace.into();
        if namespace.chars().any(char::is_control) {
            return Err(BatchError::InvalidNamespace(namespace));
        }

        Ok(Self {
            namespace,
            precision,
            points: Vec::new(),
        })
    }

    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Encoded lines, one per point, in insertion order.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.points.iter().map(|p| p.to_line(self.precision))
    }
}
