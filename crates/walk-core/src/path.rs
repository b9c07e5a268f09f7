//! Ordered fix storage with a running distance total.

use crate::geo::haversine_distance;
use crate::types::Fix;

/// Owns the path of the current session and its accumulated distance.
///
/// The total is updated exactly once per [`append`](Self::append) and is
/// never recomputed by scanning the path, so appends stay O(1) amortized no
/// matter how long a walk runs.
#[derive(Debug, Clone, Default)]
pub struct PathAccumulator {
    fixes: Vec<Fix>,
    total_distance_m: f64,
}

impl PathAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the path and the distance total.
    pub fn reset(&mut self) {
        self.fixes.clear();
        self.total_distance_m = 0.0;
    }

    /// Appends a fix and returns the distance it added.
    ///
    /// The first fix adds nothing. Fixes that did not move are still kept so
    /// the rendered polyline matches what the provider reported.
    pub fn append(&mut self, fix: Fix) -> f64 {
        let added = self
            .fixes
            .last()
            .map_or(0.0, |last| haversine_distance(last.point, fix.point));
        self.total_distance_m += added;
        self.fixes.push(fix);
        added
    }

    /// Distance accumulated since the last reset, in meters.
    pub const fn total_distance(&self) -> f64 {
        self.total_distance_m
    }

    pub fn fixes(&self) -> &[Fix] {
        &self.fixes
    }

    pub fn last(&self) -> Option<&Fix> {
        self.fixes.last()
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }
}
