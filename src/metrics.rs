//! Per-request named-task timing and geometry counters.

use geo::Geometry;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// What a request records about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MetricsMode {
    /// Record nothing; `start`/`stop` are no-ops.
    #[default]
    None,
    /// Cumulative wall-clock time per named task.
    Time,
    /// Task times plus per-geometry-type counts.
    TimeAndCounts,
}

/// Counts of geometries written, by type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometryCounts {
    pub points: u64,
    pub multi_points: u64,
    pub line_strings: u64,
    pub multi_line_strings: u64,
    pub polygons: u64,
    pub multi_polygons: u64,
    pub collections: u64,
}

/// Named-task timer scoped to one request. Never shared across requests.
///
/// Tasks accumulate: `start`/`stop` pairs for the same name add up, so a
/// per-feature phase can be timed across the whole feature loop.
#[derive(Debug)]
pub struct Metrics {
    mode: MetricsMode,
    task_times: FxHashMap<&'static str, Duration>,
    checkpoints: FxHashMap<&'static str, Instant>,
    counts: GeometryCounts,
}

impl Metrics {
    pub fn new(mode: MetricsMode) -> Self {
        Self {
            mode,
            task_times: FxHashMap::default(),
            checkpoints: FxHashMap::default(),
            counts: GeometryCounts::default(),
        }
    }

    /// Disabled metrics, for callers that don't care.
    pub fn disabled() -> Self {
        Self::new(MetricsMode::None)
    }

    pub fn mode(&self) -> MetricsMode {
        self.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.mode != MetricsMode::None
    }

    /// Open a timing checkpoint for `task`.
    pub fn start(&mut self, task: &'static str) {
        if self.is_enabled() {
            self.checkpoints.insert(task, Instant::now());
            self.task_times.entry(task).or_default();
        }
    }

    /// Close the checkpoint for `task`, adding the elapsed time to its total.
    pub fn stop(&mut self, task: &'static str) {
        if self.is_enabled()
            && let Some(started) = self.checkpoints.remove(task)
        {
            *self.task_times.entry(task).or_default() += started.elapsed();
        }
    }

    /// Cumulative durations per task, in insertion-independent order.
    pub fn task_times(&self) -> impl Iterator<Item = (&'static str, Duration)> + '_ {
        self.task_times.iter().map(|(name, d)| (*name, *d))
    }

    /// Count one written geometry when counting is enabled.
    pub fn record_geometry(&mut self, geometry: &Geometry<f64>) {
        if self.mode != MetricsMode::TimeAndCounts {
            return;
        }
        match geometry {
            Geometry::Point(_) => self.counts.points += 1,
            Geometry::MultiPoint(_) => self.counts.multi_points += 1,
            Geometry::Line(_) | Geometry::LineString(_) => self.counts.line_strings += 1,
            Geometry::MultiLineString(_) => self.counts.multi_line_strings += 1,
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
                self.counts.polygons += 1
            }
            Geometry::MultiPolygon(_) => self.counts.multi_polygons += 1,
            Geometry::GeometryCollection(_) => self.counts.collections += 1,
        }
    }

    pub fn geometry_counts(&self) -> GeometryCounts {
        self.counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::point;

    #[test]
    fn test_disabled_metrics_record_nothing() {
        let mut metrics = Metrics::disabled();
        metrics.start("global");
        metrics.stop("global");
        assert_eq!(metrics.task_times().count(), 0);
    }

    #[test]
    fn test_task_times_accumulate() {
        let mut metrics = Metrics::new(MetricsMode::Time);
        metrics.start("process");
        metrics.stop("process");
        metrics.start("process");
        metrics.stop("process");

        let times: Vec<_> = metrics.task_times().collect();
        assert_eq!(times.len(), 1);
        assert_eq!(times[0].0, "process");
    }

    #[test]
    fn test_stop_without_start_is_ignored() {
        let mut metrics = Metrics::new(MetricsMode::Time);
        metrics.stop("never-started");
        assert_eq!(metrics.task_times().count(), 0);
    }

    #[test]
    fn test_geometry_counts() {
        let mut metrics = Metrics::new(MetricsMode::TimeAndCounts);
        let p: Geometry<f64> = point!(x: 1.0, y: 2.0).into();
        metrics.record_geometry(&p);
        metrics.record_geometry(&p);
        assert_eq!(metrics.geometry_counts().points, 2);

        let mut timing_only = Metrics::new(MetricsMode::Time);
        timing_only.record_geometry(&p);
        assert_eq!(timing_only.geometry_counts().points, 0);
    }
}
