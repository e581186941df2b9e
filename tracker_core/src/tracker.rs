//! The tracker engine: per-frame update pipeline wiring together
//! detections, the matcher, the distance functions and the tracked-object
//! pool.

use std::rc::Rc;

use crate::candidate::Candidate;
use crate::detection::Detection;
use crate::distance::Distance;
use crate::error::{Result, TrackerError};
use crate::filter::{FilterFactory, OptimizedKalmanFactory};
use crate::matcher::greedy_match;
use crate::object::{LifecycleParams, TrackedObject, TrackedObjectFactory};
use crate::transform::CoordinateTransformation;

#[cfg(any(test, feature = "test-util"))]
pub use crate::object::reset_global_id_counter;

/// Tunables for one `Tracker` instance. Construct via [`TrackerConfigBuilder`].
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub distance_threshold: f64,
    pub hit_counter_max: i64,
    pub initialization_delay: i64,
    pub pointwise_hit_counter_max: i64,
    pub detection_threshold: f64,
    pub past_detections_length: usize,
    pub reid_distance_threshold: Option<f64>,
    pub reid_hit_counter_max: Option<i64>,
}

impl TrackerConfig {
    pub fn builder() -> TrackerConfigBuilder {
        TrackerConfigBuilder::default()
    }
}

/// Builder for [`TrackerConfig`], mirroring the validate-then-build shape
/// used elsewhere in the crate's configuration layer.
#[derive(Debug, Clone)]
pub struct TrackerConfigBuilder {
    distance_threshold: f64,
    hit_counter_max: i64,
    initialization_delay: Option<i64>,
    pointwise_hit_counter_max: i64,
    detection_threshold: f64,
    past_detections_length: usize,
    reid_distance_threshold: Option<f64>,
    reid_hit_counter_max: Option<i64>,
}

impl Default for TrackerConfigBuilder {
    fn default() -> Self {
        Self {
            distance_threshold: 0.3,
            hit_counter_max: 30,
            initialization_delay: None,
            pointwise_hit_counter_max: 4,
            detection_threshold: 0.0,
            past_detections_length: 4,
            reid_distance_threshold: None,
            reid_hit_counter_max: None,
        }
    }
}

impl TrackerConfigBuilder {
    pub fn distance_threshold(mut self, v: f64) -> Self {
        self.distance_threshold = v;
        self
    }

    pub fn hit_counter_max(mut self, v: i64) -> Self {
        self.hit_counter_max = v;
        self
    }

    pub fn initialization_delay(mut self, v: i64) -> Self {
        self.initialization_delay = Some(v);
        self
    }

    pub fn pointwise_hit_counter_max(mut self, v: i64) -> Self {
        self.pointwise_hit_counter_max = v;
        self
    }

    pub fn detection_threshold(mut self, v: f64) -> Self {
        self.detection_threshold = v;
        self
    }

    pub fn past_detections_length(mut self, v: usize) -> Self {
        self.past_detections_length = v;
        self
    }

    pub fn reid(mut self, distance_threshold: f64, hit_counter_max: i64) -> Self {
        self.reid_distance_threshold = Some(distance_threshold);
        self.reid_hit_counter_max = Some(hit_counter_max);
        self
    }

    pub fn build(self) -> Result<TrackerConfig> {
        if self.distance_threshold <= 0.0 {
            return Err(TrackerError::Configuration("distance_threshold must be positive".into()));
        }
        if self.hit_counter_max <= 0 {
            return Err(TrackerError::Configuration("hit_counter_max must be positive".into()));
        }
        if self.reid_distance_threshold.is_some() != self.reid_hit_counter_max.is_some() {
            return Err(TrackerError::Configuration(
                "re-identification requires both a distance threshold and a hit counter max".into(),
            ));
        }
        let initialization_delay = self.initialization_delay.unwrap_or(self.hit_counter_max / 2);
        if !(0..self.hit_counter_max).contains(&initialization_delay) {
            return Err(TrackerError::Configuration(
                "initialization_delay must be within [0, hit_counter_max)".into(),
            ));
        }
        Ok(TrackerConfig {
            distance_threshold: self.distance_threshold,
            hit_counter_max: self.hit_counter_max,
            initialization_delay,
            pointwise_hit_counter_max: self.pointwise_hit_counter_max,
            detection_threshold: self.detection_threshold,
            past_detections_length: self.past_detections_length,
            reid_distance_threshold: self.reid_distance_threshold,
            reid_hit_counter_max: self.reid_hit_counter_max,
        })
    }
}

/// Owns the live object pool and runs the per-frame association pipeline.
pub struct Tracker {
    config: TrackerConfig,
    distance: Box<dyn Distance>,
    reid_distance: Option<Box<dyn Distance>>,
    filter_factory: Box<dyn FilterFactory>,
    factory: TrackedObjectFactory,
    objects: Vec<TrackedObject>,
    transform: Option<Rc<dyn CoordinateTransformation>>,
}

impl Tracker {
    pub fn new(config: TrackerConfig, distance: Box<dyn Distance>) -> Self {
        Self::with_filter_factory(config, distance, Box::new(OptimizedKalmanFactory::default()))
    }

    pub fn with_filter_factory(
        config: TrackerConfig,
        distance: Box<dyn Distance>,
        filter_factory: Box<dyn FilterFactory>,
    ) -> Self {
        Self {
            config,
            distance,
            reid_distance: None,
            filter_factory,
            factory: TrackedObjectFactory::new(),
            objects: Vec::new(),
            transform: None,
        }
    }

    /// Installs the distance function used for the re-identification pass.
    /// Must be called before `update` if `config.reid_hit_counter_max` was
    /// set; panics otherwise are avoided by simply skipping re-id.
    pub fn with_reid_distance(mut self, distance: Box<dyn Distance>) -> Self {
        self.reid_distance = Some(distance);
        self
    }

    pub fn total_object_count(&self) -> u64 {
        self.factory.total_object_count()
    }

    /// Currently-alive tracked objects, confirmed and initializing alike.
    pub fn tracked_objects(&self) -> &[TrackedObject] {
        &self.objects
    }

    /// Confirmed, currently-alive objects: the set a caller should draw or
    /// report.
    pub fn visible_objects(&self) -> Vec<&TrackedObject> {
        self.objects.iter().filter(|o| o.is_visible()).collect()
    }

    /// Runs one frame through the full pipeline: transform installation,
    /// object step, two-pass association, spawn, re-identification, cull.
    /// Returns the same visible set as [`Tracker::visible_objects`]:
    /// confirmed, alive, and not waiting for re-identification.
    pub fn update(&mut self, mut detections: Vec<Detection>, period: i64, transform: Option<Rc<dyn CoordinateTransformation>>) -> Vec<&TrackedObject> {
        if let Some(t) = &transform {
            self.transform = Some(t.clone());
            for obj in self.objects.iter_mut() {
                obj.update_coordinate_transformation(Some(t.clone()));
            }
        }
        if let Some(t) = &self.transform {
            for det in detections.iter_mut() {
                det.refresh_absolute_points(t.as_ref());
            }
        }

        for obj in self.objects.iter_mut() {
            obj.tracker_step(self.config.reid_hit_counter_max);
        }

        // Objects waiting for re-identification sit in a third pool: they are
        // matched only by `run_reid_pass`, never by the ordinary association
        // passes below.
        let (confirmed_idx, initializing_idx): (Vec<usize>, Vec<usize>) = (0..self.objects.len())
            .filter(|&i| self.objects[i].reid_hit_counter().is_none())
            .partition(|&i| !self.objects[i].is_initializing());

        let mut remaining: Vec<Detection> = detections;
        remaining = self.associate_pass(&confirmed_idx, remaining, period);
        remaining = self.associate_pass(&initializing_idx, remaining, period);
        let unmatched_detections = remaining;

        let mut freshly_spawned: Vec<usize> = Vec::new();
        for det in unmatched_detections {
            let obj = TrackedObject::new(&mut self.factory, det, period, self.filter_factory.as_ref(), self.transform.clone());
            self.objects.push(obj);
            freshly_spawned.push(self.objects.len() - 1);
        }

        self.run_reid_pass(&freshly_spawned, period);

        self.objects.retain(|o| !o.should_cull());

        self.visible_objects()
    }

    /// Matches `candidates` (existing objects, by index) against the
    /// remaining detections, folds matches into the objects in place, and
    /// returns the detections that were not matched.
    fn associate_pass(&mut self, candidate_idx: &[usize], detections: Vec<Detection>, period: i64) -> Vec<Detection> {
        if candidate_idx.is_empty() || detections.is_empty() {
            return detections;
        }

        let objects_dyn: Vec<&dyn Candidate> = candidate_idx.iter().map(|&i| &self.objects[i] as &dyn Candidate).collect();
        let candidates_dyn: Vec<&dyn Candidate> = detections.iter().map(|d| d as &dyn Candidate).collect();

        let matrix = self.distance.get_distances(&objects_dyn, &candidates_dyn);
        drop(objects_dyn);
        drop(candidates_dyn);

        let result = match greedy_match(&matrix, self.config.distance_threshold) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = ?e, "distance matrix contained NaN; skipping this association pass");
                return detections;
            }
        };

        let mut detections: Vec<Option<Detection>> = detections.into_iter().map(Some).collect();
        let params = LifecycleParams {
            hit_counter_max: self.config.hit_counter_max,
            initialization_delay: self.config.initialization_delay,
            pointwise_hit_counter_max: self.config.pointwise_hit_counter_max,
            detection_threshold: self.config.detection_threshold,
            past_detections_length: self.config.past_detections_length,
            reid_hit_counter_max: self.config.reid_hit_counter_max,
        };

        for m in &result.matches {
            let obj_index = candidate_idx[m.row];
            let detection = detections[m.col].take().expect("each column matched at most once");
            self.objects[obj_index].hit(detection, period, m.distance, &params, &mut self.factory);
        }

        let leftover: Vec<Detection> = result.unmatched_cols.into_iter().filter_map(|c| detections[c].take()).collect();
        leftover
    }

    /// Attempts to merge dead/waiting confirmed objects into freshly
    /// spawned candidates from this frame, using the configured re-id
    /// distance. No-op if re-id is not configured.
    fn run_reid_pass(&mut self, freshly_spawned: &[usize], period: i64) {
        let (Some(reid_distance), Some(reid_threshold)) = (&self.reid_distance, self.config.reid_distance_threshold) else {
            return;
        };
        if freshly_spawned.is_empty() {
            return;
        }

        let waiting_idx: Vec<usize> = (0..self.objects.len())
            .filter(|&i| !freshly_spawned.contains(&i) && self.objects[i].reid_hit_counter().is_some())
            .collect();
        if waiting_idx.is_empty() {
            return;
        }

        let waiting_dyn: Vec<&dyn Candidate> = waiting_idx.iter().map(|&i| &self.objects[i] as &dyn Candidate).collect();
        let fresh_dyn: Vec<&dyn Candidate> = freshly_spawned.iter().map(|&i| &self.objects[i] as &dyn Candidate).collect();
        let matrix = reid_distance.get_distances(&waiting_dyn, &fresh_dyn);
        drop(waiting_dyn);
        drop(fresh_dyn);

        let result = match greedy_match(&matrix, reid_threshold) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = ?e, "re-identification distance matrix contained NaN; skipping re-id this frame");
                return;
            }
        };

        let mut to_remove: Vec<usize> = Vec::new();
        for m in &result.matches {
            let waiting_pos = waiting_idx[m.row];
            let fresh_pos = freshly_spawned[m.col];
            let fresh = std::mem::replace(&mut self.objects[fresh_pos], placeholder_object());
            self.objects[waiting_pos].merge(fresh, period, self.config.past_detections_length);
            to_remove.push(fresh_pos);
        }

        to_remove.sort_unstable();
        for &idx in to_remove.iter().rev() {
            self.objects.remove(idx);
        }
    }
}

/// A throwaway object used only as the moved-out slot filler in
/// [`Tracker::run_reid_pass`]; it is removed from the pool in the same
/// call and never observed by a caller.
fn placeholder_object() -> TrackedObject {
    let mut factory = TrackedObjectFactory::new();
    let detection = Detection::new(crate::numerics::PointMatrix::zeros(1, 2), None, None, None)
        .expect("1x2 zero matrix is a valid detection shape");
    TrackedObject::new(&mut factory, detection, 1, &crate::filter::NoFilterFactory, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::PointMatrix;

    fn euclidean_distance_fn() -> Box<dyn Distance> {
        crate::distance::resolve("mean_euclidean", None, None, None).unwrap()
    }

    fn det(x: f64, y: f64) -> Detection {
        Detection::new(PointMatrix::from_row_slice(1, 2, &[x, y]), None, None, None).unwrap()
    }

    #[test]
    fn spawns_and_eventually_confirms_a_new_object() {
        reset_global_id_counter();
        let config = TrackerConfig::builder()
            .distance_threshold(5.0)
            .hit_counter_max(10)
            .initialization_delay(1)
            .build()
            .unwrap();
        let mut tracker = Tracker::new(config, euclidean_distance_fn());

        for _ in 0..3 {
            tracker.update(vec![det(1.0, 1.0)], 1, None);
        }

        assert_eq!(tracker.visible_objects().len(), 1);
    }

    #[test]
    fn unmatched_object_eventually_dies() {
        reset_global_id_counter();
        let config = TrackerConfig::builder()
            .distance_threshold(5.0)
            .hit_counter_max(2)
            .initialization_delay(0)
            .build()
            .unwrap();
        let mut tracker = Tracker::new(config, euclidean_distance_fn());

        tracker.update(vec![det(1.0, 1.0)], 1, None);
        for _ in 0..10 {
            tracker.update(vec![], 1, None);
        }

        assert!(tracker.tracked_objects().is_empty());
    }
}
