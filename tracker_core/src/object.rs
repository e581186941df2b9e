//! The per-identity tracked state entity and its minting factory.

use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::candidate::Candidate;
use crate::detection::{Detection, Label};
use crate::error::{Result, TrackerError};
use crate::filter::{positions_from_state, Filter, FilterFactory};
use crate::numerics::{flatten_row_major, PointMatrix};
use crate::transform::CoordinateTransformation;

/// Process-wide identity counter. Every `global_id` mint is atomic with
/// respect to concurrent tracker instances; a single module-level
/// accessor is used instead of threading a context object through every
/// call site.
static GLOBAL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_global_id() -> u64 {
    GLOBAL_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Test-only reset hook for the process-wide global counter.
#[cfg(any(test, feature = "test-util"))]
pub fn reset_global_id_counter() {
    GLOBAL_ID_COUNTER.store(1, Ordering::SeqCst);
}

/// Mints `initializing_id` at birth and `id`/`global_id` at confirmation,
/// one factory per tracker instance.
#[derive(Debug, Default)]
pub struct TrackedObjectFactory {
    count: u64,
    initializing_count: u64,
}

impl TrackedObjectFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_initializing_id(&mut self) -> u64 {
        self.initializing_count += 1;
        self.initializing_count
    }

    fn confirm(&mut self) -> (u64, u64) {
        self.count += 1;
        (self.count, next_global_id())
    }

    /// The factory's `count` counter: the number of objects confirmed by
    /// this tracker instance so far.
    pub fn total_object_count(&self) -> u64 {
        self.count
    }
}

/// Parameters `hit`/`tracker_step` need from the owning tracker's
/// configuration.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleParams {
    pub hit_counter_max: i64,
    pub initialization_delay: i64,
    pub pointwise_hit_counter_max: i64,
    pub detection_threshold: f64,
    pub past_detections_length: usize,
    pub reid_hit_counter_max: Option<i64>,
}

/// The per-identity tracked state entity.
#[derive(Debug)]
pub struct TrackedObject {
    num_points: usize,
    dim_points: usize,

    initializing_id: u64,
    id: Option<u64>,
    global_id: Option<u64>,

    hit_counter: i64,
    point_hit_counter: Vec<i64>,
    reid_hit_counter: Option<i64>,
    age: u64,
    is_initializing: bool,

    last_detection: Option<Rc<Detection>>,
    last_distance: Option<f64>,
    current_min_distance: Option<f64>,
    detected_at_least_once_points: Vec<bool>,
    past_detections: VecDeque<Rc<Detection>>,

    filter: Box<dyn Filter>,
    label: Option<Label>,
    transform: Option<Rc<dyn CoordinateTransformation>>,

    estimate: PointMatrix,
}

impl TrackedObject {
    /// Births a new candidate from an unmatched detection.
    pub fn new(
        factory: &mut TrackedObjectFactory,
        detection: Detection,
        period: i64,
        filter_factory: &dyn FilterFactory,
        transform: Option<Rc<dyn CoordinateTransformation>>,
    ) -> Self {
        let num_points = detection.num_points();
        let dim_points = detection.dim_points();
        let filter = filter_factory.create(detection.absolute_points());
        let label = detection.label().cloned();

        let mut obj = Self {
            num_points,
            dim_points,
            initializing_id: factory.next_initializing_id(),
            id: None,
            global_id: None,
            hit_counter: period,
            point_hit_counter: vec![period; num_points],
            reid_hit_counter: None,
            age: 0,
            is_initializing: true,
            last_detection: None,
            last_distance: None,
            current_min_distance: None,
            detected_at_least_once_points: vec![false; num_points],
            past_detections: VecDeque::new(),
            filter,
            label,
            transform,
            estimate: PointMatrix::zeros(num_points, dim_points),
        };
        obj.refresh_estimate();
        obj
    }

    pub fn initializing_id(&self) -> u64 {
        self.initializing_id
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn global_id(&self) -> Option<u64> {
        self.global_id
    }

    pub fn is_initializing(&self) -> bool {
        self.is_initializing
    }

    /// Whether `hit_counter` alone would keep this object around. Does not
    /// account for a re-identification waiting period: use
    /// [`TrackedObject::should_cull`] for the tracker's actual cull rule.
    pub fn is_alive(&self) -> bool {
        self.hit_counter >= 0
    }

    /// The tracker's cull predicate: an object waiting for re-identification
    /// is removed once its `reid_hit_counter` goes negative, regardless of
    /// `hit_counter`; every other object is removed once `hit_counter` goes
    /// negative.
    pub fn should_cull(&self) -> bool {
        match self.reid_hit_counter {
            Some(r) => r < 0,
            None => self.hit_counter < 0,
        }
    }

    /// Whether this object belongs in the caller-visible set: confirmed,
    /// alive, and not currently waiting for re-identification.
    pub fn is_visible(&self) -> bool {
        !self.is_initializing && self.hit_counter >= 0 && self.reid_hit_counter.is_none()
    }

    pub fn hit_counter(&self) -> i64 {
        self.hit_counter
    }

    pub fn point_hit_counter(&self) -> &[i64] {
        &self.point_hit_counter
    }

    pub fn reid_hit_counter(&self) -> Option<i64> {
        self.reid_hit_counter
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn label(&self) -> Option<&Label> {
        self.label.as_ref()
    }

    pub fn last_detection(&self) -> Option<&Detection> {
        self.last_detection.as_deref()
    }

    pub fn last_distance(&self) -> Option<f64> {
        self.last_distance
    }

    pub fn current_min_distance(&self) -> Option<f64> {
        self.current_min_distance
    }

    pub fn estimate(&self) -> &PointMatrix {
        &self.estimate
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn dim_points(&self) -> usize {
        self.dim_points
    }

    pub fn dim_z(&self) -> usize {
        self.num_points * self.dim_points
    }

    /// Whether a point is "live": its per-point hit counter is positive.
    pub fn point_is_live(&self, index: usize) -> bool {
        self.point_hit_counter[index] > 0
    }

    /// Fold a matched detection into this object's state.
    pub fn hit(
        &mut self,
        mut detection: Detection,
        period: i64,
        distance: f64,
        params: &LifecycleParams,
        factory: &mut TrackedObjectFactory,
    ) {
        detection.set_age(self.age);
        let observed = detection.observed_mask(params.detection_threshold);

        let detection = Rc::new(detection);
        self.push_past_detection(detection.clone(), params.past_detections_length);

        self.hit_counter = (self.hit_counter + 2 * period).min(params.hit_counter_max);

        if self.is_initializing && self.hit_counter > params.initialization_delay {
            self.is_initializing = false;
            let (id, global_id) = factory.confirm();
            self.id = Some(id);
            self.global_id = Some(global_id);
        }

        for (i, &is_observed) in observed.iter().enumerate() {
            if is_observed {
                self.point_hit_counter[i] =
                    (self.point_hit_counter[i] + 2 * period).min(params.pointwise_hit_counter_max);
            }
            self.point_hit_counter[i] = self.point_hit_counter[i].max(0);
        }

        let dim = self.dim_points;
        let dim_z = self.dim_z();
        let mut observed_components = vec![false; dim_z];
        for (i, &is_observed) in observed.iter().enumerate() {
            for d in 0..dim {
                observed_components[i * dim + d] = is_observed;
            }
        }

        let z = flatten_row_major(detection.absolute_points());
        self.filter.update(&z, None, Some(&observed_components));

        let mut state = self.filter.state_vector();
        for (i, &is_observed) in observed.iter().enumerate() {
            if is_observed && !self.detected_at_least_once_points[i] {
                for d in 0..dim {
                    state[i * dim + d] = z[i * dim + d];
                    state[dim_z + i * dim + d] = 0.0;
                }
                self.detected_at_least_once_points[i] = true;
            }
        }
        self.filter.set_state_vector(state);

        self.last_distance = Some(distance);
        self.current_min_distance = Some(distance);
        self.last_detection = Some(detection);

        self.refresh_estimate();
    }

    /// Per-frame counter decay, prediction and re-id window bookkeeping.
    pub fn tracker_step(&mut self, reid_hit_counter_max: Option<i64>) {
        if self.reid_hit_counter.is_none() && self.hit_counter <= 0 && reid_hit_counter_max.is_some() {
            self.reid_hit_counter = reid_hit_counter_max;
        } else if let Some(r) = self.reid_hit_counter {
            self.reid_hit_counter = Some(r - 1);
        }

        self.hit_counter -= 1;
        for c in self.point_hit_counter.iter_mut() {
            *c = (*c - 1).max(0);
        }
        self.age += 1;

        self.filter.predict();
        self.refresh_estimate();
    }

    /// Absorbs a freshly spawned candidate that was matched as a
    /// re-identification. `self` is the dead/waiting object whose identity
    /// survives; `other` is consumed.
    pub fn merge(&mut self, other: TrackedObject, initial_period: i64, past_detections_length: usize) {
        self.reid_hit_counter = None;
        self.hit_counter = initial_period * 2;
        self.point_hit_counter = other.point_hit_counter;
        self.last_detection = other.last_detection;
        self.last_distance = other.last_distance;
        self.current_min_distance = other.current_min_distance;
        self.detected_at_least_once_points = other.detected_at_least_once_points;
        self.filter = other.filter;

        for det in other.past_detections {
            self.push_past_detection(det, past_detections_length);
        }

        self.refresh_estimate();
    }

    /// Extract the current position estimate. `absolute = true` requires a
    /// transform to have been installed at least once.
    pub fn get_estimate(&self, absolute: bool) -> Result<PointMatrix> {
        let positions = positions_from_state(&self.filter.state_vector(), self.num_points, self.dim_points);
        match (&self.transform, absolute) {
            (None, false) => Ok(positions),
            (None, true) => Err(TrackerError::TransformNotInstalled),
            (Some(_), true) => Ok(positions),
            (Some(t), false) => Ok(t.abs_to_rel(&positions)),
        }
    }

    /// Refreshes `abs_to_rel` for this object and recomputes `estimate`.
    pub fn update_coordinate_transformation(&mut self, transform: Option<Rc<dyn CoordinateTransformation>>) {
        self.transform = transform;
        self.refresh_estimate();
    }

    fn refresh_estimate(&mut self) {
        self.estimate = self
            .get_estimate(false)
            .expect("relative estimate is infallible");
    }

    fn push_past_detection(&mut self, detection: Rc<Detection>, capacity: usize) {
        if capacity == 0 {
            return;
        }
        if self.past_detections.len() < capacity {
            self.past_detections.push_back(detection);
            return;
        }
        let should_admit = match self.past_detections.front() {
            Some(oldest) => self.age as f64 >= oldest.age() as f64 * capacity as f64,
            None => true,
        };
        if should_admit {
            self.past_detections.pop_front();
            self.past_detections.push_back(detection);
        }
    }

    pub fn past_detections(&self) -> impl Iterator<Item = &Detection> {
        self.past_detections.iter().map(|d| d.as_ref())
    }
}

impl Candidate for TrackedObject {
    fn label(&self) -> Option<&Label> {
        self.label.as_ref()
    }

    fn absolute_points(&self) -> PointMatrix {
        positions_from_state(&self.filter.state_vector(), self.num_points, self.dim_points)
    }

    fn scores(&self) -> Option<&[f64]> {
        self.last_detection.as_ref().and_then(|d| d.scores())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::OptimizedKalmanFactory;

    fn make_detection(x: f64, y: f64) -> Detection {
        Detection::new(PointMatrix::from_row_slice(1, 2, &[x, y]), None, None, None).unwrap()
    }

    #[test]
    fn birth_then_confirm_after_enough_hits() {
        reset_global_id_counter();
        let mut factory = TrackedObjectFactory::new();
        let ff = OptimizedKalmanFactory::default();
        let mut obj = TrackedObject::new(&mut factory, make_detection(1.0, 1.0), 1, &ff, None);
        assert!(obj.is_initializing());
        assert!(obj.id().is_none());

        let params = LifecycleParams {
            hit_counter_max: 30,
            initialization_delay: 2,
            pointwise_hit_counter_max: 4,
            detection_threshold: 0.0,
            past_detections_length: 4,
            reid_hit_counter_max: None,
        };

        for _ in 0..3 {
            obj.tracker_step(None);
            obj.hit(make_detection(1.0, 1.0), 1, 0.0, &params, &mut factory);
        }

        assert!(!obj.is_initializing());
        assert_eq!(obj.id(), Some(1));
        assert!(obj.global_id().is_some());
    }

    #[test]
    fn point_hit_counter_stays_in_bounds() {
        reset_global_id_counter();
        let mut factory = TrackedObjectFactory::new();
        let ff = OptimizedKalmanFactory::default();
        let mut obj = TrackedObject::new(&mut factory, make_detection(0.0, 0.0), 1, &ff, None);
        let params = LifecycleParams {
            hit_counter_max: 30,
            initialization_delay: 2,
            pointwise_hit_counter_max: 4,
            detection_threshold: 0.0,
            past_detections_length: 4,
            reid_hit_counter_max: None,
        };
        for _ in 0..20 {
            obj.tracker_step(None);
            obj.hit(make_detection(0.0, 0.0), 1, 0.0, &params, &mut factory);
            for &c in obj.point_hit_counter() {
                assert!((0..=params.pointwise_hit_counter_max).contains(&c));
            }
        }
    }

    #[test]
    fn id_survives_merge() {
        reset_global_id_counter();
        let mut factory = TrackedObjectFactory::new();
        let ff = OptimizedKalmanFactory::default();
        let params = LifecycleParams {
            hit_counter_max: 3,
            initialization_delay: 1,
            pointwise_hit_counter_max: 4,
            detection_threshold: 0.0,
            past_detections_length: 4,
            reid_hit_counter_max: Some(5),
        };

        let mut dead = TrackedObject::new(&mut factory, make_detection(0.0, 0.0), 1, &ff, None);
        dead.tracker_step(None);
        dead.hit(make_detection(0.0, 0.0), 1, 0.0, &params, &mut factory);
        let original_id = dead.id();
        let original_global = dead.global_id();
        assert!(original_id.is_some());

        let fresh = TrackedObject::new(&mut factory, make_detection(0.0, 0.0), 1, &ff, None);

        dead.merge(fresh, 1, 4);
        assert_eq!(dead.id(), original_id);
        assert_eq!(dead.global_id(), original_global);
        assert!(dead.reid_hit_counter().is_none());
    }
}
