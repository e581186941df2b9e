//! End-to-end scenarios driving a `Tracker` (or a `MotAccumulator`) the way
//! a caller would, rather than exercising one module's internals in
//! isolation.

use std::rc::Rc;

use tracker_core::numerics::PointMatrix;
use tracker_core::{CoordinateTransformation, Detection, MotAccumulator, Tracker, TrackerConfig, TranslationTransformation};

fn point_det(x: f64, y: f64) -> Detection {
    Detection::new(PointMatrix::from_row_slice(1, 2, &[x, y]), None, None, None).unwrap()
}

fn box_det(x1: f64, y1: f64, x2: f64, y2: f64) -> Detection {
    Detection::new(PointMatrix::from_row_slice(2, 2, &[x1, y1, x2, y2]), None, None, None).unwrap()
}

#[test]
fn static_object_confirms_after_initialization_delay() {
    let distance = tracker_core::distance::resolve("iou", None, None, None).unwrap();
    let config = TrackerConfig::builder()
        .distance_threshold(0.5)
        .hit_counter_max(30)
        .initialization_delay(3)
        .build()
        .unwrap();
    let mut tracker = Tracker::new(config, distance);

    for _ in 0..4 {
        tracker.update(vec![box_det(100.0, 100.0, 200.0, 200.0)], 1, None);
    }

    let visible = tracker.visible_objects();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id(), Some(1));
    assert!(visible[0].global_id().is_some());

    let estimate = visible[0].estimate();
    assert!((estimate[(0, 0)] - 100.0).abs() < 0.01);
    assert!((estimate[(0, 1)] - 100.0).abs() < 0.01);
    assert!((estimate[(1, 0)] - 200.0).abs() < 0.01);
    assert!((estimate[(1, 1)] - 200.0).abs() < 0.01);
}

#[test]
fn spurious_single_frame_detection_is_never_confirmed() {
    let distance = tracker_core::distance::resolve("iou", None, None, None).unwrap();
    let config = TrackerConfig::builder()
        .distance_threshold(0.5)
        .hit_counter_max(30)
        .initialization_delay(3)
        .build()
        .unwrap();
    let mut tracker = Tracker::new(config, distance);

    tracker.update(vec![box_det(100.0, 100.0, 200.0, 200.0)], 1, None);
    assert!(tracker.visible_objects().is_empty());

    for _ in 0..5 {
        tracker.update(vec![], 1, None);
        assert!(tracker.visible_objects().is_empty());
    }

    assert!(tracker.tracked_objects().is_empty());
    assert_eq!(tracker.total_object_count(), 0);
}

#[test]
fn two_objects_one_briefly_missed_keep_their_ids() {
    let distance = tracker_core::distance::resolve("mean_euclidean", None, None, None).unwrap();
    let config = TrackerConfig::builder()
        .distance_threshold(50.0)
        .hit_counter_max(10)
        .initialization_delay(2)
        .build()
        .unwrap();
    let mut tracker = Tracker::new(config, distance);

    for _ in 0..6 {
        tracker.update(vec![point_det(100.0, 100.0), point_det(200.0, 200.0)], 1, None);
        if tracker.visible_objects().len() == 2 {
            break;
        }
    }
    assert_eq!(tracker.visible_objects().len(), 2, "both objects should confirm well within 6 frames");

    let (id_a, id_b) = {
        let visible = tracker.visible_objects();
        (visible[0].id().unwrap(), visible[1].id().unwrap())
    };

    // Frame 6: only the second object is detected this frame.
    tracker.update(vec![point_det(200.0, 200.0)], 1, None);
    assert_eq!(tracker.visible_objects().len(), 2, "the briefly-missed object must still be visible");

    // Frame 7: both reappear.
    tracker.update(vec![point_det(100.0, 100.0), point_det(200.0, 200.0)], 1, None);
    let visible = tracker.visible_objects();
    assert_eq!(visible.len(), 2);
    let ids: Vec<u64> = visible.iter().map(|o| o.id().unwrap()).collect();
    assert!(ids.contains(&id_a));
    assert!(ids.contains(&id_b));
}

#[test]
fn reidentification_preserves_id_across_a_gap() {
    let distance = tracker_core::distance::resolve("mean_euclidean", None, None, None).unwrap();
    let reid_distance = tracker_core::distance::resolve("mean_euclidean", None, None, None).unwrap();
    let config = TrackerConfig::builder()
        .distance_threshold(50.0)
        .hit_counter_max(3)
        .initialization_delay(1)
        .reid(100.0, 5)
        .build()
        .unwrap();
    let mut tracker = Tracker::new(config, distance).with_reid_distance(reid_distance);

    // Frames 0-4: the object confirms and saturates its hit counter.
    for _ in 0..5 {
        tracker.update(vec![point_det(100.0, 100.0)], 1, None);
    }
    let id_before = tracker.visible_objects()[0].id().unwrap();
    let global_id_before = tracker.visible_objects()[0].global_id().unwrap();

    // Frames 5-9: no detections; the object dies and enters its
    // re-identification waiting window.
    for _ in 0..5 {
        tracker.update(vec![], 1, None);
    }
    assert!(tracker.visible_objects().is_empty());

    // Frames 10-13: the same point reappears and should be merged back into
    // the waiting identity rather than spawning a new one.
    for _ in 0..4 {
        tracker.update(vec![point_det(100.0, 100.0)], 1, None);
    }

    let visible = tracker.visible_objects();
    assert_eq!(visible.len(), 1, "the revived object should not duplicate into a second identity");
    assert_eq!(visible[0].id(), Some(id_before));
    assert_eq!(visible[0].global_id(), Some(global_id_before));
}

#[test]
fn camera_translation_is_compensated_in_absolute_coordinates() {
    let distance = tracker_core::distance::resolve("mean_euclidean", None, None, None).unwrap();
    let config = TrackerConfig::builder()
        .distance_threshold(30.0)
        .hit_counter_max(30)
        .initialization_delay(2)
        .build()
        .unwrap();
    let mut tracker = Tracker::new(config, distance);

    for k in 0..6i64 {
        // World point is fixed at (100, 100); the camera has translated by
        // (10k, 0), so the point appears at (100 - 10k, 100) in the
        // camera-relative frame the detector reports.
        let relative_x = 100.0 - 10.0 * k as f64;
        let transform: Rc<dyn CoordinateTransformation> =
            Rc::new(TranslationTransformation::new(vec![-10.0 * k as f64, 0.0]).unwrap());
        tracker.update(vec![point_det(relative_x, 100.0)], 1, Some(transform));
    }

    let visible = tracker.visible_objects();
    assert_eq!(visible.len(), 1);
    let absolute = visible[0].get_estimate(true).unwrap();
    assert!((absolute[(0, 0)] - 100.0).abs() < 3.0);
    assert!((absolute[(0, 1)] - 100.0).abs() < 3.0);
}

#[test]
fn perfect_tracker_scores_near_one_mota_across_three_objects() {
    let mut acc = MotAccumulator::new(0.5);
    let boxes: [[f64; 4]; 3] = [[0.0, 0.0, 10.0, 10.0], [50.0, 50.0, 60.0, 60.0], [100.0, 0.0, 110.0, 10.0]];

    for _ in 0..10 {
        let gt: Vec<(u64, [f64; 4])> = (1..=3).map(|id| (id, boxes[(id - 1) as usize])).collect();
        let hyp = gt.clone();
        acc.accumulate(&gt, &hyp);
    }

    let summary = acc.summary();
    assert!(summary.mota >= 0.99);
    assert!(summary.motp <= 0.01);
    assert_eq!(summary.id_switches, 0);
    assert_eq!(summary.num_false_positives, 0);
    assert_eq!(summary.num_misses, 0);
    assert_eq!(summary.mostly_tracked, 3);
    assert_eq!(summary.mostly_lost, 0);
}
