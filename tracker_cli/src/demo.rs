//! Synthetic-detection smoke test: fabricates a few moving points and runs
//! them through a `Tracker`, printing the visible objects each frame.

use tracker_core::{Detection, Tracker};
use tracing::info;

/// One simulated object: a straight-line path with Gaussian-free jitter
/// (deterministic, so the demo is reproducible run to run).
struct SimulatedTrack {
    start: (f64, f64),
    velocity: (f64, f64),
    label: Option<String>,
}

fn simulated_tracks() -> Vec<SimulatedTrack> {
    vec![
        SimulatedTrack { start: (0.0, 0.0), velocity: (2.0, 1.0), label: Some("person".into()) },
        SimulatedTrack { start: (50.0, 80.0), velocity: (-1.5, 0.5), label: Some("person".into()) },
        SimulatedTrack { start: (20.0, 20.0), velocity: (0.5, 2.0), label: Some("car".into()) },
    ]
}

fn jitter(frame: u64, seed: u64) -> f64 {
    // A small deterministic wobble so detections aren't perfectly linear,
    // without pulling in a RNG dependency for a demo mode.
    let phase = (frame.wrapping_mul(2654435761).wrapping_add(seed) % 1000) as f64 / 1000.0;
    (phase - 0.5) * 0.6
}

/// Runs `frame_count` synthetic frames through `tracker`, logging the
/// visible object count and positions each frame.
pub fn run(tracker: &mut Tracker, frame_count: u64) {
    let tracks = simulated_tracks();

    for frame in 0..frame_count {
        let mut detections = Vec::with_capacity(tracks.len());
        for (seed, track) in tracks.iter().enumerate() {
            let t = frame as f64;
            let x = track.start.0 + track.velocity.0 * t + jitter(frame, seed as u64);
            let y = track.start.1 + track.velocity.1 * t + jitter(frame, seed as u64 + 1000);
            let points = tracker_core::numerics::PointMatrix::from_row_slice(1, 2, &[x, y]);
            let detection = Detection::new(points, None, track.label.clone(), None).expect("2D single-point detection is always valid shape");
            detections.push(detection);
        }

        tracker.update(detections, 1, None);
        let visible = tracker.visible_objects();
        info!(frame, visible_objects = visible.len(), "processed demo frame");
        for obj in &visible {
            let estimate = obj.estimate();
            info!(
                id = ?obj.id(),
                x = estimate[(0, 0)],
                y = estimate[(0, 1)],
                "tracked object"
            );
        }
    }
}
