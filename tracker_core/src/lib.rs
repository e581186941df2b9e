//! A real-time, detector-agnostic multi-object tracker: Kalman filtering,
//! greedy association, camera-motion compensation and re-identification,
//! plus a CLEAR MOT metric accumulator for offline evaluation.
//!
//! The core never touches a detector, never owns a global logging
//! subscriber, and never does file I/O. All of that is left to a calling
//! binary (see `tracker_cli` in this workspace).

pub mod candidate;
pub mod detection;
pub mod distance;
pub mod error;
pub mod filter;
pub mod matcher;
pub mod metrics;
pub mod numerics;
pub mod object;
pub mod transform;
pub mod tracker;

pub use candidate::Candidate;
pub use detection::{Detection, Embedding, Label};
pub use distance::Distance;
pub use error::{Result, TrackerError};
pub use filter::{Filter, FilterFactory, FullKalmanFactory, NoFilterFactory, OptimizedKalmanFactory};
pub use matcher::{greedy_match, Match, MatchResult};
pub use metrics::{BBox, MetricsSummary, MotAccumulator};
pub use object::TrackedObject;
pub use transform::{CoordinateTransformation, HomographyTransformation, IdentityTransformation, TranslationTransformation};
pub use tracker::{Tracker, TrackerConfig, TrackerConfigBuilder};

#[cfg(any(test, feature = "test-util"))]
pub use object::reset_global_id_counter;
