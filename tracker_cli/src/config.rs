//! TOML-backed configuration file for the `multitrack` binary, thin glue
//! around `tracker_core::TrackerConfig` (which itself never touches the
//! filesystem).

use std::fs;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracker_core::{Distance, Tracker, TrackerConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReidConfigFile {
    pub distance_function: String,
    pub distance_threshold: f64,
    pub hit_counter_max: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfigFile {
    pub distance_function: String,
    pub distance_threshold: f64,
    pub hit_counter_max: i64,
    pub initialization_delay: Option<i64>,
    pub pointwise_hit_counter_max: i64,
    pub detection_threshold: f64,
    pub past_detections_length: usize,
    pub keypoint_distance_threshold: Option<f64>,
    pub normalization_height: Option<f64>,
    pub normalization_width: Option<f64>,
    pub reid: Option<ReidConfigFile>,
}

impl Default for TrackerConfigFile {
    fn default() -> Self {
        Self {
            distance_function: "mean_euclidean".to_string(),
            distance_threshold: 0.3,
            hit_counter_max: 30,
            initialization_delay: None,
            pointwise_hit_counter_max: 4,
            detection_threshold: 0.0,
            past_detections_length: 4,
            keypoint_distance_threshold: None,
            normalization_height: None,
            normalization_width: None,
            reid: None,
        }
    }
}

impl TrackerConfigFile {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| format!("reading tracker config at {path}"))?;
        let config: TrackerConfigFile = toml::from_str(&content).with_context(|| format!("parsing tracker config at {path}"))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("serializing tracker config")?;
        fs::write(path, content).with_context(|| format!("writing tracker config to {path}"))?;
        Ok(())
    }

    /// Resolves the distance function(s) and builds a ready-to-use
    /// [`Tracker`].
    pub fn build_tracker(&self) -> Result<Tracker> {
        let distance: Box<dyn Distance> = tracker_core::distance::resolve_with_score_threshold(
            &self.distance_function,
            self.keypoint_distance_threshold,
            self.detection_threshold,
            self.normalization_height,
            self.normalization_width,
        )
        .with_context(|| format!("resolving distance function '{}'", self.distance_function))?;

        let mut builder = TrackerConfig::builder()
            .distance_threshold(self.distance_threshold)
            .hit_counter_max(self.hit_counter_max)
            .pointwise_hit_counter_max(self.pointwise_hit_counter_max)
            .detection_threshold(self.detection_threshold)
            .past_detections_length(self.past_detections_length);
        if let Some(delay) = self.initialization_delay {
            builder = builder.initialization_delay(delay);
        }
        if let Some(reid) = &self.reid {
            builder = builder.reid(reid.distance_threshold, reid.hit_counter_max);
        }
        let config = builder.build().context("building tracker config")?;

        let mut tracker = Tracker::new(config, distance);
        if let Some(reid) = &self.reid {
            let reid_distance = tracker_core::distance::resolve_with_score_threshold(
                &reid.distance_function,
                self.keypoint_distance_threshold,
                self.detection_threshold,
                self.normalization_height,
                self.normalization_width,
            )
            .with_context(|| format!("resolving re-identification distance function '{}'", reid.distance_function))?;
            tracker = tracker.with_reid_distance(reid_distance);
        }
        Ok(tracker)
    }
}
