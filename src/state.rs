use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::navigator::{DangerLevel, NavigationDecision};
use crate::spatial::{Detection, SpatialEstimate};

/// The single most recent decision cycle, retained for external inspection.
#[derive(Debug, Clone, Serialize)]
pub struct SceneSnapshot {
    pub last_checkpoint: Option<String>,
    pub last_detections: Vec<Detection>,
    pub last_decision: Option<NavigationDecision>,
    pub danger_level: DangerLevel,
    pub timestamp: Option<DateTime<Utc>>,
    pub obstacles_ahead: Vec<SpatialEstimate>,
}

impl Default for SceneSnapshot {
    fn default() -> Self {
        Self {
            last_checkpoint: None,
            last_detections: Vec::new(),
            last_decision: None,
            danger_level: DangerLevel::Safe,
            timestamp: None,
            obstacles_ahead: Vec::new(),
        }
    }
}

/// Injectable process-wide scene state. Writers are serialized by the lock
/// and every update replaces the snapshot wholesale, so readers always see a
/// complete pre- or post-update snapshot, never a torn one.
#[derive(Clone, Default)]
pub struct SceneTracker {
    inner: Arc<RwLock<SceneSnapshot>>,
}

impl SceneTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(
        &self,
        checkpoint: &str,
        detections: &[Detection],
        estimates: &[SpatialEstimate],
        decision: &NavigationDecision,
    ) {
        let snapshot = SceneSnapshot {
            last_checkpoint: Some(checkpoint.to_string()),
            last_detections: detections.to_vec(),
            last_decision: Some(decision.clone()),
            danger_level: decision.danger_level,
            timestamp: Some(Utc::now()),
            obstacles_ahead: estimates.iter().filter(|e| e.is_direct_obstacle).cloned().collect(),
        };
        debug!(
            "Scene update: checkpoint={}, {} detections, {} obstacles ahead",
            checkpoint,
            snapshot.last_detections.len(),
            snapshot.obstacles_ahead.len()
        );
        *self.inner.write() = snapshot;
    }

    pub fn read(&self) -> SceneSnapshot {
        self.inner.read().clone()
    }

    pub fn reset(&self) {
        debug!("Scene state reset to baseline");
        *self.inner.write() = SceneSnapshot::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigator::Urgency;
    use crate::spatial::{BoundingBox, DistanceBucket, HorizontalPosition};

    fn decision(reason: &str, danger: DangerLevel) -> NavigationDecision {
        NavigationDecision {
            instruction: "Continue straight.".to_string(),
            urgency: Urgency::Normal,
            reached: false,
            danger_level: danger,
            reason: reason.to_string(),
        }
    }

    fn detection(label: &str) -> Detection {
        Detection {
            label: label.to_string(),
            confidence: 0.9,
            bbox: BoundingBox { cx: 640.0, cy: 600.0, w: 200.0, h: 300.0 },
        }
    }

    fn estimate(label: &str, blocking: bool) -> SpatialEstimate {
        SpatialEstimate {
            label: label.to_string(),
            confidence: 0.9,
            distance: DistanceBucket::Near,
            distance_feet: 3.0,
            position: HorizontalPosition::Center,
            is_direct_obstacle: blocking,
        }
    }

    #[test]
    fn baseline_is_empty() {
        let tracker = SceneTracker::new();
        let snap = tracker.read();
        assert_eq!(snap.last_checkpoint, None);
        assert!(snap.last_detections.is_empty());
        assert!(snap.last_decision.is_none());
        assert_eq!(snap.danger_level, DangerLevel::Safe);
        assert!(snap.timestamp.is_none());
        assert!(snap.obstacles_ahead.is_empty());
    }

    #[test]
    fn update_replaces_wholesale() {
        let tracker = SceneTracker::new();
        tracker.update(
            "elevator",
            &[detection("person")],
            &[estimate("person", true)],
            &decision("first", DangerLevel::Caution),
        );
        let snap = tracker.read();
        assert_eq!(snap.last_checkpoint.as_deref(), Some("elevator"));
        assert_eq!(snap.obstacles_ahead.len(), 1);
        assert_eq!(snap.danger_level, DangerLevel::Caution);
        assert!(snap.timestamp.is_some());

        // Second update with no obstacles must not retain earlier ones.
        tracker.update("door", &[], &[], &decision("second", DangerLevel::Safe));
        let snap = tracker.read();
        assert_eq!(snap.last_checkpoint.as_deref(), Some("door"));
        assert!(snap.last_detections.is_empty());
        assert!(snap.obstacles_ahead.is_empty());
        assert_eq!(snap.danger_level, DangerLevel::Safe);
    }

    #[test]
    fn reset_restores_baseline() {
        let tracker = SceneTracker::new();
        tracker.update(
            "elevator",
            &[detection("person")],
            &[estimate("person", true)],
            &decision("x", DangerLevel::Danger),
        );
        tracker.reset();
        let snap = tracker.read();
        assert_eq!(snap.last_checkpoint, None);
        assert!(snap.last_detections.is_empty());
        assert!(snap.last_decision.is_none());
        assert_eq!(snap.danger_level, DangerLevel::Safe);
        assert!(snap.timestamp.is_none());
        assert!(snap.obstacles_ahead.is_empty());
    }

    #[test]
    fn concurrent_updates_never_tear() {
        // Each writer tags both the checkpoint and the decision reason, so a
        // mixed snapshot would be detectable.
        let tracker = SceneTracker::new();
        let mut handles = Vec::new();
        for name in ["elevator", "stairs"] {
            let tracker = tracker.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..500 {
                    tracker.update(name, &[detection(name)], &[], &decision(name, DangerLevel::Safe));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let snap = tracker.read();
        let checkpoint = snap.last_checkpoint.unwrap();
        assert_eq!(snap.last_decision.unwrap().reason, checkpoint);
        assert_eq!(snap.last_detections[0].label, checkpoint);
    }
}
