use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use seer::config::SeerConfig;
use seer::navigator::{DangerLevel, NavigationRequest, Navigator, Urgency};
use seer::reasoning::{ReasoningBackend, ReasoningError, ReasoningPrompt};
use seer::spatial::{BoundingBox, Detection};
use seer::state::SceneTracker;

/// Scripted reasoning backend: plays back one reply per call and records the
/// prompts it received.
struct ScriptedBackend {
    replies: Mutex<Vec<Result<String, ()>>>,
    prompts: Mutex<Vec<ReasoningPrompt>>,
}

impl ScriptedBackend {
    fn new(replies: Vec<Result<String, ()>>) -> Arc<Self> {
        Arc::new(Self { replies: Mutex::new(replies), prompts: Mutex::new(Vec::new()) })
    }
}

#[async_trait]
impl ReasoningBackend for ScriptedBackend {
    async fn complete(&self, prompt: &ReasoningPrompt) -> Result<String, ReasoningError> {
        self.prompts.lock().push(prompt.clone());
        let mut replies = self.replies.lock();
        match replies.remove(0) {
            Ok(text) => Ok(text),
            Err(()) => Err(ReasoningError::Timeout),
        }
    }
}

fn person_blocking() -> Detection {
    Detection {
        label: "person".to_string(),
        confidence: 0.9,
        bbox: BoundingBox { cx: 640.0, cy: 600.0, w: 200.0, h: 300.0 },
    }
}

fn setup(replies: Vec<Result<String, ()>>) -> (Navigator, SceneTracker, Arc<ScriptedBackend>) {
    let backend = ScriptedBackend::new(replies);
    let tracker = SceneTracker::new();
    let navigator = Navigator::new(
        SeerConfig::default().navigation,
        backend.clone(),
        tracker.clone(),
    );
    (navigator, tracker, backend)
}

#[tokio::test]
async fn guidance_session_reaches_checkpoint() {
    let (navigator, tracker, backend) = setup(vec![
        Ok(r#"{"instruction": "Pause. Person ahead.", "urgency": "warning", "reached": false, "danger_level": "caution", "reason": "person centered"}"#.to_string()),
        Ok(r#"{"instruction": "Continue straight for three steps.", "reached": false}"#.to_string()),
        Ok(r#"{"instruction": "Reach forward; the elevator is here.", "reached": true}"#.to_string()),
    ]);

    // Cycle 1: a person blocks the path.
    let mut request = NavigationRequest {
        checkpoint: "elevator".to_string(),
        detections: vec![person_blocking()],
        ..Default::default()
    };
    let first = navigator.decide(&request).await;
    assert_eq!(first.urgency, Urgency::Warning);
    assert_eq!(first.danger_level, DangerLevel::Caution);
    assert!(!first.reached);

    let snapshot = tracker.read();
    assert_eq!(snapshot.last_checkpoint.as_deref(), Some("elevator"));
    assert_eq!(snapshot.danger_level, DangerLevel::Caution);
    assert_eq!(snapshot.obstacles_ahead.len(), 1);

    // Cycle 2: path clears.
    request.detections.clear();
    request.recent_instructions.push(first.instruction);
    let second = navigator.decide(&request).await;
    assert!(!second.reached);
    assert!(tracker.read().obstacles_ahead.is_empty());

    // Cycle 3: arrival. No detections contradict the verdict, so it stands.
    request.recent_instructions.push(second.instruction);
    let third = navigator.decide(&request).await;
    assert!(third.reached);

    // Prompts went out in detection-only mode with the checkpoint named.
    let prompts = backend.prompts.lock();
    assert_eq!(prompts.len(), 3);
    assert!(prompts.iter().all(|p| p.image.is_none()));
    assert!(prompts[0].user.contains("Target checkpoint: elevator"));
    assert!(prompts[0].user.contains("blocking your path"));
    assert!(prompts[1].user.contains("Path appears clear"));
}

#[tokio::test]
async fn outage_mid_session_degrades_then_recovers() {
    let (navigator, tracker, _backend) = setup(vec![
        Err(()),
        Ok(r#"{"instruction": "Slight right.", "reached": false}"#.to_string()),
    ]);

    let request = NavigationRequest {
        checkpoint: "exit".to_string(),
        detections: vec![person_blocking()],
        ..Default::default()
    };

    // The timeout produces the exact safe default, never an error.
    let degraded = navigator.decide(&request).await;
    assert_eq!(degraded.instruction, "Continue forward carefully.");
    assert_eq!(degraded.urgency, Urgency::Normal);
    assert!(!degraded.reached);
    assert_eq!(degraded.danger_level, DangerLevel::Safe);

    // The failed cycle still recorded a snapshot for inspection.
    let snapshot = tracker.read();
    assert_eq!(snapshot.last_checkpoint.as_deref(), Some("exit"));
    assert_eq!(snapshot.last_detections.len(), 1);

    let recovered = navigator.decide(&request).await;
    assert_eq!(recovered.instruction, "Slight right.");
}

#[tokio::test]
async fn reached_claim_is_cross_checked_against_geometry() {
    let (navigator, _tracker, _backend) = setup(vec![
        Ok(r#"{"instruction": "You have arrived at the door.", "reached": true}"#.to_string()),
    ]);

    // The model claims arrival but the door detection reads as 10+ feet.
    let request = NavigationRequest {
        checkpoint: "door".to_string(),
        detections: vec![Detection {
            label: "door".to_string(),
            confidence: 0.95,
            bbox: BoundingBox { cx: 640.0, cy: 150.0, w: 80.0, h: 160.0 },
        }],
        ..Default::default()
    };
    let decision = navigator.decide(&request).await;
    assert!(!decision.reached);
}

#[tokio::test]
async fn fully_empty_request_still_produces_guidance() {
    let (navigator, tracker, backend) = setup(vec![
        Ok(r#"{"instruction": "Continue straight for three steps."}"#.to_string()),
    ]);

    // No frame, no detections: degraded mode asks for generic forward guidance.
    let request = NavigationRequest { checkpoint: "reception".to_string(), ..Default::default() };
    let decision = navigator.decide(&request).await;
    assert_eq!(decision.instruction, "Continue straight for three steps.");
    assert_eq!(decision.danger_level, DangerLevel::Safe);

    let prompts = backend.prompts.lock();
    assert!(prompts[0].user.contains("Path appears clear"));
    assert!(tracker.read().obstacles_ahead.is_empty());
}
