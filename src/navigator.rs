use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::NavigationConfig;
use crate::reasoning::{ReasoningBackend, ReasoningError, ReasoningPrompt};
use crate::scene::{self, CLEAR_PATH};
use crate::spatial::{Detection, SpatialEstimate};
use crate::state::SceneTracker;
use crate::vision::normalize_frame;

const SYSTEM_PROMPT: &str = include_str!("../prompts/system_prompt.txt");
const FEW_SHOT_EXAMPLES: &str = include_str!("../prompts/few_shot.txt");

/// Input bundle for one decision cycle.
#[derive(Debug, Clone, Default)]
pub struct NavigationRequest {
    pub checkpoint: String,
    pub detections: Vec<Detection>,
    /// Source frame dimensions for the detections, when the caller knows them.
    pub frame_width: Option<f32>,
    pub frame_height: Option<f32>,
    /// Previously issued instructions, most recent last.
    pub recent_instructions: Vec<String>,
    /// Free-text conversational exchanges.
    pub history_snippets: Vec<String>,
    /// Raw image bytes of the current camera view, when available.
    pub frame: Option<Vec<u8>>,
    /// Language code for localized output; English when absent.
    pub language: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Normal,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DangerLevel {
    #[default]
    Safe,
    Caution,
    Danger,
}

/// Output of one decision cycle. Always fully populated: generation failures
/// substitute deterministic defaults rather than partial results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationDecision {
    pub instruction: String,
    pub urgency: Urgency,
    pub reached: bool,
    pub danger_level: DangerLevel,
    #[serde(default)]
    pub reason: String,
}

/// The decision engine: fuses checkpoint, detections, history, and an
/// optional camera frame into one spoken instruction. `decide` never returns
/// an error; every failure degrades to the configured safe default.
pub struct Navigator {
    config: NavigationConfig,
    backend: Arc<dyn ReasoningBackend>,
    tracker: SceneTracker,
}

impl Navigator {
    pub fn new(config: NavigationConfig, backend: Arc<dyn ReasoningBackend>, tracker: SceneTracker) -> Self {
        Self { config, backend, tracker }
    }

    /// Run one decision cycle and record the resulting scene snapshot.
    pub async fn decide(&self, request: &NavigationRequest) -> NavigationDecision {
        // The only place a reasoning failure becomes a decision.
        let mut decision = match self.generate(request).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!("Reasoning call failed, issuing safe default: {}", e);
                self.safe_default()
            }
        };

        let (frame_w, frame_h) = self.frame_dims(request);
        let estimates =
            scene::rank_by_proximity(&request.detections, frame_w, frame_h, &self.config.thresholds);

        if decision.reached && !self.confirm_reached(request, &estimates) {
            info!(
                "Demoting reached verdict for '{}': no checkpoint detection within {} feet",
                request.checkpoint, self.config.reached_max_distance_feet
            );
            decision.reached = false;
        }

        self.tracker
            .update(&request.checkpoint, &request.detections, &estimates, &decision);
        decision
    }

    async fn generate(&self, request: &NavigationRequest) -> Result<NavigationDecision, ReasoningError> {
        let prompt = if let Some(frame) = &request.frame {
            let image = normalize_frame(frame, self.config.mirror_correction)
                .map_err(|e| ReasoningError::BadFrame(e.to_string()))?;
            debug!("Vision mode: {}x{} frame", image.width(), image.height());
            ReasoningPrompt {
                system: format!("{SYSTEM_PROMPT}\n\n{FEW_SHOT_EXAMPLES}"),
                user: self.build_vision_prompt(request),
                image: Some(image),
            }
        } else {
            debug!("Detection-only mode: {} detections", request.detections.len());
            ReasoningPrompt {
                system: format!("{SYSTEM_PROMPT}\n\n{FEW_SHOT_EXAMPLES}"),
                user: self.build_detection_prompt(request),
                image: None,
            }
        };

        let raw = self.backend.complete(&prompt).await?;
        Ok(self.normalize_decision(&raw))
    }

    fn build_vision_prompt(&self, request: &NavigationRequest) -> String {
        let mut prompt = format!("Target checkpoint: {}\n\n", request.checkpoint);

        let is_first_contact = request.recent_instructions.is_empty();
        if is_first_contact {
            prompt.push_str(
                "This is the first look for this checkpoint. If the checkpoint is visible \
                 in the frame, confirm the sighting enthusiastically and say where it is. \
                 If it is not visible, say so plainly.\n\n",
            );
        } else {
            prompt.push_str(
                "Guidance is in progress. From the frame, report obstacles, whether the \
                 path ahead is clear, and how close the checkpoint appears.\n\n",
            );
        }

        self.push_recent_instructions(&mut prompt, request, self.config.vision_history_window);

        let language = request.language.as_deref().unwrap_or("en");
        if language != "en" {
            prompt.push_str(&format!("Respond in language: {language}\n\n"));
        }

        prompt.push_str(Self::json_directive());
        prompt
    }

    fn build_detection_prompt(&self, request: &NavigationRequest) -> String {
        let mut prompt = format!("Target checkpoint: {}\n\n", request.checkpoint);

        let (frame_w, frame_h) = self.frame_dims(request);
        let summary = scene::summarize(
            &request.detections,
            frame_w,
            frame_h,
            self.config.summary_top_n,
            &self.config.thresholds,
        );

        prompt.push_str("Current scene (closest first):\n");
        if summary.is_empty() {
            prompt.push_str(CLEAR_PATH);
            prompt.push('\n');
        } else {
            for line in &summary {
                prompt.push_str(&format!("- {line}\n"));
            }
        }
        prompt.push('\n');

        self.push_recent_instructions(&mut prompt, request, self.config.detection_history_window);

        if !request.history_snippets.is_empty() {
            prompt.push_str("Conversation history:\n");
            for snippet in request.history_snippets.iter().rev().take(5).rev() {
                prompt.push_str(&format!("- {snippet}\n"));
            }
            prompt.push('\n');
        }

        prompt.push_str(Self::json_directive());
        prompt
    }

    fn push_recent_instructions(&self, prompt: &mut String, request: &NavigationRequest, window: usize) {
        if request.recent_instructions.is_empty() {
            return;
        }
        prompt.push_str("Recent instructions:\n");
        for instruction in request.recent_instructions.iter().rev().take(window).rev() {
            prompt.push_str(&format!("- {instruction}\n"));
        }
        prompt.push('\n');
    }

    fn json_directive() -> &'static str {
        "Respond with JSON only, exactly this shape:\n\
         {\n\
           \"instruction\": \"short instruction text\",\n\
           \"urgency\": \"normal|warning\",\n\
           \"reached\": false,\n\
           \"danger_level\": \"safe|caution|danger\",\n\
           \"reason\": \"brief explanation\"\n\
         }"
    }

    /// Single defaulting boundary for the raw reasoning output: any missing
    /// or unrecognized field falls back to its documented default.
    fn normalize_decision(&self, raw: &str) -> NavigationDecision {
        let parsed = match extract_json(raw) {
            Some(value) => value,
            None => {
                warn!("Reasoning output was not valid JSON, issuing safe default");
                return self.safe_default();
            }
        };

        let instruction = parsed
            .get("instruction")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("Continue forward.")
            .to_string();

        let urgency = match parsed.get("urgency").and_then(Value::as_str) {
            Some("warning") => Urgency::Warning,
            _ => Urgency::Normal,
        };

        let reached = parsed.get("reached").and_then(Value::as_bool).unwrap_or(false);

        let danger_level = match parsed.get("danger_level").and_then(Value::as_str) {
            Some("danger") => DangerLevel::Danger,
            Some("caution") => DangerLevel::Caution,
            _ => DangerLevel::Safe,
        };

        let reason = parsed
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        NavigationDecision { instruction, urgency, reached, danger_level, reason }
    }

    /// Geometric cross-check on reached:true. The reasoning service's verdict
    /// stands only if no checkpoint-matching detection contradicts it.
    fn confirm_reached(&self, request: &NavigationRequest, estimates: &[SpatialEstimate]) -> bool {
        if !self.config.verify_reached || request.detections.is_empty() {
            return true;
        }
        let checkpoint = request.checkpoint.to_lowercase();
        let matching: Vec<&SpatialEstimate> = estimates
            .iter()
            .filter(|e| {
                let label = e.label.to_lowercase();
                checkpoint.contains(&label) || label.contains(&checkpoint)
            })
            .collect();
        if matching.is_empty() {
            // Nothing to cross-check against.
            return true;
        }
        matching
            .iter()
            .any(|e| e.distance_feet <= self.config.reached_max_distance_feet)
    }

    fn frame_dims(&self, request: &NavigationRequest) -> (f32, f32) {
        (
            request.frame_width.unwrap_or(self.config.default_frame_width),
            request.frame_height.unwrap_or(self.config.default_frame_height),
        )
    }

    fn safe_default(&self) -> NavigationDecision {
        NavigationDecision {
            instruction: self.config.fallback_instruction.clone(),
            urgency: Urgency::Normal,
            reached: false,
            danger_level: DangerLevel::Safe,
            reason: String::new(),
        }
    }
}

/// Tolerate chatter around the JSON object, e.g. markdown code fences.
fn extract_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return Some(value);
        }
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&trimmed[start..=end])
        .ok()
        .filter(Value::is_object)
}
