use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeerConfig {
    pub server: ServerConfig,
    pub reasoning: ReasoningConfig,
    pub navigation: NavigationConfig,
    pub transcription: TranscriptionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Maximum upload size in megabytes (audio and frames)
    pub max_upload_mb: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// OpenAI-compatible API base URL
    pub base_url: String,
    /// API key; the OPENAI_API_KEY environment variable overrides this
    pub api_key: String,
    /// Model or deployment name
    pub model_name: String,
    /// Sampling temperature; kept low for near-deterministic guidance
    pub temperature: f32,
    /// Maximum tokens per decision
    pub max_tokens: usize,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Whether the model accepts image input
    pub supports_vision: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Distance band and path-blockage thresholds
    pub thresholds: SpatialThresholds,
    /// Assumed frame width when detections arrive without frame dimensions
    pub default_frame_width: f32,
    /// Assumed frame height when detections arrive without frame dimensions
    pub default_frame_height: f32,
    /// Number of closest objects included in the scene summary
    pub summary_top_n: usize,
    /// Recent instructions quoted in vision-mode prompts
    pub vision_history_window: usize,
    /// Recent instructions quoted in detection-only prompts
    pub detection_history_window: usize,
    /// Flip incoming frames horizontally (some camera sources mirror)
    pub mirror_correction: bool,
    /// Cross-check reached:true against estimated checkpoint distance
    pub verify_reached: bool,
    /// Maximum estimated feet for the reached cross-check to pass
    pub reached_max_distance_feet: f32,
    /// Instruction substituted when the reasoning call fails
    pub fallback_instruction: String,
}

/// Thresholds for the distance-band table and left/center/right split.
/// Bands are checked in order; a detection low in the frame and large
/// relative to it reads as close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialThresholds {
    /// Vertical ratio above which an object can read as 1-2 feet
    pub near_vertical: f32,
    /// Size ratio required for the 1-2 feet band
    pub near_size: f32,
    /// Vertical ratio above which an object can read as 2-4 feet
    pub close_vertical: f32,
    /// Size ratio required for the 2-4 feet band
    pub close_size: f32,
    /// Vertical ratio above which an object reads as 4-6 feet
    pub mid_vertical: f32,
    /// Vertical ratio above which an object reads as 6-10 feet
    pub far_vertical: f32,
    /// Horizontal ratio below which an object is on the left
    pub left_bound: f32,
    /// Horizontal ratio above which an object is on the right
    pub right_bound: f32,
    /// Centered objects closer than this many feet block the path
    pub obstacle_max_feet: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Whisper API base URL
    pub base_url: String,
    /// API key; the WHISPER_API_KEY environment variable overrides this
    pub api_key: String,
    /// Transcription model name
    pub model_name: String,
    /// Default language code
    pub language: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for SpatialThresholds {
    fn default() -> Self {
        Self {
            near_vertical: 0.70,
            near_size: 0.10,
            close_vertical: 0.60,
            close_size: 0.05,
            mid_vertical: 0.50,
            far_vertical: 0.40,
            left_bound: 0.33,
            right_bound: 0.67,
            obstacle_max_feet: 4.0,
        }
    }
}

impl Default for SeerConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                max_upload_mb: 50,
            },
            reasoning: ReasoningConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: String::new(),
                model_name: "gpt-4o-mini".to_string(),
                temperature: 0.2,
                max_tokens: 150,
                timeout_seconds: 8,
                supports_vision: true,
            },
            navigation: NavigationConfig {
                thresholds: SpatialThresholds::default(),
                default_frame_width: 1280.0,
                default_frame_height: 720.0,
                summary_top_n: 5,
                vision_history_window: 2,
                detection_history_window: 3,
                mirror_correction: true,
                verify_reached: true,
                reached_max_distance_feet: 2.0,
                fallback_instruction: "Continue forward carefully.".to_string(),
            },
            transcription: TranscriptionConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: String::new(),
                model_name: "whisper-1".to_string(),
                language: "en".to_string(),
                timeout_seconds: 20,
            },
        }
    }
}

impl SeerConfig {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            // Create default config file
            let default_config = Self::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            fs::write(path, toml_content).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }
}
