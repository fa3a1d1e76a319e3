use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::config::SpatialThresholds;

/// Detection bounding box as center coordinates plus size, in pixels.
/// Serialized as the detector's `[cx, cy, w, h]` array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        Self { cx: v[0], cy: v[1], w: v[2], h: v[3] }
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.cx, b.cy, b.w, b.h]
    }
}

/// One detected object as reported by the detection service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "cls")]
    pub label: String,
    #[serde(rename = "conf")]
    pub confidence: f32,
    #[serde(rename = "xywh")]
    pub bbox: BoundingBox,
}

/// Coarse proximity category derived from 2D box geometry, not true depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceBucket {
    #[serde(rename = "1-2 feet")]
    WithinReach,
    #[serde(rename = "2-4 feet")]
    Near,
    #[serde(rename = "4-6 feet")]
    Mid,
    #[serde(rename = "6-10 feet")]
    Far,
    #[serde(rename = "10+ feet")]
    Distant,
}

impl DistanceBucket {
    pub fn label(&self) -> &'static str {
        match self {
            DistanceBucket::WithinReach => "1-2 feet",
            DistanceBucket::Near => "2-4 feet",
            DistanceBucket::Mid => "4-6 feet",
            DistanceBucket::Far => "6-10 feet",
            DistanceBucket::Distant => "10+ feet",
        }
    }

    /// Representative feet value used for proximity ranking.
    pub fn feet(&self) -> f32 {
        match self {
            DistanceBucket::WithinReach => 1.5,
            DistanceBucket::Near => 3.0,
            DistanceBucket::Mid => 5.0,
            DistanceBucket::Far => 8.0,
            DistanceBucket::Distant => 12.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalPosition {
    Left,
    Center,
    Right,
}

impl HorizontalPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            HorizontalPosition::Left => "left",
            HorizontalPosition::Center => "center",
            HorizontalPosition::Right => "right",
        }
    }
}

/// Semantic view of one detection: where it sits relative to the walking path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialEstimate {
    #[serde(rename = "cls")]
    pub label: String,
    #[serde(rename = "conf")]
    pub confidence: f32,
    pub distance: DistanceBucket,
    pub distance_feet: f32,
    pub position: HorizontalPosition,
    pub is_direct_obstacle: bool,
}

/// Estimate distance bucket, horizontal position, and path blockage for one
/// detection. Pure function of the box geometry and frame size; the band
/// thresholds come from configuration.
///
/// Objects lower in the frame and larger relative to the frame read as
/// closer. Bands are checked top to bottom, first match wins.
pub fn estimate(det: &Detection, frame_w: f32, frame_h: f32, th: &SpatialThresholds) -> SpatialEstimate {
    // Tolerate degenerate frame dims rather than dividing by zero.
    let frame_w = if frame_w > 0.0 { frame_w } else { 1.0 };
    let frame_h = if frame_h > 0.0 { frame_h } else { 1.0 };

    let vertical_ratio = det.bbox.cy / frame_h;
    let size_ratio = (det.bbox.w * det.bbox.h) / (frame_w * frame_h);
    let horizontal_ratio = det.bbox.cx / frame_w;

    let distance = if vertical_ratio > th.near_vertical && size_ratio > th.near_size {
        DistanceBucket::WithinReach
    } else if vertical_ratio > th.close_vertical && size_ratio > th.close_size {
        DistanceBucket::Near
    } else if vertical_ratio > th.mid_vertical {
        DistanceBucket::Mid
    } else if vertical_ratio > th.far_vertical {
        DistanceBucket::Far
    } else {
        DistanceBucket::Distant
    };

    // Boundaries are exclusive on both sides: exactly 0.33 or 0.67 is center.
    let position = if horizontal_ratio < th.left_bound {
        HorizontalPosition::Left
    } else if horizontal_ratio > th.right_bound {
        HorizontalPosition::Right
    } else {
        HorizontalPosition::Center
    };

    let distance_feet = distance.feet();
    let is_direct_obstacle =
        position == HorizontalPosition::Center && distance_feet < th.obstacle_max_feet;

    SpatialEstimate {
        label: det.label.clone(),
        confidence: det.confidence,
        distance,
        distance_feet,
        position,
        is_direct_obstacle,
    }
}

/// Validation boundary for incoming detection batches: each entry is parsed
/// independently and unparseable ones are skipped, so one malformed object
/// never aborts the whole batch.
pub fn parse_detections(values: &[Value]) -> Vec<Detection> {
    values
        .iter()
        .filter_map(|v| match serde_json::from_value::<Detection>(v.clone()) {
            Ok(det) => Some(det),
            Err(e) => {
                warn!("Skipping malformed detection entry: {}", e);
                None
            }
        })
        .collect()
}
