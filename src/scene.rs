use tracing::debug;

use crate::config::SpatialThresholds;
use crate::spatial::{estimate, Detection, SpatialEstimate};

/// Substituted by the decision engine when a summary comes back empty.
pub const CLEAR_PATH: &str = "Path appears clear, no obstacles detected.";

/// Estimate every detection and rank by proximity, closest first. The sort is
/// stable, so detections sharing a distance band keep their original order.
pub fn rank_by_proximity(
    detections: &[Detection],
    frame_w: f32,
    frame_h: f32,
    th: &SpatialThresholds,
) -> Vec<SpatialEstimate> {
    let mut estimates: Vec<SpatialEstimate> = detections
        .iter()
        .map(|d| estimate(d, frame_w, frame_h, th))
        .collect();
    estimates.sort_by(|a, b| {
        a.distance_feet
            .partial_cmp(&b.distance_feet)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    estimates
}

/// Render the `top_n` closest objects as compact prompt lines, e.g.
/// `person: 2-4 feet away, center side, blocking your path`.
/// Returns an empty Vec for an empty batch.
pub fn summarize(
    detections: &[Detection],
    frame_w: f32,
    frame_h: f32,
    top_n: usize,
    th: &SpatialThresholds,
) -> Vec<String> {
    let estimates = rank_by_proximity(detections, frame_w, frame_h, th);
    let lines: Vec<String> = estimates.iter().take(top_n).map(render_line).collect();
    debug!("Scene summary: {} of {} detections rendered", lines.len(), detections.len());
    lines
}

fn render_line(est: &SpatialEstimate) -> String {
    let mut line = format!(
        "{}: {} away, {} side",
        est.label,
        est.distance.label(),
        est.position.as_str()
    );
    if est.is_direct_obstacle {
        line.push_str(", blocking your path");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::BoundingBox;

    fn det(label: &str, cx: f32, cy: f32, w: f32, h: f32) -> Detection {
        Detection {
            label: label.to_string(),
            confidence: 0.9,
            bbox: BoundingBox { cx, cy, w, h },
        }
    }

    fn th() -> SpatialThresholds {
        SpatialThresholds::default()
    }

    #[test]
    fn summary_is_sorted_closest_first() {
        let dets = vec![
            det("far-chair", 500.0, 200.0, 10.0, 10.0),     // 10+ feet
            det("near-person", 500.0, 650.0, 300.0, 300.0), // 2-4 feet
            det("mid-table", 500.0, 560.0, 10.0, 10.0),     // 4-6 feet
        ];
        let lines = summarize(&dets, 1000.0, 1000.0, 5, &th());
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("near-person:"));
        assert!(lines[1].starts_with("mid-table:"));
        assert!(lines[2].starts_with("far-chair:"));
    }

    #[test]
    fn ties_preserve_original_order() {
        // All three land in the same band, so ranking must keep detection order.
        let dets = vec![
            det("first", 500.0, 200.0, 5.0, 5.0),
            det("second", 500.0, 210.0, 5.0, 5.0),
            det("third", 500.0, 220.0, 5.0, 5.0),
        ];
        let ranked = rank_by_proximity(&dets, 1000.0, 1000.0, &th());
        let labels: Vec<&str> = ranked.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["first", "second", "third"]);
    }

    #[test]
    fn summary_caps_at_top_n() {
        let dets: Vec<Detection> = (0..8)
            .map(|i| det(&format!("obj{i}"), 500.0, 200.0, 5.0, 5.0))
            .collect();
        let lines = summarize(&dets, 1000.0, 1000.0, 5, &th());
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn empty_batch_yields_empty_summary() {
        let lines = summarize(&[], 1280.0, 720.0, 5, &th());
        assert!(lines.is_empty());
    }

    #[test]
    fn blocking_marker_only_on_direct_obstacles() {
        let dets = vec![
            det("person", 640.0, 600.0, 200.0, 300.0), // center, 2-4 feet
            det("sign", 100.0, 600.0, 200.0, 300.0),   // left, same band
        ];
        let lines = summarize(&dets, 1280.0, 720.0, 5, &th());
        assert_eq!(lines[0], "person: 2-4 feet away, center side, blocking your path");
        assert_eq!(lines[1], "sign: 2-4 feet away, left side");
    }
}
