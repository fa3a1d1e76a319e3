use anyhow::{Context, Result};
use image::DynamicImage;
use tracing::debug;

/// Decode a raw camera frame and correct orientation. Some camera sources
/// deliver horizontally mirrored frames; the flip is a per-deployment toggle
/// because the defect is source-dependent.
pub fn normalize_frame(bytes: &[u8], mirror_correction: bool) -> Result<DynamicImage> {
    let image = image::load_from_memory(bytes).context("failed to decode frame image")?;
    if mirror_correction {
        debug!("Applying horizontal mirror correction to {}x{} frame", image.width(), image.height());
        Ok(image.fliph())
    } else {
        Ok(image)
    }
}
