//! Window and circle layout.

use serde::Deserialize;

/// Display configuration (pixels, 8-bit sRGB colours)
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    pub window_width: u32,
    pub window_height: u32,

    /// Horizontal distance between circle centres; the first sits one spacing in
    pub circle_spacing_px: f32,

    /// Vertical position of the circle centres
    pub circle_y_px: f32,

    pub circle_radius_px: f32,

    pub background: [u8; 3],

    /// Fill of a silent voice
    pub inactive_color: [u8; 3],

    /// Halo width at spectral entropy 1, as a fraction of the radius
    pub halo_gain: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            window_width: 600,
            window_height: 250,
            circle_spacing_px: 120.0,
            circle_y_px: 120.0,
            circle_radius_px: 40.0,
            background: [0, 0, 0],
            inactive_color: [190, 190, 190],
            halo_gain: 0.5,
        }
    }
}

impl DisplayConfig {
    /// Centre of circle `index` in window pixels
    pub fn circle_center(&self, index: usize) -> (f32, f32) {
        (
            self.circle_spacing_px * (index as f32 + 1.0),
            self.circle_y_px,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_circle_layout() {
        let display = DisplayConfig::default();
        let xs: Vec<f32> = (0..4).map(|i| display.circle_center(i).0).collect();
        assert_eq!(xs, vec![120.0, 240.0, 360.0, 480.0]);
        assert_eq!(display.circle_center(0).1, 120.0);
    }
}
