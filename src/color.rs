use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use molstack::stack::chunk::FlagReason;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// `n` evenly spaced hues starting at `start_hue` degrees.
pub fn generate_palette(n: usize, start_hue: f32) -> Vec<Color32> {
    let step = 360.0 / n.max(1) as f32;
    (0..n)
        .map(|i| {
            let hsl = Hsl::new((start_hue + i as f32 * step) % 360.0, 0.7, 0.6);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: chunk status → Color32
// ---------------------------------------------------------------------------

const STACKED_HUE: f32 = 210.0;

const STATUSES: [Option<FlagReason>; 5] = [
    None,
    Some(FlagReason::Empty),
    Some(FlagReason::NoData),
    Some(FlagReason::Dropped),
    Some(FlagReason::Interloper),
];

/// Maps each chunk status (stacked, or a flag reason) to a distinct colour.
#[derive(Clone)]
pub struct StatusColors {
    mapping: BTreeMap<Option<FlagReason>, Color32>,
    default_color: Color32,
}

impl Default for StatusColors {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusColors {
    pub fn new() -> Self {
        let mapping = STATUSES
            .into_iter()
            // Stacked chunks in blue, flags spread over the rest of the wheel.
            .zip(generate_palette(STATUSES.len(), STACKED_HUE))
            .collect();
        StatusColors {
            mapping,
            default_color: Color32::GRAY,
        }
    }

    /// Look up the colour for a chunk's flag.
    pub fn color_for(&self, flag: Option<FlagReason>) -> Color32 {
        self.mapping
            .get(&flag)
            .copied()
            .unwrap_or(self.default_color)
    }

    /// Return the legend entries (status label → colour) for the UI.
    pub fn legend_entries(&self) -> Vec<(String, Color32)> {
        self.mapping
            .iter()
            .map(|(flag, c)| (status_label(*flag), *c))
            .collect()
    }
}

/// Human-readable chunk status.
pub fn status_label(flag: Option<FlagReason>) -> String {
    match flag {
        None => "stacked".to_string(),
        Some(reason) => reason.to_string(),
    }
}
