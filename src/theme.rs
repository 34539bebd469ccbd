//! Colour lookup for node drawing.

use eframe::egui::Color32;
use serde::{Deserialize, Serialize};

/// Colours used when painting nodes, derived from the light/dark setting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    /// Whether the dark palette is active
    pub dark: bool,
}

impl Default for Theme {
    fn default() -> Self {
        Self { dark: true }
    }
}

impl Theme {
    /// Creates a theme for the given mode.
    pub fn new(dark: bool) -> Self {
        Self { dark }
    }

    /// Node body fill.
    pub fn node_fill(&self) -> Color32 {
        if self.dark {
            Color32::from_rgb(53, 53, 58)
        } else {
            Color32::from_rgb(236, 236, 240)
        }
    }

    /// Title bar fill.
    pub fn title_fill(&self) -> Color32 {
        if self.dark {
            Color32::from_rgb(34, 34, 40)
        } else {
            Color32::from_rgb(200, 204, 214)
        }
    }

    /// Default border colour.
    pub fn border(&self) -> Color32 {
        if self.dark {
            Color32::from_gray(20)
        } else {
            Color32::from_gray(120)
        }
    }

    /// Border colour for selected nodes.
    pub fn selected_border(&self) -> Color32 {
        Color32::from_rgb(255, 210, 80)
    }

    /// Glow colour for executing / recently executed nodes.
    pub fn highlight(&self) -> Color32 {
        Color32::from_rgb(80, 200, 255)
    }

    /// Error banner and error border.
    pub fn error(&self) -> Color32 {
        Color32::from_rgb(230, 60, 60)
    }

    /// Progress bar fill.
    pub fn progress_fill(&self) -> Color32 {
        Color32::from_rgb(70, 160, 90)
    }

    /// Progress bar track.
    pub fn progress_track(&self) -> Color32 {
        if self.dark {
            Color32::from_gray(30)
        } else {
            Color32::from_gray(210)
        }
    }

    /// Body text.
    pub fn text(&self) -> Color32 {
        if self.dark {
            Color32::from_gray(220)
        } else {
            Color32::from_gray(30)
        }
    }

    /// Secondary text such as slot labels.
    pub fn muted_text(&self) -> Color32 {
        if self.dark {
            Color32::from_gray(150)
        } else {
            Color32::from_gray(90)
        }
    }

    /// Link stroke colour.
    pub fn link(&self) -> Color32 {
        if self.dark {
            Color32::from_gray(170)
        } else {
            Color32::from_gray(80)
        }
    }
}
