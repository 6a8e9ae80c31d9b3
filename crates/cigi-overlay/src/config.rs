#![forbid(unsafe_code)]

//! Overlay configuration.
//!
//! Every tunable of the overlay lives in one [`OverlayConfig`] that can be
//! loaded from JSON at startup. Missing fields take their defaults, so a
//! partial document only overrides what it names:
//!
//! ```json
//! { "button": { "snap_inset": 12 }, "panel": { "min_size": { "width": 400, "height": 240 } } }
//! ```
//!
//! `OverlayConfig::default()` reproduces the stock extension behavior.

use serde::{Deserialize, Serialize};

use cigi_core::{DEFAULT_DRAG_THRESHOLD, ResizeBounds, SNAP_TRANSITION_MS, Size, SnapTransition};

/// Top-level overlay configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OverlayConfig {
    /// Pointer gesture discrimination.
    pub drag: DragConfig,
    /// Floating launcher geometry and snapping.
    pub button: ButtonConfig,
    /// Overlay panel geometry.
    pub panel: PanelConfig,
    /// Keys used in the shared and page-local stores.
    pub storage: StorageKeys,
}

/// Drag-vs-click discrimination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragConfig {
    /// Per-axis movement in px beyond which a press is a drag.
    pub threshold: f64,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DRAG_THRESHOLD,
        }
    }
}

/// Floating launcher configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonConfig {
    /// Nominal size, also used when the element measures as zero.
    pub size: Size,
    /// Viewport clearance kept while dragging.
    pub drag_margin: f64,
    /// Distance from the docked edge after a snap.
    pub snap_inset: f64,
    /// Duration of the eased snap transition.
    pub snap_transition_ms: u32,
    /// Tooltip shown on the launcher.
    pub title: String,
    /// Extension-relative icon path.
    pub icon: String,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            size: Size::new(40.0, 40.0),
            drag_margin: 4.0,
            snap_inset: 8.0,
            snap_transition_ms: SNAP_TRANSITION_MS,
            title: "CIGI Floating Button".to_owned(),
            icon: "icon-32.png".to_owned(),
        }
    }
}

impl ButtonConfig {
    #[must_use]
    pub fn snap_transition(&self) -> SnapTransition {
        SnapTransition {
            duration_ms: self.snap_transition_ms,
        }
    }
}

/// Overlay panel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Viewport clearance for drags, restores, and resizes.
    pub margin: f64,
    /// Resize floor.
    pub min_size: Size,
    /// Width at creation.
    pub default_width: f64,
    /// Height at creation as a fraction of the viewport height.
    pub default_height_ratio: f64,
    /// Top offset at creation as a fraction of the viewport height.
    pub default_top_ratio: f64,
    /// Right offset at creation.
    pub default_right: f64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            margin: 8.0,
            min_size: Size::new(360.0, 200.0),
            default_width: 720.0,
            default_height_ratio: 0.7,
            default_top_ratio: 0.1,
            default_right: 16.0,
        }
    }
}

impl PanelConfig {
    /// Panel size at creation for a viewport.
    #[must_use]
    pub fn default_size(&self, viewport: Size) -> Size {
        Size::new(
            self.default_width,
            viewport.height * self.default_height_ratio,
        )
    }

    #[must_use]
    pub fn resize_bounds(&self) -> ResizeBounds {
        ResizeBounds {
            min: self.min_size,
            margin: self.margin,
        }
    }
}

/// Storage key names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    pub overlay_enabled: String,
    pub floating_button_enabled: String,
    pub locale_override: String,
    /// Panel position in the shared store.
    pub window_position: String,
    /// Panel position in the page-local fallback store.
    pub fallback_window_position: String,
    /// Flag from the first schema revision, removed on migration.
    pub legacy_dev_mode: String,
    pub preferences_version: String,
    /// Theme choice in the page-local store.
    pub theme: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            overlay_enabled: "overlayEnabled".to_owned(),
            floating_button_enabled: "floatingButtonEnabled".to_owned(),
            locale_override: "localeOverride".to_owned(),
            window_position: "overlayWindowPosition".to_owned(),
            fallback_window_position: "cigi_overlay_window_position".to_owned(),
            legacy_dev_mode: "devModeEnabled".to_owned(),
            preferences_version: "preferencesVersion".to_owned(),
            theme: "cigi_theme".to_owned(),
        }
    }
}

impl OverlayConfig {
    /// Parse a (possibly partial) JSON document over the defaults.
    pub fn from_json_str(s: &str) -> Result<Self, OverlayConfigError> {
        serde_json::from_str(s).map_err(OverlayConfigError::Json)
    }

    /// Parse and validate in one step.
    pub fn load_json(s: &str) -> Result<Self, OverlayConfigError> {
        let config = Self::from_json_str(s)?;
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(OverlayConfigError::Validation(errors))
        }
    }

    /// Validate all parameters are within acceptable ranges.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.drag.threshold.is_finite() || self.drag.threshold < 0.0 {
            errors.push(format!(
                "drag.threshold must be finite and >= 0, got {}",
                self.drag.threshold
            ));
        }

        if self.button.size.is_degenerate() {
            errors.push(format!(
                "button.size must be positive, got {}x{}",
                self.button.size.width, self.button.size.height
            ));
        }
        for (name, value) in [
            ("button.drag_margin", self.button.drag_margin),
            ("button.snap_inset", self.button.snap_inset),
            ("panel.margin", self.panel.margin),
            ("panel.default_right", self.panel.default_right),
        ] {
            if !value.is_finite() || value < 0.0 {
                errors.push(format!("{name} must be finite and >= 0, got {value}"));
            }
        }

        if self.panel.min_size.is_degenerate() {
            errors.push(format!(
                "panel.min_size must be positive, got {}x{}",
                self.panel.min_size.width, self.panel.min_size.height
            ));
        }
        if self.panel.default_width < self.panel.min_size.width {
            errors.push(format!(
                "panel.default_width must be >= panel.min_size.width, got {}",
                self.panel.default_width
            ));
        }
        for (name, value) in [
            ("panel.default_height_ratio", self.panel.default_height_ratio),
            ("panel.default_top_ratio", self.panel.default_top_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("{name} must be in [0, 1], got {value}"));
            }
        }

        let keys = [
            &self.storage.overlay_enabled,
            &self.storage.floating_button_enabled,
            &self.storage.locale_override,
            &self.storage.window_position,
            &self.storage.fallback_window_position,
            &self.storage.legacy_dev_mode,
            &self.storage.preferences_version,
            &self.storage.theme,
        ];
        if keys.iter().any(|key| key.is_empty()) {
            errors.push("storage keys must be non-empty".into());
        }
        let mut unique = keys.to_vec();
        unique.sort();
        unique.dedup();
        if unique.len() != keys.len() {
            errors.push("storage keys must be distinct".into());
        }

        errors
    }
}

/// Errors that can occur when loading an overlay configuration.
#[derive(Debug)]
pub enum OverlayConfigError {
    /// JSON parse error.
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for OverlayConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for OverlayConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}
