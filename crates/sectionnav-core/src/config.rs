use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::section::SectionId;
use crate::visibility::RootMargin;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub sections: SectionsConfig,
    #[serde(default)]
    pub visibility: VisibilityConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub scroll: ScrollConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// The closed set of section ids the page may use
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionsConfig {
    /// Known section ids; empty means the registry alone decides
    #[serde(default)]
    pub known: Vec<SectionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityConfig {
    /// Intersection threshold handed to the host observer (0.0-1.0)
    #[serde(default = "default_visibility_threshold")]
    pub threshold: f64,
    /// CSS-style root margin, e.g. "-80px 0px -80px 0px"
    #[serde(default = "default_root_margin")]
    pub root_margin: String,
    /// Debounce before the most visible section is recomputed
    #[serde(default = "default_visibility_debounce")]
    pub debounce_ms: u64,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            threshold: default_visibility_threshold(),
            root_margin: default_root_margin(),
            debounce_ms: default_visibility_debounce(),
        }
    }
}

/// Debounce windows and timeouts, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Delay before a scroll-driven hash rewrite is applied
    #[serde(default = "default_hash_debounce")]
    pub hash_debounce_ms: u64,
    /// Delay before the scroll observer forwards a new visible section
    #[serde(default = "default_observer_debounce")]
    pub observer_debounce_ms: u64,
    /// How long external hash changes are ignored after our own rewrite
    #[serde(default = "default_hash_guard")]
    pub hash_guard_ms: u64,
    /// Quiet period after the last scroll event before a programmatic scroll ends
    #[serde(default = "default_scroll_quiet")]
    pub scroll_quiet_ms: u64,
    /// Upper bound for a programmatic scroll when no scroll events arrive
    #[serde(default = "default_scroll_fallback")]
    pub scroll_fallback_ms: u64,
    /// Delay between attempts to find a section that is not mounted yet
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Attempts before a navigation to a missing section is dropped
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            hash_debounce_ms: default_hash_debounce(),
            observer_debounce_ms: default_observer_debounce(),
            hash_guard_ms: default_hash_guard(),
            scroll_quiet_ms: default_scroll_quiet(),
            scroll_fallback_ms: default_scroll_fallback(),
            retry_delay_ms: default_retry_delay(),
            max_retries: default_max_retries(),
        }
    }
}

impl TimingConfig {
    pub fn hash_debounce(&self) -> Duration {
        Duration::from_millis(self.hash_debounce_ms)
    }

    pub fn observer_debounce(&self) -> Duration {
        Duration::from_millis(self.observer_debounce_ms)
    }

    pub fn hash_guard(&self) -> Duration {
        Duration::from_millis(self.hash_guard_ms)
    }

    pub fn scroll_quiet(&self) -> Duration {
        Duration::from_millis(self.scroll_quiet_ms)
    }

    pub fn scroll_fallback(&self) -> Duration {
        Duration::from_millis(self.scroll_fallback_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Easing curve used when animating a smooth scroll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EasingType {
    /// Jump at the end of the animation
    None,
    Linear,
    /// Cubic ease-out
    Cubic,
    /// Exponential ease-out
    EaseOut,
    /// Cubic ease-in-out, close to what browsers use for smooth scrolling
    #[default]
    EaseInOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollConfig {
    /// Use smooth scrolling unless the host prefers reduced motion
    #[serde(default = "default_true")]
    pub smooth_enabled: bool,
    /// Estimated duration of a smooth scroll
    #[serde(default = "default_animation_duration")]
    pub animation_duration_ms: u64,
    /// Easing curve for hosts that animate the scroll themselves
    #[serde(default)]
    pub easing: EasingType,
    /// Visibility ratio at which a target counts as already in view
    #[serde(default = "default_already_visible_threshold")]
    pub already_visible_threshold: f64,
    /// Animation frames per second
    #[serde(default = "default_animation_fps")]
    pub animation_fps: u32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            smooth_enabled: default_true(),
            animation_duration_ms: default_animation_duration(),
            easing: EasingType::default(),
            already_visible_threshold: default_already_visible_threshold(),
            animation_fps: default_animation_fps(),
        }
    }
}

impl ScrollConfig {
    /// How long a scroll to a section is expected to take
    pub fn estimated_duration(&self, reduced_motion: bool) -> Duration {
        if reduced_motion || !self.smooth_enabled {
            Duration::ZERO
        } else {
            Duration::from_millis(self.animation_duration_ms)
        }
    }

    /// Interval between animation frames
    pub fn frame_interval(&self) -> Duration {
        if self.animation_fps == 0 {
            Duration::from_millis(16) // ~60fps fallback
        } else {
            Duration::from_millis((1000 / self.animation_fps as u64).max(1))
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_visibility_threshold() -> f64 {
    0.3
}

fn default_root_margin() -> String {
    // Ignore the fixed header and bottom nav bands
    "-80px 0px -80px 0px".to_string()
}

fn default_visibility_debounce() -> u64 {
    100
}

fn default_hash_debounce() -> u64 {
    150
}

fn default_observer_debounce() -> u64 {
    150
}

fn default_hash_guard() -> u64 {
    100
}

fn default_scroll_quiet() -> u64 {
    100
}

fn default_scroll_fallback() -> u64 {
    1500
}

fn default_retry_delay() -> u64 {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_animation_duration() -> u64 {
    800
}

fn default_already_visible_threshold() -> f64 {
    0.3
}

fn default_animation_fps() -> u32 {
    60
}

impl NavConfig {
    /// Load configuration from the default path or return defaults
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file, falling back to defaults if it is absent
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Self>(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> crate::Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the configuration file path
    /// Always uses ~/.config/sectionnav/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("sectionnav")
            .join("config.toml")
    }

    /// Check ranges and formats that serde cannot express
    pub fn validate(&self) -> crate::Result<()> {
        check_ratio("visibility.threshold", self.visibility.threshold)?;
        check_ratio(
            "scroll.already_visible_threshold",
            self.scroll.already_visible_threshold,
        )?;
        self.root_margin()?;

        if self.scroll.animation_fps > MAX_ANIMATION_FPS {
            return Err(crate::Error::Config(format!(
                "scroll.animation_fps must be at most {MAX_ANIMATION_FPS}, got {}",
                self.scroll.animation_fps
            )));
        }

        if let Some(empty) = self.sections.known.iter().find(|id| id.as_str().trim().is_empty()) {
            return Err(crate::Error::Config(format!(
                "sections.known contains an empty id ({:?})",
                empty.as_str()
            )));
        }

        Ok(())
    }

    /// Parsed visibility root margin
    pub fn root_margin(&self) -> crate::Result<RootMargin> {
        self.visibility.root_margin.parse()
    }
}

/// Frames shorter than a millisecond cannot be scheduled
const MAX_ANIMATION_FPS: u32 = 1000;

fn check_ratio(name: &str, value: f64) -> crate::Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(crate::Error::Config(format!(
            "{name} must be between 0.0 and 1.0, got {value}"
        )))
    }
}
