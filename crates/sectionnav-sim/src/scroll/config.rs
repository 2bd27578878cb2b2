//! Scroll settings as the simulated page sees them

use std::time::Duration;

pub use sectionnav_core::{EasingType, ScrollConfig};

/// Extension trait for ScrollConfig with utility methods
pub trait ScrollConfigExt {
    /// Get animation duration as Duration
    fn animation_duration(&self) -> Duration;

    /// Whether a scroll on a page with this motion preference animates
    fn is_smooth(&self, reduced_motion: bool) -> bool;
}

impl ScrollConfigExt for ScrollConfig {
    #[inline]
    fn animation_duration(&self) -> Duration {
        Duration::from_millis(self.animation_duration_ms)
    }

    #[inline]
    fn is_smooth(&self, reduced_motion: bool) -> bool {
        !self.estimated_duration(reduced_motion).is_zero()
            && self.easing != EasingType::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScrollConfig::default();
        assert!(config.smooth_enabled);
        assert_eq!(config.animation_duration_ms, 800);
        assert_eq!(config.easing, EasingType::EaseInOut);
        assert_eq!(config.animation_fps, 60);
    }

    #[test]
    fn test_is_smooth() {
        let mut config = ScrollConfig::default();
        assert!(config.is_smooth(false));
        assert!(!config.is_smooth(true));

        config.smooth_enabled = false;
        assert!(!config.is_smooth(false));

        config.smooth_enabled = true;
        config.animation_duration_ms = 0;
        assert!(!config.is_smooth(false));

        config.animation_duration_ms = 800;
        config.easing = EasingType::None;
        assert!(!config.is_smooth(false));
    }
}
