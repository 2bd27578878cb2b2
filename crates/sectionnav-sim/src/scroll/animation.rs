//! Scroll animation controller
//!
//! Animates the simulated page's scroll offset the way a browser does for
//! `scrollIntoView({ behavior: "smooth" })`: the host starts an animation,
//! then advances it once per frame.

use std::time::Duration;

use tokio::time::Instant;

use super::config::{ScrollConfig, ScrollConfigExt};
use super::easing::{EasingType, EasingTypeExt};
use super::timing::{is_complete, lerp, progress};

/// Active scroll animation state
#[derive(Debug, Clone)]
struct ActiveAnimation {
    start: Instant,
    from: f64,
    to: f64,
    duration: Duration,
    easing: EasingType,
}

/// Scroll animation controller
///
/// Call `scroll_to()` to begin an animation, then `update()` each frame to
/// get the current interpolated scroll offset.
#[derive(Debug, Clone)]
pub struct ScrollAnimator {
    animation: Option<ActiveAnimation>,
    config: ScrollConfig,
    /// Current scroll offset (always up-to-date)
    position: f64,
}

impl Default for ScrollAnimator {
    fn default() -> Self {
        Self::new(ScrollConfig::default())
    }
}

impl ScrollAnimator {
    pub fn new(config: ScrollConfig) -> Self {
        Self {
            animation: None,
            config,
            position: 0.0,
        }
    }

    pub fn config(&self) -> &ScrollConfig {
        &self.config
    }

    #[inline]
    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    #[inline]
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Final offset once the running animation completes
    pub fn target(&self) -> f64 {
        self.animation
            .as_ref()
            .map(|a| a.to)
            .unwrap_or(self.position)
    }

    /// Jump to an offset, cancelling any animation (user scrolling)
    pub fn set_position(&mut self, position: f64) {
        self.animation = None;
        self.position = position;
    }

    /// Start moving towards `target`
    ///
    /// Jumps immediately when `smooth` is false or smooth scrolling is
    /// disabled. A running animation is replaced, starting from wherever the
    /// page currently is.
    pub fn scroll_to(&mut self, target: f64, max_scroll: f64, smooth: bool, now: Instant) {
        let target = target.clamp(0.0, max_scroll.max(0.0));

        if !smooth || !self.config.is_smooth(false) {
            self.position = target;
            self.animation = None;
            return;
        }

        if (self.position - target).abs() < f64::EPSILON {
            self.animation = None;
            return;
        }

        self.animation = Some(ActiveAnimation {
            start: now,
            from: self.position,
            to: target,
            duration: self.config.animation_duration(),
            easing: self.config.easing,
        });
    }

    /// Advance the animation to `now` and return the current offset
    pub fn update(&mut self, max_scroll: f64, now: Instant) -> f64 {
        if let Some(ref anim) = self.animation {
            if is_complete(anim.start, anim.duration, now) {
                self.position = anim.to.min(max_scroll);
                self.animation = None;
            } else {
                let t = anim.easing.apply(progress(anim.start, anim.duration, now));
                self.position = lerp(anim.from, anim.to, t).min(max_scroll);
            }
        }

        self.position
    }

    /// Cancel any active animation and stop at the current offset
    pub fn cancel(&mut self) {
        self.animation = None;
    }
}
