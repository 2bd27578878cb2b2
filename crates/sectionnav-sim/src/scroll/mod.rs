//! Smooth scrolling for the simulated page
//!
//! - `easing` - easing curves (cubic, exponential, ease-in-out)
//! - `timing` - progress and interpolation helpers
//! - `config` - scroll settings shared with sectionnav-core
//! - `animation` - per-frame animation controller

pub mod config;
pub mod easing;
pub mod timing;

pub mod animation;

pub use animation::ScrollAnimator;
pub use config::{ScrollConfig, ScrollConfigExt};
pub use easing::{EasingType, EasingTypeExt};
