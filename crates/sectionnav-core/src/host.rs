//! The DOM-like environment the navigator runs against
//!
//! A [`Host`] exposes element geometry, scrolling, focus, attributes,
//! viewport-intersection observation and the history/URL API. Notifications
//! flow the other way as [`HostEvent`]s handed to the navigator.

use serde::Serialize;
use tokio::time::Instant;

use crate::section::ElementRef;
use crate::visibility::RootMargin;
use crate::Result;

/// Element bounds relative to the viewport (like `getBoundingClientRect`)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub top: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(top: f64, height: f64) -> Self {
        Self { top, height }
    }

    #[inline]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollBehavior {
    /// Jump straight to the target
    Instant,
    /// Animate to the target
    Smooth,
}

/// How a history write treats the current entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// Add a new entry
    Push,
    /// Rewrite the current entry in place
    Replace,
}

/// Options handed to the host's intersection observer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverOptions {
    pub threshold: f64,
    pub root_margin: RootMargin,
}

/// One intersection observation for an element
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionEntry {
    pub target: ElementRef,
    pub is_intersecting: bool,
    pub ratio: f64,
}

/// Notifications from the host
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// The URL fragment changed outside of the navigator (back/forward, typed URL)
    HashChange,
    /// The scroll container moved
    Scroll,
    /// A batch of intersection observations
    Intersections(Vec<IntersectionEntry>),
}

pub trait Host {
    /// Current fragment including the leading `#`, or an empty string
    fn location_hash(&self) -> String;

    /// Add a history entry for `fragment` without scrolling (router push)
    fn push_history(&mut self, fragment: &str) -> Result<()>;

    /// Rewrite the current history entry to `fragment` without scrolling (router replace)
    fn replace_history(&mut self, fragment: &str) -> Result<()>;

    /// Raw URL mutation used when the history API fails
    fn set_url_fragment(&mut self, fragment: &str, mode: HistoryMode);

    fn viewport_height(&self) -> f64;

    /// Viewport-relative bounds, or `None` if the element is not mounted
    fn bounding_rect(&self, element: ElementRef) -> Option<Rect>;

    fn is_mounted(&self, element: ElementRef) -> bool {
        self.bounding_rect(element).is_some()
    }

    /// Align the element's top with the top of the viewport
    fn scroll_into_view(&mut self, element: ElementRef, behavior: ScrollBehavior);

    fn attribute(&self, element: ElementRef, name: &str) -> Option<String>;

    fn set_attribute(&mut self, element: ElementRef, name: &str, value: &str);

    fn remove_attribute(&mut self, element: ElementRef, name: &str);

    /// Move keyboard focus; `prevent_scroll` keeps the viewport where it is
    fn focus(&mut self, element: ElementRef, prevent_scroll: bool);

    fn prefers_reduced_motion(&self) -> bool;

    fn supports_intersection_observer(&self) -> bool {
        true
    }

    /// Start reporting intersections for `element`
    fn observe(&mut self, element: ElementRef, options: &ObserverOptions);

    /// Stop reporting intersections for every element
    fn disconnect_observer(&mut self);

    /// Paint boundary. Hosts that animate or batch work return the events it produced.
    fn on_animation_frame(&mut self, _now: Instant) -> Vec<HostEvent> {
        Vec::new()
    }
}
