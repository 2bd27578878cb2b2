//! Most-visible-section detection
//!
//! Wraps the host's intersection observer. Every observation batch updates a
//! running set of intersecting sections; after a short debounce the section
//! with the highest ratio becomes the active one. The detector only reports:
//! it never scrolls and never touches the URL, so it is safe to keep running
//! while the navigator scrolls programmatically.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::NavConfig;
use crate::host::{Host, IntersectionEntry, ObserverOptions, Rect};
use crate::section::{ElementRef, SectionId, SectionRefs};
use crate::timer::Deadline;
use crate::{Error, Result};

/// CSS-style margin around the viewport, in pixels. Negative values shrink it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RootMargin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl RootMargin {
    /// Vertical extent of the observation root for a viewport
    pub fn vertical_bounds(&self, viewport_height: f64) -> (f64, f64) {
        (-self.top, viewport_height + self.bottom)
    }
}

impl FromStr for RootMargin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let values = s
            .split_whitespace()
            .map(parse_length)
            .collect::<Result<Vec<f64>>>()?;

        // Same shorthand expansion as the CSS margin property
        let (top, right, bottom, left) = match values.as_slice() {
            [all] => (*all, *all, *all, *all),
            [vertical, horizontal] => (*vertical, *horizontal, *vertical, *horizontal),
            [top, horizontal, bottom] => (*top, *horizontal, *bottom, *horizontal),
            [top, right, bottom, left] => (*top, *right, *bottom, *left),
            _ => {
                return Err(Error::Config(format!(
                    "root margin needs 1 to 4 values, got {s:?}"
                )))
            }
        };

        Ok(Self {
            top,
            right,
            bottom,
            left,
        })
    }
}

fn parse_length(token: &str) -> Result<f64> {
    let number = token.strip_suffix("px").unwrap_or(token);
    let value: f64 = number
        .parse()
        .map_err(|_| Error::Config(format!("invalid root margin length {token:?}")))?;

    // Unitless lengths are only valid for zero
    if number.len() == token.len() && value != 0.0 {
        return Err(Error::Config(format!(
            "root margin length {token:?} needs a px unit"
        )));
    }
    Ok(value)
}

impl fmt::Display for RootMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}px {}px {}px {}px",
            self.top, self.right, self.bottom, self.left
        )
    }
}

/// Fraction of `rect` inside the observation root
pub fn intersection_ratio(rect: Rect, viewport_height: f64, margin: &RootMargin) -> f64 {
    if rect.height <= 0.0 {
        return 0.0;
    }
    let (root_top, root_bottom) = margin.vertical_bounds(viewport_height);
    let visible = rect.bottom().min(root_bottom) - rect.top.max(root_top);
    (visible / rect.height).clamp(0.0, 1.0)
}

/// Reported when the most visible section changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityChange {
    pub active: Option<SectionId>,
}

#[derive(Debug)]
pub struct VisibilityDetector {
    options: ObserverOptions,
    debounce: Duration,
    /// Observed element to section lookup
    targets: HashMap<ElementRef, SectionId>,
    /// Currently intersecting sections in first-seen order
    visible: Vec<(SectionId, f64)>,
    active: Option<SectionId>,
    pending: Deadline,
    observing: bool,
}

impl VisibilityDetector {
    pub fn new(options: ObserverOptions, debounce: Duration) -> Self {
        Self {
            options,
            debounce,
            targets: HashMap::new(),
            visible: Vec::new(),
            active: None,
            pending: Deadline::new(),
            observing: false,
        }
    }

    pub fn from_config(config: &NavConfig) -> Result<Self> {
        let options = ObserverOptions {
            threshold: config.visibility.threshold,
            root_margin: config.root_margin()?,
        };
        Ok(Self::new(
            options,
            Duration::from_millis(config.visibility.debounce_ms),
        ))
    }

    /// Most visible section as of the last recompute
    pub fn active(&self) -> Option<&SectionId> {
        self.active.as_ref()
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    /// (Re)start observing the given sections
    ///
    /// Returns a change right away when the host cannot observe and the
    /// static first-section fallback differs from the current value.
    pub fn attach<H: Host>(&mut self, host: &mut H, refs: &SectionRefs) -> Option<VisibilityChange> {
        self.detach(host);

        if !host.supports_intersection_observer() {
            let fallback = refs.first().cloned();
            info!(
                fallback = ?fallback.as_ref().map(SectionId::as_str),
                "Intersection observation unavailable, using first section"
            );
            return self.set_active(fallback);
        }

        for (id, element) in refs.iter() {
            if !host.is_mounted(element) {
                continue;
            }
            self.targets.insert(element, id.clone());
            host.observe(element, &self.options);
        }
        self.observing = true;
        debug!(targets = self.targets.len(), "Observing sections");
        None
    }

    /// Stop observing and drop any pending recompute
    pub fn detach<H: Host>(&mut self, host: &mut H) {
        self.pending.cancel();
        if self.observing {
            host.disconnect_observer();
            self.observing = false;
        }
        self.targets.clear();
        self.visible.clear();
    }

    /// Record an observation batch and restart the debounce
    pub fn on_entries(&mut self, entries: &[IntersectionEntry], now: Instant) {
        if !self.observing {
            return;
        }

        for entry in entries {
            let Some(id) = self.targets.get(&entry.target) else {
                continue;
            };

            let existing = self.visible.iter().position(|(visible, _)| visible == id);
            match (entry.is_intersecting, existing) {
                (true, Some(index)) => self.visible[index].1 = entry.ratio,
                (true, None) => self.visible.push((id.clone(), entry.ratio)),
                (false, Some(index)) => {
                    self.visible.remove(index);
                }
                (false, None) => {}
            }
        }

        self.pending.arm(now, self.debounce);
    }

    /// Recompute the active section once the debounce has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<VisibilityChange> {
        if !self.pending.fire(now) {
            return None;
        }
        let most_visible = self.most_visible();
        self.set_active(most_visible)
    }

    fn most_visible(&self) -> Option<SectionId> {
        let mut best: Option<&(SectionId, f64)> = None;
        for candidate in &self.visible {
            // Strictly greater keeps the first-seen section on ties
            if candidate.1 > best.map_or(0.0, |b| b.1) {
                best = Some(candidate);
            }
        }
        best.map(|(id, _)| id.clone())
    }

    fn set_active(&mut self, active: Option<SectionId>) -> Option<VisibilityChange> {
        if self.active == active {
            return None;
        }
        debug!(
            active = ?active.as_ref().map(SectionId::as_str),
            "Most visible section changed"
        );
        self.active = active.clone();
        Some(VisibilityChange { active })
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.deadline()
    }
}
