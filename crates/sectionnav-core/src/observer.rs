//! Turns "the most visible section changed" into a debounced fragment rewrite
//!
//! Changes produced by a programmatic scroll are swallowed: the section is
//! only recorded as processed so that settling on the navigation target does
//! not cause a second write.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::config::NavConfig;
use crate::section::SectionId;
use crate::timer::Timer;

#[derive(Debug)]
pub struct ScrollObserver {
    last_processed: Option<SectionId>,
    pending: Timer<SectionId>,
    debounce: Duration,
}

impl ScrollObserver {
    pub fn new(debounce: Duration) -> Self {
        Self {
            last_processed: None,
            pending: Timer::new(),
            debounce,
        }
    }

    pub fn from_config(config: &NavConfig) -> Self {
        Self::new(config.timing.observer_debounce())
    }

    pub fn last_processed(&self) -> Option<&SectionId> {
        self.last_processed.as_ref()
    }

    /// React to a new active value from the visibility detector
    pub fn on_active_change(&mut self, active: Option<&SectionId>, programmatic: bool, now: Instant) {
        // Any change invalidates the previous candidate
        self.pending.cancel();

        let Some(active) = active else {
            return;
        };
        if self.last_processed.as_ref() == Some(active) {
            return;
        }
        if programmatic {
            debug!(section = %active, "Visibility change during programmatic scroll, skipping");
            self.last_processed = Some(active.clone());
            return;
        }

        self.pending.schedule(now, self.debounce, active.clone());
    }

    /// The section to write once the debounce has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<SectionId> {
        let section = self.pending.take_due(now)?;
        debug!(section = %section, "Scroll settled on section");
        self.last_processed = Some(section.clone());
        Some(section)
    }

    pub fn cancel(&mut self) {
        self.pending.cancel();
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.deadline()
    }
}
