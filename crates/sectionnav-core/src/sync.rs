//! URL fragment <-> current section synchronization
//!
//! The fragment is the single source of truth for where the user is. External
//! fragment changes (back/forward, typed URLs) are resolved and scrolled to.
//! Updates from inside the navigator come in two flavors:
//!
//! - user navigation pushes a history entry right away and scrolls;
//! - scroll-driven updates are debounced and rewrite the current entry,
//!   holding a [`ReentrancyGuard`] so the notification caused by our own
//!   write is not processed as an external change.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::NavConfig;
use crate::event::{EventSink, NavigationEvent};
use crate::hash::{fragment_for, resolve_hash};
use crate::host::{HistoryMode, Host};
use crate::scroll::ScrollCoordinator;
use crate::section::{SectionId, SectionRegistry};
use crate::timer::{earliest, Deadline, Timer};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NavigationState {
    pub current_section: Option<SectionId>,
    pub previous_section: Option<SectionId>,
}

impl NavigationState {
    /// Move to `section`. Returns false (and leaves `previous_section` alone)
    /// when it is already current.
    pub fn transition(&mut self, section: SectionId) -> bool {
        if self.current_section.as_ref() == Some(&section) {
            return false;
        }
        self.previous_section = self.current_section.replace(section);
        true
    }

    /// Replace a provisional current section without recording it as
    /// previous
    pub fn correct(&mut self, section: SectionId) -> bool {
        if self.current_section.as_ref() == Some(&section) {
            return false;
        }
        self.current_section = Some(section);
        true
    }
}

/// Breaks the write -> notification -> write cycle
///
/// Held while the synchronizer rewrites the fragment itself and for a short
/// window afterwards; external change handling is skipped while it is held.
#[derive(Debug)]
pub struct ReentrancyGuard {
    held: bool,
    release: Deadline,
    hold_for: Duration,
}

impl ReentrancyGuard {
    pub fn new(hold_for: Duration) -> Self {
        Self {
            held: false,
            release: Deadline::new(),
            hold_for,
        }
    }

    /// Take the guard; it releases itself `hold_for` after `now`
    pub fn acquire(&mut self, now: Instant) {
        self.held = true;
        self.release.arm(now, self.hold_for);
    }

    #[inline]
    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn poll(&mut self, now: Instant) {
        if self.release.fire(now) {
            self.held = false;
        }
    }

    pub fn release(&mut self) {
        self.held = false;
        self.release.cancel();
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.release.deadline()
    }
}

#[derive(Debug)]
pub struct HashSynchronizer {
    state: NavigationState,
    /// Pending scroll-driven rewrite
    rewrite: Timer<SectionId>,
    rewrite_delay: Duration,
    guard: ReentrancyGuard,
    events: EventSink,
}

impl HashSynchronizer {
    pub fn new(config: &NavConfig, events: EventSink) -> Self {
        Self {
            state: NavigationState::default(),
            rewrite: Timer::new(),
            rewrite_delay: config.timing.hash_debounce(),
            guard: ReentrancyGuard::new(config.timing.hash_guard()),
            events,
        }
    }

    pub fn set_event_sink(&mut self, events: EventSink) {
        self.events = events;
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn current(&self) -> Option<&SectionId> {
        self.state.current_section.as_ref()
    }

    pub fn previous(&self) -> Option<&SectionId> {
        self.state.previous_section.as_ref()
    }

    pub fn is_rewriting(&self) -> bool {
        self.guard.is_held()
    }

    /// Resolve the current fragment and reconcile the viewport with it
    ///
    /// Used on mount and for every external fragment change. Skipped while
    /// our own rewrite is in flight. Returns the resolved section.
    pub fn handle_hash_change<H: Host>(
        &mut self,
        host: &mut H,
        registry: &SectionRegistry,
        scroll: &mut ScrollCoordinator,
        now: Instant,
    ) -> Option<SectionId> {
        if self.guard.is_held() {
            debug!("Ignoring fragment change caused by our own rewrite");
            return None;
        }

        let raw = host.location_hash();
        let section = resolve_hash(&raw, registry.sections())?;
        debug!(hash = %raw, section = %section, "Fragment resolved");

        self.set_current(section.clone());
        scroll.scroll_to_section(host, registry, &section, now);
        Some(section)
    }

    /// Re-resolve the fragment after its section registered late
    ///
    /// The first-section fallback picked in the meantime is swapped out
    /// without becoming `previous_section`.
    pub fn resolve_deferred<H: Host>(
        &mut self,
        host: &mut H,
        registry: &SectionRegistry,
        scroll: &mut ScrollCoordinator,
        now: Instant,
    ) -> Option<SectionId> {
        let section = resolve_hash(&host.location_hash(), registry.sections())?;
        debug!(section = %section, "Deferred fragment resolved");

        if self.state.correct(section.clone()) {
            self.events.emit(NavigationEvent::SectionChanged {
                current: section.clone(),
                previous: self.state.previous_section.clone(),
            });
        }
        scroll.scroll_to_section(host, registry, &section, now);
        Some(section)
    }

    /// The single mutation entry point for the fragment
    ///
    /// `add_to_history` marks a user navigation: it runs immediately, pushes
    /// a history entry and scrolls. Otherwise the update is scroll-driven:
    /// debounced, then written in place without scrolling.
    pub fn update_hash<H: Host>(
        &mut self,
        host: &mut H,
        registry: &SectionRegistry,
        scroll: &mut ScrollCoordinator,
        section: SectionId,
        add_to_history: bool,
        now: Instant,
    ) {
        if !add_to_history {
            self.rewrite.schedule(now, self.rewrite_delay, section);
            return;
        }

        if let Some(dropped) = self.rewrite.cancel() {
            debug!(section = %dropped, "Dropping pending scroll-driven fragment rewrite");
        }

        self.write_history(host, &section, HistoryMode::Push);
        self.set_current(section.clone());
        // The push does not produce an external change notification, so
        // reconcile the viewport here
        scroll.scroll_to_section(host, registry, &section, now);
    }

    /// Apply the debounced rewrite once due and release the guard when its window ends
    pub fn poll<H: Host>(&mut self, host: &mut H, now: Instant) {
        self.guard.poll(now);

        let Some(section) = self.rewrite.take_due(now) else {
            return;
        };

        self.guard.acquire(now);
        self.write_history(host, &section, HistoryMode::Replace);
        self.set_current(section);
    }

    fn write_history<H: Host>(&mut self, host: &mut H, section: &SectionId, mode: HistoryMode) {
        let fragment = fragment_for(section);
        let written = match mode {
            HistoryMode::Push => host.push_history(&fragment),
            HistoryMode::Replace => host.replace_history(&fragment),
        };

        if let Err(e) = written {
            warn!(error = %e, fragment = %fragment, ?mode, "History update failed, using fallback");
            host.set_url_fragment(&fragment, mode);
        }

        self.events.emit(NavigationEvent::HistoryWritten { fragment, mode });
    }

    fn set_current(&mut self, section: SectionId) {
        if self.state.transition(section.clone()) {
            self.events.emit(NavigationEvent::SectionChanged {
                current: section,
                previous: self.state.previous_section.clone(),
            });
        }
    }

    /// Drop the pending rewrite and release the guard
    pub fn cancel(&mut self) {
        self.rewrite.cancel();
        self.guard.release();
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([self.rewrite.deadline(), self.guard.next_deadline()])
    }
}
