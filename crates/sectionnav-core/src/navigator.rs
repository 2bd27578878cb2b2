//! The navigation context handed to the rendering layer
//!
//! [`Navigator`] owns the host, the section registry and every component,
//! and wires them together: host notifications go in through
//! [`Navigator::handle_event`], time moves forward through
//! [`Navigator::poll`], and the rendering layer reads state back through
//! the getters or a [`NavigationSnapshot`].

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::NavConfig;
use crate::event::{EventSink, NavigationEvent};
use crate::hash::parse_hash;
use crate::host::{Host, HostEvent};
use crate::observer::ScrollObserver;
use crate::scroll::{ScrollCoordinator, ScrollFlagReader};
use crate::section::{ElementRef, SectionId, SectionRefs, SectionRegistry};
use crate::sync::{HashSynchronizer, NavigationState};
use crate::timer::earliest;
use crate::visibility::{VisibilityChange, VisibilityDetector};
use crate::{Error, Result};

/// Point-in-time view of the navigation state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NavigationSnapshot {
    pub current_section: Option<SectionId>,
    pub previous_section: Option<SectionId>,
    pub next_section: Option<SectionId>,
    pub sections: Vec<SectionId>,
    pub hash: String,
    pub programmatic_scroll: bool,
}

pub struct Navigator<H: Host> {
    host: H,
    registry: SectionRegistry,
    detector: VisibilityDetector,
    scroll: ScrollCoordinator,
    sync: HashSynchronizer,
    observer: ScrollObserver,
    events: EventSink,
    mounted: bool,
}

impl<H: Host> Navigator<H> {
    pub fn new(host: H, config: &NavConfig) -> Result<Self> {
        config.validate()?;
        let events = EventSink::default();

        Ok(Self {
            host,
            registry: SectionRegistry::with_known(config.sections.known.iter().cloned()),
            detector: VisibilityDetector::from_config(config)?,
            scroll: ScrollCoordinator::new(config),
            sync: HashSynchronizer::new(config, events.clone()),
            observer: ScrollObserver::from_config(config),
            events,
            mounted: false,
        })
    }

    /// Deliver [`NavigationEvent`]s to `tx`
    pub fn with_event_sender(mut self, tx: mpsc::UnboundedSender<NavigationEvent>) -> Self {
        self.events = EventSink::new(tx);
        self.sync.set_event_sink(self.events.clone());
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn current_section(&self) -> Option<&SectionId> {
        self.sync.current()
    }

    /// The section that was current before the last change (historical, not positional)
    pub fn previous_section(&self) -> Option<&SectionId> {
        self.sync.previous()
    }

    /// The section after the current one in page order
    pub fn next_section(&self) -> Option<SectionId> {
        self.registry.next_after(self.sync.current())
    }

    pub fn sections(&self) -> &[SectionId] {
        self.registry.sections()
    }

    pub fn section_refs(&self) -> SectionRefs {
        self.registry.section_refs()
    }

    pub fn is_programmatic_scroll(&self) -> bool {
        self.scroll.is_programmatic()
    }

    pub fn scroll_flag(&self) -> ScrollFlagReader {
        self.scroll.flag_reader()
    }

    pub fn state(&self) -> &NavigationState {
        self.sync.state()
    }

    pub fn snapshot(&self) -> NavigationSnapshot {
        NavigationSnapshot {
            current_section: self.current_section().cloned(),
            previous_section: self.previous_section().cloned(),
            next_section: self.next_section(),
            sections: self.sections().to_vec(),
            hash: self.host.location_hash(),
            programmatic_scroll: self.is_programmatic_scroll(),
        }
    }

    pub fn register_section(
        &mut self,
        id: SectionId,
        element: ElementRef,
        order: i32,
        now: Instant,
    ) -> Result<()> {
        self.registry.register(id.clone(), element, order)?;
        self.on_registry_changed(Some(&id), now);
        Ok(())
    }

    /// Returns false when the section was not registered
    pub fn unregister_section(&mut self, id: &SectionId, now: Instant) -> bool {
        let removed = self.registry.unregister(id);
        if removed {
            self.on_registry_changed(None, now);
        }
        removed
    }

    fn on_registry_changed(&mut self, registered: Option<&SectionId>, now: Instant) {
        if !self.mounted {
            return;
        }

        let refs = self.registry.section_refs();
        if let Some(change) = self.detector.attach(&mut self.host, &refs) {
            self.on_visibility_change(change, now);
        }

        // Sections that mount after the navigator still get the initial
        // fragment resolution
        if self.sync.current().is_none() {
            self.sync
                .handle_hash_change(&mut self.host, &self.registry, &mut self.scroll, now);
        } else if self.fragment_awaited(registered) {
            self.sync
                .resolve_deferred(&mut self.host, &self.registry, &mut self.scroll, now);
        }
    }

    /// The fragment names a section that only just showed up while the
    /// current value is a first-section fallback
    fn fragment_awaited(&self, registered: Option<&SectionId>) -> bool {
        let (Some(id), Some(current)) = (registered, self.sync.current()) else {
            return false;
        };
        parse_hash(&self.host.location_hash()).is_some_and(|wanted| id.as_str() == wanted && current != id)
    }

    /// User navigation: new history entry, scroll, focus
    pub fn navigate_to_section(&mut self, id: SectionId, now: Instant) -> Result<()> {
        self.update_hash(id, true, now)
    }

    /// Go to the section after the current one; returns the target
    pub fn navigate_next(&mut self, now: Instant) -> Option<SectionId> {
        let next = self.next_section()?;
        self.sync.update_hash(
            &mut self.host,
            &self.registry,
            &mut self.scroll,
            next.clone(),
            true,
            now,
        );
        Some(next)
    }

    /// Go back to the previously current section; returns the target
    pub fn navigate_previous(&mut self, now: Instant) -> Option<SectionId> {
        let previous = self.previous_section()?.clone();
        self.sync.update_hash(
            &mut self.host,
            &self.registry,
            &mut self.scroll,
            previous.clone(),
            true,
            now,
        );
        Some(previous)
    }

    pub fn update_hash(&mut self, id: SectionId, add_to_history: bool, now: Instant) -> Result<()> {
        if !self.registry.is_allowed(&id) {
            return Err(Error::UnknownSection(id));
        }
        self.sync.update_hash(
            &mut self.host,
            &self.registry,
            &mut self.scroll,
            id,
            add_to_history,
            now,
        );
        Ok(())
    }

    /// Start observing and reconcile with the current fragment
    pub fn mount(&mut self, now: Instant) {
        if self.mounted {
            return;
        }
        self.mounted = true;
        info!(sections = self.registry.len(), "Navigator mounted");

        let refs = self.registry.section_refs();
        if let Some(change) = self.detector.attach(&mut self.host, &refs) {
            self.on_visibility_change(change, now);
        }
        self.sync
            .handle_hash_change(&mut self.host, &self.registry, &mut self.scroll, now);
    }

    /// Cancel every pending timer and stop observing
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;

        self.detector.detach(&mut self.host);
        self.observer.cancel();
        self.sync.cancel();
        self.scroll.cancel(&mut self.host);
        info!("Navigator unmounted");
    }

    pub fn handle_event(&mut self, event: HostEvent, now: Instant) {
        if !self.mounted {
            return;
        }

        match event {
            HostEvent::HashChange => {
                self.sync
                    .handle_hash_change(&mut self.host, &self.registry, &mut self.scroll, now);
            }
            HostEvent::Scroll => self.scroll.on_scroll(now),
            HostEvent::Intersections(entries) => self.detector.on_entries(&entries, now),
        }
    }

    /// Paint boundary: let the host advance, then run frame-deferred work
    pub fn on_animation_frame(&mut self, now: Instant) {
        if !self.mounted {
            return;
        }

        for event in self.host.on_animation_frame(now) {
            self.handle_event(event, now);
        }
        self.scroll.on_animation_frame(&mut self.host);
    }

    /// Fire every timer that is due at `now`
    pub fn poll(&mut self, now: Instant) {
        if !self.mounted {
            return;
        }

        // Visibility settled in the same tick as the scroll quiet period is
        // still attributed to the programmatic scroll.
        if let Some(change) = self.detector.poll(now) {
            self.on_visibility_change(change, now);
        }

        if self.scroll.poll(&mut self.host, &self.registry, now) {
            self.events.emit(NavigationEvent::ProgrammaticScrollEnded);
        }

        self.sync.poll(&mut self.host, now);

        if let Some(section) = self.observer.poll(now) {
            self.sync.update_hash(
                &mut self.host,
                &self.registry,
                &mut self.scroll,
                section,
                false,
                now,
            );
        }
    }

    fn on_visibility_change(&mut self, change: VisibilityChange, now: Instant) {
        debug!(
            active = ?change.active.as_ref().map(SectionId::as_str),
            programmatic = self.scroll.is_programmatic(),
            "Visibility changed"
        );
        self.observer
            .on_active_change(change.active.as_ref(), self.scroll.is_programmatic(), now);
    }

    /// When [`Navigator::poll`] next has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.mounted {
            return None;
        }
        earliest([
            self.detector.next_deadline(),
            self.scroll.next_deadline(),
            self.sync.next_deadline(),
            self.observer.next_deadline(),
        ])
    }
}
