//! A headless single-page document
//!
//! [`SimPage`] stacks sections vertically inside a fixed-height viewport and
//! behaves like a browser tab towards the navigator: it has a URL with a
//! session history, animates smooth scrolls frame by frame, reports
//! intersections with the configured root margin and tracks focus.
//!
//! The page is a cheap handle over shared state, so a scenario can act as
//! the user (scrolling, pressing back, typing a fragment) while the
//! navigator service owns another handle as its [`Host`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::{debug, trace};
use url::Url;

use sectionnav_core::hash::parse_hash;
use sectionnav_core::visibility::intersection_ratio;
use sectionnav_core::{
    ElementRef, Error, HistoryMode, Host, HostEvent, IntersectionEntry, ObserverOptions, Rect,
    ScrollBehavior, SectionId,
};

use crate::scroll::{ScrollAnimator, ScrollConfig};

const BASE_URL: &str = "https://sectionnav.test/";

#[derive(Debug)]
struct PageSection {
    id: SectionId,
    element: ElementRef,
    /// Offset from the top of the document
    top: f64,
    height: f64,
    mounted: bool,
    attributes: HashMap<String, String>,
}

#[derive(Debug)]
struct PageState {
    viewport_height: f64,
    sections: Vec<PageSection>,
    animator: ScrollAnimator,
    /// Offset reported at the last frame
    painted_offset: f64,
    history: Vec<Url>,
    cursor: usize,
    focused: Option<ElementRef>,
    reduced_motion: bool,
    intersection_supported: bool,
    history_api: bool,
    observer: Option<ObserverOptions>,
    /// Observed elements and whether they were past the threshold at the last report
    observed: HashMap<ElementRef, bool>,
    pending: Vec<HostEvent>,
}

impl PageState {
    fn url(&self) -> &Url {
        &self.history[self.cursor]
    }

    fn section(&self, element: ElementRef) -> Option<&PageSection> {
        self.sections.iter().find(|s| s.element == element)
    }

    fn section_mut(&mut self, element: ElementRef) -> Option<&mut PageSection> {
        self.sections.iter_mut().find(|s| s.element == element)
    }

    fn document_height(&self) -> f64 {
        self.sections.last().map_or(0.0, |s| s.top + s.height)
    }

    fn max_scroll(&self) -> f64 {
        (self.document_height() - self.viewport_height).max(0.0)
    }

    fn rect(&self, element: ElementRef) -> Option<Rect> {
        self.section(element)
            .filter(|s| s.mounted)
            .map(|s| Rect::new(s.top - self.animator.position(), s.height))
    }

    fn url_with_fragment(&self, fragment: &str) -> Url {
        let mut url = self.url().clone();
        match parse_hash(fragment) {
            Some(id) => url.set_fragment(Some(id)),
            None => url.set_fragment(None),
        }
        url
    }

    /// New history entry after the current one, dropping any forward entries
    fn push(&mut self, url: Url) {
        self.history.truncate(self.cursor + 1);
        self.history.push(url);
        self.cursor += 1;
    }

    fn replace(&mut self, url: Url) {
        self.history[self.cursor] = url;
    }

    fn intersection(&self, element: ElementRef, options: &ObserverOptions) -> IntersectionEntry {
        let ratio = self.rect(element).map_or(0.0, |rect| {
            intersection_ratio(rect, self.viewport_height, &options.root_margin)
        });
        IntersectionEntry {
            target: element,
            is_intersecting: ratio > 0.0 && ratio >= options.threshold,
            ratio,
        }
    }

    /// Entries for elements that crossed the threshold since the last report
    fn collect_intersections(&mut self) -> Vec<IntersectionEntry> {
        let Some(options) = self.observer else {
            return Vec::new();
        };

        let mut entries = Vec::new();
        let targets: Vec<ElementRef> = self.observed.keys().copied().collect();
        for element in targets {
            let entry = self.intersection(element, &options);
            if self.observed.insert(element, entry.is_intersecting) != Some(entry.is_intersecting) {
                entries.push(entry);
            }
        }
        entries
    }
}

/// Handle to a simulated page; clones share the same document
#[derive(Debug, Clone)]
pub struct SimPage {
    state: Arc<Mutex<PageState>>,
}

impl SimPage {
    pub fn new(viewport_height: f64, scroll: ScrollConfig) -> Result<Self, url::ParseError> {
        let base = Url::parse(BASE_URL)?;
        Ok(Self {
            state: Arc::new(Mutex::new(PageState {
                viewport_height,
                sections: Vec::new(),
                animator: ScrollAnimator::new(scroll),
                painted_offset: 0.0,
                history: vec![base],
                cursor: 0,
                focused: None,
                reduced_motion: false,
                intersection_supported: true,
                history_api: true,
                observer: None,
                observed: HashMap::new(),
                pending: Vec::new(),
            })),
        })
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock()
    }

    /// Append a section below the existing ones
    pub fn add_section(&self, id: SectionId, height: f64, mounted: bool) -> ElementRef {
        let mut state = self.state();
        let top = state.document_height();
        let element = ElementRef::new();
        state.sections.push(PageSection {
            id,
            element,
            top,
            height,
            mounted,
            attributes: HashMap::new(),
        });
        element
    }

    /// Set the fragment of the initial entry (the URL the page was opened with)
    pub fn open_with_hash(&self, raw: &str) {
        let mut state = self.state();
        let url = state.url_with_fragment(raw);
        state.replace(url);
    }

    pub fn set_reduced_motion(&self, reduced: bool) {
        self.state().reduced_motion = reduced;
    }

    pub fn set_intersection_supported(&self, supported: bool) {
        self.state().intersection_supported = supported;
    }

    pub fn set_history_api(&self, available: bool) {
        self.state().history_api = available;
    }

    pub fn set_mounted(&self, id: &SectionId, mounted: bool) -> Option<ElementRef> {
        let mut state = self.state();
        let section = state.sections.iter_mut().find(|s| &s.id == id)?;
        section.mounted = mounted;
        Some(section.element)
    }

    pub fn element(&self, id: &SectionId) -> Option<ElementRef> {
        self.state()
            .sections
            .iter()
            .find(|s| &s.id == id)
            .map(|s| s.element)
    }

    /// Document offset of a section's top edge
    pub fn section_top(&self, id: &SectionId) -> Option<f64> {
        self.state().sections.iter().find(|s| &s.id == id).map(|s| s.top)
    }

    // User actions

    /// Wheel/touch scrolling: jumps to `y`, interrupting any animation
    pub fn user_scroll_to(&self, y: f64) {
        let mut state = self.state();
        let y = y.clamp(0.0, state.max_scroll());
        debug!(y, "User scroll");
        state.animator.set_position(y);
    }

    pub fn back(&self) -> bool {
        let mut state = self.state();
        if state.cursor == 0 {
            return false;
        }
        let before = state.url().fragment().map(str::to_owned);
        state.cursor -= 1;
        if state.url().fragment() != before.as_deref() {
            state.pending.push(HostEvent::HashChange);
        }
        true
    }

    pub fn forward(&self) -> bool {
        let mut state = self.state();
        if state.cursor + 1 >= state.history.len() {
            return false;
        }
        let before = state.url().fragment().map(str::to_owned);
        state.cursor += 1;
        if state.url().fragment() != before.as_deref() {
            state.pending.push(HostEvent::HashChange);
        }
        true
    }

    /// Typing a fragment into the address bar
    pub fn enter_hash(&self, raw: &str) {
        let mut state = self.state();
        let url = state.url_with_fragment(raw);
        if &url == state.url() {
            return;
        }
        state.push(url);
        state.pending.push(HostEvent::HashChange);
    }

    // Inspection

    pub fn hash(&self) -> String {
        self.location_hash()
    }

    pub fn url(&self) -> Url {
        self.state().url().clone()
    }

    pub fn scroll_top(&self) -> f64 {
        self.state().animator.position()
    }

    pub fn history_len(&self) -> usize {
        self.state().history.len()
    }

    pub fn focused_section(&self) -> Option<SectionId> {
        let state = self.state();
        let focused = state.focused?;
        state.section(focused).map(|s| s.id.clone())
    }
}

impl Host for SimPage {
    fn location_hash(&self) -> String {
        match self.state().url().fragment() {
            Some(fragment) if !fragment.is_empty() => format!("#{fragment}"),
            _ => String::new(),
        }
    }

    fn push_history(&mut self, fragment: &str) -> sectionnav_core::Result<()> {
        let mut state = self.state();
        if !state.history_api {
            return Err(Error::History("pushState is not available".into()));
        }
        let url = state.url_with_fragment(fragment);
        state.push(url);
        Ok(())
    }

    fn replace_history(&mut self, fragment: &str) -> sectionnav_core::Result<()> {
        let mut state = self.state();
        if !state.history_api {
            return Err(Error::History("replaceState is not available".into()));
        }
        let url = state.url_with_fragment(fragment);
        state.replace(url);
        Ok(())
    }

    fn set_url_fragment(&mut self, fragment: &str, mode: HistoryMode) {
        let mut state = self.state();
        let url = state.url_with_fragment(fragment);
        if &url == state.url() {
            return;
        }
        match mode {
            HistoryMode::Push => state.push(url),
            HistoryMode::Replace => state.replace(url),
        }
        // Assigning location.hash notifies listeners, unlike the history API
        state.pending.push(HostEvent::HashChange);
    }

    fn viewport_height(&self) -> f64 {
        self.state().viewport_height
    }

    fn bounding_rect(&self, element: ElementRef) -> Option<Rect> {
        self.state().rect(element)
    }

    fn scroll_into_view(&mut self, element: ElementRef, behavior: ScrollBehavior) {
        let mut state = self.state();
        let Some(top) = state.section(element).map(|s| s.top) else {
            return;
        };
        let max_scroll = state.max_scroll();
        let smooth = behavior == ScrollBehavior::Smooth;
        state.animator.scroll_to(top, max_scroll, smooth, Instant::now());
    }

    fn attribute(&self, element: ElementRef, name: &str) -> Option<String> {
        self.state()
            .section(element)
            .and_then(|s| s.attributes.get(name).cloned())
    }

    fn set_attribute(&mut self, element: ElementRef, name: &str, value: &str) {
        if let Some(section) = self.state().section_mut(element) {
            section.attributes.insert(name.to_string(), value.to_string());
        }
    }

    fn remove_attribute(&mut self, element: ElementRef, name: &str) {
        if let Some(section) = self.state().section_mut(element) {
            section.attributes.remove(name);
        }
    }

    fn focus(&mut self, element: ElementRef, prevent_scroll: bool) {
        let mut state = self.state();
        let focusable = state
            .section(element)
            .is_some_and(|s| s.mounted && s.attributes.contains_key("tabindex"));
        if !focusable {
            return;
        }
        state.focused = Some(element);
        if !prevent_scroll {
            let top = state.section(element).map_or(0.0, |s| s.top);
            let max_scroll = state.max_scroll();
            state.animator.set_position(top.min(max_scroll));
        }
    }

    fn prefers_reduced_motion(&self) -> bool {
        self.state().reduced_motion
    }

    fn supports_intersection_observer(&self) -> bool {
        self.state().intersection_supported
    }

    fn observe(&mut self, element: ElementRef, options: &ObserverOptions) {
        let mut state = self.state();
        state.observer = Some(*options);
        // Observing always produces an initial report
        let entry = state.intersection(element, options);
        state.observed.insert(element, entry.is_intersecting);
        state.pending.push(HostEvent::Intersections(vec![entry]));
    }

    fn disconnect_observer(&mut self) {
        let mut state = self.state();
        state.observer = None;
        state.observed.clear();
        state
            .pending
            .retain(|event| !matches!(event, HostEvent::Intersections(_)));
    }

    fn on_animation_frame(&mut self, now: Instant) -> Vec<HostEvent> {
        let mut state = self.state();

        let max_scroll = state.max_scroll();
        let offset = state.animator.update(max_scroll, now);
        if (offset - state.painted_offset).abs() > f64::EPSILON {
            trace!(offset, "Page scrolled");
            state.painted_offset = offset;
            state.pending.push(HostEvent::Scroll);
        }

        let entries = state.collect_intersections();
        if !entries.is_empty() {
            state.pending.push(HostEvent::Intersections(entries));
        }

        std::mem::take(&mut state.pending)
    }
}
