//! Programmatic scrolling and focus handoff
//!
//! The [`ScrollCoordinator`] brings a section into view, owns the
//! [`ProgrammaticScrollFlag`] that tells the rest of the navigator to ignore
//! the visibility changes its own scroll produces, and moves keyboard focus
//! to the target once the scroll is expected to be done.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error};

use crate::config::{NavConfig, ScrollConfig};
use crate::host::{Host, ScrollBehavior};
use crate::section::{ElementRef, SectionId, SectionRegistry};
use crate::timer::{earliest, Deadline, Timer};

const TABINDEX: &str = "tabindex";

/// Read-only view of the programmatic scroll flag
#[derive(Debug, Clone)]
pub struct ScrollFlagReader(Arc<AtomicBool>);

impl ScrollFlagReader {
    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// "A scroll we started is still in flight"
///
/// Armed at the start of every programmatic scroll. Cleared after a quiet
/// period following the last scroll event, or after the fallback duration
/// when the host never reports scrolling (e.g. already at the target). There
/// is a single clear chain: re-arming replaces both timers.
#[derive(Debug)]
pub struct ProgrammaticScrollFlag {
    active: Arc<AtomicBool>,
    quiet: Deadline,
    fallback: Deadline,
    quiet_period: Duration,
    fallback_period: Duration,
}

impl ProgrammaticScrollFlag {
    pub fn new(quiet_period: Duration, fallback_period: Duration) -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
            quiet: Deadline::new(),
            fallback: Deadline::new(),
            quiet_period,
            fallback_period,
        }
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn reader(&self) -> ScrollFlagReader {
        ScrollFlagReader(Arc::clone(&self.active))
    }

    /// Set the flag for a scroll expected to take `budget`
    pub fn arm(&mut self, now: Instant, budget: Duration) {
        self.active.store(true, Ordering::Release);
        self.quiet.cancel();
        // Never give up before the scroll itself is expected to finish
        self.fallback.arm(now, self.fallback_period.max(budget));
        debug!(budget_ms = budget.as_millis() as u64, "Programmatic scroll started");
    }

    /// Restart the quiet period; ignored while the flag is clear
    pub fn on_scroll(&mut self, now: Instant) {
        if self.is_set() {
            self.quiet.arm(now, self.quiet_period);
        }
    }

    /// Clear the flag if either timer fired. Returns true when it was cleared.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.is_set() {
            return false;
        }
        let quiet = self.quiet.fire(now);
        let fallback = self.fallback.fire(now);
        if quiet || fallback {
            debug!(by_fallback = !quiet, "Programmatic scroll ended");
            self.clear();
            return true;
        }
        false
    }

    pub fn clear(&mut self) {
        self.active.store(false, Ordering::Release);
        self.quiet.cancel();
        self.fallback.cancel();
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([self.quiet.deadline(), self.fallback.deadline()])
    }
}

/// Result of a scroll request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOutcome {
    /// The scroll was started
    Scrolling,
    /// Enough of the section is on screen already
    AlreadyVisible,
    /// The section is not mounted yet; another attempt is scheduled
    Retrying,
    /// The section never showed up; the request was dropped
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RetryRequest {
    section: SectionId,
    attempt: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TabIndexRestore {
    element: ElementRef,
    original: Option<String>,
}

#[derive(Debug)]
pub struct ScrollCoordinator {
    flag: ProgrammaticScrollFlag,
    scroll: ScrollConfig,
    retry_delay: Duration,
    max_retries: u32,
    retry: Timer<RetryRequest>,
    focus: Timer<ElementRef>,
    /// Applied on the next animation frame
    restore: Option<TabIndexRestore>,
}

impl ScrollCoordinator {
    pub fn new(config: &NavConfig) -> Self {
        Self {
            flag: ProgrammaticScrollFlag::new(
                config.timing.scroll_quiet(),
                config.timing.scroll_fallback(),
            ),
            scroll: config.scroll.clone(),
            retry_delay: config.timing.retry_delay(),
            max_retries: config.timing.max_retries,
            retry: Timer::new(),
            focus: Timer::new(),
            restore: None,
        }
    }

    #[inline]
    pub fn is_programmatic(&self) -> bool {
        self.flag.is_set()
    }

    pub fn flag_reader(&self) -> ScrollFlagReader {
        self.flag.reader()
    }

    /// Bring `section` into view
    ///
    /// Supersedes any pending retry. Elements that are not registered or not
    /// mounted yet are retried a bounded number of times.
    pub fn scroll_to_section<H: Host>(
        &mut self,
        host: &mut H,
        registry: &SectionRegistry,
        section: &SectionId,
        now: Instant,
    ) -> ScrollOutcome {
        self.attempt(host, registry, section.clone(), 0, now)
    }

    fn attempt<H: Host>(
        &mut self,
        host: &mut H,
        registry: &SectionRegistry,
        section: SectionId,
        attempt: u32,
        now: Instant,
    ) -> ScrollOutcome {
        self.retry.cancel();

        let element = registry
            .element(&section)
            .filter(|element| host.is_mounted(*element));

        let Some(element) = element else {
            if attempt < self.max_retries {
                debug!(section = %section, attempt = attempt + 1, "Section not mounted yet, retrying");
                self.retry.schedule(
                    now,
                    self.retry_delay,
                    RetryRequest {
                        section,
                        attempt: attempt + 1,
                    },
                );
                return ScrollOutcome::Retrying;
            }
            error!(section = %section, retries = attempt, "Section not found after retries");
            return ScrollOutcome::Missing;
        };

        // A visible target only short-circuits while no earlier scroll is
        // still carrying the page elsewhere
        let in_flight = self.flag.is_set() || self.focus.is_armed();
        if !in_flight && is_section_visible(host, element, self.scroll.already_visible_threshold) {
            debug!(section = %section, "Section already visible, not scrolling");
            return ScrollOutcome::AlreadyVisible;
        }

        let reduced_motion = host.prefers_reduced_motion();
        let duration = self.scroll.estimated_duration(reduced_motion);
        let behavior = if duration.is_zero() {
            ScrollBehavior::Instant
        } else {
            ScrollBehavior::Smooth
        };

        self.flag.arm(now, duration);
        host.scroll_into_view(element, behavior);
        // The most recent request owns focus
        self.focus.schedule(now, duration, element);

        debug!(section = %section, ?behavior, "Scrolling to section");
        ScrollOutcome::Scrolling
    }

    /// Feed a scroll event to the flag's quiet period
    pub fn on_scroll(&mut self, now: Instant) {
        self.flag.on_scroll(now);
    }

    /// Fire due timers: flag clearing, retries, focus handoff
    ///
    /// Returns true when the programmatic scroll flag was cleared.
    pub fn poll<H: Host>(&mut self, host: &mut H, registry: &SectionRegistry, now: Instant) -> bool {
        let cleared = self.flag.poll(now);

        if let Some(request) = self.retry.take_due(now) {
            self.attempt(host, registry, request.section, request.attempt, now);
        }

        if let Some(element) = self.focus.take_due(now) {
            self.focus_element(host, element);
        }

        cleared
    }

    /// Make the element focusable, focus it without scrolling, and queue the
    /// tabindex restore for the next frame
    fn focus_element<H: Host>(&mut self, host: &mut H, element: ElementRef) {
        self.flush_restore(host);

        if !host.is_mounted(element) {
            return;
        }

        let original = host.attribute(element, TABINDEX);
        host.set_attribute(element, TABINDEX, "-1");
        host.focus(element, true);
        self.restore = Some(TabIndexRestore { element, original });
    }

    /// Paint boundary: restore the focused element's tabindex
    pub fn on_animation_frame<H: Host>(&mut self, host: &mut H) {
        self.flush_restore(host);
    }

    fn flush_restore<H: Host>(&mut self, host: &mut H) {
        let Some(restore) = self.restore.take() else {
            return;
        };
        match restore.original {
            Some(value) => host.set_attribute(restore.element, TABINDEX, &value),
            None => host.remove_attribute(restore.element, TABINDEX),
        }
    }

    /// Drop every pending timer and clear the flag
    pub fn cancel<H: Host>(&mut self, host: &mut H) {
        self.retry.cancel();
        self.focus.cancel();
        self.flush_restore(host);
        self.flag.clear();
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.flag.next_deadline(),
            self.retry.deadline(),
            self.focus.deadline(),
        ])
    }
}

/// Whether at least `threshold` of the element's height is inside the viewport
pub fn is_section_visible<H: Host>(host: &H, element: ElementRef, threshold: f64) -> bool {
    let Some(rect) = host.bounding_rect(element) else {
        return false;
    };
    if rect.height <= 0.0 {
        return false;
    }

    let visible = rect.bottom().min(host.viewport_height()) - rect.top.max(0.0);
    visible / rect.height >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockHost;

    const MS: Duration = Duration::from_millis(1);

    fn setup() -> (MockHost, SectionRegistry, ScrollCoordinator) {
        let mut host = MockHost::new(800.0);
        let mut registry = SectionRegistry::new();
        for (order, id) in ["home", "music", "shows"].into_iter().enumerate() {
            let element = host.add_section(order as f64 * 800.0, 800.0);
            registry.register(id.into(), element, order as i32).unwrap();
        }
        (host, registry, ScrollCoordinator::new(&NavConfig::default()))
    }

    #[test]
    fn test_flag_clears_after_quiet_period() {
        let t0 = Instant::now();
        let mut flag = ProgrammaticScrollFlag::new(100 * MS, 1500 * MS);
        flag.arm(t0, 800 * MS);
        assert!(flag.is_set());

        flag.on_scroll(t0 + 10 * MS);
        flag.on_scroll(t0 + 90 * MS);
        assert!(!flag.poll(t0 + 150 * MS));
        assert!(flag.poll(t0 + 190 * MS));
        assert!(!flag.is_set());
        assert_eq!(flag.next_deadline(), None);
    }

    #[test]
    fn test_flag_fallback_without_scroll_events() {
        let t0 = Instant::now();
        let mut flag = ProgrammaticScrollFlag::new(100 * MS, 1500 * MS);
        flag.arm(t0, 800 * MS);

        assert!(!flag.poll(t0 + 1499 * MS));
        assert!(flag.poll(t0 + 1500 * MS));
        assert!(!flag.is_set());
    }

    #[test]
    fn test_flag_fallback_covers_long_budget() {
        let t0 = Instant::now();
        let mut flag = ProgrammaticScrollFlag::new(100 * MS, 1500 * MS);
        flag.arm(t0, 2000 * MS);

        assert!(!flag.poll(t0 + 1500 * MS));
        assert!(flag.poll(t0 + 2000 * MS));
    }

    #[test]
    fn test_rearm_replaces_clear_chain() {
        let t0 = Instant::now();
        let mut flag = ProgrammaticScrollFlag::new(100 * MS, 1500 * MS);
        flag.arm(t0, 800 * MS);
        flag.on_scroll(t0 + 50 * MS);

        // Second scroll starts before the first quiet period ends
        flag.arm(t0 + 100 * MS, 800 * MS);
        assert!(!flag.poll(t0 + 150 * MS), "old quiet timer must be gone");
        assert!(flag.is_set());
        assert!(!flag.poll(t0 + 1500 * MS), "old fallback must be gone");
        assert!(flag.poll(t0 + 1600 * MS));
    }

    #[test]
    fn test_scroll_events_ignored_when_clear() {
        let t0 = Instant::now();
        let mut flag = ProgrammaticScrollFlag::new(100 * MS, 1500 * MS);
        flag.on_scroll(t0);
        assert_eq!(flag.next_deadline(), None);
    }

    #[test]
    fn test_reader_tracks_flag() {
        let t0 = Instant::now();
        let mut flag = ProgrammaticScrollFlag::new(100 * MS, 1500 * MS);
        let reader = flag.reader();
        assert!(!reader.is_set());
        flag.arm(t0, Duration::ZERO);
        assert!(reader.is_set());
        flag.clear();
        assert!(!reader.is_set());
    }

    #[test]
    fn test_scrolls_and_arms_flag() {
        let (mut host, registry, mut coordinator) = setup();
        let t0 = Instant::now();

        let outcome = coordinator.scroll_to_section(&mut host, &registry, &"shows".into(), t0);
        assert_eq!(outcome, ScrollOutcome::Scrolling);
        assert!(coordinator.is_programmatic());
        assert_eq!(host.scroll_calls.len(), 1);
        assert_eq!(host.scroll_calls[0].1, ScrollBehavior::Smooth);
    }

    #[test]
    fn test_reduced_motion_scrolls_instantly() {
        let (mut host, registry, mut coordinator) = setup();
        host.reduced_motion = true;
        let t0 = Instant::now();

        coordinator.scroll_to_section(&mut host, &registry, &"music".into(), t0);
        assert_eq!(host.scroll_calls[0].1, ScrollBehavior::Instant);

        // Focus follows immediately
        coordinator.poll(&mut host, &registry, t0);
        assert_eq!(host.focused, registry.element(&"music".into()));
    }

    #[test]
    fn test_already_visible_skips_scroll() {
        let (mut host, registry, mut coordinator) = setup();
        let t0 = Instant::now();

        let outcome = coordinator.scroll_to_section(&mut host, &registry, &"home".into(), t0);
        assert_eq!(outcome, ScrollOutcome::AlreadyVisible);
        assert!(!coordinator.is_programmatic());
        assert!(host.scroll_calls.is_empty());
    }

    #[test]
    fn test_visible_target_retargets_in_flight_scroll() {
        let (mut host, registry, mut coordinator) = setup();
        let home = registry.element(&"home".into()).unwrap();
        let t0 = Instant::now();

        coordinator.scroll_to_section(&mut host, &registry, &"shows".into(), t0);
        // The smooth scroll has not moved the page yet
        host.scroll_top = 0.0;

        let outcome = coordinator.scroll_to_section(&mut host, &registry, &"home".into(), t0);
        assert_eq!(outcome, ScrollOutcome::Scrolling);
        assert_eq!(host.scroll_calls.len(), 2);
        assert_eq!(host.scroll_calls[1].0, home);
        assert_eq!(host.scroll_top, 0.0);

        coordinator.poll(&mut host, &registry, t0 + 900 * MS);
        assert_eq!(host.focused, Some(home));
        assert_eq!(host.focus_calls, 1);
    }

    #[test]
    fn test_visibility_threshold() {
        let mut host = MockHost::new(800.0);
        let element = host.add_section(0.0, 1000.0);

        host.scroll_top = 600.0; // 400 of 1000 visible
        assert!(is_section_visible(&host, element, 0.3));
        host.scroll_top = 800.0; // 200 of 1000 visible
        assert!(!is_section_visible(&host, element, 0.3));

        host.set_mounted(element, false);
        assert!(!is_section_visible(&host, element, 0.0));
    }

    #[test]
    fn test_retries_until_mounted() {
        let (mut host, registry, mut coordinator) = setup();
        let shows = registry.element(&"shows".into()).unwrap();
        host.set_mounted(shows, false);
        let t0 = Instant::now();

        let outcome = coordinator.scroll_to_section(&mut host, &registry, &"shows".into(), t0);
        assert_eq!(outcome, ScrollOutcome::Retrying);

        coordinator.poll(&mut host, &registry, t0 + 100 * MS);
        assert!(host.scroll_calls.is_empty());

        host.set_mounted(shows, true);
        coordinator.poll(&mut host, &registry, t0 + 200 * MS);
        assert_eq!(host.scroll_calls.len(), 1);
        assert!(coordinator.is_programmatic());
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let (mut host, registry, mut coordinator) = setup();
        let t0 = Instant::now();

        let outcome = coordinator.scroll_to_section(&mut host, &registry, &"about".into(), t0);
        assert_eq!(outcome, ScrollOutcome::Retrying);

        for step in 1..=3u32 {
            assert!(coordinator.next_deadline().is_some(), "retry {step} pending");
            coordinator.poll(&mut host, &registry, t0 + step * 100 * MS);
        }

        assert_eq!(coordinator.next_deadline(), None);
        assert!(host.scroll_calls.is_empty());
        assert!(!coordinator.is_programmatic());
    }

    #[test]
    fn test_new_request_supersedes_retry() {
        let (mut host, registry, mut coordinator) = setup();
        let t0 = Instant::now();

        coordinator.scroll_to_section(&mut host, &registry, &"about".into(), t0);
        coordinator.scroll_to_section(&mut host, &registry, &"shows".into(), t0 + 10 * MS);

        for step in 1..=5u32 {
            coordinator.poll(&mut host, &registry, t0 + step * 100 * MS);
        }
        assert_eq!(host.scroll_calls.len(), 1);
    }

    #[test]
    fn test_focus_handoff_restores_missing_tabindex() {
        let (mut host, registry, mut coordinator) = setup();
        let shows = registry.element(&"shows".into()).unwrap();
        let t0 = Instant::now();

        coordinator.scroll_to_section(&mut host, &registry, &"shows".into(), t0);
        coordinator.poll(&mut host, &registry, t0 + 799 * MS);
        assert_eq!(host.focused, None);

        coordinator.poll(&mut host, &registry, t0 + 800 * MS);
        assert_eq!(host.focused, Some(shows));
        assert_eq!(host.attribute(shows, TABINDEX).as_deref(), Some("-1"));
        assert_eq!(host.focus_prevent_scroll, Some(true));

        coordinator.on_animation_frame(&mut host);
        assert_eq!(host.attribute(shows, TABINDEX), None);
    }

    #[test]
    fn test_focus_handoff_restores_original_tabindex() {
        let (mut host, registry, mut coordinator) = setup();
        let music = registry.element(&"music".into()).unwrap();
        host.set_attribute(music, TABINDEX, "0");
        let t0 = Instant::now();

        coordinator.scroll_to_section(&mut host, &registry, &"music".into(), t0);
        coordinator.poll(&mut host, &registry, t0 + 800 * MS);
        assert_eq!(host.attribute(music, TABINDEX).as_deref(), Some("-1"));

        coordinator.on_animation_frame(&mut host);
        assert_eq!(host.attribute(music, TABINDEX).as_deref(), Some("0"));
    }

    #[test]
    fn test_latest_request_owns_focus() {
        let (mut host, registry, mut coordinator) = setup();
        let t0 = Instant::now();

        coordinator.scroll_to_section(&mut host, &registry, &"music".into(), t0);
        coordinator.scroll_to_section(&mut host, &registry, &"shows".into(), t0 + 10 * MS);
        coordinator.poll(&mut host, &registry, t0 + 900 * MS);

        assert_eq!(host.focused, registry.element(&"shows".into()));
        assert_eq!(host.focus_calls, 1);
    }

    #[test]
    fn test_cancel_clears_everything() {
        let (mut host, registry, mut coordinator) = setup();
        let t0 = Instant::now();

        coordinator.scroll_to_section(&mut host, &registry, &"shows".into(), t0);
        coordinator.cancel(&mut host);

        assert!(!coordinator.is_programmatic());
        assert_eq!(coordinator.next_deadline(), None);
        coordinator.poll(&mut host, &registry, t0 + 2000 * MS);
        assert_eq!(host.focused, None);
    }
}
