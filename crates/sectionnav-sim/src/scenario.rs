//! Scripted navigation scenarios
//!
//! A scenario describes a page (sections, viewport, browser capabilities)
//! and a list of steps played against a running [`NavigatorService`]. Steps
//! either act (as the rendering layer or as the user) or check the state
//! with an `expect` step. Scenarios are TOML files:
//!
//! ```toml
//! name = "navigate to shows"
//!
//! [[sections]]
//! id = "home"
//!
//! [[sections]]
//! id = "shows"
//!
//! [[steps]]
//! action = "navigate"
//! section = "shows"
//!
//! [[steps]]
//! action = "wait"
//! ms = 1500
//!
//! [[steps]]
//! action = "expect"
//! current = "shows"
//! hash = "#shows"
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use sectionnav_core::{
    NavConfig, NavigationEvent, NavigationSnapshot, Navigator, NavigatorHandle, NavigatorService,
    SectionId,
};

use crate::page::SimPage;

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: f64,
    /// Fragment the page is opened with, e.g. "#shows"
    #[serde(default)]
    pub initial_hash: String,
    #[serde(default)]
    pub reduced_motion: bool,
    #[serde(default = "default_true")]
    pub intersection_observer: bool,
    #[serde(default = "default_true")]
    pub history_api: bool,
    pub sections: Vec<SectionSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionSpec {
    pub id: SectionId,
    #[serde(default = "default_section_height")]
    pub height: f64,
    /// Position in the navigation order (defaults to the declaration index)
    pub order: Option<i32>,
    /// Unmounted sections take up space but are not registered until a `mount` step
    #[serde(default = "default_true")]
    pub mounted: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Click on a navigation link
    Navigate { section: SectionId },
    Next,
    Previous,
    /// User scroll to a document offset
    ScrollTo { y: f64 },
    /// User scroll to a section's top edge
    ScrollToSection { section: SectionId },
    Back,
    Forward,
    /// Type a fragment into the address bar
    EnterHash { hash: String },
    Mount { section: SectionId },
    Unmount { section: SectionId },
    Wait { ms: u64 },
    Expect(Expectation),
}

/// Checks against the published state; empty strings mean "none"
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Expectation {
    pub current: Option<String>,
    pub previous: Option<String>,
    pub next: Option<String>,
    pub hash: Option<String>,
    pub programmatic: Option<bool>,
    pub history_len: Option<usize>,
    pub focused: Option<String>,
    pub scroll_top: Option<f64>,
}

fn default_viewport_height() -> f64 {
    800.0
}

fn default_section_height() -> f64 {
    800.0
}

fn default_true() -> bool {
    true
}

impl Scenario {
    pub fn from_toml(content: &str) -> Result<Self> {
        let scenario: Self = toml::from_str(content)?;
        if scenario.sections.is_empty() {
            bail!("scenario {:?} declares no sections", scenario.name);
        }
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid scenario {}", path.display()))
    }

    fn order_of(&self, id: &SectionId) -> i32 {
        self.sections
            .iter()
            .position(|s| &s.id == id)
            .and_then(|index| self.sections[index].order.or(i32::try_from(index).ok()))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    /// 1-based step number
    pub step: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub steps: usize,
    pub failures: Vec<Failure>,
    pub final_state: NavigationSnapshot,
    pub url: String,
    pub history_len: usize,
    pub scroll_top: f64,
    pub events: Vec<NavigationEvent>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Play `scenario` against a fresh page and navigator
///
/// Waits use tokio time, so on a paused clock a scenario finishes instantly.
pub async fn run_scenario(config: &NavConfig, scenario: &Scenario) -> Result<ScenarioReport> {
    info!(scenario = %scenario.name, steps = scenario.steps.len(), "Running scenario");

    let page = SimPage::new(scenario.viewport_height, config.scroll.clone())?;
    page.open_with_hash(&scenario.initial_hash);
    page.set_reduced_motion(scenario.reduced_motion);
    page.set_intersection_supported(scenario.intersection_observer);
    page.set_history_api(scenario.history_api);
    for section in &scenario.sections {
        page.add_section(section.id.clone(), section.height, section.mounted);
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let navigator = Navigator::new(page.clone(), config)?.with_event_sender(event_tx);
    let (service, handle) = NavigatorService::new(navigator, config.scroll.frame_interval());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let service_task = tokio::spawn(service.run(shutdown_rx));

    for section in scenario.sections.iter().filter(|s| s.mounted) {
        if let Some(element) = page.element(&section.id) {
            handle
                .register_section(section.id.clone(), element, scenario.order_of(&section.id))
                .await?;
        }
    }
    handle.flush().await?;

    let mut failures = Vec::new();
    for (index, step) in scenario.steps.iter().enumerate() {
        let number = index + 1;
        debug!(step = number, ?step, "Scenario step");
        match play(scenario, &page, &handle, step).await {
            Ok(problems) => failures.extend(
                problems
                    .into_iter()
                    .map(|message| Failure { step: number, message }),
            ),
            Err(e) => failures.push(Failure {
                step: number,
                message: e.to_string(),
            }),
        }
    }

    let final_state = handle.snapshot();
    let _ = shutdown_tx.send(true);
    service_task.await.context("Navigator service panicked")?;

    let mut events = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        events.push(event);
    }

    let report = ScenarioReport {
        name: scenario.name.clone(),
        steps: scenario.steps.len(),
        failures,
        final_state,
        url: page.url().to_string(),
        history_len: page.history_len(),
        scroll_top: page.scroll_top(),
        events,
    };
    if !report.passed() {
        warn!(scenario = %report.name, failures = report.failures.len(), "Scenario failed");
    }
    Ok(report)
}

/// Run one step; returns failed expectations
async fn play(
    scenario: &Scenario,
    page: &SimPage,
    handle: &NavigatorHandle,
    step: &Step,
) -> Result<Vec<String>> {
    match step {
        Step::Navigate { section } => handle.navigate_to_section(section.clone()).await?,
        Step::Next => {
            handle.navigate_next().await?;
        }
        Step::Previous => {
            handle.navigate_previous().await?;
        }
        Step::ScrollTo { y } => page.user_scroll_to(*y),
        Step::ScrollToSection { section } => {
            let top = page
                .section_top(section)
                .with_context(|| format!("No section {section} on the page"))?;
            page.user_scroll_to(top);
        }
        Step::Back => {
            if !page.back() {
                bail!("Nothing to go back to");
            }
        }
        Step::Forward => {
            if !page.forward() {
                bail!("Nothing to go forward to");
            }
        }
        Step::EnterHash { hash } => page.enter_hash(hash),
        Step::Mount { section } => {
            let element = page
                .set_mounted(section, true)
                .with_context(|| format!("No section {section} on the page"))?;
            handle
                .register_section(section.clone(), element, scenario.order_of(section))
                .await?;
        }
        Step::Unmount { section } => {
            page.set_mounted(section, false)
                .with_context(|| format!("No section {section} on the page"))?;
            handle.unregister_section(section.clone()).await?;
        }
        Step::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
        Step::Expect(expectation) => {
            handle.flush().await?;
            return Ok(expectation.check(&handle.snapshot(), handle.is_programmatic_scroll(), page));
        }
    }

    handle.flush().await?;
    Ok(Vec::new())
}

fn section_or_none(expected: &str) -> Option<SectionId> {
    (!expected.is_empty()).then(|| SectionId::from(expected))
}

fn describe(section: Option<&SectionId>) -> &str {
    section.map_or("none", SectionId::as_str)
}

impl Expectation {
    pub fn check(&self, snapshot: &NavigationSnapshot, programmatic: bool, page: &SimPage) -> Vec<String> {
        let mut problems = Vec::new();

        let sections = [
            ("current", &self.current, snapshot.current_section.clone()),
            ("previous", &self.previous, snapshot.previous_section.clone()),
            ("next", &self.next, snapshot.next_section.clone()),
            ("focused", &self.focused, page.focused_section()),
        ];
        for (what, expected, actual) in sections {
            let Some(expected) = expected else {
                continue;
            };
            let expected = section_or_none(expected);
            if expected != actual {
                problems.push(format!(
                    "{what} section: expected {}, got {}",
                    describe(expected.as_ref()),
                    describe(actual.as_ref())
                ));
            }
        }

        if let Some(ref hash) = self.hash {
            if *hash != snapshot.hash {
                problems.push(format!("hash: expected {hash:?}, got {:?}", snapshot.hash));
            }
        }
        if let Some(expected) = self.programmatic {
            if expected != programmatic {
                problems.push(format!("programmatic scroll: expected {expected}, got {programmatic}"));
            }
        }
        if let Some(expected) = self.history_len {
            let actual = page.history_len();
            if expected != actual {
                problems.push(format!("history length: expected {expected}, got {actual}"));
            }
        }
        if let Some(expected) = self.scroll_top {
            let actual = page.scroll_top();
            if (expected - actual).abs() > 0.5 {
                problems.push(format!("scroll top: expected {expected}, got {actual}"));
            }
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREE_SECTIONS: &str = r#"
[[sections]]
id = "home"

[[sections]]
id = "music"

[[sections]]
id = "shows"
"#;

    fn scenario(header: &str, steps: &str) -> Scenario {
        Scenario::from_toml(&format!("{header}\n{THREE_SECTIONS}\n{steps}")).unwrap()
    }

    async fn run(header: &str, steps: &str) -> ScenarioReport {
        let scenario = scenario(&format!("name = \"test\"\n{header}"), steps);
        run_scenario(&NavConfig::default(), &scenario).await.unwrap()
    }

    fn assert_passed(report: &ScenarioReport) {
        assert!(report.passed(), "failures: {:#?}", report.failures);
    }

    #[test]
    fn test_parse_steps() {
        let scenario = scenario(
            "name = \"parse\"\nreduced_motion = true",
            r##"
[[steps]]
action = "navigate"
section = "shows"

[[steps]]
action = "scroll_to"
y = 120.5

[[steps]]
action = "enter_hash"
hash = "#music"

[[steps]]
action = "back"

[[steps]]
action = "expect"
current = "music"
next = ""
"##,
        );

        assert!(scenario.reduced_motion);
        assert!(scenario.history_api);
        assert_eq!(scenario.viewport_height, 800.0);
        assert_eq!(scenario.steps.len(), 5);
        assert!(matches!(scenario.steps[1], Step::ScrollTo { y } if y == 120.5));
        let Step::Expect(ref expectation) = scenario.steps[4] else {
            panic!("expected an expect step");
        };
        assert_eq!(expectation.next.as_deref(), Some(""));
        assert_eq!(scenario.order_of(&"shows".into()), 2);
    }

    #[test]
    fn test_rejects_bad_scenarios() {
        assert!(Scenario::from_toml("name = \"empty\"\nsections = []").is_err());
        assert!(Scenario::from_toml("name = \"x\"\n[[sections]]\nid = \"a\"\n[[steps]]\naction = \"fly\"").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_to_last_section() {
        let report = run(
            "",
            r##"
[[steps]]
action = "wait"
ms = 500

[[steps]]
action = "navigate"
section = "shows"

[[steps]]
action = "expect"
current = "shows"
hash = "#shows"
programmatic = true

[[steps]]
action = "wait"
ms = 2000

[[steps]]
action = "expect"
current = "shows"
previous = "home"
next = ""
hash = "#shows"
programmatic = false
focused = "shows"
scroll_top = 1600
history_len = 2
"##,
        )
        .await;
        assert_passed(&report);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_initial_hash_falls_back() {
        let report = run(
            "initial_hash = \"#nope\"",
            r##"
[[steps]]
action = "expect"
current = "home"

[[steps]]
action = "wait"
ms = 1000

[[steps]]
action = "expect"
current = "home"
hash = "#home"
history_len = 1
"##,
        )
        .await;
        assert_passed(&report);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_hash_scrolls_to_section() {
        let report = run(
            "initial_hash = \"#music\"",
            r##"
[[steps]]
action = "wait"
ms = 2000

[[steps]]
action = "expect"
current = "music"
scroll_top = 800
hash = "#music"
history_len = 1
"##,
        )
        .await;
        assert_passed(&report);
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_scroll_rewrites_in_place() {
        let report = run(
            "",
            r##"
[[steps]]
action = "wait"
ms = 500

[[steps]]
action = "scroll_to_section"
section = "music"

[[steps]]
action = "wait"
ms = 1000

[[steps]]
action = "expect"
current = "music"
previous = "home"
hash = "#music"
history_len = 1
scroll_top = 800
"##,
        )
        .await;
        assert_passed(&report);
        let pushes = report
            .events
            .iter()
            .filter(|e| matches!(e, NavigationEvent::HistoryWritten { mode: sectionnav_core::HistoryMode::Push, .. }))
            .count();
        assert_eq!(pushes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_clicks_record_history_and_focus_last() {
        let report = run(
            "",
            r##"
[[steps]]
action = "wait"
ms = 500

[[steps]]
action = "navigate"
section = "music"

[[steps]]
action = "navigate"
section = "shows"

[[steps]]
action = "navigate"
section = "music"

[[steps]]
action = "wait"
ms = 2500

[[steps]]
action = "expect"
current = "music"
hash = "#music"
focused = "music"
history_len = 4
programmatic = false
"##,
        )
        .await;
        assert_passed(&report);
        let ended = report
            .events
            .iter()
            .filter(|e| **e == NavigationEvent::ProgrammaticScrollEnded)
            .count();
        assert_eq!(ended, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_click_on_visible_section_wins() {
        let report = run(
            "",
            r##"
[[steps]]
action = "wait"
ms = 500

[[steps]]
action = "navigate"
section = "shows"

[[steps]]
action = "navigate"
section = "home"

[[steps]]
action = "wait"
ms = 3000

[[steps]]
action = "expect"
current = "home"
hash = "#home"
focused = "home"
scroll_top = 0
programmatic = false
"##,
        )
        .await;
        assert_passed(&report);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_button_returns_to_section() {
        let report = run(
            "",
            r##"
[[steps]]
action = "wait"
ms = 500

[[steps]]
action = "navigate"
section = "music"

[[steps]]
action = "wait"
ms = 1500

[[steps]]
action = "navigate"
section = "shows"

[[steps]]
action = "wait"
ms = 1500

[[steps]]
action = "back"

[[steps]]
action = "wait"
ms = 1500

[[steps]]
action = "expect"
current = "music"
previous = "shows"
hash = "#music"
scroll_top = 800
"##,
        )
        .await;
        assert_passed(&report);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reduced_motion_jumps_and_focuses() {
        let report = run(
            "reduced_motion = true",
            r##"
[[steps]]
action = "wait"
ms = 500

[[steps]]
action = "navigate"
section = "shows"

[[steps]]
action = "expect"
scroll_top = 1600
focused = "shows"
"##,
        )
        .await;
        assert_passed(&report);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_history_api() {
        let report = run(
            "history_api = false",
            r##"
[[steps]]
action = "wait"
ms = 500

[[steps]]
action = "navigate"
section = "music"

[[steps]]
action = "wait"
ms = 2000

[[steps]]
action = "expect"
current = "music"
hash = "#music"
scroll_top = 800
"##,
        )
        .await;
        assert_passed(&report);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_intersection_observer() {
        let report = run(
            "intersection_observer = false",
            r##"
[[steps]]
action = "scroll_to_section"
section = "shows"

[[steps]]
action = "wait"
ms = 1000

[[steps]]
action = "expect"
current = "home"
"##,
        )
        .await;
        assert_passed(&report);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_mount_resolves_fragment() {
        let scenario = Scenario::from_toml(
            r##"
name = "late mount"
initial_hash = "#shows"

[[sections]]
id = "home"

[[sections]]
id = "shows"
mounted = false

[[steps]]
action = "expect"
current = "home"

[[steps]]
action = "mount"
section = "shows"

[[steps]]
action = "wait"
ms = 2000

[[steps]]
action = "expect"
current = "shows"
scroll_top = 800
"##,
        )
        .unwrap();
        let report = run_scenario(&NavConfig::default(), &scenario).await.unwrap();
        assert_passed(&report);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_expectations_are_reported() {
        let report = run(
            "",
            r##"
[[steps]]
action = "expect"
current = "shows"
hash = "#elsewhere"

[[steps]]
action = "navigate"
section = ""
"##,
        )
        .await;
        assert!(!report.passed());
        assert_eq!(report.failures.len(), 3);
        assert!(report.failures.iter().all(|f| f.step == 1 || f.step == 2));
    }
}
