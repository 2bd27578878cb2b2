use std::path::PathBuf;

use anyhow::{bail, Result};
use tracing::debug;

use sectionnav_core::NavConfig;
use sectionnav_sim::{run_scenario, Scenario, ScenarioReport};

pub async fn run(config: &NavConfig, files: &[PathBuf], json: bool) -> Result<()> {
    // Waits inside scenarios advance virtual time only
    tokio::time::pause();

    let mut reports = Vec::with_capacity(files.len());
    for path in files {
        debug!(path = %path.display(), "Loading scenario");
        let scenario = Scenario::load(path)?;
        let report = run_scenario(config, &scenario).await?;
        if !json {
            print_report(&report);
        }
        reports.push(report);
    }

    let failed = reports.iter().filter(|r| !r.passed()).count();
    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!("{} scenarios, {} passed, {} failed", reports.len(), reports.len() - failed, failed);
    }

    if failed > 0 {
        bail!("{} of {} scenarios failed", failed, reports.len());
    }
    Ok(())
}

fn print_report(report: &ScenarioReport) {
    let status = if report.passed() { "ok" } else { "FAILED" };
    println!("{} ... {} ({} steps)", report.name, status, report.steps);

    for failure in &report.failures {
        println!("    step {}: {}", failure.step, failure.message);
    }

    let state = &report.final_state;
    let current = state.current_section.as_ref().map_or("none", |s| s.as_str());
    println!("    final: section={} url={} history={}", current, report.url, report.history_len);
    println!();
}
