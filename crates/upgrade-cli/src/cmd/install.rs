use crate::cmd::{install_context, Settings};
use crate::output::{print_json, print_table};
use anyhow::Context;
use upgrade_core::processor::Outcome;
use upgrade_core::{run_install, RunnerRegistry, UpgradeProcessor};

pub fn run(settings: &Settings, runmodes: Vec<String>, version: Option<&str>) -> anyhow::Result<()> {
    let package = settings.open_package()?;
    let store = settings.open_store(&package)?;
    let registry = RunnerRegistry::with_defaults();
    let ctx = install_context(&package, runmodes, version);

    let infos = package
        .load_infos(&registry)
        .context("failed to read upgrade groups")?;
    let mut processor = UpgradeProcessor::new(store);
    processor.initialize(infos, &ctx);
    let summary = run_install(&mut processor, &ctx);

    if settings.json {
        print_json(&summary)?;
    } else {
        let rows: Vec<Vec<String>> = summary
            .reports
            .iter()
            .flat_map(|report| {
                report.outcomes.iter().map(move |o| {
                    let outcome = match (o.outcome, o.reason) {
                        (Outcome::Ran, _) => "ran".to_string(),
                        (Outcome::Failed, _) => "FAILED".to_string(),
                        (Outcome::Skipped, Some(reason)) => format!("skipped ({})", reason.as_str()),
                        (Outcome::Skipped, None) => "skipped".to_string(),
                    };
                    vec![
                        report.phase.to_string(),
                        o.group.clone(),
                        o.action.clone(),
                        outcome,
                    ]
                })
            })
            .collect();

        if rows.is_empty() {
            println!("No upgrade actions for {} {}.", summary.package, summary.version);
        } else {
            print_table(&["PHASE", "GROUP", "ACTION", "OUTCOME"], &rows);
        }
        for group in &summary.init.inactive {
            println!("Skipped group {group}: runmode not active");
        }

        let ran = summary.ran().len();
        if summary.is_success() {
            println!(
                "\nInstalled {} {}: {ran} action(s) ran.",
                summary.package, summary.version
            );
        }
    }

    summary.into_result()?;
    Ok(())
}
