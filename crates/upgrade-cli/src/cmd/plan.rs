use crate::cmd::{install_context, Settings};
use crate::output::{print_json, print_table};
use upgrade_core::{Decision, RunnerRegistry, UpgradeProcessor};

pub fn run(settings: &Settings, runmodes: Vec<String>) -> anyhow::Result<()> {
    let package = settings.open_package()?;
    let store = settings.read_store(&package)?;
    let registry = RunnerRegistry::with_defaults();
    let ctx = install_context(&package, runmodes, None);

    let mut processor = UpgradeProcessor::new(store);
    processor.initialize(package.load_infos(&registry)?, &ctx);
    let init = processor.init_report().clone();
    let plan = processor.plan();

    if settings.json {
        #[derive(serde::Serialize)]
        struct PlanOutput<'a> {
            package: &'a str,
            version: &'a str,
            init: &'a upgrade_core::processor::InitReport,
            actions: &'a [upgrade_core::PlannedAction],
        }
        return print_json(&PlanOutput {
            package: package.name(),
            version: package.version(),
            init: &init,
            actions: &plan,
        });
    }

    if plan.is_empty() {
        println!("Nothing to do.");
    } else {
        let rows: Vec<Vec<String>> = plan
            .iter()
            .map(|p| {
                let decision = match p.decision {
                    Decision::Run => "run".to_string(),
                    Decision::Skip(reason) => format!("skip ({})", reason.as_str()),
                };
                vec![p.phase.to_string(), p.group.clone(), p.action.clone(), decision]
            })
            .collect();
        print_table(&["PHASE", "GROUP", "ACTION", "DECISION"], &rows);
    }
    for group in &init.inactive {
        println!("Skipped group {group}: runmode not active");
    }
    for failure in &init.failures {
        println!("Invalid group {}: {}", failure.group, failure.message);
    }
    Ok(())
}
