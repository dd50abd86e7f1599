use crate::cmd::Settings;
use crate::output::{print_json, print_table};
use serde::Serialize;
use upgrade_core::{Phase, RunnerRegistry};

#[derive(Serialize)]
struct GroupEntry {
    group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    handler: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_phase: Option<Phase>,
    runmodes: Vec<String>,
    /// Phase → ordered action names; empty phases left out.
    actions: Vec<(Phase, Vec<String>)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run(settings: &Settings) -> anyhow::Result<()> {
    let package = settings.open_package()?;
    let registry = RunnerRegistry::with_defaults();

    let entries: Vec<GroupEntry> = package
        .load_infos(&registry)?
        .into_iter()
        .map(|(group, loaded)| match loaded {
            Ok(info) => GroupEntry {
                group,
                handler: Some(info.handler().to_string()),
                mode: Some(info.mode().to_string()),
                default_phase: Some(info.default_phase()),
                runmodes: info.runmodes().iter().cloned().collect(),
                actions: Phase::all()
                    .iter()
                    .filter(|p| !info.actions_for(**p).is_empty())
                    .map(|p| {
                        let names = info
                            .actions_for(*p)
                            .iter()
                            .map(|a| a.name().to_string())
                            .collect();
                        (*p, names)
                    })
                    .collect(),
                error: None,
            },
            Err(e) => GroupEntry {
                group,
                handler: None,
                mode: None,
                default_phase: None,
                runmodes: Vec::new(),
                actions: Vec::new(),
                error: Some(e.to_string()),
            },
        })
        .collect();

    if settings.json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("No upgrade groups in {}.", package.name());
        return Ok(());
    }

    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            let actions = match &e.error {
                Some(err) => format!("error: {err}"),
                None => e
                    .actions
                    .iter()
                    .map(|(phase, names)| format!("{phase}: {}", names.join(", ")))
                    .collect::<Vec<_>>()
                    .join("; "),
            };
            vec![
                e.group.clone(),
                e.handler.clone().unwrap_or_else(|| "-".into()),
                e.mode.clone().unwrap_or_else(|| "-".into()),
                if e.runmodes.is_empty() {
                    "*".to_string()
                } else {
                    e.runmodes.join(",")
                },
                actions,
            ]
        })
        .collect();
    print_table(&["GROUP", "HANDLER", "MODE", "RUNMODES", "ACTIONS"], &rows);
    Ok(())
}
