use crate::cmd::Settings;
use crate::output::{or_dash, print_json, print_table};
use chrono::{DateTime, Utc};
use serde::Serialize;
use upgrade_core::status::GroupStatus;

#[derive(Serialize)]
struct StatusOutput {
    package: String,
    root: String,
    version: Option<String>,
    upgraded: Option<DateTime<Utc>>,
    groups: Vec<GroupStatus>,
}

pub fn run(settings: &Settings) -> anyhow::Result<()> {
    let package = settings.open_package()?;
    let store = settings.read_store(&package)?;

    let mut groups = Vec::new();
    for group in store.groups()? {
        if let Some(status) = store.group_status(&group)? {
            groups.push(status);
        }
    }
    let out = StatusOutput {
        package: package.name().to_string(),
        root: store.root().to_string(),
        version: store.version()?,
        upgraded: store.upgrade_time()?,
        groups,
    };

    if settings.json {
        return print_json(&out);
    }

    println!("Package:  {}", out.package);
    println!("Record:   {}", out.root);
    println!("Version:  {}", or_dash(out.version.as_deref()));
    println!(
        "Upgraded: {}",
        or_dash(out.upgraded.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC")))
    );
    if out.groups.is_empty() {
        println!("\nNo groups recorded.");
        return Ok(());
    }
    println!();
    let rows: Vec<Vec<String>> = out
        .groups
        .iter()
        .map(|g| {
            vec![
                g.group.clone(),
                g.actions.len().to_string(),
                or_dash(g.updated.map(|t| t.format("%Y-%m-%d %H:%M:%S"))),
                g.actions.join(", "),
            ]
        })
        .collect();
    print_table(&["GROUP", "COUNT", "UPDATED", "ACTIONS"], &rows);
    Ok(())
}
