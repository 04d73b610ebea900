use anyhow::Result;
use colored::*;
use stepfile_core::schedule::format_cycles;
use stepfile_core::StepfileManager;

pub fn execute(manager: &StepfileManager) -> Result<()> {
    println!("{}", "Command Dependency Graph:".bold().underline());

    let report = manager.graph_report();

    if !report.cycles.is_empty() {
        println!(
            "{} {}",
            "Warning:".yellow().bold(),
            format!(
                "Circular dependencies detected: {}",
                format_cycles(&report.cycles)
            )
            .yellow()
        );
    }

    for command in &report.commands {
        println!("{}", command.name.blue().bold());

        if command.dependencies.is_empty() {
            println!("  {}", "no dependencies".dimmed());
        } else {
            let deps = command
                .dependencies
                .iter()
                .map(|dep| {
                    if dep.missing {
                        format!("{} {}", dep.name, "(missing)".red())
                    } else {
                        dep.name.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            println!("  {} {}", "depends on:".dimmed(), deps);
        }
    }

    println!();
    println!("{} {}", "Unnamed commands:".bold(), report.unnamed_count);

    if report.groups.is_empty() {
        println!("{} {}", "Groups:".bold(), "none".dimmed());
    } else {
        println!("{}", "Groups:".bold());
        for group in &report.groups {
            let members = if group.members.is_empty() {
                "(empty)".dimmed().to_string()
            } else {
                group.members.join(", ")
            };
            println!("  {}: {}", group.name.cyan(), members);
        }
    }

    Ok(())
}
