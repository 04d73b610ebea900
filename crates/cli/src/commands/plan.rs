use anyhow::Result;
use colored::*;
use stepfile_core::colors::label_color;
use stepfile_core::StepfileManager;

pub fn execute(manager: &StepfileManager) -> Result<()> {
    let plan = manager.plan()?;

    println!("{}:", "Execution order".bold());
    if plan.is_empty() {
        println!("  {}", "No commands found".dimmed());
        return Ok(());
    }

    let config = manager.config();
    for (i, id) in plan.order().iter().enumerate() {
        let text = config
            .command(id)
            .map(|command| command.text.as_str())
            .unwrap_or_default();
        let label = id.to_string();

        println!(
            "  {}. {} {}",
            i + 1,
            label.color(label_color(&label)).bold(),
            text.dimmed()
        );
    }

    Ok(())
}
