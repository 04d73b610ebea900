use anyhow::Result;
use colored::*;
use stepfile_core::colors::label_color;
use stepfile_core::results::CommandInfo;
use stepfile_core::StepfileManager;

fn print_command(command: &CommandInfo) {
    let label = command.id.to_string();
    let mut details = Vec::new();
    if !command.depends_on.is_empty() {
        details.push(format!("depends on: {}", command.depends_on.join(", ")));
    }
    if !command.groups.is_empty() {
        details.push(format!("groups: {}", command.groups.join(", ")));
    }

    println!(
        "  {} {}",
        label.color(label_color(&label)).bold(),
        command.text
    );
    if !details.is_empty() {
        println!("    {}", details.join("; ").dimmed());
    }
}

fn print_pairs(heading: &str, pairs: &[(String, String)]) {
    println!("{}", heading.bold().underline());
    if pairs.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for (key, value) in pairs {
        println!("  {} = {}", key.cyan(), value);
    }
}

pub fn execute(manager: &StepfileManager) -> Result<()> {
    let result = manager.list_commands();

    println!("{}", "Commands".bold().underline());
    if result.named_commands.is_empty() {
        println!("  {}", "No named commands".dimmed());
    }
    for command in &result.named_commands {
        print_command(command);
    }

    println!();
    println!("{}", "Unnamed commands".bold().underline());
    if result.unnamed_commands.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for command in &result.unnamed_commands {
        print_command(command);
    }

    println!();
    print_pairs("Variables", &result.variables);
    println!();
    print_pairs("Shell environment", &result.shell_env);

    Ok(())
}
