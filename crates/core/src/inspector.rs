//! Read-only dependency report
//!
//! Describes named commands with their (expanded) dependencies, the number
//! of unnamed commands and group membership. Building a report never fails:
//! unknown dependencies are flagged and cycles are listed so a broken
//! Stepfile can still be inspected.

use std::fmt;

use crate::configs::stepfile::StepfileConfig;
use crate::schedule::{format_cycles, DependencyGraph};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEntry {
    pub name: String,
    /// No named command carries this name
    pub missing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEntry {
    pub name: String,
    pub dependencies: Vec<DependencyEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    pub name: String,
    pub members: Vec<String>,
}

/// Dependency information for a parsed Stepfile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphReport {
    pub commands: Vec<CommandEntry>,
    pub unnamed_count: usize,
    pub groups: Vec<GroupEntry>,
    pub cycles: Vec<Vec<String>>,
}

/// Build the report in declaration order
pub fn inspect(config: &StepfileConfig) -> GraphReport {
    let graph = DependencyGraph::from_config(config);
    let is_missing = |command: &str, dependency: &str| {
        graph
            .missing()
            .iter()
            .any(|missing| missing.command == command && missing.dependency == dependency)
    };

    let commands = config
        .named_commands()
        .iter()
        .map(|command| CommandEntry {
            name: command.label().to_string(),
            dependencies: command
                .depends_on
                .iter()
                .map(|dep| DependencyEntry {
                    name: dep.clone(),
                    missing: is_missing(command.label(), dep),
                })
                .collect(),
        })
        .collect();

    let groups = config
        .groups
        .iter()
        .map(|(name, members)| GroupEntry {
            name: name.clone(),
            members: members.clone(),
        })
        .collect();

    GraphReport {
        commands,
        unnamed_count: config.unnamed_commands().len(),
        groups,
        cycles: graph.cycles(),
    }
}

impl fmt::Display for GraphReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Command Dependency Graph:")?;

        if !self.cycles.is_empty() {
            writeln!(
                f,
                "Warning: Circular dependencies detected: {}",
                format_cycles(&self.cycles)
            )?;
        }

        for command in &self.commands {
            writeln!(f, "{}", command.name)?;
            if command.dependencies.is_empty() {
                writeln!(f, "  no dependencies")?;
            } else {
                let deps = command
                    .dependencies
                    .iter()
                    .map(|dep| {
                        if dep.missing {
                            format!("{} (missing)", dep.name)
                        } else {
                            dep.name.clone()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(f, "  depends on: {}", deps)?;
            }
        }

        writeln!(f, "Unnamed commands: {}", self.unnamed_count)?;

        if self.groups.is_empty() {
            writeln!(f, "Groups: none")?;
        } else {
            writeln!(f, "Groups:")?;
            for group in &self.groups {
                if group.members.is_empty() {
                    writeln!(f, "  {}: (empty)", group.name)?;
                } else {
                    writeln!(f, "  {}: {}", group.name, group.members.join(", "))?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::stepfile::parse_stepfile;

    fn report(content: &str) -> GraphReport {
        let mut config = parse_stepfile(content).unwrap();
        config.expand_groups();
        inspect(&config)
    }

    #[test]
    fn test_report_lists_expanded_dependencies() {
        let report = report(
            "@group(g1) X = true
@group(g1) Y = true
@depends_group(g1) Z = echo z
echo one
echo two
",
        );

        assert_eq!(report.commands.len(), 3);
        let z = &report.commands[2];
        assert_eq!(z.name, "Z");
        let deps: Vec<_> = z.dependencies.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(deps, vec!["X", "Y"]);
        assert_eq!(report.unnamed_count, 2);
        assert_eq!(
            report.groups,
            vec![GroupEntry {
                name: "g1".to_string(),
                members: vec!["X".to_string(), "Y".to_string()],
            }]
        );

        let text = report.to_string();
        assert!(text.contains("X\n  no dependencies\n"));
        assert!(text.contains("Z\n  depends on: X, Y\n"));
        assert!(text.contains("Unnamed commands: 2\n"));
        assert!(text.contains("  g1: X, Y\n"));
        assert!(!text.contains("Warning"));
    }

    #[test]
    fn test_report_tolerates_broken_graphs() {
        let report = report(
            "@depends(b) a = true
@depends(a) b = true
@depends(ghost) c = true
",
        );

        assert_eq!(report.cycles, vec![vec!["a".to_string(), "b".to_string()]]);
        assert!(report.commands[2].dependencies[0].missing);

        let text = report.to_string();
        assert!(text.contains("Circular dependencies detected: a -> b -> a"));
        assert!(text.contains("depends on: ghost (missing)"));
        assert!(text.contains("Groups: none"));
    }
}
