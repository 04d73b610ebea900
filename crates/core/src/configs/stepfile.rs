//! Stepfile model and parser
//!
//! A Stepfile is a line-oriented list of variables, shell environment entries
//! and commands. Commands may carry annotations that name groups and
//! dependencies:
//!
//! ```text
//! # variables and environment
//! PROJECT = demo
//! NODE_ENV.sh = production
//!
//! @group(checks) lint = cargo clippy
//! @group(checks) test = cargo test
//! @depends_group(checks) build = cargo build --release
//! @depends(build) echo built $PROJECT$
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

use tracing::warn;

use crate::results::CommandId;
use crate::types::{StepfileError, StepfileResult};

/// A single task declared in a Stepfile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCommand {
    /// Identifier other commands can depend on. `None` for unnamed commands.
    pub name: Option<String>,
    /// Raw command line, before variable expansion
    pub text: String,
    /// Dependency names. Group names are replaced by their members once
    /// [`StepfileConfig::expand_groups`] has run.
    pub depends_on: Vec<String>,
    pub groups: BTreeSet<String>,
    /// 1-based line number in the source file
    pub line_number: usize,
}

impl StepCommand {
    /// Name for named commands, otherwise the raw text
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.text)
    }
}

/// In-memory form of a parsed Stepfile
#[derive(Debug, Clone, Default)]
pub struct StepfileConfig {
    pub variables: BTreeMap<String, String>,
    pub shell_env: BTreeMap<String, String>,
    /// Group name to member command names, in declaration order
    pub groups: BTreeMap<String, Vec<String>>,
    named_commands: Vec<StepCommand>,
    named_index: HashMap<String, usize>,
    unnamed_commands: Vec<StepCommand>,
    pub(crate) groups_expanded: bool,
}

impl StepfileConfig {
    /// Named commands in declaration order
    pub fn named_commands(&self) -> &[StepCommand] {
        &self.named_commands
    }

    /// Unnamed commands in file order
    pub fn unnamed_commands(&self) -> &[StepCommand] {
        &self.unnamed_commands
    }

    pub fn named_command(&self, name: &str) -> Option<&StepCommand> {
        self.named_index
            .get(name)
            .map(|&index| &self.named_commands[index])
    }

    /// Look up a named or unnamed command by id
    pub fn command(&self, id: &CommandId) -> Option<&StepCommand> {
        match id {
            CommandId::Named(name) => self.named_command(name),
            CommandId::Unnamed(index) => self.unnamed_commands.get(*index),
        }
    }

    pub fn contains_command(&self, name: &str) -> bool {
        self.named_index.contains_key(name)
    }

    /// Whether group dependencies have already been replaced by members
    pub fn is_expanded(&self) -> bool {
        self.groups_expanded
    }

    /// Insert a command. A named command replaces any earlier command with
    /// the same name, keeping the earlier declaration position. Only the
    /// replacing declaration's groups count.
    pub fn add_command(&mut self, command: StepCommand) {
        let Some(name) = command.name.clone() else {
            self.unnamed_commands.push(command);
            return;
        };

        let slot = match self.named_index.get(&name) {
            Some(&previous) => {
                let replaced = &self.named_commands[previous];
                warn!(
                    "Command '{}' on line {} replaces the declaration on line {}",
                    name, command.line_number, replaced.line_number
                );
                for group in &replaced.groups {
                    if let Some(members) = self.groups.get_mut(group) {
                        members.retain(|member| member != &name);
                    }
                }
                Some(previous)
            }
            None => None,
        };

        for group in &command.groups {
            let members = self.groups.entry(group.clone()).or_default();
            if !members.contains(&name) {
                members.push(name.clone());
            }
        }

        match slot {
            Some(previous) => self.named_commands[previous] = command,
            None => {
                self.named_index.insert(name, self.named_commands.len());
                self.named_commands.push(command);
            }
        }
    }

    pub(crate) fn commands_mut(&mut self) -> impl Iterator<Item = &mut StepCommand> {
        self.named_commands
            .iter_mut()
            .chain(self.unnamed_commands.iter_mut())
    }
}

/// Annotation prefix on a command line
#[derive(Debug, Clone, PartialEq, Eq)]
enum Annotation {
    Group(Vec<String>),
    Depends(Vec<String>),
    DependsGroup(Vec<String>),
}

/// A non-empty, non-comment line with its annotations split off
struct SourceLine<'a> {
    line_number: usize,
    annotations: Vec<Annotation>,
    body: &'a str,
}

/// Read and parse a Stepfile from disk
pub fn load_stepfile(path: &Path) -> StepfileResult<StepfileConfig> {
    if !path.exists() {
        return Err(StepfileError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    parse_stepfile(&content)
}

/// Parse Stepfile text into a [`StepfileConfig`]
///
/// Group dependencies are left unexpanded; call
/// [`StepfileConfig::expand_groups`] before scheduling.
pub fn parse_stepfile(content: &str) -> StepfileResult<StepfileConfig> {
    let mut lines = Vec::new();
    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        lines.push(split_annotations(index + 1, line)?);
    }

    // An uppercase assignment that something depends on is a command, not a variable
    let referenced: HashSet<&str> = lines
        .iter()
        .flat_map(|line| line.annotations.iter())
        .filter_map(|annotation| match annotation {
            Annotation::Depends(names) => Some(names),
            _ => None,
        })
        .flatten()
        .map(String::as_str)
        .collect();

    let mut config = StepfileConfig::default();

    for source in &lines {
        if source.annotations.is_empty() {
            if let Some((ident, value)) = split_assignment(source.body) {
                if let Some(env_name) = ident.strip_suffix(".sh") {
                    config
                        .shell_env
                        .insert(env_name.to_string(), value.to_string());
                    continue;
                }
                if is_uppercase_ident(ident) && !referenced.contains(ident) {
                    config.variables.insert(ident.to_string(), value.to_string());
                    continue;
                }
            }
        }

        config.add_command(build_command(source)?);
    }

    Ok(config)
}

fn build_command(source: &SourceLine<'_>) -> StepfileResult<StepCommand> {
    let mut groups = BTreeSet::new();
    let mut depends_on = Vec::new();

    for annotation in &source.annotations {
        match annotation {
            Annotation::Group(names) => groups.extend(names.iter().cloned()),
            Annotation::Depends(names) | Annotation::DependsGroup(names) => {
                depends_on.extend(names.iter().cloned())
            }
        }
    }

    let (name, text) = match split_assignment(source.body) {
        Some((ident, text)) => {
            if text.is_empty() {
                return Err(StepfileError::EmptyCommand {
                    line_number: source.line_number,
                    name: ident.to_string(),
                });
            }
            (Some(ident.to_string()), text.to_string())
        }
        None => (None, source.body.to_string()),
    };

    Ok(StepCommand {
        name,
        text,
        depends_on,
        groups,
        line_number: source.line_number,
    })
}

fn split_annotations(line_number: usize, line: &str) -> StepfileResult<SourceLine<'_>> {
    let malformed = || StepfileError::MalformedAnnotation {
        line_number,
        line: line.to_string(),
    };

    let mut annotations = Vec::new();
    let mut rest = line;

    while let Some(after_at) = rest.strip_prefix('@') {
        let open = after_at.find('(').ok_or_else(malformed)?;
        let close = after_at.find(')').ok_or_else(malformed)?;
        if close < open {
            return Err(malformed());
        }

        let keyword = &after_at[..open];
        let names = parse_name_list(&after_at[open + 1..close]).ok_or_else(malformed)?;
        let annotation = match keyword {
            "group" => Annotation::Group(names),
            "depends" => Annotation::Depends(names),
            "depends_group" => Annotation::DependsGroup(names),
            _ => return Err(malformed()),
        };

        annotations.push(annotation);
        rest = after_at[close + 1..].trim_start();
    }

    if !annotations.is_empty() && rest.is_empty() {
        return Err(malformed());
    }

    Ok(SourceLine {
        line_number,
        annotations,
        body: rest,
    })
}

fn parse_name_list(list: &str) -> Option<Vec<String>> {
    let names: Vec<String> = list.split(',').map(|name| name.trim().to_string()).collect();
    if names.iter().all(|name| is_ident(name)) {
        Some(names)
    } else {
        None
    }
}

/// Split `ident = value`, returning `None` when the line does not start
/// with an identifier followed by `=`
fn split_assignment(body: &str) -> Option<(&str, &str)> {
    let (ident, value) = body.split_once('=')?;
    let ident = ident.trim_end();
    if !is_ident(ident) {
        return None;
    }
    Some((ident, value.trim()))
}

fn is_ident(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn is_uppercase_ident(ident: &str) -> bool {
    ident.chars().any(|c| c.is_ascii_alphabetic()) && !ident.chars().any(|c| c.is_ascii_lowercase())
}
