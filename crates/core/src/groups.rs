//! Group expansion
//!
//! A dependency that names a group stands for every member of that group.
//! Expansion is a single substitution pass: members are not themselves
//! looked up as groups.

use std::collections::{BTreeMap, HashSet};

use crate::configs::stepfile::StepfileConfig;

/// Replace every group name in `depends_on` with the group's members.
///
/// Names that are not groups pass through unchanged. Each resulting name
/// appears once, at its first position.
pub fn expand_dependencies(
    depends_on: &[String],
    groups: &BTreeMap<String, Vec<String>>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut expanded = Vec::with_capacity(depends_on.len());

    for dependency in depends_on {
        let names = match groups.get(dependency) {
            Some(members) => members.as_slice(),
            None => std::slice::from_ref(dependency),
        };
        for name in names {
            if seen.insert(name.clone()) {
                expanded.push(name.clone());
            }
        }
    }

    expanded
}

impl StepfileConfig {
    /// Rewrite the dependency list of every command with group names
    /// expanded. Only the first call has any effect.
    pub fn expand_groups(&mut self) {
        if self.groups_expanded {
            return;
        }

        let groups = self.groups.clone();
        for command in self.commands_mut() {
            command.depends_on = expand_dependencies(&command.depends_on, &groups);
        }
        self.groups_expanded = true;
    }
}
