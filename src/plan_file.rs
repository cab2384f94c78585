//! Plan files: installer plans saved as JSON.
//!
//! A plan file lists groups of command steps, each with an explicit priority.
//! It is validated before any plan is built, so a malformed file never starts
//! a partial install.

use crate::action_group::ActionGroup;
use crate::actions::script::{CommandSpec, ScriptAction};
use crate::plan::PlanBuilder;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// One command step inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    pub priority: i32,
    pub title: String,
    #[serde(flatten)]
    pub command: CommandSpec,
}

/// A group of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub priority: i32,
    pub name: String,
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

/// A complete plan description that can be saved/loaded
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanFile {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
}

impl PlanFile {
    /// Save the plan to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize plan to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write plan to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load a plan from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read plan from {:?}", path.as_ref()))?;

        let plan: Self = serde_json::from_str(&content).context("Failed to parse plan JSON")?;

        Ok(plan)
    }

    /// Validate the plan description
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Plan name must be specified");
        }

        let mut group_priorities = HashSet::new();
        for group in &self.groups {
            if group.name.trim().is_empty() {
                anyhow::bail!("Group with priority {} has no name", group.priority);
            }
            if !group_priorities.insert(group.priority) {
                anyhow::bail!(
                    "Duplicate group priority {} (group '{}')",
                    group.priority,
                    group.name
                );
            }

            let mut step_priorities = HashSet::new();
            for step in &group.steps {
                if step.title.trim().is_empty() {
                    anyhow::bail!(
                        "Step {} in group '{}' has an empty title",
                        step.priority,
                        group.name
                    );
                }
                if step.command.program.trim().is_empty() {
                    anyhow::bail!(
                        "Step '{}' in group '{}' has no program",
                        step.title,
                        group.name
                    );
                }
                if !step_priorities.insert(step.priority) {
                    anyhow::bail!(
                        "Duplicate step priority {} in group '{}'",
                        step.priority,
                        group.name
                    );
                }
            }
        }

        Ok(())
    }

    /// Validate and turn the description into a plan builder.
    ///
    /// Callbacks can still be attached to the returned builder.
    pub fn build_plan(&self, dry_run: bool) -> Result<PlanBuilder> {
        self.validate()?;

        let mut builder = PlanBuilder::new(&self.name);
        for group_spec in &self.groups {
            let mut group = ActionGroup::new(&group_spec.name);
            for step in &group_spec.steps {
                let action = ScriptAction::new(&step.title, step.command.clone())?.dry_run(dry_run);
                group.insert(step.priority, action)?;
            }
            builder = builder.group(group_spec.priority, group)?;
        }

        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample() -> PlanFile {
        serde_json::from_str(
            r#"{
                "name": "storefront",
                "groups": [
                    { "priority": 2, "name": "seed",
                      "steps": [ { "priority": 1, "title": "Load catalog", "program": "true" } ] },
                    { "priority": 1, "name": "schema",
                      "steps": [
                        { "priority": 10, "title": "Create tables", "program": "true",
                          "args": ["--all"], "env": { "STAGE": "schema" } },
                        { "priority": 20, "title": "Create indexes", "program": "true" }
                      ] }
                ]
            }"#,
        )
        .expect("sample plan should parse")
    }

    #[test]
    fn test_parse_flattened_command() {
        let plan = sample();
        let step = &plan.groups[1].steps[0];
        assert_eq!(step.command.program, "true");
        assert_eq!(step.command.args, vec!["--all"]);
        assert_eq!(step.command.env.get("STAGE").map(String::as_str), Some("schema"));
    }

    #[test]
    fn test_validation_valid_plan() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validation_empty_name() {
        let mut plan = sample();
        plan.name = "  ".to_string();
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_validation_duplicate_group_priority() {
        let mut plan = sample();
        plan.groups[0].priority = 1;
        let err = plan.validate().unwrap_err().to_string();
        assert!(err.contains("Duplicate group priority 1"));
    }

    #[test]
    fn test_validation_duplicate_step_priority() {
        let mut plan = sample();
        plan.groups[1].steps[1].priority = 10;
        let err = plan.validate().unwrap_err().to_string();
        assert!(err.contains("Duplicate step priority 10"));
    }

    #[test]
    fn test_validation_empty_title_and_program() {
        let mut plan = sample();
        plan.groups[0].steps[0].title = String::new();
        assert!(plan.validate().is_err());

        let mut plan = sample();
        plan.groups[0].steps[0].command.program = String::new();
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_build_plan_orders_groups_by_priority() {
        let plan = sample().build_plan(true).unwrap().build();
        let names: Vec<&str> = plan.groups().map(|(_, g)| g.name()).collect();
        assert_eq!(names, vec!["schema", "seed"]);
        assert_eq!(plan.action_count(), 3);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let plan = sample();
        let file = NamedTempFile::new().expect("Failed to create temp file");
        plan.save_to_file(file.path()).expect("Failed to save");

        let loaded = PlanFile::load_from_file(file.path()).expect("Failed to load");
        assert_eq!(loaded, plan);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = PlanFile::load_from_file("/nonexistent/plan.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(file, "{{ not json").expect("Failed to write");
        let err = PlanFile::load_from_file(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse plan JSON"));
    }
}
