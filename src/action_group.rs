//! Ordered, halt-on-failure execution of a set of actions.
//!
//! An [`ActionGroup`] keys its actions by integer priority and runs them in
//! ascending order. The first failing action stops the group; its error is
//! returned unchanged. After every successful action the group reports
//! `completed / total` through the optional progress callback.

use crate::action::{run_guarded, Action, ActionResult};
use crate::error::{InstallError, Result};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use tracing::{debug, warn};

/// Callbacks a group reports through while it runs.
///
/// The group borrows these for the duration of one `perform_install` call;
/// the plan that owns the closures lends them to each group in turn.
#[derive(Default)]
pub struct GroupReporter<'a> {
    progress: Option<&'a mut dyn FnMut(f64)>,
    action_title: Option<&'a mut dyn FnMut(&str)>,
}

impl<'a> GroupReporter<'a> {
    /// A reporter with no callbacks attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive `completed / total` after each successful action.
    pub fn with_progress(mut self, callback: &'a mut dyn FnMut(f64)) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Receive each action's title just before it executes.
    pub fn with_action_title(mut self, callback: &'a mut dyn FnMut(&str)) -> Self {
        self.action_title = Some(callback);
        self
    }

    fn report_progress(&mut self, fraction: f64) {
        if let Some(callback) = self.progress.as_deref_mut() {
            callback(fraction);
        }
    }

    fn report_action(&mut self, title: &str) {
        if let Some(callback) = self.action_title.as_deref_mut() {
            callback(title);
        }
    }
}

/// An ordered collection of actions executed as one unit.
pub struct ActionGroup {
    name: String,
    actions: BTreeMap<i32, Box<dyn Action>>,
}

impl ActionGroup {
    /// Create an empty group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: BTreeMap::new(),
        }
    }

    /// Wrap a single action as a one-item group at priority 1.
    pub fn single<A: Action + 'static>(action: A) -> Self {
        let mut actions: BTreeMap<i32, Box<dyn Action>> = BTreeMap::new();
        let name = action.title().to_string();
        actions.insert(1, Box::new(action));
        Self { name, actions }
    }

    /// Build a group from `(priority, action)` pairs.
    ///
    /// # Errors
    ///
    /// - `DuplicatePriority` if two actions share a priority
    pub fn from_actions<I>(name: impl Into<String>, actions: I) -> Result<Self>
    where
        I: IntoIterator<Item = (i32, Box<dyn Action>)>,
    {
        let mut group = Self::new(name);
        for (priority, action) in actions {
            group.insert_boxed(priority, action)?;
        }
        Ok(group)
    }

    /// Register an action under `priority`.
    ///
    /// # Errors
    ///
    /// - `DuplicatePriority` if `priority` is already taken in this group
    pub fn insert<A: Action + 'static>(&mut self, priority: i32, action: A) -> Result<()> {
        self.insert_boxed(priority, Box::new(action))
    }

    /// Register an already boxed action under `priority`.
    pub fn insert_boxed(&mut self, priority: i32, action: Box<dyn Action>) -> Result<()> {
        match self.actions.entry(priority) {
            Entry::Occupied(_) => Err(InstallError::duplicate_priority(
                format!("group '{}'", self.name),
                priority,
            )),
            Entry::Vacant(slot) => {
                slot.insert(action);
                Ok(())
            }
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_action<A: Action + 'static>(mut self, priority: i32, action: A) -> Result<Self> {
        self.insert(priority, action)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Priorities in execution order.
    pub fn priorities(&self) -> Vec<i32> {
        self.actions.keys().copied().collect()
    }

    /// Action titles in execution order.
    pub fn titles(&self) -> Vec<&str> {
        self.actions.values().map(|a| a.title()).collect()
    }

    /// Run every action in ascending priority, stopping at the first failure.
    ///
    /// An empty group succeeds without touching the reporter. On success the
    /// payload of the last action is returned.
    ///
    /// # Errors
    ///
    /// Returns the first failing action's error unchanged. Later actions are
    /// never started.
    pub fn perform_install(&self, reporter: &mut GroupReporter<'_>) -> ActionResult {
        if self.actions.is_empty() {
            debug!("Group '{}' is empty, nothing to do", self.name);
            return Ok(None);
        }

        let total = self.actions.len();
        let mut completed = 0usize;
        let mut last_payload = None;

        for (priority, action) in &self.actions {
            debug!(
                "Group '{}': running action {} '{}'",
                self.name,
                priority,
                action.title()
            );
            reporter.report_action(action.title());

            match run_guarded(action.as_ref()) {
                Ok(payload) => {
                    completed += 1;
                    last_payload = payload;
                    reporter.report_progress(completed as f64 / total as f64);
                }
                Err(e) => {
                    warn!(
                        "Group '{}' halted at action '{}' ({}/{} completed): {}",
                        self.name,
                        action.title(),
                        completed,
                        total,
                        e
                    );
                    return Err(e);
                }
            }
        }

        Ok(last_payload)
    }
}

impl fmt::Debug for ActionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionGroup")
            .field("name", &self.name)
            .field(
                "actions",
                &self
                    .actions
                    .iter()
                    .map(|(p, a)| (*p, a.title()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
