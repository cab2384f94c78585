//! Top-level installer plan.
//!
//! A [`Plan`] is an ordered set of [`ActionGroup`]s keyed by priority. It is
//! assembled once through [`PlanBuilder`] and then run with
//! [`Plan::install`], which executes groups in ascending priority, stops at
//! the first failing group and reports progress at two levels:
//!
//! ```text
//! Plan::install
//!   ├─ group 1 ── action 1, action 2, ...   (group progress, action titles)
//!   ├─ group 2 ── ...
//!   └─ ...                                   (overall progress per group)
//! ```
//!
//! # What This Explicitly Refuses To Do
//!
//! - Run groups or actions concurrently
//! - Roll back groups that already completed
//! - Retry a failing action
//! - Run asynchronously: [`Plan::install_async`] fails with
//!   `UnsupportedOperation` instead of quietly blocking

use crate::action::ActionResult;
use crate::action_group::{ActionGroup, GroupReporter};
use crate::error::{InstallError, Result};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use tracing::{debug, error, info};

/// Callback receiving a fraction in `[0, 1]`.
pub type ProgressFn = Box<dyn FnMut(f64)>;

/// Callback receiving the title of the action about to run.
pub type TitleFn = Box<dyn FnMut(&str)>;

/// An ordered, immutable collection of action groups.
pub struct Plan {
    name: String,
    groups: BTreeMap<i32, ActionGroup>,
    on_overall_progress: Option<ProgressFn>,
    on_group_progress: Option<ProgressFn>,
    on_action_title: Option<TitleFn>,
}

impl Plan {
    /// Start building a plan.
    pub fn builder(name: impl Into<String>) -> PlanBuilder {
        PlanBuilder::new(name)
    }

    /// Build a callback-free plan from `(priority, group)` pairs.
    ///
    /// # Errors
    ///
    /// - `DuplicatePriority` if two groups share a priority
    pub fn from_groups<I>(name: impl Into<String>, groups: I) -> Result<Self>
    where
        I: IntoIterator<Item = (i32, ActionGroup)>,
    {
        let mut builder = PlanBuilder::new(name);
        for (priority, group) in groups {
            builder = builder.group(priority, group)?;
        }
        Ok(builder.build())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of groups in the plan.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of actions across every group.
    pub fn action_count(&self) -> usize {
        self.groups.values().map(ActionGroup::len).sum()
    }

    /// Groups in execution order.
    pub fn groups(&self) -> impl Iterator<Item = (i32, &ActionGroup)> {
        self.groups.iter().map(|(p, g)| (*p, g))
    }

    /// Run every group in ascending priority, stopping at the first failure.
    ///
    /// A plan with no groups succeeds without invoking any callback. An empty
    /// group still counts as a completed group for overall progress. On
    /// success the payload of the last group is returned.
    ///
    /// # Errors
    ///
    /// Returns the first failing group's error unchanged. Later groups are
    /// never started.
    pub fn install(&mut self) -> ActionResult {
        if self.groups.is_empty() {
            info!("Plan '{}' has no groups, nothing to install", self.name);
            return Ok(None);
        }

        let total = self.groups.len();
        info!(
            "Installing plan '{}': {} groups, {} actions",
            self.name,
            total,
            self.action_count()
        );

        let mut reporter = GroupReporter::new();
        if let Some(callback) = self.on_group_progress.as_deref_mut() {
            reporter = reporter.with_progress(callback);
        }
        if let Some(callback) = self.on_action_title.as_deref_mut() {
            reporter = reporter.with_action_title(callback);
        }

        let mut completed = 0usize;
        let mut last_payload = None;

        for (priority, group) in &self.groups {
            debug!("Starting group {} '{}' ({} actions)", priority, group.name(), group.len());

            match group.perform_install(&mut reporter) {
                Ok(payload) => {
                    completed += 1;
                    last_payload = payload;
                    info!("Group '{}' complete ({}/{})", group.name(), completed, total);
                    if let Some(callback) = self.on_overall_progress.as_deref_mut() {
                        callback(completed as f64 / total as f64);
                    }
                }
                Err(e) => {
                    error!(
                        "Plan '{}' failed in group '{}' after {}/{} groups: {}",
                        self.name,
                        group.name(),
                        completed,
                        total,
                        e
                    );
                    return Err(e);
                }
            }
        }

        info!("Plan '{}' installed successfully", self.name);
        Ok(last_payload)
    }

    /// Asynchronous entry point, deliberately unsupported.
    ///
    /// Steps depend on the durable side effects of earlier steps, so a plan
    /// only runs through the blocking [`install`](Self::install). This fails
    /// immediately without executing any action.
    pub async fn install_async(&mut self) -> ActionResult {
        Err(InstallError::unsupported(format!(
            "plan '{}' cannot be installed asynchronously; use install()",
            self.name
        )))
    }

    /// Returns a summary of the plan for logging/display.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Plan: {}", self.name),
            format!("  Groups ({}), actions ({}):", self.len(), self.action_count()),
        ];
        for (priority, group) in &self.groups {
            lines.push(format!("    [{}] {} ({} actions)", priority, group.name(), group.len()));
            for (i, title) in group.titles().into_iter().enumerate() {
                lines.push(format!("        {}. {}", i + 1, title));
            }
        }
        lines.join("\n")
    }
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("name", &self.name)
            .field("groups", &self.groups)
            .field("on_overall_progress", &self.on_overall_progress.is_some())
            .field("on_group_progress", &self.on_group_progress.is_some())
            .field("on_action_title", &self.on_action_title.is_some())
            .finish()
    }
}

/// Assembles a [`Plan`] from groups and optional callbacks.
///
/// # Example
///
/// ```
/// use installkit::action::{Action, FnAction};
/// use installkit::plan::Plan;
///
/// # fn main() -> installkit::Result<()> {
/// let mut plan = Plan::builder("demo")
///     .group(1, FnAction::new("Say hello", || Ok(None))?.into_group())?
///     .on_overall_progress(|f| println!("{:.0}%", f * 100.0))
///     .build();
///
/// plan.install()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct PlanBuilder {
    name: String,
    groups: BTreeMap<i32, ActionGroup>,
    on_overall_progress: Option<ProgressFn>,
    on_group_progress: Option<ProgressFn>,
    on_action_title: Option<TitleFn>,
}

impl PlanBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a group under `priority`.
    ///
    /// # Errors
    ///
    /// - `DuplicatePriority` if `priority` is already taken in this plan
    pub fn group(mut self, priority: i32, group: ActionGroup) -> Result<Self> {
        match self.groups.entry(priority) {
            Entry::Occupied(_) => {
                return Err(InstallError::duplicate_priority(
                    format!("plan '{}'", self.name),
                    priority,
                ));
            }
            Entry::Vacant(slot) => {
                slot.insert(group);
            }
        }
        Ok(self)
    }

    /// Called with `completed_groups / total_groups` after each successful group.
    pub fn on_overall_progress(mut self, callback: impl FnMut(f64) + 'static) -> Self {
        self.on_overall_progress = Some(Box::new(callback));
        self
    }

    /// Called with each group's own `completed / total` after each successful action.
    pub fn on_group_progress(mut self, callback: impl FnMut(f64) + 'static) -> Self {
        self.on_group_progress = Some(Box::new(callback));
        self
    }

    /// Called with an action's title just before it executes.
    pub fn on_action_title(mut self, callback: impl FnMut(&str) + 'static) -> Self {
        self.on_action_title = Some(Box::new(callback));
        self
    }

    pub fn build(self) -> Plan {
        Plan {
            name: self.name,
            groups: self.groups,
            on_overall_progress: self.on_overall_progress,
            on_group_progress: self.on_group_progress,
            on_action_title: self.on_action_title,
        }
    }
}

impl fmt::Debug for PlanBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanBuilder")
            .field("name", &self.name)
            .field("groups", &self.groups)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, FnAction};
    use std::cell::RefCell;
    use std::future::Future;
    use std::pin::pin;
    use std::rc::Rc;
    use std::task::{Context, Poll, Waker};

    fn ok_group(name: &str, titles: &[&str]) -> ActionGroup {
        let mut group = ActionGroup::new(name);
        for (i, title) in titles.iter().enumerate() {
            group
                .insert(i as i32 + 1, FnAction::new(*title, || Ok(None)).unwrap())
                .unwrap();
        }
        group
    }

    #[test]
    fn test_empty_plan_invokes_no_callback() {
        let calls = Rc::new(RefCell::new(0));
        let (a, b, c) = (Rc::clone(&calls), Rc::clone(&calls), Rc::clone(&calls));
        let mut plan = Plan::builder("empty")
            .on_overall_progress(move |_| *a.borrow_mut() += 1)
            .on_group_progress(move |_| *b.borrow_mut() += 1)
            .on_action_title(move |_| *c.borrow_mut() += 1)
            .build();

        assert!(plan.install().unwrap().is_none());
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn test_overall_progress_per_group() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut plan = Plan::builder("three")
            .group(1, ok_group("a", &["a1"]))
            .unwrap()
            .group(2, ok_group("b", &["b1", "b2"]))
            .unwrap()
            .group(3, ok_group("c", &[]))
            .unwrap()
            .on_overall_progress(move |f| sink.borrow_mut().push(f))
            .build();

        plan.install().unwrap();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert!((seen[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((seen[1] - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(seen[2], 1.0);
    }

    #[test]
    fn test_duplicate_group_priority_is_rejected() {
        let err = Plan::builder("dupes")
            .group(5, ok_group("a", &["a1"]))
            .unwrap()
            .group(5, ok_group("b", &["b1"]))
            .unwrap_err();
        assert!(matches!(
            err,
            InstallError::DuplicatePriority { priority: 5, .. }
        ));
    }

    #[test]
    fn test_action_titles_reported_in_order() {
        let titles = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&titles);
        let mut plan = Plan::builder("titles")
            .group(2, ok_group("second", &["s1"]))
            .unwrap()
            .group(1, ok_group("first", &["f1", "f2"]))
            .unwrap()
            .on_action_title(move |t| sink.borrow_mut().push(t.to_string()))
            .build();

        plan.install().unwrap();
        assert_eq!(*titles.borrow(), vec!["f1", "f2", "s1"]);
    }

    #[test]
    fn test_install_async_is_unsupported() {
        let ran = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&ran);
        let action = FnAction::new("never", move || {
            *flag.borrow_mut() = true;
            Ok(None)
        })
        .unwrap();
        let mut plan = Plan::builder("async")
            .group(1, action.into_group())
            .unwrap()
            .build();

        let mut cx = Context::from_waker(Waker::noop());
        let mut fut = pin!(plan.install_async());
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(Err(InstallError::UnsupportedOperation(msg))) => {
                assert!(msg.contains("async"));
            }
            other => panic!("expected unsupported operation, got {other:?}"),
        }
        assert!(!*ran.borrow());
    }

    #[test]
    fn test_summary_lists_groups_and_actions() {
        let plan = Plan::from_groups(
            "summary",
            vec![
                (1, ok_group("schema", &["Create tables"])),
                (2, ok_group("seed", &["Insert defaults", "Insert admin"])),
            ],
        )
        .unwrap();

        let summary = plan.summary();
        assert!(summary.contains("Plan: summary"));
        assert!(summary.contains("[1] schema (1 actions)"));
        assert!(summary.contains("2. Insert admin"));
        assert_eq!(plan.action_count(), 3);
    }
}
