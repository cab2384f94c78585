//! The action contract.
//!
//! An [`Action`] is a single titled unit of installer work. Every action
//! returns an [`ActionResult`]: success with an optional JSON payload, or an
//! [`InstallError`] carrying the cause. Groups run actions through
//! [`run_guarded`], which turns a panic into a failing result so nothing above
//! the action ever has to unwind.

use crate::action_group::ActionGroup;
use crate::error::{InstallError, Result};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Optional data an action hands back on success.
pub type Payload = serde_json::Value;

/// The outcome shape shared by actions, groups and plans.
pub type ActionResult = Result<Option<Payload>>;

/// A validated, non-empty action title.
///
/// # Example
///
/// ```
/// use installkit::action::ActionTitle;
///
/// let title = ActionTitle::new("Update schema").unwrap();
/// assert_eq!(title.as_str(), "Update schema");
/// assert!(ActionTitle::new("   ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionTitle(String);

impl ActionTitle {
    /// Validate and wrap a title.
    ///
    /// # Errors
    ///
    /// - `EmptyTitle` if the title is empty or only whitespace
    pub fn new(title: impl Into<String>) -> Result<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(InstallError::EmptyTitle);
        }
        Ok(Self(title))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ActionTitle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A single unit of orchestrated work.
///
/// # Contract
///
/// - `title()` is fixed at construction and never empty.
/// - `execute()` reports operational failures through the returned result.
///   It should not panic; if it does, the enclosing group catches the panic
///   and reports `ActionPanicked`.
/// - Any resource an action acquires inside `execute()` is released before
///   `execute()` returns.
pub trait Action {
    /// Human-readable title, reported through the current-action callback.
    fn title(&self) -> &str;

    /// Perform the unit of work.
    fn execute(&self) -> ActionResult;

    /// Wrap this action as a one-item group at priority 1.
    fn into_group(self) -> ActionGroup
    where
        Self: Sized + 'static,
    {
        ActionGroup::single(self)
    }
}

impl<A: Action + ?Sized> Action for Box<A> {
    fn title(&self) -> &str {
        (**self).title()
    }

    fn execute(&self) -> ActionResult {
        (**self).execute()
    }
}

/// Execute an action, converting a panic into `ActionPanicked`.
pub fn run_guarded(action: &dyn Action) -> ActionResult {
    match panic::catch_unwind(AssertUnwindSafe(|| action.execute())) {
        Ok(result) => result,
        Err(payload) => Err(InstallError::ActionPanicked {
            title: action.title().to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// Run `f` with the default panic hook replaced by a debug log line.
///
/// [`run_guarded`] already reports a panic as `ActionPanicked`, so the
/// default `thread panicked at` message would report it a second time. The
/// previous hook is restored before returning.
pub fn with_panics_logged<R>(f: impl FnOnce() -> R) -> R {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(|info| tracing::debug!("action panicked: {}", info)));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    panic::set_hook(previous);
    match result {
        Ok(value) => value,
        Err(payload) => panic::resume_unwind(payload),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// An action backed by a closure.
///
/// Useful for small steps that do not warrant their own type. Errors returned
/// by the closure become `ActionFailed` with the closure's error as the cause.
pub struct FnAction<F> {
    title: ActionTitle,
    work: F,
}

impl<F> FnAction<F>
where
    F: Fn() -> anyhow::Result<Option<Payload>>,
{
    /// # Errors
    ///
    /// - `EmptyTitle` if `title` is empty or only whitespace
    pub fn new(title: impl Into<String>, work: F) -> Result<Self> {
        Ok(Self {
            title: ActionTitle::new(title)?,
            work,
        })
    }
}

impl<F> Action for FnAction<F>
where
    F: Fn() -> anyhow::Result<Option<Payload>>,
{
    fn title(&self) -> &str {
        self.title.as_str()
    }

    fn execute(&self) -> ActionResult {
        (self.work)().map_err(|e| InstallError::action_failed(self.title.as_str(), e))
    }
}

impl<F> fmt::Debug for FnAction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAction")
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}
