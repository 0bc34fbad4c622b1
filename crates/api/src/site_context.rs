//! Task-confined current-site context
//!
//! A mutable holder for "the site this unit of work is acting for", with a
//! configured default and a scoped override. Built on [`Cell`], so the type
//! is `!Sync` and each task or thread owns its own instance; there is no
//! cross-task visibility and no locking.

use std::cell::Cell;
use std::cmp::Ordering;
use std::future::Future;

use sitewarden_shared::AliasError;

tokio::task_local! {
    static CURRENT_SITE: CurrentSite;
}

/// Run `work` with `context` installed as the task's current site.
///
/// The cell is `!Sync`, so it never leaves the task; nested scopes shadow
/// outer ones and sibling tasks are fully independent.
pub async fn with_current_site<F>(context: CurrentSite, work: F) -> F::Output
where
    F: Future,
{
    CURRENT_SITE.scope(context, work).await
}

/// The active site id of the task's installed context.
///
/// Fails with a configuration error when no context is in scope, the same
/// way an empty [`CurrentSite`] does.
pub fn current_site_id() -> Result<i64, AliasError> {
    CURRENT_SITE.try_with(CurrentSite::get).unwrap_or_else(|_| {
        Err(AliasError::Configuration(
            "no site context in scope for this task".to_string(),
        ))
    })
}

/// The active site id for the current unit of work.
///
/// `get` falls back to the configured default; with neither a set value nor
/// a default it fails with a configuration error. Comparisons against plain
/// integers go through the resolved value, and an unresolvable context
/// compares unequal.
#[derive(Debug)]
pub struct CurrentSite {
    default: Option<i64>,
    current: Cell<Option<i64>>,
}

impl CurrentSite {
    /// Context with no default: `get` fails until `set` is called.
    pub fn new() -> Self {
        Self::with_default(None)
    }

    /// Context that falls back to `default` when nothing is set.
    pub fn with_default(default: Option<i64>) -> Self {
        Self {
            default,
            current: Cell::new(None),
        }
    }

    /// The active site id, or the default, or a configuration error.
    pub fn get(&self) -> Result<i64, AliasError> {
        self.current.get().or(self.default).ok_or_else(|| {
            AliasError::Configuration(
                "no current site set and no default configured".to_string(),
            )
        })
    }

    pub fn set(&self, site_id: i64) {
        self.current.set(Some(site_id));
    }

    /// Clear any set value, falling back to the default.
    pub fn reset(&self) {
        self.current.set(None);
    }

    /// Temporarily switch to `site_id`; the returned guard restores the
    /// prior value when dropped, including during unwinding.
    pub fn override_to(&self, site_id: i64) -> SiteOverride<'_> {
        let previous = self.current.replace(Some(site_id));
        SiteOverride { context: self, previous }
    }
}

impl Default for CurrentSite {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq<i64> for CurrentSite {
    fn eq(&self, other: &i64) -> bool {
        self.get().map(|v| v == *other).unwrap_or(false)
    }
}

impl PartialOrd<i64> for CurrentSite {
    fn partial_cmp(&self, other: &i64) -> Option<Ordering> {
        self.get().ok().map(|v| v.cmp(other))
    }
}

impl PartialEq for CurrentSite {
    fn eq(&self, other: &Self) -> bool {
        match (self.get(), other.get()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

/// Restores the previous current-site value on drop.
#[must_use = "dropping the guard immediately undoes the override"]
pub struct SiteOverride<'a> {
    context: &'a CurrentSite,
    previous: Option<i64>,
}

impl Drop for SiteOverride<'_> {
    fn drop(&mut self) {
        self.context.current.set(self.previous);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn get_without_default_or_set_is_a_configuration_error() {
        let ctx = CurrentSite::new();
        assert!(matches!(ctx.get(), Err(AliasError::Configuration(_))));
    }

    #[test]
    fn default_applies_until_set_and_after_reset() {
        let ctx = CurrentSite::with_default(Some(1));
        assert_eq!(ctx.get().unwrap(), 1);

        ctx.set(5);
        assert_eq!(ctx.get().unwrap(), 5);

        ctx.reset();
        assert_eq!(ctx.get().unwrap(), 1);
    }

    #[test]
    fn override_restores_previous_value() {
        let ctx = CurrentSite::with_default(Some(1));
        ctx.set(2);
        {
            let _guard = ctx.override_to(3);
            assert_eq!(ctx.get().unwrap(), 3);
            {
                let _nested = ctx.override_to(4);
                assert_eq!(ctx.get().unwrap(), 4);
            }
            assert_eq!(ctx.get().unwrap(), 3);
        }
        assert_eq!(ctx.get().unwrap(), 2);
    }

    #[test]
    fn override_restores_on_unwind() {
        let ctx = CurrentSite::with_default(Some(1));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ctx.override_to(9);
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(ctx.get().unwrap(), 1);
    }

    #[tokio::test]
    async fn task_local_scope_carries_the_context() {
        // Nothing installed on this task yet.
        assert!(matches!(
            current_site_id(),
            Err(AliasError::Configuration(_))
        ));

        let seen = with_current_site(CurrentSite::with_default(Some(7)), async {
            let before = current_site_id().unwrap();
            CURRENT_SITE.with(|ctx| ctx.set(9));
            (before, current_site_id().unwrap())
        })
        .await;
        assert_eq!(seen, (7, 9));

        // The scope ended with the future.
        assert!(current_site_id().is_err());
    }

    #[tokio::test]
    async fn sibling_tasks_see_independent_contexts() {
        let a = tokio::spawn(with_current_site(
            CurrentSite::with_default(Some(1)),
            async { current_site_id().unwrap() },
        ));
        let b = tokio::spawn(with_current_site(
            CurrentSite::with_default(Some(2)),
            async { current_site_id().unwrap() },
        ));
        assert_eq!(a.await.unwrap(), 1);
        assert_eq!(b.await.unwrap(), 2);
    }

    #[test]
    fn integer_comparisons_use_the_resolved_value() {
        let ctx = CurrentSite::with_default(Some(2));
        assert!(ctx == 2);
        assert!(ctx != 3);
        assert!(ctx < 3);
        assert!(ctx > 1);

        // Unresolvable contexts compare unequal rather than panicking.
        let empty = CurrentSite::new();
        assert!(empty != 2);
        assert_eq!(empty.partial_cmp(&2), None);
    }
}
