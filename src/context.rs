//! Request-scoped context.
//!
//! # Responsibilities
//! - Carry cancellation and an optional deadline from the dispatcher into
//!   handlers, condition evaluation and component resolution
//! - Carry the per-call creation state used to detect resolution cycles
//! - Hold typed values attached by callers
//!
//! # Design Decisions
//! - Contexts are immutable; `with_*` derives a child that points at its parent
//! - Values are looked up by type, walking from the child towards the root
//! - Cancellation of a parent cancels every derived child

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Cancellation, deadline and values shared along one call tree.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    parent: Option<Context>,
    token: CancellationToken,
    deadline: Option<Instant>,
    creation: Option<Arc<CreationState>>,
    value: Option<(TypeId, Arc<dyn Any + Send + Sync>)>,
}

impl Context {
    /// The empty root context. Never cancelled unless `cancel` is called on it.
    pub fn background() -> Self {
        Self {
            inner: Arc::new(Inner {
                parent: None,
                token: CancellationToken::new(),
                deadline: None,
                creation: None,
                value: None,
            }),
        }
    }

    fn derive(
        &self,
        deadline: Option<Instant>,
        creation: Option<Arc<CreationState>>,
        value: Option<(TypeId, Arc<dyn Any + Send + Sync>)>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                parent: Some(self.clone()),
                token: self.inner.token.child_token(),
                deadline: earliest(self.inner.deadline, deadline),
                creation,
                value,
            }),
        }
    }

    /// Derive a child that can be cancelled independently of its parent.
    pub fn with_cancel(&self) -> Self {
        self.derive(None, None, None)
    }

    /// Derive a child that reports cancellation once `timeout` has elapsed.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.derive(Some(Instant::now() + timeout), None, None)
    }

    /// Derive a child with an absolute deadline. A parent deadline that is
    /// earlier still wins.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        self.derive(Some(deadline), None, None)
    }

    /// Derive a child carrying `value`, retrievable with [`Context::value`].
    pub fn with_value<T: Any + Send + Sync>(&self, value: T) -> Self {
        self.derive(None, None, Some((TypeId::of::<T>(), Arc::new(value))))
    }

    /// Look up the nearest value of type `T`.
    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        let mut current = Some(self);
        while let Some(ctx) = current {
            if let Some((id, value)) = &ctx.inner.value {
                if *id == TypeId::of::<T>() {
                    return value.downcast_ref::<T>();
                }
            }
            current = ctx.inner.parent.as_ref();
        }
        None
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.inner.token.cancel();
    }

    /// The effective deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// True once cancelled or past the deadline.
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
            || self.inner.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the context is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        match self.inner.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.inner.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline.into()) => {}
                }
            }
            None => self.inner.token.cancelled().await,
        }
    }

    /// The creation state attached to this call tree, if resolution already
    /// started somewhere above.
    pub(crate) fn creation_state(&self) -> Option<&Arc<CreationState>> {
        let mut current = Some(self);
        while let Some(ctx) = current {
            if let Some(state) = &ctx.inner.creation {
                return Some(state);
            }
            current = ctx.inner.parent.as_ref();
        }
        None
    }

    /// Returns a context guaranteed to carry a creation state, together with
    /// that state: `self` when one is already attached, a fresh child otherwise.
    pub(crate) fn ensure_creation_state(&self) -> (Context, Arc<CreationState>) {
        if let Some(state) = self.creation_state() {
            return (self.clone(), state.clone());
        }
        let state = Arc::new(CreationState::default());
        (self.derive(None, Some(state.clone()), None), state)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.inner.deadline)
            .finish_non_exhaustive()
    }
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

static NEXT_CREATION_ID: AtomicU64 = AtomicU64::new(1);

/// Names currently under construction within one resolution call.
#[derive(Debug)]
pub struct CreationState {
    id: u64,
    names: Mutex<Vec<String>>,
}

impl Default for CreationState {
    fn default() -> Self {
        Self {
            id: NEXT_CREATION_ID.fetch_add(1, Ordering::Relaxed),
            names: Mutex::new(Vec::new()),
        }
    }
}

impl CreationState {
    /// Identifies this call tree when it owns or waits on a creation lock.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Mark `name` as in creation. Returns `None` if it already was (a cycle).
    pub fn enter(&self, name: &str) -> Option<CreationGuard<'_>> {
        let mut names = self.names.lock();
        if names.iter().any(|n| n == name) {
            return None;
        }
        names.push(name.to_string());
        Some(CreationGuard {
            state: self,
            name: name.to_string(),
        })
    }

    /// True if `name` is being created in this call tree.
    pub fn contains(&self, name: &str) -> bool {
        self.names.lock().iter().any(|n| n == name)
    }

    /// Snapshot of the names in creation, outermost first.
    pub fn names(&self) -> Vec<String> {
        self.names.lock().clone()
    }
}

/// Removes its name from the creation state on drop.
#[derive(Debug)]
pub struct CreationGuard<'a> {
    state: &'a CreationState,
    name: String,
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        let mut names = self.state.names.lock();
        if let Some(pos) = names.iter().rposition(|n| *n == self.name) {
            names.remove(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_found_through_parents() {
        let root = Context::background().with_value(42u32);
        let child = root.with_value("name").with_cancel();

        assert_eq!(child.value::<u32>(), Some(&42));
        assert_eq!(child.value::<&str>(), Some(&"name"));
        assert!(root.value::<&str>().is_none());
    }

    #[test]
    fn cancelling_parent_cancels_child() {
        let parent = Context::background().with_cancel();
        let child = parent.with_value(1u8);
        assert!(!child.is_cancelled());

        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn expired_deadline_reports_cancelled() {
        let ctx = Context::background().with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn creation_state_detects_reentry() {
        let state = CreationState::default();
        let guard = state.enter("a").unwrap();
        assert!(state.enter("a").is_none());
        assert!(state.contains("a"));

        drop(guard);
        assert!(!state.contains("a"));
        assert!(state.enter("a").is_some());
    }

    #[test]
    fn ensure_creation_state_reuses_existing() {
        let (ctx, state) = Context::background().ensure_creation_state();
        let (_, again) = ctx.ensure_creation_state();
        assert!(Arc::ptr_eq(&state, &again));
        assert!(Arc::ptr_eq(&state, ctx.creation_state().unwrap()));
    }
}
