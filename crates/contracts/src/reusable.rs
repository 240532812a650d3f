//! Reusable capability - reference-counted lifetime for pooled items
//!
//! Items flowing through a dispatcher are pooled buffers, not owned values:
//! after broadcast fan-out the same instance sits in several consumer queues
//! at once. Lifetime is governed by an explicit reference count; the holder
//! whose decrement drives the count to zero triggers return-to-pool through a
//! release hook. The pool itself lives outside this workspace.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Hook invoked exactly once each time an item's reference count drops to
/// zero. Owned by the pool that created the item.
pub type ReleaseFn = Box<dyn Fn() + Send + Sync>;

/// Reference-counted pooled resource.
///
/// The count changes only through [`add_reference`](Reusable::add_reference)
/// and [`remove_reference`](Reusable::remove_reference); both are atomic, the
/// same instance is legitimately held by multiple consumer queues at once.
/// A holder must not touch the resource after its own `remove_reference`
/// unless it re-acquires a reference first.
pub trait Reusable {
    /// Current reference count.
    fn reference_count(&self) -> usize;

    /// Atomically increments the count, returns the new value. Always
    /// succeeds; callable concurrently from multiple dispatch paths.
    fn add_reference(&self) -> usize;

    /// Atomically decrements the count, returns the new value.
    ///
    /// # Panics
    /// Driving the count below zero is a programmer error and panics; it is
    /// never clamped silently.
    fn remove_reference(&self) -> usize;
}

struct Inner<T> {
    value: T,
    refs: AtomicUsize,
    release: Option<ReleaseFn>,
}

/// Shallow-cloning handle over a pooled value.
///
/// Clones share one count and one release hook. Cloning does *not* bump the
/// logical reference count — dispatch code manages references explicitly, one
/// per fan-out target.
pub struct PooledItem<T> {
    shared: Arc<Inner<T>>,
}

impl<T> PooledItem<T> {
    /// Wrap a value with a zero reference count and no release hook.
    pub fn new(value: T) -> Self {
        Self {
            shared: Arc::new(Inner {
                value,
                refs: AtomicUsize::new(0),
                release: None,
            }),
        }
    }

    /// Wrap a value with a release hook fired on every 1→0 transition.
    pub fn with_release(value: T, release: ReleaseFn) -> Self {
        Self {
            shared: Arc::new(Inner {
                value,
                refs: AtomicUsize::new(0),
                release: Some(release),
            }),
        }
    }

    /// Borrow the pooled value.
    pub fn value(&self) -> &T {
        &self.shared.value
    }
}

impl<T> Clone for PooledItem<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Deref for PooledItem<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.shared.value
    }
}

impl<T: fmt::Debug> fmt::Debug for PooledItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledItem")
            .field("value", &self.shared.value)
            .field("refs", &self.reference_count())
            .finish()
    }
}

impl<T> Reusable for PooledItem<T> {
    fn reference_count(&self) -> usize {
        self.shared.refs.load(Ordering::Acquire)
    }

    fn add_reference(&self) -> usize {
        self.shared.refs.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn remove_reference(&self) -> usize {
        // checked_sub keeps the count from wrapping before the panic fires.
        let prev = self
            .shared
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .unwrap_or_else(|_| panic!("reference count underflow"));

        if prev == 1 {
            // Atomicity of the decrement guarantees exactly one holder
            // observes the 1→0 transition.
            if let Some(release) = &self.shared.release {
                release();
            }
        }
        prev - 1
    }
}
