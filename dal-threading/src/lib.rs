//! Bounded parallel-for, nested-safe `join`, scalable hot-path allocation, and
//! a threading-scope marker read by the profiler's merge logic.
//!
//! Feature-gated on `parallel` exactly like the teacher's
//! `plonky2_maybe_rayon`: with the feature on, `parallel_for` and `join` are
//! backed by `rayon`; with it off, everything runs serially in declaration
//! order so the same call sites work in both configurations.

use std::alloc::{alloc, dealloc, Layout};
use std::cell::Cell;
use std::ptr::NonNull;

thread_local! {
    static IN_THREADING_SCOPE: Cell<bool> = const { Cell::new(false) };
}

/// True while the calling thread is inside a [`mark_threading_scope`] body.
/// The profiler's `scoped_task` reads this to decide whether a task should be
/// merged by max (threading task) or by sum (ordinary task) at teardown.
pub fn in_threading_scope() -> bool {
    IN_THREADING_SCOPE.with(|flag| flag.get())
}

/// Marks `f` as running inside a threading scope for the duration of the
/// call, restoring the previous value on every exit path (including unwind).
pub fn mark_threading_scope<R>(f: impl FnOnce() -> R) -> R {
    let previous = IN_THREADING_SCOPE.with(|flag| flag.replace(true));
    struct Restore(bool);
    impl Drop for Restore {
        fn drop(&mut self) {
            IN_THREADING_SCOPE.with(|flag| flag.set(self.0));
        }
    }
    let _restore = Restore(previous);
    f()
}

/// Named convenience wrapper around [`mark_threading_scope`] matching the
/// spec's `threading_task(name)` scope around a parallel section: `name` is
/// only used by the caller (typically as the paired profiler scope's name),
/// not by the marking itself.
pub fn threading_task<R>(_name: &str, f: impl FnOnce() -> R) -> R {
    mark_threading_scope(f)
}

/// Runs `body(i)` for `i in 0..n`, splitting work across up to the current
/// thread pool's width whenever `n` exceeds `grain`. Composable: calling
/// `parallel_for` from within a `body` (nested parallelism) does not
/// deadlock, since rayon's work-stealing scheduler runs the inner loop to
/// completion on whichever worker reaches it.
pub fn parallel_for<F>(n: usize, grain: usize, body: F)
where
    F: Fn(usize) + Sync,
{
    if n == 0 {
        return;
    }
    #[cfg(feature = "parallel")]
    {
        if n <= grain.max(1) {
            for i in 0..n {
                body(i);
            }
        } else {
            use rayon::prelude::*;
            (0..n).into_par_iter().for_each(|i| body(i));
        }
    }
    #[cfg(not(feature = "parallel"))]
    {
        let _ = grain;
        for i in 0..n {
            body(i);
        }
    }
}

/// Runs two closures, possibly concurrently. Used to fork the reduction of a
/// thread-local accumulator tree without hand-rolling a join.
pub fn join<A, B, RA, RB>(oper_a: A, oper_b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    #[cfg(feature = "parallel")]
    {
        rayon::join(oper_a, oper_b)
    }
    #[cfg(not(feature = "parallel"))]
    {
        (oper_a(), oper_b())
    }
}

/// Returns the width `parallel_for` will actually use for `n` work items,
/// i.e. the number of worker threads available to the current pool.
pub fn current_num_threads() -> usize {
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads()
    }
    #[cfg(not(feature = "parallel"))]
    {
        1
    }
}

/// A hot-path allocation that bypasses whatever global-allocator locking the
/// platform default imposes. This crate ships the direct `std::alloc` seam
/// the teacher's `Matrix<T>` uses internally; swapping in a real concurrent
/// allocator (jemalloc, mimalloc) only requires replacing this module.
///
/// # Safety
/// The returned pointer is valid for `len` elements of `T`, uninitialized.
/// It must be freed with [`scalable_free`] using the same `len`, exactly
/// once.
pub unsafe fn scalable_malloc<T>(len: usize) -> NonNull<T> {
    if len == 0 {
        return NonNull::dangling();
    }
    let layout = Layout::array::<T>(len).expect("layout overflow in scalable_malloc");
    let ptr = alloc(layout);
    match NonNull::new(ptr.cast::<T>()) {
        Some(p) => p,
        None => std::alloc::handle_alloc_error(layout),
    }
}

/// Frees a block obtained from [`scalable_malloc`] with the same `len`.
///
/// # Safety
/// `ptr` must have come from `scalable_malloc::<T>(len)` and not have been
/// freed already.
pub unsafe fn scalable_free<T>(ptr: NonNull<T>, len: usize) {
    if len == 0 {
        return;
    }
    let layout = Layout::array::<T>(len).expect("layout overflow in scalable_free");
    dealloc(ptr.as_ptr().cast(), layout);
}
