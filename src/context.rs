// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Bounded synchronous hand-off to the store's owning context.
//!
//! Live store objects — and the store's change-feed registration — are only
//! safe to touch on the execution context that owns the store handle. The
//! places in this crate that need such access model it as an explicit "run on
//! the owning context and block for the result" primitive, never as a general
//! async boundary: the work handed over is small and bounded (a registration,
//! a field read), so callers need neither cancellation nor timeouts.

/// An execution context that owns a store handle.
///
/// Implementations are supplied by the embedder, which knows how its store's
/// threading works: a dispatch queue, a dedicated thread with a channel, an
/// actor mailbox. The one obligation is that `run_sync` executes `f` on the
/// owning context and blocks the caller until `f` has returned.
///
/// For embedders whose store is confined to the current thread there is
/// [`CallerContext`], which runs the closure inline.
pub trait OwningContext {
    /// Executes `f` on the owning context, blocking until it completes, and
    /// returns its result.
    fn run_sync<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send;
}

/// The trivial [`OwningContext`] for single-context embedders: the calling
/// context *is* the owning context, so the closure just runs inline.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallerContext;

impl OwningContext for CallerContext {
    fn run_sync<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_context_runs_inline() {
        let caller = std::thread::current().id();
        let ran_on = CallerContext.run_sync(|| std::thread::current().id());
        assert_eq!(ran_on, caller);
    }
}
