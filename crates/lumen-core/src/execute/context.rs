//! Scoped execution context.
//!
//! An [`ExecutionContext`] is the explicit bundle one run needs: the loading
//! namespace, the output sink, the session binding and the cancel token.
//! Entering it with [`ContextGuard::enter`] installs the thread-bound parts
//! (the substrate's print and progress hooks can only reach them through the
//! thread) and dropping the guard puts back whatever was installed before,
//! on every exit path including panic unwind.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::{Arc, MutexGuard};
use std::time::Duration;

use rhai::Scope;

use crate::load::{NamespaceId, UnitName};
use crate::output::{OutputAttachment, OutputChannel, OutputSink};
use crate::session::{SharedState, compact_scope};

use super::cancel::CancelToken;

/// What is installed on a thread while a unit runs on it.
#[derive(Clone)]
struct ThreadContext {
    namespace: NamespaceId,
    run: Option<ActiveRun>,
}

#[derive(Clone)]
struct ActiveRun {
    unit: UnitName,
    token: CancelToken,
}

thread_local! {
    static CONTEXT: RefCell<Option<ThreadContext>> = const { RefCell::new(None) };
}

/// Loading namespace installed on the calling thread, if any.
pub fn current_namespace() -> Option<NamespaceId> {
    CONTEXT.with(|c| c.borrow().as_ref().map(|ctx| ctx.namespace))
}

/// Unit running on the calling thread, if any.
pub fn current_unit() -> Option<UnitName> {
    CONTEXT.with(|c| {
        c.borrow()
            .as_ref()
            .and_then(|ctx| ctx.run.as_ref().map(|run| run.unit.clone()))
    })
}

/// Whether the run on this thread has been asked to stop.
pub(crate) fn stop_requested() -> bool {
    CONTEXT.with(|c| {
        c.borrow()
            .as_ref()
            .and_then(|ctx| ctx.run.as_ref())
            .is_some_and(|run| run.token.is_stop_requested())
    })
}

/// Sleep on behalf of the running unit, waking early on cancellation.
///
/// Returns `true` if the sleep was interrupted. Outside a run this is a plain sleep.
pub(crate) fn interruptible_sleep(duration: Duration) -> bool {
    let token = CONTEXT.with(|c| {
        c.borrow()
            .as_ref()
            .and_then(|ctx| ctx.run.as_ref().map(|run| run.token.clone()))
    });
    match token {
        Some(token) => token.sleep(duration),
        None => {
            std::thread::sleep(duration);
            false
        }
    }
}

fn swap_context(next: Option<ThreadContext>) -> Option<ThreadContext> {
    CONTEXT.with(|c| std::mem::replace(&mut *c.borrow_mut(), next))
}

/// Installs a bare loading namespace on the calling thread, for hosts that
/// keep one active outside of runs.
pub struct NamespaceScope {
    previous: Option<ThreadContext>,
    _thread_bound: PhantomData<*const ()>,
}

impl NamespaceScope {
    pub fn enter(namespace: NamespaceId) -> Self {
        let previous = swap_context(Some(ThreadContext {
            namespace,
            run: None,
        }));
        Self {
            previous,
            _thread_bound: PhantomData,
        }
    }
}

impl Drop for NamespaceScope {
    fn drop(&mut self) {
        swap_context(self.previous.take());
    }
}

/// Everything a single run needs, prepared before entry.
pub struct ExecutionContext<'a> {
    namespace: NamespaceId,
    unit: UnitName,
    sink: Arc<dyn OutputSink>,
    binding: MutexGuard<'a, Scope<'static>>,
    shared: SharedState,
    shared_var: &'a str,
    token: CancelToken,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) fn new(
        namespace: NamespaceId,
        unit: UnitName,
        sink: Arc<dyn OutputSink>,
        binding: MutexGuard<'a, Scope<'static>>,
        shared: SharedState,
        shared_var: &'a str,
        token: CancelToken,
    ) -> Self {
        Self {
            namespace,
            unit,
            sink,
            binding,
            shared,
            shared_var,
            token,
        }
    }
}

/// An entered [`ExecutionContext`]. Dropping it releases the context.
pub struct ContextGuard<'a> {
    binding: MutexGuard<'a, Scope<'static>>,
    output: OutputAttachment,
    previous: Option<ThreadContext>,
    unit: UnitName,
}

impl<'a> ContextGuard<'a> {
    /// Install the context on the calling thread.
    pub fn enter(context: ExecutionContext<'a>) -> Self {
        let ExecutionContext {
            namespace,
            unit,
            sink,
            mut binding,
            shared,
            shared_var,
            token,
        } = context;

        let previous = swap_context(Some(ThreadContext {
            namespace,
            run: Some(ActiveRun {
                unit: unit.clone(),
                token,
            }),
        }));
        // Replace the slot, not the value behind it: the previous handle is
        // still referenced by the registry.
        match binding.get_mut(shared_var) {
            Some(slot) => *slot = shared.handle(),
            None => {
                binding.push_dynamic(shared_var.to_string(), shared.handle());
            }
        }
        let output = OutputChannel::attach(sink);

        tracing::trace!(unit = %unit, namespace = %namespace, "context entered");
        Self {
            binding,
            output,
            previous,
            unit,
        }
    }

    /// The session's variables, for the run to evaluate against.
    pub fn scope_mut(&mut self) -> &mut Scope<'static> {
        &mut self.binding
    }

    pub fn scope(&self) -> &Scope<'static> {
        &self.binding
    }

    /// Detach the output sink ahead of the guard's release. Idempotent.
    pub fn detach_output(&mut self) {
        self.output.detach();
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.output.detach();
        compact_scope(&mut self.binding);
        swap_context(self.previous.take());
        tracing::trace!(unit = %self.unit, "context released");
    }
}

/// Run `body` inside `context`, releasing it however `body` exits.
pub fn with_context<'a, T>(
    context: ExecutionContext<'a>,
    body: impl FnOnce(&mut ContextGuard<'a>) -> T,
) -> T {
    let mut guard = ContextGuard::enter(context);
    body(&mut guard)
}
