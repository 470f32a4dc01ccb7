//! The script engine: one request in, one outcome out.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rhai::{Dynamic, Engine, EvalAltResult, INT, Position, Scope};

use crate::config::{EngineConfig, Mode};
use crate::error::{Error, Result};
use crate::load::{LoadingNamespace, UnitLoader, UnitName};
use crate::outcome::{DiagnosticRenderer, ExecutionOutcome, TerminalCondition, classify};
use crate::output::{self, OutputSink, Stream};
use crate::session::{InMemoryRegistry, SessionBinding, SessionId, SessionRegistry, SharedState};

use super::cancel::{FORCED_STOP_TOKEN, INTERRUPT_TOKEN, RunTicket, WorkerHandle};
use super::context::{self, ExecutionContext, with_context};

/// One submission from a session.
pub struct ExecutionRequest {
    /// Source text of the unit.
    pub source: String,
    /// Where the unit's output goes.
    pub sink: Arc<dyn OutputSink>,
    /// Session the request belongs to.
    pub session: SessionId,
    /// The session's variables. Borrowed for the run, never copied.
    pub binding: SessionBinding,
}

impl ExecutionRequest {
    pub fn new(
        source: impl Into<String>,
        sink: Arc<dyn OutputSink>,
        session: SessionId,
        binding: SessionBinding,
    ) -> Self {
        Self {
            source: source.into(),
            sink,
            session,
            binding,
        }
    }
}

impl std::fmt::Debug for ExecutionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionRequest")
            .field("session", &self.session)
            .field("source_len", &self.source.len())
            .finish()
    }
}

struct EngineInner {
    config: EngineConfig,
    engine: Arc<Engine>,
    loader: UnitLoader,
    registry: Arc<dyn SessionRegistry>,
}

/// Compiles and runs submitted units.
///
/// Cloning is cheap and shares the loading namespace, so every clone hands
/// out names from the same counter.
#[derive(Clone)]
pub struct ScriptEngine {
    inner: Arc<EngineInner>,
}

impl ScriptEngine {
    /// Create an engine, validating `config` first.
    pub fn new(config: EngineConfig, registry: Arc<dyn SessionRegistry>) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(config, registry))
    }

    /// A local-development engine with an in-memory registry.
    pub fn local() -> Self {
        Self::from_parts(EngineConfig::local_dev(), Arc::new(InMemoryRegistry::new()))
    }

    fn from_parts(config: EngineConfig, registry: Arc<dyn SessionRegistry>) -> Self {
        let engine = Arc::new(build_substrate(&config));
        let namespace = Arc::new(LoadingNamespace::new(config.unit_prefix.clone()));
        let loader = UnitLoader::new(engine.clone(), namespace);
        tracing::debug!(mode = ?config.mode, prefix = %config.unit_prefix, "script engine created");
        Self {
            inner: Arc::new(EngineInner {
                config,
                engine,
                loader,
                registry,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The namespace units are loaded into.
    pub fn namespace(&self) -> &Arc<LoadingNamespace> {
        self.inner.loader.namespace()
    }

    /// Run `request` on the calling thread.
    ///
    /// Never returns an error and never panics past the caller: every failure
    /// is folded into the outcome.
    pub fn execute(&self, request: ExecutionRequest, handle: &WorkerHandle) -> ExecutionOutcome {
        match handle.begin() {
            Ok(ticket) => self.run(request, ticket),
            Err(err) => {
                tracing::warn!(session = %request.session, "execution rejected: {}", err);
                ExecutionOutcome::Error(format!("InternalError: {}", err))
            }
        }
    }

    /// Run `request` on a new worker thread with its own handle.
    pub fn submit(&self, request: ExecutionRequest) -> Result<Submission> {
        self.submit_on(request, &WorkerHandle::new())
    }

    /// Run `request` on a new worker thread, controlled by `handle`.
    ///
    /// The run is marked in flight before this returns, so a cancel issued
    /// right after submitting is never lost.
    pub fn submit_on(&self, request: ExecutionRequest, handle: &WorkerHandle) -> Result<Submission> {
        let ticket = handle.begin()?;
        let engine = self.clone();
        let join = std::thread::Builder::new()
            .name(format!("lumen-worker-{}", request.session))
            .spawn(move || engine.run(request, ticket))?;

        Ok(Submission {
            handle: handle.clone(),
            join,
        })
    }

    fn run(&self, request: ExecutionRequest, ticket: RunTicket) -> ExecutionOutcome {
        let started = Instant::now();
        let ExecutionRequest {
            source,
            sink,
            session,
            binding,
        } = request;

        let name = self.inner.loader.namespace().next_name();
        let renderer = DiagnosticRenderer::new(self.inner.config.pseudo_filename.clone(), name.clone());

        let outcome = match self.run_unit(&source, name.clone(), sink, &session, &binding, &ticket, &renderer) {
            Ok(outcome) => outcome,
            Err(Error::Compile(err)) => {
                tracing::debug!(unit = %name, "compilation failed: {}", err);
                ExecutionOutcome::Error(renderer.render_compile(&err))
            }
            Err(err) => {
                tracing::warn!(unit = %name, session = %session, "engine fault: {}", err);
                ExecutionOutcome::Error(renderer.render_internal(&err.to_string()))
            }
        };

        tracing::debug!(
            unit = %name,
            outcome = outcome.kind(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "execution finished"
        );
        drop(ticket);
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    fn run_unit(
        &self,
        source: &str,
        name: UnitName,
        sink: Arc<dyn OutputSink>,
        session: &SessionId,
        binding: &SessionBinding,
        ticket: &RunTicket,
        renderer: &DiagnosticRenderer,
    ) -> Result<ExecutionOutcome> {
        let unit = self.inner.loader.load_named(source, name)?;
        let shared = self.shared_state(session)?;

        let context = ExecutionContext::new(
            unit.namespace_id(),
            unit.name().clone(),
            sink,
            binding.lock(),
            shared,
            &self.inner.config.shared_state_var,
            ticket.token(),
        );

        tracing::debug!(unit = %unit.name(), session = %session, "running unit");
        let outcome = with_context(context, |guard| {
            let evaluated = panic::catch_unwind(AssertUnwindSafe(|| {
                self.inner
                    .engine
                    .eval_ast_with_scope::<Dynamic>(guard.scope_mut(), unit.ast())
            }));
            guard.detach_output();

            let condition = match evaluated {
                Ok(result) => TerminalCondition::from_result(result),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::warn!(unit = %unit.name(), "substrate panicked: {}", message);
                    TerminalCondition::internal(format!("substrate panicked: {}", message))
                }
            };
            if self.inner.config.is_local_dev() {
                log_run(unit.name(), &condition, guard.scope());
            }
            classify(condition, renderer)
        });
        Ok(outcome)
    }

    fn shared_state(&self, session: &SessionId) -> Result<SharedState> {
        match self.inner.config.mode {
            Mode::LocalDev => Ok(SharedState::new()),
            Mode::Production => self.inner.registry.resolve_binding(session),
        }
    }
}

/// A unit running on its own worker thread.
pub struct Submission {
    handle: WorkerHandle,
    join: JoinHandle<ExecutionOutcome>,
}

impl Submission {
    pub fn handle(&self) -> &WorkerHandle {
        &self.handle
    }

    /// Request cancellation of the run. See [`WorkerHandle::cancel`].
    pub fn cancel(&self) -> bool {
        self.handle.cancel()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Block until the run finishes.
    pub fn wait(self) -> ExecutionOutcome {
        match self.join.join() {
            Ok(outcome) => outcome,
            Err(payload) => ExecutionOutcome::Error(format!(
                "InternalError: worker thread panicked: {}",
                panic_message(payload.as_ref())
            )),
        }
    }
}

/// Build a substrate engine wired to the thread's execution context.
fn build_substrate(config: &EngineConfig) -> Engine {
    let mut engine = Engine::new();
    // The fast path raises arithmetic faults without a position.
    engine.set_fast_operators(false);

    engine.on_print(|text| output::emit(Stream::Stdout, &format!("{}\n", text)));
    engine.on_debug(|text, _source, _pos| output::emit(Stream::Stderr, &format!("{}\n", text)));

    // Runs between every evaluated operation.
    engine.on_progress(|_| context::stop_requested().then(|| FORCED_STOP_TOKEN.into()));

    engine.register_fn("sleep", |ms: INT| -> std::result::Result<(), Box<EvalAltResult>> {
        let duration = Duration::from_millis(u64::try_from(ms).unwrap_or(0));
        if context::interruptible_sleep(duration) {
            return Err(EvalAltResult::ErrorTerminated(INTERRUPT_TOKEN.into(), Position::NONE).into());
        }
        Ok(())
    });

    if let Some(levels) = config.max_call_levels {
        engine.set_max_call_levels(levels);
    }
    engine
}

fn log_run(unit: &UnitName, condition: &TerminalCondition, scope: &Scope<'static>) {
    match condition {
        TerminalCondition::Normal(value) => tracing::info!(unit = %unit, "result: {}", value),
        other => tracing::warn!(unit = %unit, "{}", other),
    }
    for (name, _, value) in scope.iter() {
        tracing::info!(unit = %unit, "binding {} = {}", name, value);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
