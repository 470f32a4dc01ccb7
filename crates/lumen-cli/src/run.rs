//! Run command implementation for Lumen CLI.
//!
//! Executes one script file and prints its outcome.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use lumen_core::{
    ExecutionRequest, ScriptEngine, SessionBinding, SessionId, StdioSink, WorkerHandle,
};

use crate::colors;
use crate::output::print_outcome;

/// Execute a script file. Returns whether it succeeded.
pub async fn execute(engine: ScriptEngine, script: &Path) -> anyhow::Result<bool> {
    let start = Instant::now();
    let source = std::fs::read_to_string(script)
        .with_context(|| format!("failed to read script {}", script.display()))?;

    let handle = WorkerHandle::new();
    let interrupts = forward_interrupts(handle.clone());

    let request = ExecutionRequest::new(
        source,
        Arc::new(StdioSink),
        SessionId::new(),
        SessionBinding::new(),
    );
    let outcome = tokio::task::spawn_blocking(move || engine.execute(request, &handle)).await?;
    interrupts.abort();

    let ok = print_outcome(&outcome);
    tracing::debug!("{} finished in {:.2}s", script.display(), start.elapsed().as_secs_f64());
    Ok(ok)
}

/// Cancel the run on `handle` on every Ctrl-C.
pub fn forward_interrupts(handle: WorkerHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !handle.cancel() {
                eprintln!(
                    "\n{}Nothing to cancel (use :quit or Ctrl-D to exit){}",
                    colors::DIM,
                    colors::RESET
                );
            }
        }
    })
}
