//! Interactive session for Lumen CLI.
//!
//! Every line is submitted as its own unit. Variables persist across lines
//! through the session binding; Ctrl-C cancels the line that is running.

use std::sync::Arc;

use lumen_core::{
    ExecutionRequest, ScriptEngine, SessionBinding, SessionId, StdioSink, WorkerHandle,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::colors;
use crate::output::print_outcome;
use crate::run::forward_interrupts;

const PROMPT: &str = "lumen> ";

/// Run the interactive loop until `:quit` or end of input.
///
/// Returns whether the last submission succeeded.
pub async fn execute(engine: ScriptEngine) -> anyhow::Result<bool> {
    let session = SessionId::new();
    let binding = SessionBinding::new();
    let handle = WorkerHandle::new();
    let interrupts = forward_interrupts(handle.clone());

    println!(
        "{}Lumen{} session {} ({} mode). Type :quit to exit.",
        colors::BOLD,
        colors::RESET,
        session,
        if engine.config().is_local_dev() { "local-dev" } else { "production" }
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_ok = true;
    loop {
        print!("{}", PROMPT);
        colors::flush_stdout();

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            ":quit" | ":q" => break,
            ":vars" => {
                println!("{}", binding.names().join(", "));
                continue;
            }
            _ => {}
        }

        let request = ExecutionRequest::new(line, Arc::new(StdioSink), session, binding.clone());
        let engine = engine.clone();
        let worker = handle.clone();
        let outcome = tokio::task::spawn_blocking(move || engine.execute(request, &worker)).await?;
        last_ok = print_outcome(&outcome);
    }

    interrupts.abort();
    Ok(last_ok)
}
