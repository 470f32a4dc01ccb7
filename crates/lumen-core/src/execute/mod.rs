//! Execution of loaded units.
//!
//! # Architecture
//!
//! ```text
//! ExecutionRequest
//!     │
//!     └── ScriptEngine::execute / submit
//!             │
//!             ├── WorkerHandle::begin → RunTicket (one run in flight)
//!             │
//!             ├── UnitLoader::load_named → ExecutionUnit
//!             │
//!             └── with_context(ExecutionContext)
//!                     │
//!                     ├── namespace + cancel token installed on the thread
//!                     ├── shared state bound into the session scope
//!                     ├── OutputChannel attached
//!                     │
//!                     ├── substrate eval (progress checkpoint, sleep)
//!                     │
//!                     ├── OutputChannel detached
//!                     └── classify → ExecutionOutcome
//! ```
//!
//! # Module Structure
//!
//! - `cancel` - Worker handles, run tickets and cancel tokens
//! - `context` - Scoped thread-bound execution context
//! - `engine` - `ScriptEngine`, requests and submissions

mod cancel;
mod context;
mod engine;

pub(crate) use cancel::FORCED_STOP_TOKEN;
pub use cancel::WorkerHandle;
pub use context::{
    ContextGuard, ExecutionContext, NamespaceScope, current_namespace, current_unit, with_context,
};
pub use engine::{ExecutionRequest, ScriptEngine, Submission};
