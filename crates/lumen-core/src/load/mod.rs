//! Unit loading.
//!
//! Turns submitted source text into an [`ExecutionUnit`]: a compiled AST tagged
//! with a name generated by its [`LoadingNamespace`]. Units are registered in
//! the namespace while alive and unregistered when dropped; nothing is cached
//! across submissions.

mod errors;
mod namespace;

use std::sync::Arc;

use rhai::{AST, Engine};

use crate::error::Result;

pub use errors::{CompileError, SourceLocation};
pub use namespace::{LoadingNamespace, NamespaceId, UnitName};

/// Compiles source text into units of one namespace.
#[derive(Clone)]
pub struct UnitLoader {
    engine: Arc<Engine>,
    namespace: Arc<LoadingNamespace>,
}

impl UnitLoader {
    pub fn new(engine: Arc<Engine>, namespace: Arc<LoadingNamespace>) -> Self {
        Self { engine, namespace }
    }

    pub fn namespace(&self) -> &Arc<LoadingNamespace> {
        &self.namespace
    }

    /// Compile `source` under a freshly generated name.
    pub fn load(&self, source: &str) -> Result<ExecutionUnit> {
        let name = self.namespace.next_name();
        self.load_named(source, name)
    }

    /// Compile `source` under an explicit name.
    ///
    /// The name must not belong to a unit that is still loaded. Nothing is
    /// registered when compilation fails.
    pub fn load_named(&self, source: &str, name: UnitName) -> Result<ExecutionUnit> {
        let mut ast = self
            .engine
            .compile(source)
            .map_err(CompileError::from_parse)?;
        ast.set_source(name.as_str());

        self.namespace.register(&name)?;
        tracing::debug!(unit = %name, namespace = %self.namespace.id(), "unit loaded");

        Ok(ExecutionUnit {
            name,
            ast,
            namespace: self.namespace.clone(),
        })
    }
}

/// A compiled, invocable unit. Unregisters itself from its namespace on drop.
pub struct ExecutionUnit {
    name: UnitName,
    ast: AST,
    namespace: Arc<LoadingNamespace>,
}

impl ExecutionUnit {
    pub fn name(&self) -> &UnitName {
        &self.name
    }

    pub fn ast(&self) -> &AST {
        &self.ast
    }

    pub fn namespace_id(&self) -> NamespaceId {
        self.namespace.id()
    }
}

impl std::fmt::Debug for ExecutionUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionUnit")
            .field("name", &self.name)
            .field("namespace", &self.namespace.id())
            .finish()
    }
}

impl Drop for ExecutionUnit {
    fn drop(&mut self) {
        self.namespace.unregister(&self.name);
        tracing::trace!(unit = %self.name, "unit discarded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn loader() -> UnitLoader {
        UnitLoader::new(
            Arc::new(Engine::new()),
            Arc::new(LoadingNamespace::new("unit_")),
        )
    }

    #[test]
    fn test_load_registers_unit() {
        let loader = loader();
        let unit = loader.load("40 + 2").unwrap();
        assert_eq!(unit.name().as_str(), "unit_1");
        assert!(loader.namespace().is_loaded(unit.name()));
        assert_eq!(unit.ast().source(), Some("unit_1"));
    }

    #[test]
    fn test_same_source_twice_gives_independent_units() {
        let loader = loader();
        let first = loader.load("let x = 1; x").unwrap();
        let second = loader.load("let x = 1; x").unwrap();
        assert_ne!(first.name(), second.name());
        assert_eq!(loader.namespace().loaded_count(), 2);
    }

    #[test]
    fn test_drop_unregisters() {
        let loader = loader();
        let unit = loader.load("1").unwrap();
        let name = unit.name().clone();
        drop(unit);
        assert!(!loader.namespace().is_loaded(&name));

        // The counter keeps going even after the slot is freed.
        assert_eq!(loader.load("1").unwrap().name().as_str(), "unit_2");
    }

    #[test]
    fn test_malformed_source_is_compile_error() {
        let loader = loader();
        let err = loader.load("def x = ; x.y.z").unwrap_err();
        match err {
            Error::Compile(compile) => {
                assert!(!compile.message.is_empty());
                assert_eq!(compile.location.map(|l| l.line), Some(1));
            }
            other => panic!("expected compile error, got {other:?}"),
        }
        assert_eq!(loader.namespace().loaded_count(), 0);
    }

    #[test]
    fn test_load_named_collision() {
        let loader = loader();
        let name = UnitName::new("fixed");
        let _unit = loader.load_named("1", name.clone()).unwrap();
        let err = loader.load_named("2", name).unwrap_err();
        assert!(matches!(err, Error::NameCollision(_)));
    }
}
