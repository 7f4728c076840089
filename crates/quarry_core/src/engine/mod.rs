pub mod session;

use std::sync::Arc;

use quarry_error::Result;

pub use self::session::{CompiledQuery, QueryResult, Session};
use crate::catalog::SourceProvider;
use crate::functions::registry::{
    FunctionRegistry,
    NondeterministicFunctions,
    publish_nondeterministic,
};
use crate::physical::ExecutionConfig;

/// Engine instance: function registry plus source provider.
///
/// The nondeterministic-function set is built once at construction from the
/// registered function sets and atomically published for process-wide
/// readers; it's rebuilt only when an engine is constructed with a different
/// registry. All other compilation state is per-query.
#[derive(Debug)]
pub struct Engine {
    registry: Arc<FunctionRegistry>,
    provider: Arc<dyn SourceProvider>,
    nondeterministic: Arc<NondeterministicFunctions>,
    config: ExecutionConfig,
}

impl Engine {
    /// Engine with the builtin function sets.
    pub fn try_new(provider: impl SourceProvider + 'static) -> Result<Self> {
        Self::with_registry(provider, FunctionRegistry::with_builtins()?)
    }

    /// Engine with an explicitly registered function library.
    pub fn with_registry(
        provider: impl SourceProvider + 'static,
        registry: FunctionRegistry,
    ) -> Result<Self> {
        let nondeterministic = Arc::new(NondeterministicFunctions::scan([&registry]));
        publish_nondeterministic(nondeterministic.clone());
        tracing::debug!(
            volatile_functions = nondeterministic.len(),
            "built nondeterministic function set"
        );

        Ok(Engine {
            registry: Arc::new(registry),
            provider: Arc::new(provider),
            nondeterministic,
            config: ExecutionConfig::default(),
        })
    }

    pub fn with_config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self
    }

    /// Create a new session.
    ///
    /// Sessions share the engine's registry and provider but compile and
    /// execute queries independently; no mutable state crosses queries.
    pub fn session(&self) -> Session {
        Session::new(
            self.registry.clone(),
            self.provider.clone(),
            self.nondeterministic.clone(),
            self.config.clone(),
        )
    }
}
