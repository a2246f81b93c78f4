//! Request-scoped service resolution.
//!
//! Nodes never hold their collaborators directly; each execution resolves
//! what it needs and the instances die with the execution. That is the whole
//! request-scope guarantee: an ingestor carrying a database session can never
//! leak across concurrent executions because every `resolve` call runs the
//! registered factory afresh. Shared collaborators (the scope-rule store, for
//! instance) register a factory that clones an `Arc`.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;

use crate::error::{PipelineError, Result};

type Factory = Box<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>;

#[derive(Default)]
pub struct ServiceResolver {
    factories: HashMap<TypeId, Factory>,
}

impl fmt::Debug for ServiceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceResolver")
            .field("registered", &self.factories.len())
            .finish()
    }
}

impl ServiceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `T`. A later registration for the same type
    /// replaces the earlier one.
    pub fn provide<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.factories
            .insert(TypeId::of::<T>(), Box::new(move || Box::new(factory())));
        self
    }

    /// Produce a fresh `T`. Fails fast when no factory is registered — a
    /// node asking for an unwired service is a configuration error.
    pub fn resolve<T: Send + 'static>(&self) -> Result<T> {
        let factory = self
            .factories
            .get(&TypeId::of::<T>())
            .ok_or_else(|| PipelineError::UnresolvedService(type_name::<T>()))?;
        factory()
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| PipelineError::UnresolvedService(type_name::<T>()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Session {
        id: usize,
    }

    #[test]
    fn each_resolve_runs_the_factory_afresh() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut resolver = ServiceResolver::new();
        let seq = counter.clone();
        resolver.provide(move || Session {
            id: seq.fetch_add(1, Ordering::SeqCst),
        });

        let a = resolver.resolve::<Session>().unwrap();
        let b = resolver.resolve::<Session>().unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn unregistered_type_is_an_error() {
        let resolver = ServiceResolver::new();
        let err = resolver.resolve::<Session>().unwrap_err();
        assert!(matches!(err, PipelineError::UnresolvedService(_)));
    }

    #[test]
    fn shared_collaborators_register_arc_cloning_factories() {
        let shared = Arc::new(AtomicUsize::new(7));
        let mut resolver = ServiceResolver::new();
        let handle = shared.clone();
        resolver.provide(move || handle.clone());

        let resolved = resolver.resolve::<Arc<AtomicUsize>>().unwrap();
        assert_eq!(resolved.load(Ordering::SeqCst), 7);
        assert!(Arc::ptr_eq(&resolved, &shared));
    }
}
