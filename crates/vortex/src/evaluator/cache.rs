//! Compiled-expression cache.
//!
//! Binding expressions are static template text, so entries are never
//! invalidated. List templates re-register the same expressions for every
//! clone; the cache turns those into lookups.

use super::CompiledExpression;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Where an expression is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextMarker {
    State,
    /// Inside a list clone, with the loop item in scope.
    Loop,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub text: String,
    pub marker: ContextMarker,
}

#[derive(Debug, Default)]
pub struct ExpressionCache {
    entries: RefCell<FxHashMap<CacheKey, Rc<CompiledExpression>>>,
    hits: Cell<u64>,
    misses: Cell<u64>,
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached compilation of `text`, compiling on first use.
    /// Rejections are reported to `diagnostics` once per key.
    pub fn compile(
        &self,
        text: &str,
        marker: ContextMarker,
        diagnostics: &Diagnostics,
    ) -> Rc<CompiledExpression> {
        let key = CacheKey {
            text: text.trim().to_string(),
            marker,
        };
        if let Some(compiled) = self.entries.borrow().get(&key) {
            self.hits.set(self.hits.get() + 1);
            return compiled.clone();
        }
        self.misses.set(self.misses.get() + 1);
        let compiled = Rc::new(CompiledExpression::compile(&key.text));
        if let Some(error) = compiled.error() {
            diagnostics.record(Diagnostic::syntax(
                DiagnosticKind::RejectedExpression,
                compiled.source(),
                error,
            ));
        }
        log::trace!(target: "vortex", "compiled '{}' for {:?}", key.text, marker);
        self.entries.borrow_mut().insert(key, compiled.clone());
        compiled
    }

    pub fn hits(&self) -> u64 {
        self.hits.get()
    }

    pub fn misses(&self) -> u64 {
        self.misses.get()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hits_and_misses_per_marker() {
        let cache = ExpressionCache::new();
        let diagnostics = Diagnostics::new(16);
        let first = cache.compile("item.name", ContextMarker::Loop, &diagnostics);
        let second = cache.compile(" item.name ", ContextMarker::Loop, &diagnostics);
        assert!(Rc::ptr_eq(&first, &second));
        cache.compile("item.name", ContextMarker::State, &diagnostics);
        assert_eq!((cache.hits(), cache.misses(), cache.len()), (1, 2, 2));
    }

    #[test]
    fn test_rejection_reported_once() {
        let cache = ExpressionCache::new();
        let diagnostics = Diagnostics::new(16);
        for _ in 0..3 {
            let compiled = cache.compile("eval('x')", ContextMarker::State, &diagnostics);
            assert!(!compiled.is_accepted());
        }
        assert_eq!(diagnostics.count(DiagnosticKind::RejectedExpression), 1);
        let report = diagnostics.entries()[0].report.clone().unwrap_or_default();
        assert!(report.contains("eval('x')"), "{report}");
    }
}
