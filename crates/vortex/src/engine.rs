//! The binding runtime: mounts zones, owns bindings and applies flushes.
//!
//! ```
//! use serde_json::json;
//! use vortex::{Engine, HostTree, MemoryTree, MountTarget};
//!
//! let mut tree = MemoryTree::new();
//! let zone = tree.append_element(tree.root(), "div", &[("vx-zone", "")]);
//! let total = tree.append_element(zone, "span", &[("vx-bind", "count + 1")]);
//!
//! let mut engine = Engine::new(tree, json!({ "count": 1 }));
//! engine.mount(MountTarget::Zones);
//! assert_eq!(engine.host().text(&total).unwrap(), "2");
//!
//! engine.set_state(json!({ "count": 2 }));
//! engine.flush();
//! assert_eq!(engine.host().text(&total).unwrap(), "3");
//! ```

mod binding;
mod directive;
mod error_boundary;
mod scan;
mod scheduler;

pub use binding::{Binding, paths_overlap};
pub use directive::{Directive, DirectiveKind};
pub use error_boundary::{BindingErrorInfo, ErrorBoundary, ErrorHandler, ErrorHandlerId};
pub use scheduler::{FlushReport, FrameRequester, Scheduler};

use crate::config::EngineConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::evaluator::ExpressionCache;
use crate::host::HostTree;
use crate::store::{TrackedObject, wrap};
use crate::value::Value;
use directive::DirectiveContext;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::SystemTime;

/// Which part of the host tree to bring under the engine's control.
#[derive(Debug, Clone, PartialEq)]
pub enum MountTarget<N> {
    /// Every element carrying the zone attribute.
    Zones,
    Selector(String),
    Zone(N),
}

pub struct Engine<H: HostTree> {
    host: H,
    config: EngineConfig,
    state: TrackedObject,
    bindings: Vec<Binding<H::Node>>,
    scheduler: Scheduler,
    cache: ExpressionCache,
    diagnostics: Diagnostics,
    errors: ErrorBoundary,
}

impl<H: HostTree> Engine<H> {
    pub fn new(host: H, initial_state: impl Into<Value>) -> Self {
        Self::with_config(host, initial_state, EngineConfig::default())
    }

    /// `initial_state` should be an object; anything else starts from `{}`
    /// and is reported.
    pub fn with_config(host: H, initial_state: impl Into<Value>, config: EngineConfig) -> Self {
        let diagnostics = Diagnostics::new(config.max_diagnostics);
        let root = match initial_state.into() {
            Value::Object(root) => root,
            other => {
                diagnostics.record(Diagnostic::new(
                    DiagnosticKind::InvalidState,
                    other.to_display_string(),
                    format!("initial state must be an object, got {}", other.type_name()),
                ));
                Rc::new(RefCell::new(IndexMap::new()))
            }
        };
        let scheduler = Scheduler::new();
        let state = wrap(root, scheduler.notifier());
        Self {
            host,
            config,
            state,
            bindings: Vec::new(),
            scheduler,
            cache: ExpressionCache::new(),
            diagnostics,
            errors: ErrorBoundary::new(),
        }
    }

    /// Scans the target zones, registers their bindings and renders them once.
    pub fn mount(&mut self, target: MountTarget<H::Node>) -> &mut Self {
        let zones = match target {
            MountTarget::Zones => self.host.query_all(&self.config.zone_selector()),
            MountTarget::Selector(selector) => self.host.query_all(&selector),
            MountTarget::Zone(zone) => Ok(vec![zone]),
        };
        let zones = match zones {
            Ok(zones) => zones,
            Err(error) => {
                self.diagnostics.record(Diagnostic::new(
                    DiagnosticKind::BindingUpdateError,
                    "mount",
                    error.to_string(),
                ));
                return self;
            }
        };
        if zones.is_empty() {
            log::warn!(target: "vortex", "mount found no zones");
        }

        let first_new = self.bindings.len();
        let Engine {
            host,
            config,
            state,
            bindings,
            cache,
            diagnostics,
            errors,
            ..
        } = self;
        let mut context = DirectiveContext {
            host,
            config,
            state,
            cache,
            diagnostics,
        };
        for zone in &zones {
            bindings.extend(scan::scan_zone(&mut context, zone));
        }
        for binding in &mut bindings[first_new..] {
            if let Err(error) = binding.update(&mut context) {
                capture(errors, &*context.host, context.diagnostics, binding, &error);
            }
        }
        log::info!(
            target: "vortex",
            "mounted {} zone(s) with {} binding(s)",
            zones.len(),
            bindings.len() - first_new
        );
        self
    }

    /// Shallow-merges `partial` into state through tracked writes.
    pub fn set_state(&mut self, partial: impl Into<Value>) {
        let partial = partial.into();
        let Value::Object(fields) = &partial else {
            self.diagnostics.record(Diagnostic::new(
                DiagnosticKind::InvalidState,
                partial.to_display_string(),
                format!("state updates must be objects, got {}", partial.type_name()),
            ));
            return;
        };
        let fields: Vec<(String, Value)> = fields
            .borrow()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for (key, value) in fields {
            self.state.set(&key, value);
        }
    }

    /// Re-runs bindings affected by the changes since the last flush.
    pub fn flush(&mut self) -> FlushReport {
        let pending = self.scheduler.take_pending();
        let mut report = FlushReport {
            affected_paths: pending.iter().cloned().collect(),
            ..FlushReport::default()
        };
        if pending.is_empty() {
            return report;
        }

        let Engine {
            host,
            config,
            state,
            bindings,
            cache,
            diagnostics,
            errors,
            ..
        } = self;
        let mut context = DirectiveContext {
            host,
            config,
            state,
            cache,
            diagnostics,
        };
        for binding in bindings.iter_mut() {
            if !binding.is_affected_by(&pending) {
                report.skipped += 1;
                continue;
            }
            match binding.update(&mut context) {
                Ok(()) => report.updated += 1,
                Err(error) => {
                    report.failed += 1;
                    capture(errors, &*context.host, context.diagnostics, binding, &error);
                }
            }
        }
        log::debug!(
            target: "vortex",
            "flushed {:?}: {} updated, {} skipped, {} failed",
            report.affected_paths,
            report.updated,
            report.skipped,
            report.failed
        );
        report
    }

    pub fn is_flush_scheduled(&self) -> bool {
        self.scheduler.is_scheduled()
    }

    /// Called once per scheduling window, on the first change after a flush.
    /// The host is expected to call [`Engine::flush`] before its next paint.
    pub fn set_frame_requester(&mut self, requester: impl Fn() + 'static) {
        self.scheduler.set_frame_requester(Rc::new(requester));
    }

    pub fn on_error(&mut self, handler: impl Fn(&BindingErrorInfo) + 'static) -> ErrorHandlerId {
        self.errors.add_handler(Rc::new(handler))
    }

    pub fn remove_error_handler(&mut self, id: ErrorHandlerId) -> bool {
        self.errors.remove_handler(id)
    }

    /// Undoes every binding and forgets pending changes.
    pub fn unmount(&mut self) {
        let count = self.bindings.len();
        for binding in self.bindings.drain(..) {
            let id = binding.id();
            let kind = binding.kind();
            let node = self.host.describe(binding.node());
            if let Err(error) = binding.cleanup(&mut self.host) {
                self.errors.capture(
                    BindingErrorInfo {
                        binding_id: id,
                        kind,
                        node,
                        message: format!("cleanup failed: {error}"),
                        timestamp: SystemTime::now(),
                    },
                    &self.diagnostics,
                );
            }
        }
        self.scheduler.clear();
        log::info!(target: "vortex", "unmounted {count} binding(s)");
    }

    /// The tracked root. Writes through it schedule a flush.
    pub fn state(&self) -> &TrackedObject {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn bindings(&self) -> &[Binding<H::Node>] {
        &self.bindings
    }

    pub fn expression_cache(&self) -> &ExpressionCache {
        &self.cache
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

fn capture<H: HostTree>(
    errors: &ErrorBoundary,
    host: &H,
    diagnostics: &Diagnostics,
    binding: &Binding<H::Node>,
    error: &crate::host::HostError,
) {
    errors.capture(
        BindingErrorInfo {
            binding_id: binding.id(),
            kind: binding.kind(),
            node: host.describe(binding.node()),
            message: error.to_string(),
            timestamp: SystemTime::now(),
        },
        diagnostics,
    );
}
