//! Reactive template bindings over a host document tree.
//!
//! State lives in a change-tracking store ([`store`]); markup declares
//! bindings with `vx-*` attributes whose values are restricted expressions
//! ([`parser`], [`evaluator`]); the [`engine`] keeps the tree in sync, one
//! batched flush per frame.

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod evaluator;
pub mod host;
pub mod parser;
pub mod platform;
pub mod store;
pub mod value;

pub use config::{ConfigError, EngineConfig};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use engine::{
    Binding, BindingErrorInfo, DirectiveKind, Engine, ErrorHandlerId, FlushReport, MountTarget,
};
pub use evaluator::{
    CompiledExpression, ContextMarker, EvalError, ExpressionCache, LoopScope, Scope, evaluate,
    is_allowed,
};
pub use host::{HostError, HostEvent, HostTree, Listener, ListenerId};
pub use parser::SyntaxError;
pub use platform::memory::{MemoryTree, NodeId};
pub use store::{Read, StoreError, TrackedArray, TrackedObject, wrap};
pub use value::Value;
