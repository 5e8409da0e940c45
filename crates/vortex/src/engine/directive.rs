//! Per-kind registration, update and cleanup.

use super::binding::Binding;
use crate::config::EngineConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::evaluator::{
    Compiled, CompiledExpression, ContextMarker, ExpressionCache, LoopScope, Scope, resolve_path,
};
use crate::host::{HostError, HostEvent, HostTree, ListenerId};
use crate::parser::{
    EventAction, Expr, Literal, Operand, Path, Step, parse_event_action, parse_for_clause,
};
use crate::store::{Read, TrackedObject};
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Bind,
    Show,
    If,
    For,
    Model,
    On,
}

impl DirectiveKind {
    /// Order in which a zone is scanned.
    pub const SCAN_ORDER: [DirectiveKind; 6] = [
        DirectiveKind::Bind,
        DirectiveKind::Show,
        DirectiveKind::If,
        DirectiveKind::For,
        DirectiveKind::Model,
        DirectiveKind::On,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            DirectiveKind::Bind => "bind",
            DirectiveKind::Show => "show",
            DirectiveKind::If => "if",
            DirectiveKind::For => "for",
            DirectiveKind::Model => "model",
            DirectiveKind::On => "on",
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

pub enum Directive<N> {
    Text {
        expression: Rc<CompiledExpression>,
        last: Option<String>,
    },
    Show {
        expression: Rc<CompiledExpression>,
    },
    Presence {
        expression: Rc<CompiledExpression>,
        placeholder: N,
        present: bool,
    },
    List {
        item: String,
        list: Path,
        original: N,
        template: N,
        placeholder: N,
        rendered: Vec<N>,
    },
    Model {
        expression: Rc<CompiledExpression>,
        listener: ListenerId,
    },
    Events {
        listeners: Vec<ListenerId>,
    },
}

/// What a directive may touch while registering or updating.
pub(crate) struct DirectiveContext<'a, H: HostTree> {
    pub host: &'a mut H,
    pub config: &'a EngineConfig,
    pub state: &'a TrackedObject,
    pub cache: &'a ExpressionCache,
    pub diagnostics: &'a Diagnostics,
}

impl<H: HostTree> DirectiveContext<'_, H> {
    fn compile(&self, text: &str, marker: ContextMarker) -> Rc<CompiledExpression> {
        self.cache.compile(text, marker, self.diagnostics)
    }

    fn evaluate(&self, expression: &CompiledExpression, scope: &dyn Scope) -> Value {
        expression.try_evaluate(scope).unwrap_or_else(|error| {
            self.diagnostics.record(Diagnostic::new(
                DiagnosticKind::EvaluationError,
                expression.source(),
                error.to_string(),
            ));
            Value::empty_text()
        })
    }

    fn dependencies(&self, paths: impl FnOnce() -> Vec<String>) -> Option<Vec<String>> {
        self.config.track_dependencies.then(paths)
    }

    /// Creates the binding for one directive attribute. `Ok(None)` means the
    /// declaration was malformed and has been reported.
    pub fn register(
        &mut self,
        kind: DirectiveKind,
        node: &H::Node,
        text: &str,
    ) -> Result<Option<Binding<H::Node>>, HostError> {
        match kind {
            DirectiveKind::Bind | DirectiveKind::Show => {
                Ok(Some(self.register_expression(kind, node, text)))
            }
            DirectiveKind::If => self.register_presence(node, text),
            DirectiveKind::For => self.register_list(node, text),
            DirectiveKind::Model => self.register_model(node, text),
            DirectiveKind::On => self.register_events(node, text),
        }
    }

    fn register_expression(
        &mut self,
        kind: DirectiveKind,
        node: &H::Node,
        text: &str,
    ) -> Binding<H::Node> {
        let expression = self.compile(text, ContextMarker::State);
        let dependencies = self.dependencies(|| expression.dependencies());
        let directive = match kind {
            DirectiveKind::Show => Directive::Show { expression },
            _ => Directive::Text {
                expression,
                last: None,
            },
        };
        Binding::new(node.clone(), text, directive, dependencies)
    }

    fn register_presence(
        &mut self,
        node: &H::Node,
        text: &str,
    ) -> Result<Option<Binding<H::Node>>, HostError> {
        let expression = self.compile(text, ContextMarker::State);
        let dependencies = self.dependencies(|| expression.dependencies());
        let label = format!("{} placeholder", self.config.attribute(DirectiveKind::If));
        let placeholder = self.host.create_placeholder(&label);
        let present = self.evaluate(&expression, self.state).is_truthy();
        if !present {
            self.host.replace(node, &placeholder)?;
        }
        let directive = Directive::Presence {
            expression,
            placeholder,
            present,
        };
        Ok(Some(Binding::new(node.clone(), text, directive, dependencies)))
    }

    fn register_list(
        &mut self,
        node: &H::Node,
        text: &str,
    ) -> Result<Option<Binding<H::Node>>, HostError> {
        let clause = match parse_for_clause(text.trim()) {
            Ok(clause) => clause,
            Err(error) => {
                self.diagnostics.record(Diagnostic::syntax(
                    DiagnosticKind::MalformedFor,
                    text.trim(),
                    &error,
                ));
                return Ok(None);
            }
        };
        let template = self.host.clone_node(node)?;
        let label = format!(
            "{} {} in {}",
            self.config.attribute(DirectiveKind::For),
            clause.item,
            clause.list
        );
        let placeholder = self.host.create_placeholder(&label);
        self.host.replace(node, &placeholder)?;

        // Compile template expressions now so rejections surface at mount.
        let mut template_paths = Vec::new();
        for kind in [DirectiveKind::Bind, DirectiveKind::Show] {
            let attribute = self.config.attribute(kind);
            for element in self.host.descendants_with_attribute(&template, &attribute)? {
                let Some(source) = self.host.attribute(&element, &attribute) else {
                    continue;
                };
                let expression = self.compile(&source, ContextMarker::Loop);
                template_paths.extend(expression.dependencies_outside(&clause.item));
            }
        }
        let dependencies = self.dependencies(|| {
            let mut dependencies = vec![clause.list.dotted()];
            for path in template_paths {
                if !dependencies.contains(&path) {
                    dependencies.push(path);
                }
            }
            dependencies
        });
        let directive = Directive::List {
            item: clause.item,
            list: clause.list,
            original: node.clone(),
            template,
            placeholder,
            rendered: Vec::new(),
        };
        Ok(Some(Binding::new(node.clone(), text, directive, dependencies)))
    }

    fn register_model(
        &mut self,
        node: &H::Node,
        text: &str,
    ) -> Result<Option<Binding<H::Node>>, HostError> {
        let expression = self.compile(text, ContextMarker::State);
        let path = match expression.compiled() {
            Compiled::Accepted(Expr::Path(path)) => path.dotted(),
            Compiled::Accepted(_) => {
                self.diagnostics.record(Diagnostic::new(
                    DiagnosticKind::MalformedModel,
                    expression.source(),
                    "two-way binding needs a property path",
                ));
                return Ok(None);
            }
            // Already reported by the cache.
            Compiled::Rejected(_) => return Ok(None),
        };

        let state = self.state.clone();
        let diagnostics = self.diagnostics.clone();
        let target = path.clone();
        let listener = self.host.add_listener(
            node,
            "input",
            Rc::new(move |event: &HostEvent| {
                let value = event.value.clone().unwrap_or_default();
                if let Err(error) = state.set_path(&target, Value::text(value)) {
                    diagnostics.record(Diagnostic::new(
                        DiagnosticKind::InvalidState,
                        target.as_str(),
                        error.to_string(),
                    ));
                }
            }),
        )?;
        let dependencies = self.dependencies(|| vec![path]);
        let directive = Directive::Model {
            expression,
            listener,
        };
        Ok(Some(Binding::new(node.clone(), text, directive, dependencies)))
    }

    fn register_events(
        &mut self,
        node: &H::Node,
        text: &str,
    ) -> Result<Option<Binding<H::Node>>, HostError> {
        let mut listeners = Vec::new();
        for entry in text.split(';').map(str::trim).filter(|entry| !entry.is_empty()) {
            let Some((event, code)) = entry
                .split_once(':')
                .map(|(event, code)| (event.trim(), code.trim()))
                .filter(|(event, _)| !event.is_empty())
            else {
                self.diagnostics.record(Diagnostic::new(
                    DiagnosticKind::MalformedEvent,
                    entry,
                    "expected `event: code`",
                ));
                continue;
            };
            let action = match parse_event_action(code) {
                Ok(action) => action,
                Err(error) => {
                    self.diagnostics.record(Diagnostic::syntax(
                        DiagnosticKind::UnsupportedEventCode,
                        code,
                        &error,
                    ));
                    continue;
                }
            };
            let state = self.state.clone();
            let diagnostics = self.diagnostics.clone();
            let id = self.host.add_listener(
                node,
                event,
                Rc::new(move |event: &HostEvent| {
                    run_action(&state, &action, event, &diagnostics)
                }),
            )?;
            listeners.push(id);
        }
        if listeners.is_empty() {
            return Ok(None);
        }
        let dependencies = self.dependencies(Vec::new);
        Ok(Some(Binding::new(
            node.clone(),
            text,
            Directive::Events { listeners },
            dependencies,
        )))
    }

    /// Instantiates `bind` and `show` inside one list clone, the clone root
    /// included.
    fn render_clone(
        &mut self,
        clone: &H::Node,
        item_name: &str,
        item: Value,
    ) -> Result<(), HostError> {
        let scope = LoopScope {
            item_name,
            item,
            parent: self.state,
        };
        for kind in [DirectiveKind::Bind, DirectiveKind::Show] {
            let attribute = self.config.attribute(kind);
            for element in self.host.descendants_with_attribute(clone, &attribute)? {
                let Some(source) = self.host.attribute(&element, &attribute) else {
                    continue;
                };
                let expression = self.compile(&source, ContextMarker::Loop);
                let value = self.evaluate(&expression, &scope);
                match kind {
                    DirectiveKind::Bind => self.host.set_text(&element, &value.to_text_content())?,
                    _ => set_visibility(self.host, &element, value.is_truthy())?,
                }
            }
        }
        Ok(())
    }
}

fn set_visibility<H: HostTree>(
    host: &mut H,
    node: &H::Node,
    visible: bool,
) -> Result<(), HostError> {
    host.set_style(node, "display", if visible { "" } else { "none" })
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Text(text) => Value::text(text.as_str()),
        Literal::Number(number) => Value::Number(*number),
        Literal::Bool(value) => Value::Bool(*value),
    }
}

/// Runs one accepted event statement against state.
pub(crate) fn run_action(
    state: &TrackedObject,
    action: &EventAction,
    event: &HostEvent,
    diagnostics: &Diagnostics,
) {
    let result = match action {
        EventAction::Call(name) => {
            match state.get(name) {
                Read::Value(Value::Function(function)) => function(state, event),
                _ => log::debug!(target: "vortex", "'{name}' is not a function in state"),
            }
            Ok(false)
        }
        EventAction::Step { target, step } => {
            let target = target.dotted();
            state.get_path(&target).and_then(|current| {
                let current = current.into_value().to_number();
                let next = match step {
                    Step::Increment => current + 1.0,
                    Step::Decrement => current - 1.0,
                };
                state.set_path(&target, next)
            })
        }
        EventAction::Assign { target, value } => {
            let value = match value {
                Operand::Literal(literal) => literal_value(literal),
                Operand::Path(path) => match resolve_path(path, state) {
                    Ok(value) => value,
                    Err(error) => {
                        diagnostics.record(Diagnostic::new(
                            DiagnosticKind::EvaluationError,
                            path.dotted(),
                            error.to_string(),
                        ));
                        return;
                    }
                },
            };
            state.set_path(&target.dotted(), value)
        }
    };
    if let Err(error) = result {
        diagnostics.record(Diagnostic::new(
            DiagnosticKind::InvalidState,
            event.name.as_str(),
            error.to_string(),
        ));
    }
}

impl<N: Clone + PartialEq + fmt::Debug> Directive<N> {
    pub fn kind(&self) -> DirectiveKind {
        match self {
            Directive::Text { .. } => DirectiveKind::Bind,
            Directive::Show { .. } => DirectiveKind::Show,
            Directive::Presence { .. } => DirectiveKind::If,
            Directive::List { .. } => DirectiveKind::For,
            Directive::Model { .. } => DirectiveKind::Model,
            Directive::Events { .. } => DirectiveKind::On,
        }
    }

    pub(crate) fn update<H>(
        &mut self,
        node: &N,
        context: &mut DirectiveContext<'_, H>,
    ) -> Result<(), HostError>
    where
        H: HostTree<Node = N>,
    {
        match self {
            Directive::Text { expression, last } => {
                let text = context.evaluate(expression, context.state).to_text_content();
                if last.as_deref() != Some(text.as_str()) {
                    context.host.set_text(node, &text)?;
                    *last = Some(text);
                }
            }
            Directive::Show { expression } => {
                let visible = context.evaluate(expression, context.state).is_truthy();
                set_visibility(context.host, node, visible)?;
            }
            Directive::Presence {
                expression,
                placeholder,
                present,
            } => {
                let visible = context.evaluate(expression, context.state).is_truthy();
                if visible && !*present {
                    context.host.replace(placeholder, node)?;
                    *present = true;
                } else if !visible && *present {
                    context.host.replace(node, placeholder)?;
                    *present = false;
                }
            }
            Directive::List {
                item,
                list,
                template,
                placeholder,
                rendered,
                ..
            } => {
                let items = match resolve_path(list, context.state) {
                    Ok(Value::Array(items)) => items,
                    Ok(other) => {
                        log::debug!(
                            target: "vortex",
                            "'{list}' is {}, not an array; list left as is",
                            other.type_name()
                        );
                        return Ok(());
                    }
                    Err(error) => {
                        context.diagnostics.record(Diagnostic::new(
                            DiagnosticKind::EvaluationError,
                            list.dotted(),
                            error.to_string(),
                        ));
                        return Ok(());
                    }
                };
                let Ok(items) = items.try_borrow().map(|items| items.clone()) else {
                    context.diagnostics.record(Diagnostic::new(
                        DiagnosticKind::EvaluationError,
                        list.dotted(),
                        "list is being modified and cannot be read",
                    ));
                    return Ok(());
                };
                // Drop every previous clone; the first failure is returned
                // once the new items are in place.
                let mut failure = None;
                for clone in std::mem::take(rendered) {
                    if let Err(error) = context.host.discard(&clone) {
                        failure.get_or_insert(error);
                    }
                }
                let mut anchor = placeholder.clone();
                for value in items {
                    let clone = context.host.clone_node(template)?;
                    let inserted = context
                        .render_clone(&clone, item, value)
                        .and_then(|()| context.host.insert_after(&anchor, &clone));
                    if let Err(error) = inserted {
                        let _ = context.host.discard(&clone);
                        return Err(failure.unwrap_or(error));
                    }
                    rendered.push(clone.clone());
                    anchor = clone;
                }
                if let Some(error) = failure {
                    return Err(error);
                }
            }
            Directive::Model { expression, .. } => {
                let text = context.evaluate(expression, context.state).to_text_content();
                if context.host.value(node)? != text {
                    context.host.set_value(node, &text)?;
                }
            }
            Directive::Events { .. } => {}
        }
        Ok(())
    }

    /// Undoes registration: restores swapped-out elements and detaches listeners.
    pub(crate) fn cleanup<H>(self, node: &N, host: &mut H) -> Result<(), HostError>
    where
        H: HostTree<Node = N>,
    {
        match self {
            Directive::Text { .. } | Directive::Show { .. } => Ok(()),
            Directive::Presence {
                placeholder,
                present,
                ..
            } => {
                if present {
                    Ok(())
                } else {
                    host.replace(&placeholder, node)
                }
            }
            Directive::List {
                original,
                placeholder,
                rendered,
                ..
            } => {
                let mut result = Ok(());
                for clone in rendered {
                    if let Err(error) = host.discard(&clone) {
                        result = result.and(Err(error));
                    }
                }
                result.and(host.replace(&placeholder, &original))
            }
            Directive::Model { listener, .. } => host.remove_listener(node, listener),
            Directive::Events { listeners } => {
                let mut result = Ok(());
                for listener in listeners {
                    if let Err(error) = host.remove_listener(node, listener) {
                        result = result.and(Err(error));
                    }
                }
                result
            }
        }
    }
}
