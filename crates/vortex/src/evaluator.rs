//! Tree-walking interpreter for binding expressions.
//!
//! Expressions are compiled once (see [`ExpressionCache`]) and evaluated
//! against a [`Scope`]. Evaluation is lenient: missing properties read as the
//! empty string and runtime problems are reported, never propagated to the
//! rendering code.

mod cache;

pub use cache::{CacheKey, ContextMarker, ExpressionCache};

use crate::parser::{
    Arithmetic, ArithmeticOp, CompareOp, ConcatPart, Expr, Literal, LogicalOp, Operand, Path,
    SyntaxError, parse_expression,
};
use crate::store::TrackedObject;
use crate::value::{ObjectRef, Value};
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// A state container was mutably borrowed while the expression read it.
    StateBorrowed { path: String },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EvalError::StateBorrowed { path } => {
                write!(f, "state at '{path}' is being modified and cannot be read")
            }
        }
    }
}

impl std::error::Error for EvalError {}

/// Maps top-level identifiers to values.
pub trait Scope {
    fn lookup(&self, name: &str) -> Result<Option<Value>, EvalError>;
}

impl Scope for ObjectRef {
    fn lookup(&self, name: &str) -> Result<Option<Value>, EvalError> {
        let fields = self.try_borrow().map_err(|_| EvalError::StateBorrowed {
            path: String::new(),
        })?;
        Ok(fields.get(name).cloned())
    }
}

impl Scope for TrackedObject {
    fn lookup(&self, name: &str) -> Result<Option<Value>, EvalError> {
        self.raw().lookup(name)
    }
}

impl Scope for IndexMap<String, Value> {
    fn lookup(&self, name: &str) -> Result<Option<Value>, EvalError> {
        Ok(self.get(name).cloned())
    }
}

/// Overlays a list item on top of a parent scope.
pub struct LoopScope<'a> {
    pub item_name: &'a str,
    pub item: Value,
    pub parent: &'a dyn Scope,
}

impl Scope for LoopScope<'_> {
    fn lookup(&self, name: &str) -> Result<Option<Value>, EvalError> {
        if name == self.item_name {
            return Ok(Some(self.item.clone()));
        }
        self.parent.lookup(name)
    }
}

/// Reads a dotted path. Anything missing along the way is the empty string.
pub fn resolve_path(path: &Path, scope: &dyn Scope) -> Result<Value, EvalError> {
    let Some(mut current) = scope.lookup(path.root())? else {
        return Ok(Value::empty_text());
    };
    for (index, segment) in path.segments.iter().enumerate().skip(1) {
        let borrowed = || EvalError::StateBorrowed {
            path: path.segments[..index].join("."),
        };
        let next = match &current {
            Value::Object(object) => object
                .try_borrow()
                .map_err(|_| borrowed())?
                .get(segment.as_str())
                .cloned()
                .unwrap_or_default(),
            Value::Array(array) if segment == "length" => {
                Value::from(array.try_borrow().map_err(|_| borrowed())?.len() as f64)
            }
            Value::Text(text) if segment == "length" => {
                Value::from(text.encode_utf16().count() as f64)
            }
            _ => Value::Undefined,
        };
        current = next;
        if matches!(current, Value::Undefined) {
            break;
        }
    }
    Ok(match current {
        Value::Undefined => Value::empty_text(),
        value => value,
    })
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Text(text) => Value::text(text.as_str()),
        Literal::Number(number) => Value::Number(*number),
        Literal::Bool(value) => Value::Bool(*value),
    }
}

fn operand_value(operand: &Operand, scope: &dyn Scope) -> Result<Value, EvalError> {
    match operand {
        Operand::Literal(literal) => Ok(literal_value(literal)),
        Operand::Path(path) => resolve_path(path, scope),
    }
}

fn compare(left: &Value, op: CompareOp, right: &Value) -> bool {
    match op {
        CompareOp::StrictEqual => left.strict_equals(right),
        CompareOp::StrictNotEqual => !left.strict_equals(right),
        CompareOp::LooseEqual => left.loose_equals(right),
        CompareOp::LooseNotEqual => !left.loose_equals(right),
        CompareOp::Less => left.compare(right) == Some(Ordering::Less),
        CompareOp::Greater => left.compare(right) == Some(Ordering::Greater),
        CompareOp::LessOrEqual => {
            matches!(left.compare(right), Some(Ordering::Less | Ordering::Equal))
        }
        CompareOp::GreaterOrEqual => {
            matches!(left.compare(right), Some(Ordering::Greater | Ordering::Equal))
        }
    }
}

fn arithmetic(arithmetic: &Arithmetic, scope: &dyn Scope) -> Result<Value, EvalError> {
    let left = resolve_path(&arithmetic.path, scope)?;
    let right = Value::Number(arithmetic.number);
    Ok(match arithmetic.op {
        ArithmeticOp::Add => left.add(&right),
        ArithmeticOp::Subtract => Value::Number(left.to_number() - arithmetic.number),
        ArithmeticOp::Multiply => Value::Number(left.to_number() * arithmetic.number),
        ArithmeticOp::Divide => Value::Number(left.to_number() / arithmetic.number),
    })
}

pub fn eval_expr(expr: &Expr, scope: &dyn Scope) -> Result<Value, EvalError> {
    Ok(match expr {
        Expr::Literal(literal) => literal_value(literal),
        Expr::Path(path) => resolve_path(path, scope)?,
        Expr::Compare { left, op, right } => {
            let left = resolve_path(left, scope)?;
            let right = operand_value(right, scope)?;
            Value::Bool(compare(&left, *op, &right))
        }
        Expr::Arithmetic(operation) => arithmetic(operation, scope)?,
        Expr::Concat(parts) => {
            // Left to right with `+` semantics: numbers add until text shows up.
            let mut total: Option<Value> = None;
            for part in parts {
                let value = match part {
                    ConcatPart::Literal(literal) => literal_value(literal),
                    ConcatPart::Path(path) => resolve_path(path, scope)?,
                    ConcatPart::Arithmetic(operation) => arithmetic(operation, scope)?,
                };
                let value = match value {
                    Value::Undefined | Value::Null => Value::text(""),
                    value => value,
                };
                total = Some(match total {
                    Some(left) => left.add(&value),
                    None => value,
                });
            }
            Value::text(total.map(|total| total.to_text_content()).unwrap_or_default())
        }
        Expr::Logical { left, op, right } => {
            let left = eval_expr(left, scope)?;
            match (op, left.is_truthy()) {
                (LogicalOp::And, true) | (LogicalOp::Or, false) => eval_expr(right, scope)?,
                (LogicalOp::And, false) | (LogicalOp::Or, true) => left,
            }
        }
        Expr::Not(path) => Value::Bool(!resolve_path(path, scope)?.is_truthy()),
        Expr::Ternary {
            condition,
            then,
            otherwise,
        } => {
            if resolve_path(condition, scope)?.is_truthy() {
                literal_value(then)
            } else {
                literal_value(otherwise)
            }
        }
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum Compiled {
    Accepted(Expr),
    Rejected(SyntaxError),
}

/// Expression text together with its parse result.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    source: String,
    compiled: Compiled,
}

impl CompiledExpression {
    pub fn compile(source: &str) -> Self {
        let source = source.trim();
        let compiled = match parse_expression(source) {
            Ok(expr) => Compiled::Accepted(expr),
            Err(error) => Compiled::Rejected(error),
        };
        Self {
            source: source.to_string(),
            compiled,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn compiled(&self) -> &Compiled {
        &self.compiled
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.compiled, Compiled::Accepted(_))
    }

    pub fn error(&self) -> Option<&SyntaxError> {
        match &self.compiled {
            Compiled::Rejected(error) => Some(error),
            Compiled::Accepted(_) => None,
        }
    }

    /// Rejected expressions evaluate to the empty string.
    pub fn try_evaluate(&self, scope: &dyn Scope) -> Result<Value, EvalError> {
        match &self.compiled {
            Compiled::Accepted(expr) => eval_expr(expr, scope),
            Compiled::Rejected(_) => Ok(Value::empty_text()),
        }
    }

    pub fn evaluate(&self, scope: &dyn Scope) -> Value {
        self.try_evaluate(scope).unwrap_or_else(|error| {
            log::error!(target: "vortex", "evaluating '{}' failed: {error}", self.source);
            Value::empty_text()
        })
    }

    /// Dotted state paths the expression reads.
    pub fn dependencies(&self) -> Vec<String> {
        match &self.compiled {
            Compiled::Accepted(expr) => expr.paths().into_iter().map(Path::dotted).collect(),
            Compiled::Rejected(_) => Vec::new(),
        }
    }

    /// Like [`CompiledExpression::dependencies`], without paths rooted at `item`.
    pub fn dependencies_outside(&self, item: &str) -> Vec<String> {
        match &self.compiled {
            Compiled::Accepted(expr) => expr
                .paths()
                .into_iter()
                .filter(|path| path.root() != item)
                .map(Path::dotted)
                .collect(),
            Compiled::Rejected(_) => Vec::new(),
        }
    }
}

/// Whether `text` is inside the accepted expression grammar.
pub fn is_allowed(text: &str) -> bool {
    parse_expression(text.trim()).is_ok()
}

/// One-off compile and evaluate. Rejected or failing expressions yield `''`.
pub fn evaluate(text: &str, scope: &dyn Scope) -> Value {
    let compiled = CompiledExpression::compile(text);
    if let Some(error) = compiled.error() {
        log::warn!(target: "vortex", "rejected expression '{}': {error}", compiled.source());
    }
    compiled.evaluate(scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope(json: serde_json::Value) -> ObjectRef {
        match Value::from(json) {
            Value::Object(object) => object,
            _ => panic!("scope must be an object"),
        }
    }

    #[test]
    fn test_lenient_paths() {
        let state = scope(json!({"user": {"name": "Ada", "tags": ["a", "b"]}, "empty": null}));
        assert_eq!(evaluate("user.name", &state), Value::from("Ada"));
        assert_eq!(evaluate("user.tags.length", &state), Value::from(2));
        assert_eq!(evaluate("user.name.length", &state), Value::from(3));
        assert_eq!(evaluate("user.missing.deep", &state), Value::from(""));
        assert_eq!(evaluate("nobody", &state), Value::from(""));
        assert_eq!(evaluate("empty.field", &state), Value::from(""));
        assert_eq!(evaluate("empty", &state), Value::Null);
    }

    #[test]
    fn test_arithmetic_and_concat() {
        let state = scope(json!({"count": 1, "price": 2.5, "label": "n", "zero": 0}));
        assert_eq!(evaluate("count + 1", &state), Value::from(2));
        assert_eq!(evaluate("label + 1", &state), Value::from("n1"));
        assert_eq!(evaluate("price * 2", &state), Value::from(5));
        assert_eq!(evaluate("count / 0", &state), Value::from(f64::INFINITY));
        assert!(evaluate("label - 1", &state).to_number().is_nan());
        assert_eq!(
            evaluate("'Total: ' + (price * 2) + ' ' + label", &state),
            Value::from("Total: 5 n")
        );
        assert_eq!(evaluate("'zero=' + zero", &state), Value::from("zero=0"));
        assert_eq!(evaluate("'[' + missing + ']'", &state), Value::from("[]"));
    }

    #[test]
    fn test_comparisons_and_logic() {
        let state = scope(json!({"count": 3, "text": "3", "status": "done", "flag": false}));
        assert_eq!(evaluate("count == text", &state), Value::Bool(true));
        assert_eq!(evaluate("count === text", &state), Value::Bool(false));
        assert_eq!(evaluate("count >= 3", &state), Value::Bool(true));
        assert_eq!(evaluate("status !== 'done'", &state), Value::Bool(false));
        assert_eq!(evaluate("flag || 'fallback'", &state), Value::from("fallback"));
        assert_eq!(evaluate("count && status", &state), Value::from("done"));
        assert_eq!(evaluate("!flag", &state), Value::Bool(true));
        assert_eq!(evaluate("flag ? 'yes' : 'no'", &state), Value::from("no"));
    }

    #[test]
    fn test_loop_scope_shadows_state() {
        let state = scope(json!({"item": "outer", "suffix": "!"}));
        let item = Value::from(json!({"name": "inner"}));
        let overlay = LoopScope {
            item_name: "item",
            item,
            parent: &state,
        };
        assert_eq!(evaluate("item.name + suffix", &overlay), Value::from(""));
        assert_eq!(
            evaluate("'<' + item.name + suffix", &overlay),
            Value::from("<inner!")
        );
    }

    #[test]
    fn test_rejected_expressions_are_inert() {
        let state = scope(json!({"count": 1}));
        for source in ["alert(1)", "count = 2", "constructor.constructor('x')()", "a[0]"] {
            assert!(!is_allowed(source), "{source:?}");
            assert_eq!(evaluate(source, &state), Value::from(""));
        }
        assert_eq!(evaluate("count", &state), Value::from(1));
    }

    #[test]
    fn test_borrowed_state_is_an_error() {
        let state = scope(json!({"user": {"name": "a"}}));
        let compiled = CompiledExpression::compile("user.name");
        let Value::Object(user) = evaluate("user", &state) else {
            panic!("user should be an object");
        };
        let _guard = user.borrow_mut();
        assert_eq!(
            compiled.try_evaluate(&state),
            Err(EvalError::StateBorrowed {
                path: "user".to_string()
            })
        );
        assert_eq!(compiled.evaluate(&state), Value::from(""));
    }

    #[test]
    fn test_dependencies() {
        let compiled = CompiledExpression::compile("'x' + item.name + total + item.name");
        assert_eq!(compiled.dependencies(), vec!["item.name", "total"]);
        assert_eq!(compiled.dependencies_outside("item"), vec!["total"]);
        assert!(CompiledExpression::compile("a(").dependencies().is_empty());
    }
}
