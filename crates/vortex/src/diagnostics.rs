//! Side channel for problems that never stop the engine.
//!
//! Everything recorded here is also logged under the `vortex` target. The
//! buffer keeps the most recent records so hosts can inspect them without a
//! logger installed.

use crate::parser::SyntaxError;
use ariadne::{Config, Label, Report, ReportKind, Source};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Expression text outside the accepted grammar.
    RejectedExpression,
    MalformedFor,
    MalformedModel,
    /// An `on` entry without an `event:code` shape.
    MalformedEvent,
    UnsupportedEventCode,
    EvaluationError,
    BindingUpdateError,
    InvalidState,
}

impl DiagnosticKind {
    fn is_error(self) -> bool {
        matches!(
            self,
            DiagnosticKind::EvaluationError | DiagnosticKind::BindingUpdateError
        )
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            DiagnosticKind::RejectedExpression => "rejected expression",
            DiagnosticKind::MalformedFor => "malformed for",
            DiagnosticKind::MalformedModel => "malformed model",
            DiagnosticKind::MalformedEvent => "malformed event",
            DiagnosticKind::UnsupportedEventCode => "unsupported event code",
            DiagnosticKind::EvaluationError => "evaluation error",
            DiagnosticKind::BindingUpdateError => "binding update error",
            DiagnosticKind::InvalidState => "invalid state",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// The markup text the problem was found in.
    pub source: String,
    pub message: String,
    /// Rendered source report for syntax errors.
    pub report: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            message: message.into(),
            report: None,
        }
    }

    pub fn syntax(kind: DiagnosticKind, source: &str, error: &SyntaxError) -> Self {
        Self {
            kind,
            source: source.to_string(),
            message: error.to_string(),
            report: Some(render_report(source, error)),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {} ('{}')", self.kind, self.message, self.source)
    }
}

/// Renders `error` against `source` as a plain-text ariadne report.
pub fn render_report(source: &str, error: &SyntaxError) -> String {
    let name = "expression";
    let mut report_bytes = Vec::new();
    let written = Report::build(ReportKind::Error, (name, error.span.clone()))
        .with_config(Config::default().with_color(false))
        .with_message(&error.message)
        .with_label(Label::new((name, error.span.clone())).with_message(&error.reason))
        .finish()
        .write((name, Source::from(source)), &mut report_bytes);
    match written {
        Ok(()) => String::from_utf8_lossy(&report_bytes).into_owned(),
        Err(_) => error.to_string(),
    }
}

/// Shared, bounded record of diagnostics. Clones share the same buffer.
#[derive(Clone)]
pub struct Diagnostics {
    records: Rc<RefCell<VecDeque<Diagnostic>>>,
    limit: usize,
}

impl Diagnostics {
    pub fn new(limit: usize) -> Self {
        Self {
            records: Rc::new(RefCell::new(VecDeque::new())),
            limit,
        }
    }

    pub fn record(&self, diagnostic: Diagnostic) {
        if diagnostic.kind.is_error() {
            log::error!(target: "vortex", "{diagnostic}");
        } else {
            log::warn!(target: "vortex", "{diagnostic}");
        }
        if let Some(report) = &diagnostic.report {
            log::debug!(target: "vortex", "\n{report}");
        }
        if self.limit == 0 {
            return;
        }
        let mut records = self.records.borrow_mut();
        while records.len() >= self.limit {
            records.pop_front();
        }
        records.push_back(diagnostic);
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.records.borrow().iter().cloned().collect()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.records
            .borrow()
            .iter()
            .filter(|diagnostic| diagnostic.kind == kind)
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.records.borrow_mut().clear();
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.records.borrow().iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;

    #[test]
    fn test_report_points_at_source() {
        let source = "count + 'x' * 2";
        let Err(error) = parse_expression(source) else {
            panic!("expression should be rejected");
        };
        let report = render_report(source, &error);
        assert!(report.contains("Error"), "{report}");
        assert!(report.contains(source), "{report}");
    }

    #[test]
    fn test_buffer_drops_oldest() {
        let diagnostics = Diagnostics::new(2);
        for source in ["a", "b", "c"] {
            diagnostics.record(Diagnostic::new(
                DiagnosticKind::MalformedEvent,
                source,
                "missing ':'",
            ));
        }
        let sources: Vec<String> = diagnostics
            .entries()
            .into_iter()
            .map(|diagnostic| diagnostic.source)
            .collect();
        assert_eq!(sources, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(diagnostics.count(DiagnosticKind::MalformedEvent), 2);
    }
}
