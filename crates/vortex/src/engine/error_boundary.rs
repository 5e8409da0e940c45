use super::directive::DirectiveKind;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::SystemTime;
use ulid::Ulid;

/// One failed binding update.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingErrorInfo {
    pub binding_id: Ulid,
    pub kind: DirectiveKind,
    pub node: String,
    pub message: String,
    pub timestamp: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorHandlerId(u64);

pub type ErrorHandler = Rc<dyn Fn(&BindingErrorInfo)>;

/// Collects binding failures so one broken binding never stops a flush.
#[derive(Default)]
pub struct ErrorBoundary {
    handlers: RefCell<Vec<(ErrorHandlerId, ErrorHandler)>>,
    next_id: Cell<u64>,
}

impl ErrorBoundary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&self, handler: ErrorHandler) -> ErrorHandlerId {
        let id = ErrorHandlerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers.borrow_mut().push((id, handler));
        id
    }

    pub fn remove_handler(&self, id: ErrorHandlerId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(candidate, _)| *candidate != id);
        handlers.len() != before
    }

    pub fn capture(&self, info: BindingErrorInfo, diagnostics: &Diagnostics) {
        diagnostics.record(Diagnostic::new(
            DiagnosticKind::BindingUpdateError,
            info.node.as_str(),
            format!("{} binding {}: {}", info.kind, info.binding_id, info.message),
        ));
        let handlers: Vec<ErrorHandler> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler(&info);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handlers_receive_and_can_be_removed() {
        let boundary = ErrorBoundary::new();
        let diagnostics = Diagnostics::new(8);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let id = boundary.add_handler(Rc::new(move |info: &BindingErrorInfo| {
            sink.borrow_mut().push(info.kind)
        }));
        let info = BindingErrorInfo {
            binding_id: Ulid::new(),
            kind: DirectiveKind::Show,
            node: "<p>".to_string(),
            message: "gone".to_string(),
            timestamp: SystemTime::now(),
        };
        boundary.capture(info.clone(), &diagnostics);
        assert!(boundary.remove_handler(id));
        assert!(!boundary.remove_handler(id));
        boundary.capture(info, &diagnostics);

        assert_eq!(*seen.borrow(), vec![DirectiveKind::Show]);
        assert_eq!(diagnostics.count(DiagnosticKind::BindingUpdateError), 2);
    }
}
