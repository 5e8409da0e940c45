//! Finds directive attributes inside a zone and registers bindings for them.

use super::binding::Binding;
use super::directive::{DirectiveContext, DirectiveKind};
use crate::config::EngineConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::host::{HostError, HostTree};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Declaration<N> {
    pub kind: DirectiveKind,
    pub node: N,
    pub text: String,
}

/// All declarations in `zone`, grouped by kind in scan order.
///
/// Everything is collected before any registration runs, so an element an
/// `if` detaches still gets its own bindings. Elements inside a list template
/// belong to the template, and the list element itself only to `for`.
pub(crate) fn collect<H: HostTree>(
    host: &H,
    config: &EngineConfig,
    zone: &H::Node,
) -> Result<Vec<Declaration<H::Node>>, HostError> {
    let for_attribute = config.attribute(DirectiveKind::For);
    let mut declarations = Vec::new();
    for kind in DirectiveKind::SCAN_ORDER {
        let attribute = config.attribute(kind);
        for node in host.descendants_with_attribute(zone, &attribute)? {
            if host
                .closest_ancestor_with_attribute(&node, &for_attribute)
                .is_some()
            {
                continue;
            }
            if kind != DirectiveKind::For && host.attribute(&node, &for_attribute).is_some() {
                continue;
            }
            let Some(text) = host.attribute(&node, &attribute) else {
                continue;
            };
            declarations.push(Declaration { kind, node, text });
        }
    }
    Ok(declarations)
}

pub(crate) fn scan_zone<H: HostTree>(
    context: &mut DirectiveContext<'_, H>,
    zone: &H::Node,
) -> Vec<Binding<H::Node>> {
    let declarations = match collect(&*context.host, context.config, zone) {
        Ok(declarations) => declarations,
        Err(error) => {
            context.diagnostics.record(Diagnostic::new(
                DiagnosticKind::BindingUpdateError,
                context.host.describe(zone),
                format!("scanning failed: {error}"),
            ));
            return Vec::new();
        }
    };
    log::debug!(
        target: "vortex",
        "found {} directives in {}",
        declarations.len(),
        context.host.describe(zone)
    );

    let mut bindings = Vec::new();
    for Declaration { kind, node, text } in declarations {
        match context.register(kind, &node, &text) {
            Ok(Some(binding)) => bindings.push(binding),
            Ok(None) => {}
            Err(error) => context.diagnostics.record(Diagnostic::new(
                DiagnosticKind::BindingUpdateError,
                context.host.describe(&node),
                format!("registering {kind} failed: {error}"),
            )),
        }
    }
    bindings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::MemoryTree;

    #[test]
    fn test_template_content_is_skipped() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let zone = tree.append_element(root, "div", &[("vx-zone", ""), ("vx-show", "ready")]);
        let title = tree.append_element(zone, "h1", &[("vx-bind", "title")]);
        let list = tree.append_element(
            zone,
            "ul",
            &[("vx-for", "item in items"), ("vx-bind", "ignored")],
        );
        tree.append_element(list, "li", &[("vx-bind", "item.name")]);
        let input = tree.append_element(zone, "input", &[("vx-model", "query")]);

        let declarations = collect(&tree, &EngineConfig::default(), &zone).unwrap();
        let found: Vec<(DirectiveKind, _)> = declarations
            .iter()
            .map(|declaration| (declaration.kind, declaration.node))
            .collect();
        assert_eq!(
            found,
            vec![
                (DirectiveKind::Bind, title),
                (DirectiveKind::Show, zone),
                (DirectiveKind::For, list),
                (DirectiveKind::Model, input),
            ]
        );
    }
}
