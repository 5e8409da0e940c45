use super::directive::{Directive, DirectiveContext, DirectiveKind};
use crate::host::{HostError, HostTree};
use indexmap::IndexSet;
use ulid::Ulid;

/// A rendered markup location and how to keep it current.
pub struct Binding<N> {
    id: Ulid,
    node: N,
    source: String,
    pub(super) directive: Directive<N>,
    /// `None` means "re-run on every flush".
    dependencies: Option<Vec<String>>,
}

impl<N: Clone + PartialEq + std::fmt::Debug> Binding<N> {
    pub(super) fn new(
        node: N,
        source: &str,
        directive: Directive<N>,
        dependencies: Option<Vec<String>>,
    ) -> Self {
        Self {
            id: Ulid::new(),
            node,
            source: source.to_string(),
            directive,
            dependencies,
        }
    }

    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn kind(&self) -> DirectiveKind {
        self.directive.kind()
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    /// The attribute text this binding was created from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn dependencies(&self) -> Option<&[String]> {
        self.dependencies.as_deref()
    }

    /// Nodes currently rendered by a list binding.
    pub fn rendered(&self) -> &[N] {
        match &self.directive {
            Directive::List { rendered, .. } => rendered,
            _ => &[],
        }
    }

    pub fn is_affected_by(&self, pending: &IndexSet<String>) -> bool {
        let Some(dependencies) = &self.dependencies else {
            return true;
        };
        dependencies.iter().any(|dependency| {
            pending
                .iter()
                .any(|changed| paths_overlap(dependency, changed))
        })
    }

    pub(super) fn update<H>(&mut self, context: &mut DirectiveContext<'_, H>) -> Result<(), HostError>
    where
        H: HostTree<Node = N>,
    {
        self.directive.update(&self.node, context)
    }

    pub(super) fn cleanup<H>(self, host: &mut H) -> Result<(), HostError>
    where
        H: HostTree<Node = N>,
    {
        self.directive.cleanup(&self.node, host)
    }
}

/// Whether a change at one path can affect a read of the other: one must be
/// a segment-wise prefix of the other. The root path overlaps everything.
pub fn paths_overlap(left: &str, right: &str) -> bool {
    if left.is_empty() || right.is_empty() {
        return true;
    }
    let mut left = left.split('.');
    let mut right = right.split('.');
    loop {
        match (left.next(), right.next()) {
            (Some(left), Some(right)) if left == right => {}
            (Some(_), Some(_)) => return false,
            _ => return true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_overlap() {
        assert!(paths_overlap("user", "user.name"));
        assert!(paths_overlap("user.name", "user"));
        assert!(paths_overlap("items", "items"));
        assert!(paths_overlap("", "anything.at.all"));
        assert!(!paths_overlap("user", "username"));
        assert!(!paths_overlap("user.name", "user.age"));
        assert!(!paths_overlap("count", "counter"));
    }
}
