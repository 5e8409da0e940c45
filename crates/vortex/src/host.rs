//! The document tree the engine renders into.
//!
//! The engine never owns nodes; it holds handles and asks the host to mutate
//! them. [`crate::platform::memory::MemoryTree`] is the in-process
//! implementation.

use std::fmt;
use std::rc::Rc;

/// Event delivered to a listener.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostEvent {
    pub name: String,
    /// Current value of the target for input events.
    pub value: Option<String>,
}

impl HostEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

pub type Listener = Rc<dyn Fn(&HostEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    UnknownNode(String),
    /// The node exists but has no parent to anchor an insert or replace.
    Detached(String),
    NotAChild { parent: String, child: String },
    UnsupportedSelector(String),
    UnknownListener(ListenerId),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HostError::UnknownNode(node) => write!(f, "node {node} does not exist"),
            HostError::Detached(node) => write!(f, "node {node} is not attached to a parent"),
            HostError::NotAChild { parent, child } => {
                write!(f, "node {child} is not a child of {parent}")
            }
            HostError::UnsupportedSelector(selector) => {
                write!(f, "unsupported selector '{selector}'")
            }
            HostError::UnknownListener(id) => write!(f, "listener {} is not attached", id.0),
        }
    }
}

impl std::error::Error for HostError {}

pub trait HostTree {
    type Node: Clone + PartialEq + fmt::Debug;

    fn query_all(&self, selector: &str) -> Result<Vec<Self::Node>, HostError>;

    /// `root` and its descendants carrying `attribute`, in document order.
    fn descendants_with_attribute(
        &self,
        root: &Self::Node,
        attribute: &str,
    ) -> Result<Vec<Self::Node>, HostError>;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Nearest ancestor of `node` (excluding itself) carrying `attribute`.
    fn closest_ancestor_with_attribute(
        &self,
        node: &Self::Node,
        attribute: &str,
    ) -> Option<Self::Node> {
        let mut current = self.parent(node);
        while let Some(candidate) = current {
            if self.attribute(&candidate, attribute).is_some() {
                return Some(candidate);
            }
            current = self.parent(&candidate);
        }
        None
    }

    /// Inserts `child` into `parent` before `reference`, or at the end.
    fn insert_before(
        &mut self,
        parent: &Self::Node,
        child: &Self::Node,
        reference: Option<&Self::Node>,
    ) -> Result<(), HostError>;

    /// Inserts `child` right after `anchor` in the anchor's parent.
    fn insert_after(&mut self, anchor: &Self::Node, child: &Self::Node) -> Result<(), HostError> {
        let parent = self
            .parent(anchor)
            .ok_or_else(|| HostError::Detached(self.describe(anchor)))?;
        let next = self.next_sibling(anchor);
        self.insert_before(&parent, child, next.as_ref())
    }

    fn remove(&mut self, node: &Self::Node) -> Result<(), HostError>;

    /// Removes a node the engine created and will never touch again.
    /// Hosts that own node storage release it here.
    fn discard(&mut self, node: &Self::Node) -> Result<(), HostError> {
        self.remove(node)
    }

    /// Puts `new` where `old` is and detaches `old`.
    fn replace(&mut self, old: &Self::Node, new: &Self::Node) -> Result<(), HostError>;

    fn create_placeholder(&mut self, label: &str) -> Self::Node;

    /// Deep copy without listeners, detached.
    fn clone_node(&mut self, node: &Self::Node) -> Result<Self::Node, HostError>;

    fn text(&self, node: &Self::Node) -> Result<String, HostError>;

    fn set_text(&mut self, node: &Self::Node, text: &str) -> Result<(), HostError>;

    fn style(&self, node: &Self::Node, property: &str) -> Result<String, HostError>;

    fn set_style(&mut self, node: &Self::Node, property: &str, value: &str)
    -> Result<(), HostError>;

    fn value(&self, node: &Self::Node) -> Result<String, HostError>;

    fn set_value(&mut self, node: &Self::Node, value: &str) -> Result<(), HostError>;

    fn add_listener(
        &mut self,
        node: &Self::Node,
        event: &str,
        listener: Listener,
    ) -> Result<ListenerId, HostError>;

    fn remove_listener(&mut self, node: &Self::Node, id: ListenerId) -> Result<(), HostError>;

    /// Short human-readable form, e.g. `<span id="total">`.
    fn describe(&self, node: &Self::Node) -> String;
}
