//! Arena-backed host tree for tests and headless use.

use crate::host::{HostError, HostEvent, HostTree, Listener, ListenerId};
use indexmap::IndexMap;

/// Slot index plus the generation the slot had when the node was created.
/// Ids of destroyed nodes stay invalid after their slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    pub fn index(self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NodeKind {
    Document,
    Element { tag: String },
    Text,
    Placeholder,
}

#[derive(Clone)]
struct MemoryNode {
    kind: NodeKind,
    attributes: IndexMap<String, String>,
    styles: IndexMap<String, String>,
    /// Content of text nodes and the label of placeholders.
    data: String,
    value: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: Vec<(ListenerId, String, Listener)>,
}

impl MemoryNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: IndexMap::new(),
            styles: IndexMap::new(),
            data: String::new(),
            value: String::new(),
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        }
    }
}

struct Slot {
    generation: u32,
    node: Option<MemoryNode>,
}

pub struct MemoryTree {
    slots: Vec<Slot>,
    free: Vec<usize>,
    root: NodeId,
    next_listener: u64,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    pub fn new() -> Self {
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(MemoryNode::new(NodeKind::Document)),
            }],
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            next_listener: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of arena slots, live or free.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    fn node(&self, id: &NodeId) -> Result<&MemoryNode, HostError> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or_else(|| HostError::UnknownNode(format!("#{}", id.index)))
    }

    fn node_mut(&mut self, id: &NodeId) -> Result<&mut MemoryNode, HostError> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or_else(|| HostError::UnknownNode(format!("#{}", id.index)))
    }

    fn push(&mut self, node: MemoryNode) -> NodeId {
        if let Some(index) = self.free.pop()
            && let Some(slot) = self.slots.get_mut(index)
        {
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    /// Frees `root` and its subtree without touching its parent.
    fn release(&mut self, root: NodeId) {
        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            let Some(slot) = self
                .slots
                .get_mut(id.index)
                .filter(|slot| slot.generation == id.generation)
            else {
                continue;
            };
            if let Some(removed) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
                pending.extend(removed.children);
            }
        }
    }

    fn append(&mut self, parent: NodeId, mut node: MemoryNode) -> NodeId {
        node.parent = Some(parent);
        let id = self.push(node);
        if let Ok(parent) = self.node_mut(&parent) {
            parent.children.push(id);
        }
        id
    }

    /// Appends a new element under `parent` and returns it.
    pub fn append_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> NodeId {
        let mut node = MemoryNode::new(NodeKind::Element {
            tag: tag.to_string(),
        });
        node.attributes = attributes
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        self.append(parent, node)
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let mut node = MemoryNode::new(NodeKind::Text);
        node.data = text.to_string();
        self.append(parent, node)
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), HostError> {
        self.node_mut(&node)?
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.node(&node)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    /// Element children only, skipping text nodes and placeholders.
    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .into_iter()
            .filter(|child| self.tag(*child).is_some())
            .collect()
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.node(&node).ok()?.kind {
            NodeKind::Element { tag } => Some(tag),
            _ => None,
        }
    }

    pub fn is_placeholder(&self, node: NodeId) -> bool {
        matches!(
            self.node(&node).map(|node| &node.kind),
            Ok(NodeKind::Placeholder)
        )
    }

    /// Whether `node` is reachable from the document root.
    pub fn is_attached(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == self.root {
                return true;
            }
            current = self.node(&id).ok().and_then(|node| node.parent);
        }
        false
    }

    pub fn get_by_id(&self, id: &str) -> Option<NodeId> {
        self.query_all(&format!("#{id}")).ok()?.into_iter().next()
    }

    pub fn listener_count(&self, node: NodeId, event: &str) -> usize {
        self.node(&node)
            .map(|node| {
                node.listeners
                    .iter()
                    .filter(|(_, name, _)| name == event)
                    .count()
            })
            .unwrap_or_default()
    }

    /// Runs every listener for `event.name` on `node`. Returns how many ran.
    pub fn dispatch(&self, node: NodeId, event: &HostEvent) -> Result<usize, HostError> {
        let listeners: Vec<Listener> = self
            .node(&node)?
            .listeners
            .iter()
            .filter(|(_, name, _)| *name == event.name)
            .map(|(_, _, listener)| listener.clone())
            .collect();
        for listener in &listeners {
            listener(event);
        }
        Ok(listeners.len())
    }

    pub fn click(&self, node: NodeId) -> Result<usize, HostError> {
        self.dispatch(node, &HostEvent::new("click"))
    }

    /// Types `text` into an input: sets its value and fires `input`.
    pub fn input(&mut self, node: NodeId, text: &str) -> Result<usize, HostError> {
        self.node_mut(&node)?.value = text.to_string();
        self.dispatch(node, &HostEvent::with_value("input", text))
    }

    /// Drops `node` and its subtree from the arena. Later access fails and
    /// the slots are reused by new nodes.
    pub fn destroy(&mut self, node: NodeId) -> Result<(), HostError> {
        if node == self.root {
            return Err(HostError::Detached(self.describe(&node)));
        }
        self.detach(node)?;
        self.release(node);
        Ok(())
    }

    fn detach(&mut self, node: NodeId) -> Result<(), HostError> {
        let Some(parent) = self.node(&node)?.parent else {
            return Ok(());
        };
        self.node_mut(&parent)?.children.retain(|child| *child != node);
        self.node_mut(&node)?.parent = None;
        Ok(())
    }

    fn preorder(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Ok(node) = self.node(&id) else {
                continue;
            };
            order.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        order
    }

    fn text_content(&self, node: &MemoryNode) -> String {
        match node.kind {
            NodeKind::Text => node.data.clone(),
            NodeKind::Placeholder => String::new(),
            NodeKind::Document | NodeKind::Element { .. } => node
                .children
                .iter()
                .filter_map(|child| self.node(child).ok())
                .map(|child| self.text_content(child))
                .collect(),
        }
    }

    fn clone_subtree(&mut self, id: NodeId) -> Result<NodeId, HostError> {
        let source = self.node(&id)?;
        let children = source.children.clone();
        let mut copy = source.clone();
        copy.parent = None;
        copy.children = Vec::new();
        copy.listeners = Vec::new();
        let copy = self.push(copy);
        for child in children {
            let child_copy = self.clone_subtree(child)?;
            self.node_mut(&child_copy)?.parent = Some(copy);
            self.node_mut(&copy)?.children.push(child_copy);
        }
        Ok(copy)
    }
}

enum Selector<'a> {
    Attribute(&'a str),
    Id(&'a str),
    Tag(&'a str),
}

fn parse_selector(selector: &str) -> Result<Selector<'_>, HostError> {
    let is_name = |name: &str| {
        !name.is_empty()
            && name
                .chars()
                .all(|character| character.is_ascii_alphanumeric() || matches!(character, '-' | '_'))
    };
    let selector = selector.trim();
    let parsed = if let Some(attribute) = selector
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        Selector::Attribute(attribute)
    } else if let Some(id) = selector.strip_prefix('#') {
        Selector::Id(id)
    } else {
        Selector::Tag(selector)
    };
    let name = match parsed {
        Selector::Attribute(name) | Selector::Id(name) | Selector::Tag(name) => name,
    };
    if is_name(name) {
        Ok(parsed)
    } else {
        Err(HostError::UnsupportedSelector(selector.to_string()))
    }
}

impl HostTree for MemoryTree {
    type Node = NodeId;

    /// Supports `[attribute]`, `#id` and `tag`.
    fn query_all(&self, selector: &str) -> Result<Vec<NodeId>, HostError> {
        let selector = parse_selector(selector)?;
        Ok(self
            .preorder(self.root)
            .into_iter()
            .filter(|id| *id != self.root)
            .filter(|id| {
                let Ok(node) = self.node(id) else {
                    return false;
                };
                match (&selector, &node.kind) {
                    (Selector::Attribute(name), NodeKind::Element { .. }) => {
                        node.attributes.contains_key(*name)
                    }
                    (Selector::Id(id), NodeKind::Element { .. }) => {
                        node.attributes.get("id").is_some_and(|value| value == id)
                    }
                    (Selector::Tag(name), NodeKind::Element { tag }) => tag == name,
                    _ => false,
                }
            })
            .collect())
    }

    fn descendants_with_attribute(
        &self,
        root: &NodeId,
        attribute: &str,
    ) -> Result<Vec<NodeId>, HostError> {
        self.node(root)?;
        Ok(self
            .preorder(*root)
            .into_iter()
            .filter(|id| {
                self.node(id).is_ok_and(|node| {
                    matches!(node.kind, NodeKind::Element { .. })
                        && node.attributes.contains_key(attribute)
                })
            })
            .collect())
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.node(node).ok()?.attributes.get(name).cloned()
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.node(node).ok()?.parent
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let siblings = &self.node(&parent).ok()?.children;
        let position = siblings.iter().position(|child| child == node)?;
        siblings.get(position + 1).copied()
    }

    fn insert_before(
        &mut self,
        parent: &NodeId,
        child: &NodeId,
        reference: Option<&NodeId>,
    ) -> Result<(), HostError> {
        self.node(parent)?;
        self.detach(*child)?;
        let position = match reference {
            Some(reference) => self
                .node(parent)?
                .children
                .iter()
                .position(|candidate| candidate == reference)
                .ok_or_else(|| HostError::NotAChild {
                    parent: self.describe(parent),
                    child: self.describe(reference),
                })?,
            None => self.node(parent)?.children.len(),
        };
        self.node_mut(parent)?.children.insert(position, *child);
        self.node_mut(child)?.parent = Some(*parent);
        Ok(())
    }

    fn remove(&mut self, node: &NodeId) -> Result<(), HostError> {
        self.detach(*node)
    }

    fn discard(&mut self, node: &NodeId) -> Result<(), HostError> {
        self.destroy(*node)
    }

    fn replace(&mut self, old: &NodeId, new: &NodeId) -> Result<(), HostError> {
        let parent = self
            .node(old)?
            .parent
            .ok_or_else(|| HostError::Detached(self.describe(old)))?;
        self.node(new)?;
        self.detach(*new)?;
        let siblings = &mut self.node_mut(&parent)?.children;
        let Some(position) = siblings.iter().position(|child| child == old) else {
            return Err(HostError::Detached(self.describe(old)));
        };
        siblings[position] = *new;
        self.node_mut(new)?.parent = Some(parent);
        self.node_mut(old)?.parent = None;
        Ok(())
    }

    fn create_placeholder(&mut self, label: &str) -> NodeId {
        let mut node = MemoryNode::new(NodeKind::Placeholder);
        node.data = label.to_string();
        self.push(node)
    }

    fn clone_node(&mut self, node: &NodeId) -> Result<NodeId, HostError> {
        self.clone_subtree(*node)
    }

    fn text(&self, node: &NodeId) -> Result<String, HostError> {
        let node = self.node(node)?;
        Ok(self.text_content(node))
    }

    fn set_text(&mut self, node: &NodeId, text: &str) -> Result<(), HostError> {
        let target = self.node_mut(node)?;
        if matches!(target.kind, NodeKind::Text | NodeKind::Placeholder) {
            target.data = text.to_string();
            return Ok(());
        }
        let children = std::mem::take(&mut target.children);
        for child in children {
            let Ok(found) = self.node_mut(&child) else {
                continue;
            };
            if found.kind == NodeKind::Text {
                self.release(child);
            } else {
                found.parent = None;
            }
        }
        if !text.is_empty() {
            self.append_text(*node, text);
        }
        Ok(())
    }

    fn style(&self, node: &NodeId, property: &str) -> Result<String, HostError> {
        Ok(self
            .node(node)?
            .styles
            .get(property)
            .cloned()
            .unwrap_or_default())
    }

    fn set_style(&mut self, node: &NodeId, property: &str, value: &str) -> Result<(), HostError> {
        let styles = &mut self.node_mut(node)?.styles;
        if value.is_empty() {
            styles.shift_remove(property);
        } else {
            styles.insert(property.to_string(), value.to_string());
        }
        Ok(())
    }

    fn value(&self, node: &NodeId) -> Result<String, HostError> {
        Ok(self.node(node)?.value.clone())
    }

    fn set_value(&mut self, node: &NodeId, value: &str) -> Result<(), HostError> {
        self.node_mut(node)?.value = value.to_string();
        Ok(())
    }

    fn add_listener(
        &mut self,
        node: &NodeId,
        event: &str,
        listener: Listener,
    ) -> Result<ListenerId, HostError> {
        let id = ListenerId(self.next_listener);
        self.node_mut(node)?
            .listeners
            .push((id, event.to_string(), listener));
        self.next_listener += 1;
        Ok(id)
    }

    fn remove_listener(&mut self, node: &NodeId, id: ListenerId) -> Result<(), HostError> {
        let listeners = &mut self.node_mut(node)?.listeners;
        let position = listeners
            .iter()
            .position(|(candidate, _, _)| *candidate == id)
            .ok_or(HostError::UnknownListener(id))?;
        listeners.remove(position);
        Ok(())
    }

    fn describe(&self, node: &NodeId) -> String {
        let Ok(found) = self.node(node) else {
            return format!("<destroyed #{}>", node.index);
        };
        match &found.kind {
            NodeKind::Document => "#document".to_string(),
            NodeKind::Text => format!("#text {:?}", found.data),
            NodeKind::Placeholder => format!("<!-- {} -->", found.data),
            NodeKind::Element { tag } => {
                let attributes: String = found
                    .attributes
                    .iter()
                    .map(|(name, value)| format!(" {name}=\"{value}\""))
                    .collect();
                format!("<{tag}{attributes}>")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn list() -> (MemoryTree, NodeId, NodeId, NodeId) {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let list = tree.append_element(root, "ul", &[("id", "list"), ("vx-zone", "")]);
        let first = tree.append_element(list, "li", &[("vx-bind", "a")]);
        let second = tree.append_element(list, "li", &[]);
        (tree, list, first, second)
    }

    #[test]
    fn test_selectors() {
        let (tree, list, first, second) = list();
        assert_eq!(tree.query_all("[vx-zone]"), Ok(vec![list]));
        assert_eq!(tree.query_all("#list"), Ok(vec![list]));
        assert_eq!(tree.query_all("li"), Ok(vec![first, second]));
        assert!(tree.query_all("ul > li").is_err());
        assert_eq!(tree.descendants_with_attribute(&list, "vx-bind"), Ok(vec![first]));
        assert_eq!(tree.descendants_with_attribute(&first, "vx-bind"), Ok(vec![first]));
    }

    #[test]
    fn test_replace_and_insert() {
        let (mut tree, list, first, second) = list();
        let placeholder = tree.create_placeholder("slot");
        tree.replace(&first, &placeholder).unwrap();
        assert_eq!(tree.children(list), vec![placeholder, second]);
        assert!(!tree.is_attached(first));

        tree.insert_after(&placeholder, &first).unwrap();
        assert_eq!(tree.children(list), vec![placeholder, first, second]);
        assert_eq!(tree.next_sibling(&first), Some(second));
        let detached = tree.create_placeholder("x");
        assert!(matches!(
            tree.replace(&detached, &first),
            Err(HostError::Detached(_))
        ));
    }

    #[test]
    fn test_text_and_clone() {
        let (mut tree, list, first, _) = list();
        tree.set_text(&first, "one").unwrap();
        assert_eq!(tree.text(&list), Ok("one".to_string()));
        tree.add_listener(&first, "click", Rc::new(|_| {})).unwrap();

        let copy = tree.clone_node(&first).unwrap();
        assert_eq!(tree.text(&copy), Ok("one".to_string()));
        assert_eq!(tree.parent(&copy), None);
        assert_eq!(tree.listener_count(copy, "click"), 0);
        assert_eq!(tree.attribute(&copy, "vx-bind"), Some("a".to_string()));

        tree.set_text(&first, "").unwrap();
        assert!(tree.children(first).is_empty());
    }

    #[test]
    fn test_listeners_and_destroy() {
        let (mut tree, _, first, _) = list();
        let clicks = Rc::new(Cell::new(0));
        let counter = clicks.clone();
        let id = tree
            .add_listener(&first, "click", Rc::new(move |_| counter.set(counter.get() + 1)))
            .unwrap();
        assert_eq!(tree.click(first), Ok(1));
        tree.remove_listener(&first, id).unwrap();
        assert_eq!(tree.click(first), Ok(0));
        assert_eq!(clicks.get(), 1);

        tree.destroy(first).unwrap();
        assert!(matches!(tree.set_text(&first, "x"), Err(HostError::UnknownNode(_))));
        assert_eq!(tree.describe(&first), format!("<destroyed #{}>", first.index()));
    }

    #[test]
    fn test_destroyed_slots_are_reused() {
        let (mut tree, list, first, second) = list();
        tree.set_text(&first, "one").unwrap();
        let one = tree.children(first)[0];
        let slots = tree.slot_count();

        tree.destroy(second).unwrap();
        let reused = tree.append_element(list, "li", &[]);
        assert_eq!(reused.index(), second.index());
        assert_ne!(reused, second);
        assert!(matches!(tree.text(&second), Err(HostError::UnknownNode(_))));
        assert_eq!(tree.text(&reused), Ok(String::new()));

        tree.set_text(&first, "two").unwrap();
        assert!(matches!(tree.text(&one), Err(HostError::UnknownNode(_))));
        assert_eq!(tree.text(&first), Ok("two".to_string()));
        assert_eq!(tree.slot_count(), slots);
        assert_eq!(tree.live_count(), slots);
        assert!(tree.destroy(tree.root()).is_err());
    }
}
