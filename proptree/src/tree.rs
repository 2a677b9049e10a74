//! Arena of control tree nodes, each carrying a property table.
use core::fmt;
use std::{mem, ops::Index, sync::Arc};

use property_table::{PropertyId, PropertyTable, TableState};

use crate::{template::PropertyTemplate, value::Value};

/// Index of a node within a [`Tree`].
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Returns the position of the node within the arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A node of a [`Tree`].
#[derive(Debug)]
pub struct Node {
    tag: Arc<str>,
    parent: Option<NodeId>,
    holder: Option<NodeId>,
    children: Vec<NodeId>,
    properties: PropertyTable<Value>,
}

impl Node {
    /// Returns the tag naming the kind of control.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the parent, or `None` for roots and template nodes.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Returns the node holding this template node in a property, if any.
    pub fn holder(&self) -> Option<NodeId> {
        self.holder
    }

    /// Returns the children in order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Returns the properties of the node.
    pub fn properties(&self) -> &PropertyTable<Value> {
        &self.properties
    }
}

/// Number of property tables in each representation, see [`Tree::table_stats`].
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct TableStats {
    /// Tables without backing storage.
    pub empty: usize,
    /// Tables with 8 slots.
    pub array8: usize,
    /// Tables with 16 slots.
    pub array16: usize,
    /// Tables backed by a map.
    pub map: usize,
    /// Total number of set properties.
    pub properties: usize,
}

impl TableStats {
    /// Returns the number of tables counted.
    pub fn tables(&self) -> usize {
        self.empty + self.array8 + self.array16 + self.map
    }
}

/// An arena of nodes forming a forest of control trees.
///
/// Nodes are either attached to a parent, roots, or templates. A template is a detached node held
/// by exactly one [`Value::Template`] property and is removed or deep-cloned together with the node
/// holding it.
#[derive(Default, Debug)]
pub struct Tree {
    nodes: Vec<Option<Node>>,
    free: Vec<NodeId>,
    len: usize,
}

#[cold]
#[inline(never)]
#[track_caller]
pub(crate) fn missing_node(id: NodeId) -> ! {
    panic!("node {id} does not exist")
}

#[cold]
#[inline(never)]
#[track_caller]
fn already_attached(id: NodeId, parent: NodeId) -> ! {
    panic!("node {id} is already attached to node {parent}")
}

#[cold]
#[inline(never)]
#[track_caller]
fn already_held(id: NodeId, holder: NodeId) -> ! {
    panic!("node {id} is already held as a template by node {holder}")
}

#[cold]
#[inline(never)]
#[track_caller]
fn contains_itself(id: NodeId, within: NodeId) -> ! {
    panic!("node {id} contains node {within} and cannot be placed below it")
}

#[cold]
#[inline(never)]
#[track_caller]
fn held_template(id: NodeId, holder: NodeId) -> ! {
    panic!("node {id} is held as a template by node {holder} and cannot be removed directly")
}

#[cold]
#[inline(never)]
#[track_caller]
fn too_many_nodes() -> ! {
    panic!("a tree cannot hold more than {} nodes", u32::MAX)
}

impl Index<NodeId> for Tree {
    type Output = Node;

    #[track_caller]
    fn index(&self, id: NodeId) -> &Node {
        match self.get(id) {
            Some(node) => node,
            None => missing_node(id),
        }
    }
}

impl Tree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the tree holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns a node, or `None` if it does not exist.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())?.as_ref()
    }

    #[track_caller]
    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        match self.nodes.get_mut(id.index()) {
            Some(Some(node)) => node,
            _ => missing_node(id),
        }
    }

    fn insert(&mut self, node: Node) -> NodeId {
        self.len += 1;
        if let Some(id) = self.free.pop() {
            self.nodes[id.index()] = Some(node);
            return id;
        }
        let Ok(index) = u32::try_from(self.nodes.len()) else {
            too_many_nodes()
        };
        self.nodes.push(Some(node));
        NodeId(index)
    }

    /// Creates a detached node without properties.
    pub fn create_node(&mut self, tag: impl Into<Arc<str>>) -> NodeId {
        self.insert(Node {
            tag: tag.into(),
            parent: None,
            holder: None,
            children: vec![],
            properties: PropertyTable::default(),
        })
    }

    /// Creates a node and appends it to the children of `parent`.
    #[track_caller]
    pub fn add_child(&mut self, parent: NodeId, tag: impl Into<Arc<str>>) -> NodeId {
        let child = self.create_node(tag);
        self.append_child(parent, child);
        child
    }

    /// Panics unless `id` is a root that does not contain `target`.
    #[track_caller]
    fn check_placeable(&self, id: NodeId, target: NodeId) {
        let node = &self[id];
        if let Some(parent) = node.parent {
            already_attached(id, parent);
        }
        if let Some(holder) = node.holder {
            already_held(id, holder);
        }
        let mut current = Some(target);
        while let Some(ancestor) = current {
            if ancestor == id {
                contains_itself(id, target);
            }
            let node = &self[ancestor];
            current = node.parent.or(node.holder);
        }
    }

    /// Appends a root node to the children of `parent`.
    ///
    /// Panics if `child` already has a parent, is held as a template or contains `parent`.
    #[track_caller]
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.check_placeable(child, parent);
        self.node_mut(parent).children.push(child);
        self.node_mut(child).parent = Some(parent);
    }

    /// Removes a node from the children of its parent, leaving it as a root.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node_mut(id).parent.take() else {
            return;
        };
        self.node_mut(parent).children.retain(|&child| child != id);
    }

    /// Enumerates a node and its attached descendants in pre-order.
    ///
    /// Template nodes held in properties are not enumerated.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: vec![id],
        }
    }

    /// Sets a property of a node.
    ///
    /// A template node previously held by the property is removed, unless it is set again. A
    /// newly stored template node must be a root that does not contain `id`. It is held by `id`
    /// from then on.
    #[track_caller]
    pub fn set(&mut self, id: NodeId, property: PropertyId, value: Value) {
        let present = self[id].properties.get(property).and_then(Value::template);
        let added = value.template().filter(|&template| present != Some(template));
        let replaced = present.filter(|&template| value.template() != Some(template));
        if let Some(template) = added {
            self.check_placeable(template, id);
        }
        self.node_mut(id).properties.set(property, value);
        if let Some(template) = added {
            self.node_mut(template).holder = Some(id);
        }
        if let Some(template) = replaced {
            self.free_subtree(template);
        }
    }

    /// Adds a property of a node unless it is already set to a different value.
    ///
    /// Returns `false` when the property is set to a different value. A template node passed in
    /// that case stays owned by the caller, otherwise it is checked and held as for [`Tree::set`].
    #[track_caller]
    pub fn try_add(&mut self, id: NodeId, property: PropertyId, value: Value) -> bool {
        let vacant = !self[id].properties.contains(property);
        let added = value.template().filter(|_| vacant);
        if let Some(template) = added {
            self.check_placeable(template, id);
        }
        let result = self.node_mut(id).properties.try_add(property, value);
        if let Some(template) = added {
            self.node_mut(template).holder = Some(id);
        }
        result
    }

    /// Removes a property of a node, returning `true` if it was set.
    ///
    /// A template node held by the property is removed as well.
    pub fn remove_property(&mut self, id: NodeId, property: PropertyId) -> bool {
        let properties = &mut self.node_mut(id).properties;
        let template = properties.get(property).and_then(Value::template);
        let removed = properties.remove(property);
        if let Some(template) = template {
            self.free_subtree(template);
        }
        removed
    }

    /// Removes all properties of a node, including the template nodes they hold.
    pub fn clear_properties(&mut self, id: NodeId) {
        let mut properties = mem::take(&mut self.node_mut(id).properties);
        let templates: Vec<NodeId> = properties
            .iter()
            .filter_map(|(_, value)| value.template())
            .collect();
        properties.clear();
        for template in templates {
            self.free_subtree(template);
        }
    }

    /// Applies a shared set of properties to a node.
    ///
    /// A node without properties shares the template's backing stores until it is modified.
    pub fn apply_template(&mut self, id: NodeId, template: &PropertyTemplate) {
        let properties = &mut self.node_mut(id).properties;
        let replaced: Vec<NodeId> = template
            .iter()
            .filter_map(|(property, _)| properties.get(property).and_then(Value::template))
            .collect();
        template.apply(properties);
        for node in replaced {
            self.free_subtree(node);
        }
    }

    /// Removes a node with all its descendants and the template nodes they hold.
    ///
    /// Panics if the node is held as a template. Such nodes are removed through the property
    /// holding them.
    #[track_caller]
    pub fn remove_subtree(&mut self, id: NodeId) {
        if let Some(holder) = self[id].holder {
            held_template(id, holder);
        }
        self.detach(id);
        self.free_subtree(id);
    }

    fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get_mut(current.index()).and_then(Option::take) else {
                continue;
            };
            self.len -= 1;
            self.free.push(current);
            stack.extend_from_slice(&node.children);
            stack.extend(node.properties.iter().filter_map(|(_, value)| value.template()));
        }
    }

    /// Duplicates a node with all its descendants, returning the detached copy.
    ///
    /// The copied property tables share their backing stores with the originals until either side
    /// is modified. Template nodes held in properties are deep-cloned, so that each copy owns its
    /// templates.
    #[track_caller]
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let mut properties = mem::take(&mut self.node_mut(id).properties);
        let cloned_properties = properties.clone_shared_with(|value| {
            let template = value.template()?;
            Some(Value::Template(self.clone_subtree(template)))
        });
        self.node_mut(id).properties = properties;

        let tag = self[id].tag.clone();
        let clone = self.insert(Node {
            tag,
            parent: None,
            holder: None,
            children: vec![],
            properties: cloned_properties,
        });
        let templates: Vec<NodeId> = self[clone]
            .properties
            .iter()
            .filter_map(|(_, value)| value.template())
            .collect();
        for template in templates {
            self.node_mut(template).holder = Some(clone);
        }

        let children = self[id].children.clone();
        let cloned_children: Vec<NodeId> = children
            .into_iter()
            .map(|child| {
                let cloned = self.clone_subtree(child);
                self.node_mut(cloned).parent = Some(clone);
                cloned
            })
            .collect();
        self.node_mut(clone).children = cloned_children;

        clone
    }

    /// Counts the property tables of all live nodes by representation.
    pub fn table_stats(&self) -> TableStats {
        let mut stats = TableStats::default();
        for node in self.nodes.iter().flatten() {
            let counter = match node.properties.state() {
                TableState::Empty => &mut stats.empty,
                TableState::Array8 => &mut stats.array8,
                TableState::Array16 => &mut stats.array16,
                TableState::Map => &mut stats.map,
            };
            *counter += 1;
            stats.properties += node.properties.len();
        }
        stats
    }

    /// Validates the structure of the tree and all property tables, panicking on a violation.
    pub fn check(&self) {
        let mut held = vec![false; self.nodes.len()];
        for (index, node) in self.nodes.iter().enumerate() {
            let Some(node) = node else { continue };
            node.properties.check();
            for &child in &node.children {
                assert_eq!(self[child].parent, Some(NodeId(index as u32)));
            }
            if let Some(parent) = node.parent {
                assert!(self[parent].children.contains(&NodeId(index as u32)));
            }
            for template in node.properties.iter().filter_map(|(_, value)| value.template()) {
                assert!(self[template].parent.is_none(), "template {template} is attached");
                assert_eq!(self[template].holder, Some(NodeId(index as u32)));
                let seen = &mut held[template.index()];
                assert!(!*seen, "template {template} is held twice");
                *seen = true;
            }
        }
        for (index, node) in self.nodes.iter().enumerate() {
            if let Some(node) = node {
                assert_eq!(node.holder.is_some(), held[index], "node {index} has a stale holder");
            }
        }
        assert_eq!(self.nodes.iter().flatten().count(), self.len);
    }
}

/// Pre-order iterator over a node and its descendants, see [`Tree::descendants`].
pub struct Descendants<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        self.stack.extend(self.tree[id].children.iter().rev());
        Some(id)
    }
}
