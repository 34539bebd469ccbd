//! The node graph: nodes in draw order plus validated links between their slots.

use crate::error::FlowError;
use crate::node::catalog::NodeCatalog;
use crate::node::FlowNode;
use crate::services::ServiceRegistry;
use crate::types::*;
use eframe::egui::Pos2;
use std::collections::{HashMap, HashSet, VecDeque};

/// Nodes and links of one editor.
#[derive(Default)]
pub struct Graph {
    nodes: HashMap<NodeId, FlowNode>,
    order: Vec<NodeId>,
    links: Vec<Link>,
}

impl Graph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node on top of the draw order.
    pub fn add_node(&mut self, node: FlowNode) -> NodeId {
        let id = node.id;
        self.order.push(id);
        self.nodes.insert(id, node);
        id
    }

    /// Removes a node and its links, calling its removal hook.
    pub fn remove_node(&mut self, id: NodeId) -> Option<FlowNode> {
        let mut node = self.nodes.remove(&id)?;
        node.on_removed();
        self.order.retain(|n| *n != id);
        self.links.retain(|l| l.from != id && l.to != id);
        Some(node)
    }

    /// Node by id.
    pub fn node(&self, id: NodeId) -> Option<&FlowNode> {
        self.nodes.get(&id)
    }

    /// Mutable node by id.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut FlowNode> {
        self.nodes.get_mut(&id)
    }

    /// Node ids bottom to top.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Nodes bottom to top.
    pub fn nodes(&self) -> impl Iterator<Item = &FlowNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Mutable access to every node, in no particular order.
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut FlowNode> {
        self.nodes.values_mut()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All links.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Moves a node to the top of the draw order.
    pub fn bring_to_front(&mut self, id: NodeId) {
        if let Some(index) = self.order.iter().position(|n| *n == id) {
            let id = self.order.remove(index);
            self.order.push(id);
        }
    }

    /// Topmost node containing the world point.
    pub fn node_at(&self, world: Pos2) -> Option<NodeId> {
        self.order
            .iter()
            .rev()
            .find(|id| self.nodes.get(id).is_some_and(|n| n.rect().contains(world)))
            .copied()
    }

    /// Declared type of the output feeding input `slot` of `node`, if connected.
    pub fn upstream_output_type(&self, node: NodeId, slot: usize) -> Option<SlotType> {
        let link = self.links.iter().find(|l| l.to == node && l.to_slot == slot)?;
        let source = self.nodes.get(&link.from)?;
        source.outputs.get(link.from_slot).map(|s| s.slot_type.clone())
    }

    /// Connects an output to an input after validating the types.
    ///
    /// An input accepts a single link; an existing link into it is replaced.
    pub fn connect(&mut self, from: NodeId, from_slot: usize, to: NodeId, to_slot: usize) -> Result<LinkId, FlowError> {
        if from == to {
            return Err(FlowError::IncompatibleTypes {
                input_index: to_slot,
                input_type: "self".to_string(),
                output_type: "self".to_string(),
            });
        }
        let source = self
            .nodes
            .get(&from)
            .ok_or_else(|| FlowError::NodeNotFound(from.to_string()))?;
        let output_type = source
            .outputs
            .get(from_slot)
            .map(|s| s.slot_type.clone())
            .ok_or_else(|| FlowError::MissingSlot {
                node: source.title.clone(),
                index: from_slot,
            })?;
        let target = self
            .nodes
            .get(&to)
            .ok_or_else(|| FlowError::NodeNotFound(to.to_string()))?;
        target.on_connect_input(to_slot, &output_type)?;

        self.links.retain(|l| !(l.to == to && l.to_slot == to_slot));
        let link = Link::new(from, from_slot, to, to_slot);
        let id = link.id;
        self.links.push(link);
        Ok(id)
    }

    /// Removes a link.
    pub fn disconnect(&mut self, link: LinkId) -> bool {
        let before = self.links.len();
        self.links.retain(|l| l.id != link);
        self.links.len() != before
    }

    /// Removes every node and link.
    pub fn clear(&mut self) {
        for node in self.nodes.values_mut() {
            node.on_removed();
        }
        self.nodes.clear();
        self.order.clear();
        self.links.clear();
    }

    /// Snapshot of the whole graph.
    pub fn serialize(&self) -> SerializedGraph {
        SerializedGraph {
            nodes: self.nodes().map(FlowNode::serialize).collect(),
            links: self.links.clone(),
        }
    }

    /// The target node plus everything upstream of it, for running a single node.
    pub fn subgraph_for(&self, target: NodeId) -> SerializedGraph {
        let mut wanted = HashSet::new();
        let mut queue = VecDeque::from([target]);
        while let Some(id) = queue.pop_front() {
            if !self.nodes.contains_key(&id) || !wanted.insert(id) {
                continue;
            }
            for link in self.links.iter().filter(|l| l.to == id) {
                queue.push_back(link.from);
            }
        }
        SerializedGraph {
            nodes: self
                .nodes()
                .filter(|n| wanted.contains(&n.id))
                .map(FlowNode::serialize)
                .collect(),
            links: self
                .links
                .iter()
                .filter(|l| wanted.contains(&l.from) && wanted.contains(&l.to))
                .cloned()
                .collect(),
        }
    }

    /// Rebuilds a graph from a snapshot.
    ///
    /// Nodes of unknown types are skipped with a warning; links that reference a
    /// missing node or fail validation are dropped.
    pub fn from_serialized(data: &SerializedGraph, catalog: &NodeCatalog, services: &ServiceRegistry) -> Self {
        let mut graph = Graph::new();
        for snapshot in &data.nodes {
            match catalog.create(&snapshot.node_type, services) {
                Ok(mut node) => {
                    node.configure(snapshot);
                    graph.add_node(node);
                }
                Err(err) => log::warn!("Skipping node '{}': {err}", snapshot.title),
            }
        }
        for link in &data.links {
            match graph.connect(link.from, link.from_slot, link.to, link.to_slot) {
                Ok(new_id) => {
                    // Keep the saved link id stable across save/load.
                    if let Some(restored) = graph.links.iter_mut().find(|l| l.id == new_id) {
                        restored.id = link.id;
                    }
                }
                Err(err) => log::warn!("Dropping link {}: {err}", link.id),
            }
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup() -> (Graph, NodeCatalog, ServiceRegistry) {
        (Graph::new(), NodeCatalog::builtin(), ServiceRegistry::default())
    }

    #[test]
    fn connect_validates_and_replaces() {
        let (mut graph, catalog, services) = setup();
        let input = graph.add_node(catalog.create("TextInput", &services).unwrap());
        let symbols = graph.add_node(catalog.create("SymbolSource", &services).unwrap());
        let chat = graph.add_node(catalog.create("LLMChat", &services).unwrap());

        assert!(graph.connect(input, 0, chat, 0).is_ok());
        assert!(matches!(
            graph.connect(symbols, 0, chat, 0),
            Err(FlowError::IncompatibleTypes { .. })
        ));
        // Optional `any` context accepts anything.
        assert!(graph.connect(symbols, 0, chat, 1).is_ok());
        let second_input = graph.add_node(catalog.create("TextInput", &services).unwrap());
        graph.connect(second_input, 0, chat, 0).unwrap();
        assert_eq!(graph.links().iter().filter(|l| l.to == chat && l.to_slot == 0).count(), 1);
        assert_eq!(graph.upstream_output_type(chat, 0), Some(SlotType::parse("string")));
    }

    #[test]
    fn removing_a_node_drops_its_links() {
        let (mut graph, catalog, services) = setup();
        let a = graph.add_node(catalog.create("TextInput", &services).unwrap());
        let b = graph.add_node(catalog.create("TextOutput", &services).unwrap());
        graph.connect(a, 0, b, 0).unwrap();
        assert!(graph.remove_node(a).is_some());
        assert!(graph.links().is_empty());
        assert_eq!(graph.order(), &[b]);
    }

    #[test]
    fn subgraph_contains_upstream_only() {
        let (mut graph, catalog, services) = setup();
        let input = graph.add_node(catalog.create("TextInput", &services).unwrap());
        let chat = graph.add_node(catalog.create("LLMChat", &services).unwrap());
        let out = graph.add_node(catalog.create("TextOutput", &services).unwrap());
        let unrelated = graph.add_node(catalog.create("Logging", &services).unwrap());
        graph.connect(input, 0, chat, 0).unwrap();
        graph.connect(chat, 0, out, 0).unwrap();

        let sub = graph.subgraph_for(chat);
        let ids: HashSet<NodeId> = sub.nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids, HashSet::from([input, chat]));
        assert_eq!(sub.links.len(), 1);
        assert!(!ids.contains(&unrelated));
    }

    #[test]
    fn roundtrip_skips_unknown_types() {
        let (mut graph, catalog, services) = setup();
        let a = graph.add_node(catalog.create("TextInput", &services).unwrap());
        let b = graph.add_node(catalog.create("TextOutput", &services).unwrap());
        graph.node_mut(a).unwrap().set_property("value", json!("hello"));
        graph.connect(a, 0, b, 0).unwrap();

        let mut data = graph.serialize();
        data.nodes.push(SerializedNode {
            id: uuid::Uuid::new_v4(),
            node_type: "Removed".into(),
            title: "Old".into(),
            pos: (0.0, 0.0),
            size: (10.0, 10.0),
            properties: Default::default(),
        });
        let json = data.to_json().unwrap();
        let restored = Graph::from_serialized(&SerializedGraph::from_json(&json).unwrap(), &catalog, &services);
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.links(), graph.links());
        assert_eq!(restored.node(a).unwrap().properties["value"], json!("hello"));
    }

    #[test]
    fn node_at_prefers_topmost() {
        let (mut graph, catalog, services) = setup();
        let bottom = graph.add_node(catalog.create("TextOutput", &services).unwrap());
        let top = graph.add_node(catalog.create("TextOutput", &services).unwrap());
        assert_eq!(graph.node_at(Pos2::new(10.0, 10.0)), Some(top));
        graph.bring_to_front(bottom);
        assert_eq!(graph.node_at(Pos2::new(10.0, 10.0)), Some(bottom));
        assert_eq!(graph.node_at(Pos2::new(-10.0, -10.0)), None);
    }
}
