//! Arena-backed node storage.

use crate::node::{Node, NodeId};

pub struct Arena<S, M> {
    nodes: Vec<Node<S, M>>,
}

impl<S, M> Arena<S, M> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn push(&mut self, n: Node<S, M>) -> NodeId {
        let id = self.nodes.len() as u32;
        self.nodes.push(n);
        id
    }

    /// Push `child` and link it under `parent`.
    pub fn push_child(&mut self, parent: NodeId, child: Node<S, M>) -> NodeId {
        let id = self.push(child);
        self.nodes[parent as usize].children.push(id);
        id
    }

    pub fn get(&self, id: NodeId) -> &Node<S, M> {
        &self.nodes[id as usize]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node<S, M> {
        &mut self.nodes[id as usize]
    }
}

impl<S, M> Default for Arena<S, M> {
    fn default() -> Self {
        Self::new()
    }
}
