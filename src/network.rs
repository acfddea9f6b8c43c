use std::collections::HashMap;
use std::error::Error;
use std::path::Path;

use super::config_utils::parse_flag;
use super::demand_cell::DemandCell;


/// What the demand reader needs from the network it loads demand into.
pub trait DemandNetwork {
    /// Returns the internal index of the real node `node_id`.  If `loading_node_only` is set,
    /// nodes where freight can't be loaded or unloaded don't resolve.
    fn resolve(&self, node_id: i32, loading_node_only: bool) -> Option<usize>;

    fn is_in_highlighted_area(&self, node_idx: usize) -> bool;

    /// Attaches a demand to the outgoing demand list of the node at `node_idx`.
    fn add_demand(&mut self, node_idx: usize, cell: DemandCell);
}

#[derive(PartialEq, Debug, Clone)]
pub struct DemandNode {
    pub id: i32,
    pub is_loading_node: bool,
    pub in_highlighted_area: bool,
    // outgoing demand, by destination node id
    demands: HashMap<i32, Vec<DemandCell>>,
}

impl DemandNode {
    pub fn new(id: i32, is_loading_node: bool, in_highlighted_area: bool) -> DemandNode {
        DemandNode {
            id,
            is_loading_node,
            in_highlighted_area,
            demands: HashMap::new(),
        }
    }

    pub fn demands(&self) -> &HashMap<i32, Vec<DemandCell>> {
        &self.demands
    }

    fn store_demand(&mut self, cell: DemandCell) {
        let cells = self.demands.entry(cell.destination_node_id()).or_insert(vec![]);
        match cells.iter_mut().find(|cc| cc.is_same_demand(&cell)) {
            Some(existing) => existing.add_quantity(cell.quantity()),
            None => cells.push(cell),
        }
    }
}

/// The list of real nodes that can hold demand, indexed in insertion order.
#[derive(Debug, Clone, Default)]
pub struct NodeList {
    nodes: Vec<DemandNode>,
    node_idxs_by_id: HashMap<i32, usize>,
}

// A convenience type for parsing csv data
type Row = HashMap<String, String>;

impl NodeList {
    pub fn new() -> NodeList {
        NodeList::default()
    }

    /// Reads a node table with columns `num`, and optionally `loading` and `highlighted`
    /// (0/1 or true/false, defaulting to loading and not highlighted).
    pub fn from_csv(csvpath: &Path) -> Result<NodeList, Box<dyn Error>> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(csvpath)?;
        let mut node_list = NodeList::new();
        for result in reader.deserialize() {
            let row: Row = result?;
            let id = row.get("num").ok_or("node table has no num column")?.parse()?;
            let is_loading_node = match row.get("loading") {
                Some(val) => parse_flag(val)?,
                None => true,
            };
            let in_highlighted_area = match row.get("highlighted") {
                Some(val) => parse_flag(val)?,
                None => false,
            };
            node_list.add_node(DemandNode::new(id, is_loading_node, in_highlighted_area));
        }
        log::info!("read {} nodes from {}", node_list.len(), csvpath.display());
        Ok(node_list)
    }

    /// Adds a node and returns its index.  Adding a node id twice replaces the first one.
    pub fn add_node(&mut self, node: DemandNode) -> usize {
        if let Some(&idx) = self.node_idxs_by_id.get(&node.id) {
            self.nodes[idx] = node;
            return idx;
        }
        let idx = self.nodes.len();
        self.node_idxs_by_id.insert(node.id, idx);
        self.nodes.push(node);
        idx
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get_node(&self, node_idx: usize) -> Option<&DemandNode> {
        self.nodes.get(node_idx)
    }

    /// All the demand leaving the node at `node_idx`, ordered by destination.
    pub fn demands_from(&self, node_idx: usize) -> Vec<&DemandCell> {
        let node = match self.nodes.get(node_idx) {
            Some(node) => node,
            None => return vec![],
        };
        let mut destinations: Vec<&i32> = node.demands.keys().collect();
        destinations.sort();
        destinations.into_iter().flat_map(|dst| node.demands[dst].iter()).collect()
    }

    /// Every stored demand cell, ordered by origin index then destination.
    pub fn demand_cells(&self) -> Vec<&DemandCell> {
        (0..self.nodes.len()).flat_map(|idx| self.demands_from(idx)).collect()
    }

    pub fn has_demand_for_group(&self, group: u8, class_id: u8) -> bool {
        self.nodes.iter().flat_map(|node| node.demands.values()).flatten()
            .any(|cell| cell.group() == group && cell.class_id() == class_id)
    }

    pub fn clear_demands(&mut self) {
        for node in self.nodes.iter_mut() {
            node.demands.clear();
        }
    }
}

impl DemandNetwork for NodeList {
    fn resolve(&self, node_id: i32, loading_node_only: bool) -> Option<usize> {
        let idx = *self.node_idxs_by_id.get(&node_id)?;
        if loading_node_only && !self.nodes[idx].is_loading_node {
            return None;
        }
        Some(idx)
    }

    fn is_in_highlighted_area(&self, node_idx: usize) -> bool {
        match self.nodes.get(node_idx) {
            Some(node) => node.in_highlighted_area,
            None => false,
        }
    }

    fn add_demand(&mut self, node_idx: usize, cell: DemandCell) {
        match self.nodes.get_mut(node_idx) {
            Some(node) => node.store_demand(cell),
            None => log::warn!("no node at index {}, dropping demand {:?}", node_idx, cell),
        }
    }
}
