use std::fs;

use bincode::{Decode, Encode};
use serde::Serialize;

use crate::colour::WHITE;
use crate::node::{Dims, NodeId, OscillatorNode, Vec3};

/// Process-wide runtime state, owned by the application shell and
/// passed by reference into every update. Nothing in here is global.
#[derive(Clone, Copy, Debug)]
pub struct SimulationState {
    pub paused: bool,
    pub reverse: bool,
    /// Tree-wide speed multiplier applied to every phase advance.
    pub speed: f64,
    /// Absolute position of the tree root.
    pub origin: Vec3,
}

impl Default for SimulationState {
    fn default() -> Self {
        SimulationState { paused: false, reverse: false, speed: 1.0, origin: Vec3::default() }
    }
}

/// Traversal results for one frame. Counters are returned, not kept in
/// shared mutable state.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameStats {
    pub visited: usize,
}

/// Snapshot of tree shape for export.
#[derive(Clone, Debug, Serialize)]
pub struct TreeStats {
    pub fingerprint: String,
    pub oscillators: usize,
    pub min_freq: f64,
    pub max_freq: f64,
    pub frequencies: Vec<f64>,
}

/// The oscillator tree: an arena of nodes addressed by `NodeId`.
///
/// Slots are tombstoned on removal and never reused, so ids held
/// elsewhere (bonds, the shell) can never alias a different node; a
/// stale id just resolves to `None`.
#[derive(Encode, Decode)]
pub struct Tree {
    slots: Vec<Option<OscillatorNode>>,
    root: NodeId,
}

impl Tree {
    /// Create a tree anchored by the degenerate root point.
    pub fn new_bindu() -> Self {
        let bindu =
            OscillatorNode::new("Bindu", Dims::Planar, 0.001, WHITE, [0.0, 0.0], [0.0, 0.0]);
        Tree { slots: vec![Some(bindu)], root: NodeId(0) }
    }

    /// Spherical variant of the root for trees that place children on
    /// sphere surfaces.
    pub fn new_bindu_spherical() -> Self {
        let bindu =
            OscillatorNode::new("Bindu", Dims::Spherical, 0.001, WHITE, [0.0, 0.0], [0.0, 0.0]);
        Tree { slots: vec![Some(bindu)], root: NodeId(0) }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&OscillatorNode> {
        self.slots.get(id.0).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut OscillatorNode> {
        self.slots.get_mut(id.0).and_then(|s| s.as_mut())
    }

    /// Attach a freshly built node under `parent`. Returns the new id.
    pub fn add_node(&mut self, parent: NodeId, mut node: OscillatorNode) -> NodeId {
        let id = NodeId(self.slots.len());
        node.parent = Some(parent);
        self.slots.push(Some(node));
        if let Some(p) = self.get_mut(parent) {
            p.children.push(id);
        }
        id
    }

    /// Detach `id` from its parent and discard the whole subtree under
    /// it. Ids into the removed subtree go dangling, which the bond
    /// layer tolerates.
    pub fn remove_subtree(&mut self, id: NodeId) {
        if id == self.root {
            return;
        }
        let parent = match self.get(id) {
            Some(node) => node.parent,
            None => return,
        };
        if let Some(parent) = parent {
            if let Some(p) = self.get_mut(parent) {
                p.children.retain(|&c| c != id);
            }
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.slots[next.0].take() {
                stack.extend(node.children);
            }
        }
    }

    /// Live node ids in slot order.
    pub fn live_ids(&self) -> Vec<NodeId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| NodeId(i))
            .collect()
    }

    /// Number of oscillators, the root anchor excluded.
    pub fn oscillator_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count().saturating_sub(1)
    }

    /// One frame: advance phases (unless paused) and resolve every
    /// node's absolute position, parents strictly before children.
    pub fn update(&mut self, state: &SimulationState, limit: usize) -> FrameStats {
        let mut stats = FrameStats::default();
        self.update_node(self.root, state.origin, state, limit, &mut stats);
        stats
    }

    fn update_node(
        &mut self,
        id: NodeId,
        parent_pos: Vec3,
        state: &SimulationState,
        limit: usize,
        stats: &mut FrameStats,
    ) {
        let Some(node) = self.get_mut(id) else { return };
        stats.visited += 1;
        if !state.paused {
            let direction = if state.reverse { -1.0 } else { 1.0 };
            node.increment_phase(direction, state.speed);
        }
        let offset = node.local_offset();
        node.offset = offset;
        node.position = parent_pos.add(offset);
        let pos = node.position;
        let children = node.children.clone();
        if limit > 1 {
            for child in children {
                self.update_node(child, pos, state, limit - 1, stats);
            }
        }
    }

    /// Resolve the cursor position of one node against its parent's
    /// already-resolved position. Called by the sonification layer
    /// right after it advances the cursor.
    pub fn resolve_cursor(&mut self, id: NodeId) {
        let parent_pos = self
            .get(id)
            .and_then(|n| n.parent)
            .and_then(|p| self.get(p))
            .map(|p| p.position())
            .unwrap_or_default();
        if let Some(node) = self.get_mut(id) {
            node.cursor_position = parent_pos.add(node.local_cursor_offset());
        }
    }

    /// Rewind every phase to its starting value, down to `limit` levels.
    pub fn reset_phases(&mut self, limit: usize) {
        self.visit_mut(self.root, limit, &mut |node| node.reset_phase());
    }

    /// Reset the cursors of all descendants of `id` onto their phases,
    /// re-synchronizing the sweep clocks below that point.
    pub fn reset_child_cursors(&mut self, id: NodeId, limit: usize) {
        let children = match self.get(id) {
            Some(node) => node.children.clone(),
            None => return,
        };
        if limit <= 1 {
            return;
        }
        for child in children {
            if let Some(node) = self.get_mut(child) {
                node.reset_cursor();
            }
            self.reset_child_cursors(child, limit - 1);
        }
    }

    fn visit_mut(&mut self, id: NodeId, limit: usize, f: &mut impl FnMut(&mut OscillatorNode)) {
        let Some(node) = self.get_mut(id) else { return };
        f(node);
        let children = node.children.clone();
        if limit > 1 {
            for child in children {
                self.visit_mut(child, limit - 1, f);
            }
        }
    }

    /// Children of `id` sorted by start phase, construction order
    /// breaking ties through a small per-index epsilon on the sort key.
    pub fn sorted_children(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.get(id) else { return Vec::new() };
        let mut keyed: Vec<(f64, NodeId)> = node
            .children
            .iter()
            .enumerate()
            .filter_map(|(i, &c)| self.get(c).map(|n| (n.start_phase[0] + 0.001 * i as f64, c)))
            .collect();
        keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        keyed.into_iter().map(|(_, c)| c).collect()
    }

    /// Canonical textual fingerprint of the tree shape: child counts in
    /// start-phase order, depth-first, `"0,"` for leaves, truncated at
    /// `limit` levels. Colour, diameter and frequency never appear, so
    /// two trees built by the same construction calls always match.
    pub fn gml_to_text(&self, limit: usize) -> String {
        self.gml_text(self.root, limit)
    }

    fn gml_text(&self, id: NodeId, limit: usize) -> String {
        let Some(node) = self.get(id) else { return String::new() };
        let mut text = if node.parent.is_none() { String::from("B1,") } else { String::new() };
        if limit > 1 {
            if node.children.is_empty() {
                text.push_str("0,");
            } else {
                let sorted = self.sorted_children(id);
                text.push_str(&format!("{},", sorted.len()));
                for child in sorted {
                    text.push_str(&self.gml_text(child, limit - 1));
                }
            }
        }
        text
    }

    /// ASCII tree layout with per-node frequency and phase, for the
    /// shell's text dump.
    pub fn tree_diagram(&self) -> String {
        let mut out = String::new();
        self.diagram_node(self.root, "", &mut out);
        out
    }

    fn diagram_node(&self, id: NodeId, prefix: &str, out: &mut String) {
        let Some(node) = self.get(id) else { return };
        out.push_str(&format!(
            "{}{} {:.3} {:.2}\n",
            prefix, node.name, node.freq[0], node.phase[0]
        ));
        let cleaned = prefix.replace('-', " ").replace('+', " ");
        let last = node.children.len().saturating_sub(1);
        for (i, &child) in node.children.iter().enumerate() {
            let branch =
                if i != last { format!("{}|--", cleaned) } else { format!("{}+--", cleaned) };
            self.diagram_node(child, &branch, out);
        }
    }

    /// Nearest singularity to a test position within `max_distance`,
    /// searched down to `limit` levels. Uses the positions resolved by
    /// the last update.
    pub fn nearest(&self, test_pos: Vec3, max_distance: f64, limit: usize) -> (NodeId, f64) {
        self.nearest_node(self.root, test_pos, max_distance, limit)
    }

    fn nearest_node(
        &self,
        id: NodeId,
        test_pos: Vec3,
        mut max_distance: f64,
        limit: usize,
    ) -> (NodeId, f64) {
        let Some(node) = self.get(id) else { return (id, max_distance) };
        let mut best = node.parent.unwrap_or(id);
        let distance = node.position().distance_xy(test_pos);
        if distance < max_distance {
            best = id;
            max_distance = distance;
        }
        if limit > 1 {
            for &child in &node.children {
                let (candidate, d) = self.nearest_node(child, test_pos, max_distance, limit - 1);
                if d < max_distance {
                    best = candidate;
                    max_distance = d;
                }
            }
        }
        (best, max_distance)
    }

    /// Sorted list of rotation frequencies (1 / derived period).
    pub fn frequency_list(&self, limit: usize) -> Vec<f64> {
        let mut list = Vec::new();
        self.collect_freqs(self.root, limit, &mut list);
        list.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        list
    }

    fn collect_freqs(&self, id: NodeId, limit: usize, out: &mut Vec<f64>) {
        let Some(node) = self.get(id) else { return };
        out.push(1.0 / node.freq[0]);
        if limit > 1 {
            for &child in &node.children {
                self.collect_freqs(child, limit - 1, out);
            }
        }
    }

    /// Extremes of the derived frequencies down to `limit` levels.
    pub fn max_min_freq(&self, limit: usize) -> (f64, f64) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        self.visit(self.root, limit, &mut |node: &OscillatorNode| {
            min = min.min(node.freq[0]);
            max = max.max(node.freq[0]);
        });
        (min, max)
    }

    /// Rows of (identifier, derived frequency, cursor phase) for
    /// matching against external features.
    pub fn identifiers(&self, limit: usize) -> Vec<(i64, f64, f64)> {
        let mut rows = Vec::new();
        self.visit(self.root, limit, &mut |node: &OscillatorNode| {
            rows.push((node.identifier, node.freq[0], node.cursor_phase[0]));
        });
        rows
    }

    fn visit(&self, id: NodeId, limit: usize, f: &mut impl FnMut(&OscillatorNode)) {
        let Some(node) = self.get(id) else { return };
        f(node);
        if limit > 1 {
            for &child in &node.children {
                self.visit(child, limit - 1, f);
            }
        }
    }

    /// Ring polylines for the renderer: per node, the positions of its
    /// children in start-phase order, grouped by frequency so matching
    /// orbits join into one closed polygon. A lone singularity gets a
    /// ray back to its parent's centre instead of a degenerate ring.
    pub fn polygon_rings(&self, limit: usize) -> Vec<Vec<Vec3>> {
        let mut rings = Vec::new();
        self.collect_rings(self.root, limit, &mut rings);
        rings
    }

    fn collect_rings(&self, id: NodeId, limit: usize, rings: &mut Vec<Vec<Vec3>>) {
        let Some(node) = self.get(id) else { return };
        if limit <= 1 {
            return;
        }
        let sorted = self.sorted_children(id);
        if !sorted.is_empty() {
            let mut groups: Vec<(u64, Vec<Vec3>)> = Vec::new();
            for child in &sorted {
                if let Some(c) = self.get(*child) {
                    let key = c.freq[0].to_bits();
                    match groups.iter_mut().find(|(k, _)| *k == key) {
                        Some((_, points)) => points.push(c.position()),
                        None => groups.push((key, vec![c.position()])),
                    }
                }
            }
            for (_, mut points) in groups {
                let first = points[0];
                points.push(first);
                if points.len() == 2 {
                    points.push(node.position());
                }
                rings.push(points);
            }
        }
        for child in sorted {
            self.collect_rings(child, limit - 1, rings);
        }
    }

    pub fn stats(&self, limit: usize) -> TreeStats {
        let (min_freq, max_freq) = self.max_min_freq(limit);
        TreeStats {
            fingerprint: self.gml_to_text(limit),
            oscillators: self.oscillator_count(),
            min_freq,
            max_freq,
            frequencies: self.frequency_list(limit),
        }
    }

    pub fn save(&self, filename: &str) -> Result<(), Box<dyn std::error::Error>> {
        let cfg = bincode::config::standard();
        let encoded = bincode::encode_to_vec(self, cfg)?;
        fs::write(filename, encoded)?;
        Ok(())
    }

    pub fn load(filename: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let data = fs::read(filename)?;
        let cfg = bincode::config::standard();
        let (tree, _len): (Tree, usize) = bincode::decode_from_slice(&data, cfg)?;
        Ok(tree)
    }
}
