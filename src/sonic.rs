//! Sonification layer: sweeps each node's cursor forward once per
//! frame and turns cursor/phase overlaps into discrete note events.
//! The engine is the single per-frame caller of the overlap check —
//! overlap stays true for the whole tolerance window, so polling it
//! twice would double-fire.

use serde::Serialize;

use crate::node::NodeId;
use crate::tree::Tree;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorMode {
    /// Every cursor runs free against its own oscillator.
    FreeRunning,
    /// A tight overlap (< 1 degree) re-synchronizes all child cursors
    /// onto their phases, pulling the subtree back into step.
    WinfreeReset,
}

/// One cursor-overlap event, ready for the audio collaborator. Pitch
/// is derived from orbit radius, volume from overlap magnitude scaled
/// by the node's probability, pan from the resolved x position.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct NoteEvent {
    pub node: NodeId,
    pub pitch: f64,
    pub volume: f64,
    pub pan: f64,
    pub overlap: f64,
}

pub struct SonicEngine {
    /// Linear distance each cursor advances per frame.
    pub phase_advance: f64,
    /// Angular overlap window, degrees.
    pub tolerance: f64,
    /// Logarithmic pitch mapping (semitones) instead of linear.
    pub log_music: bool,
    pub music_scale: f64,
    /// Pitch offset in semitones; 12 is one octave.
    pub pitch_offset: f64,
    pub mode: CursorMode,
}

impl Default for SonicEngine {
    fn default() -> Self {
        SonicEngine {
            phase_advance: 0.5,
            tolerance: 20.0,
            log_music: true,
            music_scale: 12.0,
            pitch_offset: 12.0,
            mode: CursorMode::FreeRunning,
        }
    }
}

impl SonicEngine {
    /// Advance every cursor and gather the frame's overlap events,
    /// depth-first. The root anchor never sounds.
    pub fn collect_events(&self, tree: &mut Tree) -> Vec<NoteEvent> {
        let mut events = Vec::new();
        let root = tree.root();
        self.visit(tree, root, &mut events);
        events
    }

    fn visit(&self, tree: &mut Tree, id: NodeId, events: &mut Vec<NoteEvent>) {
        let Some(node) = tree.get_mut(id) else { return };
        node.advance_cursor(self.phase_advance);
        let overlap = node.cursor_overlap(self.tolerance);
        let is_root = node.parent().is_none();
        let radius = node.orbit_radius[0];
        let prob_volume = node.probability_volume();
        let children = node.children().to_vec();
        tree.resolve_cursor(id);

        if let Some(diff) = overlap {
            if !is_root {
                if self.mode == CursorMode::WinfreeReset && diff < 1.0 {
                    tree.reset_child_cursors(id, 99);
                }
                let mut pitch = 400.0 / radius;
                if self.log_music {
                    pitch = pitch.log2() * self.music_scale;
                }
                pitch += self.pitch_offset;
                let raw_volume = 127.0 * (32.0 - diff) / 32.0;
                let volume = (raw_volume * prob_volume).clamp(10.0, 127.0);
                let pan = tree.get(id).map(|n| n.position().x / 5.05).unwrap_or(0.0);
                events.push(NoteEvent { node: id, pitch, volume, pan, overlap: diff });
            }
        }

        for child in children {
            self.visit(tree, child, events);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colour::WHITE;
    use crate::node::{Dims, OscillatorNode};

    fn tree_with_child(raw_freq: f64) -> (Tree, NodeId) {
        let mut tree = Tree::new_bindu();
        let a = tree.add_node(
            tree.root(),
            OscillatorNode::new("a", Dims::Planar, 8.0, WHITE, [raw_freq, 0.0], [0.0, 0.0]),
        );
        (tree, a)
    }

    #[test]
    fn test_fresh_cursor_fires_immediately() {
        let (mut tree, a) = tree_with_child(10.0);
        let engine = SonicEngine::default();
        let events = engine.collect_events(&mut tree);
        assert_eq!(events.len(), 1);
        let ev = &events[0];
        assert_eq!(ev.node, a);
        // one advance of 0.5 over radius 10 is 9 degrees of overlap
        assert!((ev.overlap - 9.0).abs() < 1e-9);
        assert!((ev.volume - 127.0 * 23.0 / 32.0).abs() < 1e-6);
        let expected_pitch = (400.0 / 10.0_f64).log2() * 12.0 + 12.0;
        assert!((ev.pitch - expected_pitch).abs() < 1e-9);
    }

    #[test]
    fn test_cursor_leaves_window_and_goes_quiet() {
        let (mut tree, _) = tree_with_child(10.0);
        let engine = SonicEngine::default();
        assert_eq!(engine.collect_events(&mut tree).len(), 1); // 9 degrees
        assert_eq!(engine.collect_events(&mut tree).len(), 1); // 18 degrees
        assert_eq!(engine.collect_events(&mut tree).len(), 0); // 27: outside
    }

    #[test]
    fn test_root_never_sounds() {
        let mut tree = Tree::new_bindu();
        let engine = SonicEngine::default();
        assert!(engine.collect_events(&mut tree).is_empty());
    }

    #[test]
    fn test_linear_pitch_mode() {
        let (mut tree, _) = tree_with_child(10.0);
        let engine = SonicEngine { log_music: false, ..Default::default() };
        let events = engine.collect_events(&mut tree);
        assert!((events[0].pitch - (400.0 / 10.0 + 12.0)).abs() < 1e-9);
    }

    #[test]
    fn test_probability_scales_volume_to_floor() {
        let (mut tree, a) = tree_with_child(10.0);
        tree.get_mut(a).unwrap().set_probability(0.0);
        let engine = SonicEngine::default();
        let events = engine.collect_events(&mut tree);
        // probability 0 crushes the volume onto the lower clamp
        assert_eq!(events[0].volume, 10.0);
    }

    #[test]
    fn test_winfree_reset_resyncs_children() {
        // slow parent: 0.5 over radius 1000 is 0.09 degrees, a tight hit
        let (mut tree, a) = tree_with_child(1000.0);
        let c = tree.add_node(
            a,
            OscillatorNode::new("c", Dims::Planar, 8.0, WHITE, [10.0, 0.0], [0.0, 0.0]),
        );
        // knock the child's cursor far out of step
        tree.get_mut(c).unwrap().set_cursor(100.0);

        let free = SonicEngine { mode: CursorMode::FreeRunning, ..Default::default() };
        let mut drifted = tree;
        free.collect_events(&mut drifted);
        let drift = drifted.get(c).unwrap().cursor_phase[0];
        assert!(drift > 100.0);

        let (mut tree, a) = tree_with_child(1000.0);
        let c = tree.add_node(
            a,
            OscillatorNode::new("c", Dims::Planar, 8.0, WHITE, [10.0, 0.0], [0.0, 0.0]),
        );
        tree.get_mut(c).unwrap().set_cursor(100.0);
        let winfree = SonicEngine { mode: CursorMode::WinfreeReset, ..Default::default() };
        winfree.collect_events(&mut tree);
        // the parent's tight overlap snapped the child back onto its
        // phase before the child's own 9 degree advance
        let cursor = tree.get(c).unwrap().cursor_phase[0];
        assert!((cursor - 9.0).abs() < 1e-9);
    }
}
