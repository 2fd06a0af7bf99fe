//! Symmetry breaking: rare stochastic structural mutation of a running
//! tree. Nodes whose child count is composite (or zero) may gain a new
//! point or lose their first child; stable prime rings may very
//! occasionally duplicate a vertex. Decisions are taken during a
//! read-only walk and queued, then applied after the walk completes, so
//! the child lists being iterated are never the ones being edited.

use rand::Rng;

use crate::bond::BondSet;
use crate::node::NodeId;
use crate::tree::Tree;

#[derive(Clone, Copy, Debug)]
pub struct SymmetrySettings {
    /// Chance per visit of growing a new point child.
    pub add_probability: f64,
    /// Chance per visit of dropping the first child.
    pub remove_probability: f64,
    /// Chance per visit of duplicating the first child of a prime ring.
    pub duplicate_probability: f64,
    pub min_freq: f64,
    pub max_freq: f64,
}

impl Default for SymmetrySettings {
    fn default() -> Self {
        SymmetrySettings {
            add_probability: 0.001,
            remove_probability: 0.001,
            duplicate_probability: 0.0001,
            min_freq: 0.01,
            max_freq: 200.0,
        }
    }
}

pub fn is_prime(n: usize) -> bool {
    n >= 2 && (2..n).all(|d| n % d != 0)
}

enum Mutation {
    AddPoint { parent: NodeId, phase: f64, diameter: f64, freq: f64, colour: [u8; 3] },
    RemoveFirst { parent: NodeId },
    DuplicateFirst { parent: NodeId, new_phase: f64 },
}

/// One symmetry-breaking pass over the subtree under `root`, recursing
/// at most `limit` levels. Bonds held by a mutated parent are mirrored
/// onto the children it spawns.
pub fn break_symmetry(
    tree: &mut Tree,
    bonds: &mut BondSet,
    root: NodeId,
    limit: usize,
    settings: &SymmetrySettings,
    rng: &mut impl Rng,
) {
    let mut queue = Vec::new();
    collect(tree, root, limit, settings, rng, &mut queue);
    apply(tree, bonds, queue);
}

fn collect(
    tree: &Tree,
    id: NodeId,
    limit: usize,
    settings: &SymmetrySettings,
    rng: &mut impl Rng,
    queue: &mut Vec<Mutation>,
) {
    let Some(node) = tree.get(id) else { return };
    let child_count = node.children().len();

    if child_count == 0 || !is_prime(child_count) {
        if rng.r#gen::<f64>() < settings.add_probability {
            let freq = if rng.r#gen::<f64>() > 0.5 {
                node.freq[0] / 2.0
            } else {
                node.freq[0] * 2.0
            }
            .clamp(settings.min_freq, settings.max_freq);
            queue.push(Mutation::AddPoint {
                parent: id,
                phase: node.phase[0],
                diameter: node.diameter,
                freq,
                colour: node.colour,
            });
        } else if rng.r#gen::<f64>() < settings.remove_probability && child_count > 0 {
            queue.push(Mutation::RemoveFirst { parent: id });
        }
    } else if rng.r#gen::<f64>() < settings.duplicate_probability && child_count > 0 {
        queue.push(Mutation::DuplicateFirst {
            parent: id,
            new_phase: rng.r#gen::<f64>() * 360.0,
        });
    }

    if limit > 1 {
        for &child in node.children() {
            collect(tree, child, limit - 1, settings, rng, queue);
        }
    }
}

fn apply(tree: &mut Tree, bonds: &mut BondSet, queue: Vec<Mutation>) {
    for mutation in queue {
        match mutation {
            Mutation::AddPoint { parent, phase, diameter, freq, colour } => {
                // an earlier queued removal may have taken the parent out
                if tree.get(parent).is_none() {
                    continue;
                }
                let spawned = tree.add_singularity(parent, phase, diameter, freq, colour);
                for id in spawned {
                    bonds.mirror(parent, id);
                }
            }
            Mutation::RemoveFirst { parent } => {
                let first = tree.get(parent).and_then(|n| n.children().first().copied());
                if let Some(first) = first {
                    tree.remove_subtree(first);
                }
            }
            Mutation::DuplicateFirst { parent, new_phase } => {
                let template = tree
                    .get(parent)
                    .and_then(|n| n.children().first().copied())
                    .and_then(|c| tree.get(c).map(|n| (c, n.phase[0], n.diameter, n.orbit_radius[0], n.colour)));
                let Some((first, phase, diameter, raw_freq, colour)) = template else { continue };
                let spawned = tree.add_singularity(parent, phase, diameter, raw_freq, colour);
                for id in spawned {
                    bonds.mirror(first, id);
                    if let Some(node) = tree.get_mut(id) {
                        node.set_phase(new_phase);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colour::WHITE;
    use crate::grammar::PolygonOpts;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn assert_tree_is_consistent(tree: &Tree) {
        // every live non-root node is owned by exactly one live parent
        for id in tree.live_ids() {
            let node = tree.get(id).unwrap();
            match node.parent() {
                None => assert_eq!(id, tree.root()),
                Some(parent) => {
                    let p = tree.get(parent).expect("parent of a live node must be live");
                    assert_eq!(p.children().iter().filter(|&&c| c == id).count(), 1);
                }
            }
            for &child in node.children() {
                assert!(tree.get(child).is_some(), "child list holds a dead id");
            }
        }
        // depth-first traversal from the root reaches the whole live set
        let mut seen = 0usize;
        let mut stack = vec![tree.root()];
        while let Some(next) = stack.pop() {
            seen += 1;
            stack.extend(tree.get(next).unwrap().children().iter().copied());
            assert!(seen <= tree.live_ids().len(), "cycle detected");
        }
        assert_eq!(seen, tree.live_ids().len());
    }

    #[test]
    fn test_is_prime() {
        let primes: Vec<usize> = (0..=13).filter(|&n| is_prime(n)).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13]);
    }

    #[test]
    fn test_certain_add_grows_a_point() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut tree = Tree::new_bindu();
        let mut bonds = BondSet::new();
        let a = tree.add_square(tree.root(), 0.0, 8.0, 50.0, WHITE, &PolygonOpts::default())[0];
        let before = tree.get(a).unwrap().children().len();
        let settings = SymmetrySettings {
            add_probability: 1.0,
            remove_probability: 0.0,
            duplicate_probability: 0.0,
            ..Default::default()
        };
        break_symmetry(&mut tree, &mut bonds, a, 1, &settings, &mut rng);
        assert_eq!(tree.get(a).unwrap().children().len(), before + 1);
        let new_id = *tree.get(a).unwrap().children().last().unwrap();
        let new_node = tree.get(new_id).unwrap();
        // spawned at the parent's current phase, frequency clamped
        assert_eq!(new_node.phase[0], tree.get(a).unwrap().phase[0]);
        assert!(new_node.orbit_radius[0] >= 0.01 && new_node.orbit_radius[0] <= 200.0);
        assert_tree_is_consistent(&tree);
    }

    #[test]
    fn test_certain_remove_drops_first_child() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut tree = Tree::new_bindu();
        let mut bonds = BondSet::new();
        // a square is composite, so the remove branch is reachable
        let ring = tree.add_square(tree.root(), 0.0, 8.0, 50.0, WHITE, &PolygonOpts::default());
        let parent = tree.get(ring[0]).unwrap().parent().unwrap();
        let settings = SymmetrySettings {
            add_probability: 0.0,
            remove_probability: 1.0,
            duplicate_probability: 0.0,
            ..Default::default()
        };
        break_symmetry(&mut tree, &mut bonds, parent, 1, &settings, &mut rng);
        assert!(tree.get(ring[0]).is_none());
        assert_eq!(tree.get(parent).unwrap().children().len(), 3);
        assert_tree_is_consistent(&tree);
    }

    #[test]
    fn test_prime_rings_resist_mutation() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut tree = Tree::new_bindu();
        let mut bonds = BondSet::new();
        let a = tree.add_singularity(tree.root(), 0.0, 8.0, 100.0, WHITE)[0];
        tree.add_triangle(a, 0.0, 8.0, 40.0, WHITE, &PolygonOpts::default());
        let fingerprint = tree.gml_to_text(100);
        // add/remove certain, duplication off: the prime triangle ring
        // cannot change
        let settings = SymmetrySettings {
            add_probability: 1.0,
            remove_probability: 1.0,
            duplicate_probability: 0.0,
            ..Default::default()
        };
        break_symmetry(&mut tree, &mut bonds, a, 1, &settings, &mut rng);
        assert_eq!(tree.gml_to_text(100), fingerprint);
    }

    #[test]
    fn test_duplicate_copies_first_child_and_bonds() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut tree = Tree::new_bindu();
        let mut bonds = BondSet::new();
        let a = tree.add_singularity(tree.root(), 0.0, 8.0, 100.0, WHITE)[0];
        let ring = tree.add_triangle(a, 0.0, 8.0, 40.0, WHITE, &PolygonOpts::default());
        bonds.add(crate::bond::Bond::new(ring[0], ring[1]));
        let settings = SymmetrySettings {
            add_probability: 0.0,
            remove_probability: 0.0,
            duplicate_probability: 1.0,
            ..Default::default()
        };
        break_symmetry(&mut tree, &mut bonds, a, 1, &settings, &mut rng);
        let children = tree.get(a).unwrap().children();
        assert_eq!(children.len(), 4);
        let dup = tree.get(*children.last().unwrap()).unwrap();
        let original = tree.get(ring[0]).unwrap();
        assert_eq!(dup.orbit_radius[0], original.orbit_radius[0]);
        assert_eq!(dup.colour, original.colour);
        assert!(dup.phase[0] >= 0.0 && dup.phase[0] < 360.0);
        // the duplicate inherited the original's bond
        assert_eq!(bonds.len(), 2);
        assert_tree_is_consistent(&tree);
    }

    #[test]
    fn test_tree_invariants_survive_mutation_storm() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut tree = Tree::new_bindu();
        let mut bonds = BondSet::new();
        let ring = tree.add_square(tree.root(), 0.0, 8.0, 80.0, WHITE, &PolygonOpts {
            levels: 2,
            freq_factor: 0.5,
            ..Default::default()
        });
        bonds.add(crate::bond::Bond::new(ring[0], ring[1]));
        let settings = SymmetrySettings {
            add_probability: 0.2,
            remove_probability: 0.3,
            duplicate_probability: 0.1,
            ..Default::default()
        };
        let root = tree.root();
        for _ in 0..100 {
            break_symmetry(&mut tree, &mut bonds, root, 6, &settings, &mut rng);
            assert_tree_is_consistent(&tree);
        }
        // dangling bonds accumulated along the way must stay inert
        bonds.update_all(&mut tree);
        assert_tree_is_consistent(&tree);
    }
}
