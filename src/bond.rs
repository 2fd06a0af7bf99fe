//! Pairwise phase coupling between arbitrary singularities, independent
//! of the tree edges. A bond acts like a spring in phase space: each
//! update applies equal and opposite restoring forces to the two
//! phases. Bonds are an opt-in layer driven by the shell, never by the
//! integrator itself.

use bincode::{Decode, Encode};

use crate::colour::{BLACK, Colour};
use crate::node::{NodeId, wrap_phase};
use crate::tree::Tree;

#[derive(Clone, Copy, Debug, Encode, Decode)]
pub struct Bond {
    pub a: NodeId,
    pub b: NodeId,
    pub phase_offset: f64,
    pub coupling: f64,
    /// Also pull the two derived frequencies toward their mean.
    pub lock_frequency: bool,
    pub colour: Colour,
    pub thickness: f64,
}

impl Bond {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        Bond {
            a,
            b,
            phase_offset: 0.0,
            coupling: 0.1,
            lock_frequency: false,
            colour: BLACK,
            thickness: 1.0,
        }
    }

    pub fn with_coupling(a: NodeId, b: NodeId, coupling: f64) -> Self {
        Bond { coupling, ..Bond::new(a, b) }
    }

    /// One coupling step. The phase difference is unwrapped by lifting
    /// `a` in whole turns until it sits at least half a turn above `b`,
    /// then dropping one turn after the offset is added. This is not
    /// the symmetric shortest-angle difference; the bias is what makes
    /// bonded oscillators converge, so it stays as-is.
    ///
    /// Either end having been removed from the tree makes the whole
    /// update a silent no-op.
    pub fn update(&self, tree: &mut Tree) {
        let (Some(pa), Some(pb)) = (
            tree.get(self.a).map(|n| n.phase[0]),
            tree.get(self.b).map(|n| n.phase[0]),
        ) else {
            return;
        };
        let mut phase1 = pa;
        while phase1 - pb < 180.0 {
            phase1 += 360.0;
        }
        let mut phase_diff = phase1 - pb + self.phase_offset;
        phase_diff -= 360.0;
        let force = self.coupling * phase_diff;

        if let Some(node) = tree.get_mut(self.a) {
            node.phase[0] = wrap_phase(node.phase[0] + force);
        }
        if let Some(node) = tree.get_mut(self.b) {
            node.phase[0] = wrap_phase(node.phase[0] - force);
        }

        if self.lock_frequency {
            let (Some(fa), Some(fb)) = (
                tree.get(self.a).map(|n| n.freq[0]),
                tree.get(self.b).map(|n| n.freq[0]),
            ) else {
                return;
            };
            let mean = (fa + fb) / 2.0;
            if let Some(node) = tree.get_mut(self.a) {
                node.freq[0] += self.coupling * (mean - fa);
            }
            if let Some(node) = tree.get_mut(self.b) {
                node.freq[0] += self.coupling * (mean - fb);
            }
        }
    }
}

/// Flat collection of bonds, updated once per frame while coupling is
/// enabled and cleared wholesale when a demo is torn down.
#[derive(Default, Encode, Decode)]
pub struct BondSet {
    bonds: Vec<Bond>,
}

impl BondSet {
    pub fn new() -> Self {
        BondSet::default()
    }

    pub fn add(&mut self, bond: Bond) {
        self.bonds.push(bond);
    }

    pub fn clear(&mut self) {
        self.bonds.clear();
    }

    pub fn len(&self) -> usize {
        self.bonds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bonds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bond> {
        self.bonds.iter()
    }

    pub fn update_all(&self, tree: &mut Tree) {
        for bond in &self.bonds {
            bond.update(tree);
        }
    }

    /// Bonds touching `of` get a copy attached to `new` instead,
    /// keeping the partner end. The symmetry-breaking mutator uses this
    /// to hand a parent's couplings down to a spawned child.
    pub fn mirror(&mut self, of: NodeId, new: NodeId) {
        let mut copies = Vec::new();
        for bond in &self.bonds {
            if bond.a == of {
                copies.push(Bond { a: new, b: bond.b, ..*bond });
            }
            if bond.b == of {
                copies.push(Bond { a: new, b: bond.a, ..*bond });
            }
        }
        self.bonds.extend(copies);
    }
}
