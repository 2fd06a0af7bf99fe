use bincode::{Decode, Encode};
use serde::Serialize;

use crate::colour::Colour;
use crate::trig;

/// Substitute raw frequency for the degenerate root, so the derived
/// frequency transform never divides by zero. The resulting orbit
/// radius is microscopic and the root stays pinned to the origin.
pub const BINDU_FREQ: f64 = 0.0005;

/// Handle into the tree arena. Slots are never reused, so a stale id
/// (from a removed subtree) simply resolves to nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode, Serialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Encode, Decode, Serialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3 { x, y, z }
    }

    pub fn add(&self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn distance_xy(&self, other: Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// How many phase components a node integrates. Planar nodes rotate in
/// the screen plane; spherical nodes treat the two components as polar
/// angles on a sphere around the parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, Serialize)]
pub enum Dims {
    Planar,
    Spherical,
}

impl Dims {
    pub fn count(self) -> usize {
        match self {
            Dims::Planar => 1,
            Dims::Spherical => 2,
        }
    }
}

/// Shape function turning a phase into a radial amount in [0, 1] for
/// the spiral motion family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, Serialize)]
pub enum SpiralShape {
    /// Triangular ramp: 1 at 0 degrees, 0 at 180, back to 1 at 360.
    Triangle,
    /// Signed ramp, with the sweep angle negated past 180 degrees.
    Ramp,
    /// Doubled, folded ramp with its own angle flip.
    Fold,
    /// Plain linear fraction of a full turn.
    Fraction,
}

/// Position formula selector. Parameters live with the variant that
/// uses them; `Circular` is the default orbit.
#[derive(Clone, Copy, Debug, PartialEq, Encode, Decode, Serialize)]
pub enum MotionMode {
    Circular,
    Spiral { rate: f64, shape: SpiralShape, rotations: f64 },
    Linear { shape: SpiralShape, rotations: f64 },
    Pendulum { shape: SpiralShape, rotations: f64 },
    Angle { shape: SpiralShape, rotations: f64, offset: f64 },
    Corner { shape: SpiralShape, rotations: f64 },
}

/// Re-normalize a phase into (-360, 360] after an increment of any
/// size. The derived frequency of a near-zero raw frequency (the root)
/// is huge, so a single +-360 correction is not enough here.
pub fn wrap_phase(mut p: f64) -> f64 {
    if p > 360.0 || p < -360.0 {
        p -= 360.0 * (p / 360.0).trunc();
    }
    p
}

/// Signed shortest angular difference from `a1` to `a2`, in [-180, 180).
pub fn ang_diff(a1: f64, a2: f64) -> f64 {
    let mut r = (a2 - a1).rem_euclid(360.0);
    if r >= 180.0 {
        r -= 360.0;
    }
    r
}

/// A single phase singularity: one vertex of the oscillator tree.
///
/// Identity (name, dims) is fixed at construction; the dynamic state
/// (phases, cursor, resolved positions) is driven by the per-frame
/// integrator in `tree`.
#[derive(Clone, Debug, Encode, Decode)]
pub struct OscillatorNode {
    pub name: String,
    pub dims: Dims,
    pub diameter: f64,
    pub colour: Colour,
    /// Derived rotation rate per dimension: 100 / raw + 0.1.
    pub freq: [f64; 2],
    /// Half-extent of the local oscillation: abs(raw).
    pub orbit_radius: [f64; 2],
    pub phase: [f64; 2],
    pub start_phase: [f64; 2],
    pub cursor_phase: [f64; 2],
    pub bindu: bool,
    pub motion: MotionMode,
    /// Per-node multiplier on top of the global speed.
    pub speed: f64,
    /// Application tag for matching against external features. -1 when unset.
    pub identifier: i64,
    /// Scales event volume; clamped into [0, 1].
    pub probability: f64,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Local offset from the parent, valid after the last integrator pass.
    pub(crate) offset: Vec3,
    /// Resolved absolute position, valid after the last integrator pass.
    pub(crate) position: Vec3,
    pub(crate) cursor_position: Vec3,
}

impl OscillatorNode {
    pub fn new(
        name: &str,
        dims: Dims,
        diameter: f64,
        colour: Colour,
        raw_freq: [f64; 2],
        phase: [f64; 2],
    ) -> Self {
        let mut node = OscillatorNode {
            name: name.to_string(),
            dims,
            diameter,
            colour,
            freq: [0.0, 0.0],
            orbit_radius: [0.0, 0.0],
            phase: [0.0, 0.0],
            start_phase: [0.0, 0.0],
            cursor_phase: [0.0, 0.0],
            bindu: false,
            motion: MotionMode::Circular,
            speed: 1.0,
            identifier: -1,
            probability: 1.0,
            parent: None,
            children: Vec::new(),
            offset: Vec3::default(),
            position: Vec3::default(),
            cursor_position: Vec3::default(),
        };
        node.set_singularity_parameters(raw_freq, phase);
        node
    }

    /// Derive frequency and orbit radius from a raw frequency, and seed
    /// all three phase values. A raw frequency of zero (in every active
    /// dimension) marks the degenerate root.
    fn set_singularity_parameters(&mut self, raw_freq: [f64; 2], phase: [f64; 2]) {
        let mut raw = raw_freq;
        let active = self.dims.count();
        self.bindu = raw[..active].iter().all(|&f| f == 0.0);
        if self.bindu {
            for f in raw[..active].iter_mut() {
                *f = BINDU_FREQ;
            }
        }
        for dim in 0..active {
            self.freq[dim] = 100.0 / raw[dim] + 0.1;
            self.orbit_radius[dim] = raw[dim].abs();
            self.phase[dim] = phase[dim];
            self.start_phase[dim] = phase[dim];
            self.cursor_phase[dim] = phase[dim];
        }
    }

    /// Re-derive frequency and orbit radius from a new raw frequency,
    /// leaving phases alone.
    pub fn set_freq(&mut self, raw_freq: [f64; 2]) {
        for dim in 0..self.dims.count() {
            self.freq[dim] = 100.0 / raw_freq[dim] + 0.1;
            self.orbit_radius[dim] = raw_freq[dim].abs();
        }
    }

    /// Set phase, start phase and cursor together, re-synchronizing the
    /// cursor to the true phase. Used when spawning or re-seeding a node.
    pub fn set_phase(&mut self, phase: f64) {
        self.phase[0] = phase;
        self.start_phase[0] = phase;
        self.cursor_phase[0] = phase;
    }

    /// Restore the phase to its starting value.
    pub fn reset_phase(&mut self) {
        self.phase = self.start_phase;
    }

    pub fn set_identifier(&mut self, id: i64) {
        self.identifier = id;
    }

    pub fn set_probability(&mut self, prob: f64) {
        self.probability = prob.clamp(0.0, 1.0);
    }

    /// Exponential volume weighting for the sonification layer.
    pub fn probability_volume(&self) -> f64 {
        50.0_f64.powf(self.probability) / 50.0
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn cursor_position(&self) -> Vec3 {
        self.cursor_position
    }

    pub fn orbit_radius(&self) -> f64 {
        self.orbit_radius[0]
    }

    /// One phase step. `direction` is +-1, from the global reverse flag.
    pub(crate) fn increment_phase(&mut self, direction: f64, global_speed: f64) {
        for dim in 0..self.dims.count() {
            self.phase[dim] += direction * self.freq[dim] * global_speed * self.speed;
            self.phase[dim] = wrap_phase(self.phase[dim]);
        }
    }

    /// Local offset from the parent at the current phase.
    pub(crate) fn local_offset(&self) -> Vec3 {
        match self.motion {
            MotionMode::Circular => match self.dims {
                Dims::Planar => Vec3::new(
                    self.orbit_radius[0] * trig::fast_cos_deg(self.phase[0]),
                    self.orbit_radius[0] * trig::fast_sin_deg(self.phase[0]),
                    0.0,
                ),
                Dims::Spherical => {
                    let sin_theta = trig::fast_sin_deg(-self.phase[0]);
                    let cos_theta = trig::fast_cos_deg(self.phase[0]);
                    let sin_phi = trig::fast_sin_deg(self.phase[1]);
                    let cos_phi = trig::fast_cos_deg(self.phase[1]);
                    let r = self.orbit_radius[0];
                    // screen-x carries the polar axis; depth goes last
                    Vec3::new(r * cos_theta, r * sin_theta * cos_phi, r * sin_theta * sin_phi)
                }
            },
            // amount and sweep both follow the true phase; the angle
            // offset fires as soon as the arm extends at all
            _ => self.swirl_offset(self.phase[0], 0.0),
        }
    }

    /// Cursor position offset. The sweep base angle still follows the
    /// true phase; only the radial amount and the rotation term track
    /// the cursor, and the angle-offset threshold sits at the half-way
    /// point instead of zero.
    pub(crate) fn local_cursor_offset(&self) -> Vec3 {
        match self.motion {
            MotionMode::Circular => Vec3::new(
                self.orbit_radius[0] * trig::fast_cos_deg(self.cursor_phase[0]),
                self.orbit_radius[0] * trig::fast_sin_deg(self.cursor_phase[0]),
                0.0,
            ),
            _ => self.swirl_offset(self.cursor_phase[0], 0.5),
        }
    }

    fn swirl_offset(&self, amount_phase: f64, offset_threshold: f64) -> Vec3 {
        let (rate, shape, rotations, is_pendulum, angle_offset) = match self.motion {
            MotionMode::Circular => (0.0, SpiralShape::Triangle, 0.0, false, None),
            MotionMode::Spiral { rate, shape, rotations } => (rate, shape, rotations, false, None),
            MotionMode::Linear { shape, rotations } => (0.0, shape, rotations, false, None),
            MotionMode::Pendulum { shape, rotations } => (0.0, shape, rotations, true, None),
            MotionMode::Angle { shape, rotations, offset } => {
                (0.0, shape, rotations, false, Some(offset))
            }
            MotionMode::Corner { shape, rotations } => (0.0, shape, rotations, false, Some(90.0)),
        };
        let mut spiral_angle = self.phase[0] * rate;
        let mut amount = match shape {
            SpiralShape::Triangle => (amount_phase / 180.0 - 1.0).abs(),
            SpiralShape::Ramp => {
                if amount_phase > 180.0 {
                    spiral_angle = -spiral_angle;
                }
                amount_phase / 180.0 - 1.0
            }
            SpiralShape::Fold => {
                let ph2 = if amount_phase >= 180.0 {
                    (360.0 - amount_phase) * 2.0
                } else {
                    amount_phase * 2.0
                };
                if ph2 > 180.0 {
                    spiral_angle = -spiral_angle;
                }
                ph2 / 180.0 - 1.0
            }
            SpiralShape::Fraction => amount_phase / 360.0,
        };
        if is_pendulum {
            amount = 1.0;
        }
        spiral_angle += amount_phase * rotations;
        if let Some(offset) = angle_offset {
            if amount > offset_threshold {
                spiral_angle += offset;
            }
        }
        Vec3::new(
            self.orbit_radius[0] * amount * trig::fast_cos_deg(spiral_angle),
            self.orbit_radius[0] * amount * trig::fast_sin_deg(spiral_angle),
            0.0,
        )
    }

    /// Move the cursor by a linear distance along the orbit, converted
    /// to an angular delta. The cursor runs over a wider range than the
    /// phase so multi-lap tracking does not alias.
    pub fn advance_cursor(&mut self, dist: f64) {
        let angle_change = (dist / self.orbit_radius[0]) * 180.0;
        self.cursor_phase[0] += angle_change;
        if self.cursor_phase[0] < 0.0 {
            self.cursor_phase[0] += 360.0;
        }
        if self.cursor_phase[0] > 1440.0 {
            self.cursor_phase[0] -= 1440.0;
        }
    }

    pub fn set_cursor(&mut self, new_phase: f64) {
        self.cursor_phase[0] = new_phase;
    }

    /// Snap the cursor back onto the true phase.
    pub fn reset_cursor(&mut self) {
        self.cursor_phase[0] = self.phase[0];
    }

    /// Has the cursor just swept past the singularity? Returns the
    /// overlap magnitude when the signed difference from phase to
    /// cursor is positive and inside the tolerance window. Pure in the
    /// two phase values: calling it twice in a frame reports the same
    /// overlap twice.
    pub fn cursor_overlap(&self, tolerance: f64) -> Option<f64> {
        let diff = ang_diff(self.phase[0], self.cursor_phase[0]);
        if diff > 0.0 && diff < tolerance {
            Some(diff)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colour::WHITE;

    fn plain_node(raw_freq: f64, phase: f64) -> OscillatorNode {
        OscillatorNode::new("osc", Dims::Planar, 8.0, WHITE, [raw_freq, 0.0], [phase, 0.0])
    }

    #[test]
    fn test_frequency_transform() {
        let node = plain_node(50.0, 0.0);
        assert!((node.freq[0] - (100.0 / 50.0 + 0.1)).abs() < 1e-12);
        assert!((node.orbit_radius[0] - 50.0).abs() < 1e-12);
        assert!(!node.bindu);
    }

    #[test]
    fn test_bindu_substitution() {
        let node = plain_node(0.0, 0.0);
        assert!(node.bindu);
        assert!((node.freq[0] - (100.0 / BINDU_FREQ + 0.1)).abs() < 1e-6);
        assert!(node.freq[0] > 0.0);
        assert!((node.orbit_radius[0] - BINDU_FREQ).abs() < 1e-12);
    }

    #[test]
    fn test_wrap_phase_stays_bounded() {
        let mut node = plain_node(0.0, 0.0); // bindu: enormous derived frequency
        for _ in 0..1000 {
            node.increment_phase(1.0, 1.0);
            assert!(node.phase[0] > -360.0 - 1e-9 && node.phase[0] <= 360.0 + 1e-9);
        }
        let mut rev = plain_node(30.0, 10.0);
        for _ in 0..1000 {
            rev.increment_phase(-1.0, 2.5);
            assert!(rev.phase[0] > -360.0 - 1e-9 && rev.phase[0] <= 360.0 + 1e-9);
        }
    }

    #[test]
    fn test_wrap_phase_values() {
        assert!((wrap_phase(370.0) - 10.0).abs() < 1e-12);
        assert!((wrap_phase(-370.0) + 10.0).abs() < 1e-12);
        assert!((wrap_phase(360.0) - 360.0).abs() < 1e-12);
        assert!((wrap_phase(725.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_set_phase_syncs_cursor() {
        let mut node = plain_node(30.0, 0.0);
        node.advance_cursor(5.0);
        node.set_phase(90.0);
        assert_eq!(node.phase[0], 90.0);
        assert_eq!(node.start_phase[0], 90.0);
        assert_eq!(node.cursor_phase[0], 90.0);
    }

    #[test]
    fn test_reset_phase_restores_start() {
        let mut node = plain_node(30.0, 45.0);
        node.increment_phase(1.0, 3.0);
        assert!(node.phase[0] != 45.0);
        node.reset_phase();
        assert_eq!(node.phase[0], 45.0);
    }

    #[test]
    fn test_cursor_overlap_window() {
        let mut node = plain_node(10.0, 0.0);
        // cursor == phase: signed difference is zero, no event
        assert!(node.cursor_overlap(20.0).is_none());

        // nudge the cursor just ahead of the phase
        node.advance_cursor(0.5); // (0.5 / 10) * 180 = 9 degrees
        let overlap = node.cursor_overlap(20.0).unwrap();
        assert!((overlap - 9.0).abs() < 1e-9);

        // push it past the tolerance window
        node.advance_cursor(1.0); // +18 degrees, 27 total
        assert!(node.cursor_overlap(20.0).is_none());
    }

    #[test]
    fn test_cursor_overlap_needs_reconvergence() {
        let mut node = plain_node(10.0, 0.0);
        node.advance_cursor(2.0); // 36 degrees ahead, outside a 20 degree window
        assert!(node.cursor_overlap(20.0).is_none());
        // the oscillator phase catching up closes the gap
        node.phase[0] = 20.0;
        let overlap = node.cursor_overlap(20.0).unwrap();
        assert!((overlap - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_cursor_wide_wrap_range() {
        let mut node = plain_node(10.0, 0.0);
        node.set_cursor(1430.0);
        node.advance_cursor(1.0); // +18 degrees crosses 1440
        assert!(node.cursor_phase[0] >= 0.0 && node.cursor_phase[0] < 1440.0);
        node.set_cursor(5.0);
        node.advance_cursor(-1.0); // -18 degrees dips below zero
        assert!(node.cursor_phase[0] >= 0.0);
    }

    #[test]
    fn test_pendulum_amount_is_constant_radius() {
        let mut node = plain_node(40.0, 0.0);
        node.motion = MotionMode::Pendulum { shape: SpiralShape::Triangle, rotations: 0.0 };
        for phase in [0.0, 77.0, 180.0, 299.0] {
            node.phase[0] = phase;
            let off = node.local_offset();
            let r = (off.x * off.x + off.y * off.y).sqrt();
            assert!((r - 40.0).abs() < 1e-6, "radius at phase {}", phase);
        }
    }

    #[test]
    fn test_spiral_triangle_amount() {
        let mut node = plain_node(40.0, 180.0);
        node.motion =
            MotionMode::Spiral { rate: 1.0, shape: SpiralShape::Triangle, rotations: 0.0 };
        // at 180 degrees the triangular ramp collapses to zero radius
        let off = node.local_offset();
        assert!(off.x.abs() < 1e-9 && off.y.abs() < 1e-9);
        node.phase[0] = 0.0;
        let off = node.local_offset();
        let r = (off.x * off.x + off.y * off.y).sqrt();
        assert!((r - 40.0).abs() < 1e-6);
    }

    #[test]
    fn test_corner_offset_past_threshold() {
        let mut node = plain_node(40.0, 90.0);
        node.motion = MotionMode::Corner { shape: SpiralShape::Triangle, rotations: 0.0 };
        // triangle amount at 90 degrees is 0.5: position path (threshold 0)
        // applies the 90 degree corner, cursor path (threshold 0.5) does not
        node.cursor_phase[0] = 90.0;
        let pos = node.local_offset();
        let cur = node.local_cursor_offset();
        let pos_angle = pos.y.atan2(pos.x).to_degrees();
        let cur_angle = cur.y.atan2(cur.x).to_degrees();
        assert!((pos_angle - cur_angle).abs() > 45.0);
    }

    #[test]
    fn test_spherical_offset_on_sphere() {
        let node = OscillatorNode::new(
            "sphere",
            Dims::Spherical,
            8.0,
            WHITE,
            [60.0, 60.0],
            [35.0, 120.0],
        );
        let off = node.local_offset();
        let r = (off.x * off.x + off.y * off.y + off.z * off.z).sqrt();
        assert!((r - 60.0).abs() < 0.1);
    }

    #[test]
    fn test_probability_clamps() {
        let mut node = plain_node(30.0, 0.0);
        node.set_probability(2.0);
        assert_eq!(node.probability, 1.0);
        node.set_probability(-1.0);
        assert_eq!(node.probability, 0.0);
        node.set_probability(1.0);
        assert!((node.probability_volume() - 1.0).abs() < 1e-12);
        node.set_probability(0.0);
        assert!((node.probability_volume() - 0.02).abs() < 1e-12);
    }
}
