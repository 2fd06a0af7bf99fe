//! Construction grammar for the oscillator tree: recursive polygon
//! nests, euclidean rhythms, flat-list geometries and the spiral
//! motion family. Builders return the ids of the direct children they
//! created, or the target node itself when the result is a zero-gon,
//! so construction calls chain.

use std::collections::VecDeque;

use rand::Rng;
use thiserror::Error;

use crate::colour::{Colour, rand_colour, step_colour};
use crate::euclid;
use crate::node::{Dims, MotionMode, NodeId, OscillatorNode, SpiralShape};
use crate::tree::Tree;

#[derive(Debug, Error, PartialEq)]
pub enum GrammarError {
    #[error("euclidean rhythm with {pulses} pulses cannot fit {steps} steps")]
    PulsesExceedSteps { pulses: usize, steps: usize },
    #[error("unknown shape kind: {0}")]
    UnknownShape(String),
}

/// Optional parameters for nested polygon construction.
#[derive(Clone, Copy, Debug)]
pub struct PolygonOpts {
    /// Nesting depth; each level recurses into every new vertex.
    pub levels: u32,
    /// Frequency multiplier applied per level.
    pub freq_factor: f64,
    /// Signed change in side count per level.
    pub side_delta: i32,
    /// Signed change in side count accumulated per vertex around the ring.
    pub rotation_delta: i32,
    /// Crystal growth: nested levels repeat the current shape instead of
    /// compounding the factors further.
    pub crystal: bool,
    /// Darken the colour a step per vertex at the top level.
    pub colour_step: bool,
}

impl Default for PolygonOpts {
    fn default() -> Self {
        PolygonOpts {
            levels: 1,
            freq_factor: 1.0,
            side_delta: 0,
            rotation_delta: 0,
            crystal: false,
            colour_step: false,
        }
    }
}

impl Tree {
    fn dims_of(&self, id: NodeId) -> Dims {
        self.get(id).map(|n| n.dims).unwrap_or(Dims::Planar)
    }

    /// Place `sides` children at even angular spacing from
    /// `start_angle`, recursing `opts.levels` deep. `sides <= 0` is the
    /// deliberate zero-gon: no children, the node itself comes back.
    pub fn add_polygon(
        &mut self,
        parent: NodeId,
        name: &str,
        sides: i32,
        start_angle: f64,
        diameter: f64,
        freq: f64,
        colour: Colour,
        opts: &PolygonOpts,
    ) -> Vec<NodeId> {
        let dims = self.dims_of(parent);
        let mut nodes = Vec::new();
        let mut angle = start_angle;
        let mut colour = colour;
        let levels = opts.levels.saturating_sub(1);
        let mut rotation_adj = 0i32;
        let sides = sides.max(0);
        let angle_incr = if sides > 0 { 360.0 / sides as f64 } else { 0.0 };
        for vertex in 0..sides {
            let node = OscillatorNode::new(
                &format!("{}{}_{}", name, levels, vertex + 1),
                dims,
                diameter,
                colour,
                [freq, freq],
                [angle, 0.0],
            );
            let id = self.add_node(parent, node);
            if opts.colour_step {
                colour = step_colour(colour, [-11, -50, -30], 60);
            }
            if levels > 0 {
                let next_sides = sides + opts.side_delta + rotation_adj;
                let next_opts = if opts.crystal {
                    // freeze the factors below the current level
                    PolygonOpts { levels, ..Default::default() }
                } else {
                    PolygonOpts { levels, colour_step: false, ..*opts }
                };
                self.add_polygon(
                    id,
                    name,
                    next_sides,
                    start_angle,
                    diameter,
                    freq * opts.freq_factor,
                    colour,
                    &next_opts,
                );
            }
            angle += angle_incr;
            rotation_adj += opts.rotation_delta;
            nodes.push(id);
        }
        if nodes.is_empty() { vec![parent] } else { nodes }
    }

    pub fn add_singularity(
        &mut self,
        parent: NodeId,
        start_angle: f64,
        diameter: f64,
        freq: f64,
        colour: Colour,
    ) -> Vec<NodeId> {
        self.add_polygon(parent, "Singularity", 1, start_angle, diameter, freq, colour, &PolygonOpts::default())
    }

    pub fn add_circle(
        &mut self,
        parent: NodeId,
        start_angle: f64,
        diameter: f64,
        freq: f64,
        colour: Colour,
    ) -> Vec<NodeId> {
        self.add_polygon(parent, "Circle", 1, start_angle, diameter, freq, colour, &PolygonOpts::default())
    }

    pub fn add_dipole(
        &mut self,
        parent: NodeId,
        start_angle: f64,
        diameter: f64,
        freq: f64,
        colour: Colour,
        opts: &PolygonOpts,
    ) -> Vec<NodeId> {
        self.add_polygon(parent, "Dipole", 2, start_angle, diameter, freq, colour, opts)
    }

    pub fn add_triangle(
        &mut self,
        parent: NodeId,
        start_angle: f64,
        diameter: f64,
        freq: f64,
        colour: Colour,
        opts: &PolygonOpts,
    ) -> Vec<NodeId> {
        self.add_polygon(parent, "Triangle", 3, start_angle, diameter, freq, colour, opts)
    }

    pub fn add_square(
        &mut self,
        parent: NodeId,
        start_angle: f64,
        diameter: f64,
        freq: f64,
        colour: Colour,
        opts: &PolygonOpts,
    ) -> Vec<NodeId> {
        self.add_polygon(parent, "Square", 4, start_angle, diameter, freq, colour, opts)
    }

    pub fn add_pentagon(
        &mut self,
        parent: NodeId,
        start_angle: f64,
        diameter: f64,
        freq: f64,
        colour: Colour,
        opts: &PolygonOpts,
    ) -> Vec<NodeId> {
        self.add_polygon(parent, "Pentagon", 5, start_angle, diameter, freq, colour, opts)
    }

    pub fn add_hexagon(
        &mut self,
        parent: NodeId,
        start_angle: f64,
        diameter: f64,
        freq: f64,
        colour: Colour,
        opts: &PolygonOpts,
    ) -> Vec<NodeId> {
        self.add_polygon(parent, "Hexagon", 6, start_angle, diameter, freq, colour, opts)
    }

    pub fn add_heptagon(
        &mut self,
        parent: NodeId,
        start_angle: f64,
        diameter: f64,
        freq: f64,
        colour: Colour,
        opts: &PolygonOpts,
    ) -> Vec<NodeId> {
        self.add_polygon(parent, "Heptagon", 7, start_angle, diameter, freq, colour, opts)
    }

    /// Two arbitrary singularity points on the same circle, defined by
    /// their angles.
    pub fn add_line(
        &mut self,
        parent: NodeId,
        angle1: f64,
        angle2: f64,
        diameter: f64,
        freq: f64,
        colour: Colour,
    ) -> (NodeId, NodeId) {
        let dims = self.dims_of(parent);
        let a = self.add_node(
            parent,
            OscillatorNode::new("LineA", dims, diameter, colour, [freq, freq], [angle1, 0.0]),
        );
        let b = self.add_node(
            parent,
            OscillatorNode::new("LineB", dims, diameter, colour, [freq, freq], [angle2, 0.0]),
        );
        (a, b)
    }

    fn add_swirl(
        &mut self,
        parent: NodeId,
        name: &str,
        angle: f64,
        diameter: f64,
        freq: f64,
        colour: Colour,
        motion: MotionMode,
    ) -> NodeId {
        let dims = self.dims_of(parent);
        let mut node =
            OscillatorNode::new(name, dims, diameter, colour, [freq, freq], [angle, 0.0]);
        node.motion = motion;
        self.add_node(parent, node)
    }

    pub fn add_spiral(
        &mut self,
        parent: NodeId,
        angle: f64,
        diameter: f64,
        freq: f64,
        colour: Colour,
        rate: f64,
        shape: SpiralShape,
        rotations: f64,
    ) -> NodeId {
        self.add_swirl(parent, "Spiral", angle, diameter, freq, colour, MotionMode::Spiral {
            rate,
            shape,
            rotations,
        })
    }

    pub fn add_linear(
        &mut self,
        parent: NodeId,
        angle: f64,
        diameter: f64,
        freq: f64,
        colour: Colour,
        shape: SpiralShape,
        rotations: f64,
    ) -> NodeId {
        self.add_swirl(parent, "Linear", angle, diameter, freq, colour, MotionMode::Linear {
            shape,
            rotations,
        })
    }

    /// Constant-radius angular sweep: a straight arm swinging about the
    /// parent.
    pub fn add_pendulum(
        &mut self,
        parent: NodeId,
        angle: f64,
        diameter: f64,
        freq: f64,
        colour: Colour,
        shape: SpiralShape,
        rotations: f64,
    ) -> NodeId {
        self.add_swirl(parent, "Pendulum", angle, diameter, freq, colour, MotionMode::Pendulum {
            shape,
            rotations,
        })
    }

    pub fn add_angle(
        &mut self,
        parent: NodeId,
        angle: f64,
        diameter: f64,
        freq: f64,
        colour: Colour,
        shape: SpiralShape,
        rotations: f64,
        angle_offset: f64,
    ) -> NodeId {
        self.add_swirl(parent, "Angle", angle, diameter, freq, colour, MotionMode::Angle {
            shape,
            rotations,
            offset: 180.0 - angle_offset,
        })
    }

    pub fn add_corner(
        &mut self,
        parent: NodeId,
        angle: f64,
        diameter: f64,
        freq: f64,
        colour: Colour,
        shape: SpiralShape,
        rotations: f64,
    ) -> NodeId {
        self.add_swirl(parent, "Corner", angle, diameter, freq, colour, MotionMode::Corner {
            shape,
            rotations,
        })
    }

    /// Shape dispatch by name, for callers wiring construction to text
    /// input. Unrecognized names fail without touching the tree.
    pub fn add_shape(
        &mut self,
        parent: NodeId,
        kind: &str,
        size: f64,
        freq: f64,
        colour: Colour,
    ) -> Result<Vec<NodeId>, GrammarError> {
        let opts = PolygonOpts::default();
        match kind {
            "hexagon" => Ok(self.add_hexagon(parent, 0.0, size, freq, colour, &opts)),
            "pentagon" => Ok(self.add_pentagon(parent, 0.0, size, freq, colour, &opts)),
            "square" => Ok(self.add_square(parent, 0.0, size, freq, colour, &opts)),
            "triangle" => Ok(self.add_triangle(parent, 0.0, size, freq, colour, &opts)),
            "circle" => Ok(self.add_circle(parent, 0.0, size, freq, colour)),
            _ => Err(GrammarError::UnknownShape(kind.to_string())),
        }
    }

    /// Children only on the onsets of the euclidean pattern
    /// E(pulses, steps), rotated by `rotation` slots. Fails before any
    /// node is inserted when the pattern is impossible; zero steps is a
    /// valid empty placement.
    pub fn add_euclidean_rhythm(
        &mut self,
        parent: NodeId,
        name: &str,
        pulses: usize,
        steps: usize,
        rotation: f64,
        diameter: f64,
        freq: f64,
        colour: Colour,
    ) -> Result<Vec<NodeId>, GrammarError> {
        let pattern = euclid::bjorklund(steps, pulses)?;
        if steps == 0 {
            return Ok(Vec::new());
        }
        let dims = self.dims_of(parent);
        let angle_incr = 360.0 / steps as f64;
        let mut angle = angle_incr * rotation;
        let mut nodes = Vec::new();
        for (slot, &beat) in pattern.iter().enumerate() {
            if beat == 1 {
                let node = OscillatorNode::new(
                    &format!("{}{}", name, slot + 1),
                    dims,
                    diameter,
                    colour,
                    [freq, freq],
                    [angle, 0.0],
                );
                nodes.push(self.add_node(parent, node));
            }
            angle += angle_incr;
        }
        Ok(nodes)
    }

    /// Build nested geometry from one flat integer list. The head of
    /// the list is this node's fan-out; every new child then consumes
    /// the *same* remaining list for its own fan-out, a branch
    /// terminating where a popped value is zero. The shared-queue
    /// consumption order is part of the format: encodings are only
    /// meaningful against this exact traversal.
    pub fn add_polygon_list(
        &mut self,
        parent: NodeId,
        name: &str,
        list: &[i32],
        start_angle: f64,
        diameter: f64,
        freq: f64,
        colour: Colour,
        freq_factor: f64,
        random_colour: bool,
        rng: &mut impl Rng,
    ) -> Vec<NodeId> {
        let mut queue: VecDeque<i32> = list.iter().copied().collect();
        self.polygon_list_inner(
            parent,
            name,
            &mut queue,
            start_angle,
            diameter,
            freq,
            colour,
            freq_factor,
            random_colour,
            rng,
        )
    }

    fn polygon_list_inner(
        &mut self,
        parent: NodeId,
        name: &str,
        queue: &mut VecDeque<i32>,
        start_angle: f64,
        diameter: f64,
        freq: f64,
        colour: Colour,
        freq_factor: f64,
        random_colour: bool,
        rng: &mut impl Rng,
    ) -> Vec<NodeId> {
        let list_len = queue.len();
        let Some(head) = queue.pop_front() else { return Vec::new() };
        let dims = self.dims_of(parent);
        let sides = head.max(0);
        let angle_incr = if sides > 0 { 360.0 / sides as f64 } else { 0.0 };
        let mut angle = start_angle;
        let mut colour = colour;
        let mut nodes = Vec::new();
        for vertex in 0..sides {
            if random_colour {
                colour = rand_colour([100, 0, 150], [255, 0, 255], rng);
            }
            let node = OscillatorNode::new(
                &format!("{}{}_{}", name, list_len, vertex + 1),
                dims,
                diameter,
                colour,
                [freq, freq],
                [angle, 0.0],
            );
            let id = self.add_node(parent, node);
            self.polygon_list_inner(
                id,
                name,
                queue,
                start_angle,
                diameter,
                freq * freq_factor,
                colour,
                freq_factor,
                random_colour,
                rng,
            );
            angle += angle_incr;
            nodes.push(id);
        }
        nodes
    }

    /// Place spherical children at explicit (theta, phi) angles in
    /// degrees, offset per axis. Vertex sets for platonic-style figures
    /// come in through here.
    pub fn add_sphere_points(
        &mut self,
        parent: NodeId,
        name: &str,
        points: &[[f64; 2]],
        diameter: f64,
        freq: [f64; 2],
        colour: Colour,
        offset: [f64; 2],
    ) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        for (i, point) in points.iter().enumerate() {
            let node = OscillatorNode::new(
                &format!("{}{}", name, i),
                Dims::Spherical,
                diameter,
                colour,
                freq,
                [point[0] + offset[0], point[1] + offset[1]],
            );
            nodes.push(self.add_node(parent, node));
        }
        nodes
    }
}
