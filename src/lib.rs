pub mod audio;
pub mod bond;
pub mod colour;
pub mod euclid;
pub mod grammar;
pub mod node;
pub mod sonic;
pub mod symmetry;
pub mod tree;
pub mod trig;
pub mod visualizer;

pub use audio::{AudioOutput, midi_to_hz};
pub use bond::{Bond, BondSet};
pub use colour::Colour;
pub use euclid::{bjorklund, form_string, rhythm_string};
pub use grammar::{GrammarError, PolygonOpts};
pub use node::{Dims, MotionMode, NodeId, OscillatorNode, SpiralShape, Vec3};
pub use sonic::{CursorMode, NoteEvent, SonicEngine};
pub use symmetry::{SymmetrySettings, break_symmetry, is_prime};
pub use tree::{FrameStats, SimulationState, Tree, TreeStats};
pub use visualizer::Visualizer;
