use minifb::Key;
use rand::Rng;
use rand::rngs::ThreadRng;

use orrery::colour::{CYAN, DARK_GREY, INDIGO, MAGENTA, ORANGE, SEABLUE, VIOLET, YELLOW};
use orrery::{
    AudioOutput, Bond, BondSet, PolygonOpts, SimulationState, SonicEngine, SpiralShape,
    SymmetrySettings, Tree, Visualizer, break_symmetry, euclid,
};

const STATE_FILE: &str = "orrery_state.bin";
const STATS_FILE: &str = "orrery_stats.json";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n╭──────────────────────────────────────────────╮");
    println!("│        orrery — nested phase oscillators     │");
    println!("│                                              │");
    println!("│ 1-4    select demo                           │");
    println!("│ space  pause        r      reverse           │");
    println!("│ up/dn  speed        c      reset phases      │");
    println!("│ b      bond coupling on/off                  │");
    println!("│ n      symmetry breaking on/off              │");
    println!("│ a      audio on/off                          │");
    println!("│ t      print tree + geometry text            │");
    println!("│ j      dump stats json                       │");
    println!("│ w / l  save / load state                     │");
    println!("│ esc    quit                                  │");
    println!("╰──────────────────────────────────────────────╯\n");

    let mut rng = rand::thread_rng();
    let mut demo = 1usize;
    let (mut tree, mut bonds) = build_demo(demo, &mut rng)?;

    let mut state = SimulationState { speed: 0.3, ..Default::default() };
    let sonic = SonicEngine::default();
    let symmetry = SymmetrySettings::default();
    let mut viz = Visualizer::new("Orrery — nested phase oscillators")?;
    let mut audio: Option<AudioOutput> = None;
    let mut bonds_enabled = true;
    let mut mutate_enabled = false;

    while viz.is_open() && !viz.down(Key::Escape) {
        for (key, pick) in
            [(Key::Key1, 1), (Key::Key2, 2), (Key::Key3, 3), (Key::Key4, 4)]
        {
            if viz.pressed(key) && pick != demo {
                demo = pick;
                (tree, bonds) = build_demo(demo, &mut rng)?;
            }
        }
        if viz.pressed(Key::Space) {
            state.paused = !state.paused;
        }
        if viz.pressed(Key::R) {
            state.reverse = !state.reverse;
        }
        if viz.down(Key::Up) {
            state.speed *= 1.05;
        }
        if viz.down(Key::Down) {
            state.speed /= 1.05;
        }
        if viz.pressed(Key::C) {
            tree.reset_phases(99);
        }
        if viz.pressed(Key::B) {
            bonds_enabled = !bonds_enabled;
        }
        if viz.pressed(Key::N) {
            mutate_enabled = !mutate_enabled;
        }
        if viz.pressed(Key::A) {
            audio = match audio {
                Some(_) => None,
                None => match AudioOutput::new() {
                    Ok(out) => Some(out),
                    Err(e) => {
                        println!("audio error: {}", e);
                        None
                    }
                },
            };
        }
        if viz.pressed(Key::T) {
            print!("{}", tree.tree_diagram());
            println!("geometry: {}\n", tree.gml_to_text(100));
        }
        if viz.pressed(Key::J) {
            let json = serde_json::to_string_pretty(&tree.stats(100))?;
            std::fs::write(STATS_FILE, json)?;
            println!("stats written to {}", STATS_FILE);
        }
        if viz.pressed(Key::W) {
            match tree.save(STATE_FILE) {
                Ok(()) => println!("saved {} oscillators to {}", tree.oscillator_count(), STATE_FILE),
                Err(e) => println!("save error: {}", e),
            }
        }
        if viz.pressed(Key::L) {
            match Tree::load(STATE_FILE) {
                Ok(loaded) => {
                    println!("loaded {} oscillators from {}", loaded.oscillator_count(), STATE_FILE);
                    tree = loaded;
                    bonds.clear();
                }
                Err(e) => println!("load error: {}", e),
            }
        }

        // one frame: integrate, then the opt-in layers, then events
        let frame = tree.update(&state, 99);
        if bonds_enabled {
            bonds.update_all(&mut tree);
        }
        if mutate_enabled {
            let root = tree.root();
            break_symmetry(&mut tree, &mut bonds, root, 8, &symmetry, &mut rng);
        }
        let events = sonic.collect_events(&mut tree);
        if let Some(out) = &audio {
            out.play(&events);
        }

        let overlay = [
            format!("demo: {}  osc: {}  run: {}", demo, tree.oscillator_count(), frame.visited),
            format!(
                "speed: {:.2}  {}{}",
                state.speed,
                if state.paused { "paused " } else { "" },
                if state.reverse { "reverse" } else { "" },
            ),
            format!(
                "bonds: {} {}  mutate: {}  audio: {}",
                bonds.len(),
                if bonds_enabled { "on" } else { "off" },
                if mutate_enabled { "on" } else { "off" },
                if audio.is_some() { "on" } else { "off" },
            ),
            format!("events: {}", events.len()),
        ];
        viz.frame(&tree, &events, &overlay)?;
    }
    Ok(())
}

fn build_demo(demo: usize, rng: &mut ThreadRng) -> Result<(Tree, BondSet), Box<dyn std::error::Error>> {
    match demo {
        2 => euclidean_demo(),
        3 => spiral_demo(),
        4 => phase_locking_demo(rng),
        _ => crystal_demo(),
    }
}

/// Nested hexagon crystal, sides shrinking and colour stepping per level.
fn crystal_demo() -> Result<(Tree, BondSet), Box<dyn std::error::Error>> {
    let mut tree = Tree::new_bindu();
    let root = tree.root();
    tree.add_hexagon(root, 0.0, 9.0, 170.0, ORANGE, &PolygonOpts {
        levels: 3,
        freq_factor: 0.42,
        side_delta: -1,
        colour_step: true,
        ..Default::default()
    });
    println!("crystal geometry: {}", tree.gml_to_text(100));
    Ok((tree, BondSet::new()))
}

/// Two stacked euclidean rhythms: a tresillo ring whose onsets each
/// carry a five-over-thirteen ring of their own.
fn euclidean_demo() -> Result<(Tree, BondSet), Box<dyn std::error::Error>> {
    let mut tree = Tree::new_bindu();
    let root = tree.root();
    let onsets = tree.add_euclidean_rhythm(root, "E38_", 3, 8, 0.0, 9.0, 200.0, MAGENTA)?;
    print_rhythm("E38", 3, 8);
    for &onset in &onsets {
        tree.add_euclidean_rhythm(onset, "E513_", 5, 13, 0.0, 6.0, 62.0, CYAN)?;
    }
    print_rhythm("E513", 5, 13);
    // a rotated backbeat ring around the same centre
    tree.add_euclidean_rhythm(root, "E316_", 3, 16, 2.0, 7.0, 330.0, SEABLUE)?;
    print_rhythm("E316", 3, 16);
    Ok((tree, BondSet::new()))
}

fn print_rhythm(name: &str, pulses: usize, steps: usize) {
    if let Ok(pattern) = euclid::bjorklund(steps, pulses) {
        println!(
            "Euclidean Rhythm Pattern {:8}: {:>10} = {}",
            name,
            euclid::form_string(pulses, steps),
            euclid::rhythm_string(&pattern)
        );
    }
}

/// The whole non-circular motion family on one root.
fn spiral_demo() -> Result<(Tree, BondSet), Box<dyn std::error::Error>> {
    let mut tree = Tree::new_bindu();
    let root = tree.root();
    tree.add_spiral(root, 0.0, 8.0, 210.0, VIOLET, 3.0, SpiralShape::Triangle, 1.0);
    tree.add_spiral(root, 90.0, 8.0, 160.0, SEABLUE, 2.0, SpiralShape::Fold, 0.0);
    tree.add_linear(root, 45.0, 8.0, 120.0, YELLOW, SpiralShape::Fraction, 2.0);
    let pendulum = tree.add_pendulum(root, 180.0, 9.0, 260.0, ORANGE, SpiralShape::Triangle, 0.0);
    tree.add_triangle(pendulum, 0.0, 6.0, 55.0, CYAN, &PolygonOpts::default());
    tree.add_angle(root, 270.0, 8.0, 180.0, MAGENTA, SpiralShape::Triangle, 0.0, 45.0);
    tree.add_corner(root, 315.0, 8.0, 140.0, INDIGO, SpiralShape::Triangle, 0.0);
    Ok((tree, BondSet::new()))
}

/// Prime-frequency singularities with nested triangles and squares,
/// randomly cross-bonded so the set phase-locks when coupling runs.
fn phase_locking_demo(rng: &mut ThreadRng) -> Result<(Tree, BondSet), Box<dyn std::error::Error>> {
    let primes = [2i64, 3, 5, 7, 11, 13, 17, 19];
    let colours = [ORANGE, INDIGO, VIOLET, YELLOW, SEABLUE];

    let mut tree = Tree::new_bindu();
    let root = tree.root();
    let mut singularities = Vec::new();
    for &p in &primes {
        let angle = rng.gen_range(-180.0..180.0);
        let ring = tree.add_singularity(root, angle, 8.0, 170.0 + 3.0 * p as f64, DARK_GREY);
        let anchor = ring[0];
        singularities.push(anchor);
        let colour = colours[rng.gen_range(0..colours.len())];
        let corners = tree.add_triangle(
            anchor,
            rng.gen_range(-180.0..180.0),
            8.0,
            52.0,
            colour,
            &PolygonOpts::default(),
        );
        for corner in corners {
            singularities.push(corner);
            let squares = tree.add_square(
                corner,
                rng.gen_range(-180.0..180.0),
                6.0,
                20.0,
                colour,
                &PolygonOpts::default(),
            );
            singularities.extend(squares);
        }
    }

    let mut bonds = BondSet::new();
    for i in 0..singularities.len() {
        for j in (i + 1)..singularities.len() {
            if rng.r#gen::<f64>() < 0.5 {
                bonds.add(Bond::with_coupling(singularities[i], singularities[j], 0.0002));
            }
        }
    }
    println!("created bonds: {}", bonds.len());
    println!("geometry: {}", tree.gml_to_text(100));
    Ok((tree, bonds))
}
