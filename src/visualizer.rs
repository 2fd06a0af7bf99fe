use minifb::{Key, KeyRepeat, Window, WindowOptions};

use crate::colour::{Colour, pack};
use crate::node::Vec3;
use crate::sonic::NoteEvent;
use crate::tree::Tree;

pub const WIDTH: usize = 900;
pub const HEIGHT: usize = 900;

const BACKGROUND: u32 = 0x000010;

// Simple 3x5 pixel font
fn draw_char(buffer: &mut [u32], x: usize, y: usize, ch: char, color: u32) {
    let pattern: &[u8] = match ch {
        '0' => &[0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => &[0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => &[0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => &[0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => &[0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => &[0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => &[0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => &[0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => &[0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => &[0b111, 0b101, 0b111, 0b001, 0b111],
        '.' => &[0b000, 0b000, 0b000, 0b000, 0b010],
        '-' => &[0b000, 0b000, 0b111, 0b000, 0b000],
        ':' => &[0b000, 0b010, 0b000, 0b010, 0b000],
        ' ' => &[0b000, 0b000, 0b000, 0b000, 0b000],
        'a' => &[0b111, 0b101, 0b111, 0b101, 0b101],
        'b' => &[0b110, 0b101, 0b110, 0b101, 0b110],
        'c' => &[0b111, 0b100, 0b100, 0b100, 0b111],
        'd' => &[0b110, 0b101, 0b101, 0b101, 0b110],
        'e' => &[0b111, 0b100, 0b111, 0b100, 0b111],
        'f' => &[0b111, 0b100, 0b111, 0b100, 0b100],
        'i' => &[0b111, 0b010, 0b010, 0b010, 0b111],
        'l' => &[0b100, 0b100, 0b100, 0b100, 0b111],
        'm' => &[0b101, 0b111, 0b111, 0b101, 0b101],
        'n' => &[0b101, 0b111, 0b111, 0b111, 0b101],
        'o' => &[0b111, 0b101, 0b101, 0b101, 0b111],
        'p' => &[0b111, 0b101, 0b111, 0b100, 0b100],
        'r' => &[0b110, 0b101, 0b110, 0b101, 0b101],
        's' => &[0b111, 0b100, 0b111, 0b001, 0b111],
        't' => &[0b111, 0b010, 0b010, 0b010, 0b010],
        'u' => &[0b101, 0b101, 0b101, 0b101, 0b111],
        'v' => &[0b101, 0b101, 0b101, 0b101, 0b010],
        'w' => &[0b101, 0b101, 0b111, 0b111, 0b101],
        _ => &[0b000, 0b000, 0b000, 0b000, 0b000],
    };

    for (dy, &row) in pattern.iter().enumerate() {
        if y + dy >= HEIGHT {
            break;
        }
        for dx in 0..3 {
            if x + dx >= WIDTH {
                break;
            }
            if row & (1 << (2 - dx)) != 0 {
                let idx = (y + dy) * WIDTH + (x + dx);
                buffer[idx] = color;
            }
        }
    }
}

fn draw_text(buffer: &mut [u32], x: usize, y: usize, text: &str, color: u32) {
    let mut offset_x = x;
    for ch in text.chars() {
        if offset_x + 4 >= WIDTH {
            break;
        }
        draw_char(buffer, offset_x, y, ch, color);
        offset_x += 4;
    }
}

fn to_screen(pos: Vec3) -> (f64, f64) {
    (WIDTH as f64 / 2.0 + pos.x, HEIGHT as f64 / 2.0 - pos.y)
}

fn put_pixel(buffer: &mut [u32], x: f64, y: f64, color: u32) {
    if x < 0.0 || y < 0.0 {
        return;
    }
    let (x, y) = (x as usize, y as usize);
    if x < WIDTH && y < HEIGHT {
        buffer[y * WIDTH + x] = color;
    }
}

fn draw_line(buffer: &mut [u32], from: (f64, f64), to: (f64, f64), color: u32) {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0);
    for i in 0..=steps as usize {
        let t = i as f64 / steps;
        put_pixel(buffer, from.0 + dx * t, from.1 + dy * t, color);
    }
}

fn draw_circle_outline(buffer: &mut [u32], centre: (f64, f64), radius: f64, color: u32) {
    if radius < 0.5 {
        return;
    }
    let steps = ((radius * 1.5) as usize).clamp(24, 360);
    for i in 0..steps {
        let a = i as f64 / steps as f64 * std::f64::consts::TAU;
        put_pixel(buffer, centre.0 + radius * a.cos(), centre.1 + radius * a.sin(), color);
    }
}

fn fill_circle(buffer: &mut [u32], centre: (f64, f64), radius: f64, color: u32) {
    let r = radius.max(1.0);
    let ri = r.ceil() as i64;
    for dy in -ri..=ri {
        for dx in -ri..=ri {
            if (dx * dx + dy * dy) as f64 <= r * r {
                put_pixel(buffer, centre.0 + dx as f64, centre.1 + dy as f64, color);
            }
        }
    }
}

fn dim(colour: Colour) -> u32 {
    pack([colour[0] / 3, colour[1] / 3, colour[2] / 3])
}

/// Frame renderer for the oscillator tree: orbit outlines, polygon
/// rings, singularity dots, cursor dots and note-event flashes, with a
/// stats overlay in the corner.
pub struct Visualizer {
    window: Window,
    buffer: Vec<u32>,
}

impl Visualizer {
    pub fn new(title: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let mut window = Window::new(title, WIDTH, HEIGHT, WindowOptions::default())?;
        window.set_target_fps(50);
        Ok(Visualizer { window, buffer: vec![BACKGROUND; WIDTH * HEIGHT] })
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn down(&self, key: Key) -> bool {
        self.window.is_key_down(key)
    }

    pub fn pressed(&self, key: Key) -> bool {
        self.window.is_key_pressed(key, KeyRepeat::No)
    }

    pub fn frame(
        &mut self,
        tree: &Tree,
        events: &[NoteEvent],
        overlay: &[String],
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.buffer.fill(BACKGROUND);

        // orbit outlines first, so everything else draws over them
        for id in tree.live_ids() {
            let Some(node) = tree.get(id) else { continue };
            let centre = match node.parent().and_then(|p| tree.get(p)) {
                Some(parent) => parent.position(),
                None => node.position(),
            };
            draw_circle_outline(
                &mut self.buffer,
                to_screen(centre),
                node.orbit_radius(),
                dim(node.colour),
            );
        }

        for ring in tree.polygon_rings(99) {
            for pair in ring.windows(2) {
                draw_line(&mut self.buffer, to_screen(pair[0]), to_screen(pair[1]), 0x502860);
            }
        }

        for id in tree.live_ids() {
            let Some(node) = tree.get(id) else { continue };
            fill_circle(
                &mut self.buffer,
                to_screen(node.position()),
                node.diameter / 2.0,
                pack(node.colour),
            );
            // blue dot for the sweeping cursor
            fill_circle(&mut self.buffer, to_screen(node.cursor_position()), 2.5, 0x4646FF);
        }

        // red flash where a note fired, sized by how tight the hit was
        for ev in events {
            if let Some(node) = tree.get(ev.node) {
                let r = ((10.0 - ev.overlap) / 1.5).max(3.0);
                fill_circle(&mut self.buffer, to_screen(node.position()), r, 0xF00030);
            }
        }

        for (i, line) in overlay.iter().enumerate() {
            draw_text(&mut self.buffer, 10, 10 + i * 15, line, 0xFFFFFF);
        }

        self.window.update_with_buffer(&self.buffer, WIDTH, HEIGHT)?;
        Ok(())
    }
}
