// RGB colours carried as opaque payload on every node. The engine never
// interprets them; the renderer and the shell do.

use rand::Rng;

pub type Colour = [u8; 3];

pub const BLACK: Colour = [0, 0, 0];
pub const WHITE: Colour = [255, 255, 255];
pub const GREY: Colour = [127, 127, 127];
pub const DARK_GREY: Colour = [50, 50, 50];
pub const RED: Colour = [255, 0, 0];
pub const GREEN: Colour = [0, 255, 0];
pub const BLUE: Colour = [0, 0, 255];
pub const MAGENTA: Colour = [255, 0, 255];
pub const YELLOW: Colour = [255, 255, 0];
pub const CYAN: Colour = [0, 255, 255];
pub const ORANGE: Colour = [255, 165, 0];
pub const VIOLET: Colour = [190, 100, 155];
pub const INDIGO: Colour = [75, 0, 130];
pub const SEABLUE: Colour = [0, 255, 190];

/// Shift a colour by a signed per-channel delta, wrapping overflowing
/// channels to `wrap` and underflowing ones to 255. Used by the crystal
/// polygon builder to step hues along a ring of vertices.
pub fn step_colour(colour: Colour, delta: [i16; 3], wrap: u8) -> Colour {
    let mut out = colour;
    for i in 0..3 {
        let v = colour[i] as i16 + delta[i];
        out[i] = if v > 255 {
            wrap
        } else if v < 0 {
            255
        } else {
            v as u8
        };
    }
    out
}

/// Random colour with each channel drawn from `[min[i], max[i]]`.
pub fn rand_colour(min: Colour, max: Colour, rng: &mut impl Rng) -> Colour {
    let mut out = [0u8; 3];
    for i in 0..3 {
        out[i] = if min[i] >= max[i] {
            min[i]
        } else {
            rng.gen_range(min[i]..=max[i])
        };
    }
    out
}

/// Pack to the 0RGB u32 layout the framebuffer wants.
pub fn pack(colour: Colour) -> u32 {
    ((colour[0] as u32) << 16) | ((colour[1] as u32) << 8) | colour[2] as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_step_colour_wraps() {
        assert_eq!(step_colour([250, 10, 0], [10, -20, 0], 60), [60, 255, 0]);
        assert_eq!(step_colour([10, 10, 10], [5, 5, 5], 60), [15, 15, 15]);
    }

    #[test]
    fn test_rand_colour_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let c = rand_colour([100, 0, 150], [255, 0, 255], &mut rng);
            assert!(c[0] >= 100);
            assert_eq!(c[1], 0);
            assert!(c[2] >= 150);
        }
    }

    #[test]
    fn test_pack_layout() {
        assert_eq!(pack([255, 0, 0]), 0xFF0000);
        assert_eq!(pack([0, 255, 0]), 0x00FF00);
        assert_eq!(pack([1, 2, 3]), 0x010203);
    }
}
