// Degree-based trigonometry backed by lookup tables.
// Phase state elsewhere in the crate is kept in degrees, so the hot
// path (one sin/cos pair per node per frame) goes through these tables
// rather than converting to radians every call.

use once_cell::sync::Lazy;
use std::f64::consts::PI;

const TABLE_SIZE: usize = 16384;

// atan table covers slopes in [-100, 100]; steeper slopes fall back to
// the library function.
const ATAN_MIN: f64 = -100.0;
const ATAN_MAX: f64 = 100.0;

struct Tables {
    sin: Vec<f64>,
    cos: Vec<f64>,
    atan: Vec<f64>,
}

static TABLES: Lazy<Tables> = Lazy::new(|| {
    let mut sin = Vec::with_capacity(TABLE_SIZE);
    let mut cos = Vec::with_capacity(TABLE_SIZE);
    let mut atan = Vec::with_capacity(TABLE_SIZE);
    let angle_step = 2.0 * PI / TABLE_SIZE as f64;
    let slope_step = (ATAN_MAX - ATAN_MIN) / TABLE_SIZE as f64;
    for i in 0..TABLE_SIZE {
        let a = i as f64 * angle_step;
        sin.push(a.sin());
        cos.push(a.cos());
        atan.push((ATAN_MIN + i as f64 * slope_step).atan());
    }
    Tables { sin, cos, atan }
});

fn angle_index(degrees: f64) -> usize {
    let wrapped = degrees.rem_euclid(360.0);
    ((wrapped / 360.0 * TABLE_SIZE as f64) as usize) % TABLE_SIZE
}

pub fn fast_sin_deg(degrees: f64) -> f64 {
    TABLES.sin[angle_index(degrees)]
}

pub fn fast_cos_deg(degrees: f64) -> f64 {
    TABLES.cos[angle_index(degrees)]
}

/// Table-assisted atan2, returned in radians.
pub fn fast_atan2(y: f64, x: f64) -> f64 {
    if x == 0.0 {
        return if y > 0.0 {
            PI / 2.0
        } else if y < 0.0 {
            -PI / 2.0
        } else {
            0.0
        };
    }
    let slope = y / x;
    let base = if !(ATAN_MIN..=ATAN_MAX).contains(&slope) {
        slope.atan()
    } else {
        let idx = (((slope - ATAN_MIN) / (ATAN_MAX - ATAN_MIN)) * (TABLE_SIZE - 1) as f64) as usize;
        TABLES.atan[idx.min(TABLE_SIZE - 1)]
    };
    // fold the principal value back into the correct quadrant
    if x < 0.0 {
        if y >= 0.0 { base + PI } else { base - PI }
    } else {
        base
    }
}
