// Helper utilities: clock, clamping, color math, Gaussian density
use glam::Vec3;
use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Milliseconds on the client's monotonic clock (first call is zero).
pub fn now() -> f64 {
    EPOCH.get_or_init(Instant::now).elapsed().as_secs_f64() * 1000.0
}

/// Client clock values are ms; the server reads motion timestamps in seconds.
pub fn wire_seconds(ms: f64) -> f64 {
    ms / 1000.0
}

/// Linear interpolation between two values
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Clamp without panicking when `min > max`; `min` wins, like `Math.max(min, Math.min(max, v))`.
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    min.max(max.min(value))
}

/// Integer form of [`clamp`], used for window offsets.
pub fn clamp_i32(value: i32, min: i32, max: i32) -> i32 {
    min.max(max.min(value))
}

/// Parse `#rgb` / `#rrggbb` (leading `#` optional) into 0..1 components.
pub fn hex_to_rgb(hex: &str) -> Option<Vec3> {
    let hex = hex.trim().trim_start_matches('#');
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };
    let channel = |i: usize| {
        expanded
            .get(i..i + 2)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .map(|v| v as f32 / 255.0)
    };
    Some(Vec3::new(channel(0)?, channel(2)?, channel(4)?))
}

/// Blend between two colors; `t = 1` yields `start`, `t = 0` yields `end`.
pub fn rgb_on_scale(start: Vec3, end: Vec3, t: f32) -> Vec3 {
    Vec3::new(
        lerp(end.x, start.x, t),
        lerp(end.y, start.y, t),
        lerp(end.z, start.z, t),
    )
}

fn rgb_to_hsl(c: Vec3) -> Vec3 {
    let max = c.max_element();
    let min = c.min_element();
    let l = (max + min) / 2.0;
    if max == min {
        return Vec3::new(0.0, 0.0, l);
    }
    let d = max - min;
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
    let h = if max == c.x {
        (c.y - c.z) / d + if c.y < c.z { 6.0 } else { 0.0 }
    } else if max == c.y {
        (c.z - c.x) / d + 2.0
    } else {
        (c.x - c.y) / d + 4.0
    };
    Vec3::new(h / 6.0, s, l)
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

fn hsl_to_rgb(hsl: Vec3) -> Vec3 {
    let (h, s, l) = (hsl.x, hsl.y, hsl.z);
    if s == 0.0 {
        return Vec3::splat(l);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    Vec3::new(
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    )
}

/// Scale HSL saturation down by `ratio` (0 = unchanged, 1 = grey).
pub fn desaturate(color: Vec3, ratio: f32) -> Vec3 {
    let mut hsl = rgb_to_hsl(color);
    hsl.y *= 1.0 - ratio.clamp(0.0, 1.0);
    hsl_to_rgb(hsl)
}

/// Zero-mean normal distribution parameterised by its variance.
#[derive(Debug, Clone, Copy)]
pub struct Gaussian {
    variance: f64,
}

impl Gaussian {
    pub fn new(variance: f64) -> Self {
        Self { variance }
    }

    pub fn pdf(&self, x: f64) -> f64 {
        let norm = 1.0 / (2.0 * std::f64::consts::PI * self.variance).sqrt();
        norm * (-(x * x) / (2.0 * self.variance)).exp()
    }
}
