//! Color blending.

use nodevm_core::{Float3, Float4};

/// Blend modes of `MIX_RGB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Blend,
    Add,
    Multiply,
    Subtract,
    Screen,
    Divide,
    Difference,
    Darken,
    Lighten,
    Overlay,
    Dodge,
    Burn,
    Hue,
    Saturation,
    Value,
    Color,
    SoftLight,
    LinearLight,
}

impl BlendMode {
    /// Decode a mode constant. Unknown modes leave the first color unchanged.
    pub fn from_i32(mode: i32) -> Option<BlendMode> {
        use BlendMode::*;
        const MODES: [BlendMode; 18] = [
            Blend, Add, Multiply, Subtract, Screen, Divide, Difference, Darken, Lighten, Overlay,
            Dodge, Burn, Hue, Saturation, Value, Color, SoftLight, LinearLight,
        ];
        usize::try_from(mode).ok().and_then(|i| MODES.get(i).copied())
    }
}

pub fn rgb_to_hsv(rgb: Float3) -> Float3 {
    let (r, g, b) = (rgb.x, rgb.y, rgb.z);
    let cmax = r.max(g).max(b);
    let cmin = r.min(g).min(b);
    let delta = cmax - cmin;
    let v = cmax;
    let s = if cmax != 0.0 { delta / cmax } else { 0.0 };
    if s == 0.0 {
        return Float3::new(0.0, 0.0, v);
    }
    let c = Float3::new((cmax - r) / delta, (cmax - g) / delta, (cmax - b) / delta);
    let mut h = if r == cmax {
        c.z - c.y
    } else if g == cmax {
        2.0 + c.x - c.z
    } else {
        4.0 + c.y - c.x
    };
    h /= 6.0;
    if h < 0.0 {
        h += 1.0;
    }
    Float3::new(h, s, v)
}

pub fn hsv_to_rgb(hsv: Float3) -> Float3 {
    let (h, s, v) = (hsv.x, hsv.y, hsv.z);
    if s == 0.0 {
        return Float3::splat(v);
    }
    let h = if h == 1.0 { 0.0 } else { h } * 6.0;
    let i = h.floor();
    let f = h - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match i as i32 {
        0 => Float3::new(v, t, p),
        1 => Float3::new(q, v, p),
        2 => Float3::new(p, v, t),
        3 => Float3::new(p, q, v),
        4 => Float3::new(t, p, v),
        _ => Float3::new(v, p, q),
    }
}

fn per_channel(a: Float3, b: Float3, f: impl Fn(f32, f32) -> f32) -> Float3 {
    Float3::new(f(a.x, b.x), f(a.y, b.y), f(a.z, b.z))
}

/// Blend two RGB colors.
pub fn mix_rgb3(mode: i32, fac: f32, a: Float3, b: Float3) -> Float3 {
    let facm = 1.0 - fac;
    let Some(mode) = BlendMode::from_i32(mode) else {
        return a;
    };
    match mode {
        BlendMode::Blend => per_channel(a, b, |a, b| facm * a + fac * b),
        BlendMode::Add => per_channel(a, b, |a, b| a + fac * b),
        BlendMode::Multiply => per_channel(a, b, |a, b| a * (facm + fac * b)),
        BlendMode::Subtract => per_channel(a, b, |a, b| a - fac * b),
        BlendMode::Screen => {
            per_channel(a, b, |a, b| 1.0 - (facm + fac * (1.0 - b)) * (1.0 - a))
        }
        BlendMode::Divide => per_channel(a, b, |a, b| {
            if b != 0.0 { facm * a + fac * a / b } else { a }
        }),
        BlendMode::Difference => per_channel(a, b, |a, b| facm * a + fac * (a - b).abs()),
        BlendMode::Darken => per_channel(a, b, |a, b| a.min(b) * fac + a * facm),
        BlendMode::Lighten => per_channel(a, b, |a, b| a.max(fac * b)),
        BlendMode::Overlay => per_channel(a, b, |a, b| {
            if a < 0.5 {
                a * (facm + 2.0 * fac * b)
            } else {
                1.0 - (facm + 2.0 * fac * (1.0 - b)) * (1.0 - a)
            }
        }),
        BlendMode::Dodge => per_channel(a, b, |a, b| {
            if a == 0.0 {
                return a;
            }
            let tmp = 1.0 - fac * b;
            if tmp <= 0.0 { 1.0 } else { (a / tmp).min(1.0) }
        }),
        BlendMode::Burn => per_channel(a, b, |a, b| {
            let tmp = facm + fac * b;
            if tmp <= 0.0 {
                0.0
            } else {
                (1.0 - (1.0 - a) / tmp).clamp(0.0, 1.0)
            }
        }),
        BlendMode::Hue => {
            let col = rgb_to_hsv(b);
            if col.y == 0.0 {
                return a;
            }
            let r = rgb_to_hsv(a);
            let tmp = hsv_to_rgb(Float3::new(col.x, r.y, r.z));
            a * facm + tmp * fac
        }
        BlendMode::Saturation => {
            let r = rgb_to_hsv(a);
            if r.y == 0.0 {
                return a;
            }
            let col = rgb_to_hsv(b);
            hsv_to_rgb(Float3::new(r.x, facm * r.y + fac * col.y, r.z))
        }
        BlendMode::Value => {
            let r = rgb_to_hsv(a);
            let col = rgb_to_hsv(b);
            hsv_to_rgb(Float3::new(r.x, r.y, facm * r.z + fac * col.z))
        }
        BlendMode::Color => {
            let col = rgb_to_hsv(b);
            if col.y == 0.0 {
                return a;
            }
            let r = rgb_to_hsv(a);
            let tmp = hsv_to_rgb(Float3::new(col.x, col.y, r.z));
            a * facm + tmp * fac
        }
        BlendMode::SoftLight => per_channel(a, b, |a, b| {
            let screen = 1.0 - (1.0 - b) * (1.0 - a);
            facm * a + fac * ((1.0 - a) * b * a + a * screen)
        }),
        BlendMode::LinearLight => per_channel(a, b, |a, b| {
            if b > 0.5 {
                a + fac * (2.0 * (b - 0.5))
            } else {
                a + fac * (2.0 * b - 1.0)
            }
        }),
    }
}

/// Blend two RGBA colors; alpha is taken from the first.
pub fn mix_rgb(mode: i32, fac: f32, a: Float4, b: Float4) -> Float4 {
    let rgb = mix_rgb3(mode, fac, a.xyz(), b.xyz());
    Float4::new(rgb.x, rgb.y, rgb.z, a.w)
}
