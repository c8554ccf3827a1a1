//! Guarded scalar math and hashing.
//!
//! Arithmetic never traps during evaluation: every operation with a domain
//! restriction returns 0 outside of it, and the guarded operations collapse
//! non-finite results to 0 as well.

use nodevm_core::{Float3, Matrix44};

#[inline]
fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() { v } else { 0.0 }
}

/// `a / b`, or 0 when `b` is zero.
#[inline]
pub fn div_safe(a: f32, b: f32) -> f32 {
    if b != 0.0 { finite_or_zero(a / b) } else { 0.0 }
}

/// Float remainder, or 0 when `b` is zero.
#[inline]
pub fn modulo_safe(a: f32, b: f32) -> f32 {
    if b != 0.0 { finite_or_zero(a % b) } else { 0.0 }
}

/// `a^b`, or 0 for a negative base.
#[inline]
pub fn pow_safe(a: f32, b: f32) -> f32 {
    if a >= 0.0 { finite_or_zero(a.powf(b)) } else { 0.0 }
}

/// Logarithm of `a` to base `b`, or 0 for negative operands.
#[inline]
pub fn log_safe(a: f32, b: f32) -> f32 {
    if a >= 0.0 && b >= 0.0 {
        finite_or_zero(a.ln() / b.ln())
    } else {
        0.0
    }
}

#[inline]
pub fn sqrt_safe(a: f32) -> f32 {
    if a > 0.0 { a.sqrt() } else { 0.0 }
}

/// Half-up rounding.
#[inline]
pub fn round(a: f32) -> f32 {
    (a + 0.5).floor()
}

#[inline]
pub fn clamp_one(a: f32) -> f32 {
    a.clamp(0.0, 1.0)
}

pub fn div_float3(a: Float3, b: Float3) -> Float3 {
    Float3::new(div_safe(a.x, b.x), div_safe(a.y, b.y), div_safe(a.z, b.z))
}

pub fn div_float3_float(a: Float3, b: f32) -> Float3 {
    a.map(|v| div_safe(v, b))
}

pub fn average_float3(a: Float3, b: Float3) -> Float3 {
    (a + b) * 0.5
}

pub fn div_matrix44_float(m: &Matrix44, b: f32) -> Matrix44 {
    let s = div_safe(1.0, b);
    m.map(|v| v * s)
}

/// Inverse, or the identity for a singular matrix.
pub fn invert_safe(m: &Matrix44) -> Matrix44 {
    m.invert().unwrap_or(Matrix44::IDENTITY)
}

/// `start + index * step`. The `end` bound is informational: the iteration
/// count is decided by the enclosing kernel.
pub fn range_int(index: i32, start: i32, step: i32) -> i32 {
    start.wrapping_add(index.wrapping_mul(step))
}

// ----------------------------------------------------------------------------
// Hashing
// ----------------------------------------------------------------------------

/// Bob Jenkins' lookup3 final mix of two words.
pub fn hash_int_2d(kx: u32, ky: u32) -> u32 {
    let mut a = 0xdead_beef_u32.wrapping_add(2 << 2).wrapping_add(13);
    let mut b = a;
    let mut c = a;
    a = a.wrapping_add(kx);
    b = b.wrapping_add(ky);

    c ^= b;
    c = c.wrapping_sub(b.rotate_left(14));
    a ^= c;
    a = a.wrapping_sub(c.rotate_left(11));
    b ^= a;
    b = b.wrapping_sub(a.rotate_left(25));
    c ^= b;
    c = c.wrapping_sub(b.rotate_left(16));
    a ^= c;
    a = a.wrapping_sub(c.rotate_left(4));
    b ^= a;
    b = b.wrapping_sub(a.rotate_left(14));
    c ^= b;
    c.wrapping_sub(b.rotate_left(24))
}

pub fn hash_int_3d(kx: u32, ky: u32, kz: u32) -> u32 {
    hash_int_2d(hash_int_2d(kx, ky), kz)
}

/// Map a hash to `[0, 1]`.
#[inline]
pub fn hash_to_unit(h: u32) -> f32 {
    (f64::from(h) / f64::from(u32::MAX)) as f32
}

/// `(irandom, frandom)` for an int input and seed.
pub fn int_to_random(seed: i32, value: i32) -> (i32, f32) {
    let h = hash_int_2d(value as u32, seed as u32);
    (h as i32, hash_to_unit(h))
}

/// `(irandom, frandom)` for a float input and seed, hashing the bit pattern.
pub fn float_to_random(seed: i32, value: f32) -> (i32, f32) {
    let h = hash_int_2d(value.to_bits(), seed as u32);
    (h as i32, hash_to_unit(h))
}
