//! Lattice noise primitives for the procedural textures.
//!
//! Everything here is a deterministic function of its inputs. The lattice is
//! hashed with [`hash_int_3d`], so the same position always yields the same
//! value on every platform.

use nodevm_core::Float3;

use super::math::{hash_int_3d, hash_to_unit};

/// Noise basis selectors accepted by the `noise_basis` constants.
pub mod basis {
    pub const VALUE: i32 = 0;
    pub const VORONOI_F1: i32 = 3;
    pub const VORONOI_F2: i32 = 4;
    pub const VORONOI_F3: i32 = 5;
    pub const VORONOI_F4: i32 = 6;
    pub const VORONOI_F2F1: i32 = 7;
    pub const VORONOI_CRACKLE: i32 = 8;
    pub const CELL: i32 = 14;
}

fn lattice(p: Float3) -> (i32, i32, i32) {
    (p.x.floor() as i32, p.y.floor() as i32, p.z.floor() as i32)
}

#[inline]
fn cell_hash(x: i32, y: i32, z: i32, salt: u32) -> f32 {
    hash_to_unit(hash_int_3d(x as u32, y as u32, (z as u32) ^ salt))
}

#[inline]
fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(t: f32, a: f32, b: f32) -> f32 {
    a + t * (b - a)
}

/// Smoothly interpolated value noise in `[0, 1]`.
pub fn value_noise(p: Float3) -> f32 {
    let (ix, iy, iz) = lattice(p);
    let (fx, fy, fz) = (
        p.x - ix as f32,
        p.y - iy as f32,
        p.z - iz as f32,
    );
    let (u, v, w) = (fade(fx), fade(fy), fade(fz));
    let h = |dx: i32, dy: i32, dz: i32| cell_hash(ix + dx, iy + dy, iz + dz, 0);

    lerp(
        w,
        lerp(v, lerp(u, h(0, 0, 0), h(1, 0, 0)), lerp(u, h(0, 1, 0), h(1, 1, 0))),
        lerp(v, lerp(u, h(0, 0, 1), h(1, 0, 1)), lerp(u, h(0, 1, 1), h(1, 1, 1))),
    )
}

/// Constant value per unit cell, in `[0, 1]`.
pub fn cell_noise(p: Float3) -> f32 {
    let (x, y, z) = lattice(p);
    cell_hash(x, y, z, 0)
}

/// Constant color per unit cell.
pub fn cell_noise_v(p: Float3) -> Float3 {
    let (x, y, z) = lattice(p);
    Float3::new(
        cell_hash(x, y, z, 0x68bc_21eb),
        cell_hash(x, y, z, 0x02e5_be93),
        cell_hash(x, y, z, 0x967a_889b),
    )
}

/// Distance metric of a voronoi texture.
fn distance(d: Float3, metric: i32, exponent: f32) -> f32 {
    let (x, y, z) = (d.x.abs(), d.y.abs(), d.z.abs());
    match metric {
        1 => d.dot(d),
        2 => x + y + z,
        3 => x.max(y).max(z),
        4 => {
            let s = x.sqrt() + y.sqrt() + z.sqrt();
            s * s
        }
        5 => {
            let (x2, y2, z2) = (x * x, y * y, z * z);
            (x2 * x2 + y2 * y2 + z2 * z2).sqrt().sqrt()
        }
        6 if exponent != 0.0 => {
            (x.powf(exponent) + y.powf(exponent) + z.powf(exponent)).powf(1.0 / exponent)
        }
        _ => d.length(),
    }
}

/// Distances to the four nearest feature points and the points themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voronoi {
    pub distances: [f32; 4],
    pub points: [Float3; 4],
}

/// Worley noise with one feature point per unit cell.
pub fn voronoi(p: Float3, exponent: f32, metric: i32) -> Voronoi {
    let mut result = Voronoi {
        distances: [f32::MAX; 4],
        points: [Float3::ZERO; 4],
    };
    let (ix, iy, iz) = lattice(p);

    for dx in -1..=1 {
        for dy in -1..=1 {
            for dz in -1..=1 {
                let (cx, cy, cz) = (ix + dx, iy + dy, iz + dz);
                let feature = Float3::new(
                    cx as f32 + cell_hash(cx, cy, cz, 1),
                    cy as f32 + cell_hash(cx, cy, cz, 2),
                    cz as f32 + cell_hash(cx, cy, cz, 3),
                );
                let d = distance(p - feature, metric, exponent);
                insert_nearest(&mut result, d, feature);
            }
        }
    }
    result
}

fn insert_nearest(result: &mut Voronoi, d: f32, point: Float3) {
    let Some(pos) = result.distances.iter().position(|&existing| d < existing) else {
        return;
    };
    for i in (pos + 1..4).rev() {
        result.distances[i] = result.distances[i - 1];
        result.points[i] = result.points[i - 1];
    }
    result.distances[pos] = d;
    result.points[pos] = point;
}

/// Unsigned noise of the given basis.
pub fn noise_basis(p: Float3, basis: i32) -> f32 {
    let vor = |i: usize| voronoi(p, 2.5, 0).distances[i];
    match basis {
        basis::VORONOI_F1 => vor(0),
        basis::VORONOI_F2 => vor(1),
        basis::VORONOI_F3 => vor(2),
        basis::VORONOI_F4 => vor(3),
        basis::VORONOI_F2F1 => {
            let d = voronoi(p, 2.5, 0).distances;
            d[1] - d[0]
        }
        basis::VORONOI_CRACKLE => {
            let d = voronoi(p, 2.5, 0).distances;
            (10.0 * (d[1] - d[0])).min(1.0)
        }
        basis::CELL => cell_noise(p),
        _ => value_noise(p),
    }
}

/// Noise of the given basis mapped to `[-1, 1]`.
pub fn signed_noise(p: Float3, basis: i32) -> f32 {
    2.0 * noise_basis(p, basis) - 1.0
}

/// Scaled noise, optionally "hard" (folded around 0.5).
pub fn g_noise(size: f32, p: Float3, hard: bool, basis: i32) -> f32 {
    let p = if size != 0.0 { p * (1.0 / size) } else { p };
    let n = noise_basis(p, basis);
    if hard { (2.0 * n - 1.0).abs() } else { n }
}

/// Sum of `depth + 1` octaves, normalized to the range of one octave.
pub fn g_turbulence(size: f32, p: Float3, depth: i32, hard: bool, basis: i32) -> f32 {
    let p = if size != 0.0 { p * (1.0 / size) } else { p };
    let octaves = depth.clamp(0, 30);
    let mut sum = 0.0;
    let mut amp = 1.0;
    let mut freq = 1.0;
    let mut total = 0.0;
    for _ in 0..=octaves {
        let mut n = noise_basis(p * freq, basis);
        if hard {
            n = (2.0 * n - 1.0).abs();
        }
        sum += amp * n;
        total += amp;
        amp *= 0.5;
        freq *= 2.0;
    }
    sum / total
}

// ----------------------------------------------------------------------------
// Musgrave fractals
// ----------------------------------------------------------------------------

/// Parameters shared by the musgrave fractals.
#[derive(Debug, Clone, Copy)]
pub struct Fractal {
    pub dimension: f32,
    pub lacunarity: f32,
    pub octaves: f32,
    pub offset: f32,
    pub gain: f32,
    pub basis: i32,
}

impl Fractal {
    fn whole_octaves(&self) -> i32 {
        (self.octaves.max(0.0) as i32).min(64)
    }

    fn remainder(&self) -> f32 {
        self.octaves - self.octaves.floor()
    }

    fn noise(&self, p: Float3) -> f32 {
        signed_noise(p, self.basis)
    }

    /// Fractional brownian motion.
    pub fn fbm(&self, mut p: Float3) -> f32 {
        let pw_hl = self.lacunarity.powf(-self.dimension);
        let mut value = 0.0;
        let mut pwr = 1.0;
        for _ in 0..self.whole_octaves() {
            value += self.noise(p) * pwr;
            pwr *= pw_hl;
            p = p * self.lacunarity;
        }
        let rmd = self.remainder();
        if rmd != 0.0 {
            value += rmd * self.noise(p) * pwr;
        }
        value
    }

    pub fn multi_fractal(&self, mut p: Float3) -> f32 {
        let pw_hl = self.lacunarity.powf(-self.dimension);
        let mut value = 1.0;
        let mut pwr = 1.0;
        for _ in 0..self.whole_octaves() {
            value *= pwr * self.noise(p) + 1.0;
            pwr *= pw_hl;
            p = p * self.lacunarity;
        }
        let rmd = self.remainder();
        if rmd != 0.0 {
            value *= rmd * self.noise(p) * pwr + 1.0;
        }
        value
    }

    pub fn hetero_terrain(&self, mut p: Float3) -> f32 {
        let pw_hl = self.lacunarity.powf(-self.dimension);
        let mut pwr = pw_hl;
        let mut value = self.offset + self.noise(p);
        p = p * self.lacunarity;
        for _ in 1..self.whole_octaves() {
            let increment = (self.noise(p) + self.offset) * pwr * value;
            value += increment;
            pwr *= pw_hl;
            p = p * self.lacunarity;
        }
        let rmd = self.remainder();
        if rmd != 0.0 {
            let increment = (self.noise(p) + self.offset) * pwr * value;
            value += rmd * increment;
        }
        value
    }

    pub fn hybrid_multi_fractal(&self, mut p: Float3) -> f32 {
        let pw_hl = self.lacunarity.powf(-self.dimension);
        let mut pwr = pw_hl;
        let mut result = self.noise(p) + self.offset;
        let mut weight = self.gain * result;
        p = p * self.lacunarity;
        let mut i = 1;
        while weight > 0.001 && i < self.whole_octaves() {
            weight = weight.min(1.0);
            let signal = (self.noise(p) + self.offset) * pwr;
            pwr *= pw_hl;
            result += weight * signal;
            weight *= self.gain * signal;
            p = p * self.lacunarity;
            i += 1;
        }
        let rmd = self.remainder();
        if rmd != 0.0 {
            result += rmd * ((self.noise(p) + self.offset) * pwr);
        }
        result
    }

    pub fn ridged_multi_fractal(&self, mut p: Float3) -> f32 {
        let mut signal = (self.offset - self.noise(p).abs()).powi(2);
        let mut result = signal;
        for i in 1..self.whole_octaves() {
            p = p * self.lacunarity;
            let weight = (signal * self.gain).clamp(0.0, 1.0);
            signal = self.offset - self.noise(p).abs();
            signal *= signal;
            signal *= weight;
            result += signal * self.lacunarity.powf(-(i as f32) * self.dimension);
        }
        result
    }
}

/// Noise of `basis2` at a position distorted by noise of `basis1`.
pub fn vl_noise(p: Float3, distortion: f32, basis1: i32, basis2: i32) -> f32 {
    let offset = Float3::new(
        signed_noise(p + Float3::splat(13.5), basis1),
        signed_noise(p, basis1),
        signed_noise(p - Float3::splat(13.5), basis1),
    );
    signed_noise(p + offset * distortion, basis2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_noise_is_bounded_and_continuous() {
        let mut prev = value_noise(Float3::ZERO);
        for i in 1..200 {
            let p = Float3::new(i as f32 * 0.01, 0.37, -1.2);
            let n = value_noise(p);
            assert!((0.0..=1.0).contains(&n));
            assert!((n - prev).abs() < 0.1, "jump at {i}");
            prev = n;
        }
    }

    #[test]
    fn value_noise_matches_lattice_at_corners() {
        let p = Float3::new(3.0, -2.0, 5.0);
        assert_eq!(value_noise(p), cell_noise(p));
    }

    #[test]
    fn voronoi_distances_are_sorted() {
        let v = voronoi(Float3::new(0.3, 1.7, -4.2), 2.5, 0);
        assert!(v.distances.windows(2).all(|w| w[0] <= w[1]));
        let nearest = (Float3::new(0.3, 1.7, -4.2) - v.points[0]).length();
        assert!((nearest - v.distances[0]).abs() < 1e-5);
    }

    #[test]
    fn turbulence_stays_in_range() {
        for depth in 0..6 {
            let t = g_turbulence(0.5, Float3::new(1.1, 2.2, 3.3), depth, false, basis::VALUE);
            assert!((0.0..=1.0).contains(&t));
        }
    }

    #[test]
    fn fractals_are_deterministic() {
        let fractal = Fractal {
            dimension: 1.0,
            lacunarity: 2.0,
            octaves: 3.5,
            offset: 1.0,
            gain: 1.0,
            basis: basis::VALUE,
        };
        let p = Float3::new(0.4, 0.5, 0.6);
        assert_eq!(fractal.fbm(p), fractal.fbm(p));
        assert!(fractal.ridged_multi_fractal(p).is_finite());
        assert!(fractal.hybrid_multi_fractal(p).is_finite());
    }
}
