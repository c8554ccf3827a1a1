//! Procedural textures.
//!
//! Each texture returns an intensity, optionally a color, and a bump normal
//! built from three extra samples offset by `nabla` along each axis.

use nodevm_core::{Float3, Float4};

use super::noise::{Fractal, cell_noise_v, g_noise, g_turbulence, vl_noise, voronoi};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexResult {
    pub intensity: f32,
    pub color: Float4,
    pub normal: Float3,
}

impl TexResult {
    fn gray(intensity: f32, normal: Float3) -> Self {
        Self {
            intensity,
            color: Float4::new(intensity, intensity, intensity, 1.0),
            normal,
        }
    }
}

/// Sample `f` at `p` offset by `offs` along each axis.
fn bump(p: Float3, offs: f32, f: impl Fn(Float3) -> f32) -> Float3 {
    Float3::new(
        f(p + Float3::new(offs, 0.0, 0.0)),
        f(p + Float3::new(0.0, offs, 0.0)),
        f(p + Float3::new(0.0, 0.0, offs)),
    )
}

#[derive(Debug, Clone, Copy)]
pub struct VoronoiParams {
    pub distance_metric: i32,
    pub color_type: i32,
    pub minkowski_exponent: f32,
    pub scale: f32,
    pub noise_size: f32,
    pub nabla: f32,
    pub weights: [f32; 4],
}

pub fn voronoi_texture(params: &VoronoiParams, p: Float3) -> TexResult {
    let w = params.weights;
    let aw = w.map(f32::abs);
    let mut sc = aw.iter().sum::<f32>();
    if sc != 0.0 {
        sc = params.scale / sc;
    }
    let intensity_at = |p: Float3| {
        let d = voronoi(p, params.minkowski_exponent, params.distance_metric).distances;
        sc * (w[0] * d[0] + w[1] * d[1] + w[2] * d[2] + w[3] * d[3]).abs()
    };

    let cells = voronoi(p, params.minkowski_exponent, params.distance_metric);
    let d = cells.distances;
    let intensity = sc * (w[0] * d[0] + w[1] * d[1] + w[2] * d[2] + w[3] * d[3]).abs();

    let color = if params.color_type == 0 {
        Float4::new(intensity, intensity, intensity, 1.0)
    } else {
        let mut rgb = Float3::ZERO;
        for (point, weight) in cells.points.iter().zip(aw) {
            rgb = rgb + cell_noise_v(*point) * weight;
        }
        let t = if params.color_type > 1 {
            let t1 = ((d[1] - d[0]) * 10.0).min(1.0);
            if params.color_type > 2 { t1 * intensity } else { t1 * sc }
        } else {
            sc
        };
        rgb = rgb * t;
        Float4::new(rgb.x, rgb.y, rgb.z, 1.0)
    };

    let offs = if params.noise_size != 0.0 {
        params.nabla / params.noise_size
    } else {
        params.nabla
    };
    TexResult {
        intensity,
        color,
        normal: bump(p, offs, intensity_at),
    }
}

pub fn magic_texture(p: Float3, turbulence: f32, depth: i32) -> TexResult {
    let mut turb = turbulence / 5.0;
    let mut x = ((p.x + p.y + p.z) * 5.0).sin();
    let mut y = ((-p.x + p.y - p.z) * 5.0).cos();
    let mut z = -((-p.x - p.y + p.z) * 5.0).cos();

    if depth > 0 {
        x *= turb;
        y *= turb;
        z *= turb;
        y = -(x - y + z).cos() * turb;
        let steps: [fn(&mut [f32; 3]); 9] = [
            |v| v[0] = (v[0] - v[1] - v[2]).cos(),
            |v| v[2] = (-v[0] - v[1] - v[2]).sin(),
            |v| v[0] = -(-v[0] + v[1] - v[2]).cos(),
            |v| v[1] = -(-v[0] + v[1] + v[2]).sin(),
            |v| v[1] = -(-v[0] + v[1] + v[2]).cos(),
            |v| v[0] = (v[0] + v[1] + v[2]).cos(),
            |v| v[2] = (v[0] + v[1] - v[2]).sin(),
            |v| v[0] = -(-v[0] - v[1] + v[2]).cos(),
            |v| v[1] = -(v[0] - v[1] + v[2]).sin(),
        ];
        let axes = [0, 2, 0, 1, 1, 0, 2, 0, 1];
        let mut v = [x, y, z];
        for (level, (step, axis)) in steps.iter().zip(axes).enumerate() {
            if depth <= level as i32 + 1 {
                break;
            }
            step(&mut v);
            v[axis] *= turb;
        }
        [x, y, z] = v;
    }

    if turb != 0.0 {
        turb *= 2.0;
        x /= turb;
        y /= turb;
        z /= turb;
    }
    let color = Float4::new(0.5 - x, 0.5 - y, 0.5 - z, 1.0);
    TexResult {
        intensity: (color.x + color.y + color.z) / 3.0,
        color,
        normal: Float3::new(x, y, z),
    }
}

fn tex_sin(a: f32) -> f32 {
    0.5 + 0.5 * a.sin()
}

fn tex_saw(a: f32) -> f32 {
    let b = std::f32::consts::TAU;
    let n = (a / b) as i32;
    let mut a = a - n as f32 * b;
    if a < 0.0 {
        a += b;
    }
    a / b
}

fn tex_tri(a: f32) -> f32 {
    let b = std::f32::consts::TAU;
    1.0 - 2.0 * ((a / b + 0.5).floor() - a / b).abs()
}

fn waveform(kind: i32) -> fn(f32) -> f32 {
    match kind {
        1 => tex_saw,
        2 => tex_tri,
        _ => tex_sin,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MarbleParams {
    pub size: f32,
    pub nabla: f32,
    pub turbulence: f32,
    pub depth: i32,
    pub noise_basis: i32,
    pub noise_basis_2: i32,
    pub noise_hard: bool,
    pub marble_type: i32,
}

pub fn marble_texture(params: &MarbleParams, p: Float3) -> TexResult {
    let wave = waveform(params.noise_basis_2);
    let marble = |p: Float3| {
        let n = 5.0 * (p.x + p.y + p.z);
        let turb = g_turbulence(params.size, p, params.depth, params.noise_hard, params.noise_basis);
        let intensity = wave(n + params.turbulence * turb);
        match params.marble_type {
            1 => intensity.sqrt(),
            2 => intensity.sqrt().sqrt(),
            _ => intensity,
        }
    };
    TexResult::gray(marble(p), bump(p, params.nabla, marble))
}

#[derive(Debug, Clone, Copy)]
pub struct CloudsParams {
    pub nabla: f32,
    pub size: f32,
    pub depth: i32,
    pub noise_basis: i32,
    pub noise_hard: bool,
}

pub fn clouds_texture(params: &CloudsParams, p: Float3) -> TexResult {
    let turb = |p: Float3| {
        g_turbulence(params.size, p, params.depth, params.noise_hard, params.noise_basis)
    };
    let intensity = turb(p);
    let g = turb(Float3::new(p.y, p.x, p.z));
    let b = turb(Float3::new(p.y, p.z, p.x));
    TexResult {
        intensity,
        color: Float4::new(intensity, g, b, 1.0),
        normal: bump(p, params.nabla, turb),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WoodParams {
    pub nabla: f32,
    pub size: f32,
    pub turbulence: f32,
    pub noise_basis: i32,
    pub noise_basis_2: i32,
    pub noise_hard: bool,
    pub wood_type: i32,
}

pub fn wood_texture(params: &WoodParams, p: Float3) -> TexResult {
    let wave = waveform(params.noise_basis_2);
    let wood = |p: Float3| {
        let noise = || {
            params.turbulence * g_noise(params.size, p, params.noise_hard, params.noise_basis)
        };
        match params.wood_type {
            0 => wave((p.x + p.y + p.z) * 10.0),
            1 => wave(p.length() * 20.0),
            2 => wave((p.x + p.y + p.z) * 10.0 + noise()),
            3 => wave(p.length() * 20.0 + noise()),
            _ => 0.0,
        }
    };
    TexResult::gray(wood(p), bump(p, params.nabla, wood))
}

#[derive(Debug, Clone, Copy)]
pub struct MusgraveParams {
    pub nabla: f32,
    pub size: f32,
    pub fractal: Fractal,
    pub intensity: f32,
    pub musgrave_type: i32,
}

pub fn musgrave_texture(params: &MusgraveParams, p: Float3) -> TexResult {
    let f = &params.fractal;
    let sample = |p: Float3| {
        let value = match params.musgrave_type {
            0 => f.multi_fractal(p),
            1 => f.hybrid_multi_fractal(p),
            2 => f.ridged_multi_fractal(p),
            3 => f.fbm(p),
            4 => f.hetero_terrain(p),
            _ => 0.0,
        };
        params.intensity * value
    };
    let offs = if params.size != 0.0 {
        params.nabla / params.size
    } else {
        params.nabla
    };
    TexResult::gray(sample(p), bump(p, offs, sample))
}

#[derive(Debug, Clone, Copy)]
pub struct StucciParams {
    pub size: f32,
    pub turbulence: f32,
    pub noise_basis: i32,
    pub noise_hard: bool,
    pub stucci_type: i32,
}

pub fn stucci_texture(params: &StucciParams, p: Float3) -> TexResult {
    let noise = |p: Float3| g_noise(params.size, p, params.noise_hard, params.noise_basis);
    let b2 = noise(p);
    let mut offset = params.turbulence / 200.0;
    if params.stucci_type != 0 {
        offset *= b2 * b2;
    }
    let mut normal = bump(p, offset, noise);
    let mut intensity = normal.z;
    if params.stucci_type == 2 {
        normal = -normal;
        intensity = 1.0 - intensity;
    }
    TexResult::gray(intensity.max(0.0), normal)
}

#[derive(Debug, Clone, Copy)]
pub struct DistNoiseParams {
    pub size: f32,
    pub nabla: f32,
    pub distortion: f32,
    pub noise_dist: i32,
    pub noise_basis: i32,
}

pub fn distnoise_texture(params: &DistNoiseParams, p: Float3) -> TexResult {
    let sample = |p: Float3| vl_noise(p, params.distortion, params.noise_basis, params.noise_dist);
    let offs = if params.size != 0.0 {
        params.nabla / params.size
    } else {
        params.nabla
    };
    TexResult::gray(sample(p), bump(p, offs, sample))
}
