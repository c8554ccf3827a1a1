//! Host object, curve, image and instancing kernels.

use nodevm_core::{Float3, Float4, ImageKey, Matrix44, ObjectKey};

use super::mesh::{ClosestPoint, closest_point};
use crate::globals::{Dupli, DupliList, EvalGlobals, HostObject, Mesh};

/// World transform of an object; the identity for a missing one.
pub fn object_transform(globals: &EvalGlobals, key: ObjectKey) -> Matrix44 {
    globals
        .object(key)
        .map_or(Matrix44::IDENTITY, |object| object.transform)
}

/// Evaluated mesh of an object; empty for a missing object or one without
/// geometry.
pub fn object_mesh(globals: &EvalGlobals, key: ObjectKey) -> Mesh {
    globals
        .object(key)
        .and_then(|object| object.mesh.clone())
        .unwrap_or_default()
}

/// Closest point on an effector object's mesh, in world space.
pub fn effector_closest_point(
    globals: &EvalGlobals,
    key: ObjectKey,
    point: Float3,
) -> ClosestPoint {
    let Some(HostObject {
        transform,
        mesh: Some(mesh),
        ..
    }) = globals.object(key)
    else {
        return ClosestPoint::NONE;
    };
    let inverse = transform.invert().unwrap_or(Matrix44::IDENTITY);
    closest_point(mesh, transform, &inverse, point)
}

/// Sample of a curve path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSample {
    pub location: Float3,
    pub direction: Float3,
    pub normal: Float3,
    pub rotation: Matrix44,
    pub radius: f32,
    pub weight: f32,
    pub tilt: f32,
}

impl PathSample {
    pub const NONE: PathSample = PathSample {
        location: Float3::ZERO,
        direction: Float3::ZERO,
        normal: Float3::ZERO,
        rotation: Matrix44::IDENTITY,
        radius: 0.0,
        weight: 0.0,
        tilt: 0.0,
    };
}

/// Rotation taking the X axis onto the unit vector `dir`.
fn rotation_to(dir: Float3) -> Matrix44 {
    let x = Float3::new(1.0, 0.0, 0.0);
    let (axis, len) = x.cross(dir).normalize();
    let cos = x.dot(dir).clamp(-1.0, 1.0);
    if len == 0.0 {
        return if cos < 0.0 {
            Matrix44::from_axis_angle(Float3::new(0.0, 0.0, 1.0), std::f32::consts::PI)
        } else {
            Matrix44::IDENTITY
        };
    }
    Matrix44::from_axis_angle(axis, cos.acos())
}

/// Point on an object's curve polyline at `parameter` in `[0, 1]`, by arc
/// length.
///
/// Samples are taken in curve space and mapped through `transform`. A
/// missing object or one without curve points yields [`PathSample::NONE`].
pub fn curve_path(
    globals: &EvalGlobals,
    key: ObjectKey,
    transform: &Matrix44,
    parameter: f32,
) -> PathSample {
    let Some(points) = globals
        .object(key)
        .map(|object| object.curve.as_slice())
        .filter(|points| !points.is_empty())
    else {
        return PathSample::NONE;
    };

    let (local, tangent) = match points {
        [only] => (*only, Float3::ZERO),
        _ => {
            let total: f32 = points.windows(2).map(|w| (w[1] - w[0]).length()).sum();
            let mut remaining = parameter.clamp(0.0, 1.0) * total;
            let mut sample = (points[points.len() - 1], points[points.len() - 1] - points[points.len() - 2]);
            for w in points.windows(2) {
                let segment = w[1] - w[0];
                let len = segment.length();
                if remaining <= len && len > 0.0 {
                    sample = (w[0] + segment * (remaining / len), segment);
                    break;
                }
                remaining -= len;
            }
            sample
        }
    };

    let direction = transform.transform_direction(tangent).normalize().0;
    PathSample {
        location: transform.transform_point(local),
        direction,
        normal: Float3::ZERO,
        rotation: rotation_to(direction),
        radius: 1.0,
        weight: 1.0,
        tilt: 0.0,
    }
}

/// Nearest-pixel sample of an image at pixel coordinates `uv.x, uv.y`.
pub fn image_sample(globals: &EvalGlobals, image: i32, uv: Float3) -> Float4 {
    let Ok(index) = u32::try_from(image) else {
        return Float4::ZERO;
    };
    globals
        .image(ImageKey::new(index))
        .map_or(Float4::ZERO, |image| image.sample_nearest(uv.x, uv.y))
}

/// A one-element dupli list.
pub fn make_dupli(
    object: ObjectKey,
    transform: Matrix44,
    index: i32,
    hide: bool,
    recursive: bool,
) -> DupliList {
    DupliList {
        duplis: vec![Dupli {
            object,
            transform,
            index,
            hide,
            recursive,
        }],
    }
}

pub fn duplis_combine(a: &DupliList, b: &DupliList) -> DupliList {
    let mut result = a.clone();
    result.duplis.extend_from_slice(&b.duplis);
    result
}
