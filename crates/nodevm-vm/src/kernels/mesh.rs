//! Mesh kernels.
//!
//! Meshes are plain vertex/polygon lists. The boolean kernel is a stand-in
//! that only handles the trivial cases of each operation; proper CSG needs a
//! host geometry library.

use nodevm_core::{Float3, Matrix44};

use crate::globals::Mesh;

/// Boolean operation codes.
pub mod boolean_op {
    pub const NONE: i32 = -1;
    pub const INTERSECT: i32 = 0;
    pub const UNION: i32 = 1;
    pub const DIFFERENCE: i32 = 2;
}

pub fn combine(a: &Mesh, b: &Mesh) -> Mesh {
    let mut result = a.clone();
    result.append(b);
    result
}

/// Append a copy of `chunk` moved by `transform`.
pub fn append_array_copy(result: &mut Mesh, chunk: &Mesh, transform: &Matrix44) {
    result.append(&chunk.transformed(transform));
}

/// Copy of `mesh` with every vertex moved by `offsets(index, position)`.
pub fn displace(mesh: &Mesh, mut offsets: impl FnMut(usize, Float3) -> Float3) -> Mesh {
    let mut result = mesh.clone();
    for (i, v) in result.vertices.iter_mut().enumerate() {
        *v = *v + offsets(i, *v);
    }
    result
}

/// Boolean of `mesh` with `other` (already in the space of `mesh`).
///
/// Intersection yields nothing, union concatenates, difference keeps `mesh`.
pub fn boolean(mesh: &Mesh, other: Option<&Mesh>, operation: i32) -> Mesh {
    let Some(other) = other else {
        return mesh.clone();
    };
    match operation {
        boolean_op::INTERSECT => Mesh::default(),
        boolean_op::UNION => combine(mesh, other),
        _ => mesh.clone(),
    }
}

fn vertex_normal(mesh: &Mesh, vertex: u32) -> Float3 {
    let mut sum = Float3::ZERO;
    for (i, poly) in mesh.polygons.iter().enumerate() {
        if poly.contains(&vertex) {
            sum = sum + mesh.polygon_normal(i);
        }
    }
    sum.normalize().0
}

/// Surface sample nearest to a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoint {
    pub position: Float3,
    pub normal: Float3,
    pub tangent: Float3,
}

impl ClosestPoint {
    pub const NONE: ClosestPoint = ClosestPoint {
        position: Float3::ZERO,
        normal: Float3::ZERO,
        tangent: Float3::ZERO,
    };
}

/// Nearest vertex of `mesh` to the world-space `point`.
///
/// The query is made in mesh space through `inverse`; results are mapped
/// back through `transform`. An empty mesh yields [`ClosestPoint::NONE`].
pub fn closest_point(
    mesh: &Mesh,
    transform: &Matrix44,
    inverse: &Matrix44,
    point: Float3,
) -> ClosestPoint {
    let local = inverse.transform_point(point);
    let nearest = mesh
        .vertices
        .iter()
        .enumerate()
        .map(|(i, &v)| (i, (v - local).dot(v - local)))
        .min_by(|a, b| a.1.total_cmp(&b.1));
    let Some((index, _)) = nearest else {
        return ClosestPoint::NONE;
    };

    let normal = vertex_normal(mesh, index as u32);
    ClosestPoint {
        position: transform.transform_point(mesh.vertices[index]),
        normal: transform.transform_direction(normal).normalize().0,
        tangent: Float3::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Mesh {
        Mesh::new(
            vec![
                Float3::new(0.0, 0.0, 0.0),
                Float3::new(1.0, 0.0, 0.0),
                Float3::new(0.0, 1.0, 0.0),
            ],
            vec![vec![0, 1, 2]],
        )
    }

    #[test]
    fn combine_concatenates() {
        let mesh = combine(&triangle(), &triangle());
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.polygons, vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn displace_by_index() {
        let mesh = displace(&triangle(), |i, _| Float3::new(0.0, 0.0, i as f32));
        assert_eq!(mesh.vertices[2], Float3::new(0.0, 1.0, 2.0));
    }

    #[test]
    fn boolean_trivial_cases() {
        let a = triangle();
        let b = triangle();
        assert_eq!(boolean(&a, Some(&b), boolean_op::NONE), a);
        assert!(boolean(&a, Some(&b), boolean_op::INTERSECT).is_empty());
        assert_eq!(boolean(&a, Some(&b), boolean_op::UNION).vertex_count(), 6);
        assert_eq!(boolean(&a, Some(&b), boolean_op::DIFFERENCE), a);
        assert_eq!(boolean(&a, None, boolean_op::UNION), a);
    }

    #[test]
    fn closest_vertex_in_world_space() {
        let transform = Matrix44::from_translation(Float3::new(10.0, 0.0, 0.0));
        let inverse = transform.invert().unwrap();
        let hit = closest_point(&triangle(), &transform, &inverse, Float3::new(11.2, 0.1, 0.0));
        assert_eq!(hit.position, Float3::new(11.0, 0.0, 0.0));
        assert!((hit.normal.z - 1.0).abs() < 1e-6);
        assert_eq!(
            closest_point(&Mesh::default(), &transform, &inverse, Float3::ZERO),
            ClosestPoint::NONE
        );
    }
}
