//! Host data visible to an evaluation.
//!
//! [`EvalGlobals`] is a read-only snapshot the caller builds before calling
//! the evaluator: scene objects by [`ObjectKey`] and images by [`ImageKey`].
//! Kernels never modify it, so one instance can back any number of
//! concurrent evaluations.

use nodevm_core::{Float3, Float4, ImageKey, Matrix44, ObjectKey};
use rustc_hash::FxHashMap;

/// Polygon mesh: vertex positions and polygons as vertex index loops.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Float3>,
    pub polygons: Vec<Vec<u32>>,
}

impl Mesh {
    /// The empty mesh, returned for missing or stale resources.
    pub const EMPTY: Mesh = Mesh {
        vertices: Vec::new(),
        polygons: Vec::new(),
    };

    pub fn new(vertices: Vec<Float3>, polygons: Vec<Vec<u32>>) -> Self {
        Self { vertices, polygons }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    /// Append `other`, offsetting its vertex indices.
    pub fn append(&mut self, other: &Mesh) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.polygons.extend(
            other
                .polygons
                .iter()
                .map(|poly| poly.iter().map(|&v| v + offset).collect()),
        );
    }

    /// Copy with every vertex transformed by `matrix`.
    pub fn transformed(&self, matrix: &Matrix44) -> Mesh {
        Mesh {
            vertices: self
                .vertices
                .iter()
                .map(|&v| matrix.transform_point(v))
                .collect(),
            polygons: self.polygons.clone(),
        }
    }

    /// Newell normal of a polygon; zero for degenerate polygons.
    pub fn polygon_normal(&self, polygon: usize) -> Float3 {
        let Some(poly) = self.polygons.get(polygon) else {
            return Float3::ZERO;
        };
        let mut n = Float3::ZERO;
        for (i, &a) in poly.iter().enumerate() {
            let b = poly[(i + 1) % poly.len()];
            let (Some(&va), Some(&vb)) = (
                self.vertices.get(a as usize),
                self.vertices.get(b as usize),
            ) else {
                continue;
            };
            n.x += (va.y - vb.y) * (va.z + vb.z);
            n.y += (va.z - vb.z) * (va.x + vb.x);
            n.z += (va.x - vb.x) * (va.y + vb.y);
        }
        n.normalize().0
    }
}

/// One instance produced by `MAKE_DUPLI`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dupli {
    pub object: ObjectKey,
    pub transform: Matrix44,
    pub index: i32,
    pub hide: bool,
    pub recursive: bool,
}

/// Ordered list of instances.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DupliList {
    pub duplis: Vec<Dupli>,
}

impl DupliList {
    pub const EMPTY: DupliList = DupliList { duplis: Vec::new() };

    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, dupli: Dupli) {
        self.duplis.push(dupli);
    }

    pub fn len(&self) -> usize {
        self.duplis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.duplis.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Dupli> {
        self.duplis.iter()
    }
}

/// A scene object as seen by kernels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostObject {
    pub transform: Matrix44,
    /// Final evaluated mesh, if the object has geometry.
    pub mesh: Option<Mesh>,
    /// Control points of a curve object, as a polyline.
    pub curve: Vec<Float3>,
}

impl HostObject {
    pub fn new(transform: Matrix44) -> Self {
        Self {
            transform,
            ..Self::default()
        }
    }

    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn with_curve(mut self, points: Vec<Float3>) -> Self {
        self.curve = points;
        self
    }
}

/// RGBA float image, rows bottom to top.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Float4>,
}

impl Image {
    pub fn new(width: u32, height: u32, pixels: Vec<Float4>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height) as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Nearest pixel at pixel coordinates; transparent black outside.
    pub fn sample_nearest(&self, x: f32, y: f32) -> Float4 {
        let (x, y) = (x as i64, y as i64);
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return Float4::ZERO;
        }
        self.pixels
            .get((y as usize) * self.width as usize + x as usize)
            .copied()
            .unwrap_or(Float4::ZERO)
    }
}

/// Read-only lookup tables for one or more evaluations.
///
/// # Thread Safety
///
/// `EvalGlobals` is `Send + Sync`; share it by reference across threads.
#[derive(Debug, Clone, Default)]
pub struct EvalGlobals {
    objects: FxHashMap<ObjectKey, HostObject>,
    images: FxHashMap<ImageKey, Image>,
}

impl EvalGlobals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, key: ObjectKey, object: HostObject) {
        self.objects.insert(key, object);
    }

    pub fn object(&self, key: ObjectKey) -> Option<&HostObject> {
        if key == ObjectKey::NONE {
            return None;
        }
        self.objects.get(&key)
    }

    pub fn add_image(&mut self, key: ImageKey, image: Image) {
        self.images.insert(key, image);
    }

    pub fn image(&self, key: ImageKey) -> Option<&Image> {
        self.images.get(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Mesh {
        Mesh::new(
            vec![
                Float3::new(0.0, 0.0, 0.0),
                Float3::new(1.0, 0.0, 0.0),
                Float3::new(1.0, 1.0, 0.0),
                Float3::new(0.0, 1.0, 0.0),
            ],
            vec![vec![0, 1, 2, 3]],
        )
    }

    #[test]
    fn append_offsets_indices() {
        let mut mesh = quad();
        mesh.append(&quad());
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.polygons[1], vec![4, 5, 6, 7]);
    }

    #[test]
    fn polygon_normal() {
        let n = quad().polygon_normal(0);
        assert!((n.z - 1.0).abs() < 1e-6);
        assert_eq!(quad().polygon_normal(5), Float3::ZERO);
    }

    #[test]
    fn image_sampling_is_nearest() {
        let red = Float4::new(1.0, 0.0, 0.0, 1.0);
        let blue = Float4::new(0.0, 0.0, 1.0, 1.0);
        let image = Image::new(2, 1, vec![red, blue]);
        assert_eq!(image.sample_nearest(0.2, 0.5), red);
        assert_eq!(image.sample_nearest(1.9, 0.0), blue);
        assert_eq!(image.sample_nearest(2.0, 0.0), Float4::ZERO);
        assert_eq!(image.sample_nearest(-0.5, 0.0), red);
    }

    #[test]
    fn none_key_has_no_object() {
        let mut globals = EvalGlobals::new();
        globals.add_object(ObjectKey::new(1), HostObject::default());
        assert!(globals.object(ObjectKey::new(1)).is_some());
        assert!(globals.object(ObjectKey::NONE).is_none());
    }

    #[test]
    fn globals_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EvalGlobals>();
    }
}
