//! Minimal scene graph for loaded models.
//!
//! Nodes are a closed enum (`Group` / `Mesh`) so traversal, opacity changes
//! and disposal are plain matches. Every geometry and material is released at
//! most once; `dispose` reports how many resources it actually freed.

use glam::{EulerRot, Mat4, Quat, Vec3};

/// Translation / rotation / scale of a node relative to its parent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    /// Linear RGB in `0..=1`.
    pub color: [f32; 3],
    pub opacity: f32,
    pub transparent: bool,
    /// Unlit materials ignore the scene lights.
    pub lit: bool,
    disposed: bool,
}

impl Material {
    pub fn lit(name: impl Into<String>, color: [f32; 3]) -> Self {
        Self {
            name: name.into(),
            color,
            opacity: 1.0,
            transparent: false,
            lit: true,
            disposed: false,
        }
    }

    pub fn unlit(name: impl Into<String>, color: [f32; 3]) -> Self {
        Self {
            lit: false,
            ..Self::lit(name, color)
        }
    }

    /// Used when a model ships without a material file.
    pub fn unlit_default() -> Self {
        Self::unlit("default", [0.8, 0.8, 0.8])
    }

    pub fn from_rgb8(name: impl Into<String>, rgb: [u8; 3]) -> Self {
        Self::lit(
            name,
            [
                f32::from(rgb[0]) / 255.0,
                f32::from(rgb[1]) / 255.0,
                f32::from(rgb[2]) / 255.0,
            ],
        )
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn dispose(&mut self) -> usize {
        if self.disposed {
            return 0;
        }
        self.disposed = true;
        1
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::lit("default", [1.0, 1.0, 1.0])
    }
}

/// Indexed triangle list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    disposed: bool,
}

impl Geometry {
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices,
            disposed: false,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Triangles as vertex triples; indices out of range are skipped.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|tri| {
            Some([
                *self.positions.get(tri[0] as usize)?,
                *self.positions.get(tri[1] as usize)?,
                *self.positions.get(tri[2] as usize)?,
            ])
        })
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn dispose(&mut self) -> usize {
        if self.disposed {
            return 0;
        }
        self.positions = Vec::new();
        self.indices = Vec::new();
        self.disposed = true;
        1
    }

    /// Axis-aligned cube centered on the origin.
    pub fn cube(size: f32) -> Self {
        let h = size * 0.5;
        let positions = vec![
            // front
            Vec3::new(-h, -h, h),
            Vec3::new(h, -h, h),
            Vec3::new(h, h, h),
            Vec3::new(-h, h, h),
            // back
            Vec3::new(-h, -h, -h),
            Vec3::new(-h, h, -h),
            Vec3::new(h, h, -h),
            Vec3::new(h, -h, -h),
            // top
            Vec3::new(-h, h, -h),
            Vec3::new(-h, h, h),
            Vec3::new(h, h, h),
            Vec3::new(h, h, -h),
            // bottom
            Vec3::new(-h, -h, -h),
            Vec3::new(h, -h, -h),
            Vec3::new(h, -h, h),
            Vec3::new(-h, -h, h),
            // right
            Vec3::new(h, -h, -h),
            Vec3::new(h, h, -h),
            Vec3::new(h, h, h),
            Vec3::new(h, -h, h),
            // left
            Vec3::new(-h, -h, -h),
            Vec3::new(-h, -h, h),
            Vec3::new(-h, h, h),
            Vec3::new(-h, h, -h),
        ];
        let mut indices = Vec::with_capacity(36);
        for face in 0..6u32 {
            let b = face * 4;
            indices.extend_from_slice(&[b, b + 1, b + 2, b, b + 2, b + 3]);
        }
        Self::new(positions, indices)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub transform: Transform,
    pub geometry: Geometry,
    pub material: Material,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Group {
    pub name: String,
    pub transform: Transform,
    pub children: Vec<SceneNode>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SceneNode {
    Group(Group),
    Mesh(Mesh),
}

impl SceneNode {
    pub fn mesh(name: impl Into<String>, geometry: Geometry, material: Material) -> Self {
        Self::Mesh(Mesh {
            name: name.into(),
            transform: Transform::default(),
            geometry,
            material,
        })
    }

    pub fn group(name: impl Into<String>, children: Vec<SceneNode>) -> Self {
        Self::Group(Group {
            name: name.into(),
            transform: Transform::default(),
            children,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Group(g) => &g.name,
            Self::Mesh(m) => &m.name,
        }
    }

    pub fn transform(&self) -> &Transform {
        match self {
            Self::Group(g) => &g.transform,
            Self::Mesh(m) => &m.transform,
        }
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        match self {
            Self::Group(g) => &mut g.transform,
            Self::Mesh(m) => &mut m.transform,
        }
    }

    /// Visit every mesh with its accumulated world matrix.
    pub fn visit_meshes<F: FnMut(&Mesh, Mat4)>(&self, parent: Mat4, f: &mut F) {
        let world = parent * self.transform().matrix();
        match self {
            Self::Mesh(m) => f(m, world),
            Self::Group(g) => {
                for child in &g.children {
                    child.visit_meshes(world, f);
                }
            }
        }
    }

    pub fn for_each_mesh_mut<F: FnMut(&mut Mesh)>(&mut self, f: &mut F) {
        match self {
            Self::Mesh(m) => f(m),
            Self::Group(g) => {
                for child in &mut g.children {
                    child.for_each_mesh_mut(f);
                }
            }
        }
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.visit_meshes(Mat4::IDENTITY, &mut |_, _| count += 1);
        count
    }

    pub fn triangle_count(&self) -> usize {
        let mut count = 0;
        self.visit_meshes(Mat4::IDENTITY, &mut |m, _| count += m.geometry.triangle_count());
        count
    }

    /// Bounds of all vertices under `parent`, or `None` for an empty tree.
    pub fn bounds(&self, parent: Mat4) -> Option<Bounds> {
        let mut bounds: Option<Bounds> = None;
        self.visit_meshes(parent, &mut |m, world| {
            for p in &m.geometry.positions {
                let w = world.transform_point3(*p);
                match bounds.as_mut() {
                    Some(b) => b.include(w),
                    None => bounds = Some(Bounds { min: w, max: w }),
                }
            }
        });
        bounds
    }

    /// Force every material to `opacity` and mark it transparent.
    pub fn set_opacity(&mut self, opacity: f32) {
        let opacity = opacity.max(0.0);
        self.for_each_mesh_mut(&mut |m| {
            m.material.opacity = opacity;
            m.material.transparent = true;
        });
    }

    /// Release geometry and material buffers. Returns the number of
    /// resources freed by this call.
    pub fn dispose(&mut self) -> usize {
        let mut released = 0;
        self.for_each_mesh_mut(&mut |m| {
            released += m.geometry.dispose();
            released += m.material.dispose();
        });
        released
    }
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn include(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// A loaded node normalized to a 2-unit extent around its center, plus the
/// pose the scenes animate.
#[derive(Clone, Debug)]
pub struct Model {
    pub node: SceneNode,
    fit: Mat4,
    pub position: Vec3,
    /// Euler angles, XYZ order.
    pub rotation: Vec3,
    pub visible: bool,
}

/// Target extent of the longest side after fitting.
pub const FIT_EXTENT: f32 = 2.0;

impl Model {
    pub fn fitted(node: SceneNode) -> Self {
        let fit = match node.bounds(Mat4::IDENTITY) {
            Some(b) => {
                let max_dim = b.size().max_element();
                let scale = if max_dim > 0.0 { FIT_EXTENT / max_dim } else { 1.0 };
                Mat4::from_scale(Vec3::splat(scale)) * Mat4::from_translation(-b.center())
            }
            None => Mat4::IDENTITY,
        };
        Self {
            node,
            fit,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            visible: true,
        }
    }

    /// Placed as-is, without normalization.
    pub fn unfitted(node: SceneNode) -> Self {
        Self {
            node,
            fit: Mat4::IDENTITY,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            visible: true,
        }
    }

    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z)
            * self.fit
    }

    pub fn world_bounds(&self) -> Option<Bounds> {
        self.node.bounds(self.world_matrix())
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.node.set_opacity(opacity);
    }

    pub fn dispose(&mut self) -> usize {
        self.node.dispose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_cubes() -> SceneNode {
        let mut far = SceneNode::mesh("far", Geometry::cube(1.0), Material::default());
        far.transform_mut().translation = Vec3::new(4.0, 0.0, 0.0);
        SceneNode::group(
            "pair",
            vec![SceneNode::mesh("near", Geometry::cube(1.0), Material::default()), far],
        )
    }

    #[test]
    fn cube_has_twelve_triangles() {
        let g = Geometry::cube(2.0);
        assert_eq!(g.triangle_count(), 12);
        assert_eq!(g.triangles().count(), 12);
    }

    #[test]
    fn bounds_follow_node_transforms() {
        let b = two_cubes().bounds(Mat4::IDENTITY).unwrap();
        assert_eq!(b.min, Vec3::new(-0.5, -0.5, -0.5));
        assert_eq!(b.max, Vec3::new(4.5, 0.5, 0.5));
    }

    #[test]
    fn fitted_model_spans_two_units_around_pose() {
        let mut model = Model::fitted(two_cubes());
        model.position = Vec3::new(0.0, 2.0, 0.0);
        let b = model.world_bounds().unwrap();
        assert!((b.size().x - 2.0).abs() < 1e-5);
        assert!(b.center().abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-5));
    }

    #[test]
    fn empty_group_fits_to_identity() {
        let model = Model::fitted(SceneNode::group("empty", Vec::new()));
        assert!(model.world_bounds().is_none());
        assert_eq!(model.world_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn opacity_reaches_every_mesh() {
        let mut node = two_cubes();
        node.set_opacity(-0.3);
        node.visit_meshes(Mat4::IDENTITY, &mut |m, _| {
            assert_eq!(m.material.opacity, 0.0);
            assert!(m.material.transparent);
        });
    }

    #[test]
    fn dispose_releases_once() {
        let mut node = two_cubes();
        assert_eq!(node.dispose(), 4);
        assert_eq!(node.dispose(), 0);
        assert_eq!(node.triangle_count(), 0);
        node.visit_meshes(Mat4::IDENTITY, &mut |m, _| {
            assert!(m.geometry.is_disposed());
            assert!(m.material.is_disposed());
        });
    }
}
