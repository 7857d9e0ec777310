//! Models made of one or more rigid bodies, placed in the scene with their own position,
//! orientation and scale.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::{debug, info};
use na::{vector, Vector2, Vector3};
use nalgebra as na;
use obj::{load_obj, Obj, Position, TexturedVertex};

use crate::error::Result;
use crate::scene::{MatrixMode, Scene};
use crate::util::{try_normalize, Vertex};

/// A group of triangles rendered together.
#[derive(Debug, Clone, Default)]
pub struct RigidBody {
    pub geometry: Vec<Vertex>,
    pub indices: Vec<usize>, // Triangle list.
}

impl RigidBody {
    pub fn new(geometry: Vec<Vertex>, indices: Vec<usize>) -> Self {
        return Self { geometry, indices };
    }

    pub fn draw(&self, scene: &mut Scene) {
        scene.draw_triangles(&self.geometry, &self.indices);
    }
}

#[derive(Debug, Clone)]
pub struct Object {
    pub rigid: Vec<RigidBody>,
    pub position: Vector3<f32>,
    pub orientation: Vector3<f32>, // Rotations about x, y and z in degrees.
    pub scale: f32,
    pub bound: [f32; 6], // (left, right, bottom, top, front, back)
}

impl Default for Object {
    fn default() -> Self {
        return Self {
            rigid: Vec::new(),
            position: Vector3::zeros(),
            orientation: Vector3::zeros(),
            scale: 1.0,
            bound: [0.0; 6],
        };
    }
}

impl Object {
    pub fn new(rigid: Vec<RigidBody>) -> Self {
        let mut object = Self { rigid, ..Default::default() };
        object.update_bound();
        return object;
    }

    /// Axis aligned cube spanning [-1, 1] on every axis, four vertices per face so each
    /// face keeps its own normal.
    pub fn cube() -> Self {
        let x = Vector3::x();
        let y = Vector3::y();
        let z = Vector3::z();
        // (normal, u, v) with u x v = normal, so corners below are counter-clockwise
        // when looking at the face from outside.
        let faces = [(x, y, z), (-x, z, y), (y, z, x), (-y, x, z), (z, x, y), (-z, y, x)];
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

        let mut geometry = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u, v) in faces {
            let base = geometry.len();
            for (s, t) in corners {
                let position = normal + u * s + v * t;
                let tex_coord = vector![(s + 1.0) / 2.0, (t + 1.0) / 2.0];
                geometry.push(Vertex::new(position, normal, tex_coord));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        return Object::new(vec![RigidBody::new(geometry, indices)]);
    }

    /// Builds a single rigid body object from a parsed OBJ model.
    pub fn from_obj(model: &Obj<TexturedVertex, u32>) -> Self {
        let geometry = model
            .vertices
            .iter()
            .map(|v| {
                Vertex::new(
                    Vector3::from(v.position),
                    Vector3::from(v.normal),
                    vector![v.texture[0], v.texture[1]],
                )
            })
            .collect();
        let indices = model.indices.iter().map(|&i| i as usize).collect();
        return Object::new(vec![RigidBody::new(geometry, indices)]);
    }

    /// Parses OBJ data. Files without texture coordinates or normals are accepted, the
    /// missing attributes are left at zero.
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        if let Ok(model) = load_obj::<TexturedVertex, _, u32>(&data[..]) {
            return Ok(Object::from_obj(&model));
        }
        if let Ok(model) = load_obj::<obj::Vertex, _, u32>(&data[..]) {
            let geometry = model
                .vertices
                .iter()
                .map(|v| Vertex::new(Vector3::from(v.position), Vector3::from(v.normal), Vector2::zeros()))
                .collect();
            let indices = model.indices.iter().map(|&i| i as usize).collect();
            return Ok(Object::new(vec![RigidBody::new(geometry, indices)]));
        }
        let model = load_obj::<Position, _, u32>(&data[..])?;
        let geometry = model
            .vertices
            .iter()
            .map(|v| Vertex::new(Vector3::from(v.position), Vector3::zeros(), Vector2::zeros()))
            .collect();
        let indices = model.indices.iter().map(|&i| i as usize).collect();
        return Ok(Object::new(vec![RigidBody::new(geometry, indices)]));
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let object = Object::read(File::open(path.as_ref())?)?;
        info!(
            "loaded {}: {} vertices, {} triangles",
            path.as_ref().display(),
            object.vertex_count(),
            object.triangle_count()
        );
        return Ok(object);
    }

    pub fn vertex_count(&self) -> usize {
        return self.rigid.iter().map(|r| r.geometry.len()).sum();
    }

    pub fn triangle_count(&self) -> usize {
        return self.rigid.iter().map(|r| r.indices.len() / 3).sum();
    }

    /// Recomputes the bounding box from the geometry. An empty object gets a zero box.
    pub fn update_bound(&mut self) {
        let mut positions = self.rigid.iter().flat_map(|r| r.geometry.iter().map(|v| v.position));
        let first = match positions.next() {
            Some(p) => p,
            None => {
                self.bound = [0.0; 6];
                return;
            }
        };
        let (low, high) = positions.fold((first, first), |(low, high), p| (low.inf(&p), high.sup(&p)));
        self.bound = [low.x, high.x, low.y, high.y, low.z, high.z];
    }

    /// Composes the object transform in front of the current model-view and runs `f` with
    /// it active. The model-view and the active matrix mode are restored afterwards.
    fn with_transform<F: FnOnce(&Object, &mut Scene)>(&self, scene: &mut Scene, f: F) {
        let mode = scene.transform().active();
        scene.set_matrix(MatrixMode::ModelView);
        scene.push_matrix();

        let view = *scene.transform().model_view();
        scene.load_identity();
        scene.scale(vector![self.scale, self.scale, self.scale]);
        scene.rotate(self.orientation.x, Vector3::x());
        scene.rotate(self.orientation.y, Vector3::y());
        scene.rotate(self.orientation.z, Vector3::z());
        scene.translate(self.position);
        scene.transform_mut().mult_matrix(view);

        f(self, scene);

        scene.pop_matrix();
        scene.set_matrix(mode);
    }

    pub fn draw(&self, scene: &mut Scene) {
        self.with_transform(scene, |object, scene| {
            for rigid in &object.rigid {
                rigid.draw(scene);
            }
        });
    }

    /// Draws the 12 edges of the bounding box.
    pub fn draw_bound(&self, scene: &mut Scene) {
        let [l, r, b, t, f, k] = self.bound;
        let corners: Vec<Vertex> = [
            (l, b, f), (r, b, f), (r, t, f), (l, t, f),
            (l, b, k), (r, b, k), (r, t, k), (l, t, k),
        ]
        .iter()
        .map(|&(x, y, z)| Vertex::at(x, y, z))
        .collect();
        let edges = [
            0, 1, 1, 2, 2, 3, 3, 0, // front
            4, 5, 5, 6, 6, 7, 7, 4, // back
            0, 4, 1, 5, 2, 6, 3, 7,
        ];
        self.with_transform(scene, |_, scene| scene.draw_lines(&corners, &edges));
    }

    /// Draws normals as short lines, from every vertex or, with `face` set, from the
    /// center of every triangle.
    pub fn draw_normals(&self, scene: &mut Scene, face: bool) {
        let bound = self.bound;
        let extent = (bound[1] - bound[0]).max(bound[3] - bound[2]).max(bound[5] - bound[4]);
        let length = if extent > 0.0 { 0.1 * extent } else { 0.1 };

        let mut lines = Vec::new();
        for rigid in &self.rigid {
            if face {
                for tri in rigid.indices.chunks_exact(3) {
                    let [a, b, c] = [
                        rigid.geometry[tri[0]].position,
                        rigid.geometry[tri[1]].position,
                        rigid.geometry[tri[2]].position,
                    ];
                    if let Some(normal) = try_normalize((b - a).cross(&(c - a))) {
                        let center = (a + b + c) / 3.0;
                        lines.push(Vertex::new(center, normal, Vector2::zeros()));
                        lines.push(Vertex::new(center + normal * length, normal, Vector2::zeros()));
                    }
                }
            } else {
                for v in &rigid.geometry {
                    if let Some(normal) = try_normalize(v.normal) {
                        lines.push(*v);
                        lines.push(Vertex::new(v.position + normal * length, normal, v.tex_coord));
                    }
                }
            }
        }
        debug!("draw_normals: {} lines", lines.len() / 2);
        let indices: Vec<usize> = (0..lines.len()).collect();
        self.with_transform(scene, |_, scene| scene.draw_lines(&lines, &indices));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{CullMode, PolygonMode};

    const TRIANGLE_OBJ: &str = "\
v 0.0 0.0 0.0
v 2.0 0.0 0.0
v 0.0 1.0 -1.0
vt 0.0 0.0
vt 1.0 0.0
vt 0.0 1.0
vn 0.0 0.0 1.0
f 1/1/1 2/2/1 3/3/1
";

    const POSITIONS_ONLY_OBJ: &str = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
f 1 2 3
";

    fn ortho_scene(size: u32) -> Scene {
        let mut scene = Scene::new(size, size);
        scene.set_matrix(MatrixMode::Projection);
        scene.ortho(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0);
        scene.set_matrix(MatrixMode::ModelView);
        return scene;
    }

    fn lit_pixels(scene: &Scene) -> usize {
        return scene.as_render_data().chunks(3).filter(|c| c.iter().any(|&v| v != 0)).count();
    }

    #[test]
    fn cube_has_unit_bounds_and_outward_normals() {
        let cube = Object::cube();
        assert_eq!(cube.bound, [-1.0, 1.0, -1.0, 1.0, -1.0, 1.0]);
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.triangle_count(), 12);
        let body = &cube.rigid[0];
        for tri in body.indices.chunks_exact(3) {
            let [a, b, c] = [body.geometry[tri[0]], body.geometry[tri[1]], body.geometry[tri[2]]];
            let winding = (b.position - a.position).cross(&(c.position - a.position));
            assert!(winding.dot(&a.normal) > 0.0);
        }
    }

    #[test]
    fn read_textured_obj() {
        let object = Object::read(TRIANGLE_OBJ.as_bytes()).unwrap();
        assert_eq!(object.triangle_count(), 1);
        assert_eq!(object.bound, [0.0, 2.0, 0.0, 1.0, -1.0, 0.0]);
        let v = object.rigid[0].geometry[1];
        assert_eq!(v.tex_coord, vector![1.0, 0.0]);
        assert_eq!(v.normal, vector![0.0, 0.0, 1.0]);
    }

    #[test]
    fn read_obj_without_attributes() {
        let object = Object::read(POSITIONS_ONLY_OBJ.as_bytes()).unwrap();
        assert_eq!(object.vertex_count(), 3);
        assert_eq!(object.rigid[0].geometry[2].normal, Vector3::zeros());
    }

    #[test]
    fn load_missing_file_fails() {
        assert!(Object::load("does/not/exist.obj").is_err());
    }

    #[test]
    fn empty_object_has_zero_bound() {
        let object = Object::new(Vec::new());
        assert_eq!(object.bound, [0.0; 6]);
    }

    #[test]
    fn draw_restores_model_view() {
        let mut scene = ortho_scene(16);
        scene.set_polygon_mode(PolygonMode::Fill);
        scene.translate(vector![0.25, 0.0, 0.0]);
        let before = *scene.transform().model_view();

        let mut cube = Object::cube();
        cube.scale = 0.25;
        cube.orientation = vector![30.0, 45.0, 0.0];
        cube.draw(&mut scene);

        assert_eq!(*scene.transform().model_view(), before);
        assert_eq!(scene.transform().active(), MatrixMode::ModelView);
        assert!(lit_pixels(&scene) > 0);
    }

    #[test]
    fn object_transform_is_applied_before_view() {
        // A view translation to the right must move the object to the right half even
        // though the object carries its own offset.
        let mut scene = ortho_scene(20);
        scene.set_polygon_mode(PolygonMode::Fill);
        scene.set_culling(CullMode::None);
        scene.translate(vector![0.5, 0.0, 0.0]);

        let mut cube = Object::cube();
        cube.scale = 0.2;
        cube.position = vector![0.0, 0.5, 0.0];
        cube.draw(&mut scene);

        // Center lands at window (0.5, 0.5), pixel (15, 15).
        assert_eq!(scene.frame().pixel(15, 15), Some([255, 255, 255]));
        assert_eq!(scene.frame().pixel(5, 15), Some([0, 0, 0]));
    }

    #[test]
    fn bound_and_normals_draw_lines() {
        let mut scene = ortho_scene(32);
        let mut cube = Object::cube();
        cube.scale = 0.5;
        cube.orientation = vector![20.0, 30.0, 0.0];
        cube.draw_bound(&mut scene);
        let bound_pixels = lit_pixels(&scene);
        assert!(bound_pixels > 0);

        scene.clear();
        cube.draw_normals(&mut scene, true);
        assert!(lit_pixels(&scene) > 0);
        scene.clear();
        cube.draw_normals(&mut scene, false);
        assert!(lit_pixels(&scene) > 0);
    }
}
