//! The pipeline context. A `Scene` owns the matrix stack, the render settings and the
//! frame buffers, and runs submitted geometry through vertex shading, clipping, culling
//! and rasterization.

mod buffer;
pub mod clip;
pub mod raster;
pub mod shader;
pub mod transform;

use log::{debug, trace};
use na::{vector, Matrix4, Vector2, Vector3};
use nalgebra as na;

pub use buffer::{FrameBuffer, DEPTH_CLEAR};
pub use raster::{CullMode, PolygonMode};
pub use shader::{Light, Material, ShadedVertex, ShadingModel};
pub use transform::{MatrixMode, TransformStack};

use crate::util::{from_hom_point, to_hom_point, Vertex};
use raster::Rasterizer;
use shader::Uniforms;

/// Mode switches and lighting description shared by all draw calls.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub polygon_mode: PolygonMode,
    pub culling: CullMode,
    pub shading: ShadingModel,
    pub light: Light,
    pub material: Material,
}

impl Default for RenderSettings {
    fn default() -> Self {
        return Self {
            polygon_mode: PolygonMode::Line,
            culling: CullMode::BackFace,
            shading: ShadingModel::Unlit,
            light: Light::default(),
            material: Material::default(),
        };
    }
}

/// Uniforms of one draw call. Borrows the stack and the settings only, so the frame
/// buffer stays free for the rasterizer.
fn frame_uniforms<'a>(transform: &TransformStack, settings: &'a RenderSettings) -> Uniforms<'a> {
    return Uniforms::new(transform, settings.shading, &settings.light, &settings.material);
}

pub struct Scene {
    transform: TransformStack,
    pub settings: RenderSettings,
    frame: FrameBuffer,
}

impl Scene {
    /// Generates a new Scene with the given viewport size and identity matrices.
    pub fn new(width: u32, height: u32) -> Self {
        return Self {
            transform: TransformStack::new(),
            settings: RenderSettings::default(),
            frame: FrameBuffer::new(width, height),
        };
    }

    pub fn width(&self) -> u32 {
        return self.frame.width();
    }

    pub fn height(&self) -> u32 {
        return self.frame.height();
    }

    pub fn frame(&self) -> &FrameBuffer {
        return &self.frame;
    }

    /// Rendered image as rgb8, top row first.
    pub fn as_render_data(&self) -> &[u8] {
        return self.frame.as_render_data();
    }

    /// Reallocates color and depth buffers. Must not be interleaved with a frame in progress.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.frame.resize(width, height);
    }

    pub fn clear_color_buffer(&mut self) {
        self.frame.clear_color();
    }

    pub fn clear_depth_buffer(&mut self) {
        self.frame.clear_depth();
    }

    pub fn clear(&mut self) {
        self.frame.clear();
    }

    pub fn transform(&self) -> &TransformStack {
        return &self.transform;
    }

    pub fn transform_mut(&mut self) -> &mut TransformStack {
        return &mut self.transform;
    }

    pub fn set_matrix(&mut self, mode: MatrixMode) {
        self.transform.set_matrix(mode);
    }

    pub fn load_identity(&mut self) {
        self.transform.load_identity();
    }

    pub fn push_matrix(&mut self) {
        self.transform.push_matrix();
    }

    pub fn pop_matrix(&mut self) {
        self.transform.pop_matrix();
    }

    pub fn translate(&mut self, direction: Vector3<f32>) {
        self.transform.translate(direction);
    }

    pub fn rotate(&mut self, angle: f32, axis: Vector3<f32>) {
        self.transform.rotate(angle, axis);
    }

    pub fn scale(&mut self, size: Vector3<f32>) {
        self.transform.scale(size);
    }

    pub fn perspective(&mut self, fovy: f32, aspect: f32, near: f32, far: f32) {
        self.transform.perspective(fovy, aspect, near, far);
    }

    pub fn frustum(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.transform.frustum(left, right, bottom, top, near, far);
    }

    pub fn ortho(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.transform.ortho(left, right, bottom, top, near, far);
    }

    pub fn look_at(&mut self, eye: Vector3<f32>, at: Vector3<f32>, up: Vector3<f32>) {
        self.transform.look_at(eye, at, up);
    }

    pub fn set_polygon_mode(&mut self, mode: PolygonMode) {
        self.settings.polygon_mode = mode;
    }

    pub fn set_culling(&mut self, culling: CullMode) {
        self.settings.culling = culling;
    }

    pub fn set_shading(&mut self, shading: ShadingModel) {
        self.settings.shading = shading;
    }

    pub fn set_light(&mut self, light: Light) {
        self.settings.light = light;
    }

    pub fn set_material(&mut self, material: Material) {
        self.settings.material = material;
    }

    /// Window coordinates of the center of a pixel. z is 0.
    pub fn to_window(&self, pixel: Vector2<i32>) -> Vector3<f32> {
        let center = vector![pixel.x as f32 + 0.5, pixel.y as f32 + 0.5];
        let window = raster::to_window(center, self.width(), self.height());
        return vector![window.x, window.y, 0.0];
    }

    /// Pixel containing a window coordinate.
    pub fn to_pixel(&self, window: Vector3<f32>) -> Vector2<i32> {
        let pixel = raster::to_pixel(window.xy(), self.width(), self.height());
        return vector![pixel.x.floor() as i32, pixel.y.floor() as i32];
    }

    /// Maps window coordinates (x, y, depth in [-1, 1]) back to object space through the
    /// inverse of projection * model-view. None when that matrix is singular.
    pub fn unproject(&self, window: Vector3<f32>) -> Option<Vector3<f32>> {
        let combined: Matrix4<f32> = self.transform.projection() * self.transform.model_view();
        let inverse = combined.try_inverse()?;
        return from_hom_point(inverse * to_hom_point(window));
    }

    fn uniforms(&self) -> Uniforms<'_> {
        return frame_uniforms(&self.transform, &self.settings);
    }

    /// Runs one vertex through the vertex shader with the current matrices.
    pub fn shade_vertex(&self, vertex: &Vertex) -> ShadedVertex {
        return shader::shade_vertex(&self.uniforms(), vertex);
    }

    fn shade_all(uniforms: &Uniforms, vertices: &[Vertex]) -> Vec<ShadedVertex> {
        return vertices.iter().map(|v| shader::shade_vertex(uniforms, v)).collect();
    }

    /// Draw a set of points. Points outside the view volume are dropped.
    pub fn draw_points(&mut self, vertices: &[Vertex]) {
        let uniforms = frame_uniforms(&self.transform, &self.settings);
        let mut rasterizer = Rasterizer::new(
            &mut self.frame,
            &uniforms,
            self.settings.polygon_mode,
            self.settings.culling,
        );
        let mut drawn = 0;
        for vertex in vertices {
            if let Some(v) = clip::clip_point(&shader::shade_vertex(&uniforms, vertex)) {
                rasterizer.plot_point(&v);
                drawn += 1;
            }
        }
        debug!("draw_points: {} submitted, {} drawn", vertices.len(), drawn);
    }

    /// Draw lines between pairs of indexed vertices. A trailing unpaired index is ignored.
    ///
    /// Panics if an index is out of range for `vertices`.
    pub fn draw_lines(&mut self, vertices: &[Vertex], indices: &[usize]) {
        let uniforms = frame_uniforms(&self.transform, &self.settings);
        let shaded = Scene::shade_all(&uniforms, vertices);
        let mut rasterizer = Rasterizer::new(
            &mut self.frame,
            &uniforms,
            self.settings.polygon_mode,
            self.settings.culling,
        );
        let mut drawn = 0;
        for pair in indices.chunks_exact(2) {
            let (a, b) = (&shaded[pair[0]], &shaded[pair[1]]);
            if let Some([a, b]) = clip::clip_line(a, b) {
                rasterizer.plot_line(&a, &b);
                drawn += 1;
            }
        }
        debug!("draw_lines: {} submitted, {} drawn", indices.len() / 2, drawn);
    }

    /// Draw indexed triangles: vertex shading, clipping against the view volume,
    /// re-triangulation of the clipped polygons, face culling and rasterization.
    ///
    /// Panics if an index is out of range for `vertices`.
    pub fn draw_triangles(&mut self, vertices: &[Vertex], indices: &[usize]) {
        let uniforms = frame_uniforms(&self.transform, &self.settings);
        let shaded = Scene::shade_all(&uniforms, vertices);
        let mut rasterizer = Rasterizer::new(
            &mut self.frame,
            &uniforms,
            self.settings.polygon_mode,
            self.settings.culling,
        );
        let (mut clipped_count, mut culled_count) = (0, 0);
        for face in indices.chunks_exact(3) {
            let triangle = [shaded[face[0]], shaded[face[1]], shaded[face[2]]];
            // Flat attributes come from the submitted face so clipped pieces match.
            let flat = rasterizer.flat_varyings(&triangle);
            let clipped = clip::clip_triangle(&triangle);
            if clipped.is_empty() {
                trace!("triangle {:?} clipped away", face);
            }
            for piece in &clipped {
                clipped_count += 1;
                if !rasterizer.plot_triangle(piece, flat.as_ref()) {
                    culled_count += 1;
                }
            }
        }
        debug!(
            "draw_triangles: {} submitted, {} after clipping, {} culled",
            indices.len() / 3,
            clipped_count,
            culled_count
        );
    }
}
