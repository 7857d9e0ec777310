//! Vertex and fragment stages of the pipeline together with the uniforms they share.

use std::path::Path;
use std::str::FromStr;

use image::RgbImage;
use log::debug;
use na::{vector, Matrix3, Matrix4, SVector, Vector2, Vector3, Vector4};
use nalgebra as na;

use super::transform::TransformStack;
use crate::error::Error;
use crate::util::{from_rgb8, to_hom_point, try_normalize, Vertex};

/// Per-vertex values interpolated across primitives:
/// eye-space normal (3), texture coordinate (2), eye-space position (3), lit color (3).
pub type Varyings = SVector<f32, 11>;

const NORMAL: usize = 0;
const TEX_COORD: usize = 3;
const EYE_POSITION: usize = 5;
const COLOR: usize = 8;

pub fn make_varyings(
    normal: Vector3<f32>,
    tex_coord: Vector2<f32>,
    eye_position: Vector3<f32>,
    color: Vector3<f32>,
) -> Varyings {
    let mut v = Varyings::zeros();
    v.fixed_rows_mut::<3>(NORMAL).copy_from(&normal);
    v.fixed_rows_mut::<2>(TEX_COORD).copy_from(&tex_coord);
    v.fixed_rows_mut::<3>(EYE_POSITION).copy_from(&eye_position);
    v.fixed_rows_mut::<3>(COLOR).copy_from(&color);
    return v;
}

pub fn normal(v: &Varyings) -> Vector3<f32> {
    return v.fixed_rows::<3>(NORMAL).into_owned();
}

pub fn tex_coord(v: &Varyings) -> Vector2<f32> {
    return v.fixed_rows::<2>(TEX_COORD).into_owned();
}

pub fn eye_position(v: &Varyings) -> Vector3<f32> {
    return v.fixed_rows::<3>(EYE_POSITION).into_owned();
}

pub fn color(v: &Varyings) -> Vector3<f32> {
    return v.fixed_rows::<3>(COLOR).into_owned();
}

/// Output of the vertex shader: clip-space position and the values to interpolate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadedVertex {
    pub position: Vector4<f32>,
    pub varyings: Varyings,
}

impl ShadedVertex {
    /// Linear interpolation of position and every attribute at the same parameter.
    pub fn lerp(&self, other: &ShadedVertex, t: f32) -> ShadedVertex {
        return ShadedVertex {
            position: self.position.lerp(&other.position, t),
            varyings: self.varyings.lerp(&other.varyings, t),
        };
    }
}

/// Where the lighting equation is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadingModel {
    /// Material color, no lighting.
    Unlit,
    /// One diffuse evaluation per triangle with the averaged normal.
    Flat,
    /// Diffuse evaluated per vertex, color interpolated.
    Gouraud,
    /// Ambient, diffuse and specular evaluated per pixel.
    Phong,
}

impl FromStr for ShadingModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unlit" | "none" => Ok(ShadingModel::Unlit),
            "flat" => Ok(ShadingModel::Flat),
            "gouraud" => Ok(ShadingModel::Gouraud),
            "phong" => Ok(ShadingModel::Phong),
            _ => Err(Error::InvalidArgument(format!("unknown shading model '{}'", s))),
        }
    }
}

/// Directional light, given in eye space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub direction: Vector3<f32>, // Points from the surface towards the light.
    pub ambient: Vector3<f32>,
    pub diffuse: Vector3<f32>,
    pub specular: Vector3<f32>,
}

impl Default for Light {
    fn default() -> Self {
        return Self {
            direction: vector![0.0, 0.0, 1.0], // Directed to us from the screen.
            ambient: vector![0.1, 0.1, 0.1],
            diffuse: vector![0.9, 0.9, 0.9],
            specular: vector![0.5, 0.5, 0.5],
        };
    }
}

#[derive(Debug, Clone)]
pub struct Material {
    pub color: Vector3<f32>,
    pub specular: Vector3<f32>,
    pub shininess: f32,
    pub texture: Option<RgbImage>, // Modulates color when present.
}

impl Default for Material {
    fn default() -> Self {
        return Self {
            color: vector![1.0, 1.0, 1.0],
            specular: vector![1.0, 1.0, 1.0],
            shininess: 32.0,
            texture: None,
        };
    }
}

impl Material {
    pub fn with_color(color: Vector3<f32>) -> Self {
        return Self {
            color,
            ..Default::default()
        };
    }

    /// Reads an image file and uses it as the texture of this material.
    pub fn load_texture<P: AsRef<Path>>(&mut self, path: P) -> crate::error::Result<()> {
        let texture = image::open(path.as_ref())?.to_rgb8();
        debug!("texture {} is {}x{}", path.as_ref().display(), texture.width(), texture.height());
        self.texture = Some(texture);
        return Ok(());
    }

    /// Base color at a texture coordinate.
    pub fn surface_color(&self, tex_coord: Vector2<f32>) -> Vector3<f32> {
        match &self.texture {
            Some(texture) => self.color.component_mul(&sample_nearest(texture, tex_coord)),
            None => self.color,
        }
    }
}

/// Nearest texel lookup with repeat wrapping. t = 0 is the bottom row of the image.
fn sample_nearest(texture: &RgbImage, tex_coord: Vector2<f32>) -> Vector3<f32> {
    let (width, height) = texture.dimensions();
    if width == 0 || height == 0 || !tex_coord.iter().all(|c| c.is_finite()) {
        return vector![1.0, 1.0, 1.0];
    }
    let u = tex_coord.x - tex_coord.x.floor();
    let v = 1.0 - (tex_coord.y - tex_coord.y.floor());
    let x = ((u * width as f32) as u32).min(width - 1);
    let y = ((v * height as f32) as u32).min(height - 1);
    return from_rgb8(texture.get_pixel(x, y).0);
}

/// Frame constants for one draw call.
pub struct Uniforms<'a> {
    pub model_view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub normal_matrix: Matrix3<f32>, // Inverse transpose of the model-view's linear part.
    pub shading: ShadingModel,
    pub light: &'a Light,
    pub material: &'a Material,
}

impl<'a> Uniforms<'a> {
    pub fn new(
        transform: &TransformStack,
        shading: ShadingModel,
        light: &'a Light,
        material: &'a Material,
    ) -> Self {
        let model_view = *transform.model_view();
        let linear: Matrix3<f32> = model_view.fixed_slice::<3, 3>(0, 0).into_owned();
        let normal_matrix = linear
            .try_inverse()
            .map(|inverse| inverse.transpose())
            .unwrap_or_else(Matrix3::identity);
        return Self {
            model_view,
            projection: *transform.projection(),
            normal_matrix,
            shading,
            light,
            material,
        };
    }
}

/// Unit normal for lighting. Degenerate normals are replaced by the direction towards the
/// viewer, and failing that by +z.
fn resolve_normal(normal: Vector3<f32>, eye_position: Vector3<f32>) -> Vector3<f32> {
    return try_normalize(normal)
        .or_else(|| try_normalize(-eye_position))
        .unwrap_or_else(|| vector![0.0, 0.0, 1.0]);
}

/// Ambient plus Lambertian term.
fn diffuse_lighting(light: &Light, base: Vector3<f32>, normal: Vector3<f32>) -> Vector3<f32> {
    let to_light = try_normalize(light.direction).unwrap_or_else(|| vector![0.0, 0.0, 1.0]);
    let diff_coef = normal.dot(&to_light).max(0.0);
    return light.ambient.component_mul(&base) + diff_coef * light.diffuse.component_mul(&base);
}

fn phong_lighting(
    light: &Light,
    material: &Material,
    base: Vector3<f32>,
    normal: Vector3<f32>,
    eye_position: Vector3<f32>,
) -> Vector3<f32> {
    let mut color = diffuse_lighting(light, base, normal);
    let to_light = try_normalize(light.direction).unwrap_or_else(|| vector![0.0, 0.0, 1.0]);
    let n_dot_l = normal.dot(&to_light);
    if n_dot_l > 0.0 {
        let reflected = 2.0 * n_dot_l * normal - to_light;
        let to_viewer = try_normalize(-eye_position).unwrap_or_else(|| vector![0.0, 0.0, 1.0]);
        let spec_coef = reflected.dot(&to_viewer).max(0.0).powf(material.shininess);
        color += spec_coef * light.specular.component_mul(&material.specular);
    }
    return color;
}

/// The vertex shader: model-view and projection for the position, normal matrix for the
/// normal, and per-vertex lighting when shading is Gouraud.
pub fn shade_vertex(uniforms: &Uniforms, vertex: &Vertex) -> ShadedVertex {
    let eye = uniforms.model_view * to_hom_point(vertex.position);
    let eye_position = eye.xyz() / if eye.w != 0.0 { eye.w } else { 1.0 };
    let normal = uniforms.normal_matrix * vertex.normal;

    let lit_color = match uniforms.shading {
        ShadingModel::Gouraud => diffuse_lighting(
            uniforms.light,
            uniforms.material.surface_color(vertex.tex_coord),
            resolve_normal(normal, eye_position),
        ),
        _ => Vector3::zeros(),
    };

    return ShadedVertex {
        position: uniforms.projection * eye,
        varyings: make_varyings(normal, vertex.tex_coord, eye_position, lit_color),
    };
}

/// The fragment shader: final linear RGB color of a pixel.
pub fn shade_fragment(uniforms: &Uniforms, varyings: &Varyings) -> Vector3<f32> {
    let material = uniforms.material;
    match uniforms.shading {
        ShadingModel::Unlit => material.surface_color(tex_coord(varyings)),
        ShadingModel::Gouraud => color(varyings),
        ShadingModel::Flat => {
            let n = resolve_normal(normal(varyings), eye_position(varyings));
            diffuse_lighting(uniforms.light, material.surface_color(tex_coord(varyings)), n)
        }
        ShadingModel::Phong => {
            let eye = eye_position(varyings);
            let n = resolve_normal(normal(varyings), eye);
            phong_lighting(
                uniforms.light,
                material,
                material.surface_color(tex_coord(varyings)),
                n,
                eye,
            )
        }
    }
}
