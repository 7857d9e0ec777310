use nalgebra as na;
use na::{vector, Vector2, Vector3, Vector4};

/// Number of scalars in one vertex record: position, normal, texture coordinate.
pub const VERTEX_SIZE: usize = 8;

/// Vertex attribute bundle as submitted by geometry producers.
/// Laid out on the wire as `px py pz nx ny nz s t`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    pub position: Vector3<f32>,
    pub normal: Vector3<f32>,
    pub tex_coord: Vector2<f32>,
}

impl Vertex {
    pub fn new(position: Vector3<f32>, normal: Vector3<f32>, tex_coord: Vector2<f32>) -> Self {
        return Self { position, normal, tex_coord };
    }

    /// Vertex with only a position, normal pointing to +z and zero texture coordinate.
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        return Self {
            position: vector![x, y, z],
            normal: vector![0.0, 0.0, 1.0],
            tex_coord: Vector2::zeros(),
        };
    }

    pub fn from_array(v: [f32; VERTEX_SIZE]) -> Self {
        return Self {
            position: vector![v[0], v[1], v[2]],
            normal: vector![v[3], v[4], v[5]],
            tex_coord: vector![v[6], v[7]],
        };
    }

    pub fn to_array(&self) -> [f32; VERTEX_SIZE] {
        let p = self.position;
        let n = self.normal;
        let t = self.tex_coord;
        return [p.x, p.y, p.z, n.x, n.y, n.z, t.x, t.y];
    }

    /// Reads a flat interleaved slice of vertex records. Trailing scalars that do not
    /// form a whole record are ignored.
    pub fn from_interleaved(data: &[f32]) -> Vec<Vertex> {
        return data
            .chunks_exact(VERTEX_SIZE)
            .map(|chunk| {
                let mut record = [0.0; VERTEX_SIZE];
                record.copy_from_slice(chunk);
                Vertex::from_array(record)
            })
            .collect();
    }
}

impl From<[f32; VERTEX_SIZE]> for Vertex {
    fn from(v: [f32; VERTEX_SIZE]) -> Self {
        return Vertex::from_array(v);
    }
}

impl From<Vertex> for [f32; VERTEX_SIZE] {
    fn from(v: Vertex) -> Self {
        return v.to_array();
    }
}

/// Transformation of a point to homogenous coordinates.
pub fn to_hom_point(v: Vector3<f32>) -> Vector4<f32> {
    return vector![v.x, v.y, v.z, 1.0];
}

/// Transformation of a point from homogenous coordinates.
/// Returns None for points at infinity.
pub fn from_hom_point(v: Vector4<f32>) -> Option<Vector3<f32>> {
    if v.w.abs() < f32::EPSILON {
        return None;
    }
    return Some(vector![v.x / v.w, v.y / v.w, v.z / v.w]);
}

/// Float color with channels in [0, 1] to rgb8, clamping out of range values.
pub fn to_rgb8(color: Vector3<f32>) -> [u8; 3] {
    fn channel(c: f32) -> u8 {
        if c.is_nan() {
            return 0;
        }
        return (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
    return [channel(color.x), channel(color.y), channel(color.z)];
}

/// rgb8 to float color with channels in [0, 1].
pub fn from_rgb8(color: [u8; 3]) -> Vector3<f32> {
    return vector![
        color[0] as f32 / 255.0,
        color[1] as f32 / 255.0,
        color[2] as f32 / 255.0
    ];
}

/// Normalizes v, or returns None when it is too short to have a direction.
pub fn try_normalize(v: Vector3<f32>) -> Option<Vector3<f32>> {
    return v.try_normalize(1.0e-8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_array_layout() {
        let raw = [1.0, 2.0, 3.0, 0.0, 1.0, 0.0, 0.25, 0.75];
        let v = Vertex::from(raw);
        assert_eq!(v.position, vector![1.0, 2.0, 3.0]);
        assert_eq!(v.normal, vector![0.0, 1.0, 0.0]);
        assert_eq!(v.tex_coord, vector![0.25, 0.75]);
        assert_eq!(v.to_array(), raw);
    }

    #[test]
    fn interleaved_ignores_partial_record() {
        let mut data = vec![0.0; 2 * VERTEX_SIZE + 3];
        data[VERTEX_SIZE] = 5.0;
        let vertices = Vertex::from_interleaved(&data);
        assert_eq!(vertices.len(), 2);
        assert_eq!(vertices[1].position.x, 5.0);
    }

    #[test]
    fn point_at_infinity_has_no_cartesian_form() {
        assert!(from_hom_point(vector![1.0, 1.0, 1.0, 0.0]).is_none());
        assert_eq!(
            from_hom_point(vector![2.0, 4.0, 6.0, 2.0]),
            Some(vector![1.0, 2.0, 3.0])
        );
    }

    #[test]
    fn rgb8_conversion_clamps() {
        assert_eq!(to_rgb8(vector![1.5, -0.2, 0.5]), [255, 0, 128]);
        assert_eq!(to_rgb8(vector![f32::NAN, 1.0, 0.0]), [0, 255, 0]);
    }
}
