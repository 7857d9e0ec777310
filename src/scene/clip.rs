//! Clipping against the canonical view volume in homogeneous clip space, before the
//! perspective divide. A vertex is inside when `-w <= x, y, z <= w`.

use super::shader::ShadedVertex;

/// Smallest cross product norm (in normalized device coordinates) of a triangle kept
/// after clipping.
const MIN_AREA: f32 = 1.0e-12;

/// The six planes of the clip volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipPlane {
    Left,   // x >= -w
    Right,  // x <= w
    Bottom, // y >= -w
    Top,    // y <= w
    Near,   // z >= -w
    Far,    // z <= w
}

impl ClipPlane {
    pub const ALL: [ClipPlane; 6] = [
        ClipPlane::Left,
        ClipPlane::Right,
        ClipPlane::Bottom,
        ClipPlane::Top,
        ClipPlane::Near,
        ClipPlane::Far,
    ];

    /// Signed distance to the plane, positive inside the clip volume.
    pub fn signed_distance(&self, v: &ShadedVertex) -> f32 {
        let p = v.position;
        match self {
            ClipPlane::Left => p.w + p.x,
            ClipPlane::Right => p.w - p.x,
            ClipPlane::Bottom => p.w + p.y,
            ClipPlane::Top => p.w - p.y,
            ClipPlane::Near => p.w + p.z,
            ClipPlane::Far => p.w - p.z,
        }
    }
}

fn is_inside(v: &ShadedVertex) -> bool {
    return ClipPlane::ALL.iter().all(|plane| plane.signed_distance(v) >= 0.0);
}

pub fn clip_point(v: &ShadedVertex) -> Option<ShadedVertex> {
    if is_inside(v) {
        return Some(*v);
    }
    return None;
}

/// Liang-Barsky clipping of the segment a-b. The parametric range [t_in, t_out] is narrowed
/// plane by plane; the segment is discarded once the range becomes empty.
pub fn clip_line(a: &ShadedVertex, b: &ShadedVertex) -> Option<[ShadedVertex; 2]> {
    let mut t_in: f32 = 0.0;
    let mut t_out: f32 = 1.0;
    for plane in ClipPlane::ALL {
        let d_a = plane.signed_distance(a);
        let d_b = plane.signed_distance(b);
        if d_a < 0.0 && d_b < 0.0 {
            return None;
        }
        if d_a < 0.0 {
            // Entering the half-space.
            t_in = t_in.max(d_a / (d_a - d_b));
        } else if d_b < 0.0 {
            // Leaving the half-space.
            t_out = t_out.min(d_a / (d_a - d_b));
        }
        if t_in > t_out {
            return None;
        }
    }

    let start = if t_in > 0.0 { a.lerp(b, t_in) } else { *a };
    let end = if t_out < 1.0 { a.lerp(b, t_out) } else { *b };
    return Some([start, end]);
}

/// One Sutherland-Hodgman step: keeps the part of a convex polygon inside `plane`.
fn clip_polygon_against_plane(polygon: &[ShadedVertex], plane: ClipPlane) -> Vec<ShadedVertex> {
    let mut clipped = Vec::with_capacity(polygon.len() + 1);
    for i in 0..polygon.len() {
        let current = &polygon[i];
        let next = &polygon[(i + 1) % polygon.len()];
        let d_current = plane.signed_distance(current);
        let d_next = plane.signed_distance(next);

        if d_current >= 0.0 {
            clipped.push(*current);
        }
        if (d_current >= 0.0) != (d_next >= 0.0) {
            let t = d_current / (d_current - d_next);
            clipped.push(current.lerp(next, t));
        }
    }
    return clipped;
}

/// Twice the area of a triangle after the perspective divide. Zero for triangles with
/// a vertex at w = 0.
fn ndc_area(triangle: &[ShadedVertex; 3]) -> f32 {
    let project = |v: &ShadedVertex| {
        if v.position.w == 0.0 {
            return None;
        }
        return Some(v.position.xyz() / v.position.w);
    };
    match (project(&triangle[0]), project(&triangle[1]), project(&triangle[2])) {
        (Some(a), Some(b), Some(c)) => (b - a).cross(&(c - a)).norm(),
        _ => 0.0,
    }
}

/// Clips a triangle against all six planes and splits the resulting convex polygon into a
/// fan around its first vertex. Triangles already inside come back unchanged.
pub fn clip_triangle(triangle: &[ShadedVertex; 3]) -> Vec<[ShadedVertex; 3]> {
    if triangle.iter().all(is_inside) {
        if ndc_area(triangle) <= MIN_AREA {
            return Vec::new();
        }
        return vec![*triangle];
    }

    let mut polygon = triangle.to_vec();
    for plane in ClipPlane::ALL {
        polygon = clip_polygon_against_plane(&polygon, plane);
        if polygon.len() < 3 {
            return Vec::new();
        }
    }

    let mut triangles = Vec::with_capacity(polygon.len() - 2);
    for i in 1..polygon.len() - 1 {
        let fan_triangle = [polygon[0], polygon[i], polygon[i + 1]];
        if ndc_area(&fan_triangle) > MIN_AREA {
            triangles.push(fan_triangle);
        }
    }
    return triangles;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::shader::{make_varyings, tex_coord};
    use nalgebra::{vector, Vector3};

    fn vertex(x: f32, y: f32, z: f32, w: f32, s: f32) -> ShadedVertex {
        return ShadedVertex {
            position: vector![x, y, z, w],
            varyings: make_varyings(Vector3::zeros(), vector![s, 0.0], Vector3::zeros(), Vector3::zeros()),
        };
    }

    fn all_inside(triangles: &[[ShadedVertex; 3]]) -> bool {
        let eps = 1.0e-5;
        return triangles.iter().flatten().all(|v| {
            ClipPlane::ALL.iter().all(|plane| plane.signed_distance(v) >= -eps)
        });
    }

    #[test]
    fn inside_triangle_is_unchanged() {
        let triangle = [
            vertex(-0.5, -0.5, 0.0, 1.0, 0.0),
            vertex(0.5, -0.5, 0.2, 1.0, 0.5),
            vertex(0.0, 0.5, -0.3, 1.0, 1.0),
        ];
        let clipped = clip_triangle(&triangle);
        assert_eq!(clipped, vec![triangle]);
    }

    #[test]
    fn triangle_outside_one_plane_is_discarded() {
        let triangle = [
            vertex(1.5, -0.5, 0.0, 1.0, 0.0),
            vertex(2.5, -0.5, 0.0, 1.0, 0.0),
            vertex(2.0, 0.5, 0.0, 1.0, 0.0),
        ];
        assert!(clip_triangle(&triangle).is_empty());
    }

    #[test]
    fn triangle_behind_camera_is_discarded() {
        let triangle = [
            vertex(0.0, 0.0, 0.0, -1.0, 0.0),
            vertex(0.5, 0.0, 0.0, -1.0, 0.0),
            vertex(0.0, 0.5, 0.0, -1.0, 0.0),
        ];
        assert!(clip_triangle(&triangle).is_empty());
    }

    #[test]
    fn one_corner_cut_gives_two_triangles() {
        // Only the vertex at x = 2 is outside the right plane, so the result is a quad.
        let triangle = [
            vertex(0.0, -0.5, 0.0, 1.0, 0.0),
            vertex(2.0, 0.0, 0.0, 1.0, 1.0),
            vertex(0.0, 0.5, 0.0, 1.0, 0.0),
        ];
        let clipped = clip_triangle(&triangle);
        assert_eq!(clipped.len(), 2);
        assert!(all_inside(&clipped));
        // New vertices sit on x = 1, halfway along the edges, and carry the attribute
        // interpolated at the same parameter.
        for v in clipped.iter().flatten() {
            if (v.position.x - 1.0).abs() < 1.0e-6 {
                assert!((tex_coord(&v.varyings).x - 0.5).abs() < 1.0e-6);
            }
        }
    }

    #[test]
    fn two_corners_cut_gives_one_triangle() {
        let triangle = [
            vertex(0.0, 0.0, 0.0, 1.0, 0.0),
            vertex(3.0, 0.0, 0.0, 1.0, 0.0),
            vertex(3.0, 0.5, 0.0, 1.0, 0.0),
        ];
        let clipped = clip_triangle(&triangle);
        assert_eq!(clipped.len(), 1);
        assert!(all_inside(&clipped));
    }

    #[test]
    fn degenerate_triangle_is_dropped() {
        let triangle = [
            vertex(0.0, 0.0, 0.0, 1.0, 0.0),
            vertex(0.5, 0.5, 0.0, 1.0, 0.0),
            vertex(0.25, 0.25, 0.0, 1.0, 0.0),
        ];
        assert!(clip_triangle(&triangle).is_empty());
    }

    #[test]
    fn line_is_cut_at_both_ends() {
        let a = vertex(-2.0, 0.0, 0.0, 1.0, 0.0);
        let b = vertex(2.0, 0.0, 0.0, 1.0, 1.0);
        let [start, end] = clip_line(&a, &b).unwrap();
        assert!((start.position.x + 1.0).abs() < 1.0e-6);
        assert!((end.position.x - 1.0).abs() < 1.0e-6);
        assert!((tex_coord(&start.varyings).x - 0.25).abs() < 1.0e-6);
        assert!((tex_coord(&end.varyings).x - 0.75).abs() < 1.0e-6);
    }

    #[test]
    fn line_missing_the_volume_is_discarded() {
        // Crosses x = 1 and y = 1 planes but only outside the corner of the volume.
        let a = vertex(0.5, 2.0, 0.0, 1.0, 0.0);
        let b = vertex(2.0, 0.5, 0.0, 1.0, 0.0);
        assert!(clip_line(&a, &b).is_none());
    }

    #[test]
    fn inside_line_and_point_are_kept() {
        let a = vertex(-0.5, 0.0, 0.0, 1.0, 0.0);
        let b = vertex(0.5, 0.2, 0.0, 1.0, 1.0);
        assert_eq!(clip_line(&a, &b), Some([a, b]));
        assert_eq!(clip_point(&a), Some(a));
        assert_eq!(clip_point(&vertex(0.0, 0.0, 2.0, 1.0, 0.0)), None);
    }
}
