//! Fixed-function style matrix stack.
//!
//! Every composition operator left-multiplies the active matrix by the newly built
//! transform (`active <- T * active`), so a vertex goes through the transforms in the
//! order the calls were made.

use std::str::FromStr;

use log::warn;
use na::{matrix, Matrix4, Rotation3, Unit, Vector3};
use nalgebra as na;

use crate::error::Error;

/// Which of the three matrices the composition operators act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixMode {
    ModelView = 0,
    Projection = 1,
    Texture = 2,
}

impl FromStr for MatrixMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "modelview" | "model_view" => Ok(MatrixMode::ModelView),
            "projection" => Ok(MatrixMode::Projection),
            "texture" => Ok(MatrixMode::Texture),
            _ => Err(Error::InvalidArgument(format!("unknown matrix mode '{}'", s))),
        }
    }
}

/// Three independently selectable 4x4 matrices plus a save stack for each of them.
#[derive(Debug, Clone)]
pub struct TransformStack {
    matrices: [Matrix4<f32>; 3],
    saved: [Vec<Matrix4<f32>>; 3],
    active: MatrixMode,
}

impl Default for TransformStack {
    fn default() -> Self {
        return Self::new();
    }
}

impl TransformStack {
    pub fn new() -> Self {
        return Self {
            matrices: [Matrix4::identity(); 3],
            saved: [Vec::new(), Vec::new(), Vec::new()],
            active: MatrixMode::ModelView,
        };
    }

    /// Change which matrix is active.
    pub fn set_matrix(&mut self, mode: MatrixMode) {
        self.active = mode;
    }

    pub fn active(&self) -> MatrixMode {
        return self.active;
    }

    pub fn matrix(&self, mode: MatrixMode) -> &Matrix4<f32> {
        return &self.matrices[mode as usize];
    }

    pub fn model_view(&self) -> &Matrix4<f32> {
        return self.matrix(MatrixMode::ModelView);
    }

    pub fn projection(&self) -> &Matrix4<f32> {
        return self.matrix(MatrixMode::Projection);
    }

    /// Replaces the active matrix.
    pub fn load_matrix(&mut self, m: Matrix4<f32>) {
        self.matrices[self.active as usize] = m;
    }

    /// Set the active matrix to the identity matrix.
    pub fn load_identity(&mut self) {
        self.load_matrix(Matrix4::identity());
    }

    /// Left-multiplies the active matrix by `m`.
    pub fn mult_matrix(&mut self, m: Matrix4<f32>) {
        let active = &mut self.matrices[self.active as usize];
        *active = m * *active;
    }

    /// Saves a copy of the active matrix.
    pub fn push_matrix(&mut self) {
        let current = self.matrices[self.active as usize];
        self.saved[self.active as usize].push(current);
    }

    /// Restores the last saved copy of the active matrix. Popping an empty stack leaves
    /// the matrix untouched.
    pub fn pop_matrix(&mut self) {
        match self.saved[self.active as usize].pop() {
            Some(m) => self.matrices[self.active as usize] = m,
            None => warn!("pop_matrix on empty {:?} stack ignored", self.active),
        }
    }

    pub fn translate(&mut self, direction: Vector3<f32>) {
        self.mult_matrix(Matrix4::new_translation(&direction));
    }

    /// Rotation by `angle` degrees around `axis` (Rodrigues formula on the normalized axis).
    pub fn rotate(&mut self, angle: f32, axis: Vector3<f32>) {
        let axis = match Unit::try_new(axis, 1.0e-8) {
            Some(axis) => axis,
            None => {
                warn!("rotate around zero axis ignored");
                return;
            }
        };
        let rotation = Rotation3::from_axis_angle(&axis, angle.to_radians());
        self.mult_matrix(rotation.to_homogeneous());
    }

    pub fn scale(&mut self, size: Vector3<f32>) {
        self.mult_matrix(Matrix4::new_nonuniform_scaling(&size));
    }

    /// gluPerspective. `fovy` is in degrees.
    pub fn perspective(&mut self, fovy: f32, aspect: f32, near: f32, far: f32) {
        let half_angle = (fovy / 2.0).to_radians();
        if aspect <= 0.0 || near == far || half_angle.tan() == 0.0 {
            warn!(
                "degenerate perspective (fovy {}, aspect {}, near {}, far {}) ignored",
                fovy, aspect, near, far
            );
            return;
        }
        let f = 1.0 / half_angle.tan();
        let m = matrix![f / aspect, 0.0, 0.0,                         0.0;
                        0.0,        f,   0.0,                         0.0;
                        0.0,        0.0, (far + near) / (near - far), (2.0 * far * near) / (near - far);
                        0.0,        0.0, -1.0,                        0.0];
        self.mult_matrix(m);
    }

    /// glFrustum.
    pub fn frustum(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        if left == right || bottom == top || near == far {
            warn!("degenerate frustum ignored");
            return;
        }
        let width = right - left;
        let height = top - bottom;
        let depth = far - near;
        let m = matrix![2.0 * near / width, 0.0,                 (right + left) / width,  0.0;
                        0.0,                2.0 * near / height, (top + bottom) / height, 0.0;
                        0.0,                0.0,                 -(far + near) / depth,   -2.0 * far * near / depth;
                        0.0,                0.0,                 -1.0,                    0.0];
        self.mult_matrix(m);
    }

    /// glOrtho, built by recentering the viewing box on the origin, rescaling it to the
    /// canonical cube and finally flipping z so the viewer looks down -z.
    pub fn ortho(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        if left == right || bottom == top || near == far {
            warn!("degenerate ortho ignored");
            return;
        }
        self.translate(Vector3::new(
            -(right + left) / 2.0,
            -(top + bottom) / 2.0,
            (far + near) / 2.0,
        ));
        self.scale(Vector3::new(
            2.0 / (right - left),
            2.0 / (top - bottom),
            2.0 / (far - near),
        ));
        self.scale(Vector3::new(1.0, 1.0, -1.0));
    }

    /// gluLookAt: places the camera at `eye` looking at `at` with `up` pointing up.
    pub fn look_at(&mut self, eye: Vector3<f32>, at: Vector3<f32>, up: Vector3<f32>) {
        let forward = match (at - eye).try_normalize(1.0e-8) {
            Some(forward) => forward,
            None => {
                warn!("look_at with coincident eye and target ignored");
                return;
            }
        };
        let side = match forward.cross(&up).try_normalize(1.0e-8) {
            Some(side) => side,
            None => {
                warn!("look_at with up parallel to view direction ignored");
                return;
            }
        };
        let new_up = side.cross(&forward);
        let basis = matrix![side.x,     side.y,     side.z,     0.0;
                            new_up.x,   new_up.y,   new_up.z,   0.0;
                            -forward.x, -forward.y, -forward.z, 0.0;
                            0.0,        0.0,        0.0,        1.0];
        self.mult_matrix(basis * Matrix4::new_translation(&-eye));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use na::{vector, Vector4};

    fn assert_matrix_eq(a: &Matrix4<f32>, b: &Matrix4<f32>) {
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1.0e-5, "{} != {}", a, b);
        }
    }

    #[test]
    fn inverse_sequence_returns_identity() {
        let mut stack = TransformStack::new();
        stack.load_identity();
        stack.translate(vector![1.0, -2.0, 3.5]);
        stack.rotate(37.0, vector![1.0, 2.0, -0.5]);
        stack.scale(vector![2.0, 0.5, 4.0]);
        stack.scale(vector![0.5, 2.0, 0.25]);
        stack.rotate(-37.0, vector![1.0, 2.0, -0.5]);
        stack.translate(vector![-1.0, 2.0, -3.5]);
        assert_matrix_eq(stack.model_view(), &Matrix4::identity());
    }

    #[test]
    fn compositions_left_multiply() {
        let mut stack = TransformStack::new();
        stack.scale(vector![2.0, 2.0, 2.0]);
        stack.translate(vector![1.0, 0.0, 0.0]);
        // Scale first, then translate.
        let p = stack.model_view() * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert_eq!(p, Vector4::new(3.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn rotation_follows_right_hand_rule() {
        let mut stack = TransformStack::new();
        stack.rotate(90.0, vector![0.0, 0.0, 1.0]);
        let p = stack.model_view() * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert!((p - Vector4::new(0.0, 1.0, 0.0, 1.0)).norm() < 1.0e-6);
    }

    #[test]
    fn zero_axis_rotation_is_ignored() {
        let mut stack = TransformStack::new();
        stack.rotate(45.0, Vector3::zeros());
        assert_eq!(*stack.model_view(), Matrix4::identity());
    }

    #[test]
    fn ortho_matches_closed_form() {
        let (l, r, b, t, n, f) = (-2.0, 6.0, -1.0, 3.0, 0.5, 10.0);
        let mut stack = TransformStack::new();
        stack.set_matrix(MatrixMode::Projection);
        stack.ortho(l, r, b, t, n, f);
        let expected = matrix![2.0 / (r - l), 0.0, 0.0, -(r + l) / (r - l);
                               0.0, 2.0 / (t - b), 0.0, -(t + b) / (t - b);
                               0.0, 0.0, -2.0 / (f - n), -(f + n) / (f - n);
                               0.0, 0.0, 0.0, 1.0];
        assert_matrix_eq(stack.projection(), &expected);
        assert_eq!(*stack.model_view(), Matrix4::identity());
    }

    #[test]
    fn perspective_sets_w_to_negated_eye_z() {
        let mut stack = TransformStack::new();
        stack.set_matrix(MatrixMode::Projection);
        stack.perspective(90.0, 1.0, 1.0, 100.0);
        let near = stack.projection() * Vector4::new(0.0, 0.0, -1.0, 1.0);
        let far = stack.projection() * Vector4::new(0.0, 0.0, -100.0, 1.0);
        assert!((near.w - 1.0).abs() < 1.0e-6);
        assert!((near.z / near.w + 1.0).abs() < 1.0e-5);
        assert!((far.z / far.w - 1.0).abs() < 1.0e-4);
    }

    #[test]
    fn symmetric_frustum_equals_perspective() {
        let mut a = TransformStack::new();
        a.perspective(90.0, 2.0, 1.0, 50.0);
        let mut b = TransformStack::new();
        b.frustum(-2.0, 2.0, -1.0, 1.0, 1.0, 50.0);
        assert_matrix_eq(a.model_view(), b.model_view());
    }

    #[test]
    fn degenerate_projection_is_ignored() {
        let mut stack = TransformStack::new();
        stack.perspective(60.0, 0.0, 1.0, 10.0);
        stack.frustum(1.0, 1.0, -1.0, 1.0, 1.0, 10.0);
        stack.ortho(-1.0, 1.0, -1.0, 1.0, 2.0, 2.0);
        assert_eq!(*stack.model_view(), Matrix4::identity());
    }

    #[test]
    fn look_at_places_target_on_negative_z() {
        let mut stack = TransformStack::new();
        let eye = vector![3.0, 2.0, 5.0];
        let at = vector![0.0, 0.0, 0.0];
        stack.look_at(eye, at, vector![0.0, 1.0, 0.0]);
        let e = stack.model_view() * Vector4::new(eye.x, eye.y, eye.z, 1.0);
        assert!(e.xyz().norm() < 1.0e-5);
        let a = stack.model_view() * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!(a.x.abs() < 1.0e-5 && a.y.abs() < 1.0e-5);
        assert!((a.z + eye.norm()).abs() < 1.0e-4);
    }

    #[test]
    fn push_pop_restores_active_matrix_only() {
        let mut stack = TransformStack::new();
        stack.push_matrix();
        stack.translate(vector![1.0, 2.0, 3.0]);
        stack.set_matrix(MatrixMode::Projection);
        stack.scale(vector![2.0, 2.0, 2.0]);
        stack.pop_matrix();
        assert_eq!(stack.projection()[(0, 0)], 2.0);
        stack.set_matrix(MatrixMode::ModelView);
        stack.pop_matrix();
        assert_eq!(*stack.model_view(), Matrix4::identity());
    }

    #[test]
    fn matrix_mode_parses() {
        assert_eq!("Projection".parse::<MatrixMode>().unwrap(), MatrixMode::Projection);
        assert!("view".parse::<MatrixMode>().is_err());
    }
}
