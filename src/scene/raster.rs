//! Conversion of clipped primitives into pixels: point plotting, Bresenham lines and
//! scanline triangle filling, with face culling and the depth test.

use std::str::FromStr;

use na::{vector, Vector2};
use nalgebra as na;

use super::buffer::FrameBuffer;
use super::shader::{shade_fragment, ShadedVertex, ShadingModel, Uniforms, Varyings};
use crate::error::Error;
use crate::util::to_rgb8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonMode {
    Point,
    Line,
    Fill,
}

impl FromStr for PolygonMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "point" | "points" => Ok(PolygonMode::Point),
            "line" | "lines" | "wireframe" => Ok(PolygonMode::Line),
            "fill" => Ok(PolygonMode::Fill),
            _ => Err(Error::InvalidArgument(format!("unknown polygon mode '{}'", s))),
        }
    }
}

/// Which triangles are dropped before rasterization. Counter-clockwise winding on screen
/// is the front face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    FrontFace,
    BackFace,
}

impl FromStr for CullMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(CullMode::None),
            "front" | "frontface" => Ok(CullMode::FrontFace),
            "back" | "backface" => Ok(CullMode::BackFace),
            _ => Err(Error::InvalidArgument(format!("unknown culling mode '{}'", s))),
        }
    }
}

impl CullMode {
    /// `signed_area` is positive for counter-clockwise triangles.
    pub fn culls(&self, signed_area: f32) -> bool {
        match self {
            CullMode::None => false,
            CullMode::FrontFace => signed_area > 0.0,
            CullMode::BackFace => signed_area < 0.0,
        }
    }
}

/// Window coordinates in [-1, 1] to continuous pixel coordinates in [0, width] x [0, height].
pub fn to_pixel(window: Vector2<f32>, width: u32, height: u32) -> Vector2<f32> {
    return vector![
        (window.x + 1.0) / 2.0 * width as f32,
        (window.y + 1.0) / 2.0 * height as f32
    ];
}

/// Exact inverse of `to_pixel`.
pub fn to_window(pixel: Vector2<f32>, width: u32, height: u32) -> Vector2<f32> {
    return vector![
        2.0 * pixel.x / width as f32 - 1.0,
        2.0 * pixel.y / height as f32 - 1.0
    ];
}

/// Vertex after the perspective divide. Varyings are stored divided by w so that linear
/// interpolation in screen space stays perspective correct.
#[derive(Debug, Clone, Copy)]
struct WindowVertex {
    pixel: Vector2<f32>,
    depth: f32,
    inv_w: f32,
    varyings: Varyings,
}

impl WindowVertex {
    fn lerp(&self, other: &WindowVertex, t: f32) -> WindowVertex {
        return WindowVertex {
            pixel: self.pixel.lerp(&other.pixel, t),
            depth: self.depth + (other.depth - self.depth) * t,
            inv_w: self.inv_w + (other.inv_w - self.inv_w) * t,
            varyings: self.varyings.lerp(&other.varyings, t),
        };
    }

    fn varyings(&self) -> Varyings {
        return self.varyings / self.inv_w;
    }

    /// Integer pixel holding this vertex, pulled inside the buffer for vertices lying on
    /// the right or top boundary of the view volume.
    fn coord(&self, width: u32, height: u32) -> (i32, i32) {
        let x = (self.pixel.x.floor() as i32).clamp(0, width as i32 - 1);
        let y = (self.pixel.y.floor() as i32).clamp(0, height as i32 - 1);
        return (x, y);
    }
}

/// Twice the signed area of a screen-space triangle, positive when counter-clockwise.
fn signed_area(a: Vector2<f32>, b: Vector2<f32>, c: Vector2<f32>) -> f32 {
    return (b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y);
}

/// Walks primitives of one draw call into a frame buffer.
pub struct Rasterizer<'f, 'u> {
    frame: &'f mut FrameBuffer,
    uniforms: &'f Uniforms<'u>,
    polygon_mode: PolygonMode,
    culling: CullMode,
}

impl<'f, 'u> Rasterizer<'f, 'u> {
    pub fn new(
        frame: &'f mut FrameBuffer,
        uniforms: &'f Uniforms<'u>,
        polygon_mode: PolygonMode,
        culling: CullMode,
    ) -> Self {
        return Self {
            frame,
            uniforms,
            polygon_mode,
            culling,
        };
    }

    fn is_empty(&self) -> bool {
        return self.frame.width() == 0 || self.frame.height() == 0;
    }

    fn to_window_vertex(&self, v: &ShadedVertex) -> Option<WindowVertex> {
        let w = v.position.w;
        if !(w > 0.0) {
            return None;
        }
        let inv_w = 1.0 / w;
        let ndc = v.position.xyz() * inv_w;
        return Some(WindowVertex {
            pixel: to_pixel(ndc.xy(), self.frame.width(), self.frame.height()),
            depth: ndc.z,
            inv_w,
            varyings: v.varyings * inv_w,
        });
    }

    /// Depth test, then fragment shader and color write for fragments that pass.
    fn plot(&mut self, x: i32, y: i32, depth: f32, varyings: &Varyings) {
        if self.frame.test_and_set_depth(x, y, depth) {
            let color = shade_fragment(self.uniforms, varyings);
            self.frame.set_pixel(x, y, to_rgb8(color));
        }
    }

    /// Plot a point given in clip space.
    pub fn plot_point(&mut self, v: &ShadedVertex) {
        if self.is_empty() {
            return;
        }
        if let Some(wv) = self.to_window_vertex(v) {
            self.plot_window_point(&wv, None);
        }
    }

    /// Plot a line between two clip-space vertices.
    pub fn plot_line(&mut self, a: &ShadedVertex, b: &ShadedVertex) {
        if self.is_empty() {
            return;
        }
        if let (Some(wa), Some(wb)) = (self.to_window_vertex(a), self.to_window_vertex(b)) {
            self.plot_window_line(&wa, &wb, None);
        }
    }

    /// Attributes shared by every fragment of a flat shaded triangle: the average over its
    /// three vertices. None for the other shading models.
    pub fn flat_varyings(&self, triangle: &[ShadedVertex; 3]) -> Option<Varyings> {
        match self.uniforms.shading {
            ShadingModel::Flat => {
                Some((triangle[0].varyings + triangle[1].varyings + triangle[2].varyings) / 3.0)
            }
            _ => None,
        }
    }

    /// Plot a triangle according to the polygon mode. Returns false when it was culled.
    ///
    /// `flat` overrides the attributes of every fragment. Pieces of a clipped triangle
    /// should all receive the value computed from the submitted triangle; when None and
    /// shading is flat, the average over `triangle` is used.
    pub fn plot_triangle(&mut self, triangle: &[ShadedVertex; 3], flat: Option<&Varyings>) -> bool {
        if self.is_empty() {
            return true;
        }
        let (a, b, c) = match (
            self.to_window_vertex(&triangle[0]),
            self.to_window_vertex(&triangle[1]),
            self.to_window_vertex(&triangle[2]),
        ) {
            (Some(a), Some(b), Some(c)) => (a, b, c),
            _ => return true,
        };
        if self.culling.culls(signed_area(a.pixel, b.pixel, c.pixel)) {
            return false;
        }

        let own_flat = match flat {
            Some(_) => None,
            None => self.flat_varyings(triangle),
        };
        let flat = flat.or(own_flat.as_ref());

        match self.polygon_mode {
            PolygonMode::Point => {
                for v in [&a, &b, &c] {
                    self.plot_window_point(v, flat);
                }
            }
            PolygonMode::Line => {
                self.plot_window_line(&a, &b, flat);
                self.plot_window_line(&b, &c, flat);
                self.plot_window_line(&c, &a, flat);
            }
            PolygonMode::Fill => self.fill_triangle(a, b, c, flat),
        }
        return true;
    }

    fn plot_window_point(&mut self, v: &WindowVertex, flat: Option<&Varyings>) {
        let (x, y) = v.coord(self.frame.width(), self.frame.height());
        let varyings = flat.copied().unwrap_or_else(|| v.varyings());
        self.plot(x, y, v.depth, &varyings);
    }

    /// Bresenham's algorithm for all octants. Steep lines are walked along y by swapping
    /// axes, and endpoints are put in a canonical order so a line rasterizes to the same
    /// pixels in both directions.
    fn plot_window_line(&mut self, a: &WindowVertex, b: &WindowVertex, flat: Option<&Varyings>) {
        let (width, height) = (self.frame.width(), self.frame.height());
        let (mut start, mut end) = (*a, *b);
        let (mut x_0, mut y_0) = start.coord(width, height);
        let (mut x_1, mut y_1) = end.coord(width, height);

        let steep = (y_1 - y_0).abs() > (x_1 - x_0).abs();
        if steep {
            std::mem::swap(&mut x_0, &mut y_0);
            std::mem::swap(&mut x_1, &mut y_1);
        }
        if (x_0, y_0) > (x_1, y_1) {
            std::mem::swap(&mut x_0, &mut x_1);
            std::mem::swap(&mut y_0, &mut y_1);
            std::mem::swap(&mut start, &mut end);
        }

        let dx = x_1 - x_0;
        let dy = (y_1 - y_0).abs();
        let sy = if y_0 < y_1 { 1 } else { -1 };
        let mut error = 2 * dy - dx;
        let mut y = y_0;
        for x in x_0..=x_1 {
            // Attributes follow the position along the dominant axis.
            let t = if dx == 0 { 0.0 } else { (x - x_0) as f32 / dx as f32 };
            let fragment = start.lerp(&end, t);
            let varyings = flat.copied().unwrap_or_else(|| fragment.varyings());
            let (px, py) = if steep { (y, x) } else { (x, y) };
            self.plot(px, py, fragment.depth, &varyings);

            if error > 0 {
                y += sy;
                error -= 2 * dx;
            }
            error += 2 * dy;
        }
    }

    /// Splits the triangle at the middle vertex into a lower and an upper half and fills
    /// both with horizontal spans.
    fn fill_triangle(
        &mut self,
        a: WindowVertex,
        b: WindowVertex,
        c: WindowVertex,
        flat: Option<&Varyings>,
    ) {
        let mut sorted = [a, b, c];
        sorted.sort_by(|p, q| p.pixel.y.total_cmp(&q.pixel.y));
        let [bottom, middle, top] = sorted;
        if top.pixel.y <= bottom.pixel.y {
            return;
        }
        self.fill_half_triangle(&bottom, &top, &bottom, &middle, flat);
        self.fill_half_triangle(&bottom, &top, &middle, &top, flat);
    }

    /// Fills the rows whose pixel centers lie in [short_start.y, short_end.y) between the
    /// long edge and one short edge. Spans cover pixel centers in [left.x, right.x), which
    /// keeps triangles sharing an edge from overlapping or leaving gaps.
    fn fill_half_triangle(
        &mut self,
        long_start: &WindowVertex,
        long_end: &WindowVertex,
        short_start: &WindowVertex,
        short_end: &WindowVertex,
        flat: Option<&Varyings>,
    ) {
        let height = self.frame.height() as i32;
        let width = self.frame.width() as i32;
        let long_height = long_end.pixel.y - long_start.pixel.y;
        let short_height = short_end.pixel.y - short_start.pixel.y;
        if short_height <= 0.0 {
            return;
        }

        let row_begin = ((short_start.pixel.y - 0.5).ceil() as i32).max(0);
        let row_end = ((short_end.pixel.y - 0.5).ceil() as i32).min(height);
        for row in row_begin..row_end {
            let y_center = row as f32 + 0.5;
            let on_long = long_start.lerp(long_end, (y_center - long_start.pixel.y) / long_height);
            let on_short = short_start.lerp(short_end, (y_center - short_start.pixel.y) / short_height);
            let (left, right) = if on_long.pixel.x <= on_short.pixel.x {
                (on_long, on_short)
            } else {
                (on_short, on_long)
            };

            let span = right.pixel.x - left.pixel.x;
            let col_begin = ((left.pixel.x - 0.5).ceil() as i32).max(0);
            let col_end = ((right.pixel.x - 0.5).ceil() as i32).min(width);
            for col in col_begin..col_end {
                let x_center = col as f32 + 0.5;
                let t = if span > 0.0 { (x_center - left.pixel.x) / span } else { 0.0 };
                let fragment = left.lerp(&right, t);
                let varyings = flat.copied().unwrap_or_else(|| fragment.varyings());
                self.plot(col, row, fragment.depth, &varyings);
            }
        }
    }
}
