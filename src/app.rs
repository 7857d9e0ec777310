use std::path::PathBuf;
use std::time;

use clap::Parser;
use log::info;
use na::vector;
use nalgebra as na;
use show_image::{create_window, event, ImageInfo, ImageView, WindowOptions};

use tiny_canvas::{CullMode, MatrixMode, Object, PolygonMode, Scene, ShadingModel};

/// Renders a spinning model with the software pipeline.
#[derive(Parser, Debug)]
pub struct Params {
    /// Viewport width in pixels
    #[arg(long, default_value_t = 800)]
    pub width: u32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 800)]
    pub height: u32,

    /// OBJ model to render, a cube is drawn when omitted
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Texture applied to the model
    #[arg(long)]
    pub texture: Option<PathBuf>,

    /// "point", "line" or "fill"
    #[arg(long, default_value = "fill")]
    pub polygon_mode: String,

    /// "none", "front" or "back"
    #[arg(long, default_value = "back")]
    pub culling: String,

    /// "unlit", "flat", "gouraud" or "phong"
    #[arg(long, default_value = "phong")]
    pub shading: String,

    /// Render a single frame into this image file instead of opening a window
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Show the depth buffer instead of the color buffer
    #[arg(long, default_value_t = false)]
    pub depth: bool,

    /// Log frames per second
    #[arg(long, default_value_t = false)]
    pub print_fps: bool,
}

const SPIN_SPEED: f32 = 45.0; // Degrees per second.

/// Helper, defining exit event to be an Escape key press.
fn is_exit_event(window_event: event::WindowEvent) -> bool {
    if let event::WindowEvent::KeyboardInput(event) = window_event {
        if event.input.key_code == Some(event::VirtualKeyCode::Escape) && event.input.state.is_released() {
            return true;
        }
    }

    return false;
}

/// Camera looking at the origin from slightly above, with a perspective matching the
/// viewport aspect.
fn setup_camera(scene: &mut Scene) {
    let aspect = scene.width() as f32 / scene.height().max(1) as f32;
    scene.set_matrix(MatrixMode::Projection);
    scene.load_identity();
    scene.perspective(45.0, aspect, 0.1, 100.0);
    scene.set_matrix(MatrixMode::ModelView);
    scene.load_identity();
    scene.look_at(vector![0.0, 1.0, 3.5], vector![0.0, 0.0, 0.0], vector![0.0, 1.0, 0.0]);
}

fn render_frame(scene: &mut Scene, object: &mut Object, seconds: f32) {
    scene.clear();
    object.orientation.y = SPIN_SPEED * seconds;
    object.draw(scene);
}

fn frame_data(scene: &Scene, depth: bool) -> Vec<u8> {
    if depth {
        return scene.frame().depth_image_data();
    }
    return scene.as_render_data().to_vec();
}

/// Actualy launches the window, showing images.
/// Takes struct, defining execution context.
pub fn run(params: Params) -> Result<(), Box<dyn std::error::Error>> {
    let mut scene = Scene::new(params.width, params.height);
    scene.set_polygon_mode(params.polygon_mode.parse::<PolygonMode>()?);
    scene.set_culling(params.culling.parse::<CullMode>()?);
    scene.set_shading(params.shading.parse::<ShadingModel>()?);
    if let Some(path) = &params.texture {
        scene.settings.material.load_texture(path)?;
    }
    setup_camera(&mut scene);

    let mut object = match &params.model {
        Some(path) => Object::load(path)?,
        None => Object::cube(),
    };
    // Fit the model into the unit sphere around the origin.
    let reach = object.bound.iter().fold(0.0_f32, |acc, b| acc.max(b.abs()));
    if reach > 0.0 {
        object.scale = 1.0 / reach;
    }
    info!("number of vertices  - {}", object.vertex_count());
    info!("number of triangles - {}", object.triangle_count());

    if let Some(output) = &params.output {
        render_frame(&mut scene, &mut object, 0.0);
        if params.depth {
            let data = scene.frame().depth_image_data();
            image::save_buffer(output, &data, scene.width(), scene.height(), image::ColorType::Rgb8)?;
        } else {
            scene.frame().save(output)?;
        }
        info!("frame written to {}", output.display());
        return Ok(());
    }

    let window_options: WindowOptions = WindowOptions {
        size: Some([params.width, params.height]),
        ..Default::default()
    };
    let window = create_window("output", window_options)?;
    let event_channel = window.event_channel()?;

    let mut exit = false;
    let time_begin = time::Instant::now();
    let mut frame_counter_time_begin = time::Instant::now();
    let mut frame_counter: u32 = 0;
    while !exit {
        let passed_time = time::Instant::now().duration_since(time_begin).as_secs_f32();
        render_frame(&mut scene, &mut object, passed_time);

        let data = frame_data(&scene, params.depth);
        let image_data = ImageView::new(ImageInfo::rgb8(scene.width(), scene.height()), &data);
        window.set_image("image", image_data)?;

        // Unloading all the events that have piled up, looking for exit event.
        exit = event_channel
            .try_iter()
            .map(is_exit_event)
            .fold(false, |was_exit, is_exit| was_exit || is_exit);

        if params.print_fps {
            // Counting frames to printout stats every second.
            frame_counter += 1;
            if time::Instant::now().duration_since(frame_counter_time_begin).as_secs_f32() > 1.0 {
                info!("FPS --- {}", frame_counter);
                frame_counter_time_begin = time::Instant::now();
                frame_counter = 0;
            }
        }
    }

    return Ok(());
}
