use thiserror::Error;

/// Errors from the fallible edges of the pipeline: asset loading, image export and
/// parsing of configuration values. Geometry itself never produces errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to load OBJ model: {0}")]
    Obj(#[from] obj::ObjError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("frame buffer is empty, nothing to export")]
    EmptyFrame,
}

pub type Result<T> = std::result::Result<T, Error>;
