use thiserror::Error;

#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Could not obtain a graphics device: {0}")]
    DeviceUnavailable(String),
    #[error("Shader compilation failed: {0}")]
    ShaderCompile(String),
    #[error("Shader program link failed: {0}")]
    ShaderLink(String),
    #[error("{0} is not ready yet")]
    ResourceNotReady(&'static str),
    #[error("Malformed parameter: {0}")]
    MalformedParameter(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Failed to load image: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SceneError {
    /// Fatal errors abort setup; everything else is reported and the frame goes on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SceneError::DeviceUnavailable(_)
                | SceneError::ShaderCompile(_)
                | SceneError::ShaderLink(_)
        )
    }
}

pub type SceneResult<T> = Result<T, SceneError>;
