use std::fmt;
use std::path::PathBuf;

use wgpu::naga::ShaderStage;

pub type PlayerResult<T> = Result<T, PlayerError>;

/// Category reported alongside every `Error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MediaLoad,
    ContextUnavailable,
    ContextLost,
    ShaderCompile,
    AutoplayBlocked,
}

impl ErrorKind {
    /// Only lost contexts are retried by the player itself.
    pub fn is_recoverable(self) -> bool {
        matches!(self, ErrorKind::ContextLost)
    }

    /// Fatal kinds halt the render loop for this player instance.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::ContextUnavailable | ErrorKind::ShaderCompile)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::MediaLoad => "MediaLoadError",
            ErrorKind::ContextUnavailable => "ContextUnavailable",
            ErrorKind::ContextLost => "ContextLost",
            ErrorKind::ShaderCompile => "ShaderCompileError",
            ErrorKind::AutoplayBlocked => "AutoplayBlocked",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("media failed to load: {0}")]
    MediaLoad(#[from] MediaError),
    #[error("accelerated rendering is unavailable: {0}")]
    ContextUnavailable(String),
    #[error("rendering context lost")]
    ContextLost,
    #[error("{stage:?} shader failed to compile: {message}")]
    ShaderCompile { stage: ShaderStage, message: String },
    #[error("autoplay blocked by policy (muted: {muted})")]
    AutoplayBlocked { muted: bool },
}

impl PlayerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlayerError::MediaLoad(_) => ErrorKind::MediaLoad,
            PlayerError::ContextUnavailable(_) => ErrorKind::ContextUnavailable,
            PlayerError::ContextLost => ErrorKind::ContextLost,
            PlayerError::ShaderCompile { .. } => ErrorKind::ShaderCompile,
            PlayerError::AutoplayBlocked { .. } => ErrorKind::AutoplayBlocked,
        }
    }

    pub fn context_unavailable(message: impl Into<String>) -> Self {
        Self::ContextUnavailable(message.into())
    }

    pub fn shader_compile(stage: ShaderStage, message: impl Into<String>) -> Self {
        Self::ShaderCompile {
            stage,
            message: message.into(),
        }
    }
}

/// Failures raised by a [`MediaElement`](crate::media::MediaElement).
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("unsupported url scheme in '{0}'")]
    UnsupportedScheme(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{0} contains no decodable frames")]
    Empty(PathBuf),
    #[error("frame {index} is {width}x{height}, expected {expected_width}x{expected_height}")]
    FrameSize {
        index: usize,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
    #[error("no clip registered under '{0}'")]
    NotFound(String),
    #[error("no media loaded")]
    NotLoaded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(PlayerError::ContextLost.kind(), ErrorKind::ContextLost);
        assert_eq!(
            PlayerError::MediaLoad(MediaError::NotLoaded).kind(),
            ErrorKind::MediaLoad
        );
        assert_eq!(
            PlayerError::shader_compile(ShaderStage::Fragment, "boom").kind(),
            ErrorKind::ShaderCompile
        );
    }

    #[test]
    fn only_context_loss_is_recoverable() {
        assert!(ErrorKind::ContextLost.is_recoverable());
        assert!(!ErrorKind::MediaLoad.is_recoverable());
        assert!(ErrorKind::ShaderCompile.is_fatal());
        assert!(ErrorKind::ContextUnavailable.is_fatal());
        assert!(!ErrorKind::AutoplayBlocked.is_fatal());
    }

    #[test]
    fn display_uses_taxonomy_names() {
        assert_eq!(ErrorKind::MediaLoad.to_string(), "MediaLoadError");
        assert_eq!(ErrorKind::ShaderCompile.to_string(), "ShaderCompileError");
    }
}
