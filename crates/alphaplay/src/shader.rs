use std::borrow::Cow;
use std::path::Path;

use wgpu::naga::front::glsl::{Frontend, Options};
use wgpu::naga::ShaderStage;

use crate::error::{PlayerError, PlayerResult};

/// Bundled vertex program: unit quad scaled by the fill transform.
const VERTEX_SOURCE: &str = include_str!("../shaders/composite.vert");
/// Bundled fragment program: dual-region recombination.
const FRAGMENT_SOURCE: &str = include_str!("../shaders/composite.frag");

/// Vertex + fragment program text handed to a backend.
///
/// Program text is data: layout variants are selected with uniforms, so one
/// program serves every [`LayoutSpec`](crate::LayoutSpec).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderProgram {
    pub vertex: Cow<'static, str>,
    pub fragment: Cow<'static, str>,
}

impl ShaderProgram {
    pub fn bundled() -> Self {
        Self {
            vertex: Cow::Borrowed(VERTEX_SOURCE),
            fragment: Cow::Borrowed(FRAGMENT_SOURCE),
        }
    }

    /// Bundled vertex program with the fragment program read from `path`.
    ///
    /// An unreadable file is reported as a compile failure: a missing program
    /// is a packaging defect, not a runtime condition.
    pub fn with_fragment_file(path: &Path) -> PlayerResult<Self> {
        let fragment = std::fs::read_to_string(path).map_err(|err| {
            PlayerError::shader_compile(
                ShaderStage::Fragment,
                format!("failed to read {}: {err}", path.display()),
            )
        })?;
        Ok(Self {
            vertex: Cow::Borrowed(VERTEX_SOURCE),
            fragment: Cow::Owned(fragment),
        })
    }

    /// Parses both stages with naga's GLSL frontend.
    pub fn validate(&self) -> PlayerResult<()> {
        validate_stage(&self.vertex, ShaderStage::Vertex)?;
        validate_stage(&self.fragment, ShaderStage::Fragment)?;
        Ok(())
    }
}

impl Default for ShaderProgram {
    fn default() -> Self {
        Self::bundled()
    }
}

fn validate_stage(source: &str, stage: ShaderStage) -> PlayerResult<()> {
    let mut frontend = Frontend::default();
    frontend
        .parse(&Options::from(stage), source)
        .map(|_| ())
        .map_err(|errors| {
            let message = errors
                .errors
                .iter()
                .map(|error| error.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            PlayerError::shader_compile(stage, message)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_program_validates() {
        ShaderProgram::bundled().validate().unwrap();
    }

    #[test]
    fn broken_fragment_is_a_compile_error() {
        let program = ShaderProgram {
            vertex: Cow::Borrowed(VERTEX_SOURCE),
            fragment: Cow::Borrowed("#version 450\nvoid main() { undefined_call(); }\n"),
        };
        let err = program.validate().unwrap_err();
        assert!(matches!(
            err,
            PlayerError::ShaderCompile {
                stage: ShaderStage::Fragment,
                ..
            }
        ));
    }

    #[test]
    fn missing_fragment_file_is_a_compile_error() {
        let err = ShaderProgram::with_fragment_file(Path::new("/nope/alpha.frag")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ShaderCompile);
    }

    #[test]
    fn bundled_sources_share_the_uniform_block() {
        for source in [VERTEX_SOURCE, FRAGMENT_SOURCE] {
            assert!(source.contains("uniform CompositeParams"));
        }
    }
}
