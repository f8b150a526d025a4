//! SPIR-V shader loading.

use crate::error::{GpuError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Pipeline stage a shader binary belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// File-name suffix used by the on-disk naming convention.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Vertex => "vert",
            Self::Fragment => "frag",
        }
    }
}

/// Path of a compiled shader: `<dir>/<name>.<stage>.spv`.
pub fn shader_path(dir: &Path, name: &str, stage: ShaderStage) -> PathBuf {
    dir.join(format!("{name}.{}.spv", stage.suffix()))
}

/// Read a SPIR-V binary from disk.
pub fn read_spirv(dir: &Path, name: &str, stage: ShaderStage) -> Result<Vec<u32>> {
    let path = shader_path(dir, name, stage);

    let mut file = File::open(&path).map_err(|source| GpuError::ShaderRead {
        path: path.clone(),
        source,
    })?;

    let code = ash::util::read_spv(&mut file).map_err(|source| GpuError::ShaderRead {
        path: path.clone(),
        source,
    })?;

    tracing::debug!("Loaded shader {} ({} words)", path.display(), code.len());
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_follows_naming_convention() {
        let dir = Path::new("shaders");
        assert_eq!(
            shader_path(dir, "scene", ShaderStage::Vertex),
            PathBuf::from("shaders/scene.vert.spv")
        );
        assert_eq!(
            shader_path(dir, "scene", ShaderStage::Fragment),
            PathBuf::from("shaders/scene.frag.spv")
        );
    }

    #[test]
    fn missing_file_reports_path() {
        let err = read_spirv(Path::new("/nonexistent"), "scene", ShaderStage::Vertex).unwrap_err();
        match err {
            GpuError::ShaderRead { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/scene.vert.spv"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
