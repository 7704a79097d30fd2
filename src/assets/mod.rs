//! Turning files into displayable models.

pub mod fbx_loader;
pub mod gltf_loader;
pub mod placeholder;
pub mod task;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::animation::AnimationClip;
use crate::error::LoadError;
use crate::scene_graph::SceneModel;

pub use task::LoadTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetFormat {
    Gltf,
    Fbx,
}

impl AssetFormat {
    /// Picks the loader from the file extension, ignoring case.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let extension = path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("glb" | "gltf") => Ok(AssetFormat::Gltf),
            Some("fbx") => Ok(AssetFormat::Fbx),
            Some(other) => Err(LoadError::UnsupportedFormat(format!(".{other}"))),
            None => Err(LoadError::UnsupportedFormat(path.display().to_string())),
        }
    }

    pub fn loader(self) -> &'static dyn AssetLoader {
        match self {
            AssetFormat::Gltf => &gltf_loader::GltfLoader,
            AssetFormat::Fbx => &fbx_loader::FbxLoader,
        }
    }
}

/// Where asset data comes from: a file on disk, or bytes already in memory
/// (drag and drop) together with the name they were supplied under.
#[derive(Debug, Clone)]
pub enum AssetSource {
    Path(PathBuf),
    Bytes { name: String, data: Vec<u8> },
}

impl AssetSource {
    pub fn format(&self) -> Result<AssetFormat, LoadError> {
        match self {
            AssetSource::Path(path) => AssetFormat::from_path(path),
            AssetSource::Bytes { name, .. } => AssetFormat::from_path(Path::new(name)),
        }
    }

    /// File name shown in the model info panel.
    pub fn display_name(&self) -> String {
        let path = match self {
            AssetSource::Path(path) => path.as_path(),
            AssetSource::Bytes { name, .. } => Path::new(name),
        };

        path.file_name()
            .and_then(OsStr::to_str)
            .unwrap_or("model")
            .to_string()
    }
}

/// A parsed asset: the node hierarchy plus its animation clips in file order.
pub struct LoadedAsset {
    pub name: String,
    pub model: SceneModel,
    pub clips: Vec<AnimationClip>,
}

pub trait AssetLoader: Send + Sync {
    /// Parses `source`. `progress` receives increasing percentages ending
    /// at 100 on success.
    fn load(&self, source: &AssetSource, progress: &mut dyn FnMut(u8)) -> Result<LoadedAsset, LoadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_are_chosen_by_extension() {
        let format = |path: &str| AssetFormat::from_path(Path::new(path)).ok();

        assert_eq!(format("a/b/Robot.GLB"), Some(AssetFormat::Gltf));
        assert_eq!(format("scene.gltf"), Some(AssetFormat::Gltf));
        assert_eq!(format("dance.fbx"), Some(AssetFormat::Fbx));
        assert!(matches!(
            AssetFormat::from_path(Path::new("mesh.obj")),
            Err(LoadError::UnsupportedFormat(ext)) if ext == ".obj"
        ));
        assert!(AssetFormat::from_path(Path::new("README")).is_err());
    }

    #[test]
    fn display_name_is_the_file_name() {
        let source = AssetSource::Path(PathBuf::from("/models/fox/Fox.glb"));
        assert_eq!(source.display_name(), "Fox.glb");

        let source = AssetSource::Bytes {
            name: "Dropped.fbx".into(),
            data: Vec::new(),
        };
        assert_eq!(source.format().ok(), Some(AssetFormat::Fbx));
    }
}
