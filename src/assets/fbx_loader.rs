use super::{AssetLoader, AssetSource, LoadedAsset};
use crate::error::LoadError;

/// FBX is recognised by extension but this build carries no FBX parser.
/// Loading reports an error so the viewer falls back to the placeholder.
pub struct FbxLoader;

impl AssetLoader for FbxLoader {
    fn load(&self, source: &AssetSource, _progress: &mut dyn FnMut(u8)) -> Result<LoadedAsset, LoadError> {
        log::warn!("Cannot import {}: no FBX parser available", source.display_name());
        Err(LoadError::FormatUnavailable("FBX"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fbx_reports_missing_parser() {
        let source = AssetSource::Bytes {
            name: "Samba.fbx".into(),
            data: vec![0; 16],
        };
        let result = FbxLoader.load(&source, &mut |_| {});
        assert!(matches!(result, Err(LoadError::FormatUnavailable("FBX"))));
    }
}
