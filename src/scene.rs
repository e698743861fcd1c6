//! Scene handle: source location plus the asset registry populated on
//! import.

use std::sync::Arc;

use crate::asset::{Asset, AssetRegistry};
use crate::core::SceneUrl;

/// A scene to be loaded.
///
/// `path` is the root document URL as given by the caller; `resource_root`
/// is the base it is resolved against. After an import the registry holds
/// an [`Asset`] for every resource the merged scene references.
#[derive(Debug, Default)]
pub struct Scene {
    path: SceneUrl,
    resource_root: SceneUrl,
    assets: AssetRegistry,
}

impl Scene {
    pub fn new(path: impl Into<SceneUrl>, resource_root: impl Into<SceneUrl>) -> Self {
        Self {
            path: path.into(),
            resource_root: resource_root.into(),
            assets: AssetRegistry::new(),
        }
    }

    pub fn path(&self) -> &SceneUrl {
        &self.path
    }

    pub fn resource_root(&self) -> &SceneUrl {
        &self.resource_root
    }

    /// Assets registered by the most recent import.
    pub fn assets(&self) -> &AssetRegistry {
        &self.assets
    }

    /// Look up an asset by resolved URL.
    pub fn asset(&self, name: &str) -> Option<&Arc<Asset>> {
        self.assets.get(name)
    }

    pub(crate) fn set_assets(&mut self, assets: AssetRegistry) {
        self.assets = assets;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_carries_path_and_root() {
        let scene = Scene::new("scene/a.yaml", "http://host/");
        assert_eq!(scene.path(), &"scene/a.yaml");
        assert_eq!(scene.resource_root(), &"http://host/");
        assert!(scene.assets().is_empty());
    }
}
