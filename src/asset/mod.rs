//! Asset records and the per-scene asset registry.
//!
//! Every resource a scene references (scene documents, textures, fonts) is
//! registered under its resolved absolute URL. Assets drawn from the same
//! zip bundle share one `ZipHandle`; reads go through the bundle when a
//! handle is attached and through the platform otherwise.

pub mod bundle;

pub use bundle::{BundleError, ZipHandle};

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::core::SceneUrl;
use crate::log;
use crate::platform::Platform;

// ============================================================================
// Asset
// ============================================================================

/// A single addressable resource.
#[derive(Debug)]
pub struct Asset {
    /// Resolved absolute URL; also the registry key.
    name: SceneUrl,
    /// Relative URL as written in the source document; the lookup key
    /// inside a zip bundle.
    path: SceneUrl,
    /// Shared archive handle when the asset lives inside a bundle.
    bundle: Option<Arc<ZipHandle>>,
}

impl Asset {
    fn new(name: SceneUrl, path: SceneUrl, bundle: Option<Arc<ZipHandle>>) -> Self {
        Self { name, path, bundle }
    }

    /// The resolved absolute URL identifying this asset.
    pub fn name(&self) -> &SceneUrl {
        &self.name
    }

    /// The relative URL as written in the source document.
    pub fn path(&self) -> &SceneUrl {
        &self.path
    }

    /// The shared bundle handle, if the asset lives inside one.
    pub fn bundle(&self) -> Option<&Arc<ZipHandle>> {
        self.bundle.as_ref()
    }

    /// Read the asset's bytes, from the bundle when one is attached and
    /// from the platform otherwise.
    pub fn read_bytes(&self, platform: &dyn Platform) -> Option<Vec<u8>> {
        if let Some(bundle) = &self.bundle {
            return match bundle.read(self.path.as_str()) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    log!("error"; "could not load `{}` from bundle: {}", self.path, e);
                    None
                }
            };
        }

        match platform.bytes_from_file(self.name.as_str()) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log!("error"; "could not read `{}`: {:#}", self.name, e);
                None
            }
        }
    }

    /// Read the asset as UTF-8 text.
    pub fn read_string(&self, platform: &dyn Platform) -> Option<String> {
        if self.bundle.is_some() {
            let bytes = self.read_bytes(platform)?;
            return Some(String::from_utf8_lossy(&bytes).into_owned());
        }

        match platform.string_from_file(self.name.as_str()) {
            Ok(text) => Some(text),
            Err(e) => {
                log!("error"; "could not read `{}`: {:#}", self.name, e);
                None
            }
        }
    }
}

// ============================================================================
// AssetRegistry
// ============================================================================

/// Owning map from resolved URL to asset.
#[derive(Debug, Default)]
pub struct AssetRegistry {
    assets: FxHashMap<SceneUrl, Arc<Asset>>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset under its resolved URL.
    ///
    /// Idempotent: an existing entry is returned untouched. Otherwise the
    /// bundle association is decided by the caller's context:
    /// - empty `base`: a root asset; non-empty `zip_bytes` open a fresh
    ///   bundle handle
    /// - absolute `relative`: the asset escapes its parent's bundle
    /// - otherwise: the asset shares the bundle handle of the `base` asset
    pub fn create_asset(
        &mut self,
        resolved: &SceneUrl,
        relative: &SceneUrl,
        base: &SceneUrl,
        zip_bytes: Option<Vec<u8>>,
    ) -> Arc<Asset> {
        if let Some(existing) = self.assets.get(resolved) {
            return Arc::clone(existing);
        }

        let asset = if base.is_empty() {
            let bundle = zip_bytes
                .filter(|bytes| !bytes.is_empty())
                .and_then(|bytes| open_bundle(resolved, bytes));
            Asset::new(resolved.clone(), relative.clone(), bundle)
        } else if relative.is_absolute() {
            Asset::new(resolved.clone(), relative.clone(), None)
        } else {
            debug_assert!(zip_bytes.is_none());
            let bundle = self
                .assets
                .get(base)
                .and_then(|parent| parent.bundle().cloned());
            Asset::new(resolved.clone(), relative.clone(), bundle)
        };

        let asset = Arc::new(asset);
        self.assets.insert(resolved.clone(), Arc::clone(&asset));
        asset
    }

    /// Look up an asset by its resolved URL.
    pub fn get(&self, name: &str) -> Option<&Arc<Asset>> {
        self.assets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.assets.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Iterate over all registered assets.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Asset>> {
        self.assets.values()
    }
}

fn open_bundle(url: &SceneUrl, bytes: Vec<u8>) -> Option<Arc<ZipHandle>> {
    match ZipHandle::from_bytes(bytes) {
        Ok(handle) => Some(Arc::new(handle)),
        Err(e) => {
            log!("error"; "could not open bundle `{}`: {}", url, e);
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
