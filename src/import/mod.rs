//! Scene import resolution.
//!
//! # Architecture
//!
//! ```text
//! Importer::apply_imports
//!    |
//!    +-- Coordinator ---- bounded-parallel fetch of the import graph
//!    |       (queue + import map + asset registry behind one mutex)
//!    |
//!    +-- import_scenes_recursive ---- post-order walk of the import DAG
//!            merge_map_fields        (children first, current last)
//!            resolve_scene_urls      (rewrite against the document's base)
//! ```
//!
//! The walk order makes the current document override its imports, and
//! later imports override earlier siblings. Two runs over identical
//! platform responses produce byte-identical merged documents.

mod coordinator;
mod resolve;

use std::sync::Arc;

use serde_yaml::Value;

use crate::asset::AssetRegistry;
use crate::core::SceneUrl;
use crate::document::{self, Document, merge::merge_map_fields};
use crate::platform::Platform;
use crate::scene::Scene;
use crate::{debug, log};

use coordinator::Coordinator;
use resolve::resolve_scene_urls;

// ============================================================================
// Importer
// ============================================================================

/// Resolves a scene's transitive imports into one merged document.
pub struct Importer {
    platform: Arc<dyn Platform>,
}

impl Importer {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }

    /// Load the scene at `scene.path()` together with everything it
    /// imports, deep-merge the documents into one, and rewrite every
    /// embedded resource URL to absolute form.
    ///
    /// The scene's asset registry is populated as a side effect. Failures
    /// along the way (fetch, parse, archive, cycles) are logged and the
    /// affected branch is skipped; the returned document is the
    /// best-effort merge of whatever succeeded.
    pub fn apply_imports(&self, scene: &mut Scene) -> Document {
        let root_url = scene.path().resolve(scene.resource_root());
        debug!("merge"; "root scene `{}`", root_url);

        let coordinator = Arc::new(Coordinator::new(Arc::clone(&self.platform)));
        Coordinator::run(&coordinator, &root_url);
        let mut state = coordinator.take_state();

        let mut root = Value::Mapping(Default::default());
        let mut stack = Vec::new();
        let mut ctx = MergeContext {
            scenes: &mut state.scenes,
            assets: &mut state.assets,
            platform: self.platform.as_ref(),
        };
        import_scenes_recursive(&mut root, &scene_key_for(&root_url), &mut stack, &mut ctx);

        scene.set_assets(state.assets);
        root
    }
}

// ============================================================================
// Import graph walk
// ============================================================================

struct MergeContext<'a> {
    scenes: &'a mut rustc_hash::FxHashMap<SceneUrl, Document>,
    assets: &'a mut AssetRegistry,
    platform: &'a dyn Platform,
}

/// The import map key for a scene URL: bundles are keyed by their
/// synthesized in-bundle root URL.
pub(crate) fn scene_key_for(url: &SceneUrl) -> SceneUrl {
    match url.bundled_scene_url() {
        Some(synthesized) => synthesized,
        None => url.clone(),
    }
}

/// Read the top-level `import` entry of a document: a scalar or a sequence
/// of scalars, each resolved against `base` and registered as an asset.
pub(crate) fn get_resolved_import_urls(
    doc: &Document,
    base: &SceneUrl,
    assets: &mut AssetRegistry,
) -> Vec<SceneUrl> {
    let mut imports = Vec::new();
    let Some(node) = doc.get("import") else {
        return imports;
    };

    if let Some(text) = document::scalar_text(node) {
        let relative = SceneUrl::new(&text);
        let resolved = relative.resolve(base);
        assets.create_asset(&resolved, &relative, base, None);
        imports.push(resolved);
    } else if let Some(entries) = node.as_sequence() {
        for entry in entries {
            let Some(text) = document::scalar_text(entry) else {
                continue;
            };
            let relative = SceneUrl::new(&text);
            let resolved = relative.resolve(base);
            assets.create_asset(&resolved, &relative, base, None);
            imports.push(resolved);
        }
    }

    imports
}

/// Depth-first post-order merge of the import DAG into `root`.
///
/// Children merge before the document that imported them, so the importing
/// document wins; afterwards the document's own resource URLs are rewritten
/// against its base. A URL already on the stack is a cycle: the offending
/// edge is logged and that branch skipped.
fn import_scenes_recursive(
    root: &mut Document,
    scene_url: &SceneUrl,
    stack: &mut Vec<SceneUrl>,
    ctx: &mut MergeContext<'_>,
) {
    debug!("merge"; "importing `{}`", scene_url);

    if stack.contains(scene_url) {
        log!("error"; "`{}` would cause a cyclic import, skipping", scene_url);
        return;
    }
    stack.push(scene_url.clone());

    // Imports are computed before the `import` key is stripped from the
    // stored document; stripping it there keeps a diamond re-visit from
    // expanding its imports twice.
    let merged = match ctx.scenes.get_mut(scene_url) {
        Some(doc) if doc.is_mapping() => {
            let imports = get_resolved_import_urls(doc, scene_url, ctx.assets);
            document::remove_key(doc, "import");
            Some((imports, doc.clone()))
        }
        _ => None,
    };

    let Some((imports, doc)) = merged else {
        stack.pop();
        return;
    };

    for import in &imports {
        import_scenes_recursive(root, &scene_key_for(import), stack, ctx);
    }

    stack.pop();

    merge_map_fields(root, &doc);
    resolve_scene_urls(root, scene_url, ctx.assets, ctx.platform);
}

// ============================================================================
// Test support
// ============================================================================

#[cfg(test)]
pub(crate) mod testutil {
    use std::{thread, time::Duration};

    use anyhow::anyhow;
    use rustc_hash::FxHashMap;

    use crate::core::SceneUrl;
    use crate::platform::{FetchCallback, Platform};

    /// Deterministic in-memory platform for resolver tests.
    #[derive(Default)]
    pub struct MockPlatform {
        remote: FxHashMap<String, Vec<u8>>,
        files: FxHashMap<String, Vec<u8>>,
        deferred: bool,
    }

    impl MockPlatform {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_remote(mut self, url: &str, body: impl AsRef<[u8]>) -> Self {
            self.remote.insert(url.to_string(), body.as_ref().to_vec());
            self
        }

        pub fn with_file(mut self, path: &str, body: impl AsRef<[u8]>) -> Self {
            self.files.insert(path.to_string(), body.as_ref().to_vec());
            self
        }

        /// Deliver fetch callbacks from spawned threads with skewed
        /// delays, so completion order differs from request order.
        pub fn deferred(mut self) -> Self {
            self.deferred = true;
            self
        }
    }

    impl Platform for MockPlatform {
        fn start_url_request(&self, url: &SceneUrl, callback: FetchCallback) {
            let body = self.remote.get(url.as_str()).cloned();
            if self.deferred {
                let delay = Duration::from_millis(u64::from(url.as_str().len() as u32 % 7));
                thread::spawn(move || {
                    thread::sleep(delay);
                    callback(body);
                });
            } else {
                callback(body);
            }
        }

        fn bytes_from_file(&self, path: &str) -> anyhow::Result<Vec<u8>> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow!("no such file `{path}`"))
        }

        fn resolve_asset_path(&self, path: &str) -> String {
            format!("asset://{path}")
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
