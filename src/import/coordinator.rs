//! Bounded-parallel fetch loop for the scene import graph.
//!
//! # Responsibility
//!
//! The coordinator turns a root URL into an import map: every transitively
//! reachable scene document, fetched, parsed, and keyed by its resolved
//! URL. Import edges are discovered lazily as each document is parsed.
//!
//! One coordinating thread drives the loop; up to [`MAX_IN_FLIGHT`] HTTP
//! fetches run concurrently and deliver their results through callbacks.
//! Local reads (and reads out of an already-open bundle) happen inline.
//! All shared state sits behind a single mutex; completion is signalled by
//! broadcasting the condition variable, since a finished fetch can both
//! lower `in_flight` and enqueue new imports.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rustc_hash::{FxHashMap, FxHashSet};

use super::{get_resolved_import_urls, scene_key_for};
use crate::asset::AssetRegistry;
use crate::core::SceneUrl;
use crate::document::{self, Document};
use crate::platform::Platform;
use crate::{debug, log};

/// Maximum number of concurrent outstanding HTTP fetches.
pub(crate) const MAX_IN_FLIGHT: usize = 4;

/// State shared between the coordinating thread and fetch callbacks.
#[derive(Default)]
pub(crate) struct FetchState {
    /// LIFO of URLs awaiting fetch.
    pub queue: Vec<SceneUrl>,
    /// Outstanding HTTP fetches.
    pub in_flight: usize,
    /// Scene URLs currently being fetched, skipped on dequeue.
    pub pending: FxHashSet<SceneUrl>,
    /// Import map: resolved scene URL -> parsed document.
    pub scenes: FxHashMap<SceneUrl, Document>,
    /// Assets registered while resolving.
    pub assets: AssetRegistry,
}

pub(crate) struct Coordinator {
    platform: Arc<dyn Platform>,
    state: Mutex<FetchState>,
    progress: Condvar,
}

impl Coordinator {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self {
            platform,
            state: Mutex::new(FetchState::default()),
            progress: Condvar::new(),
        }
    }

    /// Fetch the root scene and everything it transitively imports.
    /// Returns once the queue is drained and no fetch is in flight.
    pub fn run(this: &Arc<Self>, root_url: &SceneUrl) {
        this.state.lock().queue.push(root_url.clone());

        loop {
            let mut state = this.state.lock();

            // Wait for a dequeuable scene with spare fetch capacity, or for
            // all outstanding work to drain.
            while !(state.queue.is_empty() && state.in_flight == 0)
                && (state.queue.is_empty() || state.in_flight >= MAX_IN_FLIGHT)
            {
                this.progress.wait(&mut state);
            }

            let Some(path) = state.queue.pop() else {
                break;
            };

            // A bundled scene is keyed by its synthesized in-bundle URL.
            let scene_url = scene_key_for(&path);
            if state.scenes.contains_key(&scene_url) || state.pending.contains(&scene_url) {
                continue;
            }

            let is_bundle = path.has_zip_extension();
            let bundled_path = path.bundle_root_path().unwrap_or_default();

            // A scene whose asset already belongs to an open bundle is read
            // from the archive, never re-fetched.
            let has_bundled_asset = state
                .assets
                .get(scene_url.as_str())
                .is_some_and(|asset| asset.bundle().is_some());

            if path.has_http_scheme() && !has_bundled_asset {
                state.pending.insert(scene_url.clone());
                state.in_flight += 1;
                drop(state);
                Self::dispatch_http(this, path, scene_url, bundled_path, is_bundle);
            } else {
                this.dispatch_local(&mut state, &path, &scene_url, &bundled_path, is_bundle);
            }
        }
    }

    /// Move the accumulated state out of the coordinator.
    pub fn take_state(&self) -> FetchState {
        std::mem::take(&mut *self.state.lock())
    }

    /// Start an asynchronous fetch. The dispatch context is captured by
    /// value so concurrent fetches cannot corrupt each other's rebase
    /// state.
    fn dispatch_http(
        this: &Arc<Self>,
        path: SceneUrl,
        scene_url: SceneUrl,
        bundled_path: SceneUrl,
        is_bundle: bool,
    ) {
        debug!("fetch"; "requesting {}", path);

        let coordinator = Arc::clone(this);
        let request_url = path.clone();
        this.platform.start_url_request(
            &request_url,
            Box::new(move |body| {
                let mut state = coordinator.state.lock();
                state.pending.remove(&scene_url);

                match body.filter(|bytes| !bytes.is_empty()) {
                    Some(bytes) => {
                        let text = if is_bundle {
                            let asset = state.assets.create_asset(
                                &scene_url,
                                &bundled_path,
                                &SceneUrl::empty(),
                                Some(bytes),
                            );
                            asset.read_string(coordinator.platform.as_ref())
                        } else {
                            state.assets.create_asset(
                                &scene_url,
                                &SceneUrl::empty(),
                                &SceneUrl::empty(),
                                None,
                            );
                            Some(String::from_utf8_lossy(&bytes).into_owned())
                        };

                        if let Some(text) = text {
                            process_scene(&mut state, &coordinator.progress, scene_url, &text);
                        }
                    }
                    None => log!("error"; "failed to fetch scene `{}`", path),
                }

                state.in_flight -= 1;
                coordinator.progress.notify_all();
            }),
        );
    }

    /// Read a scene synchronously: a local file, a local bundle, or an
    /// entry of an already-open bundle.
    fn dispatch_local(
        &self,
        state: &mut FetchState,
        path: &SceneUrl,
        scene_url: &SceneUrl,
        bundled_path: &SceneUrl,
        is_bundle: bool,
    ) {
        let text = if is_bundle {
            let bytes = match self.platform.bytes_from_file(path.as_str()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log!("error"; "could not read bundle `{}`: {:#}", path, e);
                    Vec::new()
                }
            };
            let asset = state.assets.create_asset(
                scene_url,
                bundled_path,
                &SceneUrl::empty(),
                Some(bytes),
            );
            asset.read_string(self.platform.as_ref())
        } else {
            let asset = state.assets.create_asset(
                scene_url,
                &SceneUrl::empty(),
                &SceneUrl::empty(),
                None,
            );
            asset.read_string(self.platform.as_ref())
        };

        if let Some(text) = text {
            process_scene(state, &self.progress, scene_url.clone(), &text);
        }
    }
}

/// Parse a fetched scene and enqueue its imports.
fn process_scene(state: &mut FetchState, progress: &Condvar, scene_url: SceneUrl, text: &str) {
    // Don't load imports twice.
    if state.scenes.contains_key(&scene_url) {
        return;
    }

    match document::parse_document(text) {
        Ok(doc) => {
            debug!("fetch"; "processed `{}`", scene_url);
            let imports = get_resolved_import_urls(&doc, &scene_url, &mut state.assets);
            state.scenes.insert(scene_url, doc);
            for import in imports {
                state.queue.push(import);
            }
            progress.notify_all();
        }
        Err(e) => log!("error"; "parsing scene `{}`: {:#}", scene_url, e),
    }
}
