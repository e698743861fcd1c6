//! scenefold - scene document import resolver.
//!
//! Loads a declarative scene document, transitively fetches every scene it
//! imports across a mixed local/HTTP/zip-bundle namespace, deep-merges the
//! documents in deterministic order, and rewrites every embedded resource
//! URL to absolute form while registering an asset handle for each.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use scenefold::{HttpPlatform, Importer, Scene};
//!
//! let platform = Arc::new(HttpPlatform::new()?);
//! let mut scene = Scene::new("scene.yaml", "https://host/styles/");
//! let merged = Importer::new(platform).apply_imports(&mut scene);
//! ```
//!
//! # Modules
//!
//! | Module     | Purpose                                             |
//! |------------|-----------------------------------------------------|
//! | `core`     | `SceneUrl`: parsing, classification, resolution     |
//! | `document` | YAML document tree, scalar helpers, deep merge      |
//! | `asset`    | Asset registry and shared zip bundle handles        |
//! | `import`   | Fetch coordinator and the merge/rewrite walk        |
//! | `platform` | Host seam: URL requests and local file reads        |

pub mod asset;
pub mod core;
pub mod document;
pub mod import;
pub mod logger;
pub mod platform;
mod scene;

pub use crate::asset::{Asset, AssetRegistry, BundleError, ZipHandle};
pub use crate::core::SceneUrl;
pub use crate::document::Document;
pub use crate::import::Importer;
pub use crate::platform::{FetchCallback, HttpPlatform, Platform};
pub use crate::scene::Scene;
