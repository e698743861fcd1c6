//! Core types - pure abstractions shared across the codebase.

mod url;

pub use url::SceneUrl;
