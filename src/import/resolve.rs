//! Embedded resource URL rewriting and scalar classification.
//!
//! After each document is merged, every resource URL it contributed is
//! rewritten against that document's own base and registered as an asset.
//! Classification keeps literal uniform values, `global.` references, and
//! named-texture references out of the rewrite.

use rustc_hash::FxHashSet;
use serde_yaml::Value;

use crate::asset::AssetRegistry;
use crate::core::SceneUrl;
use crate::document::{self, Document};
use crate::platform::Platform;

/// Material properties that may carry a texture reference.
const MATERIAL_PROPS: [&str; 5] = ["emission", "ambient", "diffuse", "specular", "normal"];

// ============================================================================
// Scalar classification
// ============================================================================

/// Scalar, non-null, and not a `global.` reference.
pub(crate) fn node_is_potential_url(node: &Value) -> bool {
    match document::scalar_text(node) {
        Some(text) => !text.starts_with("global."),
        None => false,
    }
}

/// Potential URL that is neither a bool, a number, nor the name of a
/// texture defined in the root being assembled.
pub(crate) fn node_is_texture_url(node: &Value, texture_names: &FxHashSet<String>) -> bool {
    if !node_is_potential_url(node) {
        return false;
    }
    if document::decodes_as_bool(node) || document::decodes_as_number(node) {
        return false;
    }
    match document::scalar_text(node) {
        Some(text) => !texture_names.contains(&text),
        None => false,
    }
}

fn potential_url_text(node: &Value) -> Option<String> {
    if node_is_potential_url(node) {
        document::scalar_text(node)
    } else {
        None
    }
}

/// Names defined under the `textures` mapping of the assembled root.
fn collect_texture_names(root: &Document) -> FxHashSet<String> {
    let mut names = FxHashSet::default();
    if let Some(textures) = root.get("textures").and_then(Value::as_mapping) {
        for (key, _) in textures {
            if let Some(text) = document::scalar_text(key) {
                names.insert(text);
            }
        }
    }
    names
}

// ============================================================================
// Rewriting
// ============================================================================

fn rewrite(node: &mut Value, text: &str, base: &SceneUrl, assets: &mut AssetRegistry) {
    let relative = SceneUrl::new(text);
    let resolved = relative.resolve(base);
    assets.create_asset(&resolved, &relative, base, None);
    *node = Value::String(resolved.as_str().to_string());
}

fn rewrite_potential_url(node: &mut Value, base: &SceneUrl, assets: &mut AssetRegistry) {
    if let Some(text) = potential_url_text(node) {
        rewrite(node, &text, base, assets);
    }
}

fn rewrite_texture_url(
    node: &mut Value,
    texture_names: &FxHashSet<String>,
    base: &SceneUrl,
    assets: &mut AssetRegistry,
) {
    if !node_is_texture_url(node, texture_names) {
        return;
    }
    if let Some(text) = document::scalar_text(node) {
        rewrite(node, &text, base, assets);
    }
}

/// Rewrite every embedded resource URL in `root` against `base`.
///
/// Visits `textures.*.url`, style textures (inline, material, shader
/// uniforms), `sources.*.url` (rewritten but never registered; data
/// sources are opened later by a different subsystem), and font faces.
/// Rewriting an already-absolute URL is the identity, so re-running over
/// previously merged fields is a no-op.
pub(crate) fn resolve_scene_urls(
    root: &mut Document,
    base: &SceneUrl,
    assets: &mut AssetRegistry,
    platform: &dyn Platform,
) {
    let texture_names = collect_texture_names(root);

    // Global texture URLs.
    if let Some(textures) = root.get_mut("textures").and_then(Value::as_mapping_mut) {
        for (_, texture) in textures.iter_mut() {
            if let Some(url_node) = texture.get_mut("url") {
                rewrite_potential_url(url_node, base, assets);
            }
        }
    }

    // Inline texture URLs in styles.
    if let Some(styles) = root.get_mut("styles").and_then(Value::as_mapping_mut) {
        for (_, style) in styles.iter_mut() {
            if !style.is_mapping() {
                continue;
            }

            if let Some(texture) = style.get_mut("texture") {
                rewrite_texture_url(texture, &texture_names, base, assets);
            }

            if let Some(material) = style.get_mut("material") {
                for prop in MATERIAL_PROPS {
                    let Some(prop_node) = material.get_mut(prop) else {
                        continue;
                    };
                    if !prop_node.is_mapping() {
                        continue;
                    }
                    if let Some(texture) = prop_node.get_mut("texture") {
                        rewrite_texture_url(texture, &texture_names, base, assets);
                    }
                }
            }

            if let Some(uniforms) = style
                .get_mut("shaders")
                .and_then(|shaders| shaders.get_mut("uniforms"))
                .and_then(Value::as_mapping_mut)
            {
                for (_, uniform) in uniforms.iter_mut() {
                    if let Some(entries) = uniform.as_sequence_mut() {
                        for entry in entries {
                            rewrite_texture_url(entry, &texture_names, base, assets);
                        }
                    } else {
                        rewrite_texture_url(uniform, &texture_names, base, assets);
                    }
                }
            }
        }
    }

    // Data source URLs.
    if let Some(sources) = root.get_mut("sources").and_then(Value::as_mapping_mut) {
        for (_, source) in sources.iter_mut() {
            if !source.is_mapping() {
                continue;
            }
            let Some(url_node) = source.get_mut("url") else {
                continue;
            };
            let Some(text) = potential_url_text(url_node) else {
                continue;
            };
            let resolved = SceneUrl::new(&text).resolve(base);
            let rewritten = if resolved.is_absolute() {
                resolved.as_str().to_string()
            } else {
                platform.resolve_asset_path(resolved.as_str())
            };
            *url_node = Value::String(rewritten);
        }
    }

    // Font URLs: a font entry is a face mapping or a sequence of them.
    if let Some(fonts) = root.get_mut("fonts").and_then(Value::as_mapping_mut) {
        for (_, font) in fonts.iter_mut() {
            if font.is_mapping() {
                if let Some(url_node) = font.get_mut("url") {
                    rewrite_potential_url(url_node, base, assets);
                }
            } else if let Some(faces) = font.as_sequence_mut() {
                for face in faces {
                    if let Some(url_node) = face.get_mut("url") {
                        rewrite_potential_url(url_node, base, assets);
                    }
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_document;
    use crate::import::testutil::MockPlatform;

    fn names(list: &[&str]) -> FxHashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_potential_url_classification() {
        let string = Value::String("sub/p.png".into());
        let global = Value::String("global.primary".into());

        assert!(node_is_potential_url(&string));
        assert!(!node_is_potential_url(&global));
        assert!(!node_is_potential_url(&Value::Null));
        assert!(!node_is_potential_url(&parse_document("[a]").unwrap()));
    }

    #[test]
    fn test_texture_url_classification() {
        let empty = names(&[]);

        assert!(node_is_texture_url(&Value::String("p.png".into()), &empty));
        // Bools and numbers are uniform values, not paths.
        assert!(!node_is_texture_url(&Value::Bool(true), &empty));
        assert!(!node_is_texture_url(&Value::String("0.5".into()), &empty));
        assert!(!node_is_texture_url(
            &parse_document("1.5").unwrap(),
            &empty
        ));
        // A scalar naming a scene texture is a reference, not a path.
        assert!(!node_is_texture_url(
            &Value::String("t".into()),
            &names(&["t"])
        ));
    }

    #[test]
    fn test_rewrite_registers_asset_with_relative_path() {
        let platform = MockPlatform::new();
        let mut assets = AssetRegistry::new();
        let base = SceneUrl::new("http://host/scene/a.yaml");
        let mut root = parse_document("textures:\n  t:\n    url: sub/p.png\n").unwrap();

        resolve_scene_urls(&mut root, &base, &mut assets, &platform);

        let url = root
            .get("textures")
            .and_then(|t| t.get("t"))
            .and_then(|t| t.get("url"))
            .and_then(Value::as_str)
            .unwrap();
        assert_eq!(url, "http://host/scene/sub/p.png");

        let asset = assets.get("http://host/scene/sub/p.png").unwrap();
        assert_eq!(asset.path(), &"sub/p.png");
    }

    #[test]
    fn test_source_urls_are_not_registered() {
        let platform = MockPlatform::new();
        let mut assets = AssetRegistry::new();
        let base = SceneUrl::new("http://host/a.yaml");
        let mut root = parse_document("sources:\n  osm:\n    url: tiles/osm.mbtiles\n").unwrap();

        resolve_scene_urls(&mut root, &base, &mut assets, &platform);

        let url = root
            .get("sources")
            .and_then(|s| s.get("osm"))
            .and_then(|s| s.get("url"))
            .and_then(Value::as_str)
            .unwrap();
        assert_eq!(url, "http://host/tiles/osm.mbtiles");
        assert!(assets.is_empty());
    }

    #[test]
    fn test_relative_source_url_goes_through_platform() {
        let platform = MockPlatform::new();
        let mut assets = AssetRegistry::new();
        // A scheme-less relative base leaves the resolved URL relative.
        let base = SceneUrl::new("scenes/a.yaml");
        let mut root = parse_document("sources:\n  osm:\n    url: osm.mbtiles\n").unwrap();

        resolve_scene_urls(&mut root, &base, &mut assets, &platform);

        let url = root
            .get("sources")
            .and_then(|s| s.get("osm"))
            .and_then(|s| s.get("url"))
            .and_then(Value::as_str)
            .unwrap();
        assert_eq!(url, "asset://scenes/osm.mbtiles");
    }

    #[test]
    fn test_shader_uniforms() {
        let platform = MockPlatform::new();
        let mut assets = AssetRegistry::new();
        let base = SceneUrl::new("http://host/a.yaml");
        let mut root = parse_document(
            "styles:\n  s:\n    shaders:\n      uniforms:\n        u_tex: n.png\n        u_val: 0.5\n        u_arr: [a.png, 2]\n",
        )
        .unwrap();

        resolve_scene_urls(&mut root, &base, &mut assets, &platform);

        let uniforms = root
            .get("styles")
            .and_then(|s| s.get("s"))
            .and_then(|s| s.get("shaders"))
            .and_then(|s| s.get("uniforms"))
            .unwrap();
        assert_eq!(
            uniforms.get("u_tex").and_then(Value::as_str),
            Some("http://host/n.png")
        );
        assert_eq!(uniforms.get("u_val").and_then(Value::as_f64), Some(0.5));

        let arr = uniforms.get("u_arr").and_then(Value::as_sequence).unwrap();
        assert_eq!(arr[0].as_str(), Some("http://host/a.png"));
        assert_eq!(arr[1].as_i64(), Some(2));
    }

    #[test]
    fn test_material_textures() {
        let platform = MockPlatform::new();
        let mut assets = AssetRegistry::new();
        let base = SceneUrl::new("http://host/a.yaml");
        let mut root = parse_document(
            "styles:\n  s:\n    material:\n      diffuse:\n        texture: d.png\n      normal:\n        texture: n.png\n      ambient: 0.4\n",
        )
        .unwrap();

        resolve_scene_urls(&mut root, &base, &mut assets, &platform);

        let material = root
            .get("styles")
            .and_then(|s| s.get("s"))
            .and_then(|s| s.get("material"))
            .unwrap();
        assert_eq!(
            material.get("diffuse").and_then(|p| p.get("texture")).and_then(Value::as_str),
            Some("http://host/d.png")
        );
        assert_eq!(
            material.get("normal").and_then(|p| p.get("texture")).and_then(Value::as_str),
            Some("http://host/n.png")
        );
        // Scalar material properties are left alone.
        assert_eq!(material.get("ambient").and_then(Value::as_f64), Some(0.4));
    }

    #[test]
    fn test_fonts_mapping_and_sequence() {
        let platform = MockPlatform::new();
        let mut assets = AssetRegistry::new();
        let base = SceneUrl::new("http://host/a.yaml");
        let mut root = parse_document(
            "fonts:\n  serif:\n    url: serif.ttf\n  sans:\n    - url: sans-400.ttf\n    - url: sans-700.ttf\n",
        )
        .unwrap();

        resolve_scene_urls(&mut root, &base, &mut assets, &platform);

        let fonts = root.get("fonts").unwrap();
        assert_eq!(
            fonts.get("serif").and_then(|f| f.get("url")).and_then(Value::as_str),
            Some("http://host/serif.ttf")
        );
        let sans = fonts.get("sans").and_then(Value::as_sequence).unwrap();
        assert_eq!(
            sans[0].get("url").and_then(Value::as_str),
            Some("http://host/sans-400.ttf")
        );
        assert_eq!(
            sans[1].get("url").and_then(Value::as_str),
            Some("http://host/sans-700.ttf")
        );
        assert_eq!(assets.len(), 3);
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let platform = MockPlatform::new();
        let mut assets = AssetRegistry::new();
        let base = SceneUrl::new("http://host/scene/a.yaml");
        let mut root = parse_document(
            "textures:\n  t:\n    url: sub/p.png\nstyles:\n  s:\n    texture: sub/q.png\n",
        )
        .unwrap();

        resolve_scene_urls(&mut root, &base, &mut assets, &platform);
        let first = root.clone();
        resolve_scene_urls(&mut root, &base, &mut assets, &platform);

        assert_eq!(root, first);
    }
}
