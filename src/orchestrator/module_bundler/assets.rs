//! Static asset URI rewrite rule.

use serde::Serialize;

/// Placeholder in [`AssetRewriteRule::replacement`] standing for the asset name.
pub const NAME_PLACEHOLDER: &str = "[name]";

/// Rewrites `image!<name>` requests into an inline static image reference.
///
/// The module bundler replaces a matching request with `replacement`, after
/// substituting [`NAME_PLACEHOLDER`] with the part of the request that follows
/// `prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetRewriteRule {
    /// Request prefix that marks a static asset
    pub prefix: String,
    /// Module source template for the rewritten request
    pub replacement: String,
}

impl Default for AssetRewriteRule {
    fn default() -> Self {
        Self {
            prefix: "image!".to_string(),
            replacement: format!(r#"{{"uri":"{}","isStatic":true}}"#, NAME_PLACEHOLDER),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_prefix_and_replacement() {
        let json = serde_json::to_value(AssetRewriteRule::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "prefix": "image!",
                "replacement": r#"{"uri":"[name]","isStatic":true}"#,
            })
        );
    }
}
