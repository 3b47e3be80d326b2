//! Model configuration: load, save, and sanitize.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which store variant a configuration builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelClass {
    /// Nodes only.
    Model,
    /// Nodes plus a parallel collection of links between them.
    #[default]
    GraphLinksModel,
}

impl ModelClass {
    /// The name written to the `class` field of serialized models.
    pub fn as_str(self) -> &'static str {
        match self {
            ModelClass::Model => "Model",
            ModelClass::GraphLinksModel => "GraphLinksModel",
        }
    }

    /// Whether this variant stores links.
    pub fn has_links(self) -> bool {
        matches!(self, ModelClass::GraphLinksModel)
    }
}

impl std::fmt::Display for ModelClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every recognized model option, with its default.
///
/// Property names configure fixed accessors; computed accessors can only
/// be installed programmatically on the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiagramConfig {
    pub class: ModelClass,
    pub node_key_property: String,
    pub node_category_property: String,
    pub node_group_key_property: String,
    pub node_is_group_property: String,
    pub link_key_property: String,
    pub link_category_property: String,
    pub link_from_key_property: String,
    pub link_to_key_property: String,
    pub link_from_port_id_property: String,
    pub link_to_port_id_property: String,
    /// Template cloned to create link endpoints that don't exist yet.
    pub archetype_node_data: Option<Map<String, Value>>,
    /// Mutations on a read-only model are silently ignored.
    pub is_read_only: bool,
    /// Stop forwarding changes to the undo manager (listeners still fire).
    pub skips_undo_manager: bool,
    /// Prefix for generated node keys (`<prefix>_<uuid>`).
    pub node_key_prefix: String,
    /// Prefix for generated link keys.
    pub link_key_prefix: String,
    /// Max committed transactions kept for undo.
    pub max_history_length: usize,
    pub undo_enabled: bool,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            class: ModelClass::default(),
            node_key_property: "id".to_string(),
            node_category_property: "category".to_string(),
            node_group_key_property: "group".to_string(),
            node_is_group_property: "isGroup".to_string(),
            link_key_property: "key".to_string(),
            link_category_property: "category".to_string(),
            link_from_key_property: "from".to_string(),
            link_to_key_property: "to".to_string(),
            link_from_port_id_property: "fromPort".to_string(),
            link_to_port_id_property: "toPort".to_string(),
            archetype_node_data: None,
            is_read_only: false,
            skips_undo_manager: false,
            node_key_prefix: "node".to_string(),
            link_key_prefix: "link".to_string(),
            max_history_length: 999,
            undo_enabled: true,
        }
    }
}

impl DiagramConfig {
    /// Returns the config file path: exe directory + `diagram.json`.
    pub fn config_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|d| d.join("diagram.json")))
            .unwrap_or_else(|| PathBuf::from("diagram.json"))
    }

    /// Loads config from `path`, creating a default file if it doesn't exist.
    /// Returns defaults on any error (missing file, parse error, etc.).
    pub fn load_or_create(path: &std::path::Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(contents) => match serde_json::from_str::<DiagramConfig>(&contents) {
                    Ok(mut config) => {
                        config.sanitize();
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {}: {e}", path.display());
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {}: {e}", path.display());
                }
            }
            // Return defaults on error (don't overwrite broken file)
            Self::default()
        } else {
            let config = Self::default();
            if let Err(e) = config.save(path) {
                tracing::warn!("Failed to create default config at {}: {e}", path.display());
            }
            config
        }
    }

    /// Saves config to `path` as pretty-printed JSON.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Resets blank property names and key prefixes to their defaults.
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        let fields = [
            (&mut self.node_key_property, defaults.node_key_property),
            (&mut self.node_category_property, defaults.node_category_property),
            (&mut self.node_group_key_property, defaults.node_group_key_property),
            (&mut self.node_is_group_property, defaults.node_is_group_property),
            (&mut self.link_key_property, defaults.link_key_property),
            (&mut self.link_category_property, defaults.link_category_property),
            (&mut self.link_from_key_property, defaults.link_from_key_property),
            (&mut self.link_to_key_property, defaults.link_to_key_property),
            (&mut self.link_from_port_id_property, defaults.link_from_port_id_property),
            (&mut self.link_to_port_id_property, defaults.link_to_port_id_property),
            (&mut self.node_key_prefix, defaults.node_key_prefix),
            (&mut self.link_key_prefix, defaults.link_key_prefix),
        ];
        for (value, default) in fields {
            if value.trim().is_empty() {
                tracing::warn!("Blank config value replaced with default {default:?}");
                *value = default;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DiagramConfig::default();
        assert_eq!(config.class, ModelClass::GraphLinksModel);
        assert_eq!(config.node_key_property, "id");
        assert_eq!(config.link_from_key_property, "from");
        assert_eq!(config.link_to_port_id_property, "toPort");
        assert!(config.archetype_node_data.is_none());
        assert!(!config.is_read_only);
        assert_eq!(config.max_history_length, 999);
        assert!(config.undo_enabled);
    }

    #[test]
    fn test_sanitize_restores_blank_names() {
        let mut config = DiagramConfig {
            node_key_property: String::new(),
            link_to_key_property: "   ".to_string(),
            node_key_prefix: String::new(),
            ..DiagramConfig::default()
        };
        config.sanitize();
        assert_eq!(config.node_key_property, "id");
        assert_eq!(config.link_to_key_property, "to");
        assert_eq!(config.node_key_prefix, "node");
    }

    #[test]
    fn test_sanitize_keeps_custom_names() {
        let mut config = DiagramConfig {
            node_key_property: "nodeId".to_string(),
            ..DiagramConfig::default()
        };
        config.sanitize();
        assert_eq!(config.node_key_property, "nodeId");
    }

    #[test]
    fn test_model_class_names() {
        assert_eq!(ModelClass::Model.as_str(), "Model");
        assert_eq!(ModelClass::GraphLinksModel.to_string(), "GraphLinksModel");
        assert!(ModelClass::GraphLinksModel.has_links());
        assert!(!ModelClass::Model.has_links());
    }

    #[test]
    fn test_serde_uses_camel_case() {
        let json = serde_json::to_value(DiagramConfig::default()).unwrap();
        assert_eq!(json["nodeKeyProperty"], "id");
        assert_eq!(json["linkFromPortIdProperty"], "fromPort");
        assert_eq!(json["class"], "GraphLinksModel");
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let json = r#"{"class": "Model", "isReadOnly": true}"#;
        let parsed: DiagramConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.class, ModelClass::Model);
        assert!(parsed.is_read_only);
        assert_eq!(parsed.node_category_property, "category");
        assert_eq!(parsed.max_history_length, 999);
    }

    #[test]
    fn test_archetype_round_trip() {
        let mut archetype = Map::new();
        archetype.insert("text".to_string(), Value::from("new node"));
        let config = DiagramConfig {
            archetype_node_data: Some(archetype),
            ..DiagramConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: DiagramConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
