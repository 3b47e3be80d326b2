//! Serialization of models to and from their JSON interchange form.
//!
//! The payload is `{ class, nodeDataArray, linkDataArray?, modelData }`.
//! `class` is informational: the caller picks the model variant before
//! loading, and a differing `class` is only logged.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::Model;
use crate::record::ObjectData;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerializedModel {
    #[serde(default)]
    class: Option<String>,
    #[serde(default)]
    node_data_array: Vec<ObjectData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    link_data_array: Option<Vec<ObjectData>>,
    #[serde(default)]
    model_data: Option<ObjectData>,
}

impl Model {
    /// Serializes every record and the model data as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be encoded.
    pub fn serialize(&self) -> Result<String> {
        let payload = SerializedModel {
            class: Some(self.class.as_str().to_string()),
            node_data_array: self.node_data_array(),
            link_data_array: self.class.has_links().then(|| self.link_data_array()),
            model_data: Some(self.model_data.clone()),
        };
        serde_json::to_string_pretty(&payload).context("Failed to serialize model")
    }

    /// Replaces the content of this model with a serialized payload.
    ///
    /// Runs inside one "Load Model" transaction: the model is cleared, then
    /// nodes and links are added (endpoint synthesis applies) and the
    /// model data is replaced when present. A read-only model is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if `text` is not a valid payload; the model is not
    /// modified in that case.
    pub fn deserialize(&mut self, text: &str) -> Result<()> {
        let payload: SerializedModel =
            serde_json::from_str(text).context("Failed to parse serialized model")?;
        if self.read_only {
            return Ok(());
        }
        if let Some(class) = payload.class.as_deref() {
            if class != self.class.as_str() {
                tracing::debug!(
                    payload = class,
                    model = %self.class,
                    "serialized class differs from model class"
                );
            }
        }

        self.in_transaction("Load Model", |m| {
            m.clear();
            for node in payload.node_data_array {
                m.add_node(node);
            }
            for link in payload.link_data_array.unwrap_or_default() {
                m.add_link(link);
            }
            if let Some(data) = payload.model_data {
                m.model_data = data;
            }
        });
        tracing::debug!(
            model = self.id(),
            nodes = self.node_count(),
            links = self.link_count(),
            "model loaded"
        );
        Ok(())
    }

    /// Reads a serialized model from disk into this model.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read file: {}", path.display()))?;
        self.deserialize(&text)
            .with_context(|| format!("failed to load model: {}", path.display()))
    }

    /// Writes the serialized model to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let text = self.serialize()?;
        std::fs::write(path, text)
            .with_context(|| format!("failed to write file: {}", path.display()))
    }
}
