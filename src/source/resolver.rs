//! HTML source resolution

use crate::error::{Error, Result};
use schemars::JsonSchema;
use serde::Serialize;
use std::path::Path;

/// Where the HTML to render comes from
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum HtmlSource {
    /// Inline HTML markup
    Inline {
        /// HTML document to render
        html: String,
    },
    /// HTML file on disk
    Path {
        /// Path to the HTML file
        path: String,
    },
}

impl<'de> serde::Deserialize<'de> for HtmlSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        let Some(obj) = value.as_object() else {
            return Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with \"html\" or \"path\", but got {}",
                match &value {
                    serde_json::Value::Array(_) => "an array",
                    serde_json::Value::String(_) => "a string",
                    serde_json::Value::Number(_) => "a number",
                    serde_json::Value::Bool(_) => "a boolean",
                    serde_json::Value::Null => "null",
                    _ => "unknown type",
                }
            )));
        };

        if let Some(v) = obj.get("html") {
            return match v.as_str() {
                Some(s) => Ok(HtmlSource::Inline {
                    html: s.to_string(),
                }),
                None => Err(serde::de::Error::custom("\"html\" must be a string")),
            };
        }
        if let Some(v) = obj.get("path") {
            return match v.as_str() {
                Some(s) => Ok(HtmlSource::Path {
                    path: s.to_string(),
                }),
                None => Err(serde::de::Error::custom("\"path\" must be a string")),
            };
        }

        let keys: Vec<&String> = obj.keys().collect();
        Err(serde::de::Error::custom(format!(
            "Invalid source: expected an object with \"html\" or \"path\", but got keys: {:?}",
            keys
        )))
    }
}

impl HtmlSource {
    /// Short label for logs and results
    pub fn name(&self) -> String {
        match self {
            HtmlSource::Inline { .. } => "<inline>".to_string(),
            HtmlSource::Path { path } => path.clone(),
        }
    }
}

/// Read an HTML file, enforcing a size limit and UTF-8 content
pub fn resolve_path<P: AsRef<Path>>(path: P, max_bytes: u64) -> Result<String> {
    let path = path.as_ref();

    let metadata = std::fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(Error::invalid_input(format!(
            "not a file: {}",
            path.display()
        )));
    }
    if metadata.len() > max_bytes {
        return Err(Error::HtmlSourceTooLarge {
            size: metadata.len(),
            max_size: max_bytes,
        });
    }

    let data = std::fs::read(path)?;
    String::from_utf8(data).map_err(|_| {
        Error::invalid_input(format!("HTML file is not valid UTF-8: {}", path.display()))
    })
}
