use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// Top-level configuration structure for a chart.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChartSettings {
    pub options: RenderOptions,
    pub styles: ChartStyles,
}

impl ChartSettings {
    /// Builds settings from a partial JSON document, falling back to the
    /// defaults for everything it leaves out.
    pub fn from_overrides(overrides: &Value) -> Result<Self> {
        let defaults = serde_json::to_value(Self::default())?;
        let merged = merge_objects(&defaults, overrides);
        Ok(serde_json::from_value(merged)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let overrides: Value = serde_json::from_str(json)?;
        Self::from_overrides(&overrides)
    }

    /// Style overrides addressed to the plugin called `name`.
    pub fn plugin_styles(&self, name: &str) -> Value {
        self.styles.plugins.get(name).cloned().unwrap_or(Value::Null)
    }
}

/// Behavioural options shared by every surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderOptions {
    /// Suffix appended to time grid labels.
    pub time_units: String,
    /// Whether plugins are asked to draw tooltips.
    pub tooltip: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            time_units: "ms".to_string(),
            tooltip: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChartStyles {
    pub main: RenderStyles,
    pub time_grid: TimeGridStyles,
    /// Raw style blocks keyed by plugin name.
    pub plugins: BTreeMap<String, Value>,
}

/// Visual settings of a render surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderStyles {
    pub block_height: f64,
    pub block_padding_left_right: f64,
    pub background_color: String,
    pub font: String,
    pub font_color: String,
    pub badge_size: f64,
    pub tooltip_header_font_color: String,
    pub tooltip_body_font_color: String,
    pub tooltip_background_color: String,
    pub tooltip_shadow_color: String,
    pub tooltip_shadow_blur: f64,
}

impl Default for RenderStyles {
    fn default() -> Self {
        Self {
            block_height: 16.0,
            block_padding_left_right: 4.0,
            background_color: "white".to_string(),
            font: "10px sans-serif".to_string(),
            font_color: "black".to_string(),
            badge_size: 8.0,
            tooltip_header_font_color: "black".to_string(),
            tooltip_body_font_color: "#688f45".to_string(),
            tooltip_background_color: "white".to_string(),
            tooltip_shadow_color: "black".to_string(),
            tooltip_shadow_blur: 6.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeGridStyles {
    pub color: String,
    pub pixels_per_line: f64,
    pub font_size: f64,
    pub font: String,
    pub font_color: String,
}

impl Default for TimeGridStyles {
    fn default() -> Self {
        Self {
            color: "rgba(90,90,90,0.20)".to_string(),
            pixels_per_line: 120.0,
            font_size: 8.0,
            font: "8px sans-serif".to_string(),
            font_color: "black".to_string(),
        }
    }
}

/// Recursively merges `overrides` into `defaults`.
///
/// Objects merge key by key; any other override value replaces the default,
/// except `null`, which keeps it.
pub fn merge_objects(defaults: &Value, overrides: &Value) -> Value {
    match (defaults, overrides) {
        (Value::Object(base), Value::Object(patch)) => {
            let mut merged = base.clone();
            for (key, value) in patch {
                let entry = match base.get(key) {
                    Some(default) => merge_objects(default, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), entry);
            }
            Value::Object(merged)
        }
        (default, Value::Null) => default.clone(),
        (_, value) => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn merges_nested_objects() {
        let defaults = json!({ "a": { "b": 1, "c": 2 }, "d": "x" });
        let overrides = json!({ "a": { "c": 5 }, "d": null, "e": true });

        let merged = merge_objects(&defaults, &overrides);
        assert_eq!(merged, json!({ "a": { "b": 1, "c": 5 }, "d": "x", "e": true }));
    }

    #[test]
    fn partial_overrides_keep_defaults() {
        let settings = ChartSettings::from_overrides(&json!({
            "styles": { "main": { "blockHeight": 20 }, "timeGrid": { "pixelsPerLine": 60 } },
            "options": { "timeUnits": "s" }
        }))
        .unwrap();

        assert_eq!(settings.styles.main.block_height, 20.0);
        assert_eq!(settings.styles.main.font, "10px sans-serif");
        assert_eq!(settings.styles.time_grid.pixels_per_line, 60.0);
        assert_eq!(settings.options.time_units, "s");
        assert!(settings.options.tooltip);
    }

    #[test]
    fn rejects_mistyped_values() {
        let err = ChartSettings::from_json_str(r#"{"styles":{"main":{"blockHeight":"tall"}}}"#);
        assert!(err.is_err());
    }

    #[test]
    fn exposes_plugin_styles() {
        let settings = ChartSettings::from_overrides(&json!({
            "styles": { "plugins": { "flame": { "minBlockSize": 2 } } }
        }))
        .unwrap();

        assert_eq!(settings.plugin_styles("flame"), json!({ "minBlockSize": 2 }));
        assert_eq!(settings.plugin_styles("marks"), Value::Null);
    }
}
