//! Internationalization (i18n) support
//!
//! UI strings ship with the binary for `pt-BR` and `en`; a site may add or
//! override languages with YAML files in its `languages/` directory.

use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const FALLBACK_LANGUAGE: &str = "en";

const BUILTIN: [(&str, &str); 2] = [
    ("pt-BR", include_str!("languages/pt-BR.yml")),
    ("en", include_str!("languages/en.yml")),
];

/// Internationalization handler
pub struct I18n {
    /// Current language
    language: String,
    /// Language data: lang -> key -> translation
    translations: HashMap<String, HashMap<String, serde_yaml::Value>>,
}

impl I18n {
    /// Create a handler with the built-in languages loaded
    pub fn new(language: &str) -> Self {
        let mut translations = HashMap::new();
        for (lang, source) in BUILTIN {
            match serde_yaml::from_str(source) {
                Ok(data) => {
                    translations.insert(lang.to_string(), data);
                }
                Err(e) => tracing::warn!("Built-in language {} is invalid: {}", lang, e),
            }
        }

        Self {
            language: language.to_string(),
            translations,
        }
    }

    /// Load language files from a directory, merging over what is loaded
    pub fn load_languages<P: AsRef<Path>>(&mut self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        if !dir.exists() {
            return Ok(());
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let ext = path.extension().and_then(|e| e.to_str());
            if !path.is_file() || !matches!(ext, Some("yml") | Some("yaml")) {
                continue;
            }

            let Some(lang) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let content = fs::read_to_string(&path)?;
            match serde_yaml::from_str::<HashMap<String, serde_yaml::Value>>(&content) {
                Ok(data) => {
                    self.translations
                        .entry(lang.to_string())
                        .or_default()
                        .extend(data);
                    tracing::debug!("Loaded language file: {:?}", path);
                }
                Err(e) => {
                    tracing::warn!("Failed to parse language file {:?}: {}", path, e);
                }
            }
        }

        Ok(())
    }

    /// Get the current language
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Get a translation by key
    /// Key can be nested like "not_found.title"
    pub fn get(&self, key: &str) -> String {
        self.get_for_lang(&self.language, key)
    }

    /// Get a translation for a specific language
    pub fn get_for_lang(&self, lang: &str, key: &str) -> String {
        if let Some(lang_data) = self.translations.get(lang) {
            if let Some(value) = get_nested_value(lang_data, key) {
                return yaml_value_to_string(value);
            }
        }

        if lang != FALLBACK_LANGUAGE {
            if let Some(lang_data) = self.translations.get(FALLBACK_LANGUAGE) {
                if let Some(value) = get_nested_value(lang_data, key) {
                    return yaml_value_to_string(value);
                }
            }
        }

        // Return key as fallback
        key.to_string()
    }

    /// Get all translations for the current language as a flat HashMap
    /// This flattens nested keys using underscores (e.g., "not_found_title")
    /// so templates can address them as plain attributes
    pub fn get_all_translations(&self) -> HashMap<String, String> {
        let mut result = HashMap::new();

        if let Some(lang_data) = self.translations.get(&self.language) {
            flatten_translations(lang_data, "", &mut result);
        }

        if self.language != FALLBACK_LANGUAGE {
            if let Some(fallback) = self.translations.get(FALLBACK_LANGUAGE) {
                let mut fallback_result = HashMap::new();
                flatten_translations(fallback, "", &mut fallback_result);
                for (k, v) in fallback_result {
                    result.entry(k).or_insert(v);
                }
            }
        }

        result
    }
}

impl Default for I18n {
    fn default() -> Self {
        Self::new("pt-BR")
    }
}

/// Get a nested value from a YAML map using dot notation
fn get_nested_value<'a>(
    data: &'a HashMap<String, serde_yaml::Value>,
    key: &str,
) -> Option<&'a serde_yaml::Value> {
    let mut parts = key.split('.');
    let mut current = data.get(parts.next()?);

    for part in parts {
        current = match current {
            Some(serde_yaml::Value::Mapping(map)) => map.get(part),
            _ => return None,
        };
    }

    current
}

/// Convert a YAML value to a string
fn yaml_value_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => String::new(),
        _ => format!("{:?}", value),
    }
}

fn flatten_translations(
    data: &HashMap<String, serde_yaml::Value>,
    prefix: &str,
    result: &mut HashMap<String, String>,
) {
    for (key, value) in data {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}_{}", prefix, key)
        };

        match value {
            serde_yaml::Value::Mapping(map) => {
                let nested: HashMap<String, serde_yaml::Value> = map
                    .iter()
                    .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.clone())))
                    .collect();
                flatten_translations(&nested, &full_key, result);
            }
            serde_yaml::Value::Sequence(_) | serde_yaml::Value::Tagged(_) => {}
            scalar => {
                result.insert(full_key, yaml_value_to_string(scalar));
            }
        }
    }
}
