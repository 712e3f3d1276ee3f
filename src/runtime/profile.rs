//! Profile (settings) store collaborator.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value as Json};

/// Section/key settings store consulted by `@Profile`.
pub trait Profile {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn set_string(&self, section: &str, key: &str, value: &str);
    fn get_int(&self, section: &str, key: &str) -> Option<i64>;
    fn set_int(&self, section: &str, key: &str, value: i64);

    /// Display name of the profile.
    fn name(&self) -> String {
        String::new()
    }
}

/// Profile kept as a JSON object of sections, optionally backed by a file.
#[derive(Debug, Default)]
pub struct JsonProfile {
    name: String,
    path: Option<PathBuf>,
    root: RefCell<Map<String, Json>>,
}

impl JsonProfile {
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            root: RefCell::new(Map::new()),
        }
    }

    /// Loads `path` if it exists; a missing file starts an empty profile.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let root = match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str::<Json>(&text)? {
                Json::Object(map) => map,
                _ => Map::new(),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e),
        };
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            path: Some(path.to_path_buf()),
            root: RefCell::new(root),
        })
    }

    /// Writes the profile back to its file, if it has one.
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let text = serde_json::to_string_pretty(&*self.root.borrow())?;
        std::fs::write(path, text)
    }

    fn get(&self, section: &str, key: &str) -> Option<Json> {
        self.root
            .borrow()
            .get(section)
            .and_then(|s| s.get(key))
            .cloned()
    }

    fn set(&self, section: &str, key: &str, value: Json) {
        let mut root = self.root.borrow_mut();
        let entry = root
            .entry(section.to_string())
            .or_insert_with(|| Json::Object(Map::new()));
        if !entry.is_object() {
            *entry = Json::Object(Map::new());
        }
        if let Json::Object(section) = entry {
            section.insert(key.to_string(), value);
        }
    }
}

impl Profile for JsonProfile {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        match self.get(section, key)? {
            Json::String(s) => Some(s),
            Json::Null => None,
            other => Some(other.to_string()),
        }
    }

    fn set_string(&self, section: &str, key: &str, value: &str) {
        self.set(section, key, Json::String(value.to_string()));
    }

    fn get_int(&self, section: &str, key: &str) -> Option<i64> {
        match self.get(section, key)? {
            Json::Number(n) => n.as_i64(),
            Json::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn set_int(&self, section: &str, key: &str, value: i64) {
        self.set(section, key, Json::from(value));
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.json");
        let profile = JsonProfile::open(&path).unwrap();
        profile.set_string("Global", "Editor", "vim");
        profile.set_int("Global", "Width", 80);
        profile.save().unwrap();

        let reloaded = JsonProfile::open(&path).unwrap();
        assert_eq!(reloaded.get_string("Global", "Editor").as_deref(), Some("vim"));
        assert_eq!(reloaded.get_int("Global", "Width"), Some(80));
        assert_eq!(reloaded.get_string("Global", "Width").as_deref(), Some("80"));
        assert_eq!(reloaded.name(), "main");
    }
}
