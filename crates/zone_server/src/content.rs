//! Static content description for a zone.
//!
//! A content description lists the scenes of a zone, each holding the level
//! objects placed in it, and the paths laid through the zone. Spawner paths
//! are the only paths the zone itself acts on; the rest are carried for
//! gameplay code.
//!
//! Descriptions are stored as JSON:
//!
//! ```json
//! {
//!   "scenes": [
//!     { "name": "global", "objects": [
//!       { "id": 70, "template": 4860, "position": [0.0, 0.0, 0.0],
//!         "settings": { "renderDisabled": true } }
//!     ] }
//!   ],
//!   "paths": [
//!     { "type": "spawner", "name": "gate_guards", "template": 6010, "max_to_spawn": 2,
//!       "waypoints": [[1.0, 0.0, 1.0], [2.0, 0.0, 1.0]] }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Settings key: the object exists only on the server.
pub const SERVER_ONLY: &str = "loadSrvrOnly";

/// Settings key: the object exists only in editing tools.
pub const TOOL_ONLY: &str = "carver_only";

/// Settings key: the object is never rendered.
pub const RENDER_DISABLED: &str = "renderDisabled";

/// Errors that can occur when loading a content description.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// Failed to read the description from disk.
    #[error("failed to read content description: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the description.
    #[error("failed to parse content description: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything a zone starts out with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentDescription {
    /// Scenes, in load order.
    #[serde(default)]
    pub scenes: Vec<Scene>,
    /// Paths laid through the zone.
    #[serde(default)]
    pub paths: Vec<PathDescriptor>,
}

impl ContentDescription {
    /// Read a description from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Io`] if the file cannot be read, or
    /// [`ContentError::Json`] if it is not a valid description.
    pub fn from_file(path: &Path) -> Result<Self, ContentError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Parse a description from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Json`] if the string is not a valid description.
    pub fn from_json_str(json: &str) -> Result<Self, ContentError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Every level object of every scene, flattened in scene order.
    pub fn level_objects(&self) -> impl Iterator<Item = &LevelObject> {
        self.scenes.iter().flat_map(|scene| scene.objects.iter())
    }

    /// The spawner paths, in declaration order.
    pub fn spawner_paths(&self) -> impl Iterator<Item = &SpawnerPath> {
        self.paths.iter().filter_map(|path| match path {
            PathDescriptor::Spawner(spawner) => Some(spawner),
            _ => None,
        })
    }
}

/// A group of level objects loaded together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    /// Scene name, for logs.
    #[serde(default)]
    pub name: String,
    /// Objects placed in this scene.
    #[serde(default)]
    pub objects: Vec<LevelObject>,
}

/// One placed object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelObject {
    /// Object identifier; becomes the placeholder entity's id.
    pub id: u64,
    /// Template the gameplay factory builds the object from.
    pub template: u32,
    /// World position.
    #[serde(default)]
    pub position: Vec3,
    /// Free-form settings.
    #[serde(default)]
    pub settings: Settings,
}

/// A path through the zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PathDescriptor {
    /// A path whose waypoints are spawn points.
    Spawner(SpawnerPath),
    /// A path something travels along.
    Movement(MovementPath),
}

/// A path whose waypoints spawn entities of one template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnerPath {
    /// Path name; unique within the zone.
    pub name: String,
    /// Template spawned at the waypoints.
    pub template: u32,
    /// How many entities to spawn at once.
    #[serde(default = "default_max_to_spawn")]
    pub max_to_spawn: u32,
    /// Spawn points.
    #[serde(default)]
    pub waypoints: Vec<Vec3>,
    /// Free-form settings.
    #[serde(default)]
    pub settings: Settings,
}

fn default_max_to_spawn() -> u32 {
    1
}

/// A path that something moves along.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementPath {
    /// Path name.
    pub name: String,
    /// Points along the path.
    #[serde(default)]
    pub waypoints: Vec<Vec3>,
}

/// String-keyed settings attached to content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(pub HashMap<String, serde_json::Value>);

impl Settings {
    /// Read `key` as a flag. Booleans are taken as-is, numbers are true when
    /// non-zero, and the strings `"1"` and `"true"` are true. Anything else,
    /// including a missing key, is false.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(serde_json::Value::String(s)) => s == "1" || s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// Returns `true` if any of the server-only, tool-only or render-disabled
    /// flags is set.
    #[must_use]
    pub fn hides_replica(&self) -> bool {
        [SERVER_ONLY, TOOL_ONLY, RENDER_DISABLED]
            .iter()
            .any(|key| self.flag(key))
    }

    /// Set `key` to `value`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "scenes": [
            { "name": "global", "objects": [
                { "id": 1, "template": 10, "settings": { "renderDisabled": true } },
                { "id": 2, "template": 11, "position": [1.0, 2.0, 3.0] }
            ] },
            { "name": "battle", "objects": [
                { "id": 3, "template": 12, "settings": { "loadSrvrOnly": "1" } }
            ] }
        ],
        "paths": [
            { "type": "movement", "name": "platform" },
            { "type": "spawner", "name": "guards", "template": 20, "max_to_spawn": 3 }
        ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let content = ContentDescription::from_json_str(SAMPLE).unwrap();
        assert_eq!(content.scenes.len(), 2);
        assert_eq!(content.paths.len(), 2);

        let second = &content.scenes[0].objects[1];
        assert_eq!(second.position, Vec3::new(1.0, 2.0, 3.0));
        assert!(second.settings.0.is_empty());
    }

    #[test]
    fn test_level_objects_flatten_in_scene_order() {
        let content = ContentDescription::from_json_str(SAMPLE).unwrap();
        let ids: Vec<u64> = content.level_objects().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_spawner_paths_filter() {
        let content = ContentDescription::from_json_str(SAMPLE).unwrap();
        let spawners: Vec<&SpawnerPath> = content.spawner_paths().collect();
        assert_eq!(spawners.len(), 1);
        assert_eq!(spawners[0].name, "guards");
        assert_eq!(spawners[0].max_to_spawn, 3);
    }

    #[test]
    fn test_hide_flags() {
        let content = ContentDescription::from_json_str(SAMPLE).unwrap();
        let hidden: Vec<bool> = content
            .level_objects()
            .map(|o| o.settings.hides_replica())
            .collect();
        assert_eq!(hidden, vec![true, false, true]);
    }

    #[test]
    fn test_flag_value_forms() {
        let mut settings = Settings::default();
        settings.insert("a", 0);
        settings.insert("b", 2);
        settings.insert("c", "TRUE");
        settings.insert("d", "no");
        settings.insert(TOOL_ONLY, false);
        assert!(!settings.flag("a"));
        assert!(settings.flag("b"));
        assert!(settings.flag("c"));
        assert!(!settings.flag("d"));
        assert!(!settings.flag("missing"));
        assert!(!settings.hides_replica());
    }

    #[test]
    fn test_malformed_json_is_reported() {
        let err = ContentDescription::from_json_str("{ scenes: ").unwrap_err();
        assert!(matches!(err, ContentError::Json(_)));
    }
}
