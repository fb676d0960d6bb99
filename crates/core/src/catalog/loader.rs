use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::{CatalogError, CatalogSource, Faq, KnowledgeBase};
use crate::domain::room::{Room, Upsell};

/// Loads every `*.json` file in a directory into a [`KnowledgeBase`].
///
/// A file may be a container (`{"rooms": [...], "faqs": [...], "upsells": [...]}`)
/// or a single entry whose kind comes from its `type` tag or, failing that,
/// from its file name. Unreadable files and malformed entries are logged and
/// skipped.
#[derive(Clone, Debug)]
pub struct DirectoryCatalogSource {
    directory: PathBuf,
}

impl DirectoryCatalogSource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into() }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl CatalogSource for DirectoryCatalogSource {
    fn load(&self) -> Result<KnowledgeBase, CatalogError> {
        let mut knowledge = KnowledgeBase::default();
        if !self.directory.exists() {
            warn!(
                event_name = "system.knowledge.directory_missing",
                path = %self.directory.display(),
                "knowledge directory does not exist; starting with an empty catalog"
            );
            return Ok(knowledge);
        }

        let entries = fs::read_dir(&self.directory).map_err(|source| {
            CatalogError::ReadDirectory { path: self.directory.clone(), source }
        })?;

        let mut files = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
            .collect::<Vec<_>>();
        files.sort();

        for path in files {
            let file_name =
                path.file_name().and_then(|name| name.to_str()).unwrap_or_default().to_string();
            let document = match fs::read_to_string(&path)
                .map_err(|error| error.to_string())
                .and_then(|raw| {
                    serde_json::from_str::<Value>(&raw).map_err(|error| error.to_string())
                }) {
                Ok(document) => document,
                Err(error) => {
                    warn!(
                        event_name = "system.knowledge.file_skipped",
                        path = %path.display(),
                        error = %error,
                        "skipping unreadable knowledge file"
                    );
                    continue;
                }
            };
            absorb_document(&mut knowledge, &file_name, document);
        }

        info!(
            event_name = "system.knowledge.loaded",
            path = %self.directory.display(),
            rooms = knowledge.rooms.len(),
            faqs = knowledge.faqs.len(),
            upsells = knowledge.upsells.len(),
            "knowledge base loaded"
        );
        Ok(knowledge)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EntryKind {
    Room,
    Faq,
    Upsell,
}

impl EntryKind {
    fn from_type_tag(value: Option<&Value>) -> Option<Self> {
        match value.and_then(Value::as_str)?.trim().to_ascii_lowercase().as_str() {
            "room" => Some(Self::Room),
            "faq" => Some(Self::Faq),
            "upsell" => Some(Self::Upsell),
            _ => None,
        }
    }

    fn from_file_name(file_name: &str) -> Option<Self> {
        let lowered = file_name.to_ascii_lowercase();
        if lowered.contains("room") {
            Some(Self::Room)
        } else if lowered.contains("faq") {
            Some(Self::Faq)
        } else if lowered.contains("upsell") {
            Some(Self::Upsell)
        } else {
            None
        }
    }
}

const CONTAINER_KEYS: [(&str, EntryKind); 3] =
    [("rooms", EntryKind::Room), ("faqs", EntryKind::Faq), ("upsells", EntryKind::Upsell)];

fn absorb_document(knowledge: &mut KnowledgeBase, file_name: &str, document: Value) {
    match document {
        Value::Object(map) if is_container(&map) => {
            for (key, kind) in CONTAINER_KEYS {
                match map.get(key) {
                    Some(Value::Array(items)) => {
                        for item in items {
                            push_entry(knowledge, kind, item.clone(), file_name);
                        }
                    }
                    Some(_) => warn!(
                        event_name = "system.knowledge.entry_skipped",
                        file = file_name,
                        key,
                        "skipping knowledge section that is not an array"
                    ),
                    None => {}
                }
            }
        }
        Value::Object(map) => {
            let kind = EntryKind::from_type_tag(map.get("type"))
                .or_else(|| EntryKind::from_file_name(file_name));
            match kind {
                Some(kind) => push_entry(knowledge, kind, Value::Object(map), file_name),
                None => warn!(
                    event_name = "system.knowledge.entry_skipped",
                    file = file_name,
                    "skipping knowledge file with no recognizable entry kind"
                ),
            }
        }
        Value::Array(items) => match EntryKind::from_file_name(file_name) {
            Some(kind) => {
                for item in items {
                    push_entry(knowledge, kind, item, file_name);
                }
            }
            None => warn!(
                event_name = "system.knowledge.entry_skipped",
                file = file_name,
                "skipping knowledge array whose file name names no entry kind"
            ),
        },
        _ => warn!(
            event_name = "system.knowledge.entry_skipped",
            file = file_name,
            "skipping knowledge file that is neither an object nor an array"
        ),
    }
}

fn is_container(map: &Map<String, Value>) -> bool {
    CONTAINER_KEYS.iter().any(|(key, _)| map.contains_key(*key))
}

fn push_entry(knowledge: &mut KnowledgeBase, kind: EntryKind, entry: Value, file_name: &str) {
    let result = match kind {
        EntryKind::Room => serde_json::from_value::<Room>(entry)
            .map_err(|error| error.to_string())
            .and_then(validate_room)
            .map(|room| {
                if knowledge.rooms.iter().any(|existing| existing.id == room.id) {
                    warn!(
                        event_name = "system.knowledge.duplicate_room",
                        file = file_name,
                        room_id = %room.id,
                        "ignoring duplicate room id; first definition wins"
                    );
                } else {
                    knowledge.rooms.push(room);
                }
            }),
        EntryKind::Faq => serde_json::from_value::<Faq>(entry)
            .map_err(|error| error.to_string())
            .map(|faq| knowledge.faqs.push(faq)),
        EntryKind::Upsell => serde_json::from_value::<Upsell>(entry)
            .map_err(|error| error.to_string())
            .and_then(validate_upsell)
            .map(|upsell| knowledge.upsells.push(upsell)),
    };

    if let Err(error) = result {
        warn!(
            event_name = "system.knowledge.entry_skipped",
            file = file_name,
            kind = ?kind,
            error = %error,
            "skipping malformed knowledge entry"
        );
    }
}

fn validate_room(room: Room) -> Result<Room, String> {
    if room.id.0.trim().is_empty() || room.name.trim().is_empty() {
        return Err("room id and name must be non-empty".to_string());
    }
    if room.price < Decimal::ZERO {
        return Err(format!("room `{}` has a negative price", room.id));
    }
    Ok(room)
}

fn validate_upsell(upsell: Upsell) -> Result<Upsell, String> {
    if upsell.id.0.trim().is_empty() {
        return Err("upsell id must be non-empty".to_string());
    }
    if upsell.price < Decimal::ZERO {
        return Err(format!("upsell `{}` has a negative price", upsell.id.0));
    }
    Ok(upsell)
}
