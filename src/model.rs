use serde::{Deserialize, Serialize};

pub type EntryId = i64;

/// One navigation entry. Children are owned by their parent, in insertion order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MenuEntry {
    pub id: EntryId,
    #[serde(default, alias = "nombre")]
    pub label: String,
    #[serde(default, alias = "enlace")]
    pub href: String,
    #[serde(default, alias = "icono", skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(
        default,
        alias = "hijos",
        alias = "submenu",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub children: Vec<MenuEntry>,
}

/// Shape shared by the seed document and the export artifact.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct MenuDocument {
    #[serde(default)]
    pub menu: Vec<MenuEntry>,
}

/// The editable part of an entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryFields {
    pub label: String,
    pub href: String,
    pub icon: Option<String>,
}

impl MenuEntry {
    pub fn new(id: EntryId, fields: EntryFields) -> Self {
        MenuEntry {
            id,
            label: fields.label,
            href: fields.href,
            icon: fields.icon,
            children: Vec::new(),
        }
    }

    pub fn fields(&self) -> EntryFields {
        EntryFields {
            label: self.label.clone(),
            href: self.href.clone(),
            icon: self.icon.clone(),
        }
    }

    pub fn apply(&mut self, fields: EntryFields) {
        self.label = fields.label;
        self.href = fields.href;
        self.icon = fields.icon;
    }
}

pub fn max_id(entries: &[MenuEntry]) -> Option<EntryId> {
    entries
        .iter()
        .map(|entry| {
            let nested = max_id(&entry.children).unwrap_or(0);
            entry.id.max(nested)
        })
        .max()
}

pub fn find<'a>(entries: &'a [MenuEntry], id: EntryId) -> Option<&'a MenuEntry> {
    for entry in entries {
        if entry.id == id {
            return Some(entry);
        }
        if let Some(found) = find(&entry.children, id) {
            return Some(found);
        }
    }
    None
}

pub fn find_mut<'a>(entries: &'a mut [MenuEntry], id: EntryId) -> Option<&'a mut MenuEntry> {
    for entry in entries.iter_mut() {
        if entry.id == id {
            return Some(entry);
        }
        if let Some(found) = find_mut(&mut entry.children, id) {
            return Some(found);
        }
    }
    None
}

/// Drops every entry with `id` (and its subtree) at any depth. Returns the
/// number of entries removed at their own level.
pub fn remove(entries: &mut Vec<MenuEntry>, id: EntryId) -> usize {
    let before = entries.len();
    entries.retain(|entry| entry.id != id);
    let mut removed = before - entries.len();
    for entry in entries.iter_mut() {
        removed += remove(&mut entry.children, id);
    }
    removed
}

pub fn count(entries: &[MenuEntry]) -> usize {
    entries
        .iter()
        .map(|entry| 1 + count(&entry.children))
        .sum()
}
