use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::model::{self, EntryFields, EntryId, MenuDocument, MenuEntry};
use crate::ports::{KeyValueStore, SeedSource};

/// Slot the forest is persisted under.
pub const STORAGE_KEY: &str = "menu-editor.menu";

/// Where an inserted entry ended up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Root,
    Child(EntryId),
    /// The requested parent does not exist; the entry was appended to the roots.
    ParentMissing(EntryId),
}

/// Where the forest came from on the last (re)load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOrigin {
    Persisted,
    Seed,
}

pub struct MenuStore {
    forest: Vec<MenuEntry>,
    storage: Box<dyn KeyValueStore>,
    seed: Box<dyn SeedSource>,
    origin: Option<LoadOrigin>,
}

impl MenuStore {
    pub fn new(storage: Box<dyn KeyValueStore>, seed: Box<dyn SeedSource>) -> Self {
        Self {
            forest: Vec::new(),
            storage,
            seed,
            origin: None,
        }
    }

    /// Adopts the persisted forest when there is a readable one, otherwise
    /// loads the seed document and persists it. On seed failure the forest
    /// is left empty.
    pub fn initialize(&mut self) -> Result<&[MenuEntry], StoreError> {
        if let Some(forest) = self.read_persisted() {
            info!(entries = model::count(&forest), "loaded persisted menu");
            self.forest = forest;
            self.origin = Some(LoadOrigin::Persisted);
            return Ok(&self.forest);
        }

        self.forest.clear();
        self.origin = None;
        let source_name = self.seed.describe();
        let text = self.seed.fetch().map_err(|err| StoreError::Seed {
            source_name: source_name.clone(),
            reason: err.to_string(),
        })?;
        let document: MenuDocument =
            serde_json::from_str(&text).map_err(|err| StoreError::Seed {
                source_name: source_name.clone(),
                reason: err.to_string(),
            })?;

        info!(source = %source_name, entries = model::count(&document.menu), "loaded seed menu");
        self.forest = document.menu;
        self.origin = Some(LoadOrigin::Seed);
        self.persist_logged();
        Ok(&self.forest)
    }

    pub fn reload(&mut self) -> Result<&[MenuEntry], StoreError> {
        self.initialize()
    }

    /// Drops the persisted copy and starts over from the seed. When the
    /// persisted copy cannot be removed the forest is left as it was.
    pub fn reset(&mut self) -> Result<&[MenuEntry], StoreError> {
        if let Err(err) = self.storage.remove(STORAGE_KEY) {
            error!(%err, "failed to clear persisted menu");
            return Err(StoreError::Clear(err.to_string()));
        }
        info!("persisted menu cleared");
        self.initialize()
    }

    fn read_persisted(&self) -> Option<Vec<MenuEntry>> {
        let data = match self.storage.get(STORAGE_KEY) {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!("no persisted menu");
                return None;
            }
            Err(err) => {
                warn!(%err, "persisted menu unreadable, falling back to seed");
                return None;
            }
        };
        match serde_json::from_str::<Vec<MenuEntry>>(&data) {
            Ok(forest) => Some(forest),
            Err(err) => {
                warn!(%err, "persisted menu corrupt, falling back to seed");
                None
            }
        }
    }

    pub fn forest(&self) -> &[MenuEntry] {
        &self.forest
    }

    pub fn origin(&self) -> Option<LoadOrigin> {
        self.origin
    }

    pub fn seed_description(&self) -> String {
        self.seed.describe()
    }

    pub fn document(&self) -> MenuDocument {
        MenuDocument {
            menu: self.forest.clone(),
        }
    }

    /// One past the largest id in use, or 1 for an empty forest.
    pub fn next_id(&self) -> Result<EntryId, StoreError> {
        match model::max_id(&self.forest) {
            None => Ok(1),
            Some(max) => max.checked_add(1).ok_or(StoreError::IdsExhausted(max)),
        }
    }

    pub fn find_by_id(&self, id: EntryId) -> Option<&MenuEntry> {
        model::find(&self.forest, id)
    }

    pub fn find_by_id_mut(&mut self, id: EntryId) -> Option<&mut MenuEntry> {
        model::find_mut(&mut self.forest, id)
    }

    pub fn insert(&mut self, entry: MenuEntry, parent_id: Option<EntryId>) -> InsertOutcome {
        let outcome = match parent_id {
            None => {
                self.forest.push(entry);
                InsertOutcome::Root
            }
            Some(parent_id) => match model::find_mut(&mut self.forest, parent_id) {
                Some(parent) => {
                    parent.children.push(entry);
                    InsertOutcome::Child(parent_id)
                }
                None => {
                    warn!(parent_id, "parent not found, inserting at root level");
                    self.forest.push(entry);
                    InsertOutcome::ParentMissing(parent_id)
                }
            },
        };
        self.persist_logged();
        outcome
    }

    /// Allocates an id and inserts a fresh, childless entry.
    pub fn create(
        &mut self,
        fields: EntryFields,
        parent_id: Option<EntryId>,
    ) -> Result<(EntryId, InsertOutcome), StoreError> {
        let id = self.next_id()?;
        let outcome = self.insert(MenuEntry::new(id, fields), parent_id);
        debug!(id, ?outcome, "entry created");
        Ok((id, outcome))
    }

    pub fn update(&mut self, id: EntryId, fields: EntryFields) -> Result<(), StoreError> {
        let entry = self.find_by_id_mut(id).ok_or(StoreError::NotFound(id))?;
        entry.apply(fields);
        debug!(id, "entry updated");
        self.persist_logged();
        Ok(())
    }

    /// Removes the entry and its subtree wherever it occurs. Missing ids are
    /// a no-op.
    pub fn delete_by_id(&mut self, id: EntryId) -> bool {
        let removed = model::remove(&mut self.forest, id) > 0;
        if removed {
            debug!(id, "entry deleted");
        } else {
            debug!(id, "delete ignored, no such entry");
        }
        self.persist_logged();
        removed
    }

    pub fn persist(&mut self) -> Result<(), StoreError> {
        let data = serde_json::to_string(&self.forest)?;
        self.storage
            .set(STORAGE_KEY, &data)
            .map_err(|err| StoreError::Storage(err.to_string()))
    }

    fn persist_logged(&mut self) {
        if let Err(err) = self.persist() {
            error!(%err, "failed to persist menu, keeping in-memory copy");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::FetchError;
    use crate::ports::{MemoryStore, StaticSeed};

    const SEED: &str = r##"{"menu":[
        {"id":1,"label":"Home","href":"/"},
        {"id":2,"label":"Products","href":"#","children":[
            {"id":3,"label":"Catalog","href":"/catalog"},
            {"id":7,"label":"Offers","href":"/offers"}
        ]},
        {"id":4,"label":"Docs","href":"https://example.com"}
    ]}"##;

    fn fields(label: &str, href: &str) -> EntryFields {
        EntryFields {
            label: label.into(),
            href: href.into(),
            icon: None,
        }
    }

    fn seeded() -> MenuStore {
        let mut store = MenuStore::new(
            Box::new(MemoryStore::new()),
            Box::new(StaticSeed(SEED.into())),
        );
        store.initialize().unwrap();
        store
    }

    fn ids(entries: &[MenuEntry]) -> Vec<EntryId> {
        entries.iter().map(|entry| entry.id).collect()
    }

    /// Storage that shares its slots with the test and can be told to fail.
    #[derive(Clone, Default)]
    struct SharedStore {
        slots: Rc<RefCell<Option<String>>>,
        fail_writes: Rc<RefCell<bool>>,
        fail_removes: Rc<RefCell<bool>>,
        writes: Rc<RefCell<usize>>,
    }

    impl KeyValueStore for SharedStore {
        fn get(&self, _key: &str) -> io::Result<Option<String>> {
            Ok(self.slots.borrow().clone())
        }

        fn set(&mut self, _key: &str, value: &str) -> io::Result<()> {
            if *self.fail_writes.borrow() {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            *self.writes.borrow_mut() += 1;
            *self.slots.borrow_mut() = Some(value.to_string());
            Ok(())
        }

        fn remove(&mut self, _key: &str) -> io::Result<()> {
            if *self.fail_removes.borrow() {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
            }
            *self.slots.borrow_mut() = None;
            Ok(())
        }
    }

    struct FailingSeed;

    impl SeedSource for FailingSeed {
        fn fetch(&self) -> Result<String, FetchError> {
            Err(FetchError::Status(404))
        }

        fn describe(&self) -> String {
            "failing seed".into()
        }
    }

    #[test]
    fn initialize_from_seed_persists_immediately() {
        let shared = SharedStore::default();
        let mut store = MenuStore::new(Box::new(shared.clone()), Box::new(StaticSeed(SEED.into())));
        store.initialize().unwrap();

        assert_eq!(store.origin(), Some(LoadOrigin::Seed));
        assert_eq!(ids(store.forest()), vec![1, 2, 4]);
        let persisted = shared.slots.borrow().clone().unwrap();
        let parsed: Vec<MenuEntry> = serde_json::from_str(&persisted).unwrap();
        assert_eq!(parsed, store.forest());
    }

    #[test]
    fn initialize_prefers_persisted_copy() {
        let storage = MemoryStore::with_slot(STORAGE_KEY, r#"[{"id":10,"label":"Saved","href":"/s"}]"#);
        let mut store = MenuStore::new(Box::new(storage), Box::new(StaticSeed(SEED.into())));
        store.initialize().unwrap();
        assert_eq!(store.origin(), Some(LoadOrigin::Persisted));
        assert_eq!(ids(store.forest()), vec![10]);
    }

    #[test]
    fn corrupt_persisted_copy_falls_back_to_seed() {
        let storage = MemoryStore::with_slot(STORAGE_KEY, "{not json");
        let mut store = MenuStore::new(Box::new(storage), Box::new(StaticSeed(SEED.into())));
        store.initialize().unwrap();
        assert_eq!(store.origin(), Some(LoadOrigin::Seed));
        assert_eq!(ids(store.forest()), vec![1, 2, 4]);
    }

    #[test]
    fn seed_without_menu_field_gives_empty_forest() {
        let mut store = MenuStore::new(Box::new(MemoryStore::new()), Box::new(StaticSeed("{}".into())));
        assert!(store.initialize().unwrap().is_empty());
        assert_eq!(store.next_id().unwrap(), 1);
    }

    #[test]
    fn seed_failure_leaves_forest_empty_and_is_retryable() {
        let mut store = MenuStore::new(Box::new(MemoryStore::new()), Box::new(FailingSeed));
        let err = store.initialize().unwrap_err();
        assert!(matches!(err, StoreError::Seed { .. }));
        assert!(store.forest().is_empty());
        assert_eq!(store.origin(), None);
        assert!(store.reload().is_err());
    }

    #[test]
    fn unparseable_seed_is_a_load_failure() {
        let mut store = MenuStore::new(Box::new(MemoryStore::new()), Box::new(StaticSeed("<html>".into())));
        assert!(matches!(store.initialize(), Err(StoreError::Seed { .. })));
        assert!(store.forest().is_empty());
    }

    #[test]
    fn next_id_is_never_in_use() {
        let store = seeded();
        assert_eq!(store.next_id().unwrap(), 8);
        assert!(store.find_by_id(store.next_id().unwrap()).is_none());
    }

    #[test]
    fn next_id_follows_negative_ids() {
        let mut store = MenuStore::new(
            Box::new(MemoryStore::new()),
            Box::new(StaticSeed(r#"{"menu":[{"id":-7,"label":"A","href":"/a"},{"id":-3,"label":"B","href":"/b"}]}"#.into())),
        );
        store.initialize().unwrap();
        assert_eq!(ids(store.forest()), vec![-7, -3]);
        assert_eq!(store.next_id().unwrap(), -2);
    }

    #[test]
    fn exhausted_ids_are_an_error_not_a_panic() {
        let seed = format!(r#"{{"menu":[{{"id":{},"label":"Last","href":"/"}}]}}"#, i64::MAX);
        let mut store = MenuStore::new(Box::new(MemoryStore::new()), Box::new(StaticSeed(seed)));
        store.initialize().unwrap();
        assert!(matches!(store.next_id(), Err(StoreError::IdsExhausted(i64::MAX))));
        assert!(matches!(
            store.create(fields("More", "/more"), None),
            Err(StoreError::IdsExhausted(_))
        ));
        assert_eq!(store.forest().len(), 1);
    }

    #[test]
    fn insert_under_parent_appends_last() {
        let mut store = seeded();
        let (id, outcome) = store.create(fields("Sale", "/sale"), Some(2)).unwrap();
        assert_eq!(outcome, InsertOutcome::Child(2));
        assert_eq!(store.find_by_id(2).unwrap().children.last().unwrap().id, id);
        assert!(store.find_by_id(id).unwrap().children.is_empty());
    }

    #[test]
    fn insert_under_nested_parent() {
        let mut store = seeded();
        let (id, outcome) = store.create(fields("Deep", "/deep"), Some(3)).unwrap();
        assert_eq!(outcome, InsertOutcome::Child(3));
        assert_eq!(ids(&store.find_by_id(3).unwrap().children), vec![id]);
    }

    #[test]
    fn insert_under_missing_parent_falls_back_to_root() {
        let mut store = seeded();
        let (id, outcome) = store.create(fields("Orphan", "/orphan"), Some(99)).unwrap();
        assert_eq!(outcome, InsertOutcome::ParentMissing(99));
        assert_eq!(ids(store.forest()), vec![1, 2, 4, id]);
    }

    #[test]
    fn update_touches_only_editable_fields() {
        let mut store = seeded();
        let before = store.find_by_id(2).unwrap().clone();
        store
            .update(
                2,
                EntryFields {
                    label: "Shop".into(),
                    href: "/shop".into(),
                    icon: Some("🛒".into()),
                },
            )
            .unwrap();
        let after = store.find_by_id(2).unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.children, before.children);
        assert_eq!(after.label, "Shop");
        assert_eq!(after.href, "/shop");
        assert_eq!(after.icon.as_deref(), Some("🛒"));
    }

    #[test]
    fn update_missing_entry_is_rejected_without_writing() {
        let shared = SharedStore::default();
        let mut store = MenuStore::new(Box::new(shared.clone()), Box::new(StaticSeed(SEED.into())));
        store.initialize().unwrap();
        let writes = *shared.writes.borrow();
        assert!(matches!(store.update(42, fields("x", "/x")), Err(StoreError::NotFound(42))));
        assert_eq!(*shared.writes.borrow(), writes);
    }

    #[test]
    fn delete_nested_keeps_siblings_in_order() {
        let mut store = seeded();
        assert!(store.delete_by_id(3));
        assert!(store.find_by_id(3).is_none());
        assert_eq!(ids(store.forest()), vec![1, 2, 4]);
        assert_eq!(ids(&store.find_by_id(2).unwrap().children), vec![7]);
    }

    #[test]
    fn delete_root_removes_subtree() {
        let mut store = seeded();
        assert!(store.delete_by_id(2));
        assert!(store.find_by_id(3).is_none());
        assert!(store.find_by_id(7).is_none());
        assert_eq!(ids(store.forest()), vec![1, 4]);
    }

    #[test]
    fn delete_missing_is_a_no_op() {
        let mut store = seeded();
        let before = store.forest().to_vec();
        assert!(!store.delete_by_id(1234));
        assert_eq!(store.forest(), before.as_slice());
    }

    #[test]
    fn persistence_failure_keeps_memory_authoritative() {
        let shared = SharedStore::default();
        let mut store = MenuStore::new(Box::new(shared.clone()), Box::new(StaticSeed(SEED.into())));
        store.initialize().unwrap();
        *shared.fail_writes.borrow_mut() = true;

        let (id, _) = store.create(fields("Kept", "/kept"), None).unwrap();
        assert!(store.find_by_id(id).is_some());
        assert!(matches!(store.persist(), Err(StoreError::Storage(_))));

        let persisted: Vec<MenuEntry> =
            serde_json::from_str(&shared.slots.borrow().clone().unwrap()).unwrap();
        assert!(model::find(&persisted, id).is_none());
    }

    #[test]
    fn reload_picks_up_persisted_mutations() {
        let shared = SharedStore::default();
        let mut store = MenuStore::new(Box::new(shared.clone()), Box::new(StaticSeed(SEED.into())));
        store.initialize().unwrap();
        store.delete_by_id(1);
        store.reload().unwrap();
        assert_eq!(store.origin(), Some(LoadOrigin::Persisted));
        assert_eq!(ids(store.forest()), vec![2, 4]);
    }

    #[test]
    fn reset_discards_edits_and_reseeds() {
        let mut store = seeded();
        store.delete_by_id(1);
        store.create(fields("Extra", "/extra"), None).unwrap();
        store.reset().unwrap();
        assert_eq!(store.origin(), Some(LoadOrigin::Seed));
        assert_eq!(ids(store.forest()), vec![1, 2, 4]);
    }

    #[test]
    fn reset_that_cannot_clear_storage_keeps_the_forest() {
        let shared = SharedStore::default();
        let mut store = MenuStore::new(Box::new(shared.clone()), Box::new(StaticSeed(SEED.into())));
        store.initialize().unwrap();
        store.delete_by_id(1);
        *shared.fail_removes.borrow_mut() = true;

        assert!(matches!(store.reset(), Err(StoreError::Clear(_))));
        assert_eq!(ids(store.forest()), vec![2, 4]);
        assert_eq!(store.origin(), Some(LoadOrigin::Seed));
    }
}
