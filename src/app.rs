use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::prelude::Rect;
use tracing::{error, info, warn};

use crate::config::AppPaths;
use crate::error::StoreError;
use crate::export;
use crate::form::{EntryFormInput, EntryFormKeyResult, EntryFormState, FormMode};
use crate::model::EntryId;
use crate::projection::{self, Action, DisplayRow, Link};
use crate::store::{InsertOutcome, LoadOrigin, MenuStore};
use crate::ui::{self, FooterAction};

/// How long a status message stays on screen.
pub const STATUS_TTL: Duration = Duration::from_secs(4);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StatusKind {
    Info,
    Error,
}

pub struct StatusMessage {
    pub text: String,
    pub kind: StatusKind,
    pub shown_at: Instant,
}

#[derive(Clone)]
pub struct InfoPopup {
    pub id: EntryId,
    pub label: String,
    pub href: String,
    pub icon: String,
    pub children: usize,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ConfirmAction {
    Delete { id: EntryId, label: String },
    Reset,
}

pub enum PopupState {
    Info(InfoPopup),
    Message(String),
    Confirm(ConfirmAction),
    EntryForm(EntryFormState),
}

enum PopupResult {
    None,
    Close(Option<String>),
    FormSubmit(EntryFormInput),
    Confirmed(ConfirmAction),
}

pub struct AppState {
    pub(crate) store: MenuStore,
    pub(crate) paths: AppPaths,
    pub(crate) rows: Vec<DisplayRow>,
    pub(crate) json_text: String,
    pub(crate) current_index: usize,
    pub(crate) show_json: bool,
    pub(crate) should_quit: bool,
    pub(crate) status: Option<StatusMessage>,
    pub(crate) active_popup: Option<PopupState>,
    pub(crate) title: String,
}

impl AppState {
    /// Loads the menu. A load failure is shown to the user, not returned.
    pub fn new(store: MenuStore, paths: AppPaths) -> Self {
        let mut app = AppState {
            store,
            paths,
            rows: Vec::new(),
            json_text: String::new(),
            current_index: 0,
            show_json: false,
            should_quit: false,
            status: None,
            active_popup: None,
            title: "Menu Editor".into(),
        };
        let result = app.store.initialize().map(|_| ());
        app.finish_load(result);
        app
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn store(&self) -> &MenuStore {
        &self.store
    }

    fn finish_load(&mut self, result: Result<(), StoreError>) {
        match result {
            Ok(()) => {
                let origin = match self.store.origin() {
                    Some(LoadOrigin::Persisted) => "saved state",
                    _ => "seed",
                };
                self.set_status(format!("Menu loaded from {origin}"));
            }
            Err(err) => {
                error!(%err, "menu load failed");
                self.active_popup = Some(PopupState::Message(format!(
                    "Unable to load the menu.\n\n{err}\n\nPress r to retry."
                )));
                self.set_error(format!("{err} (press r to retry)"));
            }
        }
        self.current_index = 0;
        self.rebuild_display();
    }

    /// Re-projects the whole forest. Called after every mutation.
    pub fn rebuild_display(&mut self) {
        self.rows = projection::flatten(&projection::render(self.store.forest()));
        self.json_text = match projection::serialize(self.store.forest()) {
            Ok(text) => text,
            Err(err) => {
                error!(%err, "failed to serialize menu");
                format!("<unable to serialize menu: {err}>")
            }
        };
        if self.current_index >= self.rows.len() {
            self.current_index = self.rows.len().saturating_sub(1);
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: message.into(),
            kind: StatusKind::Info,
            shown_at: Instant::now(),
        });
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: message.into(),
            kind: StatusKind::Error,
            shown_at: Instant::now(),
        });
    }

    /// Clears the status message once it has been visible for `STATUS_TTL`.
    pub fn tick(&mut self, now: Instant) {
        if self
            .status
            .as_ref()
            .is_some_and(|status| now.duration_since(status.shown_at) >= STATUS_TTL)
        {
            self.status = None;
        }
    }

    pub fn status_text(&self) -> String {
        let total = self.rows.len();
        let current = if total == 0 {
            0
        } else {
            self.current_index + 1
        };
        let mut text = format!("Entry {}/{}", current, total);
        if let Some(status) = &self.status {
            text.push_str(" | ");
            text.push_str(&status.text);
        }
        text
    }

    pub fn selected_id(&self) -> Option<EntryId> {
        self.rows.get(self.current_index).map(|row| row.id)
    }

    fn selected_action(&self, wanted: fn(&Action) -> bool) -> Option<Action> {
        let row = self.rows.get(self.current_index)?;
        row.actions.iter().copied().find(|action| wanted(action))
    }

    /// Runs an entry affordance from the rendered list.
    pub fn perform(&mut self, action: Action) {
        match action {
            Action::Edit(id) => self.open_edit(id),
            Action::Delete(id) => self.request_delete(id),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if let Some(popup) = self.active_popup.as_mut() {
            let result = match popup {
                PopupState::Info(_) | PopupState::Message(_) => match key.code {
                    KeyCode::Esc | KeyCode::Enter => PopupResult::Close(None),
                    _ => PopupResult::None,
                },
                PopupState::Confirm(action) => match key.code {
                    KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                        PopupResult::Confirmed(action.clone())
                    }
                    KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                        PopupResult::Close(Some("Cancelled".into()))
                    }
                    _ => PopupResult::None,
                },
                PopupState::EntryForm(form) => match form.handle_key(key) {
                    EntryFormKeyResult::Continue => PopupResult::None,
                    EntryFormKeyResult::Cancel => PopupResult::Close(Some("Edit cancelled".into())),
                    EntryFormKeyResult::Submit(input) => PopupResult::FormSubmit(input),
                },
            };
            self.apply_popup_result(result);
            return;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Up | KeyCode::Char('k') => self.move_selection_up(),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection_down(),
            KeyCode::Enter => self.show_info_popup(),
            KeyCode::Char('n') => self.open_new_entry(None),
            KeyCode::Char('a') => self.open_new_child(),
            KeyCode::Char('e') => self.open_edit_current(),
            KeyCode::Char('d') => self.request_delete_current(),
            KeyCode::Char('t') => self.show_json = !self.show_json,
            KeyCode::Char('x') => self.export_json(),
            KeyCode::Char('h') => self.export_html(),
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('R') => self.active_popup = Some(PopupState::Confirm(ConfirmAction::Reset)),
            _ => {}
        }
    }

    fn apply_popup_result(&mut self, result: PopupResult) {
        match result {
            PopupResult::None => {}
            PopupResult::Close(message) => {
                self.active_popup = None;
                if let Some(msg) = message {
                    self.set_status(msg);
                }
            }
            PopupResult::FormSubmit(input) => match self.apply_form_input(input) {
                Ok(msg) => {
                    self.active_popup = None;
                    self.set_status(msg);
                }
                Err(err_msg) => {
                    if let Some(PopupState::EntryForm(form)) = self.active_popup.as_mut() {
                        form.error = Some(err_msg);
                    }
                }
            },
            PopupResult::Confirmed(action) => {
                self.active_popup = None;
                match action {
                    ConfirmAction::Delete { id, .. } => self.delete_entry(id),
                    ConfirmAction::Reset => self.reset(),
                }
            }
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent, terminal_area: Rect) {
        if !matches!(mouse.kind, MouseEventKind::Down(MouseButton::Left)) {
            return;
        }
        if self.active_popup.is_some() {
            return;
        }
        let layout = ui::screen_layout(terminal_area, self.show_json);
        if let Some(index) = ui::row_at_position(
            layout.list,
            mouse.column,
            mouse.row,
            self.current_index,
            self.rows.len(),
        ) {
            if index == self.current_index {
                self.show_info_popup();
            } else {
                self.current_index = index;
            }
            return;
        }
        if let Some(action) = ui::footer_action_at(layout.shortcuts, mouse.column, mouse.row) {
            self.execute_footer_action(action);
        }
    }

    pub fn execute_footer_action(&mut self, action: FooterAction) {
        match action {
            FooterAction::Quit => self.should_quit = true,
            FooterAction::NewEntry => self.open_new_entry(None),
            FooterAction::AddChild => self.open_new_child(),
            FooterAction::Edit => self.open_edit_current(),
            FooterAction::Delete => self.request_delete_current(),
            FooterAction::ToggleJson => self.show_json = !self.show_json,
            FooterAction::Export => self.export_json(),
            FooterAction::Reset => self.active_popup = Some(PopupState::Confirm(ConfirmAction::Reset)),
        }
    }

    fn move_selection_up(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        if self.current_index == 0 {
            self.current_index = self.rows.len() - 1;
        } else {
            self.current_index -= 1;
        }
    }

    fn move_selection_down(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        self.current_index = (self.current_index + 1) % self.rows.len();
    }

    fn select_id(&mut self, id: EntryId) {
        if let Some(index) = self.rows.iter().position(|row| row.id == id) {
            self.current_index = index;
        }
    }

    fn show_info_popup(&mut self) {
        let Some(entry) = self.selected_id().and_then(|id| self.store.find_by_id(id)) else {
            return;
        };
        self.active_popup = Some(PopupState::Info(InfoPopup {
            id: entry.id,
            label: entry.label.clone(),
            href: entry.href.clone(),
            icon: entry.icon.clone().unwrap_or_default(),
            children: entry.children.len(),
        }));
    }

    pub fn open_new_entry(&mut self, parent_id: Option<EntryId>) {
        self.active_popup = Some(PopupState::EntryForm(EntryFormState::create(parent_id)));
    }

    fn open_new_child(&mut self) {
        match self.selected_id() {
            Some(id) => self.open_new_entry(Some(id)),
            None => self.set_error("Select a parent entry first"),
        }
    }

    pub fn open_edit_current(&mut self) {
        if let Some(action) = self.selected_action(|action| matches!(action, Action::Edit(_))) {
            self.perform(action);
        }
    }

    fn open_edit(&mut self, id: EntryId) {
        match self.store.find_by_id(id) {
            Some(entry) => {
                self.active_popup = Some(PopupState::EntryForm(EntryFormState::edit(entry)));
            }
            None => self.set_error(format!("Entry #{id} not found")),
        }
    }

    pub fn request_delete_current(&mut self) {
        if let Some(action) = self.selected_action(|action| matches!(action, Action::Delete(_))) {
            self.perform(action);
        }
    }

    fn request_delete(&mut self, id: EntryId) {
        let label = self
            .store
            .find_by_id(id)
            .map(|entry| entry.label.clone())
            .unwrap_or_default();
        self.active_popup = Some(PopupState::Confirm(ConfirmAction::Delete { id, label }));
    }

    /// Validates and applies a submitted form. The error string is shown in
    /// the still-open form.
    pub fn apply_form_input(&mut self, input: EntryFormInput) -> Result<String, String> {
        let submission = input.validate().map_err(|err| err.to_string())?;
        let message = match submission.mode {
            FormMode::Create => {
                let (id, outcome) = match self.store.create(submission.fields, submission.parent_id) {
                    Ok(created) => created,
                    Err(err) => {
                        error!(%err, "entry not created");
                        self.set_error(format!("Cannot add entry: {err}"));
                        return Err(err.to_string());
                    }
                };
                self.rebuild_display();
                self.select_id(id);
                match outcome {
                    InsertOutcome::Root => format!("Entry #{id} added"),
                    InsertOutcome::Child(parent) => format!("Entry #{id} added under #{parent}"),
                    InsertOutcome::ParentMissing(parent) => {
                        format!("Parent #{parent} not found; entry #{id} added at root level")
                    }
                }
            }
            FormMode::Edit(id) => {
                if let Err(err) = self.store.update(id, submission.fields) {
                    warn!(%err, "edit rejected");
                    return Err("Entry no longer exists".into());
                }
                self.rebuild_display();
                format!("Entry #{id} updated")
            }
        };
        Ok(message)
    }

    pub fn delete_entry(&mut self, id: EntryId) {
        if self.store.delete_by_id(id) {
            self.rebuild_display();
            self.set_status(format!("Entry #{id} deleted"));
        } else {
            self.set_error(format!("Entry #{id} not found"));
        }
    }

    pub fn export_json(&mut self) {
        let path = self.paths.export_file.clone();
        match export::write_json(&path, self.store.forest()) {
            Ok(()) => self.set_status(format!("Exported to {}", path.display())),
            Err(err) => {
                error!(%err, "export failed");
                self.set_error(format!("Export failed: {err}"));
            }
        }
    }

    pub fn export_html(&mut self) {
        let path = self.paths.html_file.clone();
        match export::write_html(&path, self.store.forest()) {
            Ok(()) => self.set_status(format!("HTML written to {}", path.display())),
            Err(err) => {
                error!(%err, "HTML export failed");
                self.set_error(format!("HTML export failed: {err}"));
            }
        }
    }

    pub fn reload(&mut self) {
        info!("reloading menu");
        let result = self.store.reload().map(|_| ());
        self.finish_load(result);
    }

    pub fn reset(&mut self) {
        info!("resetting menu to seed");
        match self.store.reset().map(|_| ()) {
            Err(StoreError::Clear(reason)) => {
                error!(%reason, "reset aborted");
                self.set_error(format!("Reset failed, saved menu kept: {reason}"));
            }
            result => self.finish_load(result),
        }
    }

    pub fn link_label(row: &DisplayRow) -> String {
        match &row.target {
            Link::Navigate(href) => href.clone(),
            Link::Inert => "(no link)".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::KeyModifiers;
    use tempfile::TempDir;

    use super::*;
    use crate::error::FetchError;
    use crate::ports::{KeyValueStore, MemoryStore, SeedSource, StaticSeed};

    const SEED: &str = r##"{"menu":[
        {"id":1,"label":"Home","href":"/"},
        {"id":2,"label":"Group","href":"#","children":[{"id":3,"label":"Child","href":"/child"}]}
    ]}"##;

    struct Unreachable;

    impl SeedSource for Unreachable {
        fn fetch(&self) -> Result<String, FetchError> {
            Err(FetchError::Http("connection refused".into()))
        }

        fn describe(&self) -> String {
            "http://unreachable".into()
        }
    }

    /// Storage whose slot can be written but never cleared.
    #[derive(Default)]
    struct PinnedStore(MemoryStore);

    impl KeyValueStore for PinnedStore {
        fn get(&self, key: &str) -> std::io::Result<Option<String>> {
            self.0.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> std::io::Result<()> {
            self.0.set(key, value)
        }

        fn remove(&mut self, _key: &str) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"))
        }
    }

    fn app_with(seed: Box<dyn SeedSource>, dir: &TempDir) -> AppState {
        let store = MenuStore::new(Box::new(MemoryStore::new()), seed);
        AppState::new(store, AppPaths::in_dir(dir.path().to_path_buf()))
    }

    fn app(dir: &TempDir) -> AppState {
        app_with(Box::new(StaticSeed(SEED.into())), dir)
    }

    fn press(app: &mut AppState, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_text(app: &mut AppState, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn startup_projects_every_depth() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        let layout: Vec<(EntryId, usize)> = app.rows.iter().map(|row| (row.id, row.depth)).collect();
        assert_eq!(layout, vec![(1, 0), (2, 0), (3, 1)]);
        assert!(app.json_text.contains("\"menu\""));
        assert_eq!(AppState::link_label(&app.rows[1]), "(no link)");
    }

    #[test]
    fn seed_failure_shows_error_and_leaves_list_empty() {
        let dir = TempDir::new().unwrap();
        let app = app_with(Box::new(Unreachable), &dir);
        assert!(app.rows.is_empty());
        let status = app.status.as_ref().unwrap();
        assert_eq!(status.kind, StatusKind::Error);
        assert!(status.text.contains("http://unreachable"));
        assert!(matches!(app.active_popup, Some(PopupState::Message(_))));
    }

    #[test]
    fn new_entry_through_the_form() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        press(&mut app, KeyCode::Char('n'));
        type_text(&mut app, "About");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "/about");
        press(&mut app, KeyCode::Enter);

        assert!(app.active_popup.is_none());
        let entry = app.store.find_by_id(4).unwrap();
        assert_eq!(entry.label, "About");
        assert_eq!(app.selected_id(), Some(4));
        assert_eq!(app.store.forest().len(), 3);
    }

    #[test]
    fn invalid_submission_keeps_form_open() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        press(&mut app, KeyCode::Char('n'));
        type_text(&mut app, "Broken");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "ftp://x");
        press(&mut app, KeyCode::Enter);

        let Some(PopupState::EntryForm(form)) = &app.active_popup else {
            panic!("form should stay open");
        };
        assert_eq!(form.error.as_deref(), Some("Link must start with / or http(s)://"));
        assert_eq!(form.label, "Broken");
        assert_eq!(app.store.next_id().unwrap(), 4);
    }

    #[test]
    fn add_child_prefills_the_selected_parent() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "Nested");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "/nested");
        press(&mut app, KeyCode::Enter);

        let parent = app.store.find_by_id(2).unwrap();
        assert_eq!(parent.children.last().map(|e| e.id), Some(4));
        assert!(app.status_text().contains("added under #2"));
    }

    #[test]
    fn missing_parent_falls_back_with_message() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        let mut form = EntryFormState::create(Some(77));
        form.label = "Loose".into();
        form.href = "https://x".into();
        let msg = app.apply_form_input(form.to_input()).unwrap();
        assert!(msg.contains("Parent #77 not found"));
        assert_eq!(app.store.forest().last().map(|e| e.id), Some(4));
    }

    #[test]
    fn edit_of_vanished_entry_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        press(&mut app, KeyCode::Char('e'));
        app.store.delete_by_id(1);
        press(&mut app, KeyCode::Enter);
        let Some(PopupState::EntryForm(form)) = &app.active_popup else {
            panic!("form should stay open");
        };
        assert_eq!(form.error.as_deref(), Some("Entry no longer exists"));
    }

    #[test]
    fn delete_requires_confirmation() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Char('d'));
        assert!(matches!(
            app.active_popup,
            Some(PopupState::Confirm(ConfirmAction::Delete { id: 2, .. }))
        ));
        press(&mut app, KeyCode::Char('n'));
        assert!(app.store.find_by_id(2).is_some());

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('y'));
        assert!(app.store.find_by_id(2).is_none());
        assert!(app.store.find_by_id(3).is_none());
        assert_eq!(app.rows.len(), 1);
        assert_eq!(app.current_index, 0);
    }

    #[test]
    fn reset_restores_the_seed() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        app.delete_entry(1);
        press(&mut app, KeyCode::Char('R'));
        press(&mut app, KeyCode::Char('y'));
        assert_eq!(app.rows.len(), 3);
    }

    #[test]
    fn reset_that_cannot_clear_storage_reports_it() {
        let dir = TempDir::new().unwrap();
        let store = MenuStore::new(
            Box::new(PinnedStore::default()),
            Box::new(StaticSeed(SEED.into())),
        );
        let mut app = AppState::new(store, AppPaths::in_dir(dir.path().to_path_buf()));
        app.delete_entry(1);
        press(&mut app, KeyCode::Char('R'));
        press(&mut app, KeyCode::Char('y'));

        assert!(app.active_popup.is_none());
        assert_eq!(app.rows.len(), 2);
        let status = app.status.as_ref().unwrap();
        assert_eq!(status.kind, StatusKind::Error);
        assert!(status.text.starts_with("Reset failed, saved menu kept"));
    }

    #[test]
    fn exhausted_ids_keep_the_form_open() {
        let dir = TempDir::new().unwrap();
        let seed = format!(r#"{{"menu":[{{"id":{},"label":"Last","href":"/"}}]}}"#, i64::MAX);
        let mut app = app_with(Box::new(StaticSeed(seed)), &dir);
        press(&mut app, KeyCode::Char('n'));
        type_text(&mut app, "More");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "/more");
        press(&mut app, KeyCode::Enter);

        let Some(PopupState::EntryForm(form)) = &app.active_popup else {
            panic!("form should stay open");
        };
        assert!(form.error.as_deref().unwrap().contains("no free entry id"));
        assert_eq!(app.status.as_ref().unwrap().kind, StatusKind::Error);
        assert_eq!(app.store.forest().len(), 1);
    }

    #[test]
    fn row_actions_drive_edit_and_delete() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.rows[2].actions, [Action::Edit(3), Action::Delete(3)]);

        press(&mut app, KeyCode::Char('e'));
        let Some(PopupState::EntryForm(form)) = &app.active_popup else {
            panic!("edit form expected");
        };
        assert_eq!(form.mode, FormMode::Edit(3));
        press(&mut app, KeyCode::Esc);

        app.perform(Action::Delete(1));
        assert!(matches!(
            app.active_popup,
            Some(PopupState::Confirm(ConfirmAction::Delete { id: 1, .. }))
        ));
    }

    #[test]
    fn export_writes_the_document() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        press(&mut app, KeyCode::Char('x'));
        let written = std::fs::read_to_string(dir.path().join("menu-export.json")).unwrap();
        assert_eq!(written, app.json_text);
    }

    #[test]
    fn status_clears_after_ttl() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        let shown = app.status.as_ref().unwrap().shown_at;
        app.tick(shown + Duration::from_secs(1));
        assert!(app.status.is_some());
        app.tick(shown + STATUS_TTL);
        assert!(app.status.is_none());
    }

    #[test]
    fn selection_wraps_around() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        press(&mut app, KeyCode::Up);
        assert_eq!(app.selected_id(), Some(3));
        press(&mut app, KeyCode::Down);
        assert_eq!(app.selected_id(), Some(1));
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit());
    }
}
