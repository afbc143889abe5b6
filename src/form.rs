use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::error::ValidationError;
use crate::model::{EntryFields, EntryId, MenuEntry};
use crate::projection;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EntryField {
    Label,
    Href,
    Icon,
    Parent,
}

/// What the form will do on submit.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FormMode {
    Create,
    Edit(EntryId),
}

pub struct EntryFormState {
    pub mode: FormMode,
    pub label: String,
    pub href: String,
    pub icon: String,
    pub parent: String,
    pub selected_field: EntryField,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryFormInput {
    pub mode: FormMode,
    pub label: String,
    pub href: String,
    pub icon: String,
    pub parent: String,
}

/// A validated submission, ready for the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntrySubmission {
    pub mode: FormMode,
    pub fields: EntryFields,
    pub parent_id: Option<EntryId>,
}

pub enum EntryFormKeyResult {
    Continue,
    Cancel,
    Submit(EntryFormInput),
}

impl EntryFormState {
    pub fn create(parent_id: Option<EntryId>) -> Self {
        Self {
            mode: FormMode::Create,
            label: String::new(),
            href: String::new(),
            icon: String::new(),
            parent: parent_id.map(|id| id.to_string()).unwrap_or_default(),
            selected_field: EntryField::Label,
            error: None,
        }
    }

    pub fn edit(entry: &MenuEntry) -> Self {
        let fields = entry.fields();
        Self {
            mode: FormMode::Edit(entry.id),
            label: fields.label,
            href: fields.href,
            icon: fields.icon.unwrap_or_default(),
            parent: String::new(),
            selected_field: EntryField::Label,
            error: None,
        }
    }

    pub fn mode_label(&self) -> String {
        match self.mode {
            FormMode::Create => "New Menu Entry".into(),
            FormMode::Edit(id) => format!("Edit Menu Entry #{id}"),
        }
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.mode, FormMode::Edit(_))
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> EntryFormKeyResult {
        self.error = None;
        match key.code {
            KeyCode::Esc => EntryFormKeyResult::Cancel,
            KeyCode::Enter => EntryFormKeyResult::Submit(self.to_input()),
            KeyCode::Tab | KeyCode::Down => {
                self.next_field();
                EntryFormKeyResult::Continue
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.previous_field();
                EntryFormKeyResult::Continue
            }
            KeyCode::Backspace => {
                self.active_value_mut().pop();
                EntryFormKeyResult::Continue
            }
            KeyCode::Delete => {
                self.active_value_mut().clear();
                EntryFormKeyResult::Continue
            }
            KeyCode::Char(c) => {
                let accepted = match self.selected_field {
                    EntryField::Parent => {
                        c.is_ascii_digit() || (c == '-' && self.parent.is_empty())
                    }
                    _ => true,
                };
                if accepted && !key.modifiers.contains(KeyModifiers::CONTROL) {
                    self.active_value_mut().push(c);
                }
                EntryFormKeyResult::Continue
            }
            _ => EntryFormKeyResult::Continue,
        }
    }

    pub fn to_input(&self) -> EntryFormInput {
        EntryFormInput {
            mode: self.mode,
            label: self.label.clone(),
            href: self.href.clone(),
            icon: self.icon.clone(),
            parent: self.parent.clone(),
        }
    }

    pub fn focus(&mut self, field: EntryField) {
        if field == EntryField::Parent && self.is_editing() {
            return;
        }
        self.selected_field = field;
    }

    fn next_field(&mut self) {
        self.selected_field = match self.selected_field {
            EntryField::Label => EntryField::Href,
            EntryField::Href => EntryField::Icon,
            EntryField::Icon if self.is_editing() => EntryField::Label,
            EntryField::Icon => EntryField::Parent,
            EntryField::Parent => EntryField::Label,
        };
    }

    fn previous_field(&mut self) {
        self.selected_field = match self.selected_field {
            EntryField::Label if self.is_editing() => EntryField::Icon,
            EntryField::Label => EntryField::Parent,
            EntryField::Href => EntryField::Label,
            EntryField::Icon => EntryField::Href,
            EntryField::Parent => EntryField::Icon,
        };
    }

    fn active_value_mut(&mut self) -> &mut String {
        match self.selected_field {
            EntryField::Label => &mut self.label,
            EntryField::Href => &mut self.href,
            EntryField::Icon => &mut self.icon,
            EntryField::Parent => &mut self.parent,
        }
    }
}

impl EntryFormInput {
    /// Runs the label and link checks and parses the parent id. Nothing is
    /// mutated when this fails.
    pub fn validate(self) -> Result<EntrySubmission, ValidationError> {
        let fields = projection::validate_fields(EntryFields {
            label: self.label,
            href: self.href,
            icon: Some(self.icon),
        })?;
        let parent_id = match (self.mode, self.parent.trim()) {
            (FormMode::Edit(_), _) | (_, "") => None,
            (FormMode::Create, raw) => Some(
                raw.parse::<EntryId>()
                    .map_err(|_| ValidationError::InvalidParentId)?,
            ),
        };
        Ok(EntrySubmission {
            mode: self.mode,
            fields,
            parent_id,
        })
    }
}
