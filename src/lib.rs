//! Terminal editor for hierarchical navigation menus.
//!
//! [`store::MenuStore`] owns the menu forest and persists it through a
//! [`ports::KeyValueStore`]; [`projection`] turns the forest into what the
//! terminal UI, the JSON export and the HTML export show.

pub mod app;
pub mod config;
pub mod error;
pub mod export;
pub mod form;
pub mod logging;
pub mod model;
pub mod ports;
pub mod projection;
pub mod store;
pub mod ui;

pub use error::{FetchError, StoreError, ValidationError};
pub use model::{EntryFields, EntryId, MenuDocument, MenuEntry};
pub use store::{InsertOutcome, MenuStore};
