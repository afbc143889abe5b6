//! Pure projections of the forest: the visual tree the terminal list is
//! built from, the JSON document shown and exported, and an HTML fragment.

use std::fmt::Write as _;

use crate::error::ValidationError;
use crate::model::{EntryFields, EntryId, MenuDocument, MenuEntry};

/// Href that marks an entry as a non-navigating group header.
pub const PLACEHOLDER_HREF: &str = "#";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Link {
    Navigate(String),
    Inert,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Edit(EntryId),
    Delete(EntryId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedNode {
    pub id: EntryId,
    pub text: String,
    pub target: Link,
    pub actions: [Action; 2],
    pub children: Vec<RenderedNode>,
}

/// A rendered node positioned in the flat list the terminal draws.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayRow {
    pub id: EntryId,
    pub depth: usize,
    pub text: String,
    pub target: Link,
    pub actions: [Action; 2],
    pub has_children: bool,
}

pub fn render(forest: &[MenuEntry]) -> Vec<RenderedNode> {
    forest.iter().map(render_entry).collect()
}

fn render_entry(entry: &MenuEntry) -> RenderedNode {
    let label = escape_label(&entry.label);
    let text = match entry.icon.as_deref().map(str::trim) {
        Some(icon) if !icon.is_empty() => format!("{} {label}", escape_label(icon)),
        _ => label,
    };
    RenderedNode {
        id: entry.id,
        text,
        target: link_for(&entry.href),
        actions: [Action::Edit(entry.id), Action::Delete(entry.id)],
        children: entry.children.iter().map(render_entry).collect(),
    }
}

fn link_for(href: &str) -> Link {
    let trimmed = href.trim();
    if trimmed.is_empty() || trimmed == PLACEHOLDER_HREF {
        Link::Inert
    } else {
        Link::Navigate(trimmed.to_string())
    }
}

pub fn flatten(nodes: &[RenderedNode]) -> Vec<DisplayRow> {
    let mut rows = Vec::new();
    push_rows(nodes, 0, &mut rows);
    rows
}

fn push_rows(nodes: &[RenderedNode], depth: usize, rows: &mut Vec<DisplayRow>) {
    for node in nodes {
        rows.push(DisplayRow {
            id: node.id,
            depth,
            text: node.text.clone(),
            target: node.target.clone(),
            actions: node.actions,
            has_children: !node.children.is_empty(),
        });
        push_rows(&node.children, depth + 1, rows);
    }
}

/// Replaces control characters so a label cannot smuggle terminal escape
/// sequences into the display.
pub fn escape_label(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_control() { '\u{FFFD}' } else { c })
        .collect()
}

pub fn serialize(forest: &[MenuEntry]) -> serde_json::Result<String> {
    #[derive(serde::Serialize)]
    struct Borrowed<'a> {
        menu: &'a [MenuEntry],
    }
    serde_json::to_string_pretty(&Borrowed { menu: forest })
}

pub fn parse_document(text: &str) -> serde_json::Result<MenuDocument> {
    serde_json::from_str(text)
}

pub fn to_html(forest: &[MenuEntry]) -> String {
    let mut out = String::new();
    write_html_list(forest, 0, &mut out);
    out
}

fn write_html_list(entries: &[MenuEntry], depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth * 2);
    let class = if depth == 0 { "menu" } else { "submenu" };
    let _ = writeln!(out, "{pad}<ul class=\"{class}\">");
    for entry in entries {
        let mut inner = String::new();
        if let Some(icon) = entry.icon.as_deref().filter(|icon| !icon.trim().is_empty()) {
            let _ = write!(inner, "<span class=\"icon\">{}</span> ", html_escape(icon));
        }
        inner.push_str(&html_escape(&entry.label));
        let item = match link_for(&entry.href) {
            Link::Navigate(href) if validate_href(&href) => {
                format!("<a href=\"{}\">{inner}</a>", html_escape(&href))
            }
            _ => format!("<span class=\"group\">{inner}</span>"),
        };
        if entry.children.is_empty() {
            let _ = writeln!(out, "{pad}  <li data-id=\"{}\">{item}</li>", entry.id);
        } else {
            let _ = writeln!(out, "{pad}  <li data-id=\"{}\">{item}", entry.id);
            write_html_list(&entry.children, depth + 1, out);
            let _ = writeln!(out, "{pad}  </li>");
        }
    }
    let _ = writeln!(out, "{pad}</ul>");
}

fn html_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Accepts site-relative paths and http(s) URLs.
pub fn validate_href(href: &str) -> bool {
    if href.starts_with('/') {
        return true;
    }
    ["http://", "https://"].iter().any(|scheme| {
        href.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

pub fn validate_fields(fields: EntryFields) -> Result<EntryFields, ValidationError> {
    let label = fields.label.trim().to_string();
    if label.is_empty() {
        return Err(ValidationError::EmptyLabel);
    }
    let href = fields.href.trim().to_string();
    if !validate_href(&href) {
        return Err(ValidationError::InvalidHref);
    }
    let icon = fields
        .icon
        .map(|icon| icon.trim().to_string())
        .filter(|icon| !icon.is_empty());
    Ok(EntryFields { label, href, icon })
}
