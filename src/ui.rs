use ratatui::layout::{Constraint, Direction, Layout, Margin};
use ratatui::prelude::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

use crate::app::{AppState, ConfirmAction, InfoPopup, PopupState, StatusKind};
use crate::form::{EntryField, EntryFormState};
use crate::projection::Link;

#[derive(Clone)]
pub struct Theme {
    pub primary: Color,
    pub accent: Color,
    pub highlight: Color,
    pub background: Color,
    pub surface: Color,
    pub text: Color,
    pub muted: Color,
}

impl Theme {
    pub fn nord() -> Self {
        Self {
            primary: color_from_hex("#5E81AC").unwrap_or(Color::Blue),
            accent: color_from_hex("#D08770").unwrap_or(Color::Yellow),
            highlight: color_from_hex("#76B3C5").unwrap_or(Color::Cyan),
            background: color_from_hex("#3B4252").unwrap_or(Color::Black),
            surface: color_from_hex("#4C566A").unwrap_or(Color::DarkGray),
            text: color_from_hex("#ECEFF4").unwrap_or(Color::White),
            muted: color_from_hex("#A3ABB9").unwrap_or(Color::Gray),
        }
    }
}

pub struct ScreenLayout {
    pub header: Rect,
    pub shortcuts: Rect,
    pub content: Rect,
    pub list: Rect,
    pub json: Option<Rect>,
    pub status: Rect,
}

pub fn screen_layout(area: Rect, show_json: bool) -> ScreenLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);
    let content = chunks[2].inner(&Margin {
        vertical: 1,
        horizontal: 1,
    });
    let (list, json) = if show_json {
        let halves = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(content);
        (halves[0], Some(halves[1]))
    } else {
        (content, None)
    };
    ScreenLayout {
        header: chunks[0],
        shortcuts: chunks[1],
        content: chunks[2],
        list,
        json,
        status: chunks[3],
    }
}

/// First visible row so that the selection stays on screen.
pub fn list_offset(current_index: usize, height: u16) -> usize {
    let height = usize::from(height);
    if height == 0 || current_index < height {
        0
    } else {
        current_index + 1 - height
    }
}

pub fn row_at_position(
    list_area: Rect,
    column: u16,
    row: u16,
    current_index: usize,
    total: usize,
) -> Option<usize> {
    if list_area.width == 0 || list_area.height == 0 {
        return None;
    }
    if column < list_area.x
        || column >= list_area.x + list_area.width
        || row < list_area.y
        || row >= list_area.y + list_area.height
    {
        return None;
    }
    let index = list_offset(current_index, list_area.height) + usize::from(row - list_area.y);
    (index < total).then_some(index)
}

pub fn render(frame: &mut Frame, app: &AppState, theme: &Theme) {
    let size = frame.size();
    frame.render_widget(
        Block::default().style(Style::default().bg(theme.background)),
        size,
    );
    let layout = screen_layout(size, app.show_json);

    let header = Paragraph::new(app.title.clone())
        .alignment(Alignment::Center)
        .style(
            Style::default()
                .fg(theme.text)
                .bg(theme.primary)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(header, layout.header);

    let shortcuts = Paragraph::new(footer_line(theme))
        .alignment(Alignment::Center)
        .style(Style::default().bg(theme.highlight));
    frame.render_widget(shortcuts, layout.shortcuts);

    frame.render_widget(
        Block::default().style(Style::default().bg(theme.surface)),
        layout.content,
    );
    render_entries(frame, layout.list, app, theme);
    if let Some(json_area) = layout.json {
        let json = Paragraph::new(app.json_text.clone())
            .style(Style::default().bg(theme.surface).fg(theme.text))
            .block(
                Block::default()
                    .title("menu.json")
                    .borders(Borders::LEFT)
                    .style(Style::default().bg(theme.surface).fg(theme.muted)),
            );
        frame.render_widget(json, json_area);
    }

    let status_bg = match app.status.as_ref().map(|status| status.kind) {
        Some(StatusKind::Error) => Color::Red,
        _ => theme.primary,
    };
    let status = Paragraph::new(app.status_text())
        .alignment(Alignment::Center)
        .style(
            Style::default()
                .bg(status_bg)
                .fg(theme.text)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(status, layout.status);

    if let Some(popup) = &app.active_popup {
        render_popup(frame, popup, app, theme);
    }
}

fn render_entries(frame: &mut Frame, area: Rect, app: &AppState, theme: &Theme) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    let offset = list_offset(app.current_index, area.height);
    let mut items: Vec<ListItem> = Vec::new();
    for (index, row) in app
        .rows
        .iter()
        .enumerate()
        .skip(offset)
        .take(usize::from(area.height))
    {
        let marker = if row.has_children { "▾" } else { "•" };
        let indent = "    ".repeat(row.depth);
        let label_style = match row.target {
            Link::Navigate(_) => Style::default().fg(theme.text),
            Link::Inert => Style::default().fg(theme.text).add_modifier(Modifier::ITALIC),
        };
        let link_text = format!("  → {}", AppState::link_label(row));
        let line = Line::from(vec![
            Span::styled(format!("{indent}{marker} "), Style::default().fg(theme.accent)),
            Span::styled(row.text.clone(), label_style),
            Span::styled(format!("  #{}", row.id), Style::default().fg(theme.muted)),
            Span::styled(link_text, Style::default().fg(theme.muted)),
        ]);
        let mut style = Style::default().fg(theme.text).bg(theme.surface);
        let line = if index == app.current_index {
            style = style
                .bg(theme.highlight)
                .fg(theme.background)
                .add_modifier(Modifier::BOLD);
            highlight_line_with_width(line, area.width as usize, theme)
        } else {
            line
        };
        items.push(ListItem::new(line).style(style));
    }

    if items.is_empty() {
        items.push(ListItem::new(Line::from(Span::styled(
            "No menu entries. Press n to add one.",
            Style::default().fg(theme.muted),
        ))));
    }

    let list = List::new(items)
        .block(Block::default().style(Style::default().bg(theme.surface).fg(theme.text)));
    frame.render_widget(list, area);
}

fn render_popup(frame: &mut Frame, popup: &PopupState, app: &AppState, theme: &Theme) {
    match popup {
        PopupState::Info(info) => {
            let area = centered_rect(frame.size(), 60, 40);
            frame.render_widget(Clear, area);
            render_text_box(frame, area, "Entry Info", info_text(info), theme);
        }
        PopupState::Message(msg) => {
            let area = centered_rect(frame.size(), 50, 30);
            frame.render_widget(Clear, area);
            render_text_box(
                frame,
                area,
                "Message",
                format!("{msg}\n\nPress Enter or Esc to close."),
                theme,
            );
        }
        PopupState::Confirm(action) => {
            let area = centered_rect(frame.size(), 50, 30);
            frame.render_widget(Clear, area);
            let text = match action {
                ConfirmAction::Delete { id, label } => format!(
                    "Delete entry #{id} \"{label}\" and everything beneath it?\n\nPress y to confirm, n to cancel."
                ),
                ConfirmAction::Reset => "Discard all changes and reload the seed menu?\n\nPress y to confirm, n to cancel.".to_string(),
            };
            render_text_box(frame, area, "Confirm", text, theme);
        }
        PopupState::EntryForm(form) => {
            let area = frame.size();
            frame.render_widget(Clear, area);
            render_entry_form(frame, area, app, form, theme);
        }
    }
}

fn info_text(info: &InfoPopup) -> String {
    let icon = if info.icon.is_empty() {
        "(none)"
    } else {
        info.icon.as_str()
    };
    format!(
        "ID: {}\nLabel: {}\nLink: {}\nIcon: {}\nSub-entries: {}\n\nPress Enter or Esc to close.",
        info.id, info.label, info.href, icon, info.children
    )
}

fn render_text_box(frame: &mut Frame, area: Rect, title: &str, text: String, theme: &Theme) {
    let block = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .style(Style::default().bg(theme.surface).fg(theme.text))
        .block(
            Block::default()
                .title(title.to_string())
                .borders(Borders::ALL)
                .style(Style::default().bg(theme.surface)),
        );
    frame.render_widget(block, area);
}

fn render_entry_form(
    frame: &mut Frame,
    area: Rect,
    app: &AppState,
    form: &EntryFormState,
    theme: &Theme,
) {
    let mut lines: Vec<FormLine> = Vec::new();
    lines.push(plain_line(Line::from("Fill in the menu entry details below.")));
    lines.push(make_field_line(
        "Label",
        &form.label,
        form.selected_field == EntryField::Label,
        theme,
    ));
    lines.push(make_field_line(
        "Link",
        &form.href,
        form.selected_field == EntryField::Href,
        theme,
    ));
    lines.push(make_field_line(
        "Icon",
        &form.icon,
        form.selected_field == EntryField::Icon,
        theme,
    ));
    if !form.is_editing() {
        lines.push(make_field_line(
            "Parent ID",
            &form.parent,
            form.selected_field == EntryField::Parent,
            theme,
        ));
    }
    if let Some(error) = &form.error {
        lines.push(plain_line(Line::from(vec![Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )])));
    }
    lines.push(plain_line(Line::from("")));
    lines.push(plain_line(Line::from(vec![Span::styled(
        "Links start with / or http(s)://.",
        Style::default().fg(theme.muted),
    )])));
    if !form.is_editing() {
        lines.push(plain_line(Line::from(vec![Span::styled(
            "Leave Parent ID empty to add the entry at the top level.",
            Style::default().fg(theme.muted),
        )])));
    }

    let key_style = Style::default()
        .fg(theme.accent)
        .add_modifier(Modifier::BOLD);
    let shortcut_line = Line::from(vec![
        Span::styled("Tab", key_style),
        Span::raw("/"),
        Span::styled("Shift+Tab", key_style),
        Span::raw(" Move    "),
        Span::styled("Enter", key_style),
        Span::raw(" Save    "),
        Span::styled("Esc", key_style),
        Span::raw(" Cancel"),
    ]);

    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);
    frame.render_widget(
        Block::default().style(Style::default().bg(theme.background)),
        area,
    );
    let header = Paragraph::new(format!("{} - {}", app.title, form.mode_label()))
        .alignment(Alignment::Center)
        .style(
            Style::default()
                .bg(theme.primary)
                .fg(theme.text)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(header, sections[0]);

    let shortcuts = Paragraph::new(shortcut_line)
        .alignment(Alignment::Center)
        .style(
            Style::default()
                .bg(theme.highlight)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(shortcuts, sections[1]);

    frame.render_widget(
        Block::default().style(Style::default().bg(theme.surface)),
        sections[2],
    );
    let inner = sections[2].inner(&Margin {
        horizontal: 3,
        vertical: 1,
    });
    let rendered_lines = materialize_form_lines(&lines, inner.width as usize, theme);
    let paragraph = Paragraph::new(rendered_lines)
        .wrap(Wrap { trim: true })
        .style(Style::default().bg(theme.surface).fg(theme.text));
    frame.render_widget(paragraph, inner);

    let status = Paragraph::new(app.status_text())
        .alignment(Alignment::Center)
        .style(
            Style::default()
                .bg(theme.primary)
                .fg(theme.text)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(status, sections[3]);
}

#[derive(Clone)]
struct FormLine {
    line: Line<'static>,
    highlight: bool,
}

fn plain_line(line: impl Into<Line<'static>>) -> FormLine {
    FormLine {
        line: line.into(),
        highlight: false,
    }
}

fn materialize_form_lines(lines: &[FormLine], width: usize, theme: &Theme) -> Vec<Line<'static>> {
    lines
        .iter()
        .map(|form_line| {
            if form_line.highlight {
                highlight_line_with_width(form_line.line.clone(), width, theme)
            } else {
                form_line.line.clone()
            }
        })
        .collect()
}

/// Restyles every span and pads the line so the highlight spans the full width.
fn highlight_line_with_width(mut line: Line<'static>, width: usize, theme: &Theme) -> Line<'static> {
    let mut text_width = 0usize;
    let highlight_style = Style::default()
        .fg(theme.background)
        .bg(theme.highlight)
        .add_modifier(Modifier::BOLD);
    for span in &mut line.spans {
        span.style = highlight_style;
        text_width += UnicodeWidthStr::width(span.content.as_ref());
    }
    if width > text_width {
        line.spans
            .push(Span::styled(" ".repeat(width - text_width), highlight_style));
    }
    line
}

fn make_field_line(label: &str, value: &str, selected: bool, theme: &Theme) -> FormLine {
    let value_display = if value.trim().is_empty() {
        "(empty)".to_string()
    } else {
        value.to_string()
    };
    let label_style = Style::default()
        .fg(theme.accent)
        .add_modifier(Modifier::BOLD);
    let label_span = Span::styled(format!("{label}: "), label_style);
    let value_span = Span::styled(value_display, Style::default().fg(theme.text));
    FormLine {
        line: Line::from(vec![label_span, value_span]),
        highlight: selected,
    }
}

fn centered_rect(area: Rect, width_percent: u16, height_percent: u16) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100 - width_percent) / 2),
        ])
        .split(area);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - height_percent) / 2),
            Constraint::Percentage(height_percent),
            Constraint::Percentage((100 - height_percent) / 2),
        ])
        .split(horizontal[1]);
    vertical[1]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FooterAction {
    Quit,
    NewEntry,
    AddChild,
    Edit,
    Delete,
    ToggleJson,
    Export,
    Reset,
}

#[derive(Clone, Copy)]
struct FooterShortcut {
    key: &'static str,
    label: &'static str,
    action: FooterAction,
}

const FOOTER_SHORTCUTS: &[FooterShortcut] = &[
    FooterShortcut {
        key: "q",
        label: " Exit",
        action: FooterAction::Quit,
    },
    FooterShortcut {
        key: "n",
        label: " New",
        action: FooterAction::NewEntry,
    },
    FooterShortcut {
        key: "a",
        label: " Add Child",
        action: FooterAction::AddChild,
    },
    FooterShortcut {
        key: "e",
        label: " Edit",
        action: FooterAction::Edit,
    },
    FooterShortcut {
        key: "d",
        label: " Delete",
        action: FooterAction::Delete,
    },
    FooterShortcut {
        key: "t",
        label: " JSON",
        action: FooterAction::ToggleJson,
    },
    FooterShortcut {
        key: "x",
        label: " Export",
        action: FooterAction::Export,
    },
    FooterShortcut {
        key: "R",
        label: " Reset",
        action: FooterAction::Reset,
    },
];

const FOOTER_SEPARATOR: &str = " | ";

struct FooterSegment {
    start: u16,
    end: u16,
    action: FooterAction,
}

/// Column ranges of each shortcut, relative to the start of the footer text.
fn footer_segments() -> (Vec<FooterSegment>, u16) {
    let mut segments = Vec::new();
    let mut cursor: u16 = 0;
    for (index, shortcut) in FOOTER_SHORTCUTS.iter().enumerate() {
        if index > 0 {
            cursor = cursor.saturating_add(FOOTER_SEPARATOR.width() as u16);
        }
        let start = cursor;
        let end = start
            .saturating_add(shortcut.key.width() as u16)
            .saturating_add(shortcut.label.width() as u16);
        segments.push(FooterSegment {
            start,
            end,
            action: shortcut.action,
        });
        cursor = end;
    }
    (segments, cursor)
}

fn footer_line(theme: &Theme) -> Line<'static> {
    let shortcut_style = Style::default()
        .fg(color_from_hex("#FDA009").unwrap_or(theme.accent))
        .bg(theme.highlight)
        .add_modifier(Modifier::BOLD);
    let label_style = Style::default()
        .fg(color_from_hex("#2E3544").unwrap_or(theme.surface))
        .bg(theme.highlight);
    let mut spans: Vec<Span<'static>> = Vec::new();
    for (index, shortcut) in FOOTER_SHORTCUTS.iter().enumerate() {
        if index > 0 {
            spans.push(Span::styled(FOOTER_SEPARATOR, label_style));
        }
        spans.push(Span::styled(shortcut.key, shortcut_style));
        spans.push(Span::styled(shortcut.label, label_style));
    }
    Line::from(spans)
}

/// Maps a click on the centered shortcut bar to its action.
pub fn footer_action_at(footer_area: Rect, column: u16, row: u16) -> Option<FooterAction> {
    if footer_area.width == 0 || footer_area.height == 0 {
        return None;
    }
    if row < footer_area.y || row >= footer_area.y + footer_area.height {
        return None;
    }
    let (segments, total_width) = footer_segments();
    let text_width = total_width.min(footer_area.width);
    let mut start_x = footer_area.x;
    if footer_area.width > text_width {
        start_x += (footer_area.width - text_width) / 2;
    }
    if column < start_x || column >= start_x + text_width {
        return None;
    }
    let relative = column - start_x;
    segments
        .into_iter()
        .find(|segment| relative >= segment.start && relative < segment.end)
        .map(|segment| segment.action)
}

pub fn color_from_hex(value: &str) -> Option<Color> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color::Rgb(r, g, b))
}
