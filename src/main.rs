use std::io::{self, Write};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, ExecutableCommand};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::info;

use menu_editor::app::AppState;
use menu_editor::config::{AppPaths, Cli, CliCommand};
use menu_editor::ui::{self, Theme};
use menu_editor::{export, logging};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = AppPaths::new(cli.data_dir.clone())?;
    logging::init(&paths.log_file, cli.verbose)?;
    info!(data_dir = %paths.data_dir.display(), "starting menu-editor");

    let mut store = cli.build_store(&paths)?;
    match cli.command.clone() {
        Some(CliCommand::Export { path }) => {
            store.initialize()?;
            let path = path.unwrap_or_else(|| paths.export_file.clone());
            export::write_json(&path, store.forest())?;
            println!("Exported menu to {}", path.display());
            Ok(())
        }
        Some(CliCommand::Html { path }) => {
            store.initialize()?;
            let path = path.unwrap_or_else(|| paths.html_file.clone());
            export::write_html(&path, store.forest())?;
            println!("Wrote HTML menu to {}", path.display());
            Ok(())
        }
        Some(CliCommand::Reset) => {
            let source = store.seed_description();
            let forest = store.reset().context("Reset failed")?;
            println!(
                "Menu reset from {source} ({} top-level entries)",
                forest.len()
            );
            Ok(())
        }
        None => {
            let mut app = AppState::new(store, paths);
            run_app(&mut app)
        }
    }
}

fn run_app(app: &mut AppState) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    stdout.execute(EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;

    let result = event_loop(&mut terminal, app);

    restore_terminal(&mut terminal)?;
    info!("menu-editor exiting");
    result
}

fn event_loop<B>(terminal: &mut Terminal<B>, app: &mut AppState) -> Result<()>
where
    B: ratatui::backend::Backend + Write,
{
    let tick_rate = Duration::from_millis(200);
    let theme = Theme::nord();
    loop {
        terminal.draw(|frame| ui::render(frame, app, &theme))?;

        if event::poll(tick_rate)? {
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => app.handle_key(key),
                Event::Mouse(mouse) => {
                    let size = terminal.size()?;
                    app.handle_mouse(mouse, size);
                }
                _ => {}
            }
        }
        app.tick(Instant::now());

        if app.should_quit() {
            break;
        }
    }
    Ok(())
}

fn restore_terminal<B>(terminal: &mut Terminal<B>) -> Result<()>
where
    B: ratatui::backend::Backend + Write,
{
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}
