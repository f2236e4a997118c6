mod app;
mod cli;
mod ui;

use std::time::{Duration, Instant};

use anyhow::Result;
use app::App;
use clap::Parser;
use cli::Cli;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent,
    MouseEventKind,
};
use crossterm::execute;
use ratatui::DefaultTerminal;
use tracing::info;

use sar_map::catalog::Catalog;
use sar_map::config::Config;
use sar_map::data;
use sar_map::geodesy::UnitSystem;
use sar_map::map::SceneRenderer;
use sar_map::telemetry::{self, StatusLog};
use sar_map::tools::ToolKind;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let status = StatusLog::default();
    telemetry::init(cli.log_file.as_deref(), status.clone())?;

    let mut config = Config::load(cli.config.as_deref())?;
    if cli.imperial {
        config.tools.units = UnitSystem::Imperial;
    }
    let catalog = match &cli.catalog {
        Some(path) => data::load_catalog(path)?,
        None => Catalog::seeded(),
    };

    let mut terminal = ratatui::init();
    terminal.clear()?;
    execute!(std::io::stdout(), EnableMouseCapture)?;

    let result = run(&mut terminal, &cli, config, catalog, status);

    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    result
}

fn load_base_map(renderer: &mut SceneRenderer, cli: &Cli) {
    data::load_base_map(renderer, &cli.data_dir);
    if !renderer.has_data() {
        info!("no Natural Earth data found, using built-in outlines");
        data::generate_simple_world(renderer);
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    app.set_mouse_pos(mouse.column, mouse.row);

    match mouse.kind {
        MouseEventKind::ScrollUp => app.zoom_in_at(mouse.column, mouse.row),
        MouseEventKind::ScrollDown => app.zoom_out_at(mouse.column, mouse.row),
        // Horizontal scroll for panning (trackpad two-finger swipe)
        MouseEventKind::ScrollLeft => app.pan(-15, 0),
        MouseEventKind::ScrollRight => app.pan(15, 0),
        MouseEventKind::Down(MouseButton::Left) => app.mouse_down(mouse.column, mouse.row),
        MouseEventKind::Drag(MouseButton::Left) => app.handle_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => app.mouse_up(mouse.column, mouse.row, Instant::now()),
        // Right click ends the current measurement
        MouseEventKind::Down(MouseButton::Right) => app.tools.clear(),
        _ => {}
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Esc => {
            if app.tools.active_kind() == ToolKind::None {
                app.quit();
            } else {
                app.select_tool(ToolKind::None);
            }
        }

        // Pan with hjkl or arrow keys
        KeyCode::Left | KeyCode::Char('h') => app.pan(-10, 0),
        KeyCode::Right | KeyCode::Char('l') => app.pan(10, 0),
        KeyCode::Up | KeyCode::Char('k') => app.pan(0, -6),
        KeyCode::Down | KeyCode::Char('j') => app.pan(0, 6),
        KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_in(),
        KeyCode::Char('-') | KeyCode::Char('_') => app.zoom_out(),
        KeyCode::Char('r') => app.reset_view(),

        // Measurement tools
        KeyCode::Char(c @ '1'..='6') => {
            let index = c as usize - '1' as usize;
            app.select_tool(ToolKind::ALL[index]);
        }
        KeyCode::Char('0') => app.select_tool(ToolKind::None),
        KeyCode::Char('c') => app.tools.clear(),
        KeyCode::Char('u') => app.toggle_units(),

        // Catalog and overlays
        KeyCode::Char('s') => app.search(),
        KeyCode::Char('v') => app.toggle_search_in_view(),
        KeyCode::Char(']') | KeyCode::Tab => app.select_next(),
        KeyCode::Char('[') | KeyCode::BackTab => app.select_prev(),
        KeyCode::Enter => app.show_selected(),
        KeyCode::Char('t') => app.toggle_selected(),
        KeyCode::Char('x') => app.remove_selected(),
        KeyCode::Char('X') => app.clear_overlays(),
        KeyCode::Char('b') => app.cycle_base_layer(),
        KeyCode::Char('f') => app.renderer.toggle_footprints(),
        KeyCode::Char('L') => app.renderer.toggle_labels(),
        _ => {}
    }
}

fn run(terminal: &mut DefaultTerminal, cli: &Cli, config: Config, catalog: Catalog, status: StatusLog) -> Result<()> {
    let size = terminal.size()?;
    let mut app = App::new(size.width as usize, size.height as usize, config, catalog, status);
    load_base_map(&mut app.renderer, cli);

    loop {
        terminal.draw(|frame| ui::render(frame, &app))?;

        // ~60fps
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(&mut app, key),
                Event::Mouse(mouse) => handle_mouse(&mut app, mouse),
                Event::Resize(width, height) => app.resize(width as usize, height as usize),
                _ => {}
            }
        }

        app.tick();

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
