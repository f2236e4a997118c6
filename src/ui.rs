use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Widget},
    Frame,
};
use tracing::Level;

use crate::app::{App, PANEL_WIDTH};
use sar_map::braille::BrailleCanvas;
use sar_map::map::MapLayers;
use sar_map::scene::{MarkerColor, MarkerSink};
use sar_map::tools::ToolKind;

fn marker_color(color: MarkerColor) -> Color {
    match color {
        MarkerColor::Yellow => Color::Yellow,
        MarkerColor::Lime => Color::LightGreen,
        MarkerColor::Green => Color::Green,
        MarkerColor::Red => Color::Red,
        MarkerColor::DeepSkyBlue => Color::LightBlue,
        MarkerColor::OrangeRed => Color::Rgb(255, 69, 0),
        MarkerColor::Purple => Color::Magenta,
        MarkerColor::White => Color::White,
    }
}

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(frame.area());
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(PANEL_WIDTH)])
        .split(rows[0]);

    render_map(frame, app, columns[0]);
    render_panel(frame, app, columns[1]);
    render_status_bar(frame, app, rows[1]);
}

fn render_map(frame: &mut Frame, app: &App, area: Rect) {
    let base = app.layers.base_layer().map_or("no base layer", |k| k.name());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            format!(" Globe · {base} "),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Braille gives 2x4 resolution per character
    let mut viewport = app.viewport.clone();
    viewport.set_size(inner.width as usize * 2, inner.height as usize * 4);

    let layers = app.renderer.render(
        inner.width as usize,
        inner.height as usize,
        &viewport,
        app.layers.adapter(),
        app.tools.sink(),
    );

    let cursor_pos = app
        .mouse_pixel_pos()
        .map(|(px, py)| ((px / 2) as u16, (py / 4) as u16))
        .filter(|&(cx, cy)| cx < inner.width && cy < inner.height);

    frame.render_widget(MapWidget { layers, cursor_pos }, inner);
}

/// Braille layers with text labels overlaid
struct MapWidget {
    layers: MapLayers,
    cursor_pos: Option<(u16, u16)>,
}

impl MapWidget {
    fn render_layer(canvas: &BrailleCanvas, color: Color, area: Rect, buf: &mut Buffer) {
        for row in 0..area.height {
            for col in 0..area.width {
                if let Some(ch) = canvas.glyph(col as usize, row as usize) {
                    buf[(area.x + col, area.y + row)].set_char(ch).set_fg(color);
                }
            }
        }
    }
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // back to front
        Self::render_layer(&self.layers.graticule, Color::DarkGray, area, buf);
        Self::render_layer(&self.layers.imagery, Color::Gray, area, buf);
        Self::render_layer(&self.layers.coastlines, Color::Cyan, area, buf);
        Self::render_layer(&self.layers.borders, Color::Blue, area, buf);
        Self::render_layer(&self.layers.footprints, Color::LightYellow, area, buf);
        for (color, canvas) in &self.layers.markers {
            Self::render_layer(canvas, marker_color(*color), area, buf);
        }

        for label in &self.layers.labels {
            if label.row >= area.height || label.col >= area.width {
                continue;
            }
            let style = Style::default().fg(marker_color(label.color)).add_modifier(Modifier::BOLD);
            let room = (area.width - label.col) as usize;
            for (i, ch) in label.text.chars().take(room).enumerate() {
                buf[(area.x + label.col + i as u16, area.y + label.row)].set_char(ch).set_style(style);
            }
        }

        if let Some((cx, cy)) = self.cursor_pos {
            buf[(area.x + cx, area.y + cy)].set_char('╋').set_fg(Color::Red);
        }
    }
}

fn render_panel(frame: &mut Frame, app: &App, area: Rect) {
    let halves = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let scope = if app.search_in_view { "in view" } else { "anywhere" };
    let title = format!(" Images {}..{} {scope} ", app.search_start.format("%Y-%m-%d"), app.search_end.format("%m-%d"));
    let items: Vec<ListItem> = app
        .results
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let marker = match app.layers.overlay(&record.image_id) {
                Some(overlay) if overlay.visible => "●",
                Some(_) => "○",
                None => " ",
            };
            let style = if app.selected == Some(i) {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(Span::styled(
                format!("{marker} {} {}", record.image_id, record.timestamp.format("%Y-%m-%d %H:%M")),
                style,
            )))
        })
        .collect();
    let results = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(results, halves[0]);

    let log_rows = halves[1].height.saturating_sub(2) as usize;
    let lines: Vec<Line> = app
        .status
        .recent(log_rows)
        .into_iter()
        .map(|entry| {
            let color = if entry.level == Level::ERROR {
                Color::Red
            } else if entry.level == Level::WARN {
                Color::Yellow
            } else if entry.level == Level::INFO {
                Color::Gray
            } else {
                Color::DarkGray
            };
            Line::from(vec![
                Span::styled(entry.timestamp.format("%H:%M:%S ").to_string(), Style::default().fg(Color::DarkGray)),
                Span::styled(entry.message, Style::default().fg(color)),
            ])
        })
        .collect();
    let log = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Log "));
    frame.render_widget(log, halves[1]);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let kind = app.tools.active_kind();
    let tool = if kind == ToolKind::None {
        Span::styled(" 1-6:tool ", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(format!(" {} ", kind.label()), Style::default().fg(Color::Black).bg(Color::Yellow))
    };
    let readout = app.measurement_text().unwrap_or_else(|| kind.hint().to_string());
    let footprints = app.renderer.settings.show_footprints;

    let status = Line::from(vec![
        tool,
        Span::styled(format!(" {readout} "), Style::default().fg(Color::White)),
        Span::styled("| ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.tools.units().name(), Style::default().fg(Color::Magenta)),
        Span::styled(" | Zoom: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.zoom_level(), Style::default().fg(Color::Yellow)),
        Span::styled(" | ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.center_coords(), Style::default().fg(Color::Cyan)),
        Span::styled(
            format!(" | {} overlays, {} visuals ", app.layers.overlay_count(), app.tools.sink().len()),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            if footprints { "[F]ootprints " } else { "[f]ootprints " },
            Style::default().fg(if footprints { Color::Green } else { Color::DarkGray }),
        ),
        Span::styled(
            "| s:search ]/[:pick enter:show t:toggle x:remove b:base c:clear u:units q:quit",
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    frame.render_widget(Paragraph::new(status), area);
}
