use glam::DVec3;

use crate::braille::BrailleCanvas;
use crate::geodesy::{Ellipsoid, GeoExtent};
use crate::layers::{BaseLayerKind, LayerContent, OverlayStack};
use crate::map::geometry::{draw_disc, draw_line, draw_wide_line, fill_polygon};
use crate::map::globe::{walk_great_circle, GlobeViewport};
use crate::scene::{LabelAnchor, MarkerColor, MarkerStore, Visual};

/// A geographic line (sequence of lon/lat coordinates)
pub type LineString = Vec<(f64, f64)>;

/// How each base layer kind is drawn in the terminal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BaseStyle {
    /// Graticule spacing in degrees, `None` for no grid
    pub graticule_deg: Option<f64>,
    pub borders: bool,
}

impl BaseStyle {
    pub fn for_kind(kind: BaseLayerKind) -> Self {
        match kind {
            BaseLayerKind::Osm => Self { graticule_deg: Some(30.0), borders: true },
            BaseLayerKind::Bing => Self { graticule_deg: None, borders: false },
            BaseLayerKind::Esri => Self { graticule_deg: Some(15.0), borders: false },
            BaseLayerKind::NaturalEarth => Self { graticule_deg: Some(30.0), borders: false },
        }
    }
}

#[derive(Clone, Debug)]
pub struct DisplaySettings {
    pub show_footprints: bool,
    pub show_labels: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self { show_footprints: true, show_labels: true }
    }
}

/// Text placed over the braille layers, in terminal cells.
#[derive(Clone, Debug, PartialEq)]
pub struct MapLabel {
    pub col: u16,
    pub row: u16,
    pub text: String,
    pub color: MarkerColor,
}

/// Rendered canvases, composited back to front by the UI.
pub struct MapLayers {
    pub graticule: BrailleCanvas,
    pub coastlines: BrailleCanvas,
    pub borders: BrailleCanvas,
    pub imagery: BrailleCanvas,
    pub footprints: BrailleCanvas,
    /// One canvas per tool colour, in first-use order
    pub markers: Vec<(MarkerColor, BrailleCanvas)>,
    pub labels: Vec<MapLabel>,
}

impl MapLayers {
    fn new(width: usize, height: usize) -> Self {
        Self {
            graticule: BrailleCanvas::new(width, height),
            coastlines: BrailleCanvas::new(width, height),
            borders: BrailleCanvas::new(width, height),
            imagery: BrailleCanvas::new(width, height),
            footprints: BrailleCanvas::new(width, height),
            markers: Vec::new(),
            labels: Vec::new(),
        }
    }

    fn marker_canvas(&mut self, color: MarkerColor) -> &mut BrailleCanvas {
        let idx = match self.markers.iter().position(|(c, _)| *c == color) {
            Some(idx) => idx,
            None => {
                let (w, h) = (self.coastlines.pixel_width() / 2, self.coastlines.pixel_height() / 4);
                self.markers.push((color, BrailleCanvas::new(w, h)));
                self.markers.len() - 1
            }
        };
        &mut self.markers[idx].1
    }

    /// Canvas holding visuals of `color`, if any were drawn.
    pub fn markers_of(&self, color: MarkerColor) -> Option<&BrailleCanvas> {
        self.markers.iter().find(|(c, _)| *c == color).map(|(_, canvas)| canvas)
    }
}

/// Draws the base map, imagery stack and tool visuals onto braille layers.
pub struct SceneRenderer {
    coastlines: Vec<LineString>,
    borders: Vec<LineString>,
    pub settings: DisplaySettings,
}

impl SceneRenderer {
    pub fn new() -> Self {
        Self { coastlines: Vec::new(), borders: Vec::new(), settings: DisplaySettings::default() }
    }

    pub fn add_coastline(&mut self, line: LineString) {
        self.coastlines.push(line);
    }

    pub fn add_border(&mut self, line: LineString) {
        self.borders.push(line);
    }

    pub fn has_data(&self) -> bool {
        !self.coastlines.is_empty()
    }

    pub fn toggle_footprints(&mut self) {
        self.settings.show_footprints = !self.settings.show_footprints;
    }

    pub fn toggle_labels(&mut self) {
        self.settings.show_labels = !self.settings.show_labels;
    }

    /// Render everything for a canvas of `width` x `height` terminal cells.
    pub fn render(
        &self,
        width: usize,
        height: usize,
        viewport: &GlobeViewport,
        stack: &OverlayStack,
        markers: &MarkerStore,
    ) -> MapLayers {
        let mut layers = MapLayers::new(width, height);
        let bounds = viewport.visible_bounds();

        let mut base_style = None;
        for (_, layer) in stack.attached_layers().filter(|(_, l)| l.visible) {
            match &layer.content {
                LayerContent::Base(kind) => base_style = Some(BaseStyle::for_kind(*kind)),
                LayerContent::Image { extent, source } => {
                    if extent.intersects(&bounds) {
                        draw_extent(&mut layers.imagery, viewport, extent, Some(source.alpha * 0.5));
                    }
                }
            }
        }

        if let Some(style) = base_style {
            if let Some(step) = style.graticule_deg {
                draw_graticule(&mut layers.graticule, viewport, step);
            }
            for line in &self.coastlines {
                draw_linestring(&mut layers.coastlines, line, viewport);
            }
            if style.borders {
                for line in &self.borders {
                    draw_linestring(&mut layers.borders, line, viewport);
                }
            }
        }

        if self.settings.show_footprints {
            for extent in stack.footprints().filter(|e| e.intersects(&bounds)) {
                draw_extent(&mut layers.footprints, viewport, extent, None);
            }
        }

        for (_, visual) in markers.iter() {
            self.draw_visual(&mut layers, viewport, visual);
        }

        layers
    }

    fn draw_visual(&self, layers: &mut MapLayers, viewport: &GlobeViewport, visual: &Visual) {
        match visual {
            Visual::Point { position, color, size, label } => {
                let Some((px, py)) = world_to_screen(viewport, *position) else {
                    return;
                };
                draw_disc(layers.marker_canvas(*color), px, py, (*size as i32 / 4).max(1));
                if let Some(text) = label {
                    self.push_label(layers, (px, py), text, *color, LabelAnchor::Right);
                }
            }
            Visual::Polyline { positions, color, width } => {
                let canvas = layers.marker_canvas(*color);
                let projected: Vec<_> = positions.iter().map(|p| world_to_screen(viewport, *p)).collect();
                for pair in projected.windows(2) {
                    if let [Some(a), Some(b)] = pair {
                        if viewport.line_might_be_visible(*a, *b) {
                            draw_wide_line(canvas, *a, *b, (*width).div_ceil(2));
                        }
                    }
                }
            }
            Visual::Polygon { positions, color, alpha } => {
                let ring: Option<Vec<_>> = positions.iter().map(|p| world_to_screen(viewport, *p)).collect();
                if let Some(ring) = ring {
                    fill_polygon(layers.marker_canvas(*color), &ring, *alpha);
                }
            }
            Visual::Label { position, text, color, anchor } => {
                if let Some(pixel) = world_to_screen(viewport, *position) {
                    self.push_label(layers, pixel, text, *color, *anchor);
                }
            }
        }
    }

    fn push_label(&self, layers: &mut MapLayers, (px, py): (i32, i32), text: &str, color: MarkerColor, anchor: LabelAnchor) {
        if !self.settings.show_labels || px < 0 || py < 0 {
            return;
        }
        let (col, row) = (px / 2, py / 4);
        let lines: Vec<&str> = text.lines().collect();
        let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as i32;

        let (col, row) = match anchor {
            LabelAnchor::Above => (col - widest / 2, row - lines.len() as i32),
            LabelAnchor::Below => (col - widest / 2, row + 1),
            LabelAnchor::Right => (col + 2, row),
            LabelAnchor::Center => (col - widest / 2, row - lines.len() as i32 / 2),
        };

        for (i, line) in lines.into_iter().enumerate() {
            let (c, r) = (col.max(0), row + i as i32);
            if r < 0 {
                continue;
            }
            layers.labels.push(MapLabel { col: c as u16, row: r as u16, text: line.to_string(), color });
        }
    }
}

impl Default for SceneRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Screen pixel of a world position, `None` behind the globe.
pub fn world_to_screen(viewport: &GlobeViewport, position: DVec3) -> Option<(i32, i32)> {
    let c = Ellipsoid::WGS84.cartesian_to_cartographic(position)?;
    viewport.project(c.lon_degrees(), c.lat_degrees())
}

/// Draw a lon/lat polyline as great-circle arcs, breaking at the limb.
fn draw_linestring(canvas: &mut BrailleCanvas, line: &[(f64, f64)], viewport: &GlobeViewport) {
    let Some(&(mut lon0, mut lat0)) = line.first() else {
        return;
    };
    let mut prev = viewport.project(lon0, lat0);

    for &(lon1, lat1) in &line[1..] {
        walk_great_circle(lon0, lat0, lon1, lat1, |lon, lat| {
            let next = viewport.project(lon, lat);
            if let (Some(a), Some(b)) = (prev, next) {
                if viewport.line_might_be_visible(a, b) {
                    draw_line(canvas, a.0, a.1, b.0, b.1);
                }
            }
            prev = next;
        });
        (lon0, lat0) = (lon1, lat1);
    }
}

/// Outline of a geographic rectangle, optionally stipple-filled.
fn draw_extent(canvas: &mut BrailleCanvas, viewport: &GlobeViewport, extent: &GeoExtent, fill: Option<f32>) {
    let ring = extent.ring();
    draw_linestring(canvas, &ring, viewport);

    if let Some(density) = fill {
        let corners: Option<Vec<_>> = ring[..4].iter().map(|&(lon, lat)| viewport.project(lon, lat)).collect();
        if let Some(corners) = corners {
            fill_polygon(canvas, &corners, density);
        }
    }
}

fn draw_graticule(canvas: &mut BrailleCanvas, viewport: &GlobeViewport, step: f64) {
    let mut lon = -180.0;
    while lon < 180.0 {
        draw_linestring(canvas, &[(lon, -80.0), (lon, 0.0), (lon, 80.0)], viewport);
        lon += step;
    }
    let mut lat = -90.0 + step;
    while lat < 90.0 {
        let parallel: LineString = (0..=36).map(|i| (-180.0 + i as f64 * 10.0, lat)).collect();
        draw_linestring(canvas, &parallel, viewport);
        lat += step;
    }
}
