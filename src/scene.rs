//! Transient scene visuals owned by measurement sessions.

use std::collections::BTreeMap;

use glam::DVec3;

/// Opaque reference to a visual held by a [`MarkerSink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerHandle(u64);

impl MarkerHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Palette used by the tools. The renderer maps these to terminal colours.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerColor {
    Yellow,
    Lime,
    Green,
    Red,
    DeepSkyBlue,
    OrangeRed,
    Purple,
    White,
}

/// Where a label sits relative to its anchor position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LabelAnchor {
    #[default]
    Above,
    Below,
    Right,
    Center,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Visual {
    Point {
        position: DVec3,
        color: MarkerColor,
        size: u8,
        /// Text drawn next to the point; `None` for a bare marker.
        label: Option<String>,
    },
    Polyline {
        positions: Vec<DVec3>,
        color: MarkerColor,
        width: u8,
    },
    Polygon {
        positions: Vec<DVec3>,
        color: MarkerColor,
        alpha: f32,
    },
    Label {
        position: DVec3,
        text: String,
        color: MarkerColor,
        anchor: LabelAnchor,
    },
}

impl Visual {
    pub fn point(position: DVec3, color: MarkerColor, size: u8) -> Self {
        Visual::Point { position, color, size, label: None }
    }

    pub fn labeled_point(position: DVec3, color: MarkerColor, size: u8, text: impl Into<String>) -> Self {
        Visual::Point { position, color, size, label: Some(text.into()) }
    }

    pub fn polyline(positions: Vec<DVec3>, color: MarkerColor, width: u8) -> Self {
        Visual::Polyline { positions, color, width }
    }

    pub fn label(position: DVec3, text: impl Into<String>, color: MarkerColor, anchor: LabelAnchor) -> Self {
        Visual::Label { position, text: text.into(), color, anchor }
    }

    /// Text carried by the visual, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Visual::Point { label, .. } => label.as_deref(),
            Visual::Label { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Destination for tool visuals.
///
/// Removing a handle that is already gone must return `false` and do nothing.
pub trait MarkerSink {
    fn add(&mut self, visual: Visual) -> MarkerHandle;

    /// Replace the geometry/style of a live visual. `false` if the handle is gone.
    fn update(&mut self, handle: MarkerHandle, visual: Visual) -> bool;

    fn remove(&mut self, handle: MarkerHandle) -> bool;

    /// Number of live visuals.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory marker store; iteration follows creation order.
#[derive(Default)]
pub struct MarkerStore {
    visuals: BTreeMap<MarkerHandle, Visual>,
    next_id: u64,
}

impl MarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handle: MarkerHandle) -> Option<&Visual> {
        self.visuals.get(&handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MarkerHandle, &Visual)> + '_ {
        self.visuals.iter().map(|(h, v)| (*h, v))
    }

    /// All texts currently on screen, in creation order.
    pub fn texts(&self) -> Vec<&str> {
        self.visuals.values().filter_map(Visual::text).collect()
    }
}

impl MarkerSink for MarkerStore {
    fn add(&mut self, visual: Visual) -> MarkerHandle {
        self.next_id += 1;
        let handle = MarkerHandle(self.next_id);
        self.visuals.insert(handle, visual);
        handle
    }

    fn update(&mut self, handle: MarkerHandle, visual: Visual) -> bool {
        match self.visuals.get_mut(&handle) {
            Some(slot) => {
                *slot = visual;
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, handle: MarkerHandle) -> bool {
        self.visuals.remove(&handle).is_some()
    }

    fn len(&self) -> usize {
        self.visuals.len()
    }
}
