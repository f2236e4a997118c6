mod geometry;
mod globe;
mod renderer;

pub use globe::{walk_great_circle, GlobeViewport};
pub use renderer::{world_to_screen, BaseStyle, DisplaySettings, LineString, MapLabel, MapLayers, SceneRenderer};
