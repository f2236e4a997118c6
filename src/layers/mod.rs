//! Bookkeeping between image records, the overlays showing them, and search footprints.

mod stack;

pub use stack::{LayerContent, OverlayStack, StackLayer};

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::catalog::ImageRecord;
use crate::error::LayerError;
use crate::geodesy::GeoExtent;

/// Opacity given to freshly added image overlays.
pub const OVERLAY_ALPHA: f32 = 0.7;

/// Opaque reference to an imagery layer created by an [`ImageryAdapter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerHandle(pub u64);

/// Opaque reference to a footprint outline created by an [`ImageryAdapter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FootprintHandle(pub u64);

/// Bottom-most map layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseLayerKind {
    #[default]
    Osm,
    Bing,
    Esri,
    NaturalEarth,
}

impl BaseLayerKind {
    pub const ALL: [BaseLayerKind; 4] = [
        BaseLayerKind::Osm,
        BaseLayerKind::Bing,
        BaseLayerKind::Esri,
        BaseLayerKind::NaturalEarth,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BaseLayerKind::Osm => "OpenStreetMap",
            BaseLayerKind::Bing => "Bing Satellite",
            BaseLayerKind::Esri => "Esri World Imagery",
            BaseLayerKind::NaturalEarth => "Natural Earth II",
        }
    }

    pub fn url(self) -> &'static str {
        match self {
            BaseLayerKind::Osm => "https://tile.openstreetmap.org/",
            BaseLayerKind::Bing => "https://dev.virtualearth.net",
            BaseLayerKind::Esri => {
                "https://services.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer"
            }
            BaseLayerKind::NaturalEarth => "Assets/Textures/NaturalEarthII",
        }
    }

    /// Next kind in [`BaseLayerKind::ALL`], wrapping around.
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|k| *k == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

/// Where an overlay's pixels come from.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageSource {
    pub url: String,
    pub alpha: f32,
}

/// Imagery layer stack and footprint outlines offered by the scene.
pub trait ImageryAdapter {
    /// Create an image overlay and attach it on top of the stack.
    fn create_overlay(&mut self, extent: &GeoExtent, source: &ImageSource) -> Result<LayerHandle>;

    /// Create a base layer and attach it at the bottom of the stack.
    fn create_base_layer(&mut self, kind: BaseLayerKind) -> Result<LayerHandle>;

    /// Detach (if attached) and dispose of a layer. `false` if unknown.
    fn destroy_layer(&mut self, handle: LayerHandle) -> bool;

    fn set_layer_visible(&mut self, handle: LayerHandle, visible: bool) -> bool;

    /// Attached layers, bottom to top.
    fn layer_order(&self) -> Vec<LayerHandle>;

    /// Detach every layer without disposing of it.
    fn detach_all(&mut self);

    /// Re-attach a detached layer on top of the stack.
    fn attach(&mut self, handle: LayerHandle) -> bool;

    fn add_footprint(&mut self, extent: &GeoExtent) -> Result<FootprintHandle>;

    fn remove_footprint(&mut self, handle: FootprintHandle) -> bool;
}

/// One image shown as a map layer.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageOverlay {
    pub image_id: String,
    pub handle: LayerHandle,
    pub extent: GeoExtent,
    pub visible: bool,
}

/// Sole owner of the `image_id -> overlay` mapping and of the footprint set.
pub struct LayerLifecycleCoordinator<A: ImageryAdapter> {
    adapter: A,
    overlays: HashMap<String, ImageOverlay>,
    /// Insertion order of `overlays` keys
    order: Vec<String>,
    footprints: Vec<FootprintHandle>,
    base: Option<(BaseLayerKind, LayerHandle)>,
}

impl<A: ImageryAdapter> LayerLifecycleCoordinator<A> {
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            overlays: HashMap::new(),
            order: Vec::new(),
            footprints: Vec::new(),
            base: None,
        }
    }

    pub fn with_base_layer(adapter: A, kind: BaseLayerKind) -> Self {
        let mut coordinator = Self::new(adapter);
        coordinator.set_base_layer(kind);
        coordinator
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Return the overlay for `image`, creating it on first use.
    pub fn add_or_get_overlay(&mut self, image: &ImageRecord) -> Result<&ImageOverlay, LayerError> {
        match self.overlays.entry(image.image_id.clone()) {
            Entry::Occupied(entry) => {
                debug!(image_id = %image.image_id, "overlay already present");
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                let extent = GeoExtent::from_bbox(image.bbox).map_err(|source| {
                    let err = LayerError::InvalidExtent { image_id: image.image_id.clone(), source };
                    warn!("{err}");
                    err
                })?;

                let source = ImageSource { url: image.url.clone(), alpha: OVERLAY_ALPHA };
                let handle = self.adapter.create_overlay(&extent, &source).map_err(|source| {
                    let err = LayerError::Adapter { image_id: image.image_id.clone(), source };
                    warn!("{err}");
                    err
                })?;

                info!(image_id = %image.image_id, "added image as new layer");
                self.order.push(image.image_id.clone());
                Ok(entry.insert(ImageOverlay {
                    image_id: image.image_id.clone(),
                    handle,
                    extent,
                    visible: true,
                }))
            }
        }
    }

    /// Remove an overlay. Unknown ids are ignored; returns whether anything was removed.
    pub fn remove_overlay(&mut self, image_id: &str) -> bool {
        let Some(overlay) = self.overlays.remove(image_id) else {
            return false;
        };
        self.order.retain(|id| id != image_id);
        if !self.adapter.destroy_layer(overlay.handle) {
            warn!(image_id, "imagery adapter had already lost the overlay");
        }
        info!(image_id, "removed layer");
        true
    }

    /// Flip visibility and return the new state, `None` for unknown ids.
    ///
    /// The flag only changes when the adapter still holds the layer.
    pub fn toggle_visibility(&mut self, image_id: &str) -> Option<bool> {
        let overlay = self.overlays.get_mut(image_id)?;
        if !self.adapter.set_layer_visible(overlay.handle, !overlay.visible) {
            warn!(image_id, "imagery adapter had already lost the overlay");
            return Some(overlay.visible);
        }
        overlay.visible = !overlay.visible;
        debug!(image_id, visible = overlay.visible, "toggled visibility");
        Some(overlay.visible)
    }

    pub fn clear_overlays(&mut self) {
        for image_id in std::mem::take(&mut self.order) {
            if let Some(overlay) = self.overlays.remove(&image_id) {
                self.adapter.destroy_layer(overlay.handle);
            }
        }
    }

    /// Drop every footprint and outline the given records instead. Returns how many were drawn.
    pub fn replace_footprints(&mut self, images: &[ImageRecord]) -> usize {
        for handle in self.footprints.drain(..) {
            self.adapter.remove_footprint(handle);
        }

        for image in images {
            let extent = match GeoExtent::from_bbox(image.bbox) {
                Ok(extent) => extent,
                Err(err) => {
                    warn!(image_id = %image.image_id, "skipping footprint: {err}");
                    continue;
                }
            };
            match self.adapter.add_footprint(&extent) {
                Ok(handle) => self.footprints.push(handle),
                Err(err) => warn!(image_id = %image.image_id, "footprint rejected: {err:#}"),
            }
        }

        self.footprints.len()
    }

    /// Swap the bottom-most layer, keeping every other layer in its current order.
    pub fn set_base_layer(&mut self, kind: BaseLayerKind) {
        let old_base = self.base.take().map(|(_, handle)| handle);
        let snapshot: Vec<LayerHandle> = self
            .adapter
            .layer_order()
            .into_iter()
            .filter(|h| Some(*h) != old_base)
            .collect();

        self.adapter.detach_all();
        if let Some(handle) = old_base {
            self.adapter.destroy_layer(handle);
        }

        match self.adapter.create_base_layer(kind) {
            Ok(handle) => self.base = Some((kind, handle)),
            Err(err) => warn!(base = kind.name(), "base layer unavailable: {err:#}"),
        }

        for handle in snapshot {
            self.adapter.attach(handle);
        }
        info!(base = kind.name(), "base layer set");
    }

    pub fn base_layer(&self) -> Option<BaseLayerKind> {
        self.base.map(|(kind, _)| kind)
    }

    pub fn overlay(&self, image_id: &str) -> Option<&ImageOverlay> {
        self.overlays.get(image_id)
    }

    /// Overlays in the order they were added.
    pub fn overlays(&self) -> impl Iterator<Item = &ImageOverlay> + '_ {
        self.order.iter().filter_map(|id| self.overlays.get(id))
    }

    pub fn is_visible(&self, image_id: &str) -> bool {
        self.overlays.get(image_id).is_some_and(|o| o.visible)
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    pub fn footprint_count(&self) -> usize {
        self.footprints.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use chrono::{TimeZone, Utc};

    use crate::catalog::Supplier;

    /// Counts adapter calls and refuses sources listed in `reject_urls`.
    #[derive(Default)]
    struct CountingAdapter {
        inner: OverlayStack,
        creates: usize,
        reject_urls: Vec<String>,
    }

    impl ImageryAdapter for CountingAdapter {
        fn create_overlay(&mut self, extent: &GeoExtent, source: &ImageSource) -> Result<LayerHandle> {
            self.creates += 1;
            if self.reject_urls.contains(&source.url) {
                bail!("unreachable source {}", source.url);
            }
            self.inner.create_overlay(extent, source)
        }
        fn create_base_layer(&mut self, kind: BaseLayerKind) -> Result<LayerHandle> {
            self.inner.create_base_layer(kind)
        }
        fn destroy_layer(&mut self, handle: LayerHandle) -> bool {
            self.inner.destroy_layer(handle)
        }
        fn set_layer_visible(&mut self, handle: LayerHandle, visible: bool) -> bool {
            self.inner.set_layer_visible(handle, visible)
        }
        fn layer_order(&self) -> Vec<LayerHandle> {
            self.inner.layer_order()
        }
        fn detach_all(&mut self) {
            self.inner.detach_all()
        }
        fn attach(&mut self, handle: LayerHandle) -> bool {
            self.inner.attach(handle)
        }
        fn add_footprint(&mut self, extent: &GeoExtent) -> Result<FootprintHandle> {
            self.inner.add_footprint(extent)
        }
        fn remove_footprint(&mut self, handle: FootprintHandle) -> bool {
            self.inner.remove_footprint(handle)
        }
    }

    fn record(id: u32, image_id: &str, bbox: [f64; 4]) -> ImageRecord {
        ImageRecord {
            id,
            image_id: image_id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 10, 10, 30, 0).unwrap(),
            bbox,
            url: format!("https://example.com/{image_id}.tif"),
            metadata: Default::default(),
            supplier: Supplier::Capella,
        }
    }

    fn coordinator() -> LayerLifecycleCoordinator<CountingAdapter> {
        LayerLifecycleCoordinator::with_base_layer(CountingAdapter::default(), BaseLayerKind::Osm)
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut layers = coordinator();
        let image = record(1, "SAR_001", [10.5, 45.5, 12.5, 47.5]);
        let first = layers.add_or_get_overlay(&image).unwrap().handle;
        let second = layers.add_or_get_overlay(&image).unwrap().handle;
        assert_eq!(first, second);
        assert_eq!(layers.adapter().creates, 1);
        assert_eq!(layers.overlay_count(), 1);
        assert!(layers.is_visible("SAR_001"));
    }

    #[test]
    fn test_toggle_unknown_is_noop() {
        let mut layers = coordinator();
        layers.add_or_get_overlay(&record(1, "SAR_001", [10.5, 45.5, 12.5, 47.5])).unwrap();
        assert_eq!(layers.toggle_visibility("missing"), None);
        assert!(layers.is_visible("SAR_001"));
        assert_eq!(layers.overlay_count(), 1);
    }

    #[test]
    fn test_toggle_applies_to_adapter() {
        let mut layers = coordinator();
        let handle = layers.add_or_get_overlay(&record(1, "SAR_001", [10.5, 45.5, 12.5, 47.5])).unwrap().handle;
        assert_eq!(layers.toggle_visibility("SAR_001"), Some(false));
        assert_eq!(layers.adapter().inner.layer(handle).map(|l| l.visible), Some(false));
        assert_eq!(layers.toggle_visibility("SAR_001"), Some(true));
        assert_eq!(layers.adapter().inner.layer(handle).map(|l| l.visible), Some(true));
    }

    #[test]
    fn test_toggle_lost_layer_keeps_flag() {
        let mut layers = coordinator();
        let handle = layers.add_or_get_overlay(&record(1, "SAR_001", [10.5, 45.5, 12.5, 47.5])).unwrap().handle;
        assert!(layers.adapter.destroy_layer(handle));
        assert_eq!(layers.toggle_visibility("SAR_001"), Some(true));
        assert!(layers.is_visible("SAR_001"));
    }

    #[test]
    fn test_remove_keeps_mapping_and_stack_consistent() {
        let mut layers = coordinator();
        let h = layers.add_or_get_overlay(&record(1, "SAR_001", [10.5, 45.5, 12.5, 47.5])).unwrap().handle;
        layers.add_or_get_overlay(&record(2, "SAR_002", [-74.0, 40.7, -73.9, 40.8])).unwrap();
        assert!(layers.remove_overlay("SAR_001"));
        assert!(!layers.remove_overlay("SAR_001"));
        assert!(layers.adapter().inner.layer(h).is_none());
        assert!(!layers.adapter().layer_order().contains(&h));
        let ids: Vec<_> = layers.overlays().map(|o| o.image_id.as_str()).collect();
        assert_eq!(ids, vec!["SAR_002"]);
    }

    #[test]
    fn test_failed_creation_leaves_mapping_untouched() {
        let mut adapter = CountingAdapter::default();
        adapter.reject_urls.push("https://example.com/SAR_BAD.tif".to_string());
        let mut layers = LayerLifecycleCoordinator::with_base_layer(adapter, BaseLayerKind::Osm);
        layers.add_or_get_overlay(&record(1, "SAR_001", [10.5, 45.5, 12.5, 47.5])).unwrap();

        let err = layers.add_or_get_overlay(&record(2, "SAR_BAD", [0.0, 0.0, 1.0, 1.0]));
        assert!(matches!(err, Err(LayerError::Adapter { .. })));
        let err = layers.add_or_get_overlay(&record(3, "SAR_FLIPPED", [12.5, 45.5, 10.5, 47.5]));
        assert!(matches!(err, Err(LayerError::InvalidExtent { .. })));

        assert_eq!(layers.overlay_count(), 1);
        assert!(layers.overlay("SAR_BAD").is_none());
        assert!(layers.overlay("SAR_FLIPPED").is_none());
        // base + one overlay
        assert_eq!(layers.adapter().layer_order().len(), 2);
    }

    #[test]
    fn test_base_swap_preserves_overlay_order() {
        let mut layers = coordinator();
        let a = layers.add_or_get_overlay(&record(1, "A", [0.0, 0.0, 1.0, 1.0])).unwrap().handle;
        let b = layers.add_or_get_overlay(&record(2, "B", [1.0, 1.0, 2.0, 2.0])).unwrap().handle;
        let c = layers.add_or_get_overlay(&record(3, "C", [2.0, 2.0, 3.0, 3.0])).unwrap().handle;
        layers.toggle_visibility("B");

        let before = layers.adapter().layer_order();
        assert_eq!(&before[1..], &[a, b, c]);

        layers.set_base_layer(BaseLayerKind::Bing);
        let after = layers.adapter().layer_order();
        assert_eq!(after.len(), 4);
        assert_ne!(after[0], before[0]);
        assert_eq!(&after[1..], &[a, b, c]);
        assert_eq!(layers.base_layer(), Some(BaseLayerKind::Bing));
        assert!(!layers.is_visible("B"));
        assert!(matches!(
            layers.adapter().inner.layer(after[0]).map(|l| &l.content),
            Some(LayerContent::Base(BaseLayerKind::Bing))
        ));
        // the old base layer is disposed of
        assert!(layers.adapter().inner.layer(before[0]).is_none());
    }

    #[test]
    fn test_replace_footprints_never_merges() {
        let mut layers = coordinator();
        let first = [record(1, "A", [0.0, 0.0, 1.0, 1.0]), record(2, "B", [1.0, 1.0, 2.0, 2.0])];
        assert_eq!(layers.replace_footprints(&first), 2);
        let second = [record(3, "C", [2.0, 2.0, 3.0, 3.0]), record(4, "BAD", [5.0, 5.0, 4.0, 4.0])];
        assert_eq!(layers.replace_footprints(&second), 1);
        assert_eq!(layers.adapter().inner.footprints().count(), 1);
        assert_eq!(layers.replace_footprints(&[]), 0);
        assert_eq!(layers.adapter().inner.footprints().count(), 0);
        // footprints never touch the layer stack
        assert_eq!(layers.adapter().layer_order().len(), 1);
    }

    #[test]
    fn test_base_layer_cycle() {
        assert_eq!(BaseLayerKind::NaturalEarth.next(), BaseLayerKind::Osm);
        assert_eq!(BaseLayerKind::Osm.next(), BaseLayerKind::Bing);
    }
}
