use std::collections::{BTreeMap, HashMap};

use anyhow::{bail, Result};

use super::{BaseLayerKind, FootprintHandle, ImageSource, ImageryAdapter, LayerHandle};
use crate::geodesy::GeoExtent;

#[derive(Clone, Debug, PartialEq)]
pub enum LayerContent {
    Base(BaseLayerKind),
    Image { extent: GeoExtent, source: ImageSource },
}

#[derive(Clone, Debug, PartialEq)]
pub struct StackLayer {
    pub content: LayerContent,
    pub visible: bool,
}

/// In-process imagery layer stack, drawn by the globe renderer.
///
/// Layers live in `layers` for as long as they exist; `attached` holds the
/// subset currently composited, bottom to top.
#[derive(Default)]
pub struct OverlayStack {
    layers: HashMap<LayerHandle, StackLayer>,
    attached: Vec<LayerHandle>,
    footprints: BTreeMap<FootprintHandle, GeoExtent>,
    next_id: u64,
}

impl OverlayStack {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn layer(&self, handle: LayerHandle) -> Option<&StackLayer> {
        self.layers.get(&handle)
    }

    /// Attached layers, bottom to top.
    pub fn attached_layers(&self) -> impl Iterator<Item = (LayerHandle, &StackLayer)> + '_ {
        self.attached
            .iter()
            .filter_map(|h| self.layers.get(h).map(|layer| (*h, layer)))
    }

    pub fn footprints(&self) -> impl Iterator<Item = &GeoExtent> + '_ {
        self.footprints.values()
    }
}

impl ImageryAdapter for OverlayStack {
    fn create_overlay(&mut self, extent: &GeoExtent, source: &ImageSource) -> Result<LayerHandle> {
        if source.url.trim().is_empty() {
            bail!("overlay source has no url");
        }
        if extent.west == extent.east || extent.south == extent.north {
            bail!("overlay extent has zero area");
        }

        let handle = LayerHandle(self.next_id());
        self.layers.insert(
            handle,
            StackLayer {
                content: LayerContent::Image { extent: *extent, source: source.clone() },
                visible: true,
            },
        );
        self.attached.push(handle);
        Ok(handle)
    }

    fn create_base_layer(&mut self, kind: BaseLayerKind) -> Result<LayerHandle> {
        let handle = LayerHandle(self.next_id());
        self.layers.insert(handle, StackLayer { content: LayerContent::Base(kind), visible: true });
        self.attached.insert(0, handle);
        Ok(handle)
    }

    fn destroy_layer(&mut self, handle: LayerHandle) -> bool {
        self.attached.retain(|h| *h != handle);
        self.layers.remove(&handle).is_some()
    }

    fn set_layer_visible(&mut self, handle: LayerHandle, visible: bool) -> bool {
        match self.layers.get_mut(&handle) {
            Some(layer) => {
                layer.visible = visible;
                true
            }
            None => false,
        }
    }

    fn layer_order(&self) -> Vec<LayerHandle> {
        self.attached.clone()
    }

    fn detach_all(&mut self) {
        self.attached.clear();
    }

    fn attach(&mut self, handle: LayerHandle) -> bool {
        if !self.layers.contains_key(&handle) || self.attached.contains(&handle) {
            return false;
        }
        self.attached.push(handle);
        true
    }

    fn add_footprint(&mut self, extent: &GeoExtent) -> Result<FootprintHandle> {
        let handle = FootprintHandle(self.next_id());
        self.footprints.insert(handle, *extent);
        Ok(handle)
    }

    fn remove_footprint(&mut self, handle: FootprintHandle) -> bool {
        self.footprints.remove(&handle).is_some()
    }
}
