//! SAR image records and the in-memory catalog searched by the viewer.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use tracing::debug;

use crate::error::CatalogError;
use crate::geodesy::GeoExtent;

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Supplier {
    Capella,
    Sentinel,
    Planetscope,
    Landsat,
    Iceye,
    Other,
}

impl Supplier {
    pub fn name(self) -> &'static str {
        match self {
            Supplier::Capella => "Capella",
            Supplier::Sentinel => "Sentinel",
            Supplier::Planetscope => "PlanetScope",
            Supplier::Landsat => "Landsat",
            Supplier::Iceye => "ICEYE",
            Supplier::Other => "Other",
        }
    }
}

fn default_supplier() -> Supplier {
    Supplier::Capella
}

/// One acquisition as returned by a search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    #[serde(default)]
    pub id: u32,
    pub image_id: String,
    pub timestamp: DateTime<Utc>,
    /// `[west, south, east, north]` in degrees
    pub bbox: [f64; 4],
    pub url: String,
    #[serde(default)]
    pub metadata: Map<String, serde_json::Value>,
    #[serde(default = "default_supplier")]
    pub supplier: Supplier,
}

/// Search parameters. Dates are inclusive.
#[derive(Clone, Debug, PartialEq)]
pub struct SarQuery {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub bbox: Option<[f64; 4]>,
    pub limit: usize,
    pub suppliers: Vec<Supplier>,
}

impl SarQuery {
    /// Query over whole days, `start` at 00:00:00 through `end` at 23:59:59 UTC.
    pub fn between_days(start: NaiveDate, end: NaiveDate) -> Self {
        let start_date = Utc.from_utc_datetime(&start.and_hms_opt(0, 0, 0).unwrap_or_default());
        let end_date = Utc.from_utc_datetime(&end.and_hms_opt(23, 59, 59).unwrap_or_default());
        Self {
            start_date,
            end_date,
            bbox: None,
            limit: DEFAULT_LIMIT,
            suppliers: vec![Supplier::Capella],
        }
    }

    pub fn with_bbox(mut self, bbox: [f64; 4]) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_suppliers(mut self, suppliers: Vec<Supplier>) -> Self {
        self.suppliers = suppliers;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.start_date > self.end_date {
            return Err(CatalogError::InvalidQuery("start date is after end date".into()));
        }
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(CatalogError::InvalidQuery(format!(
                "limit {} outside 1..={MAX_LIMIT}",
                self.limit
            )));
        }
        if self.suppliers.is_empty() {
            return Err(CatalogError::InvalidQuery("no suppliers selected".into()));
        }
        if let Some(bbox) = self.bbox {
            GeoExtent::from_bbox(bbox).map_err(|e| CatalogError::InvalidQuery(e.to_string()))?;
        }
        Ok(())
    }
}

/// Records in insertion order with sequential ids.
pub struct Catalog {
    records: Vec<ImageRecord>,
    next_id: u32,
}

impl Default for Catalog {
    fn default() -> Self {
        Self { records: Vec::new(), next_id: 1 }
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-filled with the demo acquisitions.
    pub fn seeded() -> Self {
        let mut catalog = Self::new();
        for (image_id, timestamp, bbox, satellite) in [
            ("SAR_001", (2024, 3, 10, 10, 30), [10.5, 45.5, 12.5, 47.5], "Capella-1"),
            ("SAR_002", (2024, 3, 11, 14, 20), [-74.006, 40.7128, -73.95, 40.7528], "Capella-2"),
            ("SAR_003", (2024, 3, 11, 8, 15), [-118.2437, 34.0522, -118.2037, 34.0922], "Capella-1"),
        ] {
            let (y, mo, d, h, mi) = timestamp;
            let mut metadata = Map::new();
            metadata.insert("satellite".into(), satellite.into());
            metadata.insert("resolution".into(), "0.5m".into());
            metadata.insert("polarization".into(), "HH".into());
            catalog.insert(ImageRecord {
                id: 0,
                image_id: image_id.into(),
                timestamp: Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).single().unwrap_or_default(),
                bbox,
                url: format!("https://example.com/{}.tif", image_id.to_lowercase()),
                metadata,
                supplier: Supplier::Capella,
            });
        }
        catalog
    }

    /// Decode a JSON array of records. Ids are reassigned in file order.
    pub fn from_json_slice(bytes: &mut [u8]) -> Result<Self, CatalogError> {
        let records: Vec<ImageRecord> = simd_json::serde::from_slice(bytes)?;
        let mut catalog = Self::new();
        for record in records {
            catalog.insert(record);
        }
        Ok(catalog)
    }

    /// Store a record under the next id and return that id.
    pub fn insert(&mut self, mut record: ImageRecord) -> u32 {
        record.id = self.next_id;
        self.next_id += 1;
        self.records.push(record);
        self.next_id - 1
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn search(&self, query: &SarQuery) -> Result<Vec<ImageRecord>, CatalogError> {
        query.validate()?;
        let area = query.bbox.map(GeoExtent::from_bbox).transpose().map_err(|e| {
            CatalogError::InvalidQuery(e.to_string())
        })?;

        let results: Vec<ImageRecord> = self
            .records
            .iter()
            .filter(|r| r.timestamp >= query.start_date && r.timestamp <= query.end_date)
            .filter(|r| query.suppliers.contains(&r.supplier))
            .filter(|r| match (&area, GeoExtent::from_bbox(r.bbox)) {
                (None, _) => true,
                (Some(area), Ok(footprint)) => area.intersects(&footprint),
                (Some(_), Err(_)) => false,
            })
            .take(query.limit)
            .cloned()
            .collect();

        debug!(matches = results.len(), "catalog search");
        Ok(results)
    }
}

/// Search footprints as a GeoJSON FeatureCollection of polygons.
pub fn footprints_geojson(records: &[ImageRecord]) -> GeoJson {
    let features = records
        .iter()
        .filter_map(|record| {
            let extent = GeoExtent::from_bbox(record.bbox).ok()?;
            let ring = extent.ring().iter().map(|&(lon, lat)| vec![lon, lat]).collect();
            let mut properties = JsonObject::new();
            properties.insert("imageId".into(), record.image_id.clone().into());
            properties.insert("timestamp".into(), record.timestamp.to_rfc3339().into());
            properties.insert("supplier".into(), record.supplier.name().into());
            Some(Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Polygon(vec![ring]))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            })
        })
        .collect();

    GeoJson::FeatureCollection(FeatureCollection { bbox: None, features, foreign_members: None })
}
