//! Tile source descriptors.
//!
//! Field names and order follow the martin configuration file format so the
//! descriptors serialize directly into the final document.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fmt;

/// A WGS84 bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Bounds {
    /// Whole-world bounds, used when the real extent is unknown.
    pub const WORLD: Bounds = Bounds {
        xmin: -180.0,
        ymin: -90.0,
        xmax: 180.0,
        ymax: 90.0,
    };

    /// Build bounds from two corners, ordering each axis.
    /// Returns `None` when any coordinate is not finite.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Option<Self> {
        if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            return None;
        }
        Some(Self {
            xmin: x1.min(x2),
            ymin: y1.min(y2),
            xmax: x1.max(x2),
            ymax: y1.max(y2),
        })
    }
}

impl Serialize for Bounds {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(4))?;
        seq.serialize_element(&self.xmin)?;
        seq.serialize_element(&self.ymin)?;
        seq.serialize_element(&self.xmax)?;
        seq.serialize_element(&self.ymax)?;
        seq.end()
    }
}

/// Spatial extent of a table source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extent {
    Known(Bounds),
    /// The extent query returned nothing usable. Rendered as [`Bounds::WORLD`].
    Unknown,
}

impl Extent {
    pub fn bounds(&self) -> Bounds {
        match self {
            Extent::Known(b) => *b,
            Extent::Unknown => Bounds::WORLD,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Extent::Known(_))
    }
}

impl Serialize for Extent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.bounds().serialize(serializer)
    }
}

/// Published feature properties: column name to type name, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMap(Vec<(String, String)>);

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, type_name: impl Into<String>) {
        self.0.push((column.into(), type_name.into()));
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.iter().any(|(c, _)| c == column)
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, t)| t.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for PropertyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, type_name) in &self.0 {
            map.serialize_entry(column, type_name)?;
        }
        map.end()
    }
}

/// Resolved geometry of a table source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeometryMetadata {
    #[serde(rename = "geometry_column")]
    pub column: String,
    pub srid: i32,
    pub geometry_type: String,
    #[serde(rename = "bounds")]
    pub extent: Extent,
    pub properties: PropertyMap,
}

/// Vector tile rendering parameters of a table source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileSettings {
    pub id_column: Option<String>,
    pub extent: u32,
    pub buffer: u32,
    pub clip_geometry: bool,
}

impl Default for TileSettings {
    fn default() -> Self {
        Self {
            id_column: None,
            extent: 4096,
            buffer: 64,
            clip_geometry: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSource {
    pub id: String,
    pub schema: String,
    pub table: String,
    #[serde(flatten)]
    pub tile: TileSettings,
    #[serde(flatten)]
    pub geometry: GeometryMetadata,
}

impl TableSource {
    pub fn new(schema: impl Into<String>, table: impl Into<String>, geometry: GeometryMetadata) -> Self {
        let schema = schema.into();
        let table = table.into();
        Self {
            id: format!("{}.{}", schema, table),
            schema,
            table,
            tile: TileSettings::default(),
            geometry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionSource {
    pub id: String,
    pub schema: String,
    pub function: String,
    pub minzoom: u8,
    pub maxzoom: u8,
    pub bounds: Bounds,
    /// Input parameter names; martin infers these itself.
    #[serde(skip)]
    pub parameters: Vec<String>,
}

impl FunctionSource {
    pub fn new(schema: impl Into<String>, function: impl Into<String>, parameters: Vec<String>) -> Self {
        let schema = schema.into();
        let function = function.into();
        Self {
            id: format!("{}.{}", schema, function),
            schema,
            function,
            minzoom: 0,
            maxzoom: 22,
            bounds: Bounds::WORLD,
            parameters,
        }
    }
}

/// Kind of source. Tables order before functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceKind {
    Table,
    Function,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Table => write!(f, "table"),
            SourceKind::Function => write!(f, "function"),
        }
    }
}

/// Identity of a source within a configuration: schema, then kind, then name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId {
    pub schema: String,
    pub kind: SourceKind,
    pub name: String,
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}", self.kind, self.schema, self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceDescriptor {
    Table(TableSource),
    Function(FunctionSource),
}

impl SourceDescriptor {
    pub fn id(&self) -> SourceId {
        match self {
            SourceDescriptor::Table(t) => SourceId {
                schema: t.schema.clone(),
                kind: SourceKind::Table,
                name: t.table.clone(),
            },
            SourceDescriptor::Function(f) => SourceId {
                schema: f.schema.clone(),
                kind: SourceKind::Function,
                name: f.function.clone(),
            },
        }
    }

    /// Key under which the source is rendered in its source map.
    pub fn key(&self) -> &str {
        match self {
            SourceDescriptor::Table(t) => &t.id,
            SourceDescriptor::Function(f) => &f.id,
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            SourceDescriptor::Table(_) => SourceKind::Table,
            SourceDescriptor::Function(_) => SourceKind::Function,
        }
    }
}
