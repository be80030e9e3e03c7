//! Data models for wizard flows, form records and submitted reports.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use strum::AsRefStr;

// =============================================================================
// Field Values
// =============================================================================

/// A single row in a row-list field (risk assessment, attendance).
pub type Row = BTreeMap<String, String>;

/// Geographic position returned by the locator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Latitude within [-90, 90] and longitude within [-180, 180]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Value stored under one field of a `FormRecord`.
///
/// Variant order matters for untagged deserialization: an empty JSON array
/// reads back as an empty `List`, which every accessor treats the same as
/// an empty `Rows`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
    Rows(Vec<Row>),
    Location(GeoPoint),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Absent-equivalent values: null, blank text, zero-length lists.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Rows(rows) => rows.is_empty(),
            Self::Bool(_) | Self::Number(_) | Self::Location(_) => false,
        }
    }

    /// Kind of the stored value, `None` for null.
    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(FieldKind::Bool),
            Self::Number(_) => Some(FieldKind::Number),
            Self::Text(_) => Some(FieldKind::Text),
            Self::List(_) => Some(FieldKind::List),
            Self::Rows(_) => Some(FieldKind::Rows),
            Self::Location(_) => Some(FieldKind::Location),
        }
    }

    /// Whether this value is acceptable for a field declared as `kind`.
    pub fn matches_kind(&self, kind: FieldKind) -> bool {
        match (self, kind) {
            (Self::Null, _) => true,
            // An empty list is indistinguishable from an empty row list once persisted
            (Self::List(items), FieldKind::Rows) => items.is_empty(),
            _ => self.kind() == Some(kind),
        }
    }

    /// Parse a raw command-line string into a value of the given kind.
    pub fn parse(kind: FieldKind, raw: &str) -> Result<Self, String> {
        match kind {
            FieldKind::Text => Ok(Self::Text(raw.to_string())),
            FieldKind::Number => raw
                .trim()
                .parse::<f64>()
                .map(Self::Number)
                .map_err(|_| format!("Expected a number, got '{raw}'")),
            FieldKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Ok(Self::Bool(true)),
                "false" | "no" | "n" | "0" => Ok(Self::Bool(false)),
                _ => Err(format!("Expected yes/no or true/false, got '{raw}'")),
            },
            FieldKind::List => Ok(Self::List(
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            FieldKind::Location => {
                let (lat, lon) = raw
                    .split_once(',')
                    .ok_or_else(|| format!("Expected 'latitude,longitude', got '{raw}'"))?;
                let point = GeoPoint::new(
                    lat.trim()
                        .parse()
                        .map_err(|_| format!("Invalid latitude: {lat}"))?,
                    lon.trim()
                        .parse()
                        .map_err(|_| format!("Invalid longitude: {lon}"))?,
                );
                if !point.is_valid() {
                    return Err(format!("Coordinates out of range: {raw}"));
                }
                Ok(Self::Location(point))
            }
            FieldKind::Rows => serde_json::from_str::<Vec<Row>>(raw)
                .map(Self::Rows)
                .map_err(|e| format!("Expected a JSON array of objects: {e}")),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", if *b { "yes" } else { "no" }),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::List(items) => write!(f, "{}", items.join(", ")),
            Self::Rows(rows) => write!(f, "{} row(s)", rows.len()),
            Self::Location(p) => write!(f, "{:.6}, {:.6}", p.latitude, p.longitude),
        }
    }
}

/// Declared kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
    Bool,
    List,
    Rows,
    Location,
}

// =============================================================================
// Form Record
// =============================================================================

/// Flat key-value state accumulated across the steps of a flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormRecord(BTreeMap<String, FieldValue>);

impl FormRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    /// Overwrite-or-insert.
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.0.insert(name.into(), value);
    }

    /// Present and not empty.
    pub fn is_filled(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.is_empty())
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(FieldValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.get(name) {
            Some(FieldValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// List items, empty when absent or not a list.
    pub fn list(&self, name: &str) -> &[String] {
        match self.get(name) {
            Some(FieldValue::List(items)) => items,
            _ => &[],
        }
    }

    /// Rows, empty when absent or not a row list.
    pub fn rows(&self, name: &str) -> &[Row] {
        match self.get(name) {
            Some(FieldValue::Rows(rows)) => rows,
            _ => &[],
        }
    }

    pub fn contains_item(&self, name: &str, item: &str) -> bool {
        self.list(name).iter().any(|i| i == item)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

// =============================================================================
// Flows, Roles, Step Status
// =============================================================================

/// The two wizard flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FlowKind {
    /// Incident report
    Incident,
    /// Permit to work
    Permit,
}

impl FlowKind {
    /// Prefix of generated report ids
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Incident => "INC",
            Self::Permit => "PTW",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Incident => "Incident Report",
            Self::Permit => "Permit to Work",
        }
    }
}

/// Role of the acting user, supplied by the identity collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, AsRefStr, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Role {
    /// Field worker reporting incidents
    #[default]
    Worker,
    /// Contractor receiving the permit
    Receiver,
    /// Supervisor issuing and closing the permit
    Issuer,
    /// Safety officer verifying checklists
    SafetyOfficer,
}

impl Role {
    /// Badge text shown next to steps
    pub fn badge(&self) -> &'static str {
        match self {
            Self::Worker => "Worker",
            Self::Receiver => "Permit Receiver",
            Self::Issuer => "Permit Issuer",
            Self::SafetyOfficer => "Safety Officer",
        }
    }
}

/// Step lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Active,
    Completed,
    Locked,
    Rejected,
}

// =============================================================================
// Report
// =============================================================================

/// Field names the report envelope owns.
pub const RESERVED_FIELDS: &[&str] = &["id", "submittedAt", "results"];

/// Submitted report: the record plus a generated id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    #[serde(rename = "submittedAt")]
    pub submitted_at: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub results: BTreeMap<String, serde_json::Value>,
    #[serde(flatten)]
    pub record: FormRecord,
}
