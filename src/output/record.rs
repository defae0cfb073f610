use serde::{Deserialize, Serialize};

/// Schema version written into every record
pub const SCHEMA_VERSION: u32 = 1;

/// One extracted catalogue item, serialized as a single NDJSON line
///
/// Field order is the on-disk order. `url` is the dedup key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub title: String,

    /// Numeric price with the currency symbol stripped
    pub price: f64,

    /// Availability text with whitespace collapsed, empty when absent
    #[serde(default)]
    pub availability: String,

    /// Star rating 1..=5, 0 when unknown
    #[serde(default)]
    pub rating: u8,

    #[serde(default = "unknown_category")]
    pub category: String,

    /// Canonical absolute URL of the item
    pub url: String,

    #[serde(default = "current_version")]
    pub schema_version: u32,
}

fn unknown_category() -> String {
    "Unknown".to_string()
}

fn current_version() -> u32 {
    SCHEMA_VERSION
}

impl ItemRecord {
    pub fn new(
        title: impl Into<String>,
        price: f64,
        availability: impl Into<String>,
        rating: u8,
        category: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            price,
            availability: availability.into(),
            rating,
            category: category.into(),
            url: url.into(),
            schema_version: SCHEMA_VERSION,
        }
    }

    /// Serializes the record as one NDJSON line, without the trailing newline
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Returns true if this reader understands the record's schema version
    pub fn is_supported_version(&self) -> bool {
        self.schema_version <= SCHEMA_VERSION
    }
}
