//! Categorical encoding tables
//!
//! Every table is an ordered list of labels where the position of a label is
//! the integer code the models were trained against. Tables are process-wide
//! constants and must never be reordered: the codes are baked into the
//! exported model artifacts.

use serde::Serialize;
use thiserror::Error;

/// Version tag of the table set the shipped models were trained with
pub const TABLES_VERSION: &str = "2024.1";

/// Code returned by [`EncodingTable::code_of`] for labels the table does not contain
pub const UNKNOWN_LABEL_CODE: usize = 0;

/// Error raised when a code does not address a table entry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("code {code} is out of range for table '{table}' ({len} entries)")]
pub struct EncodingError {
    pub table: &'static str,
    pub code: i64,
    pub len: usize,
}

/// An ordered label list; position = code
#[derive(Debug, Serialize)]
pub struct EncodingTable {
    pub name: &'static str,
    pub labels: &'static [&'static str],
}

impl EncodingTable {
    pub const fn new(name: &'static str, labels: &'static [&'static str]) -> Self {
        Self { name, labels }
    }

    /// Position of `label`, or [`UNKNOWN_LABEL_CODE`] if the table has no such label.
    ///
    /// Matching is exact. The fallback is silent: callers that need to know
    /// whether a label was recognised should use [`EncodingTable::contains`].
    pub fn code_of(&self, label: &str) -> usize {
        self.labels
            .iter()
            .position(|l| *l == label)
            .unwrap_or(UNKNOWN_LABEL_CODE)
    }

    /// Label stored at `code`
    pub fn label_of(&self, code: i64) -> Result<&'static str, EncodingError> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| self.labels.get(idx).copied())
            .ok_or(EncodingError {
                table: self.name,
                code,
                len: self.labels.len(),
            })
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(&label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

pub static SOIL_TYPES: EncodingTable =
    EncodingTable::new("soil_types", &["Black", "Clayey", "Loamy", "Red", "Sandy"]);

pub static CROP_TYPES: EncodingTable = EncodingTable::new(
    "crop_types",
    &[
        "Barley",
        "Cotton",
        "Ground Nuts",
        "Maize",
        "Millets",
        "Oil seeds",
        "Paddy",
        "Pulses",
        "Sugarcane",
        "Tobacco",
        "Wheat",
    ],
);

pub static CROP_SPECIES: EncodingTable = EncodingTable::new(
    "crop_species",
    &[
        "apple",
        "banana",
        "blackgram",
        "chickpea",
        "coconut",
        "coffee",
        "cotton",
        "grapes",
        "jute",
        "kidneybeans",
        "lentil",
        "maize",
        "mango",
        "mothbeans",
        "mungbean",
        "muskmelon",
        "orange",
        "papaya",
        "pigeonpeas",
        "pomegranate",
        "rice",
        "watermelon",
    ],
);

pub static FERTILIZER_CLASSES: EncodingTable = EncodingTable::new(
    "fertilizer_classes",
    &["10-26-26", "14-35-14", "17-17-17", "20-20", "28-28", "DAP", "Urea"],
);

/// The canonical table set, shared by reference between normalizer and formatter
#[derive(Debug, Serialize)]
pub struct EncodingTables {
    pub version: &'static str,
    pub soil_types: &'static EncodingTable,
    pub crop_types: &'static EncodingTable,
    pub crop_species: &'static EncodingTable,
    pub fertilizer_classes: &'static EncodingTable,
}

pub static TABLES: EncodingTables = EncodingTables {
    version: TABLES_VERSION,
    soil_types: &SOIL_TYPES,
    crop_types: &CROP_TYPES,
    crop_species: &CROP_SPECIES,
    fertilizer_classes: &FERTILIZER_CLASSES,
};

impl EncodingTables {
    pub fn all(&self) -> [&'static EncodingTable; 4] {
        [
            self.soil_types,
            self.crop_types,
            self.crop_species,
            self.fertilizer_classes,
        ]
    }
}
