//! Core data models for the advisor

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Raw request fields, as they arrive from a form post or JSON body
pub type RawFields = HashMap<String, String>;

/// The three prediction tasks served by the advisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Yield,
    Crop,
    Fertilizer,
}

impl Task {
    pub const ALL: [Task; 3] = [Task::Yield, Task::Crop, Task::Fertilizer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Yield => "yield",
            Task::Crop => "crop",
            Task::Fertilizer => "fertilizer",
        }
    }

    /// Feature schema the trained model for this task expects
    pub fn schema(&self) -> &'static FeatureSchema {
        match self {
            Task::Yield => &YIELD_SCHEMA,
            Task::Crop => &CROP_SCHEMA,
            Task::Fertilizer => &FERTILIZER_SCHEMA,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar type of a single feature slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Text,
    Int,
    Float,
}

/// How a record is laid out when handed to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputLayout {
    /// A single `[1, n]` f32 tensor
    Packed,
    /// One `[1, 1]` tensor per column, in schema order
    PerColumn,
}

#[derive(Debug, Serialize)]
pub struct FeatureSlot {
    pub name: &'static str,
    pub kind: FeatureKind,
}

const fn slot(name: &'static str, kind: FeatureKind) -> FeatureSlot {
    FeatureSlot { name, kind }
}

/// Ordered list of named, typed feature slots
#[derive(Debug, Serialize)]
pub struct FeatureSchema {
    pub task: Task,
    pub layout: InputLayout,
    pub slots: &'static [FeatureSlot],
}

impl FeatureSchema {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.iter().map(|s| s.name)
    }
}

pub static YIELD_SCHEMA: FeatureSchema = FeatureSchema {
    task: Task::Yield,
    layout: InputLayout::PerColumn,
    slots: &[
        slot("State", FeatureKind::Text),
        slot("District", FeatureKind::Text),
        slot("Crop", FeatureKind::Text),
        slot("Crop_Year", FeatureKind::Int),
        slot("Season", FeatureKind::Text),
        slot("Area", FeatureKind::Float),
        slot("Production", FeatureKind::Float),
    ],
};

pub static CROP_SCHEMA: FeatureSchema = FeatureSchema {
    task: Task::Crop,
    layout: InputLayout::Packed,
    slots: &[
        slot("Nitrogen", FeatureKind::Float),
        slot("Phosphorous", FeatureKind::Float),
        slot("Potassium", FeatureKind::Float),
        slot("temperature", FeatureKind::Float),
        slot("humidity", FeatureKind::Float),
        slot("ph", FeatureKind::Float),
        slot("rainfall", FeatureKind::Float),
    ],
};

pub static FERTILIZER_SCHEMA: FeatureSchema = FeatureSchema {
    task: Task::Fertilizer,
    layout: InputLayout::Packed,
    slots: &[
        slot("Temperature", FeatureKind::Float),
        slot("Humidity", FeatureKind::Float),
        slot("Moisture", FeatureKind::Float),
        slot("Nitrogen", FeatureKind::Float),
        slot("Potassium", FeatureKind::Float),
        slot("Phosphorous", FeatureKind::Float),
        slot("Soil_Type", FeatureKind::Int),
        slot("Crop_Type", FeatureKind::Int),
    ],
};

/// A single scalar feature value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl FeatureValue {
    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureValue::Text(_) => FeatureKind::Text,
            FeatureValue::Int(_) => FeatureKind::Int,
            FeatureValue::Float(_) => FeatureKind::Float,
        }
    }

    /// Numeric view of the value; `None` for text
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Text(_) => None,
            FeatureValue::Int(v) => Some(*v as f64),
            FeatureValue::Float(v) => Some(*v),
        }
    }
}

/// Ordered, schema-typed input to a predictor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRecord {
    pub task: Task,
    pub fields: Vec<(&'static str, FeatureValue)>,
}

impl FeatureRecord {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            fields: Vec::with_capacity(task.schema().len()),
        }
    }

    pub fn push(&mut self, name: &'static str, value: FeatureValue) {
        self.fields.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn values(&self) -> impl Iterator<Item = &FeatureValue> {
        self.fields.iter().map(|(_, v)| v)
    }

    /// All values as f64 in record order; `None` if any value is text
    pub fn numeric_values(&self) -> Option<Vec<f64>> {
        self.values().map(FeatureValue::as_f64).collect()
    }

    /// Check names, order and kinds against the task schema.
    ///
    /// Returns a description of the first mismatch.
    pub fn validate(&self) -> Result<(), String> {
        let schema = self.task.schema();
        if self.fields.len() != schema.len() {
            return Err(format!(
                "{} record has {} fields, schema expects {}",
                self.task,
                self.fields.len(),
                schema.len()
            ));
        }
        for (idx, ((name, value), slot)) in self.fields.iter().zip(schema.slots).enumerate() {
            if *name != slot.name {
                return Err(format!(
                    "field {} is '{}', schema expects '{}'",
                    idx, name, slot.name
                ));
            }
            if value.kind() != slot.kind {
                return Err(format!(
                    "field '{}' is {:?}, schema expects {:?}",
                    name,
                    value.kind(),
                    slot.kind
                ));
            }
        }
        Ok(())
    }
}

/// Raw scalar produced by a model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawOutput {
    /// Regression score
    Score(f64),
    /// Classifier label index
    Class(i64),
}
