use std::collections::BTreeMap;

/// Measurement name every hive reading is written under
pub const MEASUREMENT: &str = "beehive_metrics";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

/// Hive sensor reading extracted from a request body.
///
/// Each field has one fixed store type regardless of how the sender wrote
/// the number: the store pins a field's type on its first write.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub hive_id: String,
    pub temperature: f64,
    pub humidity: f64,
    pub audio: f64,
    pub bee_count: i64,
}

impl Reading {
    pub fn into_point(self) -> Point {
        Point::new(MEASUREMENT)
            .tag("hive_id", self.hive_id)
            .field("temperature", self.temperature)
            .field("humidity", self.humidity)
            .field("audio", self.audio)
            .field("bee_count", self.bee_count)
    }
}

/// One time-series write unit. The store assigns the timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Point {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}
