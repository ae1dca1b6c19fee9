use serde::Serialize;

/// Body of one `POST /telemetry` request
#[derive(Debug, Clone, Serialize)]
pub struct Telemetry {
    pub hive_id: String,
    pub temperature: f64,
    pub humidity: f64,
    pub audio: f64,
    pub bee_count: u32,
}
