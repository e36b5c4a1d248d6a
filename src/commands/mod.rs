pub mod agent;
pub mod context;
pub mod monitor;
pub mod session;
pub mod spawn;
pub mod task;
pub mod team;

use serde::Serialize;

/// JSON envelope every `--json` response is wrapped in.
#[derive(Debug, Serialize)]
pub struct JsonEnvelope<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    /// Unix timestamp with sub-second precision.
    pub timestamp: f64,
}

pub fn emit_json<T: Serialize>(data: T) {
    let envelope = JsonEnvelope {
        success: true,
        data: Some(data),
        error: None,
        timestamp: now_f64(),
    };
    match serde_json::to_string_pretty(&envelope) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("failed to serialize response: {e}"),
    }
}

pub fn emit_json_failure<T: Serialize>(data: Option<T>, error: &str) {
    let envelope = JsonEnvelope {
        success: false,
        data,
        error: Some(error.to_string()),
        timestamp: now_f64(),
    };
    match serde_json::to_string_pretty(&envelope) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("failed to serialize response: {e}"),
    }
}

fn now_f64() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
