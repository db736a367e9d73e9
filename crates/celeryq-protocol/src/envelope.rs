use crate::{timefmt, Result};
use celeryq_core::serde_util::null_as_default;
use celeryq_core::{new_task_id, Recycle, DEFAULT_QUEUE};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// The only accepted `content-type`
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// The `content-encoding` written on every envelope
pub const CONTENT_ENCODING_UTF8: &str = "utf-8";

/// The only accepted `properties.body_encoding`
pub const BODY_ENCODING_BASE64: &str = "base64";

/// Persistent delivery, as the Python producer sets it
pub const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// `gen<pid>@<hostname>`, computed once per process
pub fn origin() -> &'static str {
    static ORIGIN: OnceLock<String> = OnceLock::new();
    ORIGIN.get_or_init(|| {
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());
        format!("gen{}@{}", std::process::id(), host)
    })
}

/// Wire message placed on the queue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Envelope {
    /// Base64 of the JSON payload `[args, kwargs, embed]`
    pub body: String,

    pub headers: Headers,

    pub properties: Properties,

    #[serde(rename = "content-type")]
    pub content_type: String,

    #[serde(rename = "content-encoding")]
    pub content_encoding: String,
}

/// Task metadata carried in `headers`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Headers {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,

    /// Task name
    #[serde(deserialize_with = "null_as_default")]
    pub task: String,

    #[serde(deserialize_with = "null_as_default")]
    pub root_id: String,

    #[serde(deserialize_with = "null_as_default")]
    pub parent_id: String,

    #[serde(deserialize_with = "null_as_default")]
    pub retries: u32,

    #[serde(with = "timefmt")]
    pub eta: Option<NaiveDateTime>,

    #[serde(with = "timefmt")]
    pub expires: Option<NaiveDateTime>,

    #[serde(deserialize_with = "null_as_default")]
    pub origin: String,

    #[serde(deserialize_with = "null_as_default")]
    pub argsrepr: String,

    #[serde(deserialize_with = "null_as_default")]
    pub kwargsrepr: String,

    /// Soft and hard time limits in seconds
    pub timelimit: (Option<f64>, Option<f64>),
}

/// AMQP-style message properties
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Properties {
    #[serde(deserialize_with = "null_as_default")]
    pub correlation_id: String,

    #[serde(deserialize_with = "null_as_default")]
    pub reply_to: String,

    #[serde(deserialize_with = "null_as_default")]
    pub body_encoding: String,

    #[serde(deserialize_with = "null_as_default")]
    pub priority: u8,

    pub delivery_info: DeliveryInfo,

    #[serde(deserialize_with = "null_as_default")]
    pub delivery_mode: u8,

    #[serde(deserialize_with = "null_as_default")]
    pub delivery_tag: String,
}

/// Routing metadata. Carried for fidelity; the Redis adapter routes by queue name only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub routing_key: String,

    #[serde(deserialize_with = "null_as_default")]
    pub exchange: String,
}

impl DeliveryInfo {
    pub fn new(routing_key: impl Into<String>, exchange: impl Into<String>) -> Self {
        DeliveryInfo {
            routing_key: routing_key.into(),
            exchange: exchange.into(),
        }
    }
}

impl Default for DeliveryInfo {
    fn default() -> Self {
        DeliveryInfo::new(DEFAULT_QUEUE, "")
    }
}

impl Envelope {
    /// An envelope with every fixed tag and generated id filled in, body empty
    pub fn new() -> Self {
        let mut envelope = Envelope::default();
        envelope.reset();
        envelope
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn task_id(&self) -> &str {
        &self.headers.id
    }

    pub fn task_name(&self) -> &str {
        &self.headers.task
    }
}

impl Recycle for Envelope {
    fn reset(&mut self) {
        self.body.clear();
        self.headers = Headers {
            origin: origin().to_string(),
            ..Headers::default()
        };
        self.properties = Properties {
            reply_to: new_task_id(),
            body_encoding: BODY_ENCODING_BASE64.to_string(),
            delivery_info: DeliveryInfo::default(),
            delivery_mode: DELIVERY_MODE_PERSISTENT,
            delivery_tag: new_task_id(),
            ..Properties::default()
        };
        self.content_type = CONTENT_TYPE_JSON.to_string();
        self.content_encoding = CONTENT_ENCODING_UTF8.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Envelope as published by the Python client for `add_reflect(x=5456, y=2878)`
    const PYTHON_ENVELOPE: &str = r#"{"body": "W1tdLCB7InkiOiAyODc4LCAieCI6IDU0NTZ9LCB7ImNob3JkIjogbnVsbCwgImNhbGxiYWNrcyI6IG51bGwsICJlcnJiYWNrcyI6IG51bGwsICJjaGFpbiI6IG51bGx9XQ==", "headers": {"origin": "gen18066@huangzhen-PC", "root_id": "ed13b762-aadc-4451-b525-d8eb1ec3e8c3", "expires": null, "shadow": null, "id": "ed13b762-aadc-4451-b525-d8eb1ec3e8c3", "kwargsrepr": "{'y': 2878, 'x': 5456}", "lang": "py", "retries": 0, "task": "worker.add_reflect", "group": null, "timelimit": [null, null], "parent_id": null, "argsrepr": "()", "eta": null}, "content-type": "application/json", "properties": {"priority": 0, "body_encoding": "base64", "correlation_id": "ed13b762-aadc-4451-b525-d8eb1ec3e8c3", "reply_to": "2790276f-4aba-3e88-94af-154ed9df4a0f", "delivery_info": {"routing_key": "celery", "exchange": ""}, "delivery_mode": 2, "delivery_tag": "b7dfd826-df49-45b0-8cf7-20bd7c6611b0"}, "content-encoding": "utf-8"}"#;

    #[test]
    fn test_parse_python_envelope() {
        let envelope = Envelope::from_json(PYTHON_ENVELOPE).unwrap();

        assert_eq!(envelope.task_name(), "worker.add_reflect");
        assert_eq!(envelope.task_id(), "ed13b762-aadc-4451-b525-d8eb1ec3e8c3");
        assert_eq!(envelope.headers.parent_id, "");
        assert_eq!(envelope.headers.timelimit, (None, None));
        assert_eq!(envelope.properties.delivery_info.routing_key, "celery");
        assert_eq!(envelope.properties.delivery_mode, 2);
        assert_eq!(envelope.content_type, CONTENT_TYPE_JSON);
    }

    #[test]
    fn test_fresh_envelope_defaults() {
        let envelope = Envelope::new();

        assert_eq!(envelope.content_type, "application/json");
        assert_eq!(envelope.content_encoding, "utf-8");
        assert_eq!(envelope.properties.body_encoding, "base64");
        assert_eq!(envelope.properties.delivery_mode, 2);
        assert!(envelope.headers.origin.starts_with("gen"));
        assert_ne!(envelope.properties.reply_to, envelope.properties.delivery_tag);
    }

    #[test]
    fn test_serialized_field_names() {
        let json: serde_json::Value =
            serde_json::from_str(&Envelope::new().to_json().unwrap()).unwrap();

        assert_eq!(json["content-type"], "application/json");
        assert_eq!(json["content-encoding"], "utf-8");
        assert!(json["headers"]["eta"].is_null());
        assert_eq!(json["headers"]["timelimit"], serde_json::json!([null, null]));
        assert_eq!(json["properties"]["delivery_info"]["exchange"], "");
    }
}
