mod codec;
mod envelope;
pub mod repr;
pub mod timefmt;

pub use codec::{decode, decode_body, encode, encode_body, encode_into, Payload};
pub use envelope::{
    origin, DeliveryInfo, Envelope, Headers, Properties, BODY_ENCODING_BASE64,
    CONTENT_ENCODING_UTF8, CONTENT_TYPE_JSON, DELIVERY_MODE_PERSISTENT,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Unsupported body encoding: {0}")]
    UnsupportedBodyEncoding(String),

    #[error("Invalid base64 body: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload must have 3 elements (args, kwargs, embed), got {0}")]
    PayloadArity(usize),

    #[error("Payload {field} must be a {expected}, got {found}")]
    MalformedPayload {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Message popped from queue {got}, expected {expected}")]
    UnexpectedQueue { expected: String, got: String },
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
