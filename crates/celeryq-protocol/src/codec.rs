use crate::envelope::{DeliveryInfo, Envelope, BODY_ENCODING_BASE64, CONTENT_TYPE_JSON};
use crate::repr::{args_repr, kwargs_repr};
use crate::{ProtocolError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use celeryq_core::{Kwargs, Task, Value};
use tracing::debug;

/// Decoded contents of an envelope body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub args: Vec<Value>,
    pub kwargs: Kwargs,
    pub embed: Kwargs,
}

/// Serialize `[args, kwargs, embed]` and base64 it
pub fn encode_body(args: &[Value], kwargs: &Kwargs, embed: &Kwargs) -> Result<String> {
    let json = serde_json::to_vec(&(args, kwargs, embed))?;
    debug!(body = %String::from_utf8_lossy(&json), "Encoded task body");
    Ok(STANDARD.encode(json))
}

/// Reverse of [`encode_body`]. The payload must be a 3-element JSON array.
pub fn decode_body(body: &str) -> Result<Payload> {
    let raw = STANDARD.decode(body.trim())?;
    let mut parts: Vec<Value> = serde_json::from_slice(&raw)?;
    if parts.len() != 3 {
        return Err(ProtocolError::PayloadArity(parts.len()));
    }

    let embed = into_map("embed", parts.pop().unwrap_or_default())?;
    let kwargs = into_map("kwargs", parts.pop().unwrap_or_default())?;
    let args = match parts.pop().unwrap_or_default() {
        Value::List(items) => items,
        Value::Null => Vec::new(),
        other => {
            return Err(ProtocolError::MalformedPayload {
                field: "args",
                expected: "list",
                found: other.kind(),
            })
        }
    };

    Ok(Payload { args, kwargs, embed })
}

fn into_map(field: &'static str, value: Value) -> Result<Kwargs> {
    match value {
        Value::Map(map) => Ok(map),
        Value::Null => Ok(Kwargs::new()),
        other => Err(ProtocolError::MalformedPayload {
            field,
            expected: "map",
            found: other.kind(),
        }),
    }
}

/// Encode a task into a fresh envelope routed with the default delivery info
pub fn encode(task: &Task) -> Result<Envelope> {
    let mut envelope = Envelope::new();
    encode_into(task, &DeliveryInfo::default(), &mut envelope)?;
    Ok(envelope)
}

/// Fill `envelope` from `task`. Fixed tags and generated ids already on the
/// envelope (from [`Envelope::new`] or a pool reset) are kept.
pub fn encode_into(task: &Task, delivery: &DeliveryInfo, envelope: &mut Envelope) -> Result<()> {
    envelope.body = encode_body(&task.args, &task.kwargs, &task.embed)?;

    let headers = &mut envelope.headers;
    headers.id = task.id().to_string();
    headers.task = task.name.clone();
    headers.root_id = task.id().to_string();
    headers.retries = task.retries;
    headers.eta = task.eta;
    headers.expires = task.expires;
    headers.argsrepr = args_repr(&task.args);
    headers.kwargsrepr = kwargs_repr(&task.kwargs);

    let properties = &mut envelope.properties;
    properties.correlation_id = task.id().to_string();
    properties.priority = task.priority;
    properties.delivery_info = delivery.clone();
    Ok(())
}

/// Validate the envelope's tags and rebuild the task it carries.
///
/// Numbers in the payload stay floating point; coercion happens at dispatch.
pub fn decode(envelope: &Envelope) -> Result<Task> {
    if envelope.content_type != CONTENT_TYPE_JSON {
        return Err(ProtocolError::UnsupportedContentType(envelope.content_type.clone()));
    }
    if envelope.properties.body_encoding != BODY_ENCODING_BASE64 {
        return Err(ProtocolError::UnsupportedBodyEncoding(
            envelope.properties.body_encoding.clone(),
        ));
    }

    let payload = decode_body(&envelope.body)?;

    let mut task = Task::with_id(envelope.headers.id.clone(), envelope.headers.task.clone());
    task.args = payload.args;
    task.kwargs = payload.kwargs;
    task.embed = payload.embed;
    task.priority = envelope.properties.priority;
    task.retries = envelope.headers.retries;
    task.eta = envelope.headers.eta;
    task.expires = envelope.headers.expires;
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDateTime};
    use proptest::prelude::*;

    const PYTHON_BODY: &str = "W1tdLCB7InkiOiAyODc4LCAieCI6IDU0NTZ9LCB7ImNob3JkIjogbnVsbCwgImNhbGxiYWNrcyI6IG51bGwsICJlcnJiYWNrcyI6IG51bGwsICJjaGFpbiI6IG51bGx9XQ==";

    fn add_task() -> Task {
        Task::builder("add").arg(3).arg(4).priority(3).build()
    }

    #[test]
    fn test_decode_python_body() {
        let payload = decode_body(PYTHON_BODY).unwrap();

        assert!(payload.args.is_empty());
        assert_eq!(payload.kwargs["x"], Value::Float(5456.0));
        assert_eq!(payload.kwargs["y"].as_float(), Some(2878.0));
        assert!(payload.embed["chord"].is_null());
    }

    #[test]
    fn test_encode_sets_correlation_and_headers() {
        let task = add_task();
        let envelope = encode(&task).unwrap();

        assert_eq!(envelope.properties.correlation_id, task.id());
        assert_eq!(envelope.headers.id, task.id());
        assert_eq!(envelope.headers.root_id, task.id());
        assert_eq!(envelope.headers.task, "add");
        assert_eq!(envelope.headers.argsrepr, "(3, 4)");
        assert_eq!(envelope.headers.kwargsrepr, "{}");
        assert_eq!(envelope.properties.priority, 3);
        assert_eq!(envelope.content_type, "application/json");
        assert_eq!(envelope.properties.body_encoding, "base64");

        let raw = STANDARD.decode(&envelope.body).unwrap();
        assert_eq!(String::from_utf8(raw).unwrap(), "[[3,4],{},{}]");
    }

    #[test]
    fn test_encode_rejects_non_finite_floats() {
        let task = Task::new("t", vec![Value::Float(f64::NAN)]);
        assert!(matches!(encode(&task), Err(ProtocolError::Json(_))));

        let task = Task::builder("t").kwarg("x", f64::INFINITY).build();
        assert!(matches!(encode(&task), Err(ProtocolError::Json(_))));
    }

    #[test]
    fn test_decode_numbers_stay_float() {
        let task = decode(&encode(&add_task()).unwrap()).unwrap();
        assert!(matches!(task.args[0], Value::Float(f) if f == 3.0));
    }

    #[test]
    fn test_reject_content_type() {
        let mut envelope = encode(&add_task()).unwrap();
        envelope.content_type = "application/x-python-serialize".to_string();

        match decode(&envelope) {
            Err(ProtocolError::UnsupportedContentType(ct)) => {
                assert_eq!(ct, "application/x-python-serialize")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_reject_body_encoding() {
        let mut envelope = encode(&add_task()).unwrap();
        envelope.properties.body_encoding = "utf-8".to_string();

        assert!(matches!(
            decode(&envelope),
            Err(ProtocolError::UnsupportedBodyEncoding(_))
        ));
    }

    #[test]
    fn test_reject_payload_arity() {
        let mut envelope = encode(&add_task()).unwrap();
        envelope.body = STANDARD.encode("[[1], {}]");
        assert!(matches!(decode(&envelope), Err(ProtocolError::PayloadArity(2))));

        envelope.body = STANDARD.encode("[[1], {}, {}, {}]");
        assert!(matches!(decode(&envelope), Err(ProtocolError::PayloadArity(4))));
    }

    #[test]
    fn test_reject_malformed_body() {
        assert!(matches!(decode_body("not base64!"), Err(ProtocolError::InvalidBase64(_))));
        assert!(matches!(
            decode_body(&STANDARD.encode("{\"a\": 1}")),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            decode_body(&STANDARD.encode("[1, {}, {}]")),
            Err(ProtocolError::MalformedPayload { field: "args", .. })
        ));
    }

    #[test]
    fn test_null_kwargs_and_embed_read_as_empty() {
        let payload = decode_body(&STANDARD.encode("[[], null, null]")).unwrap();
        assert!(payload.kwargs.is_empty());
        assert!(payload.embed.is_empty());
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            (-(1i64 << 53)..(1i64 << 53)).prop_map(Value::Int),
            (-1_000_000i64..1_000_000, 0u8..4)
                .prop_map(|(whole, quarters)| Value::Float(whole as f64 + f64::from(quarters) * 0.25)),
            ".{0,12}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Value::Map),
            ]
        })
    }

    fn arb_timestamp() -> impl Strategy<Value = Option<NaiveDateTime>> {
        prop::option::of(
            (0i64..4_102_444_800)
                .prop_filter_map("in range", |secs| DateTime::from_timestamp(secs, 0))
                .prop_map(|dt| dt.naive_utc()),
        )
    }

    prop_compose! {
        fn arb_task()(
            name in "[a-z_.]{1,20}",
            args in prop::collection::vec(arb_value(), 0..5),
            kwargs in prop::collection::btree_map("[a-z]{1,8}", arb_value(), 0..4),
            priority in any::<u8>(),
            retries in 0u32..10,
            eta in arb_timestamp(),
            expires in arb_timestamp(),
        ) -> Task {
            let mut task = Task::new(name, args);
            task.kwargs = kwargs;
            task.priority = priority;
            task.retries = retries;
            task.eta = eta;
            task.expires = expires;
            task
        }
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(task in arb_task()) {
            let envelope = encode(&task).unwrap();
            let json = envelope.to_json().unwrap();
            let decoded = decode(&Envelope::from_json(&json).unwrap()).unwrap();

            prop_assert_eq!(decoded, task);
        }
    }
}
