use crate::error::KwargsError;
use async_trait::async_trait;
use celeryq_core::{Kwargs, Value};
use dashmap::DashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// Result type for task handlers. The error text becomes the failure traceback.
pub type TaskResult = Result<Value, String>;

/// Declared kind of one positional parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Int,
    Float,
    Bool,
    Str,
    List,
    Map,
    Any,
}

impl ParamKind {
    pub fn name(&self) -> &'static str {
        match self {
            ParamKind::Int => "int",
            ParamKind::Float => "float",
            ParamKind::Bool => "bool",
            ParamKind::Str => "string",
            ParamKind::List => "list",
            ParamKind::Map => "map",
            ParamKind::Any => "any",
        }
    }

    /// Check `value` against this kind. Floats given to an `Int` parameter are
    /// truncated; that is the only conversion. Mismatches, and floats outside
    /// the i64 range, hand the value back.
    pub fn coerce(&self, value: Value) -> Result<Value, Value> {
        match (self, value) {
            (ParamKind::Int, Value::Float(f)) => {
                let whole = f.trunc();
                // i64::MAX as f64 rounds up to 2^63, itself out of range
                if whole >= i64::MIN as f64 && whole < i64::MAX as f64 {
                    Ok(Value::Int(whole as i64))
                } else {
                    Err(Value::Float(f))
                }
            }
            (ParamKind::Int, v @ Value::Int(_)) => Ok(v),
            (ParamKind::Float, v @ (Value::Float(_) | Value::Int(_))) => Ok(v),
            (ParamKind::Bool, v @ Value::Bool(_)) => Ok(v),
            (ParamKind::Str, v @ Value::String(_)) => Ok(v),
            (ParamKind::List, v @ Value::List(_)) => Ok(v),
            (ParamKind::Map, v @ Value::Map(_)) => Ok(v),
            (ParamKind::Any, v) => Ok(v),
            (_, v) => Err(v),
        }
    }
}

/// Handler for tasks invoked with positional arguments
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// One entry per positional parameter; arity and kinds are checked against it
    fn params(&self) -> &[ParamKind];

    /// Execute the task with already-coerced arguments
    async fn execute(&self, args: Vec<Value>) -> TaskResult;
}

/// [`TaskHandler`] built from a parameter list and an async closure
pub struct FnHandler<F> {
    params: Vec<ParamKind>,
    func: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    pub fn new(params: &[ParamKind], func: F) -> Self {
        FnHandler {
            params: params.to_vec(),
            func,
        }
    }
}

#[async_trait]
impl<F, Fut> TaskHandler for FnHandler<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    fn params(&self) -> &[ParamKind] {
        &self.params
    }

    async fn execute(&self, args: Vec<Value>) -> TaskResult {
        (self.func)(args).await
    }
}

/// A task that takes keyword arguments: parse them into `Self`, then run
#[async_trait]
pub trait KwargsTask: Sized + Send + 'static {
    fn parse_kwargs(kwargs: &Kwargs) -> Result<Self, KwargsError>;

    async fn run(self) -> TaskResult;
}

/// Type-erased form of a [`KwargsTask`], as stored in the registry
#[async_trait]
pub trait KwargsHandler: Send + Sync {
    /// `Err` when parsing fails; `Ok` carries whatever the task returned
    async fn execute(&self, kwargs: &Kwargs) -> Result<TaskResult, KwargsError>;
}

struct KwargsAdapter<T>(PhantomData<fn() -> T>);

#[async_trait]
impl<T: KwargsTask> KwargsHandler for KwargsAdapter<T> {
    async fn execute(&self, kwargs: &Kwargs) -> Result<TaskResult, KwargsError> {
        let task = T::parse_kwargs(kwargs)?;
        Ok(task.run().await)
    }
}

/// Required kwarg lookup
pub fn required<'a>(kwargs: &'a Kwargs, key: &str) -> Result<&'a Value, KwargsError> {
    kwargs
        .get(key)
        .ok_or_else(|| KwargsError::Missing(key.to_string()))
}

/// Required integer kwarg, with the same float truncation as positional args
pub fn required_int(kwargs: &Kwargs, key: &str) -> Result<i64, KwargsError> {
    match ParamKind::Int.coerce(required(kwargs, key)?.clone()) {
        Ok(Value::Int(i)) => Ok(i),
        _ => Err(malformed(key, ParamKind::Int)),
    }
}

pub fn required_float(kwargs: &Kwargs, key: &str) -> Result<f64, KwargsError> {
    required(kwargs, key)?
        .as_float()
        .ok_or_else(|| malformed(key, ParamKind::Float))
}

pub fn required_str<'a>(kwargs: &'a Kwargs, key: &str) -> Result<&'a str, KwargsError> {
    required(kwargs, key)?
        .as_str()
        .ok_or_else(|| malformed(key, ParamKind::Str))
}

pub fn required_bool(kwargs: &Kwargs, key: &str) -> Result<bool, KwargsError> {
    required(kwargs, key)?
        .as_bool()
        .ok_or_else(|| malformed(key, ParamKind::Bool))
}

fn malformed(key: &str, kind: ParamKind) -> KwargsError {
    KwargsError::Malformed {
        key: key.to_string(),
        expected: kind.name(),
    }
}

/// A registered handler, either calling convention
#[derive(Clone)]
pub enum Handler {
    Positional(Arc<dyn TaskHandler>),
    Keyword(Arc<dyn KwargsHandler>),
}

/// Registry of task handlers by task name
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a positional handler. Replaces any earlier handler for `name`.
    pub fn register<H: TaskHandler + 'static>(&self, name: impl Into<String>, handler: H) {
        self.handlers
            .insert(name.into(), Handler::Positional(Arc::new(handler)));
    }

    /// Register a keyword-style task type. Replaces any earlier handler for `name`.
    pub fn register_kwargs<T: KwargsTask>(&self, name: impl Into<String>) {
        self.handlers.insert(
            name.into(),
            Handler::Keyword(Arc::new(KwargsAdapter::<T>(PhantomData))),
        );
    }

    pub fn get(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).map(|entry| entry.value().clone())
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Get all registered task names
    pub fn task_names(&self) -> Vec<String> {
        self.handlers.iter().map(|entry| entry.key().clone()).collect()
    }
}
