use crate::pool::Recycle;
use crate::value::{Kwargs, Value};
use chrono::NaiveDateTime;
use uuid::Uuid;

/// Unique identifier for a task (a UUID v4 in its hyphenated text form)
pub type TaskId = String;

/// Generate a fresh task id
pub fn new_task_id() -> TaskId {
    Uuid::new_v4().to_string()
}

/// A unit of work addressed by name, with its arguments and delivery metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Assigned once at creation and never changed afterwards
    id: TaskId,

    /// Registered task name the worker dispatches on
    pub name: String,

    /// Positional arguments
    pub args: Vec<Value>,

    /// Keyword arguments
    pub kwargs: Kwargs,

    /// Third element of the body payload (callbacks, chords). Carried, not interpreted.
    pub embed: Kwargs,

    /// Delivery priority
    pub priority: u8,

    /// Number of times this task has been retried
    pub retries: u32,

    /// Earliest execution time, if any
    pub eta: Option<NaiveDateTime>,

    /// Expiration time, if any
    pub expires: Option<NaiveDateTime>,
}

/// An unnamed task with a fresh id, used as the blank slot in a task pool
impl Default for Task {
    fn default() -> Self {
        Task::with_id(new_task_id(), String::new())
    }
}

impl Task {
    /// Create a new task with a freshly generated id
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Task {
            name: name.into(),
            args,
            ..Default::default()
        }
    }

    /// Rebuild a task whose id was assigned elsewhere (e.g. decoded off the wire)
    pub fn with_id(id: impl Into<TaskId>, name: impl Into<String>) -> Self {
        Task {
            id: id.into(),
            name: name.into(),
            args: Vec::new(),
            kwargs: Kwargs::new(),
            embed: Kwargs::new(),
            priority: 0,
            retries: 0,
            eta: None,
            expires: None,
        }
    }

    /// Create a new task builder
    pub fn builder(name: impl Into<String>) -> TaskBuilder {
        TaskBuilder::new(name)
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Recycle for Task {
    /// A recycled task is indistinguishable from a newly created one
    fn reset(&mut self) {
        self.id = new_task_id();
        self.name.clear();
        self.args.clear();
        self.kwargs.clear();
        self.embed.clear();
        self.priority = 0;
        self.retries = 0;
        self.eta = None;
        self.expires = None;
    }
}

/// Builder for creating tasks with custom configuration
pub struct TaskBuilder {
    id: Option<TaskId>,
    name: String,
    args: Vec<Value>,
    kwargs: Kwargs,
    priority: u8,
    retries: u32,
    eta: Option<NaiveDateTime>,
    expires: Option<NaiveDateTime>,
}

impl TaskBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        TaskBuilder {
            id: None,
            name: name.into(),
            args: Vec::new(),
            kwargs: Kwargs::new(),
            priority: 0,
            retries: 0,
            eta: None,
            expires: None,
        }
    }

    pub fn id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    pub fn kwargs(mut self, kwargs: Kwargs) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn eta(mut self, eta: NaiveDateTime) -> Self {
        self.eta = Some(eta);
        self
    }

    pub fn expires(mut self, expires: NaiveDateTime) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn build(self) -> Task {
        Task {
            id: self.id.unwrap_or_else(new_task_id),
            name: self.name,
            args: self.args,
            kwargs: self.kwargs,
            embed: Kwargs::new(),
            priority: self.priority,
            retries: self.retries,
            eta: self.eta,
            expires: self.expires,
        }
    }
}
