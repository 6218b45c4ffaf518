//! Declaring local functions as tools.
//!
//! A [`LocalFn`] is an ordinary async function with a name, a parameter list
//! and a handler. It can be called directly, but carries no tool metadata.
//! Passing it through [`tool()`] attaches a [`ToolDefinition`] (name,
//! description, input schema) and yields an [`FnTool`], which is what a
//! [`ToolRunner`](super::ToolRunner) accepts.
//!
//! ```ignore
//! let add = LocalFn::new("add", |args: ToolArgs| async move {
//!     let a: i64 = args.get("a")?;
//!     let b: i64 = args.get("b")?;
//!     Ok(a + b)
//! })
//! .param(Param::new("a").typed("int"))
//! .param(Param::new("b").typed("int"))
//! .doc("Add two integers.");
//!
//! let add = tool().declare(add);
//! assert_eq!(add.definition().input_schema["required"], json!(["a", "b"]));
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info, trace};

use super::error::ToolError;
use super::schema::{Param, build_schema, json_schema_for};
use crate::ToolDefinition;
use crate::error::{Error, Result};

/// Boxed future returned by [`Invocable::invoke`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + 'a>>;

type ErasedHandler = Arc<dyn Fn(ToolArgs) -> ToolFuture<'static> + Send + Sync>;

// ── Invocable trait ────────────────────────────────────────────────

/// Something that can be called with a JSON object of named arguments.
///
/// Only invocables that carry a tool declaration
/// ([`definition`](Self::definition) returns `Some`) can be registered with
/// a [`ToolRunner`](super::ToolRunner).
pub trait Invocable: Send + Sync {
    /// The function's own name.
    fn name(&self) -> &str;

    /// Tool metadata attached by a declaration.
    fn definition(&self) -> Option<&ToolDefinition> {
        None
    }

    /// Call with the given named arguments.
    fn invoke(&self, input: Map<String, Value>) -> ToolFuture<'_>;
}

// ── ToolArgs ───────────────────────────────────────────────────────

/// Named-argument view over a tool's input object.
#[derive(Debug, Clone)]
pub struct ToolArgs {
    input: Map<String, Value>,
    params: Arc<Vec<Param>>,
}

impl ToolArgs {
    pub fn new(input: Map<String, Value>) -> Self {
        Self {
            input,
            params: Arc::default(),
        }
    }

    fn with_params(input: Map<String, Value>, params: Arc<Vec<Param>>) -> Self {
        Self { input, params }
    }

    fn declared_default(&self, name: &str) -> Option<&Value> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.default.as_ref())
    }

    fn decode<T: DeserializeOwned>(name: &str, value: &Value) -> Result<T, ToolError> {
        serde_json::from_value(value.clone()).map_err(|e| ToolError::InvalidArgument {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// A required argument. Falls back to the parameter's declared default;
    /// with neither, fails with [`ToolError::MissingArgument`].
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, ToolError> {
        match self.input.get(name).or_else(|| self.declared_default(name)) {
            Some(value) => Self::decode(name, value),
            None => Err(ToolError::MissingArgument(name.to_string())),
        }
    }

    /// Like [`get`](Self::get), but falls back to `T::default()` instead of failing.
    pub fn get_or<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T, ToolError> {
        match self.input.get(name).or_else(|| self.declared_default(name)) {
            Some(value) => Self::decode(name, value),
            None => Ok(T::default()),
        }
    }

    /// An optional argument. Absent or `null` gives `None`.
    pub fn opt<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ToolError> {
        match self.input.get(name).or_else(|| self.declared_default(name)) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Self::decode(name, value).map(Some),
        }
    }

    /// The raw JSON value as provided by the caller.
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.input.get(name)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.input
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.input
    }
}

// ── LocalFn ────────────────────────────────────────────────────────

/// A local async function with named parameters.
///
/// Implements [`Invocable`] but carries no declaration: registering it
/// directly fails with [`Error::NotATool`]. Use [`tool()`] to declare it.
#[derive(Clone)]
pub struct LocalFn {
    name: String,
    doc: Option<String>,
    params: Arc<Vec<Param>>,
    derived_schema: Option<Value>,
    handler: ErasedHandler,
}

fn to_json<T: Serialize>(value: T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Serialization(e.to_string()))
}

impl LocalFn {
    /// A function whose handler reads its arguments through [`ToolArgs`].
    ///
    /// Declare parameters with [`param`](Self::param). Input keys that are
    /// not declared parameters are rejected before the handler runs.
    pub fn new<F, Fut, T>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ToolError>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let erased = move |args: ToolArgs| -> ToolFuture<'static> {
            let fut = handler(args);
            Box::pin(async move { to_json(fut.await?) })
        };
        Self {
            name: name.into(),
            doc: None,
            params: Arc::default(),
            derived_schema: None,
            handler: Arc::new(erased),
        }
    }

    /// A function taking a typed argument struct. The input schema is derived
    /// from `A` and the input object is deserialized into it.
    ///
    /// ```ignore
    /// #[derive(Deserialize, JsonSchema)]
    /// struct SumArgs { numbers: Vec<f64> }
    ///
    /// let sum = LocalFn::typed("calculate_sum", |args: SumArgs| async move {
    ///     Ok(args.numbers.iter().sum::<f64>())
    /// });
    /// ```
    pub fn typed<A, F, Fut, T>(name: impl Into<String>, handler: F) -> Self
    where
        A: DeserializeOwned + JsonSchema + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ToolError>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let erased = move |args: ToolArgs| -> ToolFuture<'static> {
            let parsed: A = match serde_json::from_value(Value::Object(args.into_map())) {
                Ok(a) => a,
                Err(e) => {
                    let err = ToolError::InvalidInput(e.to_string());
                    return Box::pin(async move { Err(err) });
                }
            };
            let fut = handler(parsed);
            Box::pin(async move { to_json(fut.await?) })
        };
        Self {
            name: name.into(),
            doc: None,
            params: Arc::default(),
            derived_schema: Some(json_schema_for::<A>()),
            handler: Arc::new(erased),
        }
    }

    /// Declare one parameter.
    pub fn param(mut self, param: Param) -> Self {
        Arc::make_mut(&mut self.params).push(param);
        self
    }

    /// Declare several parameters at once.
    pub fn params(mut self, params: impl IntoIterator<Item = Param>) -> Self {
        Arc::make_mut(&mut self.params).extend(params);
        self
    }

    /// Doc string, used as the tool description when none is given.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn doc_str(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn parameters(&self) -> &[Param] {
        &self.params
    }

    /// The input schema this function would be declared with.
    pub fn input_schema(&self) -> Value {
        match &self.derived_schema {
            Some(schema) => schema.clone(),
            None => build_schema(&self.params).to_value(),
        }
    }

    /// Whether `key` names a declared argument. A receiver only counts as
    /// one when it is not the first parameter, matching [`build_schema`].
    fn accepts(&self, key: &str) -> bool {
        self.params
            .iter()
            .enumerate()
            .any(|(idx, p)| p.name == key && !(idx == 0 && p.is_receiver()))
    }

    /// Call the function directly.
    pub fn call(&self, input: Map<String, Value>) -> ToolFuture<'_> {
        if self.derived_schema.is_none()
            && let Some(key) = input.keys().find(|key| !self.accepts(key))
        {
            let err = ToolError::UnexpectedArgument(key.clone());
            return Box::pin(async move { Err(err) });
        }
        (self.handler)(ToolArgs::with_params(input, Arc::clone(&self.params)))
    }
}

impl Invocable for LocalFn {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, input: Map<String, Value>) -> ToolFuture<'_> {
        self.call(input)
    }
}

impl fmt::Debug for LocalFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalFn")
            .field("name", &self.name)
            .field(
                "params",
                &self.params.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// ── Declaration ────────────────────────────────────────────────────

/// Tool declaration attributes. Create with [`tool()`].
#[derive(Debug, Clone, Default)]
pub struct ToolAttrs {
    name: Option<String>,
    description: Option<String>,
}

/// Start a tool declaration.
///
/// Name defaults to the function's name, description to its doc string,
/// else empty.
pub fn tool() -> ToolAttrs {
    ToolAttrs::default()
}

impl ToolAttrs {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a [`ToolDefinition`] to `func`. The schema is built here, once.
    pub fn declare(self, func: LocalFn) -> FnTool {
        let name = self
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| func.name.clone());
        let description = self
            .description
            .or_else(|| func.doc.clone())
            .unwrap_or_default();
        let def = ToolDefinition {
            name,
            description,
            input_schema: func.input_schema(),
        };
        debug!("Declared tool {} ({} params)", def.name, func.params.len());
        FnTool { func, def }
    }
}

/// A [`LocalFn`] with an attached [`ToolDefinition`].
#[derive(Clone)]
pub struct FnTool {
    func: LocalFn,
    def: ToolDefinition,
}

impl FnTool {
    pub fn definition(&self) -> &ToolDefinition {
        &self.def
    }

    /// The wrapped function.
    pub fn function(&self) -> &LocalFn {
        &self.func
    }

    /// Call the function directly, exactly as if it were undeclared.
    pub fn call(&self, input: Map<String, Value>) -> ToolFuture<'_> {
        self.func.call(input)
    }
}

impl Invocable for FnTool {
    fn name(&self) -> &str {
        &self.func.name
    }

    fn definition(&self) -> Option<&ToolDefinition> {
        Some(&self.def)
    }

    fn invoke(&self, input: Map<String, Value>) -> ToolFuture<'_> {
        self.func.call(input)
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.def.name)
            .field("function", &self.func.name)
            .finish()
    }
}

impl From<LocalFn> for FnTool {
    fn from(func: LocalFn) -> Self {
        tool().declare(func)
    }
}

// ── Definition lookup ──────────────────────────────────────────────

/// The tool definition of a declared invocable.
pub fn get_tool_definition(func: &dyn Invocable) -> Result<ToolDefinition> {
    func.definition().cloned().ok_or_else(|| Error::NotATool {
        name: func.name().to_string(),
    })
}

/// Definitions of several declared invocables, in order. Fails on the first
/// undeclared one.
pub fn collect_tools(funcs: &[&dyn Invocable]) -> Result<Vec<ToolDefinition>> {
    funcs.iter().map(|f| get_tool_definition(*f)).collect()
}

// ── Helpers ────────────────────────────────────────────────────────

/// Validate tool input against the tool's declared JSON Schema.
///
/// Returns `None` if valid, or `Some(message)` listing each violation.
pub fn validate_input(def: &ToolDefinition, input: &Map<String, Value>) -> Option<String> {
    // If the schema itself is invalid, skip validation.
    let validator = jsonschema::validator_for(&def.input_schema).ok()?;

    let instance = Value::Object(input.clone());
    let errors: Vec<String> = validator
        .iter_errors(&instance)
        .map(|e| format!("  - {}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!(
            "Error: InvalidArgument: argument validation failed for tool '{}':\n{}",
            def.name,
            errors.join("\n")
        ))
    }
}

/// Log a tool call at INFO level with a truncated preview of arguments.
pub fn log_tool_call(name: &str, input: &Map<String, Value>) {
    let arguments = Value::Object(input.clone()).to_string();
    let args_preview: String = arguments.chars().take(120).collect();
    info!(
        "[tool] {}({args_preview}{})",
        name,
        if arguments.chars().count() > 120 { "..." } else { "" }
    );
    debug!("[tool] {name} full args ({} bytes)", arguments.len());
    trace!("[tool] {name} arguments: {arguments}");
}

/// Truncate a string to at most `max` bytes (backing off to a char
/// boundary), appending a notice if trimmed.
pub fn truncate_result(mut s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let total = s.len();
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
    format!("{s}...\n[truncated: {total} bytes total]")
}
