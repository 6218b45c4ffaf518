//! [`ToolRunner`]: the registry and dispatcher for declared tools.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use super::core::{Invocable, log_tool_call, truncate_result, validate_input};
use super::error::ToolError;
use crate::error::{Error, Result};
use crate::{ToolDefinition, ToolInvocation, ToolResult};

/// A collection of declared tools that can be dispatched by name.
///
/// Registration order is kept: [`definitions`](Self::definitions) lists
/// tools in the order they were first registered. Registering a second tool
/// under an existing name replaces the first one in place.
///
/// Dispatch never fails. Unknown tools, argument problems, tool errors and
/// panics all come back as a [`ToolResult`] with `is_error` set.
///
/// ```ignore
/// let runner = ToolRunner::new()
///     .with(tool().declare(get_weather))?
///     .with(tool().declare(calculate_sum))?
///     .with_arg_validation(true);
///
/// let request = client.request(messages).with_tools(runner.definitions());
/// let response = client.complete(request).await?;
/// let results = runner.execute_all(&response.tool_calls).await;
/// ```
pub struct ToolRunner {
    tools: HashMap<String, Box<dyn Invocable>>,
    order: Vec<String>,
    /// Whether to validate input against the declared schema before execution.
    validate_args: bool,
    /// Truncate success output above this many bytes. `None` keeps it verbatim.
    max_result_bytes: Option<usize>,
    /// Per-call time limit. `None` disables timeouts.
    timeout: Option<Duration>,
}

impl fmt::Debug for ToolRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRunner")
            .field("tools", &self.order)
            .field("validate_args", &self.validate_args)
            .field("max_result_bytes", &self.max_result_bytes)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for ToolRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRunner {
    /// Create an empty runner.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
            validate_args: false,
            max_result_bytes: None,
            timeout: None,
        }
    }

    /// Validate tool input against the declared JSON Schema before execution.
    pub fn with_arg_validation(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    /// Truncate long success output. Off by default.
    pub fn with_max_result_bytes(mut self, max: Option<usize>) -> Self {
        self.max_result_bytes = max;
        self
    }

    /// Limit how long a single tool call may run. Off by default.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a declared tool under its definition name.
    ///
    /// Fails with [`Error::NotATool`] when the invocable carries no
    /// declaration. A tool already registered under the same name is
    /// replaced, keeping its position.
    pub fn register(&mut self, tool: impl Invocable + 'static) -> Result<()> {
        self.register_boxed(Box::new(tool))
    }

    /// Register an already boxed tool.
    pub fn register_boxed(&mut self, tool: Box<dyn Invocable>) -> Result<()> {
        let Some(def) = tool.definition() else {
            return Err(Error::NotATool {
                name: tool.name().to_string(),
            });
        };
        let name = def.name.clone();
        if self.tools.insert(name.clone(), tool).is_some() {
            debug!("Replaced tool {name}");
        } else {
            debug!("Registered tool {name}");
            self.order.push(name);
        }
        Ok(())
    }

    /// Register a tool (builder pattern).
    pub fn with(mut self, tool: impl Invocable + 'static) -> Result<Self> {
        self.register(tool)?;
        Ok(self)
    }

    /// All tool definitions, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .filter_map(|tool| tool.definition().cloned())
            .collect()
    }

    /// Registered tool names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the runner is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute one tool call.
    ///
    /// A string return value becomes the content verbatim; any other value
    /// is serialized to compact JSON. Every failure becomes an error result
    /// with content `Error: <Kind>: <message>`.
    pub async fn execute(&self, call: &ToolInvocation) -> ToolResult {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!("Model requested unknown tool {}", call.name);
            return ToolResult::error(&call.id, format!("Unknown tool: {}", call.name));
        };

        if self.validate_args
            && let Some(def) = tool.definition()
            && let Some(error) = validate_input(def, &call.input)
        {
            info!("Tool {} rejected: invalid arguments", call.name);
            return ToolResult::error(&call.id, error);
        }

        log_tool_call(&call.name, &call.input);
        let start = Instant::now();

        let outcome = self.run(tool.as_ref(), call).await;

        let elapsed = start.elapsed();
        match outcome {
            Ok(value) => {
                let content = render_output(value);
                debug!(
                    "Tool {} completed in {:.0}ms ({} bytes)",
                    call.name,
                    elapsed.as_secs_f64() * 1000.0,
                    content.len()
                );
                trace!(
                    "Tool {} result preview: {}",
                    call.name,
                    content.chars().take(300).collect::<String>()
                );
                let content = match self.max_result_bytes {
                    Some(max) => truncate_result(content, max),
                    None => content,
                };
                ToolResult::success(&call.id, content)
            }
            Err(e) => {
                info!(
                    "Tool {} failed after {:.0}ms: {e}",
                    call.name,
                    elapsed.as_secs_f64() * 1000.0
                );
                ToolResult::error(&call.id, e.render())
            }
        }
    }

    /// Invoke with panic capture and the optional timeout.
    async fn run(&self, tool: &dyn Invocable, call: &ToolInvocation) -> Result<Value, ToolError> {
        // The handler may panic while building its future, or while polling it.
        let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| {
            tool.invoke(call.input.clone())
        })) {
            Ok(fut) => fut,
            Err(payload) => return Err(ToolError::Panicked(panic_message(payload.as_ref()))),
        };
        let guarded = AssertUnwindSafe(fut).catch_unwind();

        let caught = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(caught) => caught,
                Err(_) => return Err(ToolError::Timeout(limit)),
            },
            None => guarded.await,
        };
        caught.unwrap_or_else(|payload| Err(ToolError::Panicked(panic_message(payload.as_ref()))))
    }

    /// Execute calls one after another. Returns one result per call, in order.
    pub async fn execute_all(&self, calls: &[ToolInvocation]) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute(call).await);
        }
        results
    }

    /// Execute calls concurrently. Returns one result per call, in order.
    pub async fn execute_all_concurrent(&self, calls: &[ToolInvocation]) -> Vec<ToolResult> {
        futures::future::join_all(calls.iter().map(|call| self.execute(call))).await
    }
}

fn render_output(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{LocalFn, Param, ToolArgs, tool};
    use serde_json::{Map, json};

    fn call(id: &str, name: &str, input: Value) -> ToolInvocation {
        let input = match input {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        ToolInvocation::new(id, name, input)
    }

    fn add() -> LocalFn {
        LocalFn::new("add", |args: ToolArgs| async move {
            let a: i64 = args.get("a")?;
            let b: i64 = args.get("b")?;
            Ok(a + b)
        })
        .param(Param::new("a").typed("int"))
        .param(Param::new("b").typed("int"))
    }

    fn echo() -> LocalFn {
        LocalFn::new("echo", |args: ToolArgs| async move {
            args.get::<String>("text")
        })
        .param(Param::new("text").typed("str"))
    }

    fn failing() -> LocalFn {
        LocalFn::new("fail", |_args: ToolArgs| async move {
            Err::<Value, _>(ToolError::new("division by zero"))
        })
    }

    fn panicking() -> LocalFn {
        LocalFn::new("boom", |_args: ToolArgs| async move {
            if true {
                panic!("kaboom");
            }
            Ok(Value::Null)
        })
    }

    fn runner() -> ToolRunner {
        ToolRunner::new()
            .with(tool().declare(add()))
            .and_then(|r| r.with(tool().declare(echo())))
            .and_then(|r| r.with(tool().declare(failing())))
            .and_then(|r| r.with(tool().declare(panicking())))
            .unwrap()
    }

    #[tokio::test]
    async fn echo_scenario() {
        let result = runner()
            .execute(&call("t1", "echo", json!({"text": "hi"})))
            .await;
        assert_eq!(result, ToolResult::success("t1", "hi"));
    }

    #[tokio::test]
    async fn non_string_results_are_json() {
        let result = runner()
            .execute(&call("t1", "add", json!({"a": 2, "b": 40})))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.content, "42");
    }

    #[tokio::test]
    async fn object_results_are_compact_json() {
        let mut runner = ToolRunner::new();
        runner
            .register(tool().declare(LocalFn::new("info", |_args: ToolArgs| async move {
                Ok(json!({"city": "Tokyo", "temperature": 22}))
            })))
            .unwrap();
        let result = runner.execute(&call("t1", "info", json!({}))).await;
        let parsed: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(parsed, json!({"city": "Tokyo", "temperature": 22}));
        assert!(!result.content.contains('\n'));
    }

    #[tokio::test]
    async fn missing_tool_scenario() {
        let result = ToolRunner::new()
            .execute(&call("t9", "nope", json!({})))
            .await;
        assert_eq!(result, ToolResult::error("t9", "Unknown tool: nope"));
    }

    #[tokio::test]
    async fn failures_become_error_results() {
        let runner = runner();

        let result = runner.execute(&call("t1", "fail", json!({}))).await;
        assert!(result.is_error);
        assert_eq!(result.content, "Error: ExecutionError: division by zero");

        let result = runner.execute(&call("t2", "add", json!({"a": 1}))).await;
        assert!(result.is_error);
        assert!(result.content.starts_with("Error: MissingArgument:"));

        let result = runner
            .execute(&call("t3", "add", json!({"a": 1, "b": 2, "c": 3})))
            .await;
        assert!(result.content.starts_with("Error: UnexpectedArgument:"));
    }

    #[tokio::test]
    async fn panics_are_contained() {
        let result = runner().execute(&call("t1", "boom", json!({}))).await;
        assert!(result.is_error);
        assert_eq!(result.content, "Error: Panic: kaboom");
    }

    #[tokio::test]
    async fn execute_all_preserves_order_and_cardinality() {
        let calls = vec![
            call("1", "add", json!({"a": 1, "b": 2})),
            call("2", "nope", json!({})),
            call("3", "fail", json!({})),
            call("4", "echo", json!({"text": "last"})),
        ];
        let results = runner().execute_all(&calls).await;
        assert_eq!(results.len(), 4);
        let ids: Vec<_> = results.iter().map(|r| r.tool_use_id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3", "4"]);
        let errors: Vec<_> = results.iter().map(|r| r.is_error).collect();
        assert_eq!(errors, [false, true, true, false]);
        assert_eq!(results[3].content, "last");
    }

    #[tokio::test]
    async fn concurrent_matches_sequential() {
        let calls = vec![
            call("1", "add", json!({"a": 1, "b": 2})),
            call("2", "boom", json!({})),
            call("3", "echo", json!({"text": "x"})),
        ];
        let runner = runner();
        let sequential = runner.execute_all(&calls).await;
        let concurrent = runner.execute_all_concurrent(&calls).await;
        assert_eq!(sequential, concurrent);
    }

    #[tokio::test]
    async fn empty_batch() {
        assert!(runner().execute_all(&[]).await.is_empty());
    }

    #[test]
    fn undeclared_function_is_rejected() {
        let mut runner = ToolRunner::new();
        let err = runner.register(add()).unwrap_err();
        assert!(matches!(err, Error::NotATool { ref name } if name == "add"));
        assert!(runner.is_empty());
    }

    #[tokio::test]
    async fn last_registration_wins_in_place() {
        let mut runner = runner();
        let replacement = LocalFn::new("add2", |_args: ToolArgs| async move { Ok("replaced") });
        runner
            .register(tool().name("add").description("new").declare(replacement))
            .unwrap();

        assert_eq!(runner.len(), 4);
        let names: Vec<_> = runner.names().collect();
        assert_eq!(names, ["add", "echo", "fail", "boom"]);
        assert_eq!(runner.definitions()[0].description, "new");

        let result = runner.execute(&call("t1", "add", json!({}))).await;
        assert_eq!(result.content, "replaced");
    }

    #[test]
    fn definitions_in_registration_order() {
        let defs = runner().definitions();
        let names: Vec<_> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["add", "echo", "fail", "boom"]);
        assert_eq!(defs[0].input_schema["required"], json!(["a", "b"]));
    }

    #[tokio::test]
    async fn arg_validation() {
        let runner = runner().with_arg_validation(true);
        let result = runner
            .execute(&call("t1", "add", json!({"a": "one", "b": 2})))
            .await;
        assert!(result.is_error);
        assert!(result.content.contains("argument validation failed"));

        let result = runner
            .execute(&call("t2", "add", json!({"a": 1, "b": 2})))
            .await;
        assert_eq!(result.content, "3");
    }

    #[tokio::test]
    async fn truncation_is_opt_in() {
        let long = "x".repeat(100);
        let input = json!({"text": long});

        let result = runner().execute(&call("t1", "echo", input.clone())).await;
        assert_eq!(result.content.len(), 100);

        let result = runner()
            .with_max_result_bytes(Some(10))
            .execute(&call("t1", "echo", input))
            .await;
        assert!(result.content.starts_with("xxxxxxxxxx..."));
        assert!(result.content.contains("[truncated: 100 bytes total]"));
    }

    #[tokio::test]
    async fn slow_tools_time_out() {
        let mut runner = ToolRunner::new().with_timeout(Some(Duration::from_millis(20)));
        runner
            .register(tool().declare(LocalFn::new("slow", |_args: ToolArgs| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok("done")
            })))
            .unwrap();
        let result = runner.execute(&call("t1", "slow", json!({}))).await;
        assert!(result.is_error);
        assert!(result.content.starts_with("Error: Timeout:"));
    }

    #[test]
    fn debug_lists_tool_names() {
        let rendered = format!("{:?}", runner());
        assert!(rendered.contains("echo"));
    }
}
