/// Failure inside a tool call. Never escapes the dispatcher: it is rendered
/// into an error [`ToolResult`](crate::ToolResult) as `Error: <Kind>: <message>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("missing required argument '{0}'")]
    MissingArgument(String),

    #[error("invalid value for argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    /// The input as a whole could not be read as the tool's argument type.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unexpected argument '{0}'")]
    UnexpectedArgument(String),

    #[error("{0}")]
    Execution(String),

    #[error("failed to serialize result: {0}")]
    Serialization(String),

    #[error("{0}")]
    Panicked(String),

    #[error("did not finish within {}s", .0.as_secs_f64())]
    Timeout(std::time::Duration),
}

impl ToolError {
    /// A plain execution failure.
    pub fn new(message: impl Into<String>) -> Self {
        ToolError::Execution(message.into())
    }

    /// Short name of the failure class, used as the `<Kind>` in rendered results.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::MissingArgument(_) => "MissingArgument",
            ToolError::InvalidArgument { .. } => "InvalidArgument",
            ToolError::InvalidInput(_) => "InvalidInput",
            ToolError::UnexpectedArgument(_) => "UnexpectedArgument",
            ToolError::Execution(_) => "ExecutionError",
            ToolError::Serialization(_) => "SerializationError",
            ToolError::Panicked(_) => "Panic",
            ToolError::Timeout(_) => "Timeout",
        }
    }

    /// Content of the error result sent back to the model.
    pub fn render(&self) -> String {
        format!("Error: {}: {self}", self.kind())
    }
}

impl From<std::io::Error> for ToolError {
    fn from(e: std::io::Error) -> Self {
        ToolError::Execution(e.to_string())
    }
}

impl From<String> for ToolError {
    fn from(message: String) -> Self {
        ToolError::Execution(message)
    }
}

impl From<&str> for ToolError {
    fn from(message: &str) -> Self {
        ToolError::Execution(message.to_string())
    }
}
