//! Tool registry - maps tool names to validated handlers
//!
//! Built once at session construction and read-only afterwards, so the
//! receiver task can dispatch without synchronization. Arguments arrive
//! as untyped key/value data and are checked against the declared schema
//! before any handler runs.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::Result;
use crate::model::{ToolInvocationRequest, ToolInvocationResult};

/// Declared type of a single tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Number,
    String,
    Boolean,
}

impl ParamKind {
    const fn schema_type(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

/// One declared parameter of a tool
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamSpec {
    #[must_use]
    pub const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    #[must_use]
    pub const fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Declaration advertised to the model at connect time
#[derive(Debug, Clone)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

impl ToolDeclaration {
    /// JSON schema for the declared parameters
    #[must_use]
    pub fn parameter_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.params {
            properties.insert(
                param.name.to_string(),
                json!({ "type": param.kind.schema_type() }),
            );
            if param.required {
                required.push(Value::String(param.name.to_string()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// A locally registered tool implementation
///
/// Handlers are closed over safe state only (no session internals) so they
/// can be invoked from the receiver task.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool with schema-checked arguments
    ///
    /// # Errors
    ///
    /// Returns error on validation or persistence failure; the registry
    /// converts it into a failure result
    async fn invoke(&self, call_id: &str, args: &Map<String, Value>) -> Result<Value>;
}

struct ToolEntry {
    declaration: ToolDeclaration,
    handler: Box<dyn ToolHandler>,
}

/// Static mapping from tool name to handler
#[derive(Default)]
pub struct ToolRegistry {
    entries: HashMap<String, ToolEntry>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; a later registration under the same name replaces
    /// the earlier one
    pub fn register(&mut self, declaration: ToolDeclaration, handler: Box<dyn ToolHandler>) {
        self.entries.insert(
            declaration.name.clone(),
            ToolEntry {
                declaration,
                handler,
            },
        );
    }

    /// Declarations for the setup frame
    #[must_use]
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.entries
            .values()
            .map(|entry| entry.declaration.clone())
            .collect()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dispatch one invocation to its handler
    ///
    /// Always produces a result: unknown names, schema mismatches, and
    /// handler faults become failure results so the session always has
    /// something to send back.
    pub async fn dispatch(&self, request: &ToolInvocationRequest) -> ToolInvocationResult {
        let Some(entry) = self.entries.get(&request.name) else {
            tracing::warn!(tool = %request.name, "unknown tool requested");
            return ToolInvocationResult::failure(
                &request.call_id,
                &request.name,
                format!("no such tool: {}", request.name),
            );
        };

        if let Err(problem) = validate_arguments(&entry.declaration, &request.arguments) {
            tracing::warn!(tool = %request.name, %problem, "tool arguments rejected");
            return ToolInvocationResult::failure(&request.call_id, &request.name, problem);
        }

        match entry.handler.invoke(&request.call_id, &request.arguments).await {
            Ok(payload) => ToolInvocationResult::success(&request.call_id, &request.name, payload),
            Err(e) => {
                tracing::warn!(tool = %request.name, error = %e, "tool handler failed");
                ToolInvocationResult::failure(&request.call_id, &request.name, e.to_string())
            }
        }
    }
}

/// Check supplied arguments against the declared schema
fn validate_arguments(
    declaration: &ToolDeclaration,
    args: &Map<String, Value>,
) -> std::result::Result<(), String> {
    for param in &declaration.params {
        match args.get(param.name) {
            None if param.required => {
                return Err(format!("missing required argument: {}", param.name));
            }
            None => {}
            Some(value) => {
                if !param.kind.matches(value) {
                    return Err(format!(
                        "argument {} must be a {}",
                        param.name,
                        param.kind.schema_type()
                    ));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    struct EchoHandler;

    #[async_trait]
    impl ToolHandler for EchoHandler {
        async fn invoke(&self, _call_id: &str, args: &Map<String, Value>) -> Result<Value> {
            Ok(Value::Object(args.clone()))
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl ToolHandler for FailingHandler {
        async fn invoke(&self, _call_id: &str, _args: &Map<String, Value>) -> Result<Value> {
            Err(Error::Tool("boom".to_string()))
        }
    }

    fn echo_declaration() -> ToolDeclaration {
        ToolDeclaration {
            name: "echo".to_string(),
            description: "echoes its arguments".to_string(),
            params: vec![
                ParamSpec::required("amount", ParamKind::Number),
                ParamSpec::optional("note", ParamKind::String),
            ],
        }
    }

    fn request(name: &str, args: Value) -> ToolInvocationRequest {
        let Value::Object(arguments) = args else {
            panic!("args must be an object");
        };
        ToolInvocationRequest {
            call_id: "call-1".to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    #[tokio::test]
    async fn dispatches_to_registered_handler() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_declaration(), Box::new(EchoHandler));

        let result = registry
            .dispatch(&request("echo", json!({"amount": 3})))
            .await;

        assert!(result.is_success());
        assert_eq!(result.call_id, "call-1");
        assert_eq!(result.payload["amount"], 3);
    }

    #[tokio::test]
    async fn unknown_tool_is_a_failure_result() {
        let registry = ToolRegistry::new();

        let result = registry
            .dispatch(&request("delete_everything", json!({})))
            .await;

        assert!(!result.is_success());
        assert_eq!(result.call_id, "call-1");
        assert!(result.payload["error"]
            .as_str()
            .unwrap()
            .contains("no such tool"));
    }

    #[tokio::test]
    async fn missing_required_argument_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_declaration(), Box::new(EchoHandler));

        let result = registry.dispatch(&request("echo", json!({}))).await;

        assert!(!result.is_success());
        assert!(result.payload["error"]
            .as_str()
            .unwrap()
            .contains("missing required argument"));
    }

    #[tokio::test]
    async fn wrong_argument_type_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_declaration(), Box::new(EchoHandler));

        let result = registry
            .dispatch(&request("echo", json!({"amount": "three"})))
            .await;

        assert!(!result.is_success());
        assert!(result.payload["error"]
            .as_str()
            .unwrap()
            .contains("must be a number"));
    }

    #[tokio::test]
    async fn handler_fault_becomes_failure_result() {
        let mut registry = ToolRegistry::new();
        registry.register(
            ToolDeclaration {
                name: "flaky".to_string(),
                description: "always fails".to_string(),
                params: vec![],
            },
            Box::new(FailingHandler),
        );

        let result = registry.dispatch(&request("flaky", json!({}))).await;

        assert!(!result.is_success());
        assert!(result.payload["error"].as_str().unwrap().contains("boom"));
    }

    #[test]
    fn parameter_schema_lists_required_keys() {
        let schema = echo_declaration().parameter_schema();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["amount"]["type"], "number");
        assert_eq!(schema["required"], json!(["amount"]));
    }
}
