//! Tool registry.
//!
//! Tools are collected as `(export key, definition)` candidates and
//! validated on registration. Invalid candidates are skipped and reported,
//! never fatal: the server starts with whatever subset registered.

pub mod chat;

use async_trait::async_trait;
use serde_json::Value;
use sluice_types::{ToolDescriptor, ToolOutput};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Error returned by a tool handler.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),
}

impl From<crate::chat::ChatError> for ToolError {
    fn from(err: crate::chat::ChatError) -> Self {
        ToolError::Failed(err.to_string())
    }
}

/// Error from [`ToolRegistry::call`].
#[derive(Debug, thiserror::Error)]
pub enum ToolCallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool failed: {0}")]
    Failed(String),
}

impl From<ToolError> for ToolCallError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::InvalidArguments(reason) => ToolCallError::InvalidArguments(reason),
            ToolError::Failed(reason) => ToolCallError::Failed(reason),
        }
    }
}

/// Executes one tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> Result<ToolOutput, ToolError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ToolOutput, ToolError>> + Send + 'static,
{
    async fn call(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        (self.0)(arguments).await
    }
}

/// Wrap an async closure as a tool handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ToolOutput, ToolError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// A candidate tool. Every field is optional so that incomplete candidates
/// can be represented and rejected at registration time.
#[derive(Clone, Default)]
pub struct ToolDefinition {
    pub name: Option<String>,
    pub description: Option<String>,
    pub schema: Option<Value>,
    pub handler: Option<Arc<dyn ToolHandler>>,
}

impl ToolDefinition {
    /// A complete definition.
    pub fn new(name: impl Into<String>, schema: Value, handler: Arc<dyn ToolHandler>) -> Self {
        Self {
            name: Some(name.into()),
            description: None,
            schema: Some(schema),
            handler: Some(handler),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check the candidate is usable, returning the reason if not.
    fn validate(&self) -> Result<(String, Value, Arc<dyn ToolHandler>), &'static str> {
        let name = match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err("missing name"),
        };
        let schema = match &self.schema {
            Some(schema @ Value::Object(_)) => schema.clone(),
            Some(_) => return Err("schema is not a JSON object"),
            None => return Err("missing schema"),
        };
        let handler = self.handler.clone().ok_or("missing handler")?;
        Ok((name, schema, handler))
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: Arc<dyn ToolHandler>,
}

/// Registered tools in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.descriptor.name == name)
    }

    /// Descriptors for `tools/list`.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor.clone()).collect()
    }

    /// Invoke a tool by name.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<ToolOutput, ToolCallError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.descriptor.name == name)
            .ok_or_else(|| ToolCallError::UnknownTool(name.to_string()))?;

        debug!("Calling tool {}", name);
        Ok(tool.handler.call(arguments).await?)
    }
}

/// Outcome of [`register_tools`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    pub registered: usize,
    /// Export keys of the candidates that were skipped.
    pub skipped: Vec<String>,
}

/// Validate and register candidate tools.
///
/// A candidate registers when it has a non-empty name, an object schema and
/// a handler, and its name is not already taken. Anything else is skipped.
pub fn register_tools<I>(registry: &mut ToolRegistry, candidates: I) -> RegistrationReport
where
    I: IntoIterator<Item = (String, ToolDefinition)>,
{
    let mut report = RegistrationReport::default();
    let mut seen: HashSet<String> = registry
        .tools
        .iter()
        .map(|t| t.descriptor.name.clone())
        .collect();

    for (key, definition) in candidates {
        let (name, schema, handler) = match definition.validate() {
            Ok(parts) => parts,
            Err(reason) => {
                debug!("Skipping tool export {}: {}", key, reason);
                report.skipped.push(key);
                continue;
            }
        };

        if !seen.insert(name.clone()) {
            debug!("Skipping tool export {}: name {} already registered", key, name);
            report.skipped.push(key);
            continue;
        }

        info!(
            "Registered tool: {} - {}",
            name,
            definition.description.as_deref().unwrap_or("(no description)")
        );
        registry.tools.push(RegisteredTool {
            descriptor: ToolDescriptor {
                name,
                description: definition.description,
                input_schema: schema,
            },
            handler,
        });
        report.registered += 1;
    }

    if report.registered == 0 {
        warn!("No tools registered. Check that tool definitions have a name, schema and handler");
    }
    if !report.skipped.is_empty() {
        warn!("Skipped invalid tool definitions: {}", report.skipped.join(", "));
    }

    report
}
