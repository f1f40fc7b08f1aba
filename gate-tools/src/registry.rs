//! Runtime registry for tool metadata and execution.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use gate_primitives::{Arguments, TrustLevel};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::executor::ConcurrencyExecutor;
use crate::invocation::{ExecutionResult, ToolCall, ToolFailure, ToolOutput, error_codes};
use crate::schema::ToolSchema;

/// Result alias for registry operations.
pub type ToolResult<T> = Result<T, ToolError>;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Static description of a registered tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolMetadata {
    name: String,
    description: Option<String>,
    schema: ToolSchema,
    destructive: bool,
    required_trust: Option<TrustLevel>,
    timeout: Option<Duration>,
}

impl ToolMetadata {
    /// Creates metadata for the supplied tool name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidMetadata`] if the name is empty.
    pub fn new(name: impl Into<String>) -> ToolResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ToolError::InvalidMetadata {
                reason: "tool name cannot be empty".into(),
            });
        }

        Ok(Self {
            name,
            description: None,
            schema: ToolSchema::empty(),
            destructive: false,
            required_trust: None,
            timeout: None,
        })
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the argument schema.
    #[must_use]
    pub fn with_schema(mut self, schema: ToolSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Flags the tool as destructive, requiring confirmation when enabled.
    #[must_use]
    pub fn destructive(mut self, destructive: bool) -> Self {
        self.destructive = destructive;
        self
    }

    /// Overrides the minimum trust level needed for unconfirmed calls.
    #[must_use]
    pub fn with_required_trust(mut self, level: TrustLevel) -> Self {
        self.required_trust = Some(level);
        self
    }

    /// Sets a per-tool deadline, overriding the registry default.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the argument schema.
    #[must_use]
    pub fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    /// Returns `true` when the tool was registered as destructive.
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        self.destructive
    }

    /// Returns the minimum trust level for unconfirmed calls.
    ///
    /// Defaults to [`TrustLevel::Verified`], or [`TrustLevel::Trusted`] for
    /// destructive tools.
    #[must_use]
    pub fn required_trust(&self) -> TrustLevel {
        self.required_trust_for(self.destructive)
    }

    /// Returns the minimum trust level as if the destructive flag were
    /// `destructive`. An explicit requirement always wins.
    #[must_use]
    pub fn required_trust_for(&self, destructive: bool) -> TrustLevel {
        self.required_trust.unwrap_or(if destructive {
            TrustLevel::Trusted
        } else {
            TrustLevel::Verified
        })
    }

    /// Returns the per-tool deadline, if one was set.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Renders a listing descriptor for protocol consumers.
    #[must_use]
    pub fn descriptor(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.schema.to_json(),
            "destructive": self.destructive,
        })
    }
}

/// Trait implemented by tool handlers.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Invokes the tool with keyword arguments, returning a JSON value.
    async fn invoke(&self, arguments: Arguments) -> ToolOutput;
}

#[async_trait]
impl<F, Fut> Tool for F
where
    F: Send + Sync + Fn(Arguments) -> Fut,
    Fut: Future<Output = ToolOutput> + Send,
{
    async fn invoke(&self, arguments: Arguments) -> ToolOutput {
        (self)(arguments).await
    }
}

/// A registered tool: immutable metadata plus its handler.
#[derive(Clone)]
pub struct ToolEntry {
    metadata: ToolMetadata,
    handler: Arc<dyn Tool>,
}

impl std::fmt::Debug for ToolEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolEntry")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl ToolEntry {
    /// Pairs metadata with a handler.
    #[must_use]
    pub fn new<T>(metadata: ToolMetadata, handler: T) -> Self
    where
        T: Tool + 'static,
    {
        Self {
            metadata,
            handler: Arc::new(handler),
        }
    }

    /// Returns the associated metadata.
    #[must_use]
    pub fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    /// Invokes the handler directly, without validation or deadline.
    ///
    /// # Errors
    ///
    /// Propagates the handler's [`ToolFailure`].
    pub async fn invoke(&self, arguments: Arguments) -> ToolOutput {
        self.handler.invoke(arguments).await
    }
}

#[derive(Default)]
struct Catalog {
    order: Vec<String>,
    entries: HashMap<String, ToolEntry>,
}

/// Registry that owns the tool catalog and executes calls against it.
///
/// Lookups take a short read lock and clone the entry out, so concurrent
/// executions never hold the catalog lock while a handler runs.
pub struct ToolRegistry {
    catalog: RwLock<Catalog>,
    executor: ConcurrencyExecutor,
    default_timeout: Duration,
    timeout_overrides: HashMap<String, Duration>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self {
            catalog: RwLock::default(),
            executor: ConcurrencyExecutor::default(),
            default_timeout: DEFAULT_TIMEOUT,
            timeout_overrides: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("registered", &self.read().order)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl ToolRegistry {
    /// Creates an empty registry with default executor and timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the executor used to run handlers.
    #[must_use]
    pub fn with_executor(mut self, executor: ConcurrencyExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// Sets the deadline applied to tools without their own timeout.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Sets an operator override for one tool's deadline.
    ///
    /// Overrides win over the timeout declared in the tool's metadata.
    #[must_use]
    pub fn with_timeout_override(mut self, name: impl Into<String>, timeout: Duration) -> Self {
        self.timeout_overrides.insert(name.into(), timeout);
        self
    }

    /// Returns the executor running handlers.
    #[must_use]
    pub fn executor(&self) -> &ConcurrencyExecutor {
        &self.executor
    }

    /// Returns the default deadline.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    fn read(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Catalog> {
        self.catalog.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a tool implementation.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if the name is already present;
    /// use [`ToolRegistry::replace`] to overwrite deliberately.
    pub fn register<T>(&self, metadata: ToolMetadata, tool: T) -> ToolResult<()>
    where
        T: Tool + 'static,
    {
        let mut catalog = self.write();
        let name = metadata.name().to_owned();
        if catalog.entries.contains_key(&name) {
            return Err(ToolError::DuplicateTool { name });
        }

        debug!(tool = %name, destructive = metadata.is_destructive(), "tool registered");
        catalog.order.push(name.clone());
        catalog.entries.insert(name, ToolEntry::new(metadata, tool));
        Ok(())
    }

    /// Registers or overwrites a tool, returning the previous entry.
    ///
    /// An overwritten tool keeps its original listing position.
    pub fn replace<T>(&self, metadata: ToolMetadata, tool: T) -> Option<ToolEntry>
    where
        T: Tool + 'static,
    {
        let mut catalog = self.write();
        let name = metadata.name().to_owned();
        let previous = catalog
            .entries
            .insert(name.clone(), ToolEntry::new(metadata, tool));
        if previous.is_none() {
            catalog.order.push(name.clone());
        }
        debug!(tool = %name, overwritten = previous.is_some(), "tool replaced");
        previous
    }

    /// Removes a tool from the registry.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] when the name is not registered.
    pub fn unregister(&self, name: &str) -> ToolResult<ToolEntry> {
        let mut catalog = self.write();
        let entry = catalog
            .entries
            .remove(name)
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_owned(),
            })?;
        catalog.order.retain(|existing| existing != name);
        debug!(tool = %name, "tool unregistered");
        Ok(entry)
    }

    /// Removes every tool, returning how many were registered.
    pub fn clear(&self) -> usize {
        let mut catalog = self.write();
        let removed = catalog.order.len();
        catalog.order.clear();
        catalog.entries.clear();
        removed
    }

    /// Returns the entry matching the supplied name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ToolEntry> {
        self.read().entries.get(name).cloned()
    }

    /// Returns the metadata of the named tool.
    #[must_use]
    pub fn metadata(&self, name: &str) -> Option<ToolMetadata> {
        self.read()
            .entries
            .get(name)
            .map(|entry| entry.metadata.clone())
    }

    /// Returns `true` when a tool with the name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.read().entries.contains_key(name)
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().order.len()
    }

    /// Returns `true` when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().order.is_empty()
    }

    /// Lists tool names in registration order.
    #[must_use]
    pub fn list_tools(&self) -> Vec<String> {
        self.read().order.clone()
    }

    /// Lists the metadata of all registered tools in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<ToolMetadata> {
        let catalog = self.read();
        catalog
            .order
            .iter()
            .filter_map(|name| catalog.entries.get(name))
            .map(|entry| entry.metadata.clone())
            .collect()
    }

    /// Resolves the deadline for a tool: operator override, then the tool's
    /// own timeout, then the registry default.
    #[must_use]
    pub fn timeout_for(&self, metadata: &ToolMetadata) -> Duration {
        self.timeout_overrides
            .get(metadata.name())
            .copied()
            .or(metadata.timeout())
            .unwrap_or(self.default_timeout)
    }

    /// Executes a call, never raising past the registry boundary.
    ///
    /// Unknown tools, schema violations, handler errors, panics, and timeouts
    /// all come back as [`ExecutionResult`] failures.
    pub async fn execute(&self, call: ToolCall) -> ExecutionResult {
        let started = Instant::now();
        let (name, arguments) = call.into_parts();

        let Some(entry) = self.get(&name) else {
            debug!(tool = %name, "execute called for unregistered tool");
            let failure = ToolFailure::new(
                error_codes::TOOL_NOT_FOUND,
                format!("tool `{name}` is not registered"),
            );
            return ExecutionResult::failure(name, failure, started.elapsed());
        };

        if let Err(violations) = entry.metadata().schema().validate(&arguments) {
            debug!(tool = %name, violations = violations.len(), "argument validation failed");
            let failure = ToolFailure::new(error_codes::VALIDATION, violations.join("; "));
            return ExecutionResult::failure(name, failure, started.elapsed());
        }

        let deadline = self.timeout_for(entry.metadata());
        let output = self.executor.run(entry, arguments, deadline).await;
        let elapsed = started.elapsed();

        match output {
            Ok(data) => ExecutionResult::success(name, data, elapsed),
            Err(failure) => {
                debug!(tool = %name, error_code = failure.code(), "tool call failed");
                ExecutionResult::failure(name, failure, elapsed)
            }
        }
    }
}

/// Errors produced by tool registration.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool metadata failed validation.
    #[error("invalid tool metadata: {reason}")]
    InvalidMetadata {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Schema document could not be interpreted.
    #[error("invalid tool schema: {reason}")]
    InvalidSchema {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Tool name collided with an existing registration.
    #[error("tool `{name}` is already registered")]
    DuplicateTool {
        /// Name of the offending tool.
        name: String,
    },

    /// Requested tool does not exist.
    #[error("tool `{name}` is not registered")]
    UnknownTool {
        /// Name of the missing tool.
        name: String,
    },
}
