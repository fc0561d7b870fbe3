//! Command registry and dispatch system
//!
//! This module provides a static registry of commands that front ends call
//! by name. Commands are registered as "category.action" (e.g.,
//! "prompts.create", "sync.push") and dispatched to handler functions with
//! the open [`Library`] and a JSON argument object.
//!
//! ## Adding a new command
//!
//! 1. Create handler function: `pub fn my_command(library: &Library, args: Value) -> Result<Value>`
//! 2. Register in `REGISTRY`: `("category.action", my_command as CommandHandler)`
//! 3. Add tests for the command

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::app::Library;
use crate::errors::{LibraryError, Result};

pub mod image;
pub mod library;
pub mod projects;
pub mod prompts;
pub mod sync;

/// Type alias for command handler functions
///
/// All command handlers take the library and a JSON Value (arguments) and
/// return a Result<Value>
pub type CommandHandler = fn(&Library, Value) -> Result<Value>;

/// Static command registry
///
/// Maps command names to handler functions. Initialized lazily on first access.
static REGISTRY: Lazy<HashMap<&'static str, CommandHandler>> = Lazy::new(|| {
    let mut map = HashMap::new();

    // Test command
    map.insert("ping", ping as CommandHandler);

    // Prompts
    map.insert("prompts.list", prompts::list as CommandHandler);
    map.insert("prompts.generic", prompts::generic as CommandHandler);
    map.insert("prompts.for_project", prompts::for_project as CommandHandler);
    map.insert("prompts.search", prompts::search as CommandHandler);
    map.insert("prompts.create", prompts::create as CommandHandler);
    map.insert("prompts.update", prompts::update as CommandHandler);
    map.insert("prompts.delete", prompts::delete as CommandHandler);

    // Projects
    map.insert("projects.list", projects::list as CommandHandler);
    map.insert("projects.create", projects::create as CommandHandler);
    map.insert("projects.update", projects::update as CommandHandler);
    map.insert("projects.delete", projects::delete as CommandHandler);

    // Whole library
    map.insert("library.export", library::export as CommandHandler);
    map.insert("library.import", library::import as CommandHandler);

    // Images
    map.insert("image.compress", image::compress as CommandHandler);

    // Remote sync
    map.insert("sync.verify", sync::verify as CommandHandler);
    map.insert("sync.set_token", sync::set_token as CommandHandler);
    map.insert("sync.clear_token", sync::clear_token as CommandHandler);
    map.insert("sync.push", sync::push as CommandHandler);
    map.insert("sync.pull", sync::pull as CommandHandler);
    map.insert("sync.status", sync::status as CommandHandler);

    map
});

/// Dispatch a command by name
///
/// # Arguments
/// * `library` - The open library
/// * `command` - Command name (e.g., "ping", "prompts.list")
/// * `args` - Command arguments as JSON Value
///
/// # Returns
/// Command result as JSON Value, or error if command not found
pub fn dispatch(library: &Library, command: &str, args: Value) -> Result<Value> {
    match REGISTRY.get(command) {
        Some(handler) => handler(library, args),
        None => Err(LibraryError::CommandNotFound(command.to_string())),
    }
}

/// Dispatch and fold errors into an error object
///
/// Errors come back as `{"error": true, "message": ..., "category": ...}`
/// so front ends always receive JSON.
pub fn call(library: &Library, command: &str, args: Value) -> Value {
    match dispatch(library, command, args) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(command, error = %e, "Command failed");
            error_object(&e)
        },
    }
}

/// Error object handed to front ends
pub fn error_object(err: &LibraryError) -> Value {
    json!({
        "error": true,
        "message": err.user_message(),
        "category": err.category(),
    })
}

/// List all available commands
///
/// Returns a sorted list of all registered command names.
pub fn list_commands() -> Vec<String> {
    let mut commands: Vec<String> = REGISTRY.keys().map(|&k| k.to_string()).collect();
    commands.sort();
    commands
}

// ============================================================================
// Argument helpers
// ============================================================================

/// Deserialize the whole argument object into `T`
pub(crate) fn parse_args<T: DeserializeOwned>(command: &str, args: Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| invalid(command, e.to_string()))
}

/// Required, non-blank string argument
pub(crate) fn required_str(command: &str, args: &Value, key: &str) -> Result<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| invalid(command, format!("missing '{}'", key)))
}

/// Split `args` into its `id` and the remaining fields
pub(crate) fn take_id(command: &str, args: Value) -> Result<(String, Value)> {
    let id = required_str(command, &args, "id")?;
    let rest = match args {
        Value::Object(mut map) => {
            map.remove("id");
            Value::Object(map)
        },
        _ => json!({}),
    };
    Ok((id, rest))
}

pub(crate) fn invalid(command: &str, reason: impl Into<String>) -> LibraryError {
    LibraryError::InvalidArgs {
        command: command.to_string(),
        reason:  reason.into(),
    }
}

/// Reject a blank required text field
pub(crate) fn non_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LibraryError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

// ============================================================================
// Test Commands
// ============================================================================

/// Ping command - simple test to verify command dispatch works
///
/// Returns the input arguments with an added "pong" field.
///
/// # Example
/// ```json
/// // Input:  {"message": "hello"}
/// // Output: {"message": "hello", "pong": true}
/// ```
fn ping(_library: &Library, args: Value) -> Result<Value> {
    let mut result = match args {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };

    result.insert("pong".to_string(), Value::Bool(true));
    Ok(Value::Object(result))
}
