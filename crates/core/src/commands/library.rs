//! Whole-library export and import

use serde_json::{json, Value};

use super::required_str;
use crate::app::Library;
use crate::errors::Result;

/// Serialize the library as a pretty-printed document
pub fn export(library: &Library, _args: Value) -> Result<Value> {
    let data = library.store().export_snapshot()?;
    Ok(json!({ "data": data }))
}

/// Replace the library with an exported document
///
/// A document that fails to parse leaves the library untouched and reports
/// `success: false`.
pub fn import(library: &Library, args: Value) -> Result<Value> {
    let raw = required_str("library.import", &args, "data")?;
    let success = library.store().import_snapshot(&raw);
    Ok(json!({
        "success": success,
        "prompts": library.store().prompt_count(),
        "projects": library.store().projects().len(),
    }))
}
