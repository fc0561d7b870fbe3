//! Remote sync commands
//!
//! Manual push and pull require a token verified in this session and report
//! their failures, unlike background sync.

use serde_json::{json, Value};

use super::required_str;
use crate::app::Library;
use crate::errors::Result;
use crate::runtime;

/// Check a token against GitHub, storing it when accepted
pub fn verify(library: &Library, args: Value) -> Result<Value> {
    let token = required_str("sync.verify", &args, "token")?;
    let valid = runtime::block_on(library.sync().verify_credential(&token))?;
    Ok(json!({ "valid": valid }))
}

/// Store a token without verifying it; background sync will use it
pub fn set_token(library: &Library, args: Value) -> Result<Value> {
    let token = required_str("sync.set_token", &args, "token")?;
    library.sync().set_credential(&token)?;
    Ok(json!({ "success": true }))
}

pub fn clear_token(library: &Library, _args: Value) -> Result<Value> {
    library.sync().clear_credential()?;
    Ok(json!({ "success": true }))
}

pub fn push(library: &Library, _args: Value) -> Result<Value> {
    let (prompts, projects) = runtime::block_on(library.sync().manual_push())?;
    Ok(json!({ "prompts": prompts, "projects": projects }))
}

pub fn pull(library: &Library, _args: Value) -> Result<Value> {
    let outcome = runtime::block_on(library.sync().manual_pull())?;
    Ok(json!(outcome))
}

pub fn status(library: &Library, _args: Value) -> Result<Value> {
    let sync = library.sync();
    Ok(json!({
        "state": sync.state(),
        "configured": sync.is_configured(),
        "verified": sync.is_verified(),
        "pendingPush": sync.has_pending_push(),
    }))
}
