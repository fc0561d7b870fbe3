use serde_json::{json, Value};

use super::{non_blank, parse_args, required_str, take_id};
use crate::app::Library;
use crate::errors::Result;
use crate::model::{NewProject, ProjectPatch};

/// Projects with the number of prompts attached to each
pub fn list(library: &Library, _args: Value) -> Result<Value> {
    let store = library.store();
    let projects: Vec<Value> = store
        .projects()
        .into_iter()
        .map(|project| {
            let prompt_count = store.prompts_for_project(&project.id).len();
            let mut value = json!(project);
            value["promptCount"] = json!(prompt_count);
            value
        })
        .collect();
    Ok(json!({ "projects": projects }))
}

pub fn create(library: &Library, args: Value) -> Result<Value> {
    let draft: NewProject = parse_args("projects.create", args)?;
    non_blank("name", &draft.name)?;
    Ok(json!(library.store().add_project(draft)))
}

pub fn update(library: &Library, args: Value) -> Result<Value> {
    let (id, rest) = take_id("projects.update", args)?;
    let patch: ProjectPatch = parse_args("projects.update", rest)?;
    if let Some(name) = &patch.name {
        non_blank("name", name)?;
    }

    match library.store().update_project(&id, patch) {
        Some(project) => Ok(json!({ "updated": true, "project": project })),
        None => Ok(json!({ "updated": false })),
    }
}

/// Delete a project; its prompts stay and become generic
pub fn delete(library: &Library, args: Value) -> Result<Value> {
    let id = required_str("projects.delete", &args, "id")?;
    Ok(json!({ "deleted": library.store().delete_project(&id) }))
}
