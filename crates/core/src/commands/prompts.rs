use serde::Deserialize;
use serde_json::{json, Value};

use super::{non_blank, parse_args, required_str, take_id};
use crate::app::Library;
use crate::errors::{LibraryError, Result};
use crate::model::{known_category_opt, normalize_tags, NewPrompt, PromptCategory, PromptPatch};

#[derive(Debug, Deserialize)]
struct SearchArgs {
    #[serde(default)]
    term:     String,
    #[serde(default, deserialize_with = "known_category_opt")]
    category: Option<PromptCategory>,
}

pub fn list(library: &Library, _args: Value) -> Result<Value> {
    Ok(json!({ "prompts": library.store().prompts() }))
}

pub fn generic(library: &Library, _args: Value) -> Result<Value> {
    Ok(json!({ "prompts": library.store().generic_prompts() }))
}

pub fn for_project(library: &Library, args: Value) -> Result<Value> {
    let project_id = required_str("prompts.for_project", &args, "projectId")?;
    Ok(json!({ "prompts": library.store().prompts_for_project(&project_id) }))
}

pub fn search(library: &Library, args: Value) -> Result<Value> {
    let args: SearchArgs = parse_args("prompts.search", args)?;
    Ok(json!({ "prompts": library.store().search(&args.term, args.category) }))
}

pub fn create(library: &Library, args: Value) -> Result<Value> {
    let mut draft: NewPrompt = parse_args("prompts.create", args)?;
    non_blank("title", &draft.title)?;
    non_blank("content", &draft.content)?;
    draft.tags = normalize_tags(&draft.tags);
    if let Some(project_id) = &draft.project_id {
        ensure_project(library, project_id)?;
    }

    let prompt = library.store().add_prompt(draft);
    Ok(json!(prompt))
}

pub fn update(library: &Library, args: Value) -> Result<Value> {
    let (id, rest) = take_id("prompts.update", args)?;
    let mut patch: PromptPatch = parse_args("prompts.update", rest)?;
    if let Some(title) = &patch.title {
        non_blank("title", title)?;
    }
    if let Some(content) = &patch.content {
        non_blank("content", content)?;
    }
    if let Some(tags) = patch.tags.take() {
        patch.tags = Some(normalize_tags(&tags));
    }
    if let Some(Some(project_id)) = &patch.project_id {
        ensure_project(library, project_id)?;
    }

    match library.store().update_prompt(&id, patch) {
        Some(prompt) => Ok(json!({ "updated": true, "prompt": prompt })),
        None => Ok(json!({ "updated": false })),
    }
}

pub fn delete(library: &Library, args: Value) -> Result<Value> {
    let id = required_str("prompts.delete", &args, "id")?;
    Ok(json!({ "deleted": library.store().delete_prompt(&id) }))
}

fn ensure_project(library: &Library, project_id: &str) -> Result<()> {
    if library.store().project(project_id).is_none() {
        return Err(LibraryError::Validation(format!(
            "project '{}' does not exist",
            project_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{dispatch, test_support::library};

    fn create_prompt(lib: &Library, title: &str, extra: Value) -> Value {
        let mut args = json!({"title": title, "content": "body", "category": "chat"});
        if let (Value::Object(base), Value::Object(extra)) = (&mut args, extra) {
            base.extend(extra);
        }
        dispatch(lib, "prompts.create", args).unwrap()
    }

    #[test]
    fn test_create_normalizes_tags() {
        let lib = library();
        let prompt = create_prompt(&lib, "Greeting", json!({"tags": [" Hello ", "hello", "WORLD"]}));

        assert_eq!(prompt["tags"], json!(["hello", "world"]));
        assert_eq!(prompt["category"], json!("chat"));
        assert!(prompt["id"].as_str().is_some());
    }

    #[test]
    fn test_create_rejects_blank_title() {
        let lib = library();
        let err = dispatch(
            &lib,
            "prompts.create",
            json!({"title": "  ", "content": "x", "category": "code"}),
        )
        .unwrap_err();
        assert_eq!(err.category(), "validation");
        assert!(lib.store().prompts().is_empty());
    }

    #[test]
    fn test_create_rejects_unknown_category() {
        let lib = library();
        let err = dispatch(
            &lib,
            "prompts.create",
            json!({"title": "t", "content": "x", "category": "audio"}),
        )
        .unwrap_err();
        assert_eq!(err.category(), "arguments");
    }

    #[test]
    fn test_create_rejects_missing_project() {
        let lib = library();
        let err = dispatch(
            &lib,
            "prompts.create",
            json!({"title": "t", "content": "x", "category": "code", "projectId": "nope"}),
        )
        .unwrap_err();
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn test_update_and_delete() {
        let lib = library();
        let created = create_prompt(&lib, "Old", json!({}));
        let id = created["id"].as_str().unwrap();

        let updated = dispatch(&lib, "prompts.update", json!({"id": id, "title": "New"})).unwrap();
        assert_eq!(updated["updated"], json!(true));
        assert_eq!(updated["prompt"]["title"], json!("New"));
        assert_eq!(updated["prompt"]["createdAt"], created["createdAt"]);

        let deleted = dispatch(&lib, "prompts.delete", json!({"id": id})).unwrap();
        assert_eq!(deleted["deleted"], json!(true));
        assert!(lib.store().prompts().is_empty());
    }

    #[test]
    fn test_update_missing_id_is_noop() {
        let lib = library();
        create_prompt(&lib, "Keep", json!({}));

        let result = dispatch(&lib, "prompts.update", json!({"id": "ghost", "title": "x"})).unwrap();
        assert_eq!(result["updated"], json!(false));
        assert_eq!(lib.store().prompts()[0].title, "Keep");
    }

    #[test]
    fn test_update_rejects_unknown_field() {
        let lib = library();
        let created = create_prompt(&lib, "A", json!({}));
        let id = created["id"].as_str().unwrap();

        let err = dispatch(&lib, "prompts.update", json!({"id": id, "createdAt": "x"})).unwrap_err();
        assert_eq!(err.category(), "arguments");
    }

    #[test]
    fn test_search_and_filters() {
        let lib = library();
        let project = dispatch(&lib, "projects.create", json!({"name": "P1"})).unwrap();
        let project_id = project["id"].as_str().unwrap();

        create_prompt(&lib, "Sunset", json!({"category": "image", "projectId": project_id}));
        create_prompt(&lib, "Refactor", json!({"category": "code", "tags": ["rust"]}));

        let found = dispatch(&lib, "prompts.search", json!({"term": "RUST"})).unwrap();
        assert_eq!(found["prompts"].as_array().unwrap().len(), 1);

        let images = dispatch(&lib, "prompts.search", json!({"category": "image"})).unwrap();
        assert_eq!(images["prompts"][0]["title"], json!("Sunset"));

        let generic = dispatch(&lib, "prompts.generic", json!({})).unwrap();
        assert_eq!(generic["prompts"][0]["title"], json!("Refactor"));

        let scoped = dispatch(&lib, "prompts.for_project", json!({"projectId": project_id})).unwrap();
        assert_eq!(scoped["prompts"][0]["title"], json!("Sunset"));

        let all = dispatch(&lib, "prompts.list", json!({})).unwrap();
        assert_eq!(all["prompts"].as_array().unwrap().len(), 2);
    }
}
