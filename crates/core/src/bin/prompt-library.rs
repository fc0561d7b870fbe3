//! Command-line front end
//!
//! ```text
//! prompt-library <command> [json-args]
//! prompt-library help
//! ```
//!
//! Prints the command result (or an error object) as JSON on stdout. Logs go
//! to stderr, filtered by `PROMPT_LIBRARY_LOG`.

use anyhow::Context;
use serde_json::{json, Value};

use prompt_library_core::{commands, logging, runtime, Config, Library};

fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    logging::init(&config.log_filter);

    let mut args = std::env::args().skip(1);
    let command = match args.next() {
        Some(command) if command != "help" && command != "--help" => command,
        _ => {
            print_help();
            return Ok(());
        },
    };
    let command_args: Value = match args.next() {
        Some(raw) => serde_json::from_str(&raw).context("arguments must be a JSON value")?,
        None => json!({}),
    };

    let library = Library::open(&config)?;
    let startup = runtime::block_on(library.start());
    tracing::debug!(?startup, "Library started");

    let output = commands::call(&library, &command, command_args);

    // Push anything the command changed before exiting
    runtime::block_on(library.shutdown());

    println!("{}", serde_json::to_string_pretty(&output)?);
    if output.get("error") == Some(&Value::Bool(true)) {
        std::process::exit(1);
    }
    Ok(())
}

fn print_help() {
    println!("Usage: prompt-library <command> [json-args]\n");
    println!("Commands:");
    for name in commands::list_commands() {
        println!("  {}", name);
    }
}
