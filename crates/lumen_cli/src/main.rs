//! Maintenance CLI for the per-application override store.
//!
//! # Responsibility
//! - Inspect and edit the `module`/`bypass` entries the layer records.
//! - Print the layer identity and built-in workaround defaults.

use lumen_core::bypass::{BYPASS_KEY, MODULE_KEY};
use lumen_core::{OverrideStore, SqliteOverrideStore, WorkaroundConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let outcome = match args.as_slice() {
        [] => identity(),
        ["show", db, application] => show(db, application),
        ["bypass", db, application, value] => set_bypass(db, application, value),
        _ => Err(usage()),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn usage() -> String {
    [
        "usage:",
        "  lumen                             print layer identity and defaults",
        "  lumen show <db> <application>     print the application's overrides",
        "  lumen bypass <db> <application> <0|1>  set the application's bypass flag",
    ]
    .join("\n")
}

fn identity() -> Result<(), String> {
    println!("layer={}", lumen_core::LAYER_NAME);
    println!("version={}", lumen_core::core_version());
    let defaults = serde_json::to_string_pretty(&WorkaroundConfig::default())
        .map_err(|err| format!("cannot render workaround defaults: {err}"))?;
    println!("{defaults}");
    Ok(())
}

fn open(db: &str) -> Result<SqliteOverrideStore, String> {
    SqliteOverrideStore::open(db).map_err(|err| format!("cannot open override store `{db}`: {err}"))
}

fn show(db: &str, application: &str) -> Result<(), String> {
    let store = open(db)?;
    let module = store
        .get_string(application, MODULE_KEY)
        .map_err(|err| format!("cannot read module entry: {err}"))?;
    let bypass = store
        .get_flag(application, BYPASS_KEY)
        .map_err(|err| format!("cannot read bypass flag: {err}"))?;

    println!("application={application}");
    println!("module={}", module.as_deref().unwrap_or("<unrecorded>"));
    println!("bypass={}", bypass.unwrap_or(0));
    Ok(())
}

fn set_bypass(db: &str, application: &str, value: &str) -> Result<(), String> {
    let flag: i64 = match value {
        "0" => 0,
        "1" => 1,
        other => return Err(format!("bypass flag must be 0 or 1, got `{other}`")),
    };

    let store = open(db)?;
    store
        .set_flag(application, BYPASS_KEY, flag)
        .map_err(|err| format!("cannot write bypass flag: {err}"))?;
    println!("application={application} bypass={flag}");
    Ok(())
}
