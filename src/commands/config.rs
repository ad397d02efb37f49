//! Config command handlers: show effective configuration.

use anyhow::Result;

use super::context::{load_config, resolve_db_path};
use crate::cli::Args;

pub fn run_config_show_command(args: &Args) -> Result<()> {
    let loaded = load_config(args)?;

    let resolved_path = loaded.path.as_ref().map_or_else(
        || "<unresolved>".to_string(),
        |path| path.display().to_string(),
    );
    println!("config_path = {resolved_path}");
    println!(
        "config_file = {}",
        if loaded.loaded_from_file {
            "loaded"
        } else {
            "not found (using defaults)"
        }
    );
    println!("database_path = {}", resolve_db_path(args, &loaded).display());
    println!();
    print!("{}", loaded.config.to_redacted_toml());

    Ok(())
}
