use std::path::Path;

use anyhow::Result;
use binsim_core::config::SearchConfig;
use binsim_core::loader::{load_program_file, LoadOptions};
use binsim_core::normalize::Normalizer;

use crate::load_catalog;

/// Print the normalized functions of an IR document as JSON.
pub fn normalize_command(input: &str, config: &SearchConfig) -> Result<()> {
    let catalog = load_catalog(config)?;
    let normalizer = Normalizer::new(&catalog);
    let options = LoadOptions {
        ignore_placeholder_names: config.ignore_placeholder_names,
        lenient: config.lenient,
    };
    let records = load_program_file(Path::new(input), &normalizer, options)?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
