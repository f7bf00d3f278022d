use anyhow::Result;
use binsim_core::config::SearchConfig;
use binsim_core::services::oracle::default_oracle_registry;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct OracleInfo {
    pub name: String,
    pub description: String,
    pub selected: bool,
}

/// List the embedding oracles available under the given config.
pub fn list_oracles_command(config: &SearchConfig, json: bool) -> Result<()> {
    let registry = default_oracle_registry(&config.oracle);
    let entries: Vec<OracleInfo> = registry
        .names()
        .into_iter()
        .map(|name| {
            let description = match name.as_str() {
                "hashing" => format!(
                    "Built-in feature-hashing embedder ({} dimensions)",
                    config.oracle.dimensions
                ),
                "command" => format!("External model process: {}", config.oracle.command.join(" ")),
                other => format!("Oracle '{other}'"),
            };
            let selected = name == config.oracle.kind;
            OracleInfo { name, description, selected }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("Oracles:");
    for entry in entries {
        let marker = if entry.selected { " (selected)" } else { "" };
        println!("- {}{}: {}", entry.name, marker, entry.description);
    }

    Ok(())
}
