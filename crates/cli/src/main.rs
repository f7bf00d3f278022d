use std::path::PathBuf;

use anyhow::Result;
use binsim::commands::{
    export_corpus_command, ingest_command, list_oracles_command, normalize_command,
    query_command, store_info_command,
};
use binsim::{init_tracing, resolve_config, ConfigOverrides};
use clap::{Args, Parser, Subcommand};

/// Binary-code similarity search over normalized decompiler output.
///
/// This CLI is a thin wrapper around `binsim-core` (exposed in code as `binsim_core`).
/// All substantive logic lives in the library so it can be tested thoroughly
/// and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "binsim",
    version,
    about = "Binary-code similarity search over decompiled functions",
    long_about = None
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Options shared by commands that load IR documents or run an oracle.
#[derive(Args, Debug, Clone, Default)]
struct RunArgs {
    /// JSON or YAML config file. Flags below override its values.
    #[arg(long)]
    config: Option<String>,

    /// Newline-delimited list of known library exports.
    #[arg(long)]
    symbols: Option<PathBuf>,

    /// Records per oracle call.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Embedding oracle to use (see `list-oracles`).
    #[arg(long)]
    oracle: Option<String>,

    /// Skip malformed subroutines instead of failing.
    #[arg(long, default_value_t = false)]
    lenient: bool,
}

impl RunArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            batch_size: self.batch_size,
            symbols: self.symbols.clone(),
            oracle: self.oracle.clone(),
            lenient: self.lenient,
            ..ConfigOverrides::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add the named functions of an IR document to a fingerprint store.
    ///
    /// Functions with decompiler placeholder names (`FUN_...`) are skipped
    /// unless `--include-placeholders` is given.
    Ingest {
        /// Store directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        store: String,

        /// IR document (JSON) to ingest.
        #[arg(long)]
        input: String,

        /// Skip functions whose token stream is already stored.
        #[arg(long, default_value_t = false)]
        dedupe: bool,

        /// Also ingest functions with placeholder names.
        #[arg(long, default_value_t = false)]
        include_placeholders: bool,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Rank the stored corpus against every function of an IR document.
    Query {
        /// Store directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        store: String,

        /// IR document (JSON) holding the query functions.
        #[arg(long)]
        input: String,

        /// Where to write the JSON report.
        #[arg(long, default_value = "results.json")]
        output: String,

        /// Keep only the best N matches per query.
        #[arg(long)]
        top_k: Option<usize>,

        /// Drop matches scoring below this similarity.
        #[arg(long)]
        min_sim: Option<f32>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Print the normalized functions of an IR document as JSON.
    Normalize {
        /// IR document (JSON) to normalize.
        #[arg(long)]
        input: String,

        /// Skip functions with placeholder names, as ingestion does.
        #[arg(long, default_value_t = false)]
        named_only: bool,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Write a tab-separated training corpus from a directory of IR documents.
    ///
    /// Documents must be named `<binary>-<arch>-<compiler>-<optlevel>.json`.
    ExportCorpus {
        /// Directory of IR documents.
        #[arg(long)]
        input_dir: String,

        /// Corpus file to write.
        #[arg(long)]
        output: String,

        /// Also write token frequencies (`token<TAB>count`) to this file.
        #[arg(long)]
        vocabulary: Option<String>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Show size, schema version and ingestion history of a store.
    StoreInfo {
        /// Store directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        store: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List the embedding oracles available under the current config.
    ListOracles {
        /// JSON or YAML config file.
        #[arg(long)]
        config: Option<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Ingest { store, input, dedupe, include_placeholders, json, run } => {
            let overrides = ConfigOverrides { dedupe, include_placeholders, ..run.overrides() };
            let config = resolve_config(run.config.as_deref(), &overrides)?;
            ingest_command(&store, &input, &config, json)?
        }
        Command::Query { store, input, output, top_k, min_sim, run } => {
            let overrides =
                ConfigOverrides { top_k, minimum_similarity: min_sim, ..run.overrides() };
            let config = resolve_config(run.config.as_deref(), &overrides)?;
            query_command(&store, &input, &output, &config)?
        }
        Command::Normalize { input, named_only, run } => {
            let mut config = resolve_config(run.config.as_deref(), &run.overrides())?;
            config.ignore_placeholder_names = named_only;
            normalize_command(&input, &config)?
        }
        Command::ExportCorpus { input_dir, output, vocabulary, run } => {
            let config = resolve_config(run.config.as_deref(), &run.overrides())?;
            export_corpus_command(&input_dir, &output, vocabulary.as_deref(), &config)?
        }
        Command::StoreInfo { store, json } => store_info_command(&store, json)?,
        Command::ListOracles { config, json } => {
            let config = resolve_config(config.as_deref(), &ConfigOverrides::default())?;
            list_oracles_command(&config, json)?
        }
    }

    Ok(())
}
