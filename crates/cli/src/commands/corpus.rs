use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use binsim_core::config::SearchConfig;
use binsim_core::normalize::Normalizer;
use binsim_core::services::corpus::{export_corpus, write_vocabulary};

use crate::load_catalog;

/// Write the tab-separated training corpus for every IR document in `input_dir`,
/// and optionally its token frequencies.
pub fn export_corpus_command(
    input_dir: &str,
    output: &str,
    vocabulary: Option<&str>,
    config: &SearchConfig,
) -> Result<()> {
    let catalog = load_catalog(config)?;
    let normalizer = Normalizer::new(&catalog);

    let file = File::create(output)
        .with_context(|| format!("Failed to create corpus file: {output}"))?;
    let mut writer = BufWriter::new(file);
    let summary = export_corpus(Path::new(input_dir), &normalizer, &mut writer)?;
    writer.flush().with_context(|| format!("Failed to write corpus file: {output}"))?;

    if let Some(path) = vocabulary {
        let file = File::create(path)
            .with_context(|| format!("Failed to create vocabulary file: {path}"))?;
        let mut writer = BufWriter::new(file);
        write_vocabulary(&summary.vocabulary, &mut writer)
            .and_then(|_| writer.flush())
            .with_context(|| format!("Failed to write vocabulary file: {path}"))?;
    }

    println!("Exported corpus:");
    println!("  Files: {}", summary.files);
    println!("  Functions: {}", summary.functions);
    println!("  Vocabulary: {}", summary.vocabulary.len());
    println!("  Output: {output}");
    if let Some(path) = vocabulary {
        println!("  Vocabulary file: {path}");
    }

    Ok(())
}
