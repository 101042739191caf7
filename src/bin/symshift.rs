//! CLI front-end: `extract`, `apply`, `remap-jar`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};

use symshift::error::{Error, Result};
use symshift::mapping::{binary, text, FastMappings};
use symshift::orchestrate::{hash::hash_tree, jar::remap_jar, source::apply_tree};
use symshift::ranges::{codec, RangeMap};

#[derive(Parser)]
#[command(name = "symshift", about = "Renames classes, fields and methods across Java source trees and class files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Hash a source tree against an existing range map, skipping files whose
    /// content hasn't changed. Source-reference discovery itself is an
    /// external analyser's job; this only maintains the incremental gate.
    Extract {
        source_dir: PathBuf,
        range_map: PathBuf,
        /// OS-path-separator-delimited classpath (`:` on Unix, `;` on Windows).
        #[arg(short = 'p', long = "cp")]
        classpath: Option<String>,
        #[arg(long)]
        cache: Option<PathBuf>,
        #[arg(long)]
        rebuild: bool,
    },
    /// Apply a range map's recorded renames across a source tree.
    Apply {
        src_dir: PathBuf,
        out_dir: PathBuf,
        range_map: PathBuf,
        mappings: PathBuf,
    },
    /// Remap every class file's constant pool inside a jar.
    RemapJar {
        input_jar: PathBuf,
        output_jar: PathBuf,
        mappings: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(Error::Command(msg)) => {
            eprintln!("{}", msg);
            ExitCode::FAILURE
        }
        Err(other) => {
            error!("fatal: {}", other);
            panic!("{}", other);
        }
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Extract { source_dir, range_map, classpath, cache, rebuild } => {
            let classpath: Vec<PathBuf> = classpath
                .as_deref()
                .map(|cp| std::env::split_paths(cp).collect())
                .unwrap_or_default();
            extract(&source_dir, &range_map, &classpath, cache.as_deref(), rebuild)
        }
        Command::Apply { src_dir, out_dir, range_map, mappings } => {
            let range_map = load_range_map(&range_map)?;
            let mappings = load_mappings(&mappings)?;
            apply_tree(&src_dir, &out_dir, &range_map, &mappings)
        }
        Command::RemapJar { input_jar, output_jar, mappings } => {
            let mappings = load_mappings(&mappings)?;
            remap_jar(&input_jar, &output_jar, &mappings)
        }
    }
}

fn extract(
    source_dir: &Path,
    range_map_path: &Path,
    classpath: &[PathBuf],
    cache: Option<&Path>,
    rebuild: bool,
) -> Result<()> {
    if !classpath.is_empty() {
        info!("classpath has {} entries (forwarded to the external analyser)", classpath.len());
    }
    if let Some(cache) = cache {
        info!("using analyser cache directory {:?}", cache);
    }

    let existing = if rebuild {
        RangeMap::empty()
    } else {
        match std::fs::File::open(range_map_path) {
            Ok(f) => codec::read_range_map(std::io::BufReader::new(f))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RangeMap::empty(),
            Err(e) => return Err(Error::Io(e)),
        }
    };

    let fresh_hashes = hash_tree(source_dir)?;
    let stale: Vec<&String> = fresh_hashes.keys()
        .filter(|relpath| !existing.has_hash(relpath, &fresh_hashes[*relpath]))
        .collect();
    info!(
        "{}/{} files changed since the last extraction and need re-analysis",
        stale.len(), fresh_hashes.len()
    );

    let mut partial_fields = symshift::parse::FnvIndexMap::default();
    let partial_methods = symshift::parse::FnvIndexMap::default();
    for relpath in &stale {
        partial_fields.entry((*relpath).clone()).or_insert_with(Vec::new);
    }
    let partial = RangeMap::new(partial_fields, partial_methods, fresh_hashes)?;
    let updated = existing.update(&partial);

    let out = std::fs::File::create(range_map_path)?;
    codec::write_range_map(&updated, std::io::BufWriter::new(out))?;
    Ok(())
}

fn load_range_map(path: &Path) -> Result<RangeMap> {
    let f = std::fs::File::open(path)?;
    codec::read_range_map(std::io::BufReader::new(f))
}

fn load_mappings(path: &Path) -> Result<FastMappings> {
    let bytes = std::fs::read(path)?;
    if bytes.starts_with(b"SuperSrg binary mappings") {
        binary::read_mappings(std::io::Cursor::new(bytes))
    } else {
        let text_content = String::from_utf8(bytes)
            .map_err(|_| Error::Command("mappings file is neither binary nor valid UTF-8 text".into()))?;
        text::parse_compact_lines(text_content.lines())
    }
}
