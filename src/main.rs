//! Command-line entry point.
//!
//! Dispatches to a lazily-fetched HTTP source or a local file, then lists
//! or extracts entries according to the flags.

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use lazyzip::{ArchiveEntry, Cli, LocalFile, ReadAt, ZipExtractor, open_remote};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.is_http_url() {
        let extractor = open_remote(cli.file.clone(), cli.lazy_options()).await?;
        run(&extractor, &cli).await?;

        if !cli.is_quiet() {
            let fetched = extractor.reader().fetched_bytes();
            let total = extractor.reader().len();
            eprintln!(
                "\nTransferred {} of {}",
                format_size(fetched),
                format_size(total)
            );
        }
    } else {
        let reader = Arc::new(LocalFile::open(Path::new(&cli.file))?);
        run(&ZipExtractor::new(reader), &cli).await?;
    }

    Ok(())
}

/// List or extract according to the flags.
async fn run<R: ReadAt + 'static>(extractor: &ZipExtractor<R>, cli: &Cli) -> Result<()> {
    if cli.list || cli.verbose {
        return list_entries(extractor, cli.verbose).await;
    }

    let entries = extractor.entries().await?;
    let selected: Vec<_> = entries.iter().filter(|e| cli.selects(e)).collect();

    let banner = cli.pipe && selected.len() > 1;
    for entry in selected {
        extract_entry(extractor, entry, cli, banner).await?;
    }

    Ok(())
}

/// Print the archive's contents, one line per entry; `-v` adds sizes,
/// compression ratio and timestamps plus a summary line.
async fn list_entries<R: ReadAt + 'static>(extractor: &ZipExtractor<R>, verbose: bool) -> Result<()> {
    let entries = extractor.entries().await?;

    if !verbose {
        for entry in &entries {
            println!("{}", entry.file_name);
        }
        return Ok(());
    }

    println!(
        "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Date", "Time"
    );
    println!("{}", "-".repeat(70));

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in &entries {
        let (year, month, day) = entry.mod_date();
        let (hour, minute, _) = entry.mod_time();

        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            year,
            month,
            day,
            hour,
            minute,
            entry.file_name
        );

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    println!(
        "{:>10}  {:>10}  {}  {:>21}  {} files",
        total_uncompressed,
        total_compressed,
        ratio(total_compressed, total_uncompressed),
        "",
        file_count
    );

    Ok(())
}

/// Percentage saved by compression, right-aligned to five columns.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed == 0 {
        return "  0%".to_string();
    }
    format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
}

/// Extract a single entry, honoring pipe/exdir/junk-path/overwrite flags.
async fn extract_entry<R: ReadAt + 'static>(
    extractor: &ZipExtractor<R>,
    entry: &ArchiveEntry,
    cli: &Cli,
    banner: bool,
) -> Result<()> {
    if cli.pipe {
        if banner {
            use tokio::io::AsyncWriteExt;
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(format!("--- {} ---\n", entry.file_name).as_bytes())
                .await?;
        }
        return extractor.extract_to_stdout(entry).await;
    }

    let output_path = output_path(entry, cli);

    if output_path.exists() {
        if !cli.overwrite {
            if !cli.is_quiet() {
                let hint = if cli.never_overwrite {
                    "file exists"
                } else {
                    "use -o to overwrite"
                };
                eprintln!("Skipping: {} ({hint})", entry.file_name);
            }
            return Ok(());
        }
        // -o: fall through and replace.
    }

    if !cli.is_quiet() {
        println!("  extracting: {}", entry.file_name);
    }

    extractor.extract_to_file(entry, &output_path).await
}

/// Where an entry lands on disk: `-d` prefixes a directory, `-j` strips
/// the archive-internal path.
fn output_path(entry: &ArchiveEntry, cli: &Cli) -> PathBuf {
    let file_name = if cli.junk_paths {
        Path::new(&entry.file_name)
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| entry.file_name.clone())
    } else {
        entry.file_name.clone()
    };

    match &cli.extract_dir {
        Some(dir) => PathBuf::from(dir).join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Human-readable byte count.
fn format_size(size: u64) -> String {
    if size < 1024 {
        return format!("{size} bytes");
    }
    let mut value = size as f64;
    let mut unit = "";
    for next in ["KB", "MB", "GB"] {
        value /= 1024.0;
        unit = next;
        if value < 1024.0 {
            break;
        }
    }
    format!("{value:.2} {unit}")
}
