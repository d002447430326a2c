use std::path::Path;

use clap::Parser;

use crate::lazy::LazyOptions;
use crate::zip::ArchiveEntry;

#[derive(Parser, Debug)]
#[command(name = "lazyzip")]
#[command(version)]
#[command(about = "List and extract remote ZIP archives without downloading them", long_about = None)]
#[command(after_help = "Examples:\n  \
  lazyzip -l https://example.com/archive.zip      list a remote archive\n  \
  lazyzip archive.zip '*.txt' -d out              extract matching files into out/\n  \
  lazyzip -p data.zip report.csv | less           pipe one file to stdout")]
pub struct Cli {
    /// ZIP file path or HTTP(S) URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Files to extract (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Probe window size in KiB for remote archives
    #[arg(long = "chunk-size", value_name = "KIB", default_value_t = 10)]
    pub chunk_size_kib: u64,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn lazy_options(&self) -> LazyOptions {
        LazyOptions {
            chunk_size: self.chunk_size_kib.max(1) * 1024,
        }
    }

    /// Whether `entry` should be extracted under the current flags.
    ///
    /// Directories never extract (they are created on demand); positional
    /// FILES arguments narrow the selection; `-x` patterns drop matches.
    pub fn selects(&self, entry: &ArchiveEntry) -> bool {
        if entry.is_directory {
            return false;
        }

        if !self.files.is_empty() {
            let wanted = self.files.iter().any(|want| {
                if has_glob_chars(want) {
                    glob_match(want, &entry.file_name)
                } else {
                    let basename = Path::new(&entry.file_name)
                        .file_name()
                        .map(|s| s.to_string_lossy())
                        .unwrap_or_default();
                    entry.file_name == *want || basename == *want
                }
            });
            if !wanted {
                return false;
            }
        }

        !self
            .exclude
            .iter()
            .any(|x| entry.file_name.contains(x.as_str()) || glob_match(x, &entry.file_name))
    }
}

fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Glob matching with `*` (any run of characters) and `?` (exactly one).
///
/// Iterative two-pointer matcher: on a mismatch after a `*`, back up to
/// the star and let it swallow one more character.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while t < txt.len() {
        if p < pat.len() && (pat[p] == '?' || pat[p] == txt[t]) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == '*' {
            star = Some(p);
            mark = t;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }
    pat[p..].iter().all(|&c| c == '*')
}
