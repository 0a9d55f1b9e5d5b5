//! CRLF to LF normalization for source trees
//!
//! Every file under the configured roots whose extension matches is read in
//! full, has each `\r\n` collapsed to `\n`, and is written back in place.
//! Files are rewritten even when nothing changed. A lone `\r` is left alone.

use anyhow::Result;
use std::borrow::Cow;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use crate::config::NormalizeConfig;
use crate::error_helpers;
use crate::interrupt::{self, Outcome};
use crate::walker;

/// Collapse every `\r\n` into `\n`.
///
/// Returns the converted bytes (borrowed when there was nothing to do) and
/// the number of sequences replaced.
pub fn normalize_bytes(input: &[u8]) -> (Cow<'_, [u8]>, usize) {
    let replaced = input.windows(2).filter(|pair| *pair == b"\r\n").count();
    if replaced == 0 {
        return (Cow::Borrowed(input), 0);
    }

    let mut output = Vec::with_capacity(input.len() - replaced);
    let mut bytes = input.iter().peekable();
    while let Some(&byte) = bytes.next() {
        if byte == b'\r' && bytes.peek() == Some(&&b'\n') {
            continue;
        }
        output.push(byte);
    }

    (Cow::Owned(output), replaced)
}

/// Totals for one normalization run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    /// Files visited (and rewritten, unless dry run)
    pub files: usize,
    /// Files that contained at least one CRLF
    pub changed: usize,
    /// CRLF sequences replaced across all files
    pub sequences: usize,
}

pub struct Normalizer {
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
    dry_run: bool,
}

impl Normalizer {
    pub fn new(config: &NormalizeConfig) -> Self {
        Self {
            roots: config.roots.clone(),
            extensions: config.extensions.clone(),
            dry_run: false,
        }
    }

    /// Report what would change without writing anything
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn matches(&self, path: &Path) -> bool {
        walker::has_extension(path, &self.extensions)
    }

    /// Normalize one file in place. Returns the number of CRLFs replaced.
    pub fn normalize_file(&self, path: &Path) -> Result<usize> {
        let content = fs::read(path).map_err(|e| {
            let message = error_helpers::io_error(path, "reading", &e);
            anyhow::Error::new(e).context(message)
        })?;

        let (normalized, replaced) = normalize_bytes(&content);

        if !self.dry_run {
            fs::write(path, &normalized).map_err(|e| {
                let message = error_helpers::io_error(path, "writing", &e);
                anyhow::Error::new(e).context(message)
            })?;
        }

        tracing::debug!("{}: {} CRLF sequence(s) replaced", path.display(), replaced);
        Ok(replaced)
    }

    /// Walk every root and normalize matching files, writing one line per
    /// file to `out`. Stops between files once `interrupted` is set.
    pub fn run(&self, interrupted: &AtomicBool, out: &mut impl Write) -> Result<Outcome<NormalizeReport>> {
        let mut report = NormalizeReport::default();

        for root in &self.roots {
            tracing::info!("Normalizing line endings under {}", root.display());

            for entry in walker::walk_files(root, &[]) {
                if interrupt::is_set(interrupted) {
                    tracing::info!("Interrupted after {} file(s)", report.files);
                    return Ok(Outcome::Interrupted(report));
                }

                let entry = entry?;
                let path = entry.path();
                if !self.matches(path) {
                    continue;
                }

                if self.dry_run {
                    let replaced = self.normalize_file(path)?;
                    if replaced > 0 {
                        writeln!(out, "{} ({} CRLF)", path.display(), replaced)?;
                    }
                    report.record(replaced);
                    continue;
                }

                writeln!(out, "{}", path.display())?;
                let replaced = self.normalize_file(path)?;
                report.record(replaced);
            }
        }

        Ok(Outcome::Completed(report))
    }
}

impl NormalizeReport {
    fn record(&mut self, replaced: usize) {
        self.files += 1;
        if replaced > 0 {
            self.changed += 1;
        }
        self.sequences += replaced;
    }
}
