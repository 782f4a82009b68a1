//! Plain-text report.
//!
//! ```text
//! 3 files, 12.0 KiB each  af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262
//!   /data/a.bin
//!   /data/b.bin
//!   /data/nested/c.bin
//!
//! 1 path could not be processed:
//!   [list] /data/locked: Permission denied (os error 13)
//!
//! 4 files hashed (36.0 KiB) in 3 directories: 1 duplicate group, 2 redundant files, 24.0 KiB reclaimable
//! ```

use std::io::Write;

use bytesize::ByteSize;

use crate::duplicates::{DuplicateGroup, ScanReport};
use crate::scanner::FileDigest;

/// Human-readable rendering of a [`ScanReport`].
#[derive(Debug, Clone, Copy)]
pub struct TextOutput<'a> {
    report: &'a ScanReport,
    show_all: bool,
}

impl<'a> TextOutput<'a> {
    /// Render `report`; with `show_all`, files without duplicates are listed too.
    #[must_use]
    pub fn new(report: &'a ScanReport, show_all: bool) -> Self {
        Self { report, show_all }
    }

    fn groups(&self) -> impl Iterator<Item = &'a DuplicateGroup> + 'a {
        let show_all = self.show_all;
        let report: &'a ScanReport = self.report;
        report
            .groups
            .iter()
            .filter(move |g| show_all || g.is_duplicate())
    }

    /// Write the full report.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let mut any_group = false;
        for group in self.groups() {
            any_group = true;
            write_group(writer, group)?;
        }
        if !any_group {
            writeln!(writer, "No duplicate files found.")?;
        }

        let errors = &self.report.errors;
        if !errors.is_empty() {
            writeln!(writer)?;
            writeln!(
                writer,
                "{} could not be processed:",
                plural(errors.len(), "path", "paths")
            )?;
            for err in errors {
                let reason = std::error::Error::source(err)
                    .map_or_else(|| "cancelled".to_string(), ToString::to_string);
                writeln!(writer, "  [{}] {}: {}", err.kind(), err.path().display(), reason)?;
            }
        }

        let s = &self.report.summary;
        writeln!(writer)?;
        writeln!(
            writer,
            "{} hashed ({}) in {}: {}, {}, {} reclaimable ({:.2?})",
            plural(s.files_hashed, "file", "files"),
            ByteSize(s.bytes_hashed),
            plural(s.directories_scanned, "directory", "directories"),
            plural(s.duplicate_groups, "duplicate group", "duplicate groups"),
            plural(s.duplicate_files, "redundant file", "redundant files"),
            ByteSize(s.reclaimable_space),
            s.scan_duration,
        )
    }

    /// Render the report into a string.
    #[must_use]
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn write_group<W: Write>(writer: &mut W, group: &DuplicateGroup) -> std::io::Result<()> {
    writeln!(
        writer,
        "{}, {} each  {}",
        plural(group.len(), "file", "files"),
        ByteSize(group.size),
        group.fingerprint
    )?;
    for path in &group.paths {
        writeln!(writer, "  {}", path.display())?;
    }
    writeln!(writer)
}

/// Write `hash` subcommand results, one `<fingerprint>  <size>  <path>` line per file.
///
/// # Errors
///
/// Returns any error from the underlying writer.
pub fn write_digests<'p, W, I>(writer: &mut W, digests: I) -> std::io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = (&'p std::path::Path, &'p FileDigest)>,
{
    for (path, digest) in digests {
        writeln!(
            writer,
            "{}  {:>10}  {}",
            digest.fingerprint,
            digest.size,
            path.display()
        )?;
    }
    Ok(())
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}
