//! Human-readable output.
//!
//! Colors come from yansi and are switched off globally by the binary when
//! stdout is not a terminal or `--no-color` is given.

use std::io::{self, Write};
use std::path::Path;

use bytesize::ByteSize;
use chrono::{DateTime, Utc};
use yansi::{Color, Paint, Style};

use crate::duplicates::DupeCandidate;
use crate::hashing::{FolderComparison, VerifyState};
use crate::scanner::listing::matching_sizes;
use crate::scanner::{EntryKind, ListingEntry, ScanReport};
use crate::tree::{Category, TreeRow};

const HEADER: Style = Style::new().fg(Color::BrightWhite).bold();
const MATCHED: Style = Style::new().fg(Color::Black).bg(Color::White).bold();

/// Color for a score, stepping up at 20/35/50/70/90 percent.
#[must_use]
pub fn score_style(score: f64) -> Style {
    if score < 0.2 {
        Style::new().fg(Color::BrightBlack)
    } else if score < 0.35 {
        Style::new().fg(Color::Red)
    } else if score < 0.5 {
        Style::new().fg(Color::Cyan)
    } else if score < 0.7 {
        Style::new().fg(Color::Yellow)
    } else if score < 0.9 {
        Style::new().fg(Color::BrightGreen)
    } else {
        Style::new().fg(Color::BrightWhite).bg(Color::Fixed(28)).bold()
    }
}

/// Whole percent, truncated.
#[must_use]
pub fn percent(score: f64) -> u32 {
    (score.clamp(0.0, 1.0) * 100.0 + 1e-6) as u32
}

fn category_style(category: Category) -> Style {
    match category {
        Category::Dupe => Style::new().fg(Color::BrightGreen),
        Category::Unique => Style::new().fg(Color::BrightBlack),
        Category::MixedUniqueBelow => Style::new().fg(Color::Yellow),
        Category::MixedDupeBelow => Style::new().fg(Color::Cyan),
        Category::Inconsistent => Style::new().fg(Color::Red).bold(),
    }
}

/// Scan problems, written once before scoring.
///
/// # Errors
///
/// Propagates write errors.
pub fn write_scan_problems<W: Write + ?Sized>(w: &mut W, report: &ScanReport) -> io::Result<()> {
    for mount in &report.skipped_mounts {
        writeln!(w, "skipped mountpoint {}", mount.display())?;
    }
    if report.errors.is_empty() {
        return Ok(());
    }
    writeln!(
        w,
        "{}",
        format!("{} folder(s) could not be read:", report.errors.len()).red()
    )?;
    for err in &report.errors {
        writeln!(w, "  {}", err)?;
    }
    Ok(())
}

/// The dupe set, grouped under a header per first folder.
///
/// A new header is printed whenever the first folder changes from the
/// previous candidate, so the grouping follows pair-generation order.
///
/// # Errors
///
/// Propagates write errors.
pub fn write_summary<W: Write + ?Sized>(w: &mut W, dupes: &[DupeCandidate]) -> io::Result<()> {
    let mut last_lhs: Option<&Path> = None;
    for (index, dupe) in dupes.iter().enumerate() {
        let lhs = dupe.a.path();
        if last_lhs != Some(lhs) {
            last_lhs = Some(lhs);
            writeln!(w)?;
            writeln!(w, "{:5}{}", "", lhs.display().paint(HEADER))?;
        }
        let label = format!("{:3}%", percent(dupe.score));
        writeln!(
            w,
            "{:>4} {} {:>10}  {}",
            index,
            label.paint(score_style(dupe.score)),
            ByteSize(dupe.overlap().hit_bytes).to_string(),
            dupe.b.path().display()
        )?;
    }
    writeln!(w)?;
    writeln!(w, "{} candidate pair(s)", dupes.len())
}

/// The flattened dupe tree.
///
/// # Errors
///
/// Propagates write errors.
pub fn write_tree<W: Write + ?Sized>(w: &mut W, rows: &[TreeRow]) -> io::Result<()> {
    for row in rows {
        let indent = "  ".repeat(row.depth);
        let name = format!("{}{}", indent, row.name);
        let scores = if row.smax <= 0.0 {
            String::new()
        } else {
            format!("{:3}..{:3}%", percent(row.smin.max(0.0)), percent(row.smax))
        };
        let own = row
            .scur
            .map(|s| format!(" own {:3}%", percent(s)))
            .unwrap_or_default();
        let size = if row.cumulative_dupesize > 0 {
            ByteSize(row.cumulative_dupesize).to_string()
        } else {
            String::new()
        };
        writeln!(
            w,
            "{:<50} {:<12} {:>10}{} {:>10}",
            name,
            row.category.label().paint(category_style(row.category)),
            scores,
            own,
            size
        )?;
    }
    Ok(())
}

fn state_style(state: VerifyState) -> Style {
    match state {
        VerifyState::Verified => Style::new().fg(Color::BrightGreen).bold(),
        VerifyState::Partial => Style::new().fg(Color::Yellow),
        VerifyState::Pending | VerifyState::NotRequested => Style::new().fg(Color::BrightBlack),
        VerifyState::Mismatched | VerifyState::Failed => Style::new().fg(Color::Red).bold(),
    }
}

/// Label for a verification state.
#[must_use]
pub fn state_label(state: VerifyState) -> &'static str {
    match state {
        VerifyState::NotRequested => "not hashed",
        VerifyState::Pending => "pending",
        VerifyState::Verified => "verified",
        VerifyState::Partial => "partial",
        VerifyState::Mismatched => "mismatched",
        VerifyState::Failed => "failed",
    }
}

/// One verified candidate.
///
/// # Errors
///
/// Propagates write errors.
pub fn write_comparison<W: Write + ?Sized>(
    w: &mut W,
    index: usize,
    keep: &Path,
    other: &Path,
    cmp: &FolderComparison,
) -> io::Result<()> {
    let state = cmp.state();
    writeln!(
        w,
        "[{}] {}  {} matched, {} only in keep, {} only in other",
        index,
        state_label(state).paint(state_style(state)),
        cmp.matched.len(),
        cmp.unmatched_keep.len(),
        cmp.unmatched_other.len()
    )?;
    writeln!(w, "  keep  {}", keep.display())?;
    writeln!(w, "  other {}", other.display())?;
    for (k, o) in &cmp.matched {
        if k == o {
            writeln!(w, "    = {}", k.to_string_lossy())?;
        } else {
            writeln!(w, "    = {}  ->  {}", k.to_string_lossy(), o.to_string_lossy())?;
        }
    }
    for name in &cmp.unmatched_keep {
        writeln!(w, "    < {}", name.to_string_lossy())?;
    }
    for name in &cmp.unmatched_other {
        writeln!(w, "    > {}", name.to_string_lossy())?;
    }
    if cmp.failed > 0 {
        writeln!(w, "    {} file(s) could not be hashed", cmp.failed)?;
    }
    Ok(())
}

fn format_day(mtime: u64) -> String {
    let secs = (mtime / 1_000_000_000) as i64;
    let nanos = (mtime % 1_000_000_000) as u32;
    DateTime::<Utc>::from_timestamp(secs, nanos)
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "?".repeat(10))
}

const META_WIDTH: usize = 22;

/// Lines of one panel, each exactly `width` visible columns.
fn panel(entries: &[ListingEntry], highlights: &[bool], width: usize) -> Vec<String> {
    let name_width = width.saturating_sub(META_WIDTH + 1).max(1);
    entries
        .iter()
        .zip(highlights)
        .map(|(entry, &matched)| {
            let meta = if entry.is_file() {
                format!("{} {:>11}", format_day(entry.mtime), entry.size)
            } else {
                String::new()
            };
            let name: String = entry.display_name().chars().take(name_width).collect();
            let name = format!("{:<width$}", name, width = name_width);
            let style = match entry.kind {
                EntryKind::File if matched => MATCHED,
                EntryKind::File => Style::new(),
                EntryKind::Dir => Style::new().fg(Color::Cyan),
                EntryKind::Symlink => Style::new().fg(Color::Yellow),
                EntryKind::Other => Style::new().fg(Color::Red).bold(),
            };
            format!("{:<meta_width$} {}", meta, name.paint(style), meta_width = META_WIDTH)
        })
        .collect()
}

/// Two folder listings side by side.
///
/// Files whose size also appears on the other side are highlighted; each
/// size on one side matches at most one file on the other.
///
/// # Errors
///
/// Propagates write errors.
pub fn write_side_by_side<W: Write + ?Sized>(
    w: &mut W,
    left_path: &Path,
    left: &[ListingEntry],
    right_path: &Path,
    right: &[ListingEntry],
    panel_width: usize,
) -> io::Result<()> {
    let left_lines = panel(left, &matching_sizes(left, right), panel_width);
    let right_lines = panel(right, &matching_sizes(right, left), panel_width);
    let blank = " ".repeat(panel_width);

    let header = |p: &Path| -> String {
        let text: String = p.display().to_string().chars().take(panel_width).collect();
        format!("{:<width$}", text, width = panel_width)
    };
    writeln!(
        w,
        "{} {}",
        header(left_path).paint(HEADER),
        header(right_path).paint(HEADER)
    )?;

    for i in 0..left_lines.len().max(right_lines.len()) {
        let l = left_lines.get(i).unwrap_or(&blank);
        let r = right_lines.get(i).map(String::as_str).unwrap_or("");
        writeln!(w, "{} {}", l, r)?;
    }
    Ok(())
}
