//! Parser for `ls -la` output from the device shell.
//!
//! Toybox prints `YYYY-MM-DD HH:MM`; busybox prints `Mon DD HH:MM` or
//! `Mon DD YYYY`. Lines with any other date shape are skipped rather than
//! guessed at.

use adbx_core::{EntryType, FileEntry, FsPath};

/// Parse the long listing of `directory` into entries.
///
/// Entries directly under `recycle_root` get their recycle metadata decoded.
/// `.`/`..`, the `total` line, and lines that do not look like entries are
/// skipped.
#[must_use]
pub fn parse_listing(
    directory: &FsPath,
    stdout: &str,
    recycle_root: Option<&FsPath>,
) -> Vec<FileEntry> {
    stdout
        .lines()
        .filter_map(|line| parse_line(line.trim_end_matches('\r')))
        .filter(|(name, ..)| *name != "." && *name != "..")
        .filter_map(|(name, entry_type, size)| {
            let path = directory
                .join(name, entry_type == EntryType::Folder)
                .ok()?;
            Some(match recycle_root {
                Some(root) => FileEntry::in_recycle_root(path, entry_type, size, root),
                None => FileEntry::new(path, entry_type, size),
            })
        })
        .collect()
}

fn parse_line(line: &str) -> Option<(&str, EntryType, Option<u64>)> {
    let entry_type = match line.chars().next()? {
        'd' => EntryType::Folder,
        '-' => EntryType::File,
        'l' => EntryType::Link,
        'b' | 'c' | 'p' | 's' => EntryType::Other,
        _ => return None,
    };
    let (fields, _) = split_fields(line, 5)?;
    // Device nodes print "major, minor" where regular entries print a size.
    let size_end = if fields[4].ends_with(',') { 6 } else { 5 };
    let (fields, _) = split_fields(line, size_end + 1)?;
    let date_fields = date_width(fields[size_end])?;
    let (fields, rest) = split_fields(line, size_end + date_fields)?;
    let mut name = rest.strip_prefix(' ')?;
    if entry_type == EntryType::Link {
        name = name.split_once(" -> ").map_or(name, |(link, _)| link);
    }
    if name.is_empty() {
        return None;
    }
    let size = match entry_type {
        EntryType::File => fields[4].parse().ok(),
        EntryType::Folder | EntryType::Link | EntryType::Other => None,
    };
    Some((name, entry_type, size))
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Number of fields the date occupies, judged by its first field.
fn date_width(first: &str) -> Option<usize> {
    let bytes = first.as_bytes();
    let iso = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(index, byte)| index == 4 || index == 7 || byte.is_ascii_digit());
    if iso {
        Some(2)
    } else if MONTHS.contains(&first) {
        Some(3)
    } else {
        None
    }
}

fn split_fields(line: &str, count: usize) -> Option<(Vec<&str>, &str)> {
    let mut fields = Vec::with_capacity(count);
    let mut rest = line;
    for _ in 0..count {
        rest = rest.trim_start_matches(' ');
        let end = rest.find(' ')?;
        fields.push(&rest[..end]);
        rest = &rest[end..];
    }
    Some((fields, rest))
}
