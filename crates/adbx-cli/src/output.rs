//! Output renderers and formatting helpers for CLI commands.

use adbx_core::{EntryType, FileEntry, OperationSnapshot, OperationStatus};
use adbx_fsops::DeviceInfo;
use anyhow::anyhow;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::context::{CliError, CliResult};

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn render_devices(devices: &[DeviceInfo], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(devices)?,
        OutputFormat::Table => {
            println!("{:<24} {:<14} MODEL", "ID", "STATE");
            for device in devices {
                println!(
                    "{:<24} {:<14} {}",
                    device.id,
                    device.state.as_str(),
                    device.model.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}

pub(crate) fn render_entries(entries: &[FileEntry], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(entries)?,
        OutputFormat::Table => {
            for entry in entries {
                let size = entry.size().map_or_else(|| "-".to_string(), format_bytes);
                let name = match entry.entry_type() {
                    EntryType::Folder => format!("{}/", entry.path().full_name()),
                    EntryType::File | EntryType::Link | EntryType::Other => {
                        entry.path().full_name().to_string()
                    }
                };
                println!("{:<6} {:>11} {name}", entry.entry_type().as_str(), size);
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct TrashRow<'a> {
    name: &'a str,
    original_path: Option<String>,
    deleted_at: Option<String>,
    size: Option<u64>,
}

pub(crate) fn render_trash(entries: &[FileEntry], format: OutputFormat) -> CliResult<()> {
    let rows: Vec<TrashRow<'_>> = entries
        .iter()
        .map(|entry| {
            let origin = entry.trash_origin();
            TrashRow {
                name: entry.path().full_name(),
                original_path: origin.and_then(|origin| {
                    origin
                        .original_path(entry.path().is_directory())
                        .ok()
                        .map(|path| path.full_path().to_string())
                }),
                deleted_at: origin.map(|origin| origin.deleted_at().to_rfc3339()),
                size: entry.size(),
            }
        })
        .collect();
    match format {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Table => {
            println!("{:<29} {:>11} ORIGINAL PATH", "DELETED", "SIZE");
            for row in &rows {
                println!(
                    "{:<29} {:>11} {}",
                    row.deleted_at.as_deref().unwrap_or("?"),
                    row.size.map_or_else(|| "-".to_string(), format_bytes),
                    row.original_path.as_deref().unwrap_or(row.name)
                );
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct Removed {
    removed: usize,
}

pub(crate) fn render_removed(removed: usize, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&Removed { removed })?,
        OutputFormat::Table => println!("removed {removed} item(s) from the recycle bin"),
    }
    Ok(())
}

pub(crate) fn render_operations(
    operations: &[OperationSnapshot],
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(operations)?,
        OutputFormat::Table => {
            for operation in operations {
                let target = operation
                    .destination
                    .as_ref()
                    .map(|destination| format!(" -> {}", destination.full_path()))
                    .unwrap_or_default();
                let line = format!(
                    "{:<9} {:<8} {}{target}",
                    status_to_str(operation.state.status),
                    operation.kind.as_str(),
                    operation.source.full_path()
                );
                match &operation.state.error {
                    Some(error) => println!("{line}: {}", error.trim_end()),
                    None => println!("{line}"),
                }
            }
        }
    }
    Ok(())
}

#[must_use]
pub(crate) const fn status_to_str(status: OperationStatus) -> &'static str {
    match status {
        OperationStatus::Waiting => "waiting",
        OperationStatus::Running => "running",
        OperationStatus::Completed => "done",
        OperationStatus::Failed => "failed",
        OperationStatus::Canceled => "canceled",
    }
}

#[must_use]
pub(crate) fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;
    let value = bytes_to_f64(bytes);
    if value >= GIB {
        format!("{:.2} GiB", value / GIB)
    } else if value >= MIB {
        format!("{:.2} MiB", value / MIB)
    } else if value >= KIB {
        format!("{:.2} KiB", value / KIB)
    } else {
        format!("{bytes} B")
    }
}

fn bytes_to_f64(value: u64) -> f64 {
    let high = u32::try_from(value >> 32).unwrap_or(u32::MAX);
    let low = u32::try_from(value & 0xFFFF_FFFF).unwrap_or(u32::MAX);
    f64::from(high) * 4_294_967_296.0 + f64::from(low)
}
