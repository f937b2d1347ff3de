use crate::colors::StatusPalette;
use chrono::{DateTime, Utc};
use crossterm::{
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use healthmon_core::{ComponentView, HealthStatus, HealthSummary, MetadataValue, SystemHealth, SystemMetrics};
use std::io::{self, Write};

/// Queue `text`, colored only when the palette allows it.
fn styled<W: Write>(writer: &mut W, palette: &StatusPalette, color: Color, text: &str) -> io::Result<()> {
    if palette.enabled {
        writer.queue(SetForegroundColor(color))?;
        writer.queue(Print(text))?;
        writer.queue(ResetColor)?;
    } else {
        writer.queue(Print(text))?;
    }
    Ok(())
}

fn newline<W: Write>(writer: &mut W) -> io::Result<()> {
    writer.queue(Print("\n"))?;
    Ok(())
}

/// Header line with the overall status
pub struct Header;

impl Header {
    pub fn render<W: Write>(&self, writer: &mut W, summary: &HealthSummary, palette: &StatusPalette) -> io::Result<()> {
        styled(writer, palette, palette.accent, "healthmon")?;
        writer.queue(Print("  overall: "))?;
        styled(
            writer,
            palette,
            palette.status_color(summary.overall_status),
            summary.overall_status.as_str().to_uppercase().as_str(),
        )?;

        let counts = &summary.status_counts;
        let content = format!(
            "  | {} | components: {} ({} ok, {} warn, {} crit, {} unknown, {} maint)",
            summary.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            summary.registered_count,
            counts.healthy,
            counts.warning,
            counts.critical,
            counts.unknown,
            counts.maintenance
        );
        styled(writer, palette, palette.foreground, &content)?;
        newline(writer)
    }
}

/// Resource block for the latest system sample
pub struct SystemBlock;

impl SystemBlock {
    pub fn render<W: Write>(
        &self,
        writer: &mut W,
        metrics: Option<&SystemMetrics>,
        health: Option<&SystemHealth>,
        palette: &StatusPalette,
    ) -> io::Result<()> {
        styled(writer, palette, palette.table_header, "System")?;
        newline(writer)?;

        let Some(metrics) = metrics else {
            styled(writer, palette, palette.muted, "  waiting for first sample")?;
            return newline(writer);
        };

        let resource_status = |name: &str| {
            health
                .and_then(|h| h.resources.get(name).copied())
                .unwrap_or(HealthStatus::Unknown)
        };

        for (label, key, value) in [
            ("CPU", "cpu", metrics.cpu_percent),
            ("Memory", "memory", metrics.memory_percent),
            ("Disk", "disk", metrics.disk_percent),
        ] {
            let status = resource_status(key);
            writer.queue(Print(format!("  {:<10}{:>7}  ", label, format_percent(value))))?;
            styled(writer, palette, palette.status_color(status), status.as_str().to_uppercase().as_str())?;
            newline(writer)?;
        }

        let load = match metrics.load_average {
            Some([one, five, fifteen]) => format!("{:.2} {:.2} {:.2}", one, five, fifteen),
            None => "n/a".to_string(),
        };
        writer.queue(Print(format!("  {:<10}{}", "Load", load)))?;
        newline(writer)?;

        writer.queue(Print(format!("  {:<10}{}", "Processes", metrics.process_count)))?;
        newline(writer)?;

        let io = &metrics.network_io;
        writer.queue(Print(format!(
            "  {:<10}sent {} ({} pkts)  recv {} ({} pkts)",
            "Network",
            format_bytes(io.bytes_sent),
            io.packets_sent,
            format_bytes(io.bytes_recv),
            io.packets_recv
        )))?;
        newline(writer)?;

        if !metrics.unavailable.is_empty() {
            styled(
                writer,
                palette,
                palette.muted,
                &format!("  unavailable: {}", metrics.unavailable.join(", ")),
            )?;
            newline(writer)?;
        }

        Ok(())
    }
}

/// Table of registered components with their effective status
pub struct ComponentTable;

const COLUMNS: [(&str, usize); 6] = [
    ("ID", 16),
    ("NAME", 20),
    ("STATUS", 12),
    ("LATENCY", 9),
    ("CHECKED", 10),
    ("DETAIL", 0),
];

impl ComponentTable {
    pub fn render<W: Write>(
        &self,
        writer: &mut W,
        components: &[ComponentView],
        now: DateTime<Utc>,
        palette: &StatusPalette,
    ) -> io::Result<()> {
        styled(writer, palette, palette.table_header, "Components")?;
        newline(writer)?;

        if components.is_empty() {
            styled(writer, palette, palette.muted, "  none registered")?;
            return newline(writer);
        }

        let header: String = COLUMNS
            .iter()
            .map(|(title, width)| pad(title, *width))
            .collect();
        styled(writer, palette, palette.table_header, &format!("  {}", header.trim_end()))?;
        newline(writer)?;

        for view in components {
            let health = &view.health;
            let (latency, checked) = match health.last_check {
                Some(at) => (
                    format!("{:.0}ms", health.response_time * 1000.0),
                    format_age(now.signed_duration_since(at)),
                ),
                None => ("-".to_string(), "never".to_string()),
            };

            let mut status = view.effective_status.as_str().to_uppercase();
            if view.stale {
                status.push('*');
            }

            writer.queue(Print(format!(
                "  {}{}",
                pad(&health.component_id, COLUMNS[0].1),
                pad(&health.name, COLUMNS[1].1)
            )))?;
            styled(
                writer,
                palette,
                palette.status_color(view.effective_status),
                &pad(&status, COLUMNS[2].1),
            )?;
            writer.queue(Print(format!("{}{}", pad(&latency, COLUMNS[3].1), pad(&checked, COLUMNS[4].1))))?;
            if let Some(detail) = failure_detail(view) {
                styled(writer, palette, palette.muted, &detail)?;
            }
            newline(writer)?;
        }

        if components.iter().any(|c| c.stale) {
            styled(writer, palette, palette.muted, "  * stale: last check older than the staleness window")?;
            newline(writer)?;
        }

        Ok(())
    }
}

fn failure_detail(view: &ComponentView) -> Option<String> {
    match view.health.metadata.get("error") {
        Some(MetadataValue::Text(reason)) => Some(reason.clone()),
        Some(other) => Some(other.to_string()),
        None => None,
    }
}

/// Left-align into a fixed column, truncating with `~`. Width 0 means unbounded.
fn pad(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_string();
    }
    let count = text.chars().count();
    if count < width {
        format!("{:width$}", text, width = width)
    } else {
        let kept: String = text.chars().take(width.saturating_sub(2)).collect();
        format!("{}~ ", kept)
    }
}

fn format_percent(value: Option<f32>) -> String {
    match value {
        Some(v) => format!("{:.1}%", v),
        None => "n/a".to_string(),
    }
}

fn format_age(age: chrono::Duration) -> String {
    let secs = age.num_seconds().max(0);
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{}{}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.1}{}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_truncates_long_cells() {
        assert_eq!(pad("abc", 6), "abc   ");
        assert_eq!(pad("abcdefgh", 6), "abcd~ ");
        assert_eq!(pad("anything", 0), "anything");
    }

    #[test]
    fn formats_units() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(1536), "1.5KB");
        assert_eq!(format_percent(None), "n/a");
        assert_eq!(format_percent(Some(42.26)), "42.3%");
        assert_eq!(format_age(chrono::Duration::seconds(90)), "1m ago");
        assert_eq!(format_age(chrono::Duration::seconds(-3)), "0s ago");
    }
}
