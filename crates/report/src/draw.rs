use crate::{
    colors::StatusPalette,
    widgets::{ComponentTable, Header, SystemBlock},
};
use crossterm::{
    cursor,
    terminal::{Clear, ClearType},
    QueueableCommand,
};
use healthmon_core::HealthSummary;
use std::io::{self, Write};

/// Renders health summaries to a terminal or any other writer
pub struct Reporter {
    palette: StatusPalette,
    /// Redraw in place instead of appending
    redraw: bool,
}

impl Reporter {
    pub fn new(palette: StatusPalette) -> Self {
        Self { palette, redraw: false }
    }

    /// Clear the screen before each report. Only meaningful on a terminal.
    pub fn with_redraw(mut self, redraw: bool) -> Self {
        self.redraw = redraw;
        self
    }

    pub fn draw<W: Write>(&self, writer: &mut W, summary: &HealthSummary) -> io::Result<()> {
        if self.redraw {
            writer.queue(cursor::MoveTo(0, 0))?;
            writer.queue(Clear(ClearType::All))?;
        }

        render_summary(writer, summary, &self.palette)?;
        writer.flush()
    }
}

/// Queue a full report for `summary`: header, system block, component table.
pub fn render_summary<W: Write>(writer: &mut W, summary: &HealthSummary, palette: &StatusPalette) -> io::Result<()> {
    Header.render(writer, summary, palette)?;
    writer.queue(crossterm::style::Print("\n"))?;

    SystemBlock.render(
        writer,
        summary.latest_metrics.as_ref(),
        summary.system.as_ref(),
        palette,
    )?;
    writer.queue(crossterm::style::Print("\n"))?;

    ComponentTable.render(writer, &summary.components, summary.generated_at, palette)
}
