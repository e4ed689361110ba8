use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::session::Renderer;
use crate::view::{CalendarView, DayCell};

const WEEKDAY_HEADER: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const CELL_WIDTH: usize = 7;

/// Text renderer for terminals: a Monday-first month grid followed by the
/// selected day's agenda.
#[derive(Debug)]
pub struct TerminalRenderer<W: Write> {
    out: W,
    color: bool,
}

impl TerminalRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        let color = io::stdout().is_terminal();
        Self::new(io::stdout(), color)
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }

    fn cell_text(&self, cell: &DayCell) -> String {
        let (open, close) = if cell.is_selected { ('[', ']') } else { (' ', ' ') };
        let count = if cell.event_count > 0 {
            format!("·{}", cell.event_count)
        } else {
            String::new()
        };
        let text = format!("{open}{:>2}{close}{count}", cell.day_of_month);

        if cell.is_today {
            self.paint(&text, "1;33")
        } else if !cell.in_current_month {
            self.paint(&text, "2")
        } else if cell.event_count > 0 {
            self.paint(&text, "36")
        } else {
            text
        }
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    #[tracing::instrument(skip(self, view))]
    fn render_grid(&mut self, view: &CalendarView) -> anyhow::Result<()> {
        let title = self.paint(&view.month_label, "1");
        writeln!(self.out, "{title}    {}", view.today_label)?;

        for label in WEEKDAY_HEADER {
            write!(self.out, "{}", pad(label, CELL_WIDTH))?;
        }
        writeln!(self.out)?;

        let rows: Vec<String> = view
            .grid
            .chunks(7)
            .map(|week| {
                week.iter()
                    .map(|cell| pad(&self.cell_text(cell), CELL_WIDTH))
                    .collect::<String>()
            })
            .collect();
        for row in rows {
            writeln!(self.out, "{}", row.trim_end())?;
        }

        let busy: Vec<&DayCell> = view
            .grid
            .iter()
            .filter(|cell| cell.in_current_month && cell.event_count > 0)
            .collect();
        if !busy.is_empty() {
            writeln!(self.out)?;
        }
        for cell in busy {
            let previews = cell
                .previews
                .iter()
                .map(|p| format!("{} • {}", p.time_range, p.title))
                .collect::<Vec<_>>()
                .join(" | ");
            let more = cell
                .more_label()
                .map(|label| format!("  {label}"))
                .unwrap_or_default();
            writeln!(self.out, "{}  {previews}{more}", cell.date.format("%b %d"))?;
        }

        writeln!(self.out)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, view))]
    fn render_day_panel(&mut self, view: &CalendarView) -> anyhow::Result<()> {
        let label = self.paint(&view.selected_day_label, "1");
        writeln!(self.out, "{label}")?;

        if let Some(message) = view.empty_message {
            writeln!(self.out, "{message}")?;
            return Ok(());
        }

        let headers = vec![
            "Time".to_string(),
            "Title".to_string(),
            "Owner".to_string(),
            "Location".to_string(),
            "Id".to_string(),
        ];
        let rows = view
            .selected_day_events
            .iter()
            .map(|entry| {
                vec![
                    self.paint(&entry.time_range, "33"),
                    entry.title.clone(),
                    entry.owner_display.clone(),
                    entry.location.clone().unwrap_or_default(),
                    entry.id.to_string(),
                ]
            })
            .collect::<Vec<_>>();
        write_table(&mut self.out, headers, rows)?;

        for entry in &view.selected_day_events {
            if let Some(notes) = &entry.notes {
                writeln!(self.out, "  {}: {notes}", entry.title)?;
            }
        }

        Ok(())
    }
}

/// Prints the whole view model once as pretty JSON, for scripting.
#[derive(Debug)]
pub struct JsonRenderer<W: Write> {
    out: W,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Renderer for JsonRenderer<W> {
    fn render_grid(&mut self, view: &CalendarView) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(&mut self.out, view)?;
        writeln!(self.out)?;
        Ok(())
    }

    fn render_day_panel(&mut self, _view: &CalendarView) -> anyhow::Result<()> {
        Ok(())
    }
}

fn pad(text: &str, width: usize) -> String {
    let visible = UnicodeWidthStr::width(strip_ansi(text).as_str());
    format!("{text}{}", " ".repeat(width.saturating_sub(visible)))
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            write!(writer, "{}", pad(cell, *width))?;
            write!(writer, " ")?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
