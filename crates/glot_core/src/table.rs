//! Plain-text tables for status and search output.

use std::fmt::Write;

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableStyle {
    #[default]
    Simple,
    FancyGrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowColor {
    Red,
    Green,
    Yellow,
}

impl RowColor {
    fn code(self) -> &'static str {
        match self {
            Self::Red => ansi::RED,
            Self::Green => ansi::GREEN,
            Self::Yellow => ansi::YELLOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub colors: Vec<Option<RowColor>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
            colors: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
        self.colors.push(None);
    }

    pub fn push_colored_row(&mut self, row: Vec<String>, color: Option<RowColor>) {
        self.rows.push(row);
        self.colors.push(color);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column of the first cell of every row.
    pub fn first_column(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter_map(|row| row.first().map(String::as_str))
            .collect()
    }

    pub fn render(&self, style: TableStyle) -> String {
        let widths = self.widths();
        match style {
            TableStyle::Simple => self.render_simple(&widths),
            TableStyle::FancyGrid => self.render_grid(&widths),
        }
    }

    fn widths(&self) -> Vec<usize> {
        let columns = self
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0);
        (0..columns)
            .map(|column| {
                self.rows
                    .iter()
                    .chain(std::iter::once(&self.headers))
                    .filter_map(|row| row.get(column))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    fn render_simple(&self, widths: &[usize]) -> String {
        let rule = widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("  ");
        let mut out = String::new();
        if self.headers.is_empty() {
            let _ = writeln!(out, "{rule}");
        } else {
            let _ = writeln!(out, "{}", self.line(&self.headers, widths, "  ", None).trim_end());
            let _ = writeln!(out, "{rule}");
        }
        for (row, color) in self.rows.iter().zip(&self.colors) {
            let _ = writeln!(out, "{}", self.line(row, widths, "  ", *color).trim_end());
        }
        if self.headers.is_empty() {
            let _ = writeln!(out, "{rule}");
        }
        out
    }

    fn render_grid(&self, widths: &[usize]) -> String {
        let border = |left: &str, fill: &str, join: &str, right: &str| {
            let inner = widths
                .iter()
                .map(|width| fill.repeat(width + 2))
                .collect::<Vec<_>>()
                .join(join);
            format!("{left}{inner}{right}")
        };

        let mut out = String::new();
        let _ = writeln!(out, "{}", border("╒", "═", "╤", "╕"));
        if !self.headers.is_empty() {
            let _ = writeln!(out, "│ {} │", self.line(&self.headers, widths, " │ ", None));
            let _ = writeln!(out, "{}", border("╞", "═", "╪", "╡"));
        }
        for (index, (row, color)) in self.rows.iter().zip(&self.colors).enumerate() {
            if index > 0 {
                let _ = writeln!(out, "{}", border("├", "─", "┼", "┤"));
            }
            let _ = writeln!(out, "│ {} │", self.line(row, widths, " │ ", *color));
        }
        let _ = writeln!(out, "{}", border("╘", "═", "╧", "╛"));
        out
    }

    fn line(&self, row: &[String], widths: &[usize], separator: &str, color: Option<RowColor>) -> String {
        widths
            .iter()
            .enumerate()
            .map(|(column, width)| {
                let cell = row.get(column).map(String::as_str).unwrap_or("");
                let padding = " ".repeat(width.saturating_sub(cell.chars().count()));
                match color {
                    Some(color) => format!("{}{cell}{}{padding}", color.code(), ansi::RESET),
                    None => format!("{cell}{padding}"),
                }
            })
            .collect::<Vec<_>>()
            .join(separator)
    }
}
