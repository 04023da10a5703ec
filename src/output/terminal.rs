//! Terminal rendering of tables and comparisons

use std::io::Write;

use tabled::builder::Builder;
use tabled::settings::Style;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::error::Result;
use crate::model::Table;
use crate::ops::Comparison;

/// Terminal output for the CLI
pub struct TerminalOutput {
    color_choice: ColorChoice,
    max_rows: Option<usize>,
}

impl TerminalOutput {
    pub fn new() -> Self {
        Self {
            color_choice: ColorChoice::Auto,
            max_rows: None,
        }
    }

    pub fn with_color_choice(mut self, color_choice: ColorChoice) -> Self {
        self.color_choice = color_choice;
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    /// Grid of formatted cells with a header row
    pub fn render_table(&self, table: &Table) -> Result<String> {
        let mut builder = Builder::default();
        builder.push_record(table.columns().iter().map(|c| c.name.clone()));
        let limit = self.max_rows.unwrap_or(usize::MAX).min(table.row_count());
        for row in 0..limit {
            let cells = (0..table.column_count())
                .map(|col| table.formatted_value(row, col))
                .collect::<Result<Vec<_>>>()?;
            builder.push_record(cells);
        }
        let mut grid = builder.build();
        grid.with(Style::rounded());
        Ok(grid.to_string())
    }

    /// Schema listing: name, type, width, precision
    pub fn render_schema(&self, table: &Table) -> String {
        let mut builder = Builder::default();
        builder.push_record(["name", "type", "width", "precision", "units"]);
        for column in table.columns() {
            builder.push_record([
                column.name.clone(),
                column.value_type.to_string(),
                column.width.map(|w| w.to_string()).unwrap_or_default(),
                column.precision.map(|p| p.to_string()).unwrap_or_default(),
                column.units.clone(),
            ]);
        }
        let mut grid = builder.build();
        grid.with(Style::rounded());
        grid.to_string()
    }

    pub fn write_table(&self, table: &Table, writer: &mut dyn Write) -> Result<()> {
        writeln!(writer, "{}", self.render_table(table)?)?;
        if self.max_rows.is_some_and(|max| max < table.row_count()) {
            writeln!(writer, "... {} more rows", table.row_count() - self.max_rows.unwrap_or(0))?;
        }
        Ok(())
    }

    /// Print every differing cell to stdout, coloured when the terminal allows
    pub fn print_differences(&self, comparison: &Comparison) -> Result<()> {
        let mut stdout = StandardStream::stdout(self.color_choice);
        let table = &comparison.table;
        for (row, flags) in comparison.differences.iter().enumerate() {
            for (col, &differs) in flags.iter().enumerate() {
                if !differs {
                    continue;
                }
                let name = table.column(col).map(|c| c.name.as_str()).unwrap_or("");
                let text = table.formatted_value(row, col)?;
                write!(stdout, "row {:>5}  {:<16} ", row + 1, name)?;
                stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
                writeln!(stdout, "{}", text)?;
                stdout.reset()?;
            }
        }
        writeln!(
            stdout,
            "{} difference(s) in {} row(s)",
            comparison.difference_count(),
            comparison.differences.len()
        )?;
        Ok(())
    }
}

impl Default for TerminalOutput {
    fn default() -> Self {
        Self::new()
    }
}
