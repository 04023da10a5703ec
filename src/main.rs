//! tablekit - inspect, convert and transform tabular files

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use termcolor::ColorChoice;
use tracing_subscriber::EnvFilter;

use tablekit::config::{DbfReadMode, HeaderMode, ParseOptions, WriteOptions};
use tablekit::logger::{Level, Logger};
use tablekit::model::Table;
use tablekit::ops::{
    compare_tables, copy_table, join_tables, sort_table, ColumnPairing, CompareOptions, CopyOptions,
    JoinMode, JoinOptions, MatchPolicy, RowFilter, SortKey,
};
use tablekit::output::{TerminalOutput, WriterFactory};
use tablekit::parser::ParserFactory;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliColor {
    Auto,
    Always,
    Never,
}

impl From<CliColor> for ColorChoice {
    fn from(c: CliColor) -> Self {
        match c {
            CliColor::Auto => ColorChoice::Auto,
            CliColor::Always => ColorChoice::Always,
            CliColor::Never => ColorChoice::Never,
        }
    }
}

/// Inspect, convert and transform delimited-text and dBase (DBF) tables
#[derive(Parser, Debug)]
#[command(name = "tablekit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Options for reading input files
#[derive(Args, Debug, Clone)]
struct ReadArgs {
    /// Field delimiter for delimited text (default ',' or tab for .tsv)
    #[arg(short, long)]
    delimiter: Option<char>,

    /// Header row handling: auto, present or absent
    #[arg(long, default_value = "auto")]
    header: String,

    /// Keep every column as text instead of inferring types
    #[arg(long)]
    no_infer: bool,

    /// Treat adjacent delimiters as one
    #[arg(long)]
    merge_delimiters: bool,

    /// Lines to skip before parsing
    #[arg(long, default_value_t = 0)]
    skip_lines: usize,

    /// Read DBF cells from disk on demand instead of loading every record
    #[arg(long)]
    on_the_fly: bool,
}

impl ReadArgs {
    fn factory(&self) -> Result<ParserFactory> {
        let mut options = ParseOptions::new()
            .with_header(self.header.parse::<HeaderMode>().map_err(anyhow::Error::msg)?)
            .with_skip_lines(self.skip_lines)
            .with_merge_delimiters(self.merge_delimiters);
        if let Some(delimiter) = self.delimiter {
            options = options.with_delimiter(ascii_byte(delimiter)?);
        }
        if self.no_infer {
            options = options.all_text();
        }
        let mode = if self.on_the_fly {
            DbfReadMode::OnTheFly
        } else {
            DbfReadMode::Eager
        };
        Ok(ParserFactory::new(options, mode))
    }

    fn read(&self, path: &Path, logger: &Logger) -> Result<Table> {
        self.factory()?
            .parse(path, logger)
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}

/// Options for writing output files
#[derive(Args, Debug, Clone)]
struct WriteArgs {
    /// Field delimiter for delimited-text output
    #[arg(long, default_value = ",")]
    out_delimiter: char,

    /// Quote every delimited-text cell
    #[arg(long)]
    always_quote: bool,

    /// Text written for NaN values
    #[arg(long, default_value = "NaN")]
    nan: String,
}

impl WriteArgs {
    fn write(&self, table: &Table, path: &Path) -> Result<()> {
        let options = WriteOptions::new()
            .with_delimiter(ascii_byte(self.out_delimiter)?)
            .with_always_quote(self.always_quote)
            .with_nan_literal(self.nan.clone())
            .with_comments("#");
        WriterFactory::new(options)
            .write(table, path)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a table and its schema
    Show {
        file: PathBuf,
        #[command(flatten)]
        read: ReadArgs,
        /// Maximum number of rows to print
        #[arg(short = 'n', long, default_value_t = 20)]
        rows: usize,
        /// Print the column schema instead of the rows
        #[arg(long)]
        schema: bool,
        /// Print the column schema as JSON
        #[arg(long)]
        schema_json: bool,
    },
    /// Convert between formats, chosen by file extension
    Convert {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        read: ReadArgs,
        #[command(flatten)]
        write: WriteArgs,
    },
    /// Sort rows by one or more keys (`name` or `name:desc`)
    Sort {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long, value_delimiter = ',', required = true)]
        key: Vec<String>,
        #[command(flatten)]
        read: ReadArgs,
        #[command(flatten)]
        write: WriteArgs,
    },
    /// Compare two tables cell by cell; exits 1 when they differ
    Compare {
        left: PathBuf,
        right: PathBuf,
        /// Pair columns by position instead of by name
        #[arg(long)]
        by_position: bool,
        /// Tolerance for floating-point columns
        #[arg(long)]
        tolerance: Option<f64>,
        /// Compare text case-insensitively
        #[arg(long)]
        ignore_case: bool,
        /// Write the comparison table to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "auto")]
        color: CliColor,
        #[command(flatten)]
        read: ReadArgs,
    },
    /// Join columns of a secondary table into a primary table by key
    Join {
        primary: PathBuf,
        secondary: PathBuf,
        output: PathBuf,
        /// Key column(s) in the primary table
        #[arg(short, long, value_delimiter = ',', required = true)]
        key: Vec<String>,
        /// Key column(s) in the secondary table, if named differently
        #[arg(long, value_delimiter = ',')]
        secondary_key: Vec<String>,
        /// Secondary columns to bring over (default: all non-key columns)
        #[arg(short, long, value_delimiter = ',')]
        columns: Vec<String>,
        /// Write repeated matches into numbered columns
        #[arg(long)]
        number_columns: bool,
        /// Append secondary rows that match nothing
        #[arg(long)]
        always: bool,
        #[command(flatten)]
        read: ReadArgs,
        #[command(flatten)]
        write: WriteArgs,
    },
    /// Copy selected columns and rows into a new file
    Copy {
        input: PathBuf,
        output: PathBuf,
        /// Columns to copy (default: all)
        #[arg(short, long, value_delimiter = ',')]
        columns: Vec<String>,
        /// Keep rows where COLUMN matches GLOB (`column=glob`, repeatable)
        #[arg(long)]
        include: Vec<String>,
        /// Drop rows where COLUMN matches GLOB (`column=glob`, repeatable)
        #[arg(long)]
        exclude: Vec<String>,
        /// Keep the first row of each distinct tuple of these columns
        #[arg(long, value_delimiter = ',')]
        distinct: Vec<String>,
        #[command(flatten)]
        read: ReadArgs,
        #[command(flatten)]
        write: WriteArgs,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(has_differences) => {
            if has_differences {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: u8) {
    // -v steps from warnings through info to debug
    let level = Level::from_int(2 + i32::from(verbose));
    let default = log::Level::from(level).as_str().to_lowercase();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn ascii_byte(c: char) -> Result<u8> {
    if !c.is_ascii() {
        bail!("delimiter '{}' is not a single-byte character", c);
    }
    Ok(c as u8)
}

fn parse_filters(include: &[String], exclude: &[String]) -> Result<RowFilter> {
    let split = |spec: &String| -> Result<(String, String)> {
        spec.split_once('=')
            .map(|(column, glob)| (column.to_string(), glob.to_string()))
            .with_context(|| format!("filter '{}' is not of the form column=glob", spec))
    };
    let mut filter = RowFilter::new();
    for spec in include {
        let (column, glob) = split(spec)?;
        filter = filter.include(column, glob);
    }
    for spec in exclude {
        let (column, glob) = split(spec)?;
        filter = filter.exclude(column, glob);
    }
    Ok(filter)
}

/// Run a subcommand; returns whether differences were found
fn run(command: Command) -> Result<bool> {
    let logger = Logger::new();
    match command {
        Command::Show {
            file,
            read,
            rows,
            schema,
            schema_json,
        } => {
            let table = read.read(&file, &logger)?;
            let terminal = TerminalOutput::new().with_max_rows(rows);
            if schema_json {
                println!("{}", serde_json::to_string_pretty(table.columns())?);
            } else if schema {
                println!("{}", terminal.render_schema(&table));
            } else {
                terminal.write_table(&table, &mut std::io::stdout().lock())?;
            }
            Ok(false)
        }
        Command::Convert {
            input,
            output,
            read,
            write,
        } => {
            let table = read.read(&input, &logger)?;
            write.write(&table, &output)?;
            Ok(false)
        }
        Command::Sort {
            input,
            output,
            key,
            read,
            write,
        } => {
            let keys = key
                .iter()
                .map(|k| k.parse::<SortKey>())
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let mut table = read.read(&input, &logger)?;
            sort_table(&mut table, &keys).context("Failed to sort")?;
            write.write(&table, &output)?;
            Ok(false)
        }
        Command::Compare {
            left,
            right,
            by_position,
            tolerance,
            ignore_case,
            output,
            color,
            read,
        } => {
            let a = read.read(&left, &logger)?;
            let b = read.read(&right, &logger)?;
            let mut options = CompareOptions::new().with_ignore_case(ignore_case);
            if by_position {
                options = options.with_pairing(ColumnPairing::ByPosition);
            }
            if let Some(tolerance) = tolerance {
                options = options.with_tolerance(tolerance);
            }
            let comparison = compare_tables(&a, &b, &options).context("Failed to compare")?;
            TerminalOutput::new()
                .with_color_choice(color.into())
                .print_differences(&comparison)?;
            if let Some(path) = output {
                WriterFactory::default()
                    .write(&comparison.table, &path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
            Ok(comparison.has_differences())
        }
        Command::Join {
            primary,
            secondary,
            output,
            key,
            secondary_key,
            columns,
            number_columns,
            always,
            read,
            write,
        } => {
            let mut table = read.read(&primary, &logger)?;
            let other = read.read(&secondary, &logger)?;
            let mut options = JoinOptions::new(key)
                .with_secondary_keys(secondary_key)
                .with_columns(columns);
            if number_columns {
                options = options.with_policy(MatchPolicy::NumberColumns);
            }
            if always {
                options = options.with_mode(JoinMode::AlwaysJoin);
            }
            let summary = join_tables(&mut table, &other, &options).context("Failed to join")?;
            eprintln!(
                "{} matched, {} unmatched, {} appended",
                summary.matched_rows, summary.unmatched_rows, summary.appended_rows
            );
            write.write(&table, &output)?;
            Ok(false)
        }
        Command::Copy {
            input,
            output,
            columns,
            include,
            exclude,
            distinct,
            read,
            write,
        } => {
            let table = read.read(&input, &logger)?;
            let options = CopyOptions::new()
                .with_columns(columns)
                .with_filter(parse_filters(&include, &exclude)?)
                .with_distinct(distinct);
            let copied = copy_table(&table, &options).context("Failed to copy")?;
            write.write(&copied, &output)?;
            Ok(false)
        }
    }
}
