//! `catchdb` command-line front end.
//!
//! Opens a catch database, lists its lookup tables and catches, and prints
//! coupling tables of catches against environmental parameters.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catchdb::{
    CatalogKind, CatchDb, CatchKind, DatabaseConfig, GeoBox, MemoryCursor, Position, Species,
    TimeRange, Value, write_table,
};

/// Query and couple fishery catch data.
#[derive(Debug, Parser)]
#[command(name = "catchdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, default_value = "catches.db")]
    db: PathBuf,

    /// JSON deployment configuration (time zone, fetch size, SQL templates).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Offset of stored timestamps from UTC, in minutes. Overrides the
    /// configuration file.
    #[arg(long, global = true, allow_hyphen_values = true)]
    utc_offset: Option<i32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the default tables.
    Init,
    /// List parameter names.
    Parameters,
    /// List operation names.
    Operations,
    /// List catches in a time window and area.
    Catches(CatchesArgs),
    /// Print the coupling table of catches and environment steps.
    Couple(CoupleArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Gear {
    Longline,
    Seine,
}

impl From<Gear> for CatchKind {
    fn from(gear: Gear) -> Self {
        match gear {
            Gear::Longline => Self::Longline,
            Gear::Seine => Self::Seine,
        }
    }
}

#[derive(Debug, Args)]
struct CatchesArgs {
    /// Fishing gear.
    #[arg(long, value_enum)]
    kind: Gear,

    /// First capture date (`YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`, UTC).
    #[arg(long, value_parser = parse_instant)]
    from: Option<DateTime<Utc>>,

    /// Last capture date, inclusive.
    #[arg(long, value_parser = parse_instant)]
    to: Option<DateTime<Utc>>,

    /// Species columns to report, comma separated.
    #[arg(long, value_delimiter = ',')]
    species: Vec<String>,

    /// Area as `MIN_LON,MIN_LAT,MAX_LON,MAX_LAT`.
    #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
    bbox: Option<GeoBox>,
}

#[derive(Debug, Args)]
struct CoupleArgs {
    /// Environment step as `PARAMETER:OPERATION:POSITION:LAG`, where
    /// POSITION is `start`, `center`, `end`, `area` or a percentage.
    #[arg(long = "step", value_parser = parse_step, allow_hyphen_values = true)]
    steps: Vec<StepArg>,

    /// Drive the table from the catches of this gear.
    #[arg(long, value_enum)]
    catch_kind: Option<Gear>,

    /// Catch-table columns to add after the ID, comma separated.
    #[arg(long, value_delimiter = ',', requires = "catch_kind")]
    catch_columns: Vec<String>,

    /// Keep environment rows whose value is NULL.
    #[arg(long)]
    include_nulls: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StepArg {
    parameter: String,
    operation: String,
    position: Position,
    time_lag: i32,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    let exit_code = run(std::env::args_os(), &mut stdout, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run<I, W, E>(args: I, out: &mut W, err: &mut E) -> i32
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let rendered = error.render();
            let written = if error.use_stderr() {
                write!(err, "{rendered}")
            } else {
                write!(out, "{rendered}")
            };
            if written.is_err() {
                return 1;
            }
            return error.exit_code();
        }
    };

    match execute(cli, out) {
        Ok(()) => 0,
        Err(error) => {
            let _ = writeln!(err, "error: {error}");
            if let Some(hint) = error.suggestion() {
                let _ = writeln!(err, "hint: {hint}");
            }
            if error.is_user_recoverable() { 2 } else { 1 }
        }
    }
}

fn execute<W: Write>(cli: Cli, out: &mut W) -> catchdb::Result<()> {
    let mut config = match &cli.config {
        Some(path) => DatabaseConfig::load(path)?,
        None => DatabaseConfig::default(),
    };
    if let Some(offset) = cli.utc_offset {
        config.utc_offset_minutes = offset;
    }
    config.validate()?;

    let db = CatchDb::open(&cli.db, &config)?;
    let result = match cli.command {
        Command::Init => db.create_default_schema(),
        Command::Parameters => list(&db, CatalogKind::Parameters, out),
        Command::Operations => list(&db, CatalogKind::Operations, out),
        Command::Catches(args) => catches(&db, &args, out),
        Command::Couple(args) => couple(&db, &args, out),
    };
    db.close()?;
    result
}

fn list<W: Write>(db: &CatchDb, kind: CatalogKind, out: &mut W) -> catchdb::Result<()> {
    for name in db.catalog().list_available(kind)? {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

fn catches<W: Write>(db: &CatchDb, args: &CatchesArgs, out: &mut W) -> catchdb::Result<()> {
    let query = db.catch_query(
        args.kind.into(),
        args.species.iter().map(|code| Species::new(code.as_str())),
    )?;
    if args.from.is_some() || args.to.is_some() {
        let unbounded = TimeRange::unbounded();
        query.set_time_range(
            args.from.unwrap_or(unbounded.start),
            args.to.unwrap_or(unbounded.end),
        );
    }
    if let Some(area) = args.bbox {
        query.set_geographic_area(area);
    }

    let labels = ["ID", "date"]
        .into_iter()
        .map(str::to_owned)
        .chain(query.species().iter().map(|species| species.code().to_owned()));
    let rows = query
        .entries()?
        .into_iter()
        .map(|record| {
            let date = record.captured_at().format("%Y-%m-%d").to_string();
            let mut cells = vec![Value::from(date)];
            cells.extend(record.amounts().iter().copied().map(Value::real));
            (record.id(), cells)
        })
        .collect();
    let mut table = MemoryCursor::new(labels, rows);
    write_table(&mut table, out)?;

    if let Some(range) = query.covered_time_range()? {
        tracing::info!(start = %range.start, end = %range.end, "catches.covered_time_range");
    }
    Ok(())
}

fn couple<W: Write>(db: &CatchDb, args: &CoupleArgs, out: &mut W) -> catchdb::Result<()> {
    let mut table = db.coupling_table();
    table.set_null_included(args.include_nulls)?;
    if let Some(gear) = args.catch_kind {
        table.set_catch_columns(gear.into(), args.catch_columns.as_slice())?;
    }
    for step in &args.steps {
        table.add_parameter(&step.parameter, &step.operation, step.position, step.time_lag)?;
    }
    let rows = write_table(table.row_set()?, out)?;
    tracing::debug!(rows, "couple.printed");
    table.close()
}

fn parse_instant(text: &str) -> Result<DateTime<Utc>, String> {
    let text = text.trim();
    if let Ok(instant) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Ok(instant.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|instant| instant.and_utc())
        .ok_or_else(|| format!("'{text}' is not YYYY-MM-DD or YYYY-MM-DD HH:MM:SS"))
}

fn parse_bbox(text: &str) -> Result<GeoBox, String> {
    let bounds = text
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| format!("'{text}': {error}"))?;
    match bounds.as_slice() {
        &[min_lon, min_lat, max_lon, max_lat] => {
            Ok(GeoBox::new(min_lon, min_lat, max_lon, max_lat))
        }
        _ => Err(format!("'{text}' needs four comma-separated numbers")),
    }
}

fn parse_position(text: &str) -> Result<Position, String> {
    match text.to_ascii_lowercase().as_str() {
        "start" => Ok(Position::START),
        "center" => Ok(Position::CENTER),
        "end" => Ok(Position::END),
        "area" => Ok(Position::Area),
        other => match other.parse::<i32>() {
            Ok(percent) if (0..=100).contains(&percent) => Ok(Position::relative(percent)),
            _ => Err(format!("unknown position '{text}'")),
        },
    }
}

fn parse_step(text: &str) -> Result<StepArg, String> {
    let parts: Vec<&str> = text.split(':').collect();
    let &[parameter, operation, position, time_lag] = parts.as_slice() else {
        return Err(format!("'{text}' is not PARAMETER:OPERATION:POSITION:LAG"));
    };
    if parameter.is_empty() || operation.is_empty() {
        return Err(format!("'{text}' names no parameter or operation"));
    }
    let time_lag = time_lag
        .trim_start_matches('+')
        .parse::<i32>()
        .map_err(|error| format!("time lag '{time_lag}': {error}"))?;
    Ok(StepArg {
        parameter: parameter.to_owned(),
        operation: operation.to_owned(),
        position: parse_position(position)?,
        time_lag,
    })
}
