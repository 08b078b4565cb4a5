//! User-facing output for the CLI besides the preprocessed text itself:
//! the end-of-run summary and the JSON table dump.

use crate::diagnostics::Diagnostics;
use crate::engine::ExpansionStats;
use crate::macros::MacroSummary;
use crate::session::Session;
use serde::Serialize;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

#[derive(Serialize)]
struct TableDump<'a> {
    version: u64,
    macros: Vec<MacroSummary>,
    stats: &'a ExpansionStats,
}

/// Serializes the live macro table and the expansion statistics.
pub fn table_json(session: &Session) -> serde_json::Result<String> {
    let dump = TableDump {
        version: session.table.version(),
        macros: session.table.iter().map(|mac| mac.summary()).collect(),
        stats: &session.stats,
    };
    serde_json::to_string_pretty(&dump)
}

/// Prints the table dump on stderr.
pub fn print_table_json(session: &Session) {
    match table_json(session) {
        Ok(json) => eprintln!("{}", json),
        Err(err) => eprintln!("can't serialize macro table: {}", err),
    }
}

/// Prints the warning and error counts on stderr.
pub fn print_summary(diagnostics: &Diagnostics, choice: ColorChoice) {
    let mut stderr = StandardStream::stderr(choice);
    let counts = diagnostics.counts();
    let color = if counts.errors > 0 {
        Color::Red
    } else if counts.warnings > 0 {
        Color::Yellow
    } else {
        Color::Green
    };
    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let _ = write!(stderr, "rexpp:");
    let _ = stderr.reset();
    let _ = writeln!(stderr, " {}", diagnostics.summary());
}
