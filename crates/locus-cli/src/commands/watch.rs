//! Watch command - keep a live index and answer queries from stdin.
//!
//! Each input line is either a regex (prints every matching path) or one of:
//!
//! - `:count` - number of indexed files
//! - `:refresh` - rebuild the cache from a fresh walk
//! - `:status` - lifecycle state, generation and restart count
//! - `:quit` - stop and exit (end of input does the same)

use crate::app::App;
use locus_core::FileIndex;
use regex::Regex;
use std::io::{self, BufRead, Write};
use tracing::info;

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Run the watch command.
pub fn run(app: &App) -> anyhow::Result<()> {
    let index = app.open_index()?;

    if let Some(descriptor) = index.descriptor() {
        eprintln!(
            "Watching {} for {} ({} files)",
            descriptor.root().display(),
            descriptor.pattern(),
            index.len()
        );
    }
    eprintln!("Enter a regex, or :count, :refresh, :status, :quit");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        if handle_line(&index, &line?, &mut out)? == Flow::Quit {
            break;
        }
        out.flush()?;
    }

    index.stop();
    info!("Watch session ended");
    Ok(())
}

fn handle_line(index: &FileIndex, line: &str, out: &mut impl Write) -> anyhow::Result<Flow> {
    let line = line.trim();

    match line {
        "" => {}
        ":quit" | ":q" => return Ok(Flow::Quit),
        ":count" => writeln!(out, "{}", index.len())?,
        ":refresh" => match index.refresh() {
            Ok(count) => writeln!(out, "refreshed: {} files", count)?,
            Err(e) => writeln!(out, "error: {}", e)?,
        },
        ":status" => writeln!(
            out,
            "state: {}, files: {}, generation: {}, restarts: {}",
            index.state(),
            index.len(),
            index.generation(),
            index.restart_count()
        )?,
        pattern => match Regex::new(pattern) {
            Ok(regex) => {
                let matches = index.find_all(|p| regex.is_match(&p.to_string_lossy()));
                for path in &matches {
                    writeln!(out, "{}", path.display())?;
                }
                writeln!(out, "({} matches)", matches.len())?;
            }
            Err(e) => writeln!(out, "invalid regex: {}", e)?,
        },
    }

    Ok(Flow::Continue)
}
