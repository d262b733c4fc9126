//! Find command - look up files by regex.

use crate::app::App;
use anyhow::Context;
use regex::Regex;
use std::time::Instant;

/// Run the find command.
///
/// Returns false when nothing matched.
pub fn run(app: &App, pattern: &str, all: bool) -> anyhow::Result<bool> {
    let regex = Regex::new(pattern).with_context(|| format!("Invalid regex: {}", pattern))?;
    let index = app.open_index()?;

    let start = Instant::now();
    let results = if all {
        index.find_all(|p| regex.is_match(&p.to_string_lossy()))
    } else {
        index.find_regex(&regex).into_iter().collect()
    };
    let elapsed = start.elapsed();

    for path in &results {
        println!("{}", path.display());
    }

    eprintln!(
        "Found {} of {} in {:.3}ms",
        results.len(),
        index.len(),
        elapsed.as_secs_f64() * 1000.0
    );

    index.stop();
    Ok(!results.is_empty())
}
