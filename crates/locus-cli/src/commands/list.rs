//! List command - print every indexed file.

use crate::app::App;
use crate::OutputFormat;

/// Run the list command.
pub fn run(app: &App, output: OutputFormat) -> anyhow::Result<()> {
    let index = app.open_index()?;
    let paths = index.paths();

    match output {
        OutputFormat::Text => {
            for path in &paths {
                println!("{}", path.display());
            }

            eprintln!();
            eprintln!("{} files", paths.len());
        }
        OutputFormat::Json => {
            let json_paths: Vec<String> = paths
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect();

            println!("{}", serde_json::to_string_pretty(&json_paths)?);
        }
    }

    index.stop();
    Ok(())
}
