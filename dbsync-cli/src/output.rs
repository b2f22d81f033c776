//! Output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};

use dbsync_core::{ScriptState, StatusReport};

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn state_cell(state: ScriptState) -> Cell {
    match state {
        ScriptState::Applied => Cell::new("applied").fg(Color::Green),
        ScriptState::Pending => Cell::new("pending").fg(Color::Yellow),
        ScriptState::BeyondTarget => Cell::new("beyond target").fg(Color::DarkGrey),
    }
}

/// One row per versioned script
pub fn status_table(report: &StatusReport) -> Table {
    let mut table = create_table();
    table.set_header(vec!["Version", "Folder", "Script", "State"]);
    for folder in &report.folders {
        for script in &folder.scripts {
            table.add_row(vec![
                Cell::new(folder.version.to_string()),
                Cell::new(&folder.name),
                Cell::new(&script.script_id),
                state_cell(script.state),
            ]);
        }
    }
    table
}

pub fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{} {}", count, word)
    } else {
        format!("{} {}s", count, word)
    }
}
