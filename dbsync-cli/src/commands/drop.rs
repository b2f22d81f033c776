//! Drop command - remove a schema and everything in it

use std::path::PathBuf;

use anyhow::{bail, Result};
use colored::Colorize;
use dialoguer::Confirm;

use super::{get_context, load_config, Outcome};
use crate::output;

pub fn run(schema: String, root: Option<PathBuf>, force: bool) -> Result<Outcome> {
    let ctx = get_context(load_config(root)?)?;

    // Confirm unless --force
    if !force {
        if atty::isnt(atty::Stream::Stdin) {
            bail!("Refusing to drop '{}' without confirmation; pass --force", schema);
        }

        println!("\n{}", format!("This will drop schema '{}' and all of its objects.", schema).yellow());
        println!("{}\n", "Applied-script history is dropped with it.".dimmed());

        if !Confirm::new()
            .with_prompt("Are you sure?")
            .default(false)
            .interact()?
        {
            println!("{}\n", "Cancelled".dimmed());
            return Ok(Outcome::Success);
        }
    }

    if ctx.drop_schema(&schema)? {
        output::success(&format!("Schema '{}' dropped", schema));
    } else {
        output::warning(&format!("Schema '{}' does not exist", schema));
    }

    Ok(Outcome::Success)
}
