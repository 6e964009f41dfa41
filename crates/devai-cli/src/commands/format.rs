use crate::render::render_answer;
use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

/// Renders a file (or stdin) through the answer formatter.
pub fn run(file: Option<&Path>) -> Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            text
        }
    };
    println!("{}", render_answer(&text));
    Ok(())
}
