use std::io::{self, Write};

use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};

/// Color scheme for status lines.
struct Colors;

impl Colors {
    const SUCCESS: Color = Color::Green;
    const INFO: Color = Color::Cyan;
    const WARNING: Color = Color::Yellow;
    const ERROR: Color = Color::Red;
    const HEADER: Color = Color::Magenta;
}

fn print_colored(color: Color, text: &str) -> Result<()> {
    let mut stdout = io::stdout();
    execute!(
        stdout,
        SetForegroundColor(color),
        Print(text),
        ResetColor,
        Print("\n"),
    )?;
    stdout.flush()?;
    Ok(())
}

pub fn success(text: &str) -> Result<()> {
    print_colored(Colors::SUCCESS, text)
}

pub fn info(text: &str) -> Result<()> {
    print_colored(Colors::INFO, text)
}

pub fn warning(text: &str) -> Result<()> {
    print_colored(Colors::WARNING, text)
}

pub fn error(text: &str) -> Result<()> {
    print_colored(Colors::ERROR, text)
}

/// Print a header line followed by an uncolored block (tables, charts).
pub fn block(header: &str, body: &str) -> Result<()> {
    let mut stdout = io::stdout();
    execute!(
        stdout,
        Print("\n"),
        SetForegroundColor(Colors::HEADER),
        Print(header),
        ResetColor,
        Print("\n"),
        Print(body),
    )?;
    if !body.ends_with('\n') {
        execute!(stdout, Print("\n"))?;
    }
    stdout.flush()?;
    Ok(())
}
