//! Terminal output: markdown rendering and live tool output.

use std::io::{self, Write};

use anyhow::Result;
use dossier_core::{ExitOutcome, OutputSink};
use log::debug;
use termimad::{crossterm::style::Color, MadSkin};

/// Terminal renderer that can switch between rich and plain text output
pub struct TerminalRenderer {
    rich_enabled: bool,
    skin: MadSkin,
}

impl TerminalRenderer {
    pub fn new(rich_enabled: bool) -> Self {
        let mut skin = MadSkin::default();
        skin.set_headers_fg(Color::Blue);
        skin.bold.set_fg(Color::Yellow);
        skin.italic.set_fg(Color::Magenta);
        skin.inline_code.set_bg(Color::AnsiValue(238));

        Self { rich_enabled, skin }
    }

    /// Render markdown text to terminal
    pub fn render(&self, markdown: &str) -> Result<()> {
        if !self.rich_enabled {
            print!("{markdown}");
            return Ok(());
        }
        for line in markdown.lines() {
            if line.starts_with('#') {
                println!("\x1b[34m{line}\x1b[0m");
            } else {
                self.skin.print_inline(line);
                println!();
            }
        }
        Ok(())
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Verbose mode: external tool output goes straight to the terminal.
#[derive(Debug, Default)]
pub struct LiveOutput;

impl OutputSink for LiveOutput {
    fn stdout(&mut self, chunk: &[u8]) {
        if let Err(e) = forward(&mut io::stdout().lock(), chunk) {
            debug!("Unable to show tool output: {e}");
        }
    }

    fn stderr(&mut self, chunk: &[u8]) {
        if let Err(e) = forward(&mut io::stderr().lock(), chunk) {
            debug!("Unable to show tool errors: {e}");
        }
    }

    fn exited(&mut self, outcome: &ExitOutcome) {
        if !outcome.success() {
            eprintln!("command {outcome}");
        }
    }
}

fn forward(out: &mut impl Write, chunk: &[u8]) -> io::Result<()> {
    out.write_all(chunk)?;
    out.flush()
}
