/*!
 * Logging setup
 * tracing to stderr, muted while the picker owns the terminal
 */

use std::io::{self, Write};

use btswitch_core::TerminalGate;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Overrides the level chosen by `--verbose`.
pub const LOG_ENV: &str = "BTSWITCH_LOG";

pub fn init(verbose: bool, gate: TerminalGate) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(GatedStderr { gate })
        .with_target(false)
        .without_time()
        .init();
}

fn default_directives(verbose: bool) -> String {
    let log_level = if verbose { "debug" } else { "info" };
    format!("btswitch={log_level},btswitch_core={log_level}")
}

#[derive(Clone)]
struct GatedStderr {
    gate: TerminalGate,
}

impl<'a> MakeWriter<'a> for GatedStderr {
    type Writer = GatedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        if self.gate.is_held() {
            GatedWriter::Muted
        } else {
            GatedWriter::Stderr(io::stderr())
        }
    }
}

enum GatedWriter {
    Stderr(io::Stderr),
    Muted,
}

impl Write for GatedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            GatedWriter::Stderr(out) => out.write(buf),
            GatedWriter::Muted => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            GatedWriter::Stderr(out) => out.flush(),
            GatedWriter::Muted => Ok(()),
        }
    }
}
