/*!
 * Gated progress output
 *
 * The picker owns the terminal while it runs. Everything else that wants to
 * write there checks the same `TerminalGate` first.
 */

use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Shared "UI active" flag.
///
/// Only code that opens the picker holds the gate; everybody else only reads
/// it. Holds nest: the gate stays closed until the outermost one is dropped.
#[derive(Debug, Clone, Default)]
pub struct TerminalGate {
    holds: Arc<AtomicUsize>,
}

impl TerminalGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a picker owns the terminal.
    pub fn is_held(&self) -> bool {
        self.holds.load(Ordering::Acquire) > 0
    }

    /// Marks the terminal as owned until the returned guard is dropped.
    pub fn hold(&self) -> GateHold {
        self.holds.fetch_add(1, Ordering::AcqRel);
        GateHold { gate: self.clone() }
    }
}

#[must_use = "the gate reopens as soon as the hold is dropped"]
#[derive(Debug)]
pub struct GateHold {
    gate: TerminalGate,
}

impl Drop for GateHold {
    fn drop(&mut self) {
        self.gate.holds.fetch_sub(1, Ordering::AcqRel);
    }
}

type Sink = Box<dyn Write + Send>;

/// Human-facing progress lines ("Searching nearby devices...").
///
/// Cheap to clone; a default `Progress` discards everything.
#[derive(Clone, Default)]
pub struct Progress {
    sink: Option<Arc<Mutex<Sink>>>,
    gate: TerminalGate,
}

impl Progress {
    pub fn new(sink: impl Write + Send + 'static, gate: TerminalGate) -> Self {
        Self {
            sink: Some(Arc::new(Mutex::new(Box::new(sink)))),
            gate,
        }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn gate(&self) -> &TerminalGate {
        &self.gate
    }

    pub fn line(&self, message: impl fmt::Display) {
        if self.gate.is_held() {
            return;
        }
        let Some(sink) = &self.sink else {
            return;
        };
        if let Ok(mut out) = sink.lock() {
            // Progress is best-effort; a broken stderr must not fail the operation.
            let _ = writeln!(out, "{message}");
            let _ = out.flush();
        }
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("enabled", &self.sink.is_some())
            .field("gate", &self.gate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Shared {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn lines_are_suppressed_while_gate_is_held() {
        let out = Shared::default();
        let gate = TerminalGate::new();
        let progress = Progress::new(out.clone(), gate.clone());

        progress.line("before");
        {
            let _hold = gate.hold();
            assert!(gate.is_held());
            progress.line("during");
        }
        assert!(!gate.is_held());
        progress.line("after");

        assert_eq!(out.text(), "before\nafter\n");
    }

    #[test]
    fn nested_holds_keep_the_gate_closed() {
        let gate = TerminalGate::new();
        let outer = gate.hold();
        {
            let _inner = gate.hold();
        }
        assert!(gate.is_held());
        drop(outer);
        assert!(!gate.is_held());
    }

    #[test]
    fn silent_progress_discards() {
        Progress::silent().line("nothing happens");
    }
}
