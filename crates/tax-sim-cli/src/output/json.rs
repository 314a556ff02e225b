use serde_json::Value;
use std::io::{self, Write};

/// Pretty-printed JSON on stdout, keys in the order the engine emits them.
pub fn print_json(value: &Value) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let written = serde_json::to_writer_pretty(&mut out, value)
        .map_err(io::Error::from)
        .and_then(|_| writeln!(out));
    if let Err(e) = written {
        eprintln!("failed to write JSON output: {}", e);
    }
}
