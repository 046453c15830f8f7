use std::io::Write;

use haven_core::Envelope;
use serde_json::Value;

use crate::error::CliError;

pub fn render(envelope: &Envelope<Value>, pretty: bool) -> Result<(), CliError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(envelope)?
    } else {
        serde_json::to_string(envelope)?
    };

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}")?;
    Ok(())
}
