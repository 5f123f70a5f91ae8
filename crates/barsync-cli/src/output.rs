use std::io::{self, Write};

use serde::Serialize;

use crate::error::CliError;

/// Write one JSON document to stdout.
pub fn render<T: Serialize>(value: &T, pretty: bool) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_json(&mut handle, value, pretty)?;
    handle.flush()?;
    Ok(())
}

fn write_json<W: Write, T: Serialize>(
    writer: &mut W,
    value: &T,
    pretty: bool,
) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(&mut *writer, value)?;
    } else {
        serde_json::to_writer(&mut *writer, value)?;
    }
    writer.write_all(b"\n")?;
    Ok(())
}
