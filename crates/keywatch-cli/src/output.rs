//! Value printing.

use std::io::Write;

/// Printed for a key that is absent or was deleted.
pub const ABSENT: &str = "<absent>";

/// Writes one value per line to stdout.
pub fn print_value(value: Option<&[u8]>) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    write_value(&mut stdout, value)?;
    stdout.flush()?;
    Ok(())
}

fn write_value(out: &mut impl Write, value: Option<&[u8]>) -> std::io::Result<()> {
    match value {
        Some(value) => {
            out.write_all(value)?;
            if !value.ends_with(b"\n") {
                out.write_all(b"\n")?;
            }
            Ok(())
        }
        None => writeln!(out, "{ABSENT}"),
    }
}
