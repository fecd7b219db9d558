use qrc_transport::available_lines;

use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_lines, OutputFormat};

pub fn run(format: OutputFormat) -> CliResult<i32> {
    let lines = available_lines().map_err(|e| transport_error("port enumeration failed", e))?;
    tracing::debug!(count = lines.len(), "serial ports enumerated");
    print_lines(&lines, format);
    Ok(SUCCESS)
}
