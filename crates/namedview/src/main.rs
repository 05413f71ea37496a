//! Binary entrypoint for the `namedview` query server.

use std::io::{self, Write};
use std::process::ExitCode;

use namedview::{FunctionTable, serve, telemetry};
use namedview_config::Config;

fn main() -> ExitCode {
    let config = Config::load();
    if let Err(error) = telemetry::initialise(&config) {
        writeln!(io::stderr().lock(), "{error}").ok();
        return ExitCode::FAILURE;
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(
        FunctionTable::with_builtins(),
        &config,
        stdin.lock(),
        stdout.lock(),
    )
}
