use pipekit_cli::{regression_example, run_main};
use std::process::ExitCode;

fn main() -> ExitCode {
    run_main(|config, workspace, out| {
        regression_example::run(&config.regression, workspace, out).map(|_| ())
    })
}
