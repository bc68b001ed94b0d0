use pipekit_cli::{classification_example, run_main};
use std::process::ExitCode;

fn main() -> ExitCode {
    run_main(|config, workspace, out| {
        classification_example::run(&config.classification, workspace, out).map(|_| ())
    })
}
