use std::process::ExitCode;

fn main() -> ExitCode {
    soberly_cli::run()
}
