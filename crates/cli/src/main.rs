use std::process::ExitCode;

fn main() -> ExitCode {
    aiaa_cli::run()
}
