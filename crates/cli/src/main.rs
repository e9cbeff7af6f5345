use std::process::ExitCode;

fn main() -> ExitCode {
    invitey_cli::run()
}
