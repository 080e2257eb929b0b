use std::process::ExitCode;

fn main() -> ExitCode {
    match comove::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("comove: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
