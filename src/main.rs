use std::process::ExitCode;

fn main() -> ExitCode {
    match soos_sca::cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
