//! Main entry point for the embedfs CLI app

fn main() -> std::process::ExitCode {
    match embedfs::cli_runner::run_cli_app() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::ExitCode::FAILURE
        }
    }
}
