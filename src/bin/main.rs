/// Cadenza console binary.
///
/// Starts an interactive async-aware console by default; see `--help` for
/// the script and one-shot evaluation modes.
use cadenza::cli;

fn main() {
    tracing_subscriber::fmt::init();

    match cli::run_cli() {
        Ok(status) => std::process::exit(status),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
