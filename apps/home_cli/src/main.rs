fn main() {
    if let Err(err) = home_cli::run_cli() {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}
