fn main() {
    if let Err(e) = rollbook::app::run_cli() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
