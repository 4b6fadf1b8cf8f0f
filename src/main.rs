fn main() {
    if let Err(err) = rsasconv::cli::run() {
        rsasconv::ui::eprintln_error(&err);
        std::process::exit(rsasconv::exit::exit_code(&err));
    }
}
