fn main() {
    if let Err(err) = sheet2sql::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
