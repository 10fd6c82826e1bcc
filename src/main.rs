fn main() {
    if let Err(err) = grant_scrub::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
