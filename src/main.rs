fn main() {
    if let Err(err) = labelsmith::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
