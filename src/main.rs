fn main() {
    if let Err(e) = skysniffer_lib::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
