fn main() {
    if let Err(err) = blockmesh::cli::run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}
