//! `ferry` binary entrypoint.

fn main() {
    std::process::exit(ferry_cli::run());
}
