// src/main.rs

use utf256::run_app;
use utf256::transcoder::Utf256Error;

fn main() {
    match run_app() {
        Ok(()) => {}
        Err(Utf256Error::Usage(usage)) => {
            eprint!("{}", usage);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
