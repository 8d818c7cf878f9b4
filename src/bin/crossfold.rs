use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    crossfold::cli::run_crossfold(std::env::args().skip(1))
}
