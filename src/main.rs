use clap::Parser;
use pdf_chunk_translate::cli;
use tracing::error;

fn main() {
    dotenvy::dotenv().ok();
    let args = cli::Args::parse();
    let code = match cli::dispatch(args) {
        Ok(code) => code,
        Err(err) => {
            if tracing::dispatcher::has_been_set() {
                error!("{:#}", err);
            } else {
                eprintln!("error: {:#}", err);
            }
            1
        }
    };
    std::process::exit(code);
}
