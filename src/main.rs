//! Puente CLI — bridge Terraform plans to serverless templates.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "puente",
    version,
    about = "Translate terraform plans into serverless templates with linked build rules"
)]
struct Cli {
    #[command(subcommand)]
    command: puente::cli::Commands,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = puente::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
