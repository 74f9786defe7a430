use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::describe::DescribeArgs;
use cli::gen::GenArgs;
use cli::signature::SignatureArgs;

#[derive(Parser)]
#[command(
    name = "kernelbind",
    version,
    about = "Bind host arguments to a kernel function and generate its call data"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate call-data code for a call file
    Gen(GenArgs),
    /// Print the specialization signature and its hash
    Signature(SignatureArgs),
    /// Print the resolved binding tree
    Describe(DescribeArgs),
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Command::Gen(args) => cli::gen::cmd_gen(args),
        Command::Signature(args) => cli::signature::cmd_signature(args),
        Command::Describe(args) => cli::describe::cmd_describe(args),
    }
}
