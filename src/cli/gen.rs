use std::path::PathBuf;

use clap::Args;

use super::{build_or_exit, load_call, CallFileArgs};

#[derive(Args)]
pub struct GenArgs {
    #[command(flatten)]
    pub call: CallFileArgs,
    /// Write the generated code to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn cmd_gen(args: GenArgs) {
    let loaded = load_call(&args.call);
    let signature = build_or_exit(&loaded, args.call.mode());

    match args.output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, &signature.code) {
                eprintln!("error: cannot write '{}': {}", path.display(), e);
                std::process::exit(1);
            }
            eprintln!(
                "Generated {} (call dimensionality {})",
                path.display(),
                signature.call_dimensionality
            );
        }
        None => print!("{}", signature.code),
    }
}
