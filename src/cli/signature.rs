use clap::Args;

use super::{build_or_exit, load_call, CallFileArgs};

#[derive(Args)]
pub struct SignatureArgs {
    #[command(flatten)]
    pub call: CallFileArgs,
    /// Show the full 256-bit hash instead of the short form
    #[arg(long)]
    pub full: bool,
}

pub fn cmd_signature(args: SignatureArgs) {
    let loaded = load_call(&args.call);
    let signature = build_or_exit(&loaded, args.call.mode());

    let hash = signature.call.signature_hash();
    let hash = if args.full { &hash[..] } else { &hash[..16] };
    println!("{} {}", hash, signature.call.signature());
}
