use clap::Args;

use super::{build_or_exit, load_call, CallFileArgs};

#[derive(Args)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub call: CallFileArgs,
}

pub fn cmd_describe(args: DescribeArgs) {
    let loaded = load_call(&args.call);
    let signature = build_or_exit(&loaded, args.call.mode());

    print!("{}", signature.call.describe());
    println!(
        "call dimensionality: {} ({})",
        signature.call_dimensionality,
        args.call.mode()
    );
}
