pub mod describe;
pub mod gen;
pub mod signature;

use std::path::{Path, PathBuf};
use std::process;

use clap::Args;

use kernelbind::access::CallMode;
use kernelbind::binding::{BoundCall, CallArgs, Vectorization};
use kernelbind::config::BindOptions;
use kernelbind::manifest::CallManifest;
use kernelbind::marshall::MarshallRegistry;
use kernelbind::reflection::KernelFunction;
use kernelbind::types::ModuleLayout;
use kernelbind::CallSignature;

/// Arguments shared by every command that resolves a call file.
#[derive(Args)]
pub struct CallFileArgs {
    /// Call file (.toml) describing the kernel function and its arguments
    pub input: PathBuf,
    /// Resolve derivatives (backward mode) instead of primal evaluation
    #[arg(long)]
    pub backward: bool,
    /// Reject implicit broadcasts that are neither scalar nor full rank
    #[arg(long)]
    pub strict: bool,
}

impl CallFileArgs {
    pub fn mode(&self) -> CallMode {
        if self.backward {
            CallMode::Backward
        } else {
            CallMode::Forward
        }
    }
}

/// A call file with every name resolved.
pub struct LoadedCall {
    pub path: PathBuf,
    pub layout: ModuleLayout,
    pub function: KernelFunction,
    pub call: CallArgs,
    pub vectorization: Vectorization,
    pub options: BindOptions,
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {}", message);
    process::exit(1);
}

/// Load a call file, exiting with a message on any error.
///
/// Options come from the nearest `kernelbind.toml` and the environment,
/// then the call file's own `[options]`, then `--strict`.
pub fn load_call(args: &CallFileArgs) -> LoadedCall {
    let manifest = CallManifest::load(&args.input).unwrap_or_else(|e| fail(e));
    let layout = manifest.layout().unwrap_or_else(|e| fail(e));
    let function = manifest.function(&layout).unwrap_or_else(|e| fail(e));
    let call = manifest.call_args(&layout).unwrap_or_else(|e| fail(e));
    let vectorization = manifest.vectorization().unwrap_or_else(|e| fail(e));

    let dir = args.input.parent().unwrap_or(Path::new("."));
    let mut options = match manifest.options {
        Some(options) => options,
        None => BindOptions::resolve(dir).unwrap_or_else(|e| fail(e)),
    };
    if args.strict {
        options.strict_broadcasting = true;
    }

    LoadedCall {
        path: args.input.clone(),
        layout,
        function,
        call,
        vectorization,
        options,
    }
}

/// Text an error report points into: the bound call when binding
/// succeeds, otherwise just the function name.
fn call_text(registry: &MarshallRegistry, loaded: &LoadedCall) -> String {
    match BoundCall::new(registry, &loaded.call) {
        Ok(mut call) => {
            let _ = call.bind(&loaded.function);
            call.describe()
        }
        Err(_) => format!("{}(...)\n", loaded.function.name),
    }
}

/// Run the full pipeline, rendering a diagnostic and exiting on failure.
pub fn build_or_exit(loaded: &LoadedCall, mode: CallMode) -> CallSignature {
    let registry = MarshallRegistry::builtin();
    match kernelbind::build_call_signature(
        &registry,
        &loaded.layout,
        &loaded.function,
        mode,
        loaded.options,
        &loaded.call,
        &loaded.vectorization,
    ) {
        Ok(signature) => signature,
        Err(err) => {
            let filename = loaded.path.display().to_string();
            err.render(&filename, &call_text(&registry, loaded));
            process::exit(1);
        }
    }
}
