//! Entry point for the FLE toolchain.
//!
//! One binary, many names: the subcommand is the basename the binary was
//! invoked under (`cc`, `ld`, `objdump`, `nm`, `exec`, `readfle`). Invoked
//! as `fle`, the first argument names the tool instead.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fle::config::{self, Config};
use fle::fle::FleObject;
use fle::linker::Linker;
use fle::{cc, codec, exec, inspect};

fn main() {
    // Every failure surfaces as a single diagnostic line.
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = Config::parse();

    // Initialize logging; nm and readfle own stdout.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut args = config.args;
    let mut tool = invoked_as();
    if tool == "fle" || tool.is_empty() {
        if args.is_empty() {
            bail!("{USAGE}");
        }
        tool = args.remove(0);
    }

    match tool.as_str() {
        "cc" => cc::run(&args),
        "ld" => run_ld(&args),
        "objdump" => run_objdump(&args),
        "nm" => {
            let obj = load_single(&args, "nm <input.fle>")?;
            print!("{}", inspect::nm_listing(&obj));
            Ok(())
        }
        "readfle" => {
            let obj = load_single(&args, "readfle <input.fle>")?;
            print!("{}", inspect::summary(&obj));
            Ok(())
        }
        "exec" => {
            let obj = load_single(&args, "exec <input.fle>")?;
            exec::run(&obj)?;
            unreachable!("guest entry returned");
        }
        other => bail!("unknown tool {other:?}\n{USAGE}"),
    }
}

const USAGE: &str = "\
Usage: <tool> [args...]
Tools:
  cc [gcc options] -o out.fle      Compile C to an FLE object
  ld [-o output] input.fle...      Link FLE objects into an executable
  objdump <input.fle>              Re-emit an FLE file to <input>.objdump
  nm <input.fle>                   Print the symbol table
  readfle <input.fle>              Print a structural summary
  exec <input.fle>                 Map and run an FLE executable";

/// The basename this process was invoked under.
fn invoked_as() -> String {
    std::env::args()
        .next()
        .as_deref()
        .map(Path::new)
        .and_then(Path::file_stem)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn run_ld(args: &[String]) -> Result<()> {
    let config::LdInputs { output, inputs } = config::parse_ld_args(args);
    if inputs.is_empty() {
        bail!("no input files");
    }

    let mut linker = Linker::new();
    for path in &inputs {
        info!("loading {}", path.display());
        let obj = codec::load(path).with_context(|| format!("failed to load {}", path.display()))?;
        linker.add_object(obj)?;
    }

    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let exe = linker.link(&name)?;
    codec::save(&output, &exe)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!("linked {} inputs to {}", inputs.len(), output.display());
    Ok(())
}

fn run_objdump(args: &[String]) -> Result<()> {
    let [input] = args else {
        bail!("usage: objdump <input.fle>");
    };
    let path = PathBuf::from(input);
    let obj = codec::load(&path).with_context(|| format!("failed to load {input}"))?;
    let out = PathBuf::from(format!("{input}.objdump"));
    std::fs::write(&out, codec::emit(&obj))
        .with_context(|| format!("failed to write {}", out.display()))?;
    Ok(())
}

fn load_single(args: &[String], usage: &str) -> Result<FleObject> {
    let [input] = args else {
        bail!("usage: {usage}");
    };
    let path = PathBuf::from(input);
    codec::load(&path).with_context(|| format!("failed to load {input}"))
}
