//! Command-line configuration.
//!
//! The toolchain ships as one multi-call binary; the tool is chosen by the
//! basename it was invoked under. Tool arguments are order-sensitive (`ld`
//! concatenates sections in input order, `cc` forwards gcc options
//! verbatim), and clap can't preserve interleaved order, so we capture all
//! positionals and scan them ourselves.

use clap::Parser;
use std::path::PathBuf;

/// A friendly, JSON-based object/executable toolchain for x86-64.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Config {
    /// Tool arguments, in order.
    #[arg(allow_hyphen_values = true, num_args = 0.., trailing_var_arg = true)]
    pub args: Vec<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Parsed `ld` command line.
pub struct LdInputs {
    pub output: PathBuf,
    pub inputs: Vec<PathBuf>,
}

/// Scan `ld` arguments in order: `-o <path>` picks the output, everything
/// else is an input file.
pub fn parse_ld_args(args: &[String]) -> LdInputs {
    let mut output = PathBuf::from("a.out");
    let mut inputs = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "-o" {
            if let Some(path) = iter.next() {
                output = PathBuf::from(path);
            }
            continue;
        }
        inputs.push(PathBuf::from(arg));
    }

    LdInputs { output, inputs }
}
