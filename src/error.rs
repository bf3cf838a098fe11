//! Error taxonomy for the FLE toolchain.
//!
//! Every failure the codec, linker, or executor can produce is one of these
//! variants. Nothing is retried or recovered locally; errors propagate to the
//! top-level dispatch, which prints one line and exits non-zero.

use std::fmt;
use std::io;

use crate::fle::RelocKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// Syntactic or grammatical error in FLE container text.
    BadContainer(String),
    /// Relocation kind outside the supported set.
    UnsupportedReloc(String),
    /// Reference to a symbol no input defines.
    UndefinedSymbol(String),
    /// A symbol names a section absent from the inputs.
    UndefinedSection { symbol: String, section: String },
    /// Two GLOBAL definitions of the same name.
    MultipleDefinition(String),
    /// `_start` not found.
    NoEntry,
    /// Patch value out of range for the relocation kind.
    RelocationOverflow {
        symbol: String,
        kind: RelocKind,
        value: i128,
    },
    /// The host refused a fixed-address mapping.
    MapFailed { addr: u64, source: io::Error },
    /// `exec` was given something other than a `.exe`.
    NotExecutable(String),
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadContainer(msg) => write!(f, "bad container: {msg}"),
            Error::UnsupportedReloc(kind) => write!(f, "unsupported relocation: {kind}"),
            Error::UndefinedSymbol(name) => write!(f, "undefined symbol: {name}"),
            Error::UndefinedSection { symbol, section } => {
                write!(f, "symbol {symbol} refers to non-existent section {section}")
            }
            Error::MultipleDefinition(name) => {
                write!(f, "multiple definition of strong symbol: {name}")
            }
            Error::NoEntry => write!(f, "no _start symbol found"),
            Error::RelocationOverflow {
                symbol,
                kind,
                value,
            } => write!(
                f,
                "relocation overflow: {symbol} value {value:#x} does not fit {}",
                kind.tag()
            ),
            Error::MapFailed { addr, source } => {
                write!(f, "mmap at {addr:#x} failed: {source}")
            }
            Error::NotExecutable(kind) => {
                write!(f, "file is not an executable FLE (type {kind})")
            }
            Error::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) | Error::MapFailed { source: e, .. } => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
