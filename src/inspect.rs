//! Object inspectors.
//!
//! `nm` renders a Unix-style symbol listing; `readfle` a structural
//! summary. `objdump` needs no code of its own: it is the codec's emitter
//! pointed back at a loaded file.

use std::fmt::Write;

use crate::fle::{is_bss, FleObject, Symbol, SymbolBinding};

/// Render an `nm`-style listing, one line per symbol in table order.
pub fn nm_listing(obj: &FleObject) -> String {
    let mut out = String::new();
    for sym in &obj.symbols {
        if sym.section.is_empty() {
            // Undefined: no address, just the letter column.
            writeln!(out, "{:16} U {}", "", sym.name).unwrap();
            continue;
        }
        writeln!(out, "{:016x} {} {}", sym.offset, symbol_letter(sym), sym.name).unwrap();
    }
    out
}

/// Classic nm letter rules: weak symbols are W (text) or V (elsewhere);
/// otherwise the section family's letter, uppercased for GLOBAL.
fn symbol_letter(sym: &Symbol) -> char {
    if sym.binding == SymbolBinding::Weak {
        return if sym.section.starts_with(".text") {
            'W'
        } else {
            'V'
        };
    }
    let base = if sym.section.starts_with(".text") {
        't'
    } else if is_bss(&sym.section) {
        'b'
    } else if sym.section.starts_with(".rodata") {
        'r'
    } else if sym.section.starts_with(".data") {
        'd'
    } else {
        '?'
    };
    if sym.binding == SymbolBinding::Global {
        base.to_ascii_uppercase()
    } else {
        base
    }
}

/// Render the `readfle` overview of an object.
pub fn summary(obj: &FleObject) -> String {
    let relocs: usize = obj.sections.values().map(|s| s.relocs.len()).sum();

    let mut out = String::new();
    writeln!(out, "FLE File Information:").unwrap();
    writeln!(out, "Sections: {}", obj.sections.len()).unwrap();
    writeln!(out, "Symbols: {}", obj.symbols.len()).unwrap();
    writeln!(out, "Relocations: {relocs}").unwrap();
    writeln!(out).unwrap();
    writeln!(out, "Section Summary:").unwrap();
    for (name, sec) in &obj.sections {
        writeln!(out, "{name}: {} bytes ({})", sec.size(), section_class(name)).unwrap();
    }
    out
}

fn section_class(name: &str) -> &'static str {
    if is_bss(name) {
        "BSS"
    } else if name.starts_with(".text") {
        "PROGRAM"
    } else if name.starts_with(".rodata") {
        "RODATA"
    } else {
        "DATA"
    }
}
