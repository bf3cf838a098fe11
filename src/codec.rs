//! FLE container codec.
//!
//! An FLE file is a JSON document, optionally preceded by a `#!` shebang
//! line. The top-level object carries a `"type"` tag, executable metadata
//! (`"entry"`, `"phdrs"`, `"shdrs"`), and one key per section whose value is
//! an ordered array of section lines:
//!
//! ```text
//! "🔢: 55 48 89 e5"        hex byte run
//! "🏷️: counter 8"          local symbol at the current offset
//! "📎: log 0"              weak global symbol
//! "📤: _start 0"           strong global symbol
//! "❓: rel(puts + 4)"      relocation; reserves width(kind) zero bytes
//! ```
//!
//! "Current offset" is the running length of the section's data as lines are
//! consumed. `.bss`-family sections carry no bytes; their symbol sizes
//! accumulate into `bss_size` instead.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::fle::{
    is_bss, FleObject, ObjectType, ProgramHeader, RelocKind, Relocation, Section, SectionHeader,
    Symbol, SymbolBinding,
};

/// Top-level keys that are not section names.
const RESERVED_KEYS: [&str; 4] = ["type", "entry", "phdrs", "shdrs"];

/// Load an FLE file from disk.
///
/// The object's `name` is the file's basename; the linker uses it to
/// namespace LOCAL symbols.
pub fn load(path: &Path) -> Result<FleObject> {
    let text = fs::read_to_string(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse(&name, &text)
}

/// Serialize an object and write it to disk.
pub fn save(path: &Path, obj: &FleObject) -> Result<()> {
    fs::write(path, emit(obj))?;
    Ok(())
}

/// Parse FLE container text into an object.
pub fn parse(name: &str, text: &str) -> Result<FleObject> {
    // A shebang line lets executables be invoked directly; it is not JSON.
    let text = match text.strip_prefix("#!") {
        Some(rest) => rest.split_once('\n').map(|(_, t)| t).unwrap_or(""),
        None => text,
    };

    let root: Value = serde_json::from_str(text)
        .map_err(|e| Error::BadContainer(format!("invalid JSON: {e}")))?;
    let Value::Object(root) = root else {
        return Err(Error::BadContainer("top level must be a JSON object".into()));
    };

    let kind = root
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::BadContainer("missing \"type\" tag".into()))?;
    let kind = ObjectType::from_tag(kind)
        .ok_or_else(|| Error::BadContainer(format!("unknown object type {kind:?}")))?;

    let mut obj = FleObject::new(kind, name);

    if let Some(entry) = root.get("entry") {
        let entry = entry
            .as_u64()
            .ok_or_else(|| Error::BadContainer("\"entry\" must be an unsigned integer".into()))?;
        obj.entry = Some(entry);
    }
    if let Some(phdrs) = root.get("phdrs") {
        obj.phdrs = parse_phdrs(phdrs)?;
    }
    if let Some(shdrs) = root.get("shdrs") {
        obj.shdrs = parse_shdrs(shdrs)?;
    }

    for (key, value) in &root {
        if RESERVED_KEYS.contains(&key.as_str()) {
            continue;
        }
        let Value::Array(lines) = value else {
            return Err(Error::BadContainer(format!(
                "section {key:?} must be an array of lines"
            )));
        };
        let section = parse_section(key, lines, &mut obj.symbols)?;
        debug!(
            section = key.as_str(),
            bytes = section.data.len(),
            bss = section.bss_size,
            relocs = section.relocs.len(),
            "parsed section"
        );
        obj.sections.insert(key.clone(), section);
    }

    Ok(obj)
}

fn parse_section(name: &str, lines: &[Value], symbols: &mut Vec<Symbol>) -> Result<Section> {
    let mut section = Section::default();
    let bss = is_bss(name);

    for line in lines {
        let line = line.as_str().ok_or_else(|| {
            Error::BadContainer(format!("section {name:?} contains a non-string line"))
        })?;
        let (tag, payload) = line
            .split_once(':')
            .ok_or_else(|| Error::BadContainer(format!("missing tag separator in {line:?}")))?;
        // The label emoji is usually written with a variation selector;
        // accept it either way.
        let tag = tag.trim().trim_end_matches('\u{fe0f}');
        let payload = payload.trim();

        let binding = match tag {
            "🏷" => Some(SymbolBinding::Local),
            "📎" => Some(SymbolBinding::Weak),
            "📤" => Some(SymbolBinding::Global),
            _ => None,
        };
        if let Some(binding) = binding {
            let sym = parse_symbol(binding, name, payload, &section)?;
            if bss {
                // Uninitialized symbols are accounted in bss_size, not data.
                section.bss_size += sym.size;
            }
            symbols.push(sym);
            continue;
        }

        match tag {
            "🔢" => {
                for tok in payload.split_whitespace() {
                    let byte = u8::from_str_radix(tok, 16).map_err(|_| {
                        Error::BadContainer(format!("bad hex byte {tok:?} in section {name}"))
                    })?;
                    section.data.push(byte);
                }
            }
            "❓" => {
                let reloc = parse_reloc(payload, section.data.len())?;
                // Reserve the patch site so subsequent offsets advance.
                section.data.extend(std::iter::repeat(0).take(reloc.kind.width()));
                section.relocs.push(reloc);
            }
            _ => {
                return Err(Error::BadContainer(format!(
                    "unknown tag {tag:?} in section {name}"
                )))
            }
        }
    }

    Ok(section)
}

fn parse_symbol(
    binding: SymbolBinding,
    section_name: &str,
    payload: &str,
    section: &Section,
) -> Result<Symbol> {
    let mut toks = payload.split_whitespace();
    let name = toks
        .next()
        .ok_or_else(|| Error::BadContainer(format!("symbol line without a name: {payload:?}")))?;
    // Old producers omitted the size; treat it as 0.
    let size = match toks.next() {
        Some(tok) => tok
            .parse::<usize>()
            .map_err(|_| Error::BadContainer(format!("bad symbol size {tok:?}")))?,
        None => 0,
    };
    if toks.next().is_some() {
        return Err(Error::BadContainer(format!(
            "trailing junk in symbol line: {payload:?}"
        )));
    }

    let offset = if is_bss(section_name) {
        section.data.len() + section.bss_size
    } else {
        section.data.len()
    };
    Ok(Symbol {
        name: name.to_string(),
        binding,
        section: section_name.to_string(),
        offset,
        size,
    })
}

/// Parse a relocation payload: `<kind>(<symbol> <sign> <addend>)`.
///
/// A leading `.` on the kind and a trailing `- 📍` inside the parentheses
/// are historical decorations and are accepted silently. The addend may be
/// decimal or `0x`-prefixed hex.
fn parse_reloc(payload: &str, offset: usize) -> Result<Relocation> {
    let (kind, rest) = payload
        .split_once('(')
        .ok_or_else(|| Error::BadContainer(format!("malformed relocation: {payload:?}")))?;
    let inner = rest
        .strip_suffix(')')
        .ok_or_else(|| Error::BadContainer(format!("malformed relocation: {payload:?}")))?;

    let kind = kind.trim().trim_start_matches('.');
    let kind = RelocKind::from_tag(kind).ok_or_else(|| Error::UnsupportedReloc(kind.to_string()))?;

    // Some emitters append "- 📍" to spell out the PC term; it carries no
    // information.
    let mut inner = inner.trim();
    if let Some(stripped) = inner.strip_suffix("📍") {
        inner = stripped
            .trim_end()
            .strip_suffix('-')
            .ok_or_else(|| Error::BadContainer(format!("malformed relocation: {payload:?}")))?
            .trim_end();
    }

    let toks: Vec<&str> = inner.split_whitespace().collect();
    let (symbol, addend) = match toks.as_slice() {
        [sym] => (*sym, 0i64),
        [sym, sign @ ("+" | "-"), num] => {
            let magnitude = parse_int(num)
                .ok_or_else(|| Error::BadContainer(format!("bad addend {num:?}")))?;
            let addend = if *sign == "-" { -magnitude } else { magnitude };
            (*sym, addend)
        }
        _ => {
            return Err(Error::BadContainer(format!(
                "malformed relocation expression: {inner:?}"
            )))
        }
    };

    Ok(Relocation {
        kind,
        offset,
        symbol: symbol.to_string(),
        addend,
    })
}

fn parse_int(tok: &str) -> Option<i64> {
    match tok.strip_prefix("0x").or_else(|| tok.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok(),
        None => tok.parse().ok(),
    }
}

fn parse_phdrs(value: &Value) -> Result<Vec<ProgramHeader>> {
    let Value::Array(records) = value else {
        return Err(Error::BadContainer("\"phdrs\" must be an array".into()));
    };
    records
        .iter()
        .map(|rec| {
            Ok(ProgramHeader {
                name: field_str(rec, "name")?.to_string(),
                vaddr: field_u64(rec, "vaddr")?,
                size: field_u64(rec, "size")?,
                flags: field_u64(rec, "flags")? as u32,
            })
        })
        .collect()
}

fn parse_shdrs(value: &Value) -> Result<Vec<SectionHeader>> {
    let Value::Array(records) = value else {
        return Err(Error::BadContainer("\"shdrs\" must be an array".into()));
    };
    records
        .iter()
        .map(|rec| {
            Ok(SectionHeader {
                name: field_str(rec, "name")?.to_string(),
                sh_type: field_u64(rec, "type")? as u32,
                flags: field_u64(rec, "flags")? as u32,
                addr: field_u64(rec, "addr")?,
                offset: field_u64(rec, "offset")?,
                size: field_u64(rec, "size")?,
                addralign: field_u64(rec, "addralign")?,
            })
        })
        .collect()
}

fn field_str<'a>(rec: &'a Value, key: &str) -> Result<&'a str> {
    rec.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::BadContainer(format!("header record missing {key:?}")))
}

fn field_u64(rec: &Value, key: &str) -> Result<u64> {
    rec.get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::BadContainer(format!("header record missing {key:?}")))
}

/// Render an object back to container text.
///
/// Keys are written in a fixed order (`type`, executable metadata, then
/// sections in insertion order) so that emitted files diff cleanly. Byte
/// runs are normalized to rows of at most 16 bytes.
pub fn emit(obj: &FleObject) -> String {
    let mut root = Map::new();
    root.insert("type".into(), Value::from(obj.kind.as_str()));

    if obj.kind == ObjectType::Exe {
        if let Some(entry) = obj.entry {
            root.insert("entry".into(), Value::from(entry));
        }
        if !obj.phdrs.is_empty() {
            root.insert(
                "phdrs".into(),
                Value::from(obj.phdrs.iter().map(phdr_record).collect::<Vec<_>>()),
            );
        }
        if !obj.shdrs.is_empty() {
            root.insert(
                "shdrs".into(),
                Value::from(obj.shdrs.iter().map(shdr_record).collect::<Vec<_>>()),
            );
        }
    }

    for (name, section) in &obj.sections {
        let lines = section_lines(name, section, &obj.symbols);
        root.insert(name.clone(), Value::from(lines));
    }

    let mut text = serde_json::to_string_pretty(&Value::Object(root))
        .expect("object model is always serializable");
    text.push('\n');
    text
}

fn phdr_record(ph: &ProgramHeader) -> Value {
    let mut rec = Map::new();
    rec.insert("name".into(), Value::from(ph.name.as_str()));
    rec.insert("vaddr".into(), Value::from(ph.vaddr));
    rec.insert("size".into(), Value::from(ph.size));
    rec.insert("flags".into(), Value::from(ph.flags));
    Value::Object(rec)
}

fn shdr_record(sh: &SectionHeader) -> Value {
    let mut rec = Map::new();
    rec.insert("name".into(), Value::from(sh.name.as_str()));
    rec.insert("type".into(), Value::from(sh.sh_type));
    rec.insert("flags".into(), Value::from(sh.flags));
    rec.insert("addr".into(), Value::from(sh.addr));
    rec.insert("offset".into(), Value::from(sh.offset));
    rec.insert("size".into(), Value::from(sh.size));
    rec.insert("addralign".into(), Value::from(sh.addralign));
    Value::Object(rec)
}

fn symbol_line(sym: &Symbol, size: usize) -> String {
    let tag = match sym.binding {
        SymbolBinding::Local => "🏷️",
        SymbolBinding::Weak => "📎",
        SymbolBinding::Global => "📤",
    };
    format!("{tag}: {} {}", sym.name, size)
}

fn reloc_line(reloc: &Relocation) -> String {
    let sign = if reloc.addend < 0 { '-' } else { '+' };
    format!(
        "❓: {}({} {} {})",
        reloc.kind.tag(),
        reloc.symbol,
        sign,
        reloc.addend.unsigned_abs()
    )
}

/// Render one section as an ordered run of tagged lines.
///
/// The cursor walks `data`; at every offset that carries a symbol or a
/// relocation the byte run is broken, symbol lines are emitted before any
/// relocation line, and a relocation advances the cursor past its reserved
/// placeholder bytes.
fn section_lines(name: &str, section: &Section, symbols: &[Symbol]) -> Vec<String> {
    let mut syms: Vec<&Symbol> = symbols.iter().filter(|s| s.section == name).collect();
    syms.sort_by_key(|s| s.offset);

    let mut relocs: Vec<&Relocation> = section.relocs.iter().collect();
    relocs.sort_by_key(|r| r.offset);

    let mut breaks: Vec<usize> = syms
        .iter()
        .map(|s| s.offset)
        .chain(relocs.iter().map(|r| r.offset))
        .collect();
    breaks.sort_unstable();
    breaks.dedup();

    let bss = is_bss(name);
    let mut lines = Vec::new();
    let mut pos = 0usize;
    let mut sym_idx = 0usize;
    let mut reloc_idx = 0usize;

    loop {
        while sym_idx < syms.len() && syms[sym_idx].offset == pos {
            let sym = syms[sym_idx];
            lines.push(symbol_line(sym, emitted_size(&syms, sym_idx, section, bss)));
            sym_idx += 1;
        }
        if reloc_idx < relocs.len() && relocs[reloc_idx].offset == pos {
            let reloc = relocs[reloc_idx];
            lines.push(reloc_line(reloc));
            pos += reloc.kind.width();
            reloc_idx += 1;
            continue;
        }
        if pos >= section.data.len() {
            break;
        }
        let next_break = breaks
            .iter()
            .find(|&&b| b > pos)
            .copied()
            .unwrap_or(section.data.len())
            .min(section.data.len());
        while pos < next_break {
            let chunk = (next_break - pos).min(16);
            lines.push(hex_line(&section.data[pos..pos + chunk]));
            pos += chunk;
        }
    }

    // Symbols past the end of the data: the uninitialized tail.
    while sym_idx < syms.len() {
        let sym = syms[sym_idx];
        lines.push(symbol_line(sym, emitted_size(&syms, sym_idx, section, bss)));
        sym_idx += 1;
    }

    lines
}

/// In a `.bss`-family section the only way the text encodes layout is
/// through symbol sizes, so each symbol's emitted size is stretched to reach
/// the next symbol (or the section's end). For loaded objects the offsets
/// are cumulative sums of sizes already, so this is the identity.
fn emitted_size(syms: &[&Symbol], idx: usize, section: &Section, bss: bool) -> usize {
    if !bss {
        return syms[idx].size;
    }
    let sym = syms[idx];
    match syms.get(idx + 1) {
        Some(next) => next.offset - sym.offset,
        None => section.size() - sym.offset,
    }
}

fn hex_line(bytes: &[u8]) -> String {
    let run: Vec<String> = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("🔢: {}", run.join(" "))
}
