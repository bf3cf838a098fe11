//! Compiler front-end.
//!
//! `cc` is an oracle over the host toolchain: it asks the system C compiler
//! for a relocatable ELF object, then lifts the loader-relevant parts
//! (ALLOC sections, defined symbols, supported relocations) into an FLE
//! `.obj` container.

use std::fs::File;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{bail, Context, Result};
use memmap2::Mmap;
use object::{
    Object, ObjectSection, ObjectSymbol, RelocationFlags, RelocationTarget, SectionKind,
    SymbolKind,
};
use tracing::{debug, info};

use crate::codec;
use crate::error::Error;
use crate::fle::{FleObject, ObjectType, RelocKind, Relocation, Section, Symbol, SymbolBinding};

/// Flags always passed to the host compiler: the object must be
/// freestanding and statically relocatable, with no unwind tables.
const CFLAGS: &[&str] = &[
    "-static",
    "-fno-common",
    "-nostdlib",
    "-ffreestanding",
    "-fno-asynchronous-unwind-tables",
];

/// Compile a translation unit and emit the FLE `.obj` named by `-o`.
pub fn run(args: &[String]) -> Result<()> {
    let (output, rest) = split_output(args)?;
    let temp_obj = output.with_extension("o");

    let mut cmd = Command::new("gcc");
    cmd.arg("-c")
        .args(CFLAGS)
        .args(&rest)
        .arg("-o")
        .arg(&temp_obj);
    info!("running {cmd:?}");
    let status = cmd.status().context("failed to spawn gcc")?;
    if !status.success() {
        bail!("gcc failed with {status}");
    }

    let file = File::open(&temp_obj)
        .with_context(|| format!("failed to open {}", temp_obj.display()))?;
    let mmap = unsafe { Mmap::map(&file)? };
    let elf = object::File::parse(&*mmap).context("failed to parse object file")?;

    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let obj = extract(&elf, &name)?;
    codec::save(&output, &obj)?;
    info!("wrote {}", output.display());

    std::fs::remove_file(&temp_obj).ok();
    Ok(())
}

/// Pull the `-o <path>` pair out of the argument list; everything else is
/// forwarded to the host compiler untouched.
fn split_output(args: &[String]) -> Result<(PathBuf, Vec<String>)> {
    let mut output = None;
    let mut rest = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "-o" {
            output = iter.next().map(PathBuf::from);
            continue;
        }
        rest.push(arg.clone());
    }
    match output {
        Some(output) => Ok((output, rest)),
        None => bail!("output file not specified"),
    }
}

/// Lift the loader-relevant parts of an ELF relocatable into an FLE object.
fn extract(elf: &object::File, name: &str) -> Result<FleObject> {
    let mut obj = FleObject::new(ObjectType::Obj, name);

    for sec in elf.sections() {
        let object::SectionFlags::Elf { sh_flags } = sec.flags() else {
            continue;
        };
        // Only ALLOC sections reach the image; the property note is ELF
        // plumbing with no FLE counterpart.
        if sh_flags & u64::from(object::elf::SHF_ALLOC) == 0 {
            continue;
        }
        let sec_name = sec.name()?;
        if sec_name.contains("note.gnu.property") {
            continue;
        }

        let mut section = Section::default();
        if sec.kind() == SectionKind::UninitializedData {
            section.bss_size = sec.size() as usize;
        } else {
            section.data = sec.data()?.to_vec();
        }

        for (offset, reloc) in sec.relocations() {
            let RelocationFlags::Elf { r_type } = reloc.flags() else {
                return Err(Error::UnsupportedReloc(format!("{:?}", reloc.flags())).into());
            };
            if r_type == object::elf::R_X86_64_NONE {
                continue;
            }
            let kind = map_reloc(r_type)
                .ok_or_else(|| Error::UnsupportedReloc(format!("R_X86_64 type {r_type}")))?;

            let RelocationTarget::Symbol(idx) = reloc.target() else {
                bail!("relocation at {offset:#x} in {sec_name} has no symbol target");
            };
            let target = elf.symbol_by_index(idx)?;
            let symbol = symbol_name(elf, &target)?;

            // The linker subtracts 8 when patching PC-relative sites, so
            // the stored addend is biased by +8 relative to ELF's.
            let addend = match kind {
                RelocKind::Pc32 => reloc.addend() + 8,
                _ => reloc.addend(),
            };
            section.relocs.push(Relocation {
                kind,
                offset: offset as usize,
                symbol,
                addend,
            });
        }
        section.relocs.sort_by_key(|r| r.offset);

        debug!(
            section = sec_name,
            bytes = section.data.len(),
            bss = section.bss_size,
            relocs = section.relocs.len(),
            "extracted section"
        );
        obj.sections.insert(sec_name.to_string(), section);
    }

    for sym in elf.symbols() {
        if sym.is_undefined() || sym.kind() == SymbolKind::File {
            continue;
        }
        let Some(idx) = sym.section_index() else {
            continue;
        };
        let Ok(sec) = elf.section_by_index(idx) else {
            continue;
        };
        let Ok(sec_name) = sec.name() else {
            continue;
        };
        if !obj.sections.contains_key(sec_name) {
            continue;
        }
        let name = symbol_name(elf, &sym)?;
        if name.is_empty() {
            continue;
        }

        let binding = if sym.is_local() {
            SymbolBinding::Local
        } else if sym.is_weak() {
            SymbolBinding::Weak
        } else {
            SymbolBinding::Global
        };
        obj.symbols.push(Symbol {
            name,
            binding,
            section: sec_name.to_string(),
            offset: sym.address() as usize,
            size: sym.size() as usize,
        });
    }

    Ok(obj)
}

fn map_reloc(r_type: u32) -> Option<RelocKind> {
    match r_type {
        object::elf::R_X86_64_PC32 | object::elf::R_X86_64_PLT32 => Some(RelocKind::Pc32),
        object::elf::R_X86_64_32 => Some(RelocKind::Abs32),
        object::elf::R_X86_64_32S => Some(RelocKind::Abs32S),
        object::elf::R_X86_64_64 => Some(RelocKind::Abs64),
        _ => None,
    }
}

/// FLE symbol names are bare identifiers; section symbols take their
/// section's name, and dots are rewritten to underscores.
fn symbol_name(elf: &object::File, sym: &object::Symbol) -> Result<String> {
    let name = if sym.kind() == SymbolKind::Section {
        match sym.section_index() {
            Some(idx) => elf.section_by_index(idx)?.name()?.to_string(),
            None => String::new(),
        }
    } else {
        sym.name()?.to_string()
    };
    Ok(name.replace('.', "_"))
}
