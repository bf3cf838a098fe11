//! FLE static linker.
//!
//! 1. Collect `.obj` inputs
//! 2. Group and lay out sections in virtual memory
//! 3. Resolve symbols into local and global tables
//! 4. Patch relocations
//! 5. Produce the `.exe` object
//!
//! The linker is pure with respect to its inputs: it consumes loaded
//! objects and returns a new executable object, leaving file I/O and
//! serialization to the caller.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::fle::{
    is_bss, FleObject, ObjectType, ProgramHeader, RelocKind, Section, SectionHeader, Symbol,
    SymbolBinding, PF_W, PF_X, SHF_ALLOC, SHF_EXECINSTR, SHF_WRITE, SHT_NOBITS, SHT_PROGBITS,
};
use crate::layout::{align_up, GroupMember, SectionGroup};

pub const PAGE_SIZE: u64 = 0x1000;
pub const BASE_ADDR: u64 = 0x400000;

/// A GLOBAL or WEAK definition that won resolution so far.
#[derive(Debug, Clone)]
struct GlobalSymbol {
    binding: SymbolBinding,
    /// Virtual offset from the image base.
    global_offset: u64,
    /// Name of the merged section holding the definition.
    section: String,
    size: usize,
}

pub struct Linker {
    objects: Vec<FleObject>,
    groups: Vec<SectionGroup>,
    /// `(object index, section name)` → `(group index, member index)`.
    member_map: HashMap<(usize, String), (usize, usize)>,
    /// Winning GLOBAL/WEAK definitions, keyed by name.
    globals: HashMap<String, GlobalSymbol>,
    /// LOCAL definitions, keyed `<object-name>.<symbol-name>`.
    locals: HashMap<String, u64>,
}

impl Linker {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            groups: Vec::new(),
            member_map: HashMap::new(),
            globals: HashMap::new(),
            locals: HashMap::new(),
        }
    }

    /// Add one relocatable input. Input order is significant: it decides
    /// section placement and WEAK/WEAK ties.
    pub fn add_object(&mut self, obj: FleObject) -> Result<()> {
        if obj.kind != ObjectType::Obj {
            return Err(Error::BadContainer(format!(
                "{}: not a relocatable object",
                obj.name
            )));
        }
        info!(
            object = obj.name.as_str(),
            sections = obj.sections.len(),
            symbols = obj.symbols.len(),
            "adding input"
        );
        self.objects.push(obj);
        Ok(())
    }

    /// Run all phases and produce the executable object.
    pub fn link(mut self, output_name: &str) -> Result<FleObject> {
        self.layout();
        self.resolve_symbols()?;
        self.relocate()?;
        self.finish(output_name)
    }

    /// Merge non-empty sections by name (first-seen order) and assign each
    /// group a page-aligned virtual address range above `BASE_ADDR`.
    fn layout(&mut self) {
        for (idx, obj) in self.objects.iter().enumerate() {
            for (name, sec) in &obj.sections {
                let nonempty = !sec.data.is_empty() || (is_bss(name) && sec.bss_size > 0);
                if !nonempty {
                    continue;
                }

                let gi = match self.groups.iter().position(|g| &g.name == name) {
                    Some(gi) => gi,
                    None => {
                        self.groups.push(SectionGroup::new(name));
                        self.groups.len() - 1
                    }
                };
                let group = &mut self.groups[gi];

                let group_offset;
                if group.is_bss() {
                    // NOBITS members are a size reservation, not bytes.
                    group_offset = group.bss_size;
                    group.bss_size += sec.size();
                } else {
                    group_offset = group.data.len();
                    group.data.extend_from_slice(&sec.data);
                }
                group.members.push(GroupMember {
                    object_index: idx,
                    group_offset,
                    global_offset: 0,
                });
                self.member_map
                    .insert((idx, name.clone()), (gi, group.members.len() - 1));
            }
        }

        // Segments get distinct permissions, so no two may share a page.
        let mut va = 0u64;
        for group in &mut self.groups {
            group.vaddr = BASE_ADDR + va;
            for member in &mut group.members {
                member.global_offset = va + member.group_offset as u64;
            }
            debug!(
                section = group.name.as_str(),
                vaddr = format_args!("{:#x}", group.vaddr),
                size = group.size(),
                "placed section"
            );
            va = align_up(va + group.size(), PAGE_SIZE);
        }
    }

    /// Build the local and global symbol tables.
    ///
    /// LOCAL symbols are namespaced by their object's basename and never
    /// escape it. GLOBAL beats WEAK; the first WEAK wins a WEAK/WEAK tie;
    /// two GLOBALs of the same name are an error.
    fn resolve_symbols(&mut self) -> Result<()> {
        for (idx, obj) in self.objects.iter().enumerate() {
            for sym in &obj.symbols {
                let Some(&(gi, mi)) = self.member_map.get(&(idx, sym.section.clone())) else {
                    return Err(Error::UndefinedSection {
                        symbol: sym.name.clone(),
                        section: sym.section.clone(),
                    });
                };
                let member = &self.groups[gi].members[mi];
                let global_offset = member.global_offset + sym.offset as u64;

                match sym.binding {
                    SymbolBinding::Local => {
                        self.locals
                            .insert(format!("{}.{}", obj.name, sym.name), global_offset);
                    }
                    SymbolBinding::Weak | SymbolBinding::Global => {
                        let incoming = GlobalSymbol {
                            binding: sym.binding,
                            global_offset,
                            section: self.groups[gi].name.clone(),
                            size: sym.size,
                        };
                        match self.globals.entry(sym.name.clone()) {
                            Entry::Vacant(slot) => {
                                slot.insert(incoming);
                            }
                            Entry::Occupied(mut slot) => {
                                match (slot.get().binding, sym.binding) {
                                    (SymbolBinding::Global, SymbolBinding::Global) => {
                                        return Err(Error::MultipleDefinition(sym.name.clone()));
                                    }
                                    (SymbolBinding::Weak, SymbolBinding::Global) => {
                                        slot.insert(incoming);
                                    }
                                    // GLOBAL over WEAK, or first WEAK: keep.
                                    _ => {}
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Compute and write every patch value.
    fn relocate(&mut self) -> Result<()> {
        for (idx, obj) in self.objects.iter().enumerate() {
            for (name, sec) in &obj.sections {
                if sec.relocs.is_empty() {
                    continue;
                }
                let Some(&(gi, mi)) = self.member_map.get(&(idx, name.clone())) else {
                    continue;
                };
                if self.groups[gi].is_bss() {
                    return Err(Error::BadContainer(format!(
                        "relocation in uninitialized section {name}"
                    )));
                }
                let member = self.groups[gi].members[mi];

                for reloc in &sec.relocs {
                    let site = member.global_offset + reloc.offset as u64;

                    // Locals of this object shadow the global namespace.
                    let target = self
                        .locals
                        .get(&format!("{}.{}", obj.name, reloc.symbol))
                        .copied()
                        .or_else(|| self.globals.get(&reloc.symbol).map(|g| g.global_offset))
                        .ok_or_else(|| Error::UndefinedSymbol(reloc.symbol.clone()))?;

                    let value: i128 = match reloc.kind {
                        // Both ends are base-relative, so the base cancels.
                        // The -8 pairs with the producers' pre-biased addends.
                        RelocKind::Pc32 => {
                            target as i128 + reloc.addend as i128 - site as i128 - 8
                        }
                        RelocKind::Abs32 | RelocKind::Abs32S | RelocKind::Abs64 => {
                            BASE_ADDR as i128 + target as i128 + reloc.addend as i128
                        }
                    };

                    let in_range = match reloc.kind {
                        RelocKind::Abs32 => (0..=u32::MAX as i128).contains(&value),
                        RelocKind::Abs32S | RelocKind::Pc32 => {
                            (i32::MIN as i128..=i32::MAX as i128).contains(&value)
                        }
                        RelocKind::Abs64 => true,
                    };
                    if !in_range {
                        return Err(Error::RelocationOverflow {
                            symbol: reloc.symbol.clone(),
                            kind: reloc.kind,
                            value,
                        });
                    }

                    debug!(
                        symbol = reloc.symbol.as_str(),
                        site = format_args!("{:#x}", BASE_ADDR + site),
                        value = format_args!("{value:#x}"),
                        "patching"
                    );

                    let width = reloc.kind.width();
                    let site_offset = member.group_offset + reloc.offset;
                    let bytes = (value as u64).to_le_bytes();
                    self.groups[gi].data[site_offset..site_offset + width]
                        .copy_from_slice(&bytes[..width]);
                }
            }
        }
        Ok(())
    }

    /// Assemble the output object: merged sections, program and section
    /// headers, the surviving global symbols, and the entry address.
    fn finish(mut self, output_name: &str) -> Result<FleObject> {
        let start = self.globals.get("_start").ok_or(Error::NoEntry)?;
        let entry = BASE_ADDR + start.global_offset;

        let mut out = FleObject::new(ObjectType::Exe, output_name);
        out.entry = Some(entry);

        // Winning globals, in address order, with section-relative offsets.
        let section_base: HashMap<&str, u64> = self
            .groups
            .iter()
            .map(|g| (g.name.as_str(), g.vaddr - BASE_ADDR))
            .collect();
        let globals = std::mem::take(&mut self.globals);
        let mut winners: Vec<(String, GlobalSymbol)> = globals.into_iter().collect();
        winners.sort_by_key(|(_, g)| g.global_offset);
        for (name, g) in winners {
            let base = section_base[g.section.as_str()];
            out.symbols.push(Symbol {
                name,
                binding: g.binding,
                section: g.section.clone(),
                offset: (g.global_offset - base) as usize,
                size: g.size,
            });
        }

        for group in self.groups {
            out.phdrs.push(ProgramHeader {
                name: group.name.clone(),
                vaddr: group.vaddr,
                size: group.size(),
                flags: group.perms,
            });
            let mut sh_flags = SHF_ALLOC;
            if group.perms & PF_W != 0 {
                sh_flags |= SHF_WRITE;
            }
            if group.perms & PF_X != 0 {
                sh_flags |= SHF_EXECINSTR;
            }
            out.shdrs.push(SectionHeader {
                name: group.name.clone(),
                sh_type: if group.is_bss() {
                    SHT_NOBITS
                } else {
                    SHT_PROGBITS
                },
                flags: sh_flags,
                addr: group.vaddr,
                offset: group.vaddr - BASE_ADDR,
                size: group.size(),
                addralign: group.addralign(),
            });
            out.sections.insert(
                group.name,
                Section {
                    data: group.data,
                    bss_size: group.bss_size,
                    relocs: Vec::new(),
                },
            );
        }

        info!(
            entry = format_args!("{entry:#x}"),
            segments = out.phdrs.len(),
            "linked"
        );
        Ok(out)
    }
}

impl Default for Linker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fle::{Relocation, PF_R};

    fn obj(name: &str) -> FleObject {
        FleObject::new(ObjectType::Obj, name)
    }

    fn section(obj: &mut FleObject, name: &str, data: Vec<u8>) {
        obj.sections.insert(
            name.to_string(),
            Section {
                data,
                ..Section::default()
            },
        );
    }

    fn bss_section(obj: &mut FleObject, size: usize) {
        obj.sections.insert(
            ".bss".to_string(),
            Section {
                bss_size: size,
                ..Section::default()
            },
        );
    }

    fn symbol(
        obj: &mut FleObject,
        name: &str,
        binding: SymbolBinding,
        section: &str,
        offset: usize,
        size: usize,
    ) {
        obj.symbols.push(Symbol {
            name: name.to_string(),
            binding,
            section: section.to_string(),
            offset,
            size,
        });
    }

    fn reloc(obj: &mut FleObject, section: &str, kind: RelocKind, offset: usize, sym: &str, addend: i64) {
        obj.sections[section].relocs.push(Relocation {
            kind,
            offset,
            symbol: sym.to_string(),
            addend,
        });
    }

    fn link(objects: Vec<FleObject>) -> Result<FleObject> {
        let mut linker = Linker::new();
        for obj in objects {
            linker.add_object(obj)?;
        }
        linker.link("a.out")
    }

    fn find_symbol<'a>(exe: &'a FleObject, name: &str) -> &'a Symbol {
        exe.symbols.iter().find(|s| s.name == name).unwrap()
    }

    #[test]
    fn hello_world_link() {
        // a.fle: _start calls puts PC-relatively; b.fle defines puts.
        let mut a = obj("a.fle");
        section(&mut a, ".text", vec![0x90; 16]);
        symbol(&mut a, "_start", SymbolBinding::Global, ".text", 0, 0);
        reloc(&mut a, ".text", RelocKind::Pc32, 8, "puts", 4);

        let mut b = obj("b.fle");
        section(&mut b, ".text", vec![0xc3; 4]);
        symbol(&mut b, "puts", SymbolBinding::Global, ".text", 0, 0);

        let exe = link(vec![a, b]).unwrap();
        assert_eq!(exe.kind, ObjectType::Exe);
        assert_eq!(exe.entry, Some(BASE_ADDR));

        // puts landed at merged offset 16; site is 8.
        // V = S + A - P - 8 = 16 + 4 - 8 - 8 = 4.
        let text = &exe.sections[".text"];
        assert_eq!(text.data.len(), 20);
        assert_eq!(&text.data[8..12], &4i32.to_le_bytes());

        let ph = &exe.phdrs[0];
        assert_eq!(ph.name, ".text");
        assert_eq!(ph.vaddr, BASE_ADDR);
        assert_eq!(ph.size, 20);
        assert_eq!(ph.flags, PF_R | PF_X);
    }

    #[test]
    fn global_beats_weak_regardless_of_order() {
        for weak_first in [true, false] {
            let mut weak = obj("weak.fle");
            section(&mut weak, ".text", vec![0x90; 4]);
            symbol(&mut weak, "log", SymbolBinding::Weak, ".text", 0, 0);
            symbol(&mut weak, "_start", SymbolBinding::Global, ".text", 2, 0);

            let mut strong = obj("strong.fle");
            section(&mut strong, ".text", vec![0xc3; 4]);
            symbol(&mut strong, "log", SymbolBinding::Global, ".text", 0, 0);

            let inputs = if weak_first {
                vec![weak, strong]
            } else {
                vec![strong, weak]
            };
            let exe = link(inputs).unwrap();

            // The strong definition sits at its own member's offset.
            let expected = if weak_first { 4 } else { 0 };
            assert_eq!(find_symbol(&exe, "log").offset, expected);
            assert_eq!(find_symbol(&exe, "log").binding, SymbolBinding::Global);
        }
    }

    #[test]
    fn first_weak_wins() {
        let mut a = obj("a.fle");
        section(&mut a, ".text", vec![0x90; 4]);
        symbol(&mut a, "hook", SymbolBinding::Weak, ".text", 0, 0);
        symbol(&mut a, "_start", SymbolBinding::Global, ".text", 2, 0);

        let mut b = obj("b.fle");
        section(&mut b, ".text", vec![0x90; 4]);
        symbol(&mut b, "hook", SymbolBinding::Weak, ".text", 0, 0);

        let exe = link(vec![a, b]).unwrap();
        assert_eq!(find_symbol(&exe, "hook").offset, 0);
    }

    #[test]
    fn multiple_strong_definitions_fail() {
        let mut a = obj("a.fle");
        section(&mut a, ".text", vec![0x90; 4]);
        symbol(&mut a, "x", SymbolBinding::Global, ".text", 0, 0);

        let mut b = obj("b.fle");
        section(&mut b, ".text", vec![0x90; 4]);
        symbol(&mut b, "x", SymbolBinding::Global, ".text", 0, 0);

        let err = link(vec![a, b]).unwrap_err();
        assert!(matches!(err, Error::MultipleDefinition(name) if name == "x"));
    }

    #[test]
    fn abs32_patches_virtual_address() {
        let mut a = obj("a.fle");
        section(&mut a, ".text", vec![0; 4]);
        symbol(&mut a, "_start", SymbolBinding::Global, ".text", 0, 0);
        reloc(&mut a, ".text", RelocKind::Abs32, 0, "data_var", 0);
        section(&mut a, ".data", vec![7, 7]);
        symbol(&mut a, "data_var", SymbolBinding::Global, ".data", 0, 2);

        let exe = link(vec![a]).unwrap();
        // .data begins on the page after .text: vaddr 0x401000.
        assert_eq!(exe.phdrs[1].vaddr, 0x401000);
        let text = &exe.sections[".text"];
        assert_eq!(&text.data[0..4], &0x401000u32.to_le_bytes());
    }

    #[test]
    fn abs64_patches_eight_bytes() {
        let mut a = obj("a.fle");
        section(&mut a, ".data", vec![0; 8]);
        reloc(&mut a, ".data", RelocKind::Abs64, 0, "tag", 1);
        symbol(&mut a, "tag", SymbolBinding::Global, ".data", 0, 0);
        section(&mut a, ".text", vec![0x90; 2]);
        symbol(&mut a, "_start", SymbolBinding::Global, ".text", 0, 0);

        let exe = link(vec![a]).unwrap();
        // tag sits at the start of .data (vaddr 0x400000 since .data was
        // first-seen first); value = BASE + 0 + 1.
        let data = &exe.sections[".data"];
        assert_eq!(&data.data[0..8], &0x400001u64.to_le_bytes());
    }

    #[test]
    fn bss_layout() {
        let mut a = obj("a.fle");
        section(&mut a, ".text", vec![0x90; 4]);
        symbol(&mut a, "_start", SymbolBinding::Global, ".text", 0, 0);
        bss_section(&mut a, 1024);
        symbol(&mut a, "buf", SymbolBinding::Global, ".bss", 0, 1024);

        let exe = link(vec![a]).unwrap();
        let bss_ph = exe.phdrs.iter().find(|p| p.name == ".bss").unwrap();
        assert_eq!(bss_ph.size, 1024);
        assert_eq!(bss_ph.flags, PF_R | PF_W);
        // On its own page, distinct from .text.
        assert_eq!(bss_ph.vaddr, 0x401000);

        let bss_sh = exe.shdrs.iter().find(|s| s.name == ".bss").unwrap();
        assert_eq!(bss_sh.sh_type, SHT_NOBITS);
        assert_eq!(exe.sections[".bss"].bss_size, 1024);
        assert!(exe.sections[".bss"].data.is_empty());
    }

    #[test]
    fn no_entry() {
        let mut a = obj("a.fle");
        section(&mut a, ".text", vec![0x90; 4]);
        symbol(&mut a, "helper", SymbolBinding::Global, ".text", 0, 0);

        assert!(matches!(link(vec![a]), Err(Error::NoEntry)));
    }

    #[test]
    fn undefined_symbol() {
        let mut a = obj("a.fle");
        section(&mut a, ".text", vec![0; 4]);
        symbol(&mut a, "_start", SymbolBinding::Global, ".text", 0, 0);
        reloc(&mut a, ".text", RelocKind::Pc32, 0, "missing", 4);

        let err = link(vec![a]).unwrap_err();
        assert!(matches!(err, Error::UndefinedSymbol(name) if name == "missing"));
    }

    #[test]
    fn symbol_in_missing_section() {
        let mut a = obj("a.fle");
        section(&mut a, ".text", vec![0x90; 4]);
        symbol(&mut a, "_start", SymbolBinding::Global, ".text", 0, 0);
        symbol(&mut a, "ghost", SymbolBinding::Global, ".rodata", 0, 0);

        let err = link(vec![a]).unwrap_err();
        assert!(matches!(err, Error::UndefinedSection { section, .. } if section == ".rodata"));
    }

    #[test]
    fn locals_shadow_globals_per_object() {
        // Both objects carry a LOCAL named helper; a global of the same
        // name exists elsewhere. Each object's relocation must bind to its
        // own local.
        let mut a = obj("a.fle");
        section(&mut a, ".text", vec![0x90; 8]);
        symbol(&mut a, "_start", SymbolBinding::Global, ".text", 0, 0);
        symbol(&mut a, "helper", SymbolBinding::Local, ".text", 4, 0);
        reloc(&mut a, ".text", RelocKind::Pc32, 0, "helper", 4);

        let mut b = obj("b.fle");
        section(&mut b, ".text", vec![0x90; 8]);
        symbol(&mut b, "helper", SymbolBinding::Local, ".text", 4, 0);
        reloc(&mut b, ".text", RelocKind::Pc32, 0, "helper", 4);

        let mut c = obj("c.fle");
        section(&mut c, ".text", vec![0x90; 4]);
        symbol(&mut c, "helper", SymbolBinding::Global, ".text", 0, 0);

        let exe = link(vec![a, b, c]).unwrap();
        let text = &exe.sections[".text"];
        // a: S=4, P=0 → 4 + 4 - 0 - 8 = 0.
        assert_eq!(&text.data[0..4], &0i32.to_le_bytes());
        // b: S=12, P=8 → 12 + 4 - 8 - 8 = 0.
        assert_eq!(&text.data[8..12], &0i32.to_le_bytes());
    }

    #[test]
    fn segments_are_disjoint_and_page_aligned() {
        let mut a = obj("a.fle");
        section(&mut a, ".text", vec![0x90; 100]);
        symbol(&mut a, "_start", SymbolBinding::Global, ".text", 0, 0);
        section(&mut a, ".rodata", vec![1; 5000]);
        section(&mut a, ".data", vec![2; 17]);
        bss_section(&mut a, 64);

        let mut b = obj("b.fle");
        section(&mut b, ".text", vec![0x90; 3]);
        section(&mut b, ".data", vec![3; 9000]);

        let exe = link(vec![a, b]).unwrap();
        assert_eq!(exe.phdrs.len(), 4);
        for ph in &exe.phdrs {
            assert_eq!(ph.vaddr % PAGE_SIZE, 0, "{} not page aligned", ph.name);
        }
        for (i, x) in exe.phdrs.iter().enumerate() {
            for y in &exe.phdrs[i + 1..] {
                let disjoint = x.vaddr + x.size <= y.vaddr || y.vaddr + y.size <= x.vaddr;
                assert!(disjoint, "{} overlaps {}", x.name, y.name);
            }
        }
    }

    #[test]
    fn symbol_offsets_stay_monotonic() {
        let mut a = obj("a.fle");
        section(&mut a, ".text", vec![0x90; 32]);
        symbol(&mut a, "_start", SymbolBinding::Global, ".text", 0, 0);
        symbol(&mut a, "middle", SymbolBinding::Global, ".text", 8, 0);
        symbol(&mut a, "late", SymbolBinding::Global, ".text", 24, 0);

        let mut b = obj("b.fle");
        section(&mut b, ".text", vec![0x90; 8]);
        symbol(&mut b, "tail", SymbolBinding::Global, ".text", 4, 0);

        let exe = link(vec![a, b]).unwrap();
        let offsets: Vec<usize> = ["_start", "middle", "late", "tail"]
            .iter()
            .map(|n| find_symbol(&exe, n).offset)
            .collect();
        assert_eq!(offsets, vec![0, 8, 24, 36]);
    }

    #[test]
    fn abs32_overflow() {
        let mut a = obj("a.fle");
        section(&mut a, ".text", vec![0; 4]);
        symbol(&mut a, "_start", SymbolBinding::Global, ".text", 0, 0);
        reloc(&mut a, ".text", RelocKind::Abs32, 0, "_start", i64::from(u32::MAX));

        let err = link(vec![a]).unwrap_err();
        assert!(matches!(err, Error::RelocationOverflow { .. }));
    }

    #[test]
    fn abs32_rejects_negative_values() {
        let mut a = obj("a.fle");
        section(&mut a, ".text", vec![0; 4]);
        symbol(&mut a, "_start", SymbolBinding::Global, ".text", 0, 0);
        reloc(&mut a, ".text", RelocKind::Abs32, 0, "_start", -0x500000);

        let err = link(vec![a]).unwrap_err();
        assert!(matches!(err, Error::RelocationOverflow { .. }));

        // The same value is fine sign-extended.
        let mut a = obj("a.fle");
        section(&mut a, ".text", vec![0; 4]);
        symbol(&mut a, "_start", SymbolBinding::Global, ".text", 0, 0);
        reloc(&mut a, ".text", RelocKind::Abs32S, 0, "_start", -0x500000);
        assert!(link(vec![a]).is_ok());
    }

    #[test]
    fn executable_inputs_are_rejected() {
        let exe_in = FleObject::new(ObjectType::Exe, "a.out");
        let mut linker = Linker::new();
        assert!(matches!(
            linker.add_object(exe_in),
            Err(Error::BadContainer(_))
        ));
    }

    #[test]
    fn entry_lies_in_executable_segment() {
        let mut a = obj("a.fle");
        section(&mut a, ".data", vec![1; 16]);
        section(&mut a, ".text", vec![0x90; 8]);
        symbol(&mut a, "_start", SymbolBinding::Global, ".text", 4, 0);

        let exe = link(vec![a]).unwrap();
        let entry = exe.entry.unwrap();
        let text = exe.phdrs.iter().find(|p| p.name == ".text").unwrap();
        assert!(entry >= text.vaddr && entry < text.vaddr + text.size);
        assert_eq!(entry, 0x401004);
    }
}
