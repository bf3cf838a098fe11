//! In-process executor.
//!
//! Maps every program-header segment of a linked executable at its exact
//! virtual address, copies the section bytes in, locks down permissions, and
//! jumps to the entry point. The guest is expected to terminate the process
//! with a syscall; control never comes back.
//!
//! This is the one unsafe corner of the toolchain, and it only works on
//! Linux x86-64.

use std::io;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::fle::{FleObject, ObjectType, ProgramHeader, PF_R, PF_W, PF_X};

/// Map the image and transfer control. Does not return on success.
pub fn run(obj: &FleObject) -> Result<()> {
    if obj.kind != ObjectType::Exe {
        return Err(Error::NotExecutable(obj.kind.as_str().to_string()));
    }
    let entry = obj.entry.ok_or(Error::NoEntry)?;

    // Install mappings in ascending address order.
    let mut phdrs: Vec<&ProgramHeader> = obj.phdrs.iter().collect();
    phdrs.sort_by_key(|p| p.vaddr);

    for ph in phdrs {
        if ph.size == 0 {
            continue;
        }
        map_segment(obj, ph)?;
    }

    info!(entry = format_args!("{entry:#x}"), "jumping to entry");

    // The segments carry code the linker placed at these addresses; the
    // entry is expected to exit via syscall rather than return.
    let entry_fn: extern "C" fn() -> ! = unsafe { std::mem::transmute(entry as usize) };
    entry_fn()
}

fn map_segment(obj: &FleObject, ph: &ProgramHeader) -> Result<()> {
    let addr = ph.vaddr as *mut libc::c_void;
    let len = ph.size as usize;

    // Map writable first; the data copy needs it even for R+X segments.
    // MAP_FIXED_NOREPLACE surfaces collisions with the host's own image as
    // an error instead of silently clobbering it.
    let mapped = unsafe {
        libc::mmap(
            addr,
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_FIXED_NOREPLACE,
            -1,
            0,
        )
    };
    if mapped == libc::MAP_FAILED || mapped != addr {
        return Err(Error::MapFailed {
            addr: ph.vaddr,
            source: io::Error::last_os_error(),
        });
    }

    // NOBITS segments stay zero-filled; anything else gets its bytes.
    if let Some(section) = obj.sections.get(&ph.name) {
        if !section.data.is_empty() {
            unsafe {
                std::ptr::copy_nonoverlapping(
                    section.data.as_ptr(),
                    addr as *mut u8,
                    section.data.len().min(len),
                );
            }
        }
    }

    let mut prot = libc::PROT_NONE;
    if ph.flags & PF_R != 0 {
        prot |= libc::PROT_READ;
    }
    if ph.flags & PF_W != 0 {
        prot |= libc::PROT_WRITE;
    }
    if ph.flags & PF_X != 0 {
        prot |= libc::PROT_EXEC;
    }
    if unsafe { libc::mprotect(addr, len, prot) } != 0 {
        return Err(Error::MapFailed {
            addr: ph.vaddr,
            source: io::Error::last_os_error(),
        });
    }

    debug!(
        segment = ph.name.as_str(),
        vaddr = format_args!("{:#x}", ph.vaddr),
        size = ph.size,
        flags = flags_str(ph.flags).as_str(),
        "mapped segment"
    );
    Ok(())
}

fn flags_str(flags: u32) -> String {
    let mut s = String::new();
    s.push(if flags & PF_R != 0 { 'r' } else { '-' });
    s.push(if flags & PF_W != 0 { 'w' } else { '-' });
    s.push(if flags & PF_X != 0 { 'x' } else { '-' });
    s
}
