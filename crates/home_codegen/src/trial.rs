//! In-process trial execution: a
//! self-contained mini-linker and `mmap` loader that resolves an
//! [`ObjectModule`]'s relocations in memory and calls straight into the
//! mapped bytes, so integration tests can assert on a program's actual
//! result without invoking a system linker or an emulator. Reserved for
//! tests; nothing in `home-cli` links against this feature.
//!
//! Only `home-cache::CacheRecord`-shaped data that was produced by
//! [`crate::lower_module`] in this same process is ever passed here —
//! the relocation resolution below assumes every referenced symbol is
//! locally defined, which `lower_module` guarantees for the comptime-safe
//! single-module programs the test scenarios use.

use std::collections::HashMap;

use home_base::{Interner, Symbol};
use thiserror::Error;

use crate::emit::RelocKind;
use crate::object::{ObjectModule, Section};

#[derive(Debug, Error)]
pub enum TrialError {
    #[error("mmap failed: {0}")]
    Mmap(String),
    #[error("mprotect failed: {0}")]
    Mprotect(String),
    #[error("entry symbol '{0}' not found in the object's symbol table")]
    MissingEntry(String),
    #[error("relocation referenced undefined symbol '{0}'")]
    UndefinedSymbol(String),
}

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) / align * align
}

struct Layout {
    text_base: usize,
    rodata_base: usize,
    data_base: usize,
    bss_base: usize,
    total: usize,
}

fn plan_layout(module: &ObjectModule) -> Layout {
    let text_base = 0;
    let rodata_base = align_up(text_base + module.text.len(), 16);
    let data_base = align_up(rodata_base + module.rodata.len(), 16);
    let bss_base = align_up(data_base + module.data.len(), 16);
    let total = align_up(bss_base + module.bss_size as usize, 4096).max(4096);
    Layout { text_base, rodata_base, data_base, bss_base, total }
}

fn section_base(layout: &Layout, section: Section) -> usize {
    match section {
        Section::Text => layout.text_base,
        Section::Rodata => layout.rodata_base,
        Section::Data => layout.data_base,
        Section::Bss => layout.bss_base,
    }
}

/// Maps `module` executable, resolves its relocations against its own
/// symbol table, calls its entry symbol with no arguments, and returns
/// the `i64` it reports in `rax`.
pub fn run_trial(module: &ObjectModule, strings: &Interner) -> Result<i64, TrialError> {
    let layout = plan_layout(module);

    let mut image = vec![0u8; layout.total];
    image[layout.text_base..layout.text_base + module.text.len()].copy_from_slice(&module.text);
    image[layout.rodata_base..layout.rodata_base + module.rodata.len()].copy_from_slice(&module.rodata);
    image[layout.data_base..layout.data_base + module.data.len()].copy_from_slice(&module.data);

    let symbol_addr: HashMap<Symbol, usize> =
        module.symbols.iter().map(|sym| (sym.name, section_base(&layout, sym.section) + sym.offset as usize)).collect();

    let base_ptr = image.as_mut_ptr() as usize;

    for reloc in &module.relocations {
        let Some(&target_offset) = symbol_addr.get(&reloc.symbol) else {
            return Err(TrialError::UndefinedSymbol(strings.resolve(reloc.symbol).to_string()));
        };
        let patch_offset = section_base(&layout, reloc.section) + reloc.offset as usize;
        let target_addr = (base_ptr + target_offset) as i64;
        match reloc.kind {
            RelocKind::Abs64 => {
                let value = (target_addr + reloc.addend) as u64;
                image[patch_offset..patch_offset + 8].copy_from_slice(&value.to_le_bytes());
            }
            RelocKind::PcRel32 => {
                let patch_addr = (base_ptr + patch_offset) as i64;
                let value = (target_addr + reloc.addend - 4 - patch_addr) as i32;
                image[patch_offset..patch_offset + 4].copy_from_slice(&value.to_le_bytes());
            }
        }
    }

    let entry_offset = module
        .symbols
        .iter()
        .find(|sym| sym.name == module.entry)
        .map(|sym| section_base(&layout, sym.section) + sym.offset as usize)
        .ok_or_else(|| TrialError::MissingEntry(strings.resolve(module.entry).to_string()))?;

    unsafe { call_executable(&image, entry_offset) }
}

#[cfg(unix)]
unsafe fn call_executable(image: &[u8], entry_offset: usize) -> Result<i64, TrialError> {
    let len = image.len();
    let map = libc::mmap(std::ptr::null_mut(), len, libc::PROT_READ | libc::PROT_WRITE, libc::MAP_PRIVATE | libc::MAP_ANONYMOUS, -1, 0);
    if map == libc::MAP_FAILED {
        return Err(TrialError::Mmap(std::io::Error::last_os_error().to_string()));
    }
    std::ptr::copy_nonoverlapping(image.as_ptr(), map as *mut u8, len);

    if libc::mprotect(map, len, libc::PROT_READ | libc::PROT_EXEC) != 0 {
        let err = std::io::Error::last_os_error().to_string();
        libc::munmap(map, len);
        return Err(TrialError::Mprotect(err));
    }

    let entry_ptr = (map as usize + entry_offset) as *const ();
    let entry_fn: extern "C" fn() -> i64 = std::mem::transmute(entry_ptr);
    let result = entry_fn();

    libc::munmap(map, len);
    Ok(result)
}
