//! ELF64 relocatable object emission: `.text`/`.rodata`/`.data`/`.bss` sections, a symbol
//! table, and `.rela.text` relocations resolving string literals, static
//! data, and function-to-function calls.

use home_base::Interner;

use crate::emit::RelocKind;
use crate::object::module::{ObjectModule, Section};

const ET_REL: u16 = 1;
const EM_X86_64: u16 = 62;
const SHT_NULL: u32 = 0;
const SHT_PROGBITS: u32 = 1;
const SHT_SYMTAB: u32 = 2;
const SHT_STRTAB: u32 = 3;
const SHT_RELA: u32 = 4;
const SHT_NOBITS: u32 = 8;
const SHF_WRITE: u64 = 0x1;
const SHF_ALLOC: u64 = 0x2;
const SHF_EXECINSTR: u64 = 0x4;
const STB_GLOBAL: u8 = 1;
const STB_LOCAL: u8 = 0;
const STT_FUNC: u8 = 2;
const STT_OBJECT: u8 = 1;
const R_X86_64_PC32: u32 = 2;
const R_X86_64_64: u32 = 1;

/// Serializes `module` into a Linux ELF64 relocatable object.
pub fn emit(module: &ObjectModule, strings: &Interner) -> Vec<u8> {
    let mut shstrtab = StringTable::new();
    let null_name = shstrtab.add("");
    let text_name = shstrtab.add(".text");
    let rodata_name = shstrtab.add(".rodata");
    let data_name = shstrtab.add(".data");
    let bss_name = shstrtab.add(".bss");
    let symtab_name = shstrtab.add(".symtab");
    let strtab_name = shstrtab.add(".strtab");
    let rela_name = shstrtab.add(".rela.text");
    let shstrtab_name = shstrtab.add(".shstrtab");

    let mut strtab = StringTable::new();
    strtab.add("");
    let mut symbols = Vec::new();
    // One null symbol at index 0, per ELF convention.
    symbols.push(ElfSym { name: 0, info: 0, other: 0, shndx: 0, value: 0, size: 0 });

    // section index layout: 0=null, 1=.text, 2=.rodata, 3=.data, 4=.bss
    let text_shndx = 1u16;
    let rodata_shndx = 2u16;
    let data_shndx = 3u16;
    let bss_shndx = 4u16;

    let mut symbol_index = std::collections::HashMap::new();
    for (i, sym) in module.symbols.iter().enumerate() {
        let name_off = strtab.add(strings.resolve(sym.name));
        let shndx = match sym.section {
            Section::Text => text_shndx,
            Section::Rodata => rodata_shndx,
            Section::Data => data_shndx,
            Section::Bss => bss_shndx,
        };
        let bind = if sym.is_global { STB_GLOBAL } else { STB_LOCAL };
        let ty = if sym.is_function { STT_FUNC } else { STT_OBJECT };
        symbols.push(ElfSym { name: name_off, info: (bind << 4) | ty, other: 0, shndx, value: sym.offset, size: sym.size });
        symbol_index.insert(sym.name, (i + 1) as u32);
    }
    let first_global = symbols.iter().position(|s| (s.info >> 4) == STB_GLOBAL as u8).unwrap_or(symbols.len()) as u32;

    let mut relas = Vec::new();
    for reloc in &module.relocations {
        let sym_idx = *symbol_index.get(&reloc.symbol).unwrap_or(&0);
        let reloc_type = match reloc.kind {
            RelocKind::PcRel32 => R_X86_64_PC32,
            RelocKind::Abs64 => R_X86_64_64,
        };
        relas.push(ElfRela { offset: reloc.offset, info: ((sym_idx as u64) << 32) | reloc_type as u64, addend: reloc.addend - 4 });
    }

    // Layout: Ehdr, .text, .rodata, .data, symtab, strtab, rela.text, shstrtab, section headers.
    let ehdr_size = 64u64;
    let mut offset = ehdr_size;

    let text_off = offset;
    offset += module.text.len() as u64;
    let rodata_off = offset;
    offset += module.rodata.len() as u64;
    let data_off = offset;
    offset += module.data.len() as u64;
    // .bss is SHT_NOBITS: takes no file space.
    let bss_off = offset;

    let symtab_off = offset;
    let symtab_bytes = symbols.len() as u64 * 24;
    offset += symtab_bytes;

    let strtab_off = offset;
    offset += strtab.bytes.len() as u64;

    let rela_off = offset;
    let rela_bytes = relas.len() as u64 * 24;
    offset += rela_bytes;

    let shstrtab_off = offset;
    offset += shstrtab.bytes.len() as u64;

    let shoff = align8(offset);

    let mut out = Vec::with_capacity(shoff as usize + 9 * 64);
    // e_ident
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    out.extend_from_slice(&ET_REL.to_le_bytes());
    out.extend_from_slice(&EM_X86_64.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes()); // e_version
    out.extend_from_slice(&0u64.to_le_bytes()); // e_entry (none, relocatable)
    out.extend_from_slice(&0u64.to_le_bytes()); // e_phoff
    out.extend_from_slice(&shoff.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
    out.extend_from_slice(&64u16.to_le_bytes()); // e_ehsize
    out.extend_from_slice(&0u16.to_le_bytes()); // e_phentsize
    out.extend_from_slice(&0u16.to_le_bytes()); // e_phnum
    out.extend_from_slice(&64u16.to_le_bytes()); // e_shentsize
    out.extend_from_slice(&9u16.to_le_bytes()); // e_shnum: null,text,rodata,data,bss,symtab,strtab,rela,shstrtab
    out.extend_from_slice(&8u16.to_le_bytes()); // e_shstrndx

    out.extend_from_slice(&module.text);
    out.extend_from_slice(&module.rodata);
    out.extend_from_slice(&module.data);
    for sym in &symbols {
        out.extend_from_slice(&sym.name.to_le_bytes());
        out.push(sym.info);
        out.push(sym.other);
        out.extend_from_slice(&sym.shndx.to_le_bytes());
        out.extend_from_slice(&sym.value.to_le_bytes());
        out.extend_from_slice(&sym.size.to_le_bytes());
    }
    out.extend_from_slice(&strtab.bytes);
    for rela in &relas {
        out.extend_from_slice(&rela.offset.to_le_bytes());
        out.extend_from_slice(&rela.info.to_le_bytes());
        out.extend_from_slice(&rela.addend.to_le_bytes());
    }
    out.extend_from_slice(&shstrtab.bytes);
    while (out.len() as u64) < shoff {
        out.push(0);
    }

    section_header(&mut out, null_name, SHT_NULL, 0, 0, 0, 0, 0, 0, 0, 0);
    section_header(&mut out, text_name, SHT_PROGBITS, SHF_ALLOC | SHF_EXECINSTR, text_off, module.text.len() as u64, 0, 0, 16, 0);
    section_header(&mut out, rodata_name, SHT_PROGBITS, SHF_ALLOC, rodata_off, module.rodata.len() as u64, 0, 0, 8, 0);
    section_header(&mut out, data_name, SHT_PROGBITS, SHF_ALLOC | SHF_WRITE, data_off, module.data.len() as u64, 0, 0, 8, 0);
    section_header(&mut out, bss_name, SHT_NOBITS, SHF_ALLOC | SHF_WRITE, bss_off, module.bss_size, 0, 0, 8, 0);
    section_header(&mut out, symtab_name, SHT_SYMTAB, 0, symtab_off, symtab_bytes, 6, first_global, 8, 24);
    section_header(&mut out, strtab_name, SHT_STRTAB, 0, strtab_off, strtab.bytes.len() as u64, 0, 0, 1, 0);
    section_header(&mut out, rela_name, SHT_RELA, 0, rela_off, rela_bytes, 5, 1, 8, 24);
    section_header(&mut out, shstrtab_name, SHT_STRTAB, 0, shstrtab_off, shstrtab.bytes.len() as u64, 0, 0, 1, 0);

    out
}

struct ElfSym {
    name: u32,
    info: u8,
    other: u8,
    shndx: u16,
    value: u64,
    size: u64,
}

struct ElfRela {
    offset: u64,
    info: u64,
    addend: i64,
}

struct StringTable {
    bytes: Vec<u8>,
}

impl StringTable {
    fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    fn add(&mut self, s: &str) -> u32 {
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        offset
    }
}

#[allow(clippy::too_many_arguments)]
fn section_header(out: &mut Vec<u8>, name: u32, ty: u32, flags: u64, offset: u64, size: u64, link: u32, info: u32, align: u64, entsize: u64) {
    out.extend_from_slice(&name.to_le_bytes());
    out.extend_from_slice(&ty.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes()); // sh_addr
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&link.to_le_bytes());
    out.extend_from_slice(&info.to_le_bytes());
    out.extend_from_slice(&align.to_le_bytes());
    out.extend_from_slice(&entsize.to_le_bytes());
}

fn align8(offset: u64) -> u64 {
    (offset + 7) / 8 * 8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_a_valid_elf_magic_and_header_size() {
        let mut strings = Interner::new();
        let entry = strings.intern("_start");
        let module = ObjectModule::new(entry);
        let bytes = emit(&module, &strings);
        assert_eq!(&bytes[0..4], &[0x7f, b'E', b'L', b'F']);
        assert_eq!(bytes[4], 2); // ELFCLASS64
        assert!(bytes.len() >= 64);
    }
}
