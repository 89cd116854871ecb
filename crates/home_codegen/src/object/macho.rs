//! Mach-O 64 relocatable object emission, the `.text`/`.rodata`/`.data`/`.bss` sections
//! mapped onto `__TEXT,__text` / `__TEXT,__const` / `__DATA,__data` /
//! `__DATA,__bss`, with symbols and relocations following the same
//! `ObjectModule` the ELF emitter reads.

use home_base::Interner;

use crate::emit::RelocKind;
use crate::object::module::{ObjectModule, Section};

const MH_MAGIC_64: u32 = 0xfeedfacf;
const CPU_TYPE_X86_64: u32 = 0x01000007;
const CPU_SUBTYPE_X86_64_ALL: u32 = 3;
const MH_OBJECT: u32 = 0x1;
const LC_SEGMENT_64: u32 = 0x19;
const LC_SYMTAB: u32 = 0x2;
const S_ZEROFILL: u32 = 0x1;
const N_SECT: u8 = 0xe;
const N_EXT: u8 = 0x1;
const X86_64_RELOC_SIGNED: u8 = 1;
const X86_64_RELOC_UNSIGNED: u8 = 0;

/// Serializes `module` into a macOS Mach-O 64 relocatable object
/// (one `__TEXT` segment holding `__text`/`__const`, one `__DATA`
/// segment holding `__data`/`__bss`).
pub fn emit(module: &ObjectModule, strings: &Interner) -> Vec<u8> {
    let mut strtab = vec![0u8]; // index 0 is the empty string, per Mach-O convention
    let mut nlist = Vec::new();
    for sym in &module.symbols {
        let name_off = strtab.len() as u32;
        strtab.extend_from_slice(strings.resolve(sym.name).as_bytes());
        strtab.push(0);
        let (sect, _) = section_index(sym.section);
        nlist.push(NList { strx: name_off, ty: N_SECT | if sym.is_global { N_EXT } else { 0 }, sect, desc: 0, value: sym.offset });
    }

    let header_size = 32u64;
    // one LC_SEGMENT_64 with 4 sections (text/const/data/bss) + LC_SYMTAB
    let seg_cmd_size = 72u64 + 80u64 * 4;
    let symtab_cmd_size = 24u64;
    let ncmds = 2u32;
    let sizeofcmds = seg_cmd_size + symtab_cmd_size;

    let mut data_offset = header_size + sizeofcmds;
    let text_off = data_offset;
    data_offset += module.text.len() as u64;
    let const_off = data_offset;
    data_offset += module.rodata.len() as u64;
    let data_off = data_offset;
    data_offset += module.data.len() as u64;
    // bss is S_ZEROFILL: no file content.
    let nreloc = module.relocations.len();
    let reloc_off = data_offset;
    data_offset += (nreloc * 8) as u64;
    let symtab_off = data_offset;
    data_offset += nlist.len() as u64 * 16;
    let strtab_off = data_offset;

    let mut out = Vec::new();
    out.extend_from_slice(&MH_MAGIC_64.to_le_bytes());
    out.extend_from_slice(&CPU_TYPE_X86_64.to_le_bytes());
    out.extend_from_slice(&CPU_SUBTYPE_X86_64_ALL.to_le_bytes());
    out.extend_from_slice(&MH_OBJECT.to_le_bytes());
    out.extend_from_slice(&ncmds.to_le_bytes());
    out.extend_from_slice(&(sizeofcmds as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // flags
    out.extend_from_slice(&0u32.to_le_bytes()); // reserved

    // LC_SEGMENT_64
    out.extend_from_slice(&LC_SEGMENT_64.to_le_bytes());
    out.extend_from_slice(&(seg_cmd_size as u32).to_le_bytes());
    out.extend_from_slice(&pad16(b""));
    out.extend_from_slice(&0u64.to_le_bytes()); // vmaddr
    out.extend_from_slice(&data_offset.to_le_bytes()); // vmsize: whole file image
    out.extend_from_slice(&text_off.to_le_bytes()); // fileoff
    out.extend_from_slice(&(data_off + module.data.len() as u64 - text_off).to_le_bytes()); // filesize
    out.extend_from_slice(&7u32.to_le_bytes()); // maxprot rwx
    out.extend_from_slice(&7u32.to_le_bytes()); // initprot
    out.extend_from_slice(&4u32.to_le_bytes()); // nsects
    out.extend_from_slice(&0u32.to_le_bytes()); // flags

    section64(&mut out, "__text", "__TEXT", text_off, module.text.len() as u64, 0);
    section64(&mut out, "__const", "__TEXT", const_off, module.rodata.len() as u64, 0);
    section64(&mut out, "__data", "__DATA", data_off, module.data.len() as u64, 0);
    section64(&mut out, "__bss", "__DATA", 0, module.bss_size, S_ZEROFILL);

    // LC_SYMTAB
    out.extend_from_slice(&LC_SYMTAB.to_le_bytes());
    out.extend_from_slice(&(symtab_cmd_size as u32).to_le_bytes());
    out.extend_from_slice(&(symtab_off as u32).to_le_bytes());
    out.extend_from_slice(&(nlist.len() as u32).to_le_bytes());
    out.extend_from_slice(&(strtab_off as u32).to_le_bytes());
    out.extend_from_slice(&(strtab.len() as u32).to_le_bytes());

    out.extend_from_slice(&module.text);
    out.extend_from_slice(&module.rodata);
    out.extend_from_slice(&module.data);
    for reloc in &module.relocations {
        let (_, sect_num) = section_index(reloc.section);
        let reloc_ty = match reloc.kind {
            RelocKind::PcRel32 => X86_64_RELOC_SIGNED,
            RelocKind::Abs64 => X86_64_RELOC_UNSIGNED,
        };
        out.extend_from_slice(&(reloc.offset as u32).to_le_bytes());
        // r_symbolnum(24) | r_pcrel(1) | r_length(2) | r_extern(1) | r_type(4)
        let pcrel = matches!(reloc.kind, RelocKind::PcRel32) as u32;
        let packed = (sect_num as u32) | (pcrel << 24) | (2u32 << 25) | (1u32 << 27) | ((reloc_ty as u32) << 28);
        out.extend_from_slice(&packed.to_le_bytes());
    }
    for sym in &nlist {
        out.extend_from_slice(&sym.strx.to_le_bytes());
        out.push(sym.ty);
        out.push(sym.sect);
        out.extend_from_slice(&sym.desc.to_le_bytes());
        out.extend_from_slice(&sym.value.to_le_bytes());
    }
    out.extend_from_slice(&strtab);

    out
}

struct NList {
    strx: u32,
    ty: u8,
    sect: u8,
    desc: u16,
    value: u64,
}

fn section_index(section: Section) -> (u8, u8) {
    match section {
        Section::Text => (1, 1),
        Section::Rodata => (2, 2),
        Section::Data => (3, 3),
        Section::Bss => (4, 4),
    }
}

fn pad16(name: &[u8]) -> [u8; 16] {
    let mut buf = [0u8; 16];
    buf[..name.len()].copy_from_slice(name);
    buf
}

#[allow(clippy::too_many_arguments)]
fn section64(out: &mut Vec<u8>, sectname: &str, segname: &str, offset: u64, size: u64, flags: u32) {
    out.extend_from_slice(&pad16(sectname.as_bytes()));
    out.extend_from_slice(&pad16(segname.as_bytes()));
    out.extend_from_slice(&0u64.to_le_bytes()); // addr
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&(offset as u32).to_le_bytes());
    out.extend_from_slice(&4u32.to_le_bytes()); // align (2^4 = 16)
    out.extend_from_slice(&0u32.to_le_bytes()); // reloff
    out.extend_from_slice(&0u32.to_le_bytes()); // nreloc
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // reserved1
    out.extend_from_slice(&0u32.to_le_bytes()); // reserved2
    out.extend_from_slice(&0u32.to_le_bytes()); // reserved3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_the_mach_o_64_magic() {
        let mut strings = Interner::new();
        let entry = strings.intern("start");
        let module = ObjectModule::new(entry);
        let bytes = emit(&module, &strings);
        let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        assert_eq!(magic, MH_MAGIC_64);
    }
}
