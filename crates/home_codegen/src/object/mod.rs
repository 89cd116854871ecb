//! Object file assembly: a format-neutral
//! [`module::ObjectModule`] plus two serializers, one per supported
//! target platform.

pub mod elf;
pub mod macho;
pub mod module;

pub use module::{DefinedSymbol, ObjectModule, ObjectRelocation, Section};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Elf64,
    MachO64,
}

pub fn emit(module: &module::ObjectModule, strings: &home_base::Interner, format: TargetFormat) -> Vec<u8> {
    match format {
        TargetFormat::Elf64 => elf::emit(module, strings),
        TargetFormat::MachO64 => macho::emit(module, strings),
    }
}
