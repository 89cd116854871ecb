//! Minimal x86-64 instruction encoder, following
//! the same split `codegen::peephole`/`codegen::expr` keep between
//! "emit one instruction" and "lower a higher-level operation
//! to instructions" — here the leaf layer produces raw machine bytes
//! instead of a templated Rust statement.
//!
//! Covers exactly the instruction family the codegen needs: `mov`/`lea`,
//! the `add`/`sub`/`imul`/`idiv` arithmetic family, `cmp`/`jcc`,
//! `call`/`ret`, `push`/`pop`, `movzx`/`movsx`. Anything else is an
//! [`crate::error::CodegenError::UnsupportedOp`] at the lowering layer
//! above this one, never a silent miscompile here.

use home_base::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reg {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Reg {
    /// System V AMD64 integer argument registers in order.
    pub const ARG_REGS: [Reg; 6] = [Reg::Rdi, Reg::Rsi, Reg::Rdx, Reg::Rcx, Reg::R8, Reg::R9];

    fn low3(self) -> u8 {
        (self as u8) & 0x7
    }

    fn needs_rex_extension(self) -> bool {
        (self as u8) >= 8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl Condition {
    pub fn negate(self) -> Condition {
        match self {
            Condition::Equal => Condition::NotEqual,
            Condition::NotEqual => Condition::Equal,
            Condition::Less => Condition::GreaterEqual,
            Condition::LessEqual => Condition::Greater,
            Condition::Greater => Condition::LessEqual,
            Condition::GreaterEqual => Condition::Less,
        }
    }

    fn code(self) -> u8 {
        match self {
            Condition::Equal => 0x4,
            Condition::NotEqual => 0x5,
            Condition::Less => 0xC,
            Condition::LessEqual => 0xE,
            Condition::Greater => 0xF,
            Condition::GreaterEqual => 0xD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocKind {
    /// `rel32` call/jump target, patched once the target's final address
    /// (or, for a `.rodata`/extern symbol, a section-relative offset) is
    /// known.
    PcRel32,
    /// Absolute 64-bit address, used for string-literal pointers loaded
    /// into `.rodata`/`.data`.
    Abs64,
}

#[derive(Debug, Clone)]
pub struct Relocation {
    pub offset: usize,
    pub symbol: Symbol,
    pub kind: RelocKind,
}

/// An emitted function body: raw bytes plus the relocations that still
/// need the linker (or our own object emitter) to resolve a symbol
/// address into them.
#[derive(Debug, Default)]
pub struct Encoder {
    pub code: Vec<u8>,
    pub relocs: Vec<Relocation>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn rex(&mut self, w: bool, r: bool, x: bool, b: bool) {
        let byte = 0x40 | (w as u8) << 3 | (r as u8) << 2 | (x as u8) << 1 | (b as u8);
        if byte != 0x40 || w {
            self.code.push(byte);
        }
    }

    fn modrm(&mut self, modb: u8, reg: u8, rm: u8) {
        self.code.push((modb << 6) | ((reg & 0x7) << 3) | (rm & 0x7));
    }

    pub fn push_reg(&mut self, reg: Reg) {
        if reg.needs_rex_extension() {
            self.code.push(0x41);
        }
        self.code.push(0x50 + reg.low3());
    }

    pub fn pop_reg(&mut self, reg: Reg) {
        if reg.needs_rex_extension() {
            self.code.push(0x41);
        }
        self.code.push(0x58 + reg.low3());
    }

    pub fn ret(&mut self) {
        self.code.push(0xC3);
    }

    /// `mov dst, imm32` sign-extended into a 64-bit register.
    pub fn mov_reg_imm32(&mut self, dst: Reg, imm: i32) {
        self.rex(true, false, false, dst.needs_rex_extension());
        self.code.push(0xC7);
        self.modrm(0b11, 0, dst.low3());
        self.code.extend_from_slice(&imm.to_le_bytes());
    }

    pub fn mov_reg_reg(&mut self, dst: Reg, src: Reg) {
        self.rex(true, src.needs_rex_extension(), false, dst.needs_rex_extension());
        self.code.push(0x89);
        self.modrm(0b11, src.low3(), dst.low3());
    }

    /// `mov dst, [rbp + disp]` — loads a stack local.
    pub fn mov_reg_mem(&mut self, dst: Reg, base: Reg, disp: i32) {
        self.rex(true, dst.needs_rex_extension(), false, base.needs_rex_extension());
        self.code.push(0x8B);
        self.modrm_disp(dst.low3(), base, disp);
    }

    pub fn mov_mem_reg(&mut self, base: Reg, disp: i32, src: Reg) {
        self.rex(true, src.needs_rex_extension(), false, base.needs_rex_extension());
        self.code.push(0x89);
        self.modrm_disp(src.low3(), base, disp);
    }

    pub fn lea(&mut self, dst: Reg, base: Reg, disp: i32) {
        self.rex(true, dst.needs_rex_extension(), false, base.needs_rex_extension());
        self.code.push(0x8D);
        self.modrm_disp(dst.low3(), base, disp);
    }

    fn modrm_disp(&mut self, reg: u8, base: Reg, disp: i32) {
        if disp == 0 && base.low3() != Reg::Rbp.low3() {
            self.modrm(0b00, reg, base.low3());
        } else if let Ok(disp8) = i8::try_from(disp) {
            self.modrm(0b01, reg, base.low3());
            self.code.push(disp8 as u8);
        } else {
            self.modrm(0b10, reg, base.low3());
            self.code.extend_from_slice(&disp.to_le_bytes());
        }
    }

    pub fn add_reg_reg(&mut self, dst: Reg, src: Reg) {
        self.rex(true, src.needs_rex_extension(), false, dst.needs_rex_extension());
        self.code.push(0x01);
        self.modrm(0b11, src.low3(), dst.low3());
    }

    pub fn sub_reg_reg(&mut self, dst: Reg, src: Reg) {
        self.rex(true, src.needs_rex_extension(), false, dst.needs_rex_extension());
        self.code.push(0x29);
        self.modrm(0b11, src.low3(), dst.low3());
    }

    /// `imul dst, src` — two-operand signed multiply, result in `dst`.
    pub fn imul_reg_reg(&mut self, dst: Reg, src: Reg) {
        self.rex(true, dst.needs_rex_extension(), false, src.needs_rex_extension());
        self.code.push(0x0F);
        self.code.push(0xAF);
        self.modrm(0b11, dst.low3(), src.low3());
    }

    /// `cqo; idiv divisor` — signed 64-bit division: dividend in
    /// `rdx:rax`, quotient in `rax`, remainder in `rdx`.
    pub fn idiv_reg(&mut self, divisor: Reg) {
        self.code.push(0x48);
        self.code.push(0x99); // cqo
        self.rex(true, false, false, divisor.needs_rex_extension());
        self.code.push(0xF7);
        self.modrm(0b11, 7, divisor.low3());
    }

    /// `div divisor` — unsigned counterpart of [`Encoder::idiv_reg`].
    pub fn div_reg(&mut self, divisor: Reg) {
        self.mov_reg_imm32(Reg::Rdx, 0); // xor rdx,rdx would be shorter; correctness first
        self.rex(true, false, false, divisor.needs_rex_extension());
        self.code.push(0xF7);
        self.modrm(0b11, 6, divisor.low3());
    }

    pub fn cmp_reg_reg(&mut self, lhs: Reg, rhs: Reg) {
        self.rex(true, rhs.needs_rex_extension(), false, lhs.needs_rex_extension());
        self.code.push(0x39);
        self.modrm(0b11, rhs.low3(), lhs.low3());
    }

    /// `imul dst, dst, imm32` — three-operand signed multiply by a
    /// constant, used for array element offsets (`index * elem_size`).
    pub fn imul_reg_imm32(&mut self, dst: Reg, imm: i32) {
        self.rex(true, dst.needs_rex_extension(), false, dst.needs_rex_extension());
        self.code.push(0x69);
        self.modrm(0b11, dst.low3(), dst.low3());
        self.code.extend_from_slice(&imm.to_le_bytes());
    }

    /// `mov dword ptr [base + disp], src` — no `REX.W`, the exact-4-byte
    /// remainder case of an aggregate byte copy.
    pub fn mov_mem_reg32(&mut self, base: Reg, disp: i32, src: Reg) {
        self.rex(false, src.needs_rex_extension(), false, base.needs_rex_extension());
        self.code.push(0x89);
        self.modrm_disp(src.low3(), base, disp);
    }

    /// `mov qword ptr [base + disp], imm32` sign-extended to 64 bits, used
    /// to store an enum discriminant.
    pub fn mov_mem_imm32(&mut self, base: Reg, disp: i32, imm: i32) {
        self.rex(true, false, false, base.needs_rex_extension());
        self.code.push(0xC7);
        self.modrm_disp(0, base, disp);
        self.code.extend_from_slice(&imm.to_le_bytes());
    }

    /// `lea dst, [rip + disp32]` with the displacement left as a relocation
    /// against `symbol` — the address-of form used to materialize a
    /// `.rodata` string literal's pointer at its use site.
    pub fn lea_rip_symbol(&mut self, dst: Reg, symbol: Symbol) {
        self.rex(true, dst.needs_rex_extension(), false, false);
        self.code.push(0x8D);
        self.modrm(0b00, dst.low3(), 0b101); // rm=101 with mod=00: RIP-relative
        let offset = self.code.len();
        self.code.extend_from_slice(&0i32.to_le_bytes());
        self.relocs.push(Relocation { offset, symbol, kind: RelocKind::PcRel32 });
    }

    /// `movzx dst, byte/word ptr [base + disp]` widening an unsigned
    /// narrow load (e.g. a `bool` field) to 64 bits.
    pub fn movzx_reg_mem8(&mut self, dst: Reg, base: Reg, disp: i32) {
        self.rex(true, dst.needs_rex_extension(), false, base.needs_rex_extension());
        self.code.push(0x0F);
        self.code.push(0xB6);
        self.modrm_disp(dst.low3(), base, disp);
    }

    /// `movsx dst, dword ptr [base + disp]` widening a signed 32-bit load.
    pub fn movsx_reg_mem32(&mut self, dst: Reg, base: Reg, disp: i32) {
        self.rex(true, dst.needs_rex_extension(), false, base.needs_rex_extension());
        self.code.push(0x63);
        self.modrm_disp(dst.low3(), base, disp);
    }

    /// `mov dst32, src32` — a 32-bit register-to-register move, which the
    /// ISA zero-extends into the full 64-bit register; used to truncate an
    /// `as` cast target to an unsigned width of 32 bits or narrower.
    pub fn mov_reg_reg32(&mut self, dst: Reg, src: Reg) {
        self.rex(false, src.needs_rex_extension(), false, dst.needs_rex_extension());
        self.code.push(0x89);
        self.modrm(0b11, src.low3(), dst.low3());
    }

    /// `movsx dst, src32` — sign-extends the low 32 bits of `src` into a
    /// 64-bit `dst`; the register-to-register counterpart of
    /// [`Encoder::movsx_reg_mem32`], used for a signed `as` cast.
    pub fn movsx_reg_reg32(&mut self, dst: Reg, src: Reg) {
        self.rex(true, dst.needs_rex_extension(), false, src.needs_rex_extension());
        self.code.push(0x63);
        self.modrm(0b11, dst.low3(), src.low3());
    }

    /// `movzx dst, src8` / `movsx dst, src8` — widens the low 8 bits of
    /// `src` into a 64-bit `dst`, zero- or sign-extended; used for an `as`
    /// cast to/from an 8-bit width.
    pub fn movzx_reg_reg8(&mut self, dst: Reg, src: Reg) {
        self.rex(true, dst.needs_rex_extension(), false, src.needs_rex_extension());
        self.code.push(0x0F);
        self.code.push(0xB6);
        self.modrm(0b11, dst.low3(), src.low3());
    }

    pub fn movsx_reg_reg8(&mut self, dst: Reg, src: Reg) {
        self.rex(true, dst.needs_rex_extension(), false, src.needs_rex_extension());
        self.code.push(0x0F);
        self.code.push(0xBE);
        self.modrm(0b11, dst.low3(), src.low3());
    }

    /// `movzx dst, src16` / `movsx dst, src16` — 16-bit counterparts of the
    /// 8-bit widening moves above, used for an `as` cast to/from `i16`/`u16`.
    pub fn movzx_reg_reg16(&mut self, dst: Reg, src: Reg) {
        self.rex(true, dst.needs_rex_extension(), false, src.needs_rex_extension());
        self.code.push(0x0F);
        self.code.push(0xB7);
        self.modrm(0b11, dst.low3(), src.low3());
    }

    pub fn movsx_reg_reg16(&mut self, dst: Reg, src: Reg) {
        self.rex(true, dst.needs_rex_extension(), false, src.needs_rex_extension());
        self.code.push(0x0F);
        self.code.push(0xBF);
        self.modrm(0b11, dst.low3(), src.low3());
    }

    /// `setcc dst_low8` then zero-extend into `dst` — materializes a
    /// comparison as a `0`/`1` value rather than a control-flow jump,
    /// for conditions used as plain `bool` expressions rather than as an
    /// `if`/`while` test.
    pub fn setcc_reg(&mut self, cc: Condition, dst: Reg) {
        self.rex(false, false, false, dst.needs_rex_extension());
        self.code.push(0x0F);
        self.code.push(0x90 + cc.code());
        self.modrm(0b11, 0, dst.low3());
        self.movzx_reg_reg8(dst, dst);
    }

    /// Emits a `jcc rel32` with a placeholder displacement and returns the
    /// byte offset of that displacement, to be patched once the target
    /// label's final offset is known.
    pub fn jcc_rel32(&mut self, cc: Condition) -> usize {
        self.code.push(0x0F);
        self.code.push(0x80 + cc.code());
        let patch_at = self.code.len();
        self.code.extend_from_slice(&0i32.to_le_bytes());
        patch_at
    }

    pub fn jmp_rel32(&mut self) -> usize {
        self.code.push(0xE9);
        let patch_at = self.code.len();
        self.code.extend_from_slice(&0i32.to_le_bytes());
        patch_at
    }

    /// Back-patches a previously emitted rel32 displacement once the
    /// jump/call target's offset (relative to the start of this
    /// function's code) is known.
    pub fn patch_rel32(&mut self, patch_at: usize, target: usize) {
        let rel = target as i64 - (patch_at as i64 + 4);
        self.code[patch_at..patch_at + 4].copy_from_slice(&(rel as i32).to_le_bytes());
    }

    /// `call sym` — the displacement is unknown until link time, so this
    /// records a relocation instead of patching immediately.
    pub fn call_symbol(&mut self, symbol: Symbol) {
        self.code.push(0xE8);
        let offset = self.code.len();
        self.code.extend_from_slice(&0i32.to_le_bytes());
        self.relocs.push(Relocation { offset, symbol, kind: RelocKind::PcRel32 });
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mov_reg_imm_then_ret_is_position_independent() {
        let mut enc = Encoder::new();
        enc.mov_reg_imm32(Reg::Rax, 42);
        enc.ret();
        assert_eq!(enc.code.last(), Some(&0xC3));
        assert!(enc.code.len() >= 6);
    }

    #[test]
    fn jcc_patch_produces_correct_relative_displacement() {
        let mut enc = Encoder::new();
        let patch_at = enc.jcc_rel32(Condition::Equal);
        enc.push_reg(Reg::Rbx);
        let target = enc.len();
        enc.patch_rel32(patch_at, target);
        let rel = i32::from_le_bytes(enc.code[patch_at..patch_at + 4].try_into().unwrap());
        assert_eq!(rel, (target as i64 - (patch_at as i64 + 4)) as i32);
    }

    #[test]
    fn call_symbol_records_a_relocation() {
        let mut strings = home_base::Interner::new();
        let sym = strings.intern("printf");
        let mut enc = Encoder::new();
        enc.call_symbol(sym);
        assert_eq!(enc.relocs.len(), 1);
        assert_eq!(enc.relocs[0].kind, RelocKind::PcRel32);
    }
}
