//! Shared per-function codegen state, the same role as
//! `codegen::context::RefinementContext` — there it accumulates
//! generated Rust source text and the bindings currently in scope; here it
//! accumulates raw machine bytes via an [`Encoder`] plus the same kind of
//! binding lookup, resolved against a [`FrameLayout`] instead of a
//! source-level variable table.

use std::collections::HashMap;

use home_base::{Interner, Symbol};
use home_types::TypedAst;

use crate::emit::{Encoder, Reg};
use crate::frame::FrameLayout;
use crate::layout::LayoutTable;
use crate::strings::StringPool;

/// General-purpose registers available for expression evaluation, in
/// allocation order. `home-codegen` uses a simple stack-machine style
/// evaluator,
/// so only the top of this list is ever live at once per `FunctionContext`
/// nesting depth.
pub const SCRATCH_REGS: [Reg; 4] = [Reg::Rax, Reg::Rcx, Reg::Rdx, Reg::Rbx];

/// Patch lists for one nesting level of `while`/`loop`/`for`: every
/// `break`/`continue` statement lowered while this loop is the innermost
/// one enclosing it defers its jump target until the loop's own lowering
/// knows where the exit (`break`) or next-iteration (`continue`) point
/// ends up — mirroring the `fail_patches`/`end_jumps` deferred-patch style
/// [`crate::expr::lower_match`] already uses for its arm dispatch.
#[derive(Default)]
pub struct LoopLabels {
    pub break_patches: Vec<usize>,
    pub continue_patches: Vec<usize>,
}

pub struct FunctionContext<'a> {
    pub encoder: Encoder,
    pub frame: &'a FrameLayout,
    pub layouts: &'a LayoutTable,
    pub typed: &'a TypedAst,
    pub fn_symbols: &'a HashMap<Symbol, usize>,
    pub strings: &'a mut Interner,
    pub string_pool: &'a mut StringPool,
    depth: usize,
    loop_stack: Vec<LoopLabels>,
}

impl<'a> FunctionContext<'a> {
    pub fn new(
        frame: &'a FrameLayout,
        layouts: &'a LayoutTable,
        typed: &'a TypedAst,
        fn_symbols: &'a HashMap<Symbol, usize>,
        strings: &'a mut Interner,
        string_pool: &'a mut StringPool,
    ) -> Self {
        Self { encoder: Encoder::new(), frame, layouts, typed, fn_symbols, strings, string_pool, depth: 0, loop_stack: Vec::new() }
    }

    pub fn push_loop(&mut self) {
        self.loop_stack.push(LoopLabels::default());
    }

    /// Pops the innermost loop's patch lists once its lowering knows both
    /// the continue target and the exit address.
    pub fn pop_loop(&mut self) -> LoopLabels {
        self.loop_stack.pop().unwrap_or_default()
    }

    pub fn current_loop_mut(&mut self) -> Option<&mut LoopLabels> {
        self.loop_stack.last_mut()
    }

    /// The register the next expression's result should land in, following
    /// the `SCRATCH_REGS` nesting order; `depth` tracks how many results
    /// are pending on the conceptual evaluation stack.
    pub fn result_reg(&self) -> Reg {
        SCRATCH_REGS[self.depth.min(SCRATCH_REGS.len() - 1)]
    }

    pub fn push_depth(&mut self) {
        self.depth += 1;
    }

    pub fn pop_depth(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn local_offset(&self, name: Symbol) -> Option<i32> {
        self.frame.locals.get(&name).map(|l| -(l.stack_offset as i32))
    }

    /// Pools `content`'s text into the module-wide `.rodata` string pool,
    /// returning the synthetic label a `lea_rip_symbol` relocation can
    /// target — the plain-`Str`-literal half of spec §4.8's "String
    /// literals: interned in a `.rodata` section".
    pub fn intern_str_literal(&mut self, content: Symbol) -> crate::strings::PooledString {
        let text = self.strings.resolve(content).to_string();
        self.string_pool.intern(content, &text, self.strings)
    }

    /// Displacement of the anonymous stack slot reserved for an
    /// aggregate-valued expression with no named binding (a struct/array
    /// literal, an enum-variant construction, or a call to a
    /// aggregate-returning function), keyed by the expression's own
    /// `NodeKey`.
    pub fn temp_disp(&self, key: home_types::checker::NodeKey) -> Option<i32> {
        self.frame.temps.get(&key).map(|l| -(l.stack_offset as i32))
    }

    /// Displacement of the slot holding the hidden destination pointer a
    /// caller passes in `rdi` when this function's own return type is an
    /// aggregate (the sret calling convention).
    pub fn ret_ptr_disp(&self) -> Option<i32> {
        self.frame.ret_ptr_offset.map(|o| -(o as i32))
    }
}
