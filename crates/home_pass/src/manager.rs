//! Orders the block-level passes over every function body in a `Module`
//! and accumulates their counters, running `fold` → `dce` →
//! `propagate` in sequence per function — extended here with `licm` and
//! `inline`, gated by [`OptLevel::passes`].

use home_base::Interner;
use home_parser::ast::{Block, ImplDef, Item, ItemKind, Module};
use home_parser::Arena;

use crate::dce::dce_block;
use crate::fold::fold_block;
use crate::inline::inline_module;
use crate::level::OptLevel;
use crate::licm::licm_block;
use crate::propagate::propagate_block;
use crate::stats::PassStats;

pub struct PassManager {
    level: OptLevel,
}

impl PassManager {
    pub fn new(level: OptLevel) -> Self {
        Self { level }
    }

    /// Runs every pass this level enables and returns the rewritten module
    /// plus the total counters across all functions and passes.
    pub fn run<'a>(&self, module: &Module<'a>, arena: &'a Arena, interner: &mut Interner) -> (Module<'a>, PassStats) {
        let set = self.level.passes();
        let mut stats = PassStats::new();

        let items: Vec<Item<'a>> = module
            .items
            .iter()
            .map(|item| self.run_item(item, &set, arena, interner, &mut stats))
            .collect();
        let module = Module { items: arena.alloc_slice(items) };

        let module = if set.inline {
            let inlined = inline_module(&module, arena, set.inline_size_bound, &mut stats);
            inlined
        } else {
            module
        };

        (module, stats)
    }

    fn run_item<'a>(&self, item: &Item<'a>, set: &crate::level::PassSet, arena: &'a Arena, interner: &mut Interner, stats: &mut PassStats) -> Item<'a> {
        match &item.kind {
            ItemKind::Fn(def) => {
                let mut def = def.clone();
                if let Some(body) = def.body {
                    def.body = Some(self.run_block(body, set, arena, interner, stats));
                }
                Item { kind: ItemKind::Fn(def), attrs: item.attrs, span: item.span }
            }
            ItemKind::Impl(def) => {
                let methods: Vec<_> = def
                    .methods
                    .iter()
                    .map(|m| {
                        let mut m = m.clone();
                        if let Some(body) = m.body {
                            m.body = Some(self.run_block(body, set, arena, interner, stats));
                        }
                        m
                    })
                    .collect();
                Item {
                    kind: ItemKind::Impl(ImplDef { trait_name: def.trait_name, target: def.target.clone(), methods: arena.alloc_slice(methods), span: def.span }),
                    attrs: item.attrs,
                    span: item.span,
                }
            }
            _ => item.clone(),
        }
    }

    fn run_block<'a>(&self, body: &'a Block<'a>, set: &crate::level::PassSet, arena: &'a Arena, interner: &mut Interner, stats: &mut PassStats) -> &'a Block<'a> {
        let mut block = body;
        if set.fold {
            block = fold_block(block, arena, interner, stats);
        }
        if set.dce {
            block = dce_block(block, arena, stats);
        }
        if set.fold {
            block = propagate_block(block, arena, interner, stats);
        }
        if set.licm {
            block = licm_block(block, arena, stats);
        }
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use home_lexer::Lexer;
    use home_parser::Parser;

    fn run_at(src: &str, level: OptLevel) -> PassStats {
        let mut strings = Interner::new();
        let (tokens, _) = Lexer::new(src, &mut strings).tokenize();
        let arena = Arena::new();
        let (module, _) = Parser::new(tokens, &arena, &mut strings).parse_module();
        let (_, stats) = PassManager::new(level).run(&module, &arena, &mut strings);
        stats
    }

    #[test]
    fn o0_runs_no_passes() {
        let stats = run_at("fn main() -> i32 { return 1 + 1; }", OptLevel::O0);
        assert_eq!(stats.total(), 0);
    }

    #[test]
    fn o1_folds_a_constant() {
        let stats = run_at("fn main() -> i32 { return 1 + 1; }", OptLevel::O1);
        assert!(stats.folded_constants >= 1);
    }

    #[test]
    fn o2_inlines_and_hoists() {
        let stats = run_at("fn add1(x: i32) -> i32 { x + 1 } fn main() -> i32 { let mut i = 0; while i < 10 { let step = 1 + 1; i = i + step; } return add1(i); }", OptLevel::O2);
        assert!(stats.inlined_calls >= 1);
        assert!(stats.hoisted_invariants >= 1);
    }
}
