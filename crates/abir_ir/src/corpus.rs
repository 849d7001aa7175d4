//! Corpus assembly.
//!
//! A corpus aggregates the translation units of one compiled artifact
//! and tracks its exported declarations. Corpora can be grouped; a
//! group designates a "main" corpus whose canonical types the other
//! members may reuse instead of building fresh ones.

use crate::{CorpusGroupId, CorpusId, DeclId, DeclKind, Environment, TuId};

/// Where a corpus was read from.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum CorpusOrigin {
    /// Unknown origin.
    #[default]
    Unknown,
    /// Read from an ELF binary (DWARF front-end).
    Elf,
    /// Read from CTF data.
    Ctf,
    /// Read back from the native XML serialization.
    NativeXml,
}

/// The collection of translation units and exported decls of one
/// compiled artifact.
pub struct Corpus {
    path: String,
    origin: CorpusOrigin,
    tus: Vec<TuId>,
    group: Option<CorpusGroupId>,
    exported_fns: Vec<DeclId>,
    exported_vars: Vec<DeclId>,
}

impl Corpus {
    /// Path of the artifact the corpus was built from.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Where the corpus was read from.
    pub fn origin(&self) -> CorpusOrigin {
        self.origin
    }

    /// The corpus's translation units, in load order.
    pub fn translation_units(&self) -> &[TuId] {
        &self.tus
    }

    /// The group the corpus belongs to, if any.
    pub fn group(&self) -> Option<CorpusGroupId> {
        self.group
    }

    /// Exported function decls, in registration order.
    pub fn exported_functions(&self) -> &[DeclId] {
        &self.exported_fns
    }

    /// Exported variable decls, in registration order.
    pub fn exported_variables(&self) -> &[DeclId] {
        &self.exported_vars
    }
}

/// An ordered set of corpora with a distinguished main corpus.
pub struct CorpusGroup {
    main: CorpusId,
    members: Vec<CorpusId>,
}

impl CorpusGroup {
    /// The main corpus of the group.
    pub fn main_corpus(&self) -> CorpusId {
        self.main
    }

    /// All members, the main corpus first.
    pub fn members(&self) -> &[CorpusId] {
        &self.members
    }
}

impl Environment {
    /// Create a corpus.
    pub fn new_corpus(&mut self, path: &str, origin: CorpusOrigin) -> CorpusId {
        let id = CorpusId::from_raw(
            u32::try_from(self.corpora.len())
                .unwrap_or_else(|_| panic!("corpus arena exceeded u32::MAX entries")),
        );
        self.corpora.push(Corpus {
            path: path.to_owned(),
            origin,
            tus: Vec::new(),
            group: None,
            exported_fns: Vec::new(),
            exported_vars: Vec::new(),
        });
        id
    }

    /// Hand a translation unit to a corpus.
    pub fn corpus_add_translation_unit(&mut self, corpus: CorpusId, tu: TuId) {
        self.corpus_mut(corpus).tus.push(tu);
        self.tu_mut(tu).set_corpus(corpus);
    }

    /// Record a function decl as exported if it carries a public
    /// symbol. Returns whether it was added.
    pub fn corpus_maybe_export_fn(&mut self, corpus: CorpusId, d: DeclId) -> bool {
        let symbol = match &self.decl(d).kind {
            DeclKind::Func(f) => f.symbol,
            _ => None,
        };
        let public = symbol.is_some_and(|s| self.symtab.is_public(s));
        if public {
            self.decl_mut(d).data.is_in_public_symbol_table = true;
            self.corpus_mut(corpus).exported_fns.push(d);
        }
        public
    }

    /// Record a variable decl as exported if it carries a public
    /// symbol. Returns whether it was added.
    pub fn corpus_maybe_export_var(&mut self, corpus: CorpusId, d: DeclId) -> bool {
        let symbol = match &self.decl(d).kind {
            DeclKind::Var(v) => v.symbol,
            _ => None,
        };
        let public = symbol.is_some_and(|s| self.symtab.is_public(s));
        if public {
            self.decl_mut(d).data.is_in_public_symbol_table = true;
            self.corpus_mut(corpus).exported_vars.push(d);
        }
        public
    }

    /// Create a corpus group around a main corpus.
    pub fn new_corpus_group(&mut self, main: CorpusId) -> CorpusGroupId {
        let id = CorpusGroupId::from_raw(
            u32::try_from(self.groups.len())
                .unwrap_or_else(|_| panic!("corpus-group arena exceeded u32::MAX entries")),
        );
        self.groups.push(CorpusGroup {
            main,
            members: vec![main],
        });
        self.corpus_mut(main).group = Some(id);
        id
    }

    /// Add a corpus to a group.
    pub fn add_corpus_to_group(&mut self, group: CorpusGroupId, corpus: CorpusId) {
        self.groups[group.index()].members.push(corpus);
        self.corpus_mut(corpus).group = Some(group);
    }

    /// The group to reuse canonical types from: present iff the corpus
    /// belongs to a group and is not the group's main corpus.
    pub fn should_reuse_type_from_corpus_group(&self, corpus: CorpusId) -> Option<CorpusGroupId> {
        let group = self.corpus(corpus).group()?;
        if self.corpus_group(group).main_corpus() == corpus {
            None
        } else {
            Some(group)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeclBinding, Location, SourceLanguage, SymbolBinding, SymbolType, SymbolVersion};

    #[test]
    fn corpus_collects_translation_units_in_order() {
        let mut env = Environment::new();
        let c = env.new_corpus("libfoo.so", CorpusOrigin::Elf);
        let tu1 = env.new_translation_unit("a.c", 64, SourceLanguage::C);
        let tu2 = env.new_translation_unit("b.c", 64, SourceLanguage::C);

        env.corpus_add_translation_unit(c, tu1);
        env.corpus_add_translation_unit(c, tu2);

        assert_eq!(env.corpus(c).translation_units(), &[tu1, tu2]);
        assert_eq!(env.tu(tu1).corpus(), Some(c));
    }

    #[test]
    fn only_public_symbols_export_decls() {
        let mut env = Environment::new();
        let c = env.new_corpus("libfoo.so", CorpusOrigin::Elf);
        let int = env.new_scalar_type("int", 32, 32);

        let name = env.intern("exported");
        let sym = env.symtab_mut().create(
            0,
            4,
            name,
            SymbolType::Object,
            SymbolBinding::Global,
            true,
            SymbolVersion::default(),
        );
        let v = env.new_var_decl("exported", int, DeclBinding::Global, Location::NONE);
        env.set_decl_symbol(v, sym);
        assert!(env.corpus_maybe_export_var(c, v));
        assert!(env.decl(v).data.is_in_public_symbol_table);

        // A variable without any symbol is not exported.
        let w = env.new_var_decl("hidden", int, DeclBinding::Local, Location::NONE);
        assert!(!env.corpus_maybe_export_var(c, w));
        assert_eq!(env.corpus(c).exported_variables(), &[v]);
    }

    #[test]
    fn group_reuse_applies_to_non_main_members_only() {
        let mut env = Environment::new();
        let main = env.new_corpus("vmlinux", CorpusOrigin::Elf);
        let module = env.new_corpus("module.ko", CorpusOrigin::Elf);
        let lone = env.new_corpus("lone.so", CorpusOrigin::Elf);

        let group = env.new_corpus_group(main);
        env.add_corpus_to_group(group, module);

        assert_eq!(env.should_reuse_type_from_corpus_group(main), None);
        assert_eq!(env.should_reuse_type_from_corpus_group(module), Some(group));
        assert_eq!(env.should_reuse_type_from_corpus_group(lone), None);
        assert_eq!(env.corpus_group(group).members(), &[main, module]);
    }
}
