//! The environment: process-wide owner of the whole IR.
//!
//! An [`Environment`] owns every arena (types, decls, scopes, symbols,
//! translation units, corpora), the interned-string pool, the two
//! sentinel types (void and the variadic-parameter marker), the
//! canonical-type registry, and the mutable comparison scratch used by
//! the canonicalization engine. It is created once per analysis
//! session and destroyed last; all handles are only meaningful in the
//! environment that minted them.
//!
//! An environment must not be shared across threads without external
//! synchronization: the comparison scratch is mutated freely during
//! canonicalization.

use crate::comparison::CmpState;
use crate::corpus::{Corpus, CorpusGroup};
use crate::scope::ScopeNode;
use crate::tu::TranslationUnit;
use crate::types::{
    BaseSpec, Enumerator, Parameter, Qualifiers, Subrange, TemplateParmType, TypeKind, TypeNode,
    TypeTag,
};
use crate::{
    CorpusGroupId, CorpusId, DeclId, DeclNode, Name, ScopeId, StringInterner, SymbolTable, TuId,
    TypeId,
};
use rustc_hash::FxHashMap;

/// Tunables of the canonicalization engine, mirroring the original
/// system's environment options.
#[derive(Copy, Clone, Debug)]
pub struct EnvConfig {
    /// Allow the speculative canonical-type propagation optimization
    /// during structural comparison.
    pub on_the_fly_canonicalization: bool,
    /// Allow caching of sub-type comparison results. Off by default;
    /// correctness does not depend on it.
    pub allow_comparison_caching: bool,
    /// Treat a declaration-only class as equal to its definition even
    /// when comparing against unrelated classes of the same name.
    pub decl_only_class_equals_definition: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            on_the_fly_canonicalization: true,
            allow_comparison_caching: false,
            decl_only_class_equals_definition: false,
        }
    }
}

/// Process-wide owner of the IR. See the module documentation.
pub struct Environment {
    pub(crate) interner: StringInterner,
    pub(crate) types: Vec<TypeNode>,
    pub(crate) decls: Vec<DeclNode>,
    pub(crate) scopes: Vec<ScopeNode>,
    pub(crate) symtab: SymbolTable,
    pub(crate) tus: Vec<TranslationUnit>,
    pub(crate) corpora: Vec<Corpus>,
    pub(crate) groups: Vec<CorpusGroup>,
    /// Canonical-type registry: internal representation -> candidates,
    /// in registration order. The ODR fast path iterates it from the
    /// end, so later-loaded corpora see earlier ones first.
    pub(crate) canonical_types: FxHashMap<Name, Vec<TypeId>>,
    void_type: Option<TypeId>,
    variadic_type: Option<TypeId>,
    canonicalization_done: bool,
    config: EnvConfig,
    pub(crate) cmp: CmpState,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self {
            interner: StringInterner::new(),
            types: Vec::with_capacity(256),
            decls: Vec::with_capacity(256),
            scopes: Vec::with_capacity(64),
            symtab: SymbolTable::new(),
            tus: Vec::new(),
            corpora: Vec::new(),
            groups: Vec::new(),
            canonical_types: FxHashMap::default(),
            void_type: None,
            variadic_type: None,
            canonicalization_done: false,
            config: EnvConfig::default(),
            cmp: CmpState::default(),
        }
    }

    // === Interning ===

    /// The interned-string pool.
    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    /// Intern a string.
    pub fn intern(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    /// Look up an interned string.
    pub fn str(&self, name: Name) -> &'static str {
        self.interner.lookup(name)
    }

    // === Configuration ===

    /// The engine tunables.
    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// Mutable access to the engine tunables.
    pub fn config_mut(&mut self) -> &mut EnvConfig {
        &mut self.config
    }

    /// Whether the canonicalization pass has completed. Advisory: no
    /// further structural mutation is expected once set.
    pub fn canonicalization_is_done(&self) -> bool {
        self.canonicalization_done
    }

    /// Flip the canonicalization-done flag.
    pub fn set_canonicalization_is_done(&mut self, done: bool) {
        self.canonicalization_done = done;
    }

    // === Sentinel types ===

    /// The `void` type, lazily constructed exactly once.
    pub fn get_void_type(&mut self) -> TypeId {
        if let Some(t) = self.void_type {
            return t;
        }
        let name = self.intern("void");
        let t = self.new_scalar_type_impl(name, 0, 0, None);
        self.void_type = Some(t);
        t
    }

    /// The variadic-parameter marker type, lazily constructed exactly
    /// once.
    pub fn get_variadic_parameter_type(&mut self) -> TypeId {
        if let Some(t) = self.variadic_type {
            return t;
        }
        let name = self.intern("variadic parameter type");
        let t = self.new_scalar_type_impl(name, 0, 0, None);
        self.variadic_type = Some(t);
        t
    }

    /// Check whether `t` is the void sentinel.
    pub fn is_void_type(&self, t: TypeId) -> bool {
        self.void_type == Some(t)
    }

    /// Check whether `t` is the variadic-parameter sentinel.
    pub fn is_variadic_parameter_type(&self, t: TypeId) -> bool {
        self.variadic_type == Some(t)
    }

    // === Arena access ===

    /// Get a type node.
    ///
    /// # Panics
    /// Panics if the handle was not produced by this environment.
    pub fn type_node(&self, t: TypeId) -> &TypeNode {
        &self.types[t.index()]
    }

    pub(crate) fn type_node_mut(&mut self, t: TypeId) -> &mut TypeNode {
        &mut self.types[t.index()]
    }

    /// Get a decl node.
    ///
    /// # Panics
    /// Panics if the handle was not produced by this environment.
    pub fn decl(&self, d: DeclId) -> &DeclNode {
        &self.decls[d.index()]
    }

    pub(crate) fn decl_mut(&mut self, d: DeclId) -> &mut DeclNode {
        &mut self.decls[d.index()]
    }

    /// Get a scope node.
    ///
    /// # Panics
    /// Panics if the handle was not produced by this environment.
    pub fn scope_node(&self, s: ScopeId) -> &ScopeNode {
        &self.scopes[s.index()]
    }

    pub(crate) fn scope_node_mut(&mut self, s: ScopeId) -> &mut ScopeNode {
        &mut self.scopes[s.index()]
    }

    /// The symbol table.
    pub fn symtab(&self) -> &SymbolTable {
        &self.symtab
    }

    /// Mutable access to the symbol table.
    pub fn symtab_mut(&mut self) -> &mut SymbolTable {
        &mut self.symtab
    }

    /// Get a translation unit.
    ///
    /// # Panics
    /// Panics if the handle was not produced by this environment.
    pub fn tu(&self, tu: TuId) -> &TranslationUnit {
        &self.tus[tu.index()]
    }

    pub(crate) fn tu_mut(&mut self, tu: TuId) -> &mut TranslationUnit {
        &mut self.tus[tu.index()]
    }

    /// Get a corpus.
    ///
    /// # Panics
    /// Panics if the handle was not produced by this environment.
    pub fn corpus(&self, c: CorpusId) -> &Corpus {
        &self.corpora[c.index()]
    }

    pub(crate) fn corpus_mut(&mut self, c: CorpusId) -> &mut Corpus {
        &mut self.corpora[c.index()]
    }

    /// Get a corpus group.
    ///
    /// # Panics
    /// Panics if the handle was not produced by this environment.
    pub fn corpus_group(&self, g: CorpusGroupId) -> &CorpusGroup {
        &self.groups[g.index()]
    }

    /// Number of types in the arena.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Number of decls in the arena.
    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }

    // === Type attribute accessors ===
    //
    // These return owned (Copy) data so the equality engine can
    // recurse while holding `&mut Environment`.

    /// The kind discriminant of a type.
    pub fn type_tag(&self, t: TypeId) -> TypeTag {
        self.type_node(t).kind.tag()
    }

    /// Size of a type in bits. Qualified and typedef nodes forward to
    /// their underlying type.
    pub fn type_size_in_bits(&self, t: TypeId) -> u64 {
        match &self.type_node(t).kind {
            TypeKind::Qualified(q) => self.type_size_in_bits(q.underlying),
            TypeKind::Typedef(td) => self.type_size_in_bits(td.underlying),
            _ => self.type_node(t).size_in_bits,
        }
    }

    /// Alignment of a type in bits. Qualified and typedef nodes
    /// forward to their underlying type.
    pub fn type_alignment_in_bits(&self, t: TypeId) -> u64 {
        match &self.type_node(t).kind {
            TypeKind::Qualified(q) => self.type_alignment_in_bits(q.underlying),
            TypeKind::Typedef(td) => self.type_alignment_in_bits(td.underlying),
            _ => self.type_node(t).alignment_in_bits,
        }
    }

    /// The canonical type of `t`, if assigned.
    pub fn canonical_type(&self, t: TypeId) -> Option<TypeId> {
        self.type_node(t).canonical
    }

    /// The declaration facet of a named type.
    pub fn type_decl(&self, t: TypeId) -> Option<DeclId> {
        self.type_node(t).kind.decl()
    }

    /// The unqualified name of a named type; `None` for compound
    /// (unnamed) type kinds.
    pub fn type_name_id(&self, t: TypeId) -> Option<Name> {
        self.type_decl(t).map(|d| self.decl(d).data.name)
    }

    /// Whether a type is anonymous (a named kind with an empty name).
    pub fn is_anonymous_type(&self, t: TypeId) -> bool {
        self.type_decl(t)
            .is_some_and(|d| self.decl(d).data.is_anonymous)
    }

    /// The translation unit a type belongs to, through its decl facet.
    pub fn type_tu(&self, t: TypeId) -> Option<TuId> {
        self.type_decl(t).and_then(|d| self.decl(d).data.tu)
    }

    /// The corpus a type belongs to, through its translation unit.
    pub fn type_corpus(&self, t: TypeId) -> Option<CorpusId> {
        self.type_tu(t).and_then(|tu| self.tu(tu).corpus())
    }

    // === Kind-specific accessors ===

    /// Underlying type of a qualified type.
    ///
    /// # Panics
    /// Panics if `t` is not a qualified type.
    pub fn qualified_underlying(&self, t: TypeId) -> TypeId {
        match &self.type_node(t).kind {
            TypeKind::Qualified(q) => q.underlying,
            other => panic!("expected qualified type, got {:?}", other.tag()),
        }
    }

    /// CV-mask of a qualified type.
    ///
    /// # Panics
    /// Panics if `t` is not a qualified type.
    pub fn qualified_mask(&self, t: TypeId) -> Qualifiers {
        match &self.type_node(t).kind {
            TypeKind::Qualified(q) => q.quals,
            other => panic!("expected qualified type, got {:?}", other.tag()),
        }
    }

    /// Pointee of a pointer type.
    ///
    /// # Panics
    /// Panics if `t` is not a pointer type.
    pub fn pointer_pointee(&self, t: TypeId) -> TypeId {
        match &self.type_node(t).kind {
            TypeKind::Pointer(p) => p.pointee,
            other => panic!("expected pointer type, got {:?}", other.tag()),
        }
    }

    /// Pointee of a reference type.
    ///
    /// # Panics
    /// Panics if `t` is not a reference type.
    pub fn reference_pointee(&self, t: TypeId) -> TypeId {
        match &self.type_node(t).kind {
            TypeKind::Reference(r) => r.pointee,
            other => panic!("expected reference type, got {:?}", other.tag()),
        }
    }

    /// Whether a reference type is an lvalue reference.
    ///
    /// # Panics
    /// Panics if `t` is not a reference type.
    pub fn reference_is_lvalue(&self, t: TypeId) -> bool {
        match &self.type_node(t).kind {
            TypeKind::Reference(r) => r.is_lvalue,
            other => panic!("expected reference type, got {:?}", other.tag()),
        }
    }

    /// Element type of an array type.
    ///
    /// # Panics
    /// Panics if `t` is not an array type.
    pub fn array_element(&self, t: TypeId) -> TypeId {
        match &self.type_node(t).kind {
            TypeKind::Array(a) => a.element,
            other => panic!("expected array type, got {:?}", other.tag()),
        }
    }

    /// Number of dimensions of an array type.
    ///
    /// # Panics
    /// Panics if `t` is not an array type.
    pub fn array_subrange_count(&self, t: TypeId) -> usize {
        match &self.type_node(t).kind {
            TypeKind::Array(a) => a.subranges.len(),
            other => panic!("expected array type, got {:?}", other.tag()),
        }
    }

    /// One dimension of an array type.
    ///
    /// # Panics
    /// Panics if `t` is not an array type or `i` is out of bounds.
    pub fn array_subrange(&self, t: TypeId, i: usize) -> Subrange {
        match &self.type_node(t).kind {
            TypeKind::Array(a) => a.subranges[i],
            other => panic!("expected array type, got {:?}", other.tag()),
        }
    }

    /// Underlying type of an enum type.
    ///
    /// # Panics
    /// Panics if `t` is not an enum type.
    pub fn enum_underlying(&self, t: TypeId) -> TypeId {
        match &self.type_node(t).kind {
            TypeKind::Enum(e) => e.underlying,
            other => panic!("expected enum type, got {:?}", other.tag()),
        }
    }

    /// Number of enumerators of an enum type.
    ///
    /// # Panics
    /// Panics if `t` is not an enum type.
    pub fn enum_enumerator_count(&self, t: TypeId) -> usize {
        match &self.type_node(t).kind {
            TypeKind::Enum(e) => e.enumerators.len(),
            other => panic!("expected enum type, got {:?}", other.tag()),
        }
    }

    /// One enumerator of an enum type.
    ///
    /// # Panics
    /// Panics if `t` is not an enum type or `i` is out of bounds.
    pub fn enum_enumerator(&self, t: TypeId, i: usize) -> Enumerator {
        match &self.type_node(t).kind {
            TypeKind::Enum(e) => e.enumerators[i],
            other => panic!("expected enum type, got {:?}", other.tag()),
        }
    }

    /// Underlying type of a typedef.
    ///
    /// # Panics
    /// Panics if `t` is not a typedef.
    pub fn typedef_underlying(&self, t: TypeId) -> TypeId {
        match &self.type_node(t).kind {
            TypeKind::Typedef(td) => td.underlying,
            other => panic!("expected typedef, got {:?}", other.tag()),
        }
    }

    /// Return type of a function or method type.
    ///
    /// # Panics
    /// Panics if `t` is not a function or method type.
    pub fn fn_return_type(&self, t: TypeId) -> TypeId {
        match &self.type_node(t).kind {
            TypeKind::Function(f) => f.return_type,
            TypeKind::Method(m) => m.fn_type.return_type,
            other => panic!("expected function type, got {:?}", other.tag()),
        }
    }

    /// Number of parameters of a function or method type.
    ///
    /// # Panics
    /// Panics if `t` is not a function or method type.
    pub fn fn_parm_count(&self, t: TypeId) -> usize {
        match &self.type_node(t).kind {
            TypeKind::Function(f) => f.parms.len(),
            TypeKind::Method(m) => m.fn_type.parms.len(),
            other => panic!("expected function type, got {:?}", other.tag()),
        }
    }

    /// One parameter of a function or method type.
    ///
    /// # Panics
    /// Panics if `t` is not a function or method type or `i` is out of
    /// bounds.
    pub fn fn_parm(&self, t: TypeId, i: usize) -> Parameter {
        match &self.type_node(t).kind {
            TypeKind::Function(f) => f.parms[i],
            TypeKind::Method(m) => m.fn_type.parms[i],
            other => panic!("expected function type, got {:?}", other.tag()),
        }
    }

    /// Owning class of a method type.
    ///
    /// # Panics
    /// Panics if `t` is not a method type.
    pub fn method_class(&self, t: TypeId) -> TypeId {
        match &self.type_node(t).kind {
            TypeKind::Method(m) => m.class,
            other => panic!("expected method type, got {:?}", other.tag()),
        }
    }

    /// Whether a class was declared with the `struct` keyword.
    ///
    /// # Panics
    /// Panics if `t` is not a class type.
    pub fn class_is_struct(&self, t: TypeId) -> bool {
        match &self.type_node(t).kind {
            TypeKind::Class(c) => c.is_struct,
            other => panic!("expected class type, got {:?}", other.tag()),
        }
    }

    /// Number of base classes of a class type. Unions have none.
    ///
    /// # Panics
    /// Panics if `t` is not a class or union type.
    pub fn class_base_count(&self, t: TypeId) -> usize {
        match &self.type_node(t).kind {
            TypeKind::Class(c) => c.bases.len(),
            TypeKind::Union(_) => 0,
            other => panic!("expected class or union, got {:?}", other.tag()),
        }
    }

    /// One base-class specification of a class type.
    ///
    /// # Panics
    /// Panics if `t` is not a class type or `i` is out of bounds.
    pub fn class_base(&self, t: TypeId, i: usize) -> BaseSpec {
        match &self.type_node(t).kind {
            TypeKind::Class(c) => c.bases[i],
            other => panic!("expected class type, got {:?}", other.tag()),
        }
    }

    /// Whether `t` is a declaration-only class or union. False for
    /// every other kind.
    pub fn is_declaration_only(&self, t: TypeId) -> bool {
        self.type_node(t)
            .kind
            .class_or_union()
            .is_some_and(|p| p.is_declaration_only)
    }

    /// The definition of a declaration-only class or union, when known.
    pub fn decl_only_definition(&self, t: TypeId) -> Option<TypeId> {
        let parts = self.type_node(t).kind.class_or_union()?;
        if parts.is_declaration_only {
            parts.definition
        } else {
            None
        }
    }

    /// Member scope of a class or union.
    ///
    /// # Panics
    /// Panics if `t` is not a class or union type.
    pub fn class_scope(&self, t: TypeId) -> ScopeId {
        self.type_node(t)
            .kind
            .class_or_union()
            .map(|p| p.scope)
            .unwrap_or_else(|| panic!("expected class or union"))
    }

    /// Number of data members of a class or union.
    ///
    /// # Panics
    /// Panics if `t` is not a class or union type.
    pub fn class_data_member_count(&self, t: TypeId) -> usize {
        self.class_or_union_parts(t).data_members.len()
    }

    /// One data member of a class or union.
    ///
    /// # Panics
    /// Panics if `t` is not a class or union type or `i` is out of
    /// bounds.
    pub fn class_data_member(&self, t: TypeId, i: usize) -> DeclId {
        self.class_or_union_parts(t).data_members[i]
    }

    /// Number of virtual member functions of a class or union.
    ///
    /// # Panics
    /// Panics if `t` is not a class or union type.
    pub fn class_virtual_member_fn_count(&self, t: TypeId) -> usize {
        self.class_or_union_parts(t).virtual_member_fns.len()
    }

    /// One virtual member function of a class or union.
    ///
    /// # Panics
    /// Panics if `t` is not a class or union type or `i` is out of
    /// bounds.
    pub fn class_virtual_member_fn(&self, t: TypeId, i: usize) -> DeclId {
        self.class_or_union_parts(t).virtual_member_fns[i]
    }

    /// Number of member types of a class or union.
    ///
    /// # Panics
    /// Panics if `t` is not a class or union type.
    pub fn class_member_type_count(&self, t: TypeId) -> usize {
        self.class_or_union_parts(t).member_types.len()
    }

    /// One member type of a class or union.
    ///
    /// # Panics
    /// Panics if `t` is not a class or union type or `i` is out of
    /// bounds.
    pub fn class_member_type(&self, t: TypeId, i: usize) -> TypeId {
        self.class_or_union_parts(t).member_types[i]
    }

    /// Template-parameter payload.
    ///
    /// # Panics
    /// Panics if `t` is not a template parameter.
    pub fn template_parm(&self, t: TypeId) -> TemplateParmType {
        match &self.type_node(t).kind {
            TypeKind::TemplateParameter(p) => *p,
            other => panic!("expected template parameter, got {:?}", other.tag()),
        }
    }

    fn class_or_union_parts(&self, t: TypeId) -> &crate::types::ClassOrUnionParts {
        self.type_node(t)
            .kind
            .class_or_union()
            .unwrap_or_else(|| panic!("expected class or union"))
    }

    // === Canonical-type registry ===

    /// The candidates registered under a representation key, in
    /// registration order.
    pub fn canonical_candidates(&self, key: Name) -> &[TypeId] {
        self.canonical_types.get(&key).map_or(&[], Vec::as_slice)
    }

    /// Append a freshly promoted canonical type under its key.
    pub fn append_canonical_candidate(&mut self, key: Name, t: TypeId) {
        self.canonical_types.entry(key).or_default().push(t);
    }

    /// Number of representation keys in the registry.
    pub fn canonical_key_count(&self) -> usize {
        self.canonical_types.len()
    }

    /// Assign the canonical type of `t`.
    ///
    /// A canonical assigned here (as opposed to speculative
    /// propagation) is final: the node is marked confirmed and its
    /// dependency set cleared, unless a propagation is still pending
    /// on it.
    pub fn set_canonical_type(&mut self, t: TypeId, canonical: TypeId) {
        let node = self.type_node_mut(t);
        node.canonical = Some(canonical);
        if !node.canonical_type_propagated {
            node.propagated_canonical_type_confirmed = true;
            node.depends_on.clear();
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_have_stable_identity() {
        let mut env = Environment::new();
        let v1 = env.get_void_type();
        let v2 = env.get_void_type();
        assert_eq!(v1, v2);

        let m1 = env.get_variadic_parameter_type();
        let m2 = env.get_variadic_parameter_type();
        assert_eq!(m1, m2);
        assert_ne!(v1, m1);

        assert!(env.is_void_type(v1));
        assert!(env.is_variadic_parameter_type(m1));
        assert!(!env.is_void_type(m1));
    }

    #[test]
    fn config_defaults_match_the_original() {
        let env = Environment::new();
        assert!(env.config().on_the_fly_canonicalization);
        assert!(!env.config().allow_comparison_caching);
        assert!(!env.config().decl_only_class_equals_definition);
        assert!(!env.canonicalization_is_done());
    }

    #[test]
    fn canonical_registry_preserves_append_order() {
        let mut env = Environment::new();
        let key = env.intern("class X");
        let a = env.get_void_type();
        let b = env.get_variadic_parameter_type();

        env.append_canonical_candidate(key, a);
        env.append_canonical_candidate(key, b);
        assert_eq!(env.canonical_candidates(key), &[a, b]);
    }
}
