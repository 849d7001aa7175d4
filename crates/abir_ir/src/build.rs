//! Construction of IR nodes — the builder interface consumed by
//! front-ends.
//!
//! Front-ends (ELF/DWARF, CTF, XML readers) create types and decls
//! through these methods, attach decls to scopes via the primitives in
//! [`crate::scope`], and finally canonicalize. Types must not be
//! mutated once they carry a canonical type; the mutators here guard
//! that contract with debug assertions.

use crate::scope::{add_decl_to_scope, ScopeError, ScopeKind, ScopeNode};
use crate::types::{
    AccessSpecifier, ArrayType, BaseSpec, ClassOrUnionParts, ClassType, EnumType, Enumerator,
    FnType, MemberFnInfo, MethodType, Parameter, PointerType, QualifiedType, Qualifiers,
    ReferenceType, ScalarType, Subrange, TemplateParmKind, TemplateParmType, TypeKind, TypeNode,
    TypedefType, UnionType,
};
use crate::{
    DeclBinding, DeclData, DeclId, DeclKind, DeclNode, Environment, FnTemplateDecl, FuncDecl,
    IntegralType, Location, Name, NamespaceDecl, ScopeId, SymbolId, TuId, TypeId, VarDecl,
    ClassTemplateDecl,
};
use smallvec::SmallVec;

impl Environment {
    pub(crate) fn push_type(&mut self, node: TypeNode) -> TypeId {
        let id = TypeId::from_raw(
            u32::try_from(self.types.len())
                .unwrap_or_else(|_| panic!("type arena exceeded u32::MAX entries")),
        );
        self.types.push(node);
        id
    }

    pub(crate) fn push_decl(&mut self, node: DeclNode) -> DeclId {
        let id = DeclId::from_raw(
            u32::try_from(self.decls.len())
                .unwrap_or_else(|_| panic!("decl arena exceeded u32::MAX entries")),
        );
        self.decls.push(node);
        id
    }

    pub(crate) fn push_scope(&mut self, node: ScopeNode) -> ScopeId {
        let id = ScopeId::from_raw(
            u32::try_from(self.scopes.len())
                .unwrap_or_else(|_| panic!("scope arena exceeded u32::MAX entries")),
        );
        self.scopes.push(node);
        id
    }

    /// Guard against mutation of a canonicalized type.
    fn assert_type_mutable(&self, t: TypeId) {
        debug_assert!(
            self.canonical_type(t).is_none(),
            "attempt to mutate canonicalized type {t:?}"
        );
    }

    fn new_type_decl(&mut self, name: Name, location: Location) -> DeclId {
        // The decl facet is patched to point at its type right after
        // the type node is pushed.
        self.push_decl(DeclNode {
            data: DeclData::new(name, location),
            // Patched by the caller.
            kind: DeclKind::Type(TypeId::from_raw(u32::MAX)),
        })
    }

    fn finish_named_type(&mut self, decl: DeclId, node: TypeNode) -> TypeId {
        let t = self.push_type(node);
        self.decl_mut(decl).kind = DeclKind::Type(t);
        t
    }

    // === Type builders ===

    pub(crate) fn new_scalar_type_impl(
        &mut self,
        name: Name,
        size_in_bits: u64,
        alignment_in_bits: u64,
        integral: Option<IntegralType>,
    ) -> TypeId {
        let decl = self.new_type_decl(name, Location::NONE);
        self.finish_named_type(
            decl,
            TypeNode::new(
                TypeKind::Scalar(ScalarType { decl, integral }),
                size_in_bits,
                alignment_in_bits,
            ),
        )
    }

    /// Create a scalar type. When the name parses as an integral type
    /// ("unsigned long int", ...), the spelling is normalized so all
    /// spellings of one type share one name.
    pub fn new_scalar_type(
        &mut self,
        name: &str,
        size_in_bits: u64,
        alignment_in_bits: u64,
    ) -> TypeId {
        let integral = IntegralType::parse(name).ok();
        let name = match integral {
            Some(i) => self.intern(&i.to_string(true)),
            None => self.intern(name),
        };
        self.new_scalar_type_impl(name, size_in_bits, alignment_in_bits, integral)
    }

    /// Create a scalar type from an integral descriptor.
    pub fn new_integral_type(
        &mut self,
        integral: IntegralType,
        size_in_bits: u64,
        alignment_in_bits: u64,
    ) -> TypeId {
        let name = self.intern(&integral.to_string(true));
        self.new_scalar_type_impl(name, size_in_bits, alignment_in_bits, Some(integral))
    }

    /// Create a qualified type over `underlying`. The mask may be
    /// empty; the internal representation keeps such a type distinct
    /// from its underlying.
    pub fn new_qualified_type(&mut self, underlying: TypeId, quals: Qualifiers) -> TypeId {
        self.push_type(TypeNode::new(
            TypeKind::Qualified(QualifiedType { underlying, quals }),
            0,
            0,
        ))
    }

    /// Create a pointer type.
    pub fn new_pointer_type(
        &mut self,
        pointee: TypeId,
        size_in_bits: u64,
        alignment_in_bits: u64,
    ) -> TypeId {
        self.push_type(TypeNode::new(
            TypeKind::Pointer(PointerType { pointee }),
            size_in_bits,
            alignment_in_bits,
        ))
    }

    /// Create a reference type.
    pub fn new_reference_type(
        &mut self,
        pointee: TypeId,
        is_lvalue: bool,
        size_in_bits: u64,
        alignment_in_bits: u64,
    ) -> TypeId {
        self.push_type(TypeNode::new(
            TypeKind::Reference(ReferenceType { pointee, is_lvalue }),
            size_in_bits,
            alignment_in_bits,
        ))
    }

    /// Create an array type. Its size is the element size multiplied
    /// by every finite dimension length; an infinite dimension leaves
    /// the size as it was.
    pub fn new_array_type(&mut self, element: TypeId, subranges: Vec<Subrange>) -> TypeId {
        let mut size = self.type_size_in_bits(element);
        for s in &subranges {
            if !s.is_infinite() {
                size = size.saturating_mul(s.length());
            }
        }
        let alignment = self.type_alignment_in_bits(element);
        self.push_type(TypeNode::new(
            TypeKind::Array(ArrayType {
                element,
                subranges: SmallVec::from_vec(subranges),
            }),
            size,
            alignment,
        ))
    }

    /// Create an enum type. Size and alignment come from the
    /// underlying type; enumerators keep their insertion order.
    pub fn new_enum_type(
        &mut self,
        name: &str,
        underlying: TypeId,
        enumerators: Vec<Enumerator>,
        location: Location,
    ) -> TypeId {
        debug_assert!(
            matches!(self.type_tag(underlying), crate::types::TypeTag::Scalar),
            "the underlying type of an enum must be a scalar"
        );
        let name = self.intern(name);
        let size = self.type_size_in_bits(underlying);
        let alignment = self.type_alignment_in_bits(underlying);
        let decl = self.new_type_decl(name, location);
        self.finish_named_type(
            decl,
            TypeNode::new(
                TypeKind::Enum(EnumType {
                    decl,
                    underlying,
                    enumerators,
                }),
                size,
                alignment,
            ),
        )
    }

    /// Create a typedef of `underlying`.
    pub fn new_typedef(&mut self, name: &str, underlying: TypeId, location: Location) -> TypeId {
        let name = self.intern(name);
        let decl = self.new_type_decl(name, location);
        self.finish_named_type(
            decl,
            TypeNode::new(TypeKind::Typedef(TypedefType { decl, underlying }), 0, 0),
        )
    }

    /// Assign parameter indices on append: 0-based when the first
    /// parameter is artificial (implicit `this`), 1-based otherwise.
    fn index_parameters(parms: &mut [Parameter]) {
        let count = parms.len();
        let mut next = if parms.first().is_some_and(|p| p.is_artificial) {
            0
        } else {
            1
        };
        for (i, p) in parms.iter_mut().enumerate() {
            debug_assert!(
                !p.is_variadic || i + 1 == count,
                "variadic marker must be the last parameter"
            );
            p.index = next;
            next += 1;
        }
    }

    /// Create a function type. Function types have no syntactic scope,
    /// so their lifetime is bound to the translation unit.
    pub fn new_function_type(
        &mut self,
        tu: TuId,
        return_type: TypeId,
        mut parms: Vec<Parameter>,
    ) -> TypeId {
        Self::index_parameters(&mut parms);
        let t = self.push_type(TypeNode::new(
            TypeKind::Function(FnType { return_type, parms }),
            0,
            0,
        ));
        self.tu_mut(tu).keep_fn_type_alive(t);
        t
    }

    /// Create a method type owned by `class`.
    pub fn new_method_type(
        &mut self,
        tu: TuId,
        class: TypeId,
        return_type: TypeId,
        mut parms: Vec<Parameter>,
    ) -> TypeId {
        Self::index_parameters(&mut parms);
        let t = self.push_type(TypeNode::new(
            TypeKind::Method(MethodType {
                fn_type: FnType { return_type, parms },
                class,
            }),
            0,
            0,
        ));
        self.tu_mut(tu).keep_fn_type_alive(t);
        t
    }

    /// Create a class type. An empty name makes it anonymous.
    pub fn new_class_type(
        &mut self,
        name: &str,
        size_in_bits: u64,
        alignment_in_bits: u64,
        is_struct: bool,
        is_declaration_only: bool,
        location: Location,
    ) -> TypeId {
        let name = self.intern(name);
        let decl = self.new_type_decl(name, location);
        let ty = TypeId::from_raw(
            u32::try_from(self.types.len())
                .unwrap_or_else(|_| panic!("type arena exceeded u32::MAX entries")),
        );
        let scope = self.push_scope(ScopeNode::new(ScopeKind::Class { ty }, None));
        self.finish_named_type(
            decl,
            TypeNode::new(
                TypeKind::Class(ClassType {
                    parts: ClassOrUnionParts::new(decl, scope, is_declaration_only),
                    bases: Vec::new(),
                    is_struct,
                }),
                size_in_bits,
                alignment_in_bits,
            ),
        )
    }

    /// Create a union type. An empty name makes it anonymous.
    pub fn new_union_type(
        &mut self,
        name: &str,
        size_in_bits: u64,
        alignment_in_bits: u64,
        is_declaration_only: bool,
        location: Location,
    ) -> TypeId {
        let name = self.intern(name);
        let decl = self.new_type_decl(name, location);
        let ty = TypeId::from_raw(
            u32::try_from(self.types.len())
                .unwrap_or_else(|_| panic!("type arena exceeded u32::MAX entries")),
        );
        let scope = self.push_scope(ScopeNode::new(ScopeKind::Union { ty }, None));
        self.finish_named_type(
            decl,
            TypeNode::new(
                TypeKind::Union(UnionType {
                    parts: ClassOrUnionParts::new(decl, scope, is_declaration_only),
                }),
                size_in_bits,
                alignment_in_bits,
            ),
        )
    }

    /// Create a template parameter.
    pub fn new_template_parameter(
        &mut self,
        name: &str,
        index: u32,
        kind: TemplateParmKind,
    ) -> TypeId {
        let name = self.intern(name);
        let decl = self.new_type_decl(name, Location::NONE);
        self.finish_named_type(
            decl,
            TypeNode::new(
                TypeKind::TemplateParameter(TemplateParmType { decl, index, kind }),
                0,
                0,
            ),
        )
    }

    // === Class mutation (pre-canonicalization only) ===

    /// Add a base-class specification to a class.
    ///
    /// # Panics
    /// Panics if `class` is not a class type.
    pub fn class_add_base(&mut self, class: TypeId, base: BaseSpec) {
        self.assert_type_mutable(class);
        match &mut self.type_node_mut(class).kind {
            TypeKind::Class(c) => c.bases.push(base),
            other => panic!("expected class type, got {:?}", other.tag()),
        }
    }

    /// Add a data member to a class or union: records layout and
    /// access, and attaches the decl to the member scope.
    pub fn class_add_data_member(
        &mut self,
        class: TypeId,
        member: DeclId,
        access: AccessSpecifier,
        is_static: bool,
        is_laid_out: bool,
        offset_in_bits: u64,
    ) -> Result<(), ScopeError> {
        self.assert_type_mutable(class);
        {
            let decl = self.decl_mut(member);
            decl.data.context.access = access;
            decl.data.context.is_static = is_static;
            if let DeclKind::Var(v) = &mut decl.kind {
                v.member = Some(crate::DataMemberInfo {
                    is_laid_out,
                    offset_in_bits,
                });
            }
        }
        let scope = self.class_scope(class);
        add_decl_to_scope(self, member, scope)?;
        if let Some(parts) = self.type_node_mut(class).kind.class_or_union_mut() {
            parts.data_members.push(member);
        }
        Ok(())
    }

    /// Add a member function to a class or union.
    pub fn class_add_member_fn(
        &mut self,
        class: TypeId,
        member: DeclId,
        access: AccessSpecifier,
        is_static: bool,
        info: MemberFnInfo,
    ) -> Result<(), ScopeError> {
        self.assert_type_mutable(class);
        {
            let decl = self.decl_mut(member);
            decl.data.context.access = access;
            decl.data.context.is_static = is_static;
            if let DeclKind::Func(f) = &mut decl.kind {
                f.member = Some(info);
            }
        }
        let scope = self.class_scope(class);
        add_decl_to_scope(self, member, scope)?;
        if let Some(parts) = self.type_node_mut(class).kind.class_or_union_mut() {
            parts.member_fns.push(member);
            if info.is_virtual {
                parts.virtual_member_fns.push(member);
            }
        }
        Ok(())
    }

    /// Add a member type to a class or union.
    pub fn class_add_member_type(
        &mut self,
        class: TypeId,
        member: TypeId,
        access: AccessSpecifier,
    ) -> Result<(), ScopeError> {
        self.assert_type_mutable(class);
        let member_decl = self
            .type_decl(member)
            .unwrap_or_else(|| panic!("member type must be a named type"));
        self.decl_mut(member_decl).data.context.access = access;
        let scope = self.class_scope(class);
        add_decl_to_scope(self, member_decl, scope)?;
        if let Some(parts) = self.type_node_mut(class).kind.class_or_union_mut() {
            parts.member_types.push(member);
        }
        Ok(())
    }

    /// Add a member function template to a class or union.
    pub fn class_add_member_fn_template(
        &mut self,
        class: TypeId,
        template: DeclId,
    ) -> Result<(), ScopeError> {
        self.assert_type_mutable(class);
        let scope = self.class_scope(class);
        add_decl_to_scope(self, template, scope)?;
        if let Some(parts) = self.type_node_mut(class).kind.class_or_union_mut() {
            parts.member_fn_templates.push(template);
        }
        Ok(())
    }

    /// Add a member class template to a class or union.
    pub fn class_add_member_class_template(
        &mut self,
        class: TypeId,
        template: DeclId,
    ) -> Result<(), ScopeError> {
        self.assert_type_mutable(class);
        let scope = self.class_scope(class);
        add_decl_to_scope(self, template, scope)?;
        if let Some(parts) = self.type_node_mut(class).kind.class_or_union_mut() {
            parts.member_class_templates.push(template);
        }
        Ok(())
    }

    /// Link a declaration-only class or union to its definition. Both
    /// directions are recorded: the declaration learns its definition,
    /// and the definition remembers the declaration so a later
    /// canonicalization can reach back to it.
    pub fn set_class_definition(&mut self, declaration: TypeId, definition: TypeId) {
        debug_assert!(
            self.is_declaration_only(declaration),
            "only a declaration-only class can be linked to a definition"
        );
        if let Some(parts) = self.type_node_mut(declaration).kind.class_or_union_mut() {
            parts.definition = Some(definition);
        }
        if let Some(parts) = self.type_node_mut(definition).kind.class_or_union_mut() {
            parts.declarations.push(declaration);
        }
    }

    // === Decl builders ===

    /// Create a variable declaration.
    pub fn new_var_decl(
        &mut self,
        name: &str,
        ty: TypeId,
        binding: DeclBinding,
        location: Location,
    ) -> DeclId {
        let name = self.intern(name);
        self.push_decl(DeclNode {
            data: DeclData::new(name, location),
            kind: DeclKind::Var(VarDecl {
                ty,
                binding,
                symbol: None,
                member: None,
            }),
        })
    }

    /// Create a function declaration over a function or method type.
    pub fn new_fn_decl(
        &mut self,
        name: &str,
        ty: TypeId,
        binding: DeclBinding,
        declared_inline: bool,
        location: Location,
    ) -> DeclId {
        let name = self.intern(name);
        self.push_decl(DeclNode {
            data: DeclData::new(name, location),
            kind: DeclKind::Func(FuncDecl {
                ty,
                binding,
                declared_inline,
                symbol: None,
                member: None,
            }),
        })
    }

    /// Create a namespace declaration (with its scope).
    pub fn new_namespace(&mut self, name: &str, location: Location) -> DeclId {
        let name = self.intern(name);
        let decl = DeclId::from_raw(
            u32::try_from(self.decls.len())
                .unwrap_or_else(|_| panic!("decl arena exceeded u32::MAX entries")),
        );
        let scope = self.push_scope(ScopeNode::new(ScopeKind::Namespace { decl }, None));
        self.push_decl(DeclNode {
            data: DeclData::new(name, location),
            kind: DeclKind::Namespace(NamespaceDecl { scope }),
        })
    }

    /// Create a function template declaration.
    pub fn new_function_template(
        &mut self,
        name: &str,
        pattern: DeclId,
        parms: Vec<TypeId>,
        location: Location,
    ) -> DeclId {
        let name = self.intern(name);
        self.push_decl(DeclNode {
            data: DeclData::new(name, location),
            kind: DeclKind::FunctionTemplate(FnTemplateDecl { pattern, parms }),
        })
    }

    /// Create a class template declaration.
    pub fn new_class_template(
        &mut self,
        name: &str,
        pattern: TypeId,
        parms: Vec<TypeId>,
        location: Location,
    ) -> DeclId {
        let name = self.intern(name);
        self.push_decl(DeclNode {
            data: DeclData::new(name, location),
            kind: DeclKind::ClassTemplate(ClassTemplateDecl { pattern, parms }),
        })
    }

    // === Decl attribute setters ===

    /// Set the mangled linkage name of a decl.
    pub fn set_decl_linkage_name(&mut self, d: DeclId, linkage_name: &str) {
        let name = self.intern(linkage_name);
        self.decl_mut(d).data.linkage_name = name;
    }

    /// Set the visibility of a decl.
    pub fn set_decl_visibility(&mut self, d: DeclId, visibility: crate::Visibility) {
        self.decl_mut(d).data.visibility = visibility;
    }

    /// Attach an ELF symbol to a variable or function decl. The decl
    /// is flagged as being in the public symbol table when the symbol
    /// is public.
    pub fn set_decl_symbol(&mut self, d: DeclId, symbol: SymbolId) {
        let public = self.symtab.is_public(symbol);
        let decl = self.decl_mut(d);
        match &mut decl.kind {
            DeclKind::Var(v) => v.symbol = Some(symbol),
            DeclKind::Func(f) => f.symbol = Some(symbol),
            other => panic!("symbols attach to variables and functions, not {other:?}"),
        }
        decl.data.is_in_public_symbol_table = public;
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "Tests use expect for clarity")]
mod tests {
    use super::*;
    use crate::types::TypeTag;

    #[test]
    fn scalar_names_normalize() {
        let mut env = Environment::new();
        let a = env.new_scalar_type("unsigned long int", 64, 64);
        let b = env.new_scalar_type("long unsigned", 64, 64);
        // Two distinct nodes, one normalized name.
        assert_ne!(a, b);
        assert_eq!(env.type_name_id(a), env.type_name_id(b));
    }

    #[test]
    fn array_size_multiplies_finite_dimensions() {
        let mut env = Environment::new();
        let int = env.new_scalar_type("int", 32, 32);
        let arr = env.new_array_type(int, vec![Subrange::with_length(5)]);
        assert_eq!(env.type_size_in_bits(arr), 160);

        let inf = env.new_array_type(int, vec![Subrange::infinite()]);
        // The infinite dimension contributes nothing.
        assert_eq!(env.type_size_in_bits(inf), 32);

        let mixed = env.new_array_type(
            int,
            vec![Subrange::with_length(4), Subrange::infinite(), Subrange::with_length(2)],
        );
        assert_eq!(env.type_size_in_bits(mixed), 32 * 4 * 2);
    }

    #[test]
    fn qualified_and_typedef_forward_size() {
        let mut env = Environment::new();
        let int = env.new_scalar_type("int", 32, 32);
        let cint = env.new_qualified_type(int, Qualifiers::CONST);
        let alias = env.new_typedef("my_int", int, Location::NONE);
        assert_eq!(env.type_size_in_bits(cint), 32);
        assert_eq!(env.type_size_in_bits(alias), 32);
        assert_eq!(env.type_alignment_in_bits(cint), 32);
    }

    #[test]
    fn parameter_indices_skip_zero_without_this() {
        let mut env = Environment::new();
        let tu = env.new_translation_unit("t.c", 64, crate::SourceLanguage::C);
        let int = env.new_scalar_type("int", 32, 32);
        let void = env.get_void_type();

        let f = env.new_function_type(
            tu,
            void,
            vec![Parameter::new(int, Name::EMPTY), Parameter::new(int, Name::EMPTY)],
        );
        assert_eq!(env.fn_parm(f, 0).index, 1);
        assert_eq!(env.fn_parm(f, 1).index, 2);
    }

    #[test]
    fn artificial_first_parameter_gets_index_zero() {
        let mut env = Environment::new();
        let tu = env.new_translation_unit("t.cc", 64, crate::SourceLanguage::CPlusPlus);
        let int = env.new_scalar_type("int", 32, 32);
        let void = env.get_void_type();
        let class = env.new_class_type("C", 32, 32, false, false, Location::NONE);
        let this_ptr = env.new_pointer_type(class, 64, 64);

        let m = env.new_method_type(
            tu,
            class,
            void,
            vec![
                Parameter::new(this_ptr, Name::EMPTY).artificial(),
                Parameter::new(int, Name::EMPTY),
            ],
        );
        assert_eq!(env.fn_parm(m, 0).index, 0);
        assert_eq!(env.fn_parm(m, 1).index, 1);
        assert_eq!(env.method_class(m), class);
    }

    #[test]
    fn function_types_are_kept_alive_by_their_tu() {
        let mut env = Environment::new();
        let tu = env.new_translation_unit("t.c", 64, crate::SourceLanguage::C);
        let void = env.get_void_type();
        let f = env.new_function_type(tu, void, Vec::new());
        assert!(env.tu(tu).live_fn_types().contains(&f));
    }

    #[test]
    fn class_members_land_in_scope_and_lists() {
        let mut env = Environment::new();
        let int = env.new_scalar_type("int", 32, 32);
        let class = env.new_class_type("C", 32, 32, false, false, Location::NONE);

        let m = env.new_var_decl("a", int, DeclBinding::None, Location::NONE);
        env.class_add_data_member(class, m, AccessSpecifier::Public, false, true, 0)
            .expect("attach succeeds");

        assert_eq!(env.class_data_member_count(class), 1);
        assert_eq!(env.class_data_member(class, 0), m);
        assert_eq!(env.decl(m).data.scope, Some(env.class_scope(class)));
        assert_eq!(env.type_tag(class), TypeTag::Class);
    }

    #[test]
    fn decl_only_link_records_both_directions() {
        let mut env = Environment::new();
        let decl_only = env.new_class_type("C", 0, 0, false, true, Location::NONE);
        let def = env.new_class_type("C", 64, 64, false, false, Location::NONE);
        env.set_class_definition(decl_only, def);

        assert_eq!(env.decl_only_definition(decl_only), Some(def));
        assert!(env
            .type_node(def)
            .kind
            .class_or_union()
            .expect("class payload")
            .declarations
            .contains(&decl_only));
    }
}
