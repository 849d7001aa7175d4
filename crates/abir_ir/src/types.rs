//! The type graph.
//!
//! Types are tagged-variant nodes ([`TypeKind`]) stored in the
//! environment's type arena and addressed by [`TypeId`]. Sub-type
//! edges (pointee, underlying, element, return, ...) are plain
//! handles, so the graph may be cyclic; structural equality and
//! traversal are responsible for terminating on cycles.
//!
//! Each node also carries the canonicalization bookkeeping: the
//! canonical handle, the propagation state, the set of recursive types
//! it depends on, and the cached pretty representations.

use crate::{DeclId, IntegralType, Location, Name, ScopeId, TypeId};
use bitflags::bitflags;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

bitflags! {
    /// CV-qualifier mask of a qualified type.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct Qualifiers: u8 {
        /// The "const" qualifier.
        const CONST = 1 << 0;
        /// The "volatile" qualifier.
        const VOLATILE = 1 << 1;
        /// The "restrict" qualifier.
        const RESTRICT = 1 << 2;
    }
}

impl Qualifiers {
    /// Render the qualifier tokens in their fixed print order:
    /// `restrict const volatile`. Empty mask renders as `none` in the
    /// internal form and as nothing in the external one.
    pub fn print(self, internal: bool) -> String {
        if self.is_empty() {
            return if internal { "none".to_owned() } else { String::new() };
        }
        let mut parts: SmallVec<[&str; 3]> = SmallVec::new();
        if self.contains(Qualifiers::RESTRICT) {
            parts.push("restrict");
        }
        if self.contains(Qualifiers::CONST) {
            parts.push("const");
        }
        if self.contains(Qualifiers::VOLATILE) {
            parts.push("volatile");
        }
        parts.join(" ")
    }
}

/// Access specifier of a class member or base.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum AccessSpecifier {
    /// Unspecified access (e.g. C structs).
    #[default]
    Unspecified,
    /// Public access.
    Public,
    /// Protected access.
    Protected,
    /// Private access.
    Private,
}

/// The record linking a member decl to its containing scope: access
/// specifier and static-ness.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct ContextRel {
    /// Access specifier of the member.
    pub access: AccessSpecifier,
    /// Whether the member is static.
    pub is_static: bool,
}

/// Layout information of a data member.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct DataMemberInfo {
    /// Whether the member has been laid out by the compiler.
    pub is_laid_out: bool,
    /// Offset of the member in its containing type, in bits.
    pub offset_in_bits: u64,
}

/// Virtuality and special-function information of a member function.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct MemberFnInfo {
    /// Whether the function is virtual.
    pub is_virtual: bool,
    /// Offset of the function in the vtable, when virtual.
    pub vtable_offset: i64,
    /// Whether the function is a constructor.
    pub is_ctor: bool,
    /// Whether the function is a destructor.
    pub is_dtor: bool,
    /// Whether the function is const.
    pub is_const: bool,
}

/// One dimension of an array type, as inclusive `[lower, upper]`
/// bounds. `upper < lower` encodes an infinite dimension.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Subrange {
    /// Inclusive lower bound.
    pub lower: i64,
    /// Inclusive upper bound.
    pub upper: i64,
}

impl Subrange {
    /// A dimension of the given length, starting at 0.
    pub fn with_length(length: u64) -> Self {
        if length == 0 {
            Self::infinite()
        } else {
            Self {
                lower: 0,
                upper: i64::try_from(length - 1).unwrap_or(i64::MAX),
            }
        }
    }

    /// A dimension of unknown extent.
    pub fn infinite() -> Self {
        Self { lower: 0, upper: -1 }
    }

    /// Whether the dimension has unknown extent.
    pub fn is_infinite(self) -> bool {
        self.upper < self.lower
    }

    /// Number of elements of the dimension, 0 when infinite.
    pub fn length(self) -> u64 {
        if self.is_infinite() {
            0
        } else {
            self.upper.wrapping_sub(self.lower).unsigned_abs() + 1
        }
    }
}

/// A parameter of a function type.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Parameter {
    /// Position of the parameter. Assigned on append: starts at 0 when
    /// the first parameter is artificial (implicit `this`), else at 1.
    pub index: u32,
    /// The parameter's type.
    pub ty: TypeId,
    /// The parameter's name; may be empty.
    pub name: Name,
    /// Source location of the parameter.
    pub location: Location,
    /// Whether this is the trailing variadic marker.
    pub is_variadic: bool,
    /// Whether the parameter is compiler-generated (implicit `this`).
    pub is_artificial: bool,
}

impl Parameter {
    /// Create a parameter; its index is assigned when the function
    /// type is built.
    pub fn new(ty: TypeId, name: Name) -> Self {
        Self {
            index: 0,
            ty,
            name,
            location: Location::NONE,
            is_variadic: false,
            is_artificial: false,
        }
    }

    /// Mark the parameter artificial (implicit `this`).
    pub fn artificial(mut self) -> Self {
        self.is_artificial = true;
        self
    }

    /// Mark the parameter as the trailing variadic marker.
    pub fn variadic(mut self) -> Self {
        self.is_variadic = true;
        self
    }
}

/// One enumerator of an enum type.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Enumerator {
    /// Enumerator name.
    pub name: Name,
    /// Enumerator value.
    pub value: i64,
}

/// A base-class specification of a class.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct BaseSpec {
    /// The base class.
    pub base: TypeId,
    /// Offset of the base sub-object in bits; -1 when unknown.
    pub offset_in_bits: i64,
    /// Access specifier of the inheritance.
    pub access: AccessSpecifier,
    /// Whether the inheritance is virtual.
    pub is_virtual: bool,
}

/// Scalar type: a fundamental type such as `int`, `void` or `bool`.
#[derive(Clone, Debug)]
pub struct ScalarType {
    /// Declaration facet (name, scope, location).
    pub decl: DeclId,
    /// Integral descriptor when the scalar is integral; `None` for
    /// `void`, the variadic-marker sentinel and non-integral scalars.
    pub integral: Option<IntegralType>,
}

/// Qualified type: cv-mask over an underlying type.
#[derive(Copy, Clone, Debug)]
pub struct QualifiedType {
    /// The type being qualified.
    pub underlying: TypeId,
    /// Combined cv-mask.
    pub quals: Qualifiers,
}

/// Pointer type.
#[derive(Copy, Clone, Debug)]
pub struct PointerType {
    /// The pointed-to type.
    pub pointee: TypeId,
}

/// Reference type.
#[derive(Copy, Clone, Debug)]
pub struct ReferenceType {
    /// The referred-to type.
    pub pointee: TypeId,
    /// True for lvalue references, false for rvalue references.
    pub is_lvalue: bool,
}

/// Array type: element plus one subrange per dimension.
#[derive(Clone, Debug)]
pub struct ArrayType {
    /// Element type.
    pub element: TypeId,
    /// Dimensions, outermost first.
    pub subranges: SmallVec<[Subrange; 2]>,
}

/// Enum type.
#[derive(Clone, Debug)]
pub struct EnumType {
    /// Declaration facet.
    pub decl: DeclId,
    /// Underlying integral type.
    pub underlying: TypeId,
    /// Enumerators in declaration order.
    pub enumerators: Vec<Enumerator>,
}

/// Typedef type.
#[derive(Copy, Clone, Debug)]
pub struct TypedefType {
    /// Declaration facet.
    pub decl: DeclId,
    /// The aliased type.
    pub underlying: TypeId,
}

/// Function type.
#[derive(Clone, Debug)]
pub struct FnType {
    /// Return type.
    pub return_type: TypeId,
    /// Parameters in declaration order.
    pub parms: Vec<Parameter>,
}

/// Method type: a function type with an owning-class edge.
#[derive(Clone, Debug)]
pub struct MethodType {
    /// The underlying function signature.
    pub fn_type: FnType,
    /// The class the method belongs to.
    pub class: TypeId,
}

/// Payload shared by classes and unions.
#[derive(Clone, Debug)]
pub struct ClassOrUnionParts {
    /// Declaration facet.
    pub decl: DeclId,
    /// Member scope.
    pub scope: ScopeId,
    /// Whether only the declaration is known, not the members.
    pub is_declaration_only: bool,
    /// The definition, when this is a declaration-only node and the
    /// definition has been seen.
    pub definition: Option<TypeId>,
    /// Earlier declaration-only nodes resolved to this definition.
    pub declarations: Vec<TypeId>,
    /// Data members, in declaration order.
    pub data_members: Vec<DeclId>,
    /// Member functions, in declaration order.
    pub member_fns: Vec<DeclId>,
    /// Virtual member functions; sorted into vtable order when the
    /// translation unit is marked constructed.
    pub virtual_member_fns: Vec<DeclId>,
    /// Member types.
    pub member_types: Vec<TypeId>,
    /// Member function templates.
    pub member_fn_templates: Vec<DeclId>,
    /// Member class templates.
    pub member_class_templates: Vec<DeclId>,
}

impl ClassOrUnionParts {
    /// Create an empty payload.
    pub fn new(decl: DeclId, scope: ScopeId, is_declaration_only: bool) -> Self {
        Self {
            decl,
            scope,
            is_declaration_only,
            definition: None,
            declarations: Vec::new(),
            data_members: Vec::new(),
            member_fns: Vec::new(),
            virtual_member_fns: Vec::new(),
            member_types: Vec::new(),
            member_fn_templates: Vec::new(),
            member_class_templates: Vec::new(),
        }
    }
}

/// Class type.
#[derive(Clone, Debug)]
pub struct ClassType {
    /// Members and declaration-only bookkeeping.
    pub parts: ClassOrUnionParts,
    /// Base-class specifications.
    pub bases: Vec<BaseSpec>,
    /// Whether the class was declared with the `struct` keyword. The
    /// internal representation normalizes this away.
    pub is_struct: bool,
}

/// Union type.
#[derive(Clone, Debug)]
pub struct UnionType {
    /// Members and declaration-only bookkeeping.
    pub parts: ClassOrUnionParts,
}

/// The kind of a template parameter.
#[derive(Copy, Clone, Debug)]
pub enum TemplateParmKind {
    /// A type parameter (`typename T`).
    Type,
    /// A non-type parameter, carrying its type.
    NonType(TypeId),
    /// A template-template parameter.
    TemplateTemplate,
    /// A parameter composed out of another type (e.g. `T*`).
    Composition(TypeId),
}

/// A template parameter.
#[derive(Copy, Clone, Debug)]
pub struct TemplateParmType {
    /// Declaration facet.
    pub decl: DeclId,
    /// Position of the parameter in the template parameter list.
    pub index: u32,
    /// Parameter kind.
    pub kind: TemplateParmKind,
}

/// Tagged variant of all type kinds.
#[derive(Clone, Debug)]
pub enum TypeKind {
    /// Scalar type.
    Scalar(ScalarType),
    /// Qualified type.
    Qualified(QualifiedType),
    /// Pointer type.
    Pointer(PointerType),
    /// Reference type.
    Reference(ReferenceType),
    /// Array type.
    Array(ArrayType),
    /// Enum type.
    Enum(EnumType),
    /// Typedef type.
    Typedef(TypedefType),
    /// Function type.
    Function(FnType),
    /// Method type.
    Method(MethodType),
    /// Class type.
    Class(ClassType),
    /// Union type.
    Union(UnionType),
    /// Template parameter.
    TemplateParameter(TemplateParmType),
}

/// Discriminant of a [`TypeKind`], for cheap dispatch while the
/// environment is mutably borrowed.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TypeTag {
    /// Scalar type.
    Scalar,
    /// Qualified type.
    Qualified,
    /// Pointer type.
    Pointer,
    /// Reference type.
    Reference,
    /// Array type.
    Array,
    /// Enum type.
    Enum,
    /// Typedef type.
    Typedef,
    /// Function type.
    Function,
    /// Method type.
    Method,
    /// Class type.
    Class,
    /// Union type.
    Union,
    /// Template parameter.
    TemplateParameter,
}

impl TypeKind {
    /// The discriminant of this kind.
    pub fn tag(&self) -> TypeTag {
        match self {
            TypeKind::Scalar(_) => TypeTag::Scalar,
            TypeKind::Qualified(_) => TypeTag::Qualified,
            TypeKind::Pointer(_) => TypeTag::Pointer,
            TypeKind::Reference(_) => TypeTag::Reference,
            TypeKind::Array(_) => TypeTag::Array,
            TypeKind::Enum(_) => TypeTag::Enum,
            TypeKind::Typedef(_) => TypeTag::Typedef,
            TypeKind::Function(_) => TypeTag::Function,
            TypeKind::Method(_) => TypeTag::Method,
            TypeKind::Class(_) => TypeTag::Class,
            TypeKind::Union(_) => TypeTag::Union,
            TypeKind::TemplateParameter(_) => TypeTag::TemplateParameter,
        }
    }

    /// The declaration facet of a named type kind, if it has one.
    pub fn decl(&self) -> Option<DeclId> {
        match self {
            TypeKind::Scalar(s) => Some(s.decl),
            TypeKind::Enum(e) => Some(e.decl),
            TypeKind::Typedef(t) => Some(t.decl),
            TypeKind::Class(c) => Some(c.parts.decl),
            TypeKind::Union(u) => Some(u.parts.decl),
            TypeKind::TemplateParameter(p) => Some(p.decl),
            TypeKind::Qualified(_)
            | TypeKind::Pointer(_)
            | TypeKind::Reference(_)
            | TypeKind::Array(_)
            | TypeKind::Function(_)
            | TypeKind::Method(_) => None,
        }
    }

    /// The class-or-union payload, if this is a class or union.
    pub fn class_or_union(&self) -> Option<&ClassOrUnionParts> {
        match self {
            TypeKind::Class(c) => Some(&c.parts),
            TypeKind::Union(u) => Some(&u.parts),
            _ => None,
        }
    }

    /// Mutable class-or-union payload.
    pub fn class_or_union_mut(&mut self) -> Option<&mut ClassOrUnionParts> {
        match self {
            TypeKind::Class(c) => Some(&mut c.parts),
            TypeKind::Union(u) => Some(&mut u.parts),
            _ => None,
        }
    }
}

/// A node of the type arena.
///
/// The canonicalization bookkeeping follows the propagation state
/// machine: a node starts with no canonical; it may receive a
/// tentatively propagated canonical (`canonical_type_propagated` set,
/// `propagated_canonical_type_confirmed` clear, and at least one entry
/// in `depends_on` while the justifying recursion is alive); the
/// propagation is later either confirmed or cancelled.
#[derive(Debug)]
pub struct TypeNode {
    /// The variant payload.
    pub kind: TypeKind,
    pub(crate) size_in_bits: u64,
    pub(crate) alignment_in_bits: u64,
    pub(crate) canonical: Option<TypeId>,
    pub(crate) canonical_type_propagated: bool,
    pub(crate) propagated_canonical_type_confirmed: bool,
    pub(crate) depends_on: FxHashSet<TypeId>,
    pub(crate) cached_internal_repr: Option<Name>,
    pub(crate) cached_repr: Option<Name>,
}

impl TypeNode {
    /// Create a node with no canonical type.
    pub(crate) fn new(kind: TypeKind, size_in_bits: u64, alignment_in_bits: u64) -> Self {
        Self {
            kind,
            size_in_bits,
            alignment_in_bits,
            canonical: None,
            canonical_type_propagated: false,
            propagated_canonical_type_confirmed: false,
            depends_on: FxHashSet::default(),
            cached_internal_repr: None,
            cached_repr: None,
        }
    }

    /// Size of the type in bits, as stored on this node. Qualified and
    /// typedef nodes forward to their underlying type through
    /// [`Environment::type_size_in_bits`](crate::Environment::type_size_in_bits).
    pub fn size_in_bits(&self) -> u64 {
        self.size_in_bits
    }

    /// Alignment of the type in bits, as stored on this node.
    pub fn alignment_in_bits(&self) -> u64 {
        self.alignment_in_bits
    }

    /// The canonical type, if one has been assigned (including a
    /// tentatively propagated one).
    pub fn canonical(&self) -> Option<TypeId> {
        self.canonical
    }

    /// Whether the canonical was assigned by speculative propagation.
    pub fn canonical_type_propagated(&self) -> bool {
        self.canonical_type_propagated
    }

    /// Whether a propagated canonical has been confirmed.
    pub fn propagated_canonical_type_confirmed(&self) -> bool {
        self.propagated_canonical_type_confirmed
    }

    /// Whether the node depends on any recursive type comparison.
    pub fn depends_on_recursive_type(&self) -> bool {
        !self.depends_on.is_empty()
    }

    /// Whether the node depends on the given recursive type.
    pub fn depends_on(&self, t: TypeId) -> bool {
        self.depends_on.contains(&t)
    }
}
