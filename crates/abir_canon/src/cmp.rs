//! Structural equality over the type graph.
//!
//! [`equal`] compares two types member-wise. It terminates on cyclic
//! graphs through two mechanisms owned by the environment: per-pair
//! re-entrancy sets for class and function types (seeing the same pair
//! again during recursion answers `true`, assuming equality pending
//! the outer resolution), and the composite operand stacks that let a
//! detected cycle mark which types hang off a recursive one.
//!
//! The comparison returns at the first difference, unless the caller
//! passes a [`ChangeKind`] sink; then it keeps running and accumulates
//! the union of local-change and subtype-change bits.

use crate::peel::peel_composition;
use abir_ir::types::TypeKind;
use abir_ir::{
    DeclId, DeclKind, Environment, MemberFnInfo, Name, Parameter, TypeId, TypeTag,
};
use bitflags::bitflags;

bitflags! {
    /// What kind of difference a comparison observed.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct ChangeKind: u8 {
        /// The difference is in the top-level attributes of the
        /// compared node (name, size, cv-mask, binding, parameter
        /// count, ...).
        const LOCAL_CHANGE = 1 << 0;
        /// The difference is inside a sub-type edge (return type,
        /// pointee, element type, base class, member type, ...).
        const SUBTYPE_CHANGE = 1 << 1;
    }
}

/// Internal alias for the optional change-kind sink.
type Sink<'a, 'k> = &'a mut Option<&'k mut ChangeKind>;

fn note_local(k: Sink<'_, '_>) {
    if let Some(k) = k.as_deref_mut() {
        *k |= ChangeKind::LOCAL_CHANGE;
    }
}

fn note_subtype(k: Sink<'_, '_>) {
    if let Some(k) = k.as_deref_mut() {
        *k |= ChangeKind::SUBTYPE_CHANGE;
    }
}

/// Compare two types structurally.
///
/// Without a sink, the comparison takes the canonical fast path when
/// both operands carry canonical types: the answer is handle equality
/// of the canonicals and no structural work happens. With a sink, the
/// comparison always runs structurally and accumulates change bits.
pub fn equal(
    env: &mut Environment,
    l: TypeId,
    r: TypeId,
    k: Option<&mut ChangeKind>,
) -> bool {
    let mut k = k;
    equal_inner(env, l, r, &mut k)
}

fn equal_inner(env: &mut Environment, l: TypeId, r: TypeId, k: Sink<'_, '_>) -> bool {
    if l == r {
        return true;
    }

    if k.is_none() {
        if let (Some(cl), Some(cr)) = (env.canonical_type(l), env.canonical_type(r)) {
            return cl == cr;
        }
    }

    let (lt, rt) = (env.type_tag(l), env.type_tag(r));
    if lt != rt {
        note_local(k);
        return false;
    }

    match lt {
        TypeTag::Scalar => scalar_equal(env, l, r, k),
        TypeTag::Qualified => qualified_equal(env, l, r, k),
        TypeTag::Pointer => pointer_equal(env, l, r, k),
        TypeTag::Reference => reference_equal(env, l, r, k),
        TypeTag::Array => array_equal(env, l, r, k),
        TypeTag::Enum => enum_equal(env, l, r, k),
        TypeTag::Typedef => typedef_equal(env, l, r, k),
        TypeTag::Function => function_equal(env, l, r, k, None),
        TypeTag::Method => method_equal(env, l, r, k),
        TypeTag::Class | TypeTag::Union => class_or_union_equal(env, l, r, k),
        TypeTag::TemplateParameter => template_parm_equal(env, l, r, k),
    }
}

/// Compare the size/alignment attributes of the type bases.
fn type_base_equal(env: &Environment, l: TypeId, r: TypeId) -> bool {
    env.type_node(l).size_in_bits() == env.type_node(r).size_in_bits()
        && env.type_node(l).alignment_in_bits() == env.type_node(r).alignment_in_bits()
}

/// Compare the declared names of two named types. Two anonymous decls
/// compare equal by name.
fn decl_names_equal(env: &Environment, l: DeclId, r: DeclId) -> bool {
    let ld = &env.decl(l).data;
    let rd = &env.decl(r).data;
    if ld.is_anonymous && rd.is_anonymous {
        return true;
    }
    ld.qualified_name == rd.qualified_name
}

fn scalar_equal(env: &mut Environment, l: TypeId, r: TypeId, k: Sink<'_, '_>) -> bool {
    let mut result = true;

    if !type_base_equal(env, l, r) {
        note_local(k);
        if k.is_none() {
            return false;
        }
        result = false;
    }

    let (li, ri) = match (&env.type_node(l).kind, &env.type_node(r).kind) {
        (TypeKind::Scalar(a), TypeKind::Scalar(b)) => (a.integral, b.integral),
        _ => (None, None),
    };
    let names_equal = match (li, ri) {
        // Integral descriptors equate all spellings of one type.
        (Some(a), Some(b)) => a == b,
        _ => {
            let (Some(ld), Some(rd)) = (env.type_decl(l), env.type_decl(r)) else {
                return false;
            };
            decl_names_equal(env, ld, rd)
        }
    };
    if !names_equal {
        note_local(k);
        result = false;
    }
    result
}

fn qualified_equal(env: &mut Environment, l: TypeId, r: TypeId, k: Sink<'_, '_>) -> bool {
    let mut result = true;

    if env.qualified_mask(l) != env.qualified_mask(r) {
        note_local(k);
        if k.is_none() {
            return false;
        }
        result = false;
    }

    let (lu, ru) = (env.qualified_underlying(l), env.qualified_underlying(r));
    if !equal_inner(env, lu, ru, k) {
        note_subtype(k);
        result = false;
    }
    result
}

fn pointer_equal(env: &mut Environment, l: TypeId, r: TypeId, k: Sink<'_, '_>) -> bool {
    let mut result = true;

    if !type_base_equal(env, l, r) {
        note_local(k);
        if k.is_none() {
            return false;
        }
        result = false;
    }

    let (lp, rp) = (env.pointer_pointee(l), env.pointer_pointee(r));
    if !equal_inner(env, lp, rp, k) {
        note_subtype(k);
        result = false;
    }
    result
}

fn reference_equal(env: &mut Environment, l: TypeId, r: TypeId, k: Sink<'_, '_>) -> bool {
    let mut result = true;

    if env.reference_is_lvalue(l) != env.reference_is_lvalue(r) || !type_base_equal(env, l, r) {
        note_local(k);
        if k.is_none() {
            return false;
        }
        result = false;
    }

    let (lp, rp) = (env.reference_pointee(l), env.reference_pointee(r));
    if !equal_inner(env, lp, rp, k) {
        note_subtype(k);
        result = false;
    }
    result
}

fn array_equal(env: &mut Environment, l: TypeId, r: TypeId, k: Sink<'_, '_>) -> bool {
    let mut result = true;

    let (lc, rc) = (env.array_subrange_count(l), env.array_subrange_count(r));
    if lc != rc {
        note_local(k);
        if k.is_none() {
            return false;
        }
        result = false;
    }

    for i in 0..lc.min(rc) {
        let (ls, rs) = (env.array_subrange(l, i), env.array_subrange(r, i));
        // Infinite dimensions match each other; finite ones compare by
        // length.
        let dims_equal = match (ls.is_infinite(), rs.is_infinite()) {
            (true, true) => true,
            (false, false) => ls.length() == rs.length(),
            _ => false,
        };
        if !dims_equal {
            note_local(k);
            if k.is_none() {
                return false;
            }
            result = false;
        }
    }

    let (le, re) = (env.array_element(l), env.array_element(r));
    if !equal_inner(env, le, re, k) {
        note_subtype(k);
        result = false;
    }
    result
}

fn enum_equal(env: &mut Environment, l: TypeId, r: TypeId, k: Sink<'_, '_>) -> bool {
    let mut result = true;

    let (Some(ld), Some(rd)) = (env.type_decl(l), env.type_decl(r)) else {
        return false;
    };
    if !decl_names_equal(env, ld, rd) || !type_base_equal(env, l, r) {
        note_local(k);
        if k.is_none() {
            return false;
        }
        result = false;
    }

    let (lu, ru) = (env.enum_underlying(l), env.enum_underlying(r));
    if !equal_inner(env, lu, ru, k) {
        note_subtype(k);
        if k.is_none() {
            return false;
        }
        result = false;
    }

    // Enumerators compare positionally.
    let (lc, rc) = (env.enum_enumerator_count(l), env.enum_enumerator_count(r));
    if lc != rc {
        note_local(k);
        return false;
    }
    for i in 0..lc {
        let (le, re) = (env.enum_enumerator(l, i), env.enum_enumerator(r, i));
        if le.name != re.name || le.value != re.value {
            note_local(k);
            if k.is_none() {
                return false;
            }
            result = false;
        }
    }
    result
}

fn typedef_equal(env: &mut Environment, l: TypeId, r: TypeId, k: Sink<'_, '_>) -> bool {
    let mut result = true;

    let (Some(ld), Some(rd)) = (env.type_decl(l), env.type_decl(r)) else {
        return false;
    };
    if !decl_names_equal(env, ld, rd) {
        note_local(k);
        if k.is_none() {
            return false;
        }
        result = false;
    }

    let (lu, ru) = (env.typedef_underlying(l), env.typedef_underlying(r));
    if !equal_inner(env, lu, ru, k) {
        note_subtype(k);
        result = false;
    }
    result
}

fn template_parm_equal(env: &mut Environment, l: TypeId, r: TypeId, k: Sink<'_, '_>) -> bool {
    use abir_ir::TemplateParmKind;

    let (lp, rp) = (env.template_parm(l), env.template_parm(r));
    let mut result = true;

    if lp.index != rp.index {
        note_local(k);
        if k.is_none() {
            return false;
        }
        result = false;
    }

    match (lp.kind, rp.kind) {
        (TemplateParmKind::Type, TemplateParmKind::Type)
        | (TemplateParmKind::TemplateTemplate, TemplateParmKind::TemplateTemplate) => {}
        (TemplateParmKind::NonType(lt), TemplateParmKind::NonType(rt))
        | (TemplateParmKind::Composition(lt), TemplateParmKind::Composition(rt)) => {
            if !equal_inner(env, lt, rt, k) {
                note_subtype(k);
                result = false;
            }
        }
        _ => {
            note_local(k);
            result = false;
        }
    }
    result
}

/// Index of the first non-artificial parameter: the implicit `this`
/// never takes part in signature comparison.
fn first_real_parm(env: &Environment, t: TypeId) -> usize {
    usize::from(env.fn_parm_count(t) > 0 && env.fn_parm(t, 0).is_artificial)
}

fn function_equal(
    env: &mut Environment,
    l: TypeId,
    r: TypeId,
    k: Sink<'_, '_>,
    owning: Option<(TypeId, TypeId)>,
) -> bool {
    if env.fn_types_being_compared(l, r) {
        // Cycle: assume equal pending the outer resolution, and record
        // which types now hang off the recursive one.
        env.mark_dependant_types_compared_until(r);
        return true;
    }
    if k.is_none() {
        if let Some(cached) = env.cached_comparison_result(l, r) {
            return cached;
        }
    }

    env.mark_fn_types_being_compared(l, r);
    env.push_comparison_operands(l, r);
    env.note_structural_comparison();
    let value = fn_structural(env, l, r, k, owning);
    env.pop_comparison_operands(l, r);
    let value = if k.is_none() {
        env.return_comparison_result(l, r, value)
    } else {
        value
    };
    env.unmark_fn_types_being_compared(l, r);
    if k.is_none() {
        env.cache_comparison_result(l, r, value);
    }
    value
}

fn method_equal(env: &mut Environment, l: TypeId, r: TypeId, k: Sink<'_, '_>) -> bool {
    let (lc, rc) = (env.method_class(l), env.method_class(r));
    let (Some(lcd), Some(rcd)) = (env.type_decl(lc), env.type_decl(rc)) else {
        return false;
    };
    // The owning classes are compared by name only; recursing into the
    // containing class here is the class<->method cycle.
    let mut owners_equal = true;
    if !decl_names_equal(env, lcd, rcd) {
        note_local(k);
        if k.is_none() {
            return false;
        }
        owners_equal = false;
    }
    function_equal(env, l, r, k, Some((lc, rc))) && owners_equal
}

fn fn_structural(
    env: &mut Environment,
    l: TypeId,
    r: TypeId,
    k: Sink<'_, '_>,
    owning: Option<(TypeId, TypeId)>,
) -> bool {
    let mut result = true;

    let (lr, rr) = (env.fn_return_type(l), env.fn_return_type(r));
    if !equal_inner(env, lr, rr, k) {
        note_subtype(k);
        if k.is_none() {
            return false;
        }
        result = false;
    }

    let (ls, rs) = (first_real_parm(env, l), first_real_parm(env, r));
    let (lc, rc) = (env.fn_parm_count(l), env.fn_parm_count(r));
    let (ln, rn) = (lc - ls, rc - rs);
    if ln != rn {
        note_local(k);
        if k.is_none() {
            return false;
        }
        result = false;
    }

    for i in 0..ln.min(rn) {
        let lp: Parameter = env.fn_parm(l, ls + i);
        let rp: Parameter = env.fn_parm(r, rs + i);

        if lp.is_variadic != rp.is_variadic {
            note_local(k);
            if k.is_none() {
                return false;
            }
            result = false;
            continue;
        }

        // A method parameter whose type leads back to the owning class
        // is not recursed into; the owners are already being compared.
        if let Some((l_owner, r_owner)) = owning {
            let (lpe, rpe) = (peel_composition(env, lp.ty), peel_composition(env, rp.ty));
            if lpe == l_owner && rpe == r_owner {
                continue;
            }
        }

        if !equal_inner(env, lp.ty, rp.ty, k) {
            note_subtype(k);
            if k.is_none() {
                return false;
            }
            result = false;
        }
    }
    result
}

fn class_or_union_equal(env: &mut Environment, l: TypeId, r: TypeId, k: Sink<'_, '_>) -> bool {
    // A declaration-only side with a known definition is compared
    // through that definition.
    let l = env.decl_only_definition(l).unwrap_or(l);
    let r = env.decl_only_definition(r).unwrap_or(r);
    if l == r {
        return true;
    }

    let (l_decl_only, r_decl_only) = (env.is_declaration_only(l), env.is_declaration_only(r));
    if l_decl_only || r_decl_only {
        let (Some(ld), Some(rd)) = (env.type_decl(l), env.type_decl(r)) else {
            return false;
        };
        if l_decl_only && r_decl_only {
            // Neither side has members to compare: equal iff the
            // qualified names match, recording no change.
            return decl_names_equal(env, ld, rd);
        }
        // One declaration-only side against a definition.
        if env.config().decl_only_class_equals_definition && decl_names_equal(env, ld, rd) {
            return true;
        }
        note_local(k);
        return false;
    }

    if env.classes_being_compared(l, r) {
        env.mark_dependant_types_compared_until(r);
        return true;
    }
    if k.is_none() {
        if let Some(cached) = env.cached_comparison_result(l, r) {
            return cached;
        }
    }

    env.mark_classes_being_compared(l, r);
    env.push_comparison_operands(l, r);
    env.note_structural_comparison();
    let value = class_structural(env, l, r, k);
    env.pop_comparison_operands(l, r);
    let value = if k.is_none() {
        env.return_comparison_result(l, r, value)
    } else {
        value
    };
    env.unmark_classes_being_compared(l, r);
    if k.is_none() {
        env.cache_comparison_result(l, r, value);
    }
    value
}

fn class_structural(env: &mut Environment, l: TypeId, r: TypeId, k: Sink<'_, '_>) -> bool {
    let mut result = true;

    let (Some(ld), Some(rd)) = (env.type_decl(l), env.type_decl(r)) else {
        return false;
    };
    if !decl_names_equal(env, ld, rd) {
        note_local(k);
        if k.is_none() {
            return false;
        }
        result = false;
    }

    if !type_base_equal(env, l, r) {
        note_local(k);
        if k.is_none() {
            return false;
        }
        result = false;
    }

    // Bases (unions have none).
    let (lb, rb) = (env.class_base_count(l), env.class_base_count(r));
    if lb != rb {
        note_local(k);
        if k.is_none() {
            return false;
        }
        result = false;
    }
    for i in 0..lb.min(rb) {
        let (lbase, rbase) = (env.class_base(l, i), env.class_base(r, i));
        if lbase.offset_in_bits != rbase.offset_in_bits
            || lbase.is_virtual != rbase.is_virtual
            || lbase.access != rbase.access
        {
            note_local(k);
            if k.is_none() {
                return false;
            }
            result = false;
        }
        if !equal_inner(env, lbase.base, rbase.base, k) {
            note_subtype(k);
            if k.is_none() {
                return false;
            }
            result = false;
        }
    }

    // Data members: name, layout and access are all significant.
    let (lm, rm) = (env.class_data_member_count(l), env.class_data_member_count(r));
    if lm != rm {
        note_local(k);
        if k.is_none() {
            return false;
        }
        result = false;
    }
    for i in 0..lm.min(rm) {
        let (lmem, rmem) = (env.class_data_member(l, i), env.class_data_member(r, i));
        if !data_member_equal(env, lmem, rmem, k) {
            if k.is_none() {
                return false;
            }
            result = false;
        }
    }

    // Virtual member functions: vtable layout and signatures. The
    // access specifier is ignored here (producers emit inconsistent
    // access for member functions).
    let (lv, rv) = (
        env.class_virtual_member_fn_count(l),
        env.class_virtual_member_fn_count(r),
    );
    if lv != rv {
        note_local(k);
        if k.is_none() {
            return false;
        }
        result = false;
    }
    for i in 0..lv.min(rv) {
        let (lfn, rfn) = (
            env.class_virtual_member_fn(l, i),
            env.class_virtual_member_fn(r, i),
        );
        if !virtual_member_fn_equal(env, lfn, rfn, k) {
            if k.is_none() {
                return false;
            }
            result = false;
        }
    }

    result
}

fn var_bits(env: &Environment, d: DeclId) -> Option<(TypeId, Option<abir_ir::DataMemberInfo>)> {
    match &env.decl(d).kind {
        DeclKind::Var(v) => Some((v.ty, v.member)),
        _ => None,
    }
}

fn data_member_equal(env: &mut Environment, l: DeclId, r: DeclId, k: Sink<'_, '_>) -> bool {
    let mut result = true;

    let (l_name, l_ctx) = {
        let data = &env.decl(l).data;
        (data.name, data.context)
    };
    let (r_name, r_ctx) = {
        let data = &env.decl(r).data;
        (data.name, data.context)
    };

    // Access is significant for data members.
    if l_name != r_name || l_ctx.access != r_ctx.access || l_ctx.is_static != r_ctx.is_static {
        note_local(k);
        if k.is_none() {
            return false;
        }
        result = false;
    }

    let (Some((lt, lmem)), Some((rt, rmem))) = (var_bits(env, l), var_bits(env, r)) else {
        return false;
    };
    if lmem != rmem {
        note_local(k);
        if k.is_none() {
            return false;
        }
        result = false;
    }

    if !equal_inner(env, lt, rt, k) {
        note_subtype(k);
        result = false;
    }
    result
}

fn fn_bits(env: &Environment, d: DeclId) -> Option<(TypeId, Option<MemberFnInfo>, Name)> {
    match &env.decl(d).kind {
        DeclKind::Func(f) => Some((f.ty, f.member, env.decl(d).data.name)),
        _ => None,
    }
}

fn virtual_member_fn_equal(env: &mut Environment, l: DeclId, r: DeclId, k: Sink<'_, '_>) -> bool {
    let mut result = true;

    let (Some((lt, lmem, l_name)), Some((rt, rmem, r_name))) = (fn_bits(env, l), fn_bits(env, r))
    else {
        return false;
    };

    let (lmem, rmem) = (lmem.unwrap_or_default(), rmem.unwrap_or_default());
    if l_name != r_name
        || lmem.vtable_offset != rmem.vtable_offset
        || lmem.is_ctor != rmem.is_ctor
        || lmem.is_dtor != rmem.is_dtor
        || lmem.is_const != rmem.is_const
    {
        note_local(k);
        if k.is_none() {
            return false;
        }
        result = false;
    }

    if !equal_inner(env, lt, rt, k) {
        note_subtype(k);
        result = false;
    }
    result
}

/// Whether two function decls alias: their symbols belong to one alias
/// ring (or compare textually equal).
pub fn functions_alias(env: &Environment, l: DeclId, r: DeclId) -> bool {
    let (DeclKind::Func(lf), DeclKind::Func(rf)) = (&env.decl(l).kind, &env.decl(r).kind) else {
        return false;
    };
    match (lf.symbol, rf.symbol) {
        (Some(ls), Some(rs)) => env.symtab().equals(ls, rs),
        _ => false,
    }
}

/// Compare two variable or function declarations, accumulating change
/// bits like [`equal`] does for types.
pub fn equal_decl(
    env: &mut Environment,
    l: DeclId,
    r: DeclId,
    k: Option<&mut ChangeKind>,
) -> bool {
    let mut k = k;
    if l == r {
        return true;
    }

    match (&env.decl(l).kind, &env.decl(r).kind) {
        (DeclKind::Var(lv), DeclKind::Var(rv)) => {
            let (lt, rt) = (lv.ty, rv.ty);
            let (ls, rs) = (lv.symbol, rv.symbol);
            let (lb, rb) = (lv.binding, rv.binding);
            let mut result = true;

            let names_equal =
                env.decl(l).data.qualified_name == env.decl(r).data.qualified_name;
            let symbols_equal = match (ls, rs) {
                (Some(a), Some(b)) => env.symtab().equals(a, b),
                (None, None) => true,
                _ => false,
            };
            if !names_equal || !symbols_equal || lb != rb {
                note_local(&mut k);
                if k.is_none() {
                    return false;
                }
                result = false;
            }
            if !equal_inner(env, lt, rt, &mut k) {
                note_subtype(&mut k);
                result = false;
            }
            result
        }
        (DeclKind::Func(lf), DeclKind::Func(rf)) => {
            let (lt, rt) = (lf.ty, rf.ty);
            let mut result = true;

            let names_equal =
                env.decl(l).data.qualified_name == env.decl(r).data.qualified_name;
            if !names_equal && !functions_alias(env, l, r) {
                note_local(&mut k);
                if k.is_none() {
                    return false;
                }
                result = false;
            }
            if !equal_inner(env, lt, rt, &mut k) {
                note_subtype(&mut k);
                result = false;
            }
            result
        }
        _ => {
            note_local(&mut k);
            false
        }
    }
}
