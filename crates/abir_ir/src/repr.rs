//! Pretty representations of types and decls.
//!
//! The *internal* form is used exclusively as the canonicalization
//! registry key. It differs from the external form in exactly two
//! ways: a class's `struct`/`class` keyword is normalized to `class`,
//! and a qualified type with an empty cv-mask carries the literal
//! `none` prefix so "plain underlying" and "qualified with no
//! qualifiers" never collide.
//!
//! Representations are cached on the type node. The caches are
//! invalidated when a decl is reparented (which only happens before
//! canonicalization); after canonicalization they are authoritative.

use crate::types::TypeTag;
use crate::{DeclId, DeclKind, Environment, Name, TypeId};

/// Anonymous-type markers, as used in representations.
const ANONYMOUS_STRUCT: &str = "__anonymous_struct__";
const ANONYMOUS_UNION: &str = "__anonymous_union__";
const ANONYMOUS_ENUM: &str = "__anonymous_enum__";

/// The cached pretty representation of a type, interned.
pub fn type_repr_id(env: &mut Environment, t: TypeId, internal: bool) -> Name {
    let cached = if internal {
        env.type_node(t).cached_internal_repr
    } else {
        env.type_node(t).cached_repr
    };
    if let Some(name) = cached {
        return name;
    }

    let repr = build_type_repr(env, t, internal);
    let name = env.intern(&repr);
    let node = env.type_node_mut(t);
    if internal {
        node.cached_internal_repr = Some(name);
    } else {
        node.cached_repr = Some(name);
    }
    name
}

/// The pretty representation of a type, as a string.
pub fn type_pretty_representation(env: &mut Environment, t: TypeId, internal: bool) -> String {
    let name = type_repr_id(env, t, internal);
    env.str(name).to_owned()
}

/// The name of a type: the (possibly qualified) declared name for
/// named kinds, the pretty representation otherwise.
pub fn get_type_name(env: &mut Environment, t: TypeId, qualified: bool, internal: bool) -> String {
    match env.type_decl(t) {
        Some(d) => {
            let data = &env.decl(d).data;
            if data.is_anonymous {
                return anonymous_marker(env, t).to_owned();
            }
            let name = if qualified {
                data.qualified_name
            } else {
                data.name
            };
            env.str(name).to_owned()
        }
        None => type_pretty_representation(env, t, internal),
    }
}

fn anonymous_marker(env: &Environment, t: TypeId) -> &'static str {
    match env.type_tag(t) {
        TypeTag::Union => ANONYMOUS_UNION,
        TypeTag::Enum => ANONYMOUS_ENUM,
        _ => ANONYMOUS_STRUCT,
    }
}

/// The declared, qualified name of a named type, with the anonymous
/// marker fallback.
fn named_type_name(env: &Environment, t: TypeId) -> String {
    match env.type_decl(t) {
        Some(d) => {
            let data = &env.decl(d).data;
            if data.is_anonymous {
                anonymous_marker(env, t).to_owned()
            } else {
                env.str(data.qualified_name).to_owned()
            }
        }
        None => anonymous_marker(env, t).to_owned(),
    }
}

fn build_type_repr(env: &mut Environment, t: TypeId, internal: bool) -> String {
    match env.type_tag(t) {
        TypeTag::Scalar | TypeTag::TemplateParameter => named_type_name(env, t),
        TypeTag::Qualified => {
            let underlying = env.qualified_underlying(t);
            let sub = type_pretty_representation(env, underlying, internal);
            let quals = env.qualified_mask(t).print(internal);
            if quals.is_empty() {
                sub
            } else {
                format!("{quals} {sub}")
            }
        }
        TypeTag::Pointer => {
            let pointee = env.pointer_pointee(t);
            format!("{}*", type_pretty_representation(env, pointee, internal))
        }
        TypeTag::Reference => {
            let pointee = env.reference_pointee(t);
            let marker = if env.reference_is_lvalue(t) { "&" } else { "&&" };
            format!(
                "{}{marker}",
                type_pretty_representation(env, pointee, internal)
            )
        }
        TypeTag::Array => {
            let element = env.array_element(t);
            let mut out = type_pretty_representation(env, element, internal);
            for i in 0..env.array_subrange_count(t) {
                let s = env.array_subrange(t, i);
                if s.is_infinite() {
                    out.push_str("[]");
                } else {
                    out.push_str(&format!("[{}]", s.length()));
                }
            }
            out
        }
        TypeTag::Enum => format!("enum {}", named_type_name(env, t)),
        TypeTag::Typedef => format!("typedef {}", named_type_name(env, t)),
        TypeTag::Function => {
            let ret = env.fn_return_type(t);
            let ret_repr = type_pretty_representation(env, ret, internal);
            format!("{ret_repr} ({})", parm_list_repr(env, t, internal))
        }
        TypeTag::Method => {
            let ret = env.fn_return_type(t);
            let ret_repr = type_pretty_representation(env, ret, internal);
            let class = named_type_name(env, env.method_class(t));
            format!("{ret_repr} ({class}::*)({})", parm_list_repr(env, t, internal))
        }
        TypeTag::Class => {
            let keyword = if internal || !env.class_is_struct(t) {
                "class"
            } else {
                "struct"
            };
            format!("{keyword} {}", named_type_name(env, t))
        }
        TypeTag::Union => format!("union {}", named_type_name(env, t)),
    }
}

fn parm_list_repr(env: &mut Environment, t: TypeId, internal: bool) -> String {
    let mut parts = Vec::new();
    for i in 0..env.fn_parm_count(t) {
        let p = env.fn_parm(t, i);
        if p.is_artificial {
            continue;
        }
        if p.is_variadic {
            parts.push("...".to_owned());
        } else {
            parts.push(type_pretty_representation(env, p.ty, internal));
        }
    }
    parts.join(", ")
}

/// The pretty representation of a decl.
pub fn decl_pretty_representation(env: &mut Environment, d: DeclId, internal: bool) -> String {
    let qualified_name = env.decl(d).data.qualified_name;
    match &env.decl(d).kind {
        DeclKind::Var(v) => {
            let ty = v.ty;
            format!(
                "{} {}",
                type_pretty_representation(env, ty, internal),
                env.str(qualified_name)
            )
        }
        DeclKind::Func(f) => {
            let ty = f.ty;
            let ret = env.fn_return_type(ty);
            let ret_repr = type_pretty_representation(env, ret, internal);
            let parms = parm_list_repr(env, ty, internal);
            format!("{ret_repr} {}({parms})", env.str(qualified_name))
        }
        DeclKind::Namespace(_) => format!("namespace {}", env.str(qualified_name)),
        DeclKind::Type(t) => {
            let t = *t;
            type_pretty_representation(env, t, internal)
        }
        DeclKind::FunctionTemplate(_) | DeclKind::ClassTemplate(_) => {
            format!("template {}", env.str(qualified_name))
        }
    }
}

/// The id string of a variable or function decl: its symbol's id
/// string when a symbol is attached, else the linkage name when
/// non-empty, else the pretty representation.
pub fn decl_id_string(env: &mut Environment, d: DeclId) -> String {
    if let Some(symbol) = env.decl(d).kind.symbol() {
        return env.symtab().id_string(symbol, env.interner());
    }
    let linkage = env.decl(d).data.linkage_name;
    if !linkage.is_empty() {
        return env.str(linkage).to_owned();
    }
    decl_pretty_representation(env, d, false)
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "Tests use expect for clarity")]
mod tests {
    use super::*;
    use crate::scope::add_decl_to_scope;
    use crate::types::{Parameter, Qualifiers, Subrange};
    use crate::{DeclBinding, Location, SourceLanguage};
    use pretty_assertions::assert_eq;

    #[test]
    fn qualifier_tokens_print_in_fixed_order() {
        let mut env = Environment::new();
        let int = env.new_scalar_type("int", 32, 32);
        let q = env.new_qualified_type(
            int,
            Qualifiers::VOLATILE | Qualifiers::CONST | Qualifiers::RESTRICT,
        );
        assert_eq!(
            type_pretty_representation(&mut env, q, false),
            "restrict const volatile int"
        );
    }

    #[test]
    fn empty_mask_gets_the_none_prefix_internally_only() {
        let mut env = Environment::new();
        let int = env.new_scalar_type("int", 32, 32);
        let q = env.new_qualified_type(int, Qualifiers::empty());

        assert_eq!(type_pretty_representation(&mut env, q, false), "int");
        assert_eq!(type_pretty_representation(&mut env, q, true), "none int");
        // So the internal forms of `int` and of the empty-mask
        // qualified `int` never collide.
        assert_ne!(
            type_pretty_representation(&mut env, q, true),
            type_pretty_representation(&mut env, int, true)
        );
    }

    #[test]
    fn struct_keyword_normalizes_to_class_internally() {
        let mut env = Environment::new();
        let s = env.new_class_type("S", 32, 32, true, false, Location::NONE);
        assert_eq!(type_pretty_representation(&mut env, s, false), "struct S");
        assert_eq!(type_pretty_representation(&mut env, s, true), "class S");
    }

    #[test]
    fn compound_representations() {
        let mut env = Environment::new();
        let tu = env.new_translation_unit("t.c", 64, SourceLanguage::C);
        let int = env.new_scalar_type("int", 32, 32);
        let void = env.get_void_type();

        let ptr = env.new_pointer_type(int, 64, 64);
        assert_eq!(type_pretty_representation(&mut env, ptr, false), "int*");

        let lref = env.new_reference_type(int, true, 64, 64);
        assert_eq!(type_pretty_representation(&mut env, lref, false), "int&");
        let rref = env.new_reference_type(int, false, 64, 64);
        assert_eq!(type_pretty_representation(&mut env, rref, false), "int&&");

        let arr = env.new_array_type(int, vec![Subrange::with_length(4), Subrange::infinite()]);
        assert_eq!(type_pretty_representation(&mut env, arr, false), "int[4][]");

        let variadic = env.get_variadic_parameter_type();
        let f = env.new_function_type(
            tu,
            void,
            vec![
                Parameter::new(int, Name::EMPTY),
                Parameter::new(variadic, Name::EMPTY).variadic(),
            ],
        );
        assert_eq!(
            type_pretty_representation(&mut env, f, false),
            "void (int, ...)"
        );
    }

    #[test]
    fn method_representation_names_the_class() {
        let mut env = Environment::new();
        let tu = env.new_translation_unit("t.cc", 64, SourceLanguage::CPlusPlus);
        let int = env.new_scalar_type("int", 32, 32);
        let class = env.new_class_type("C", 32, 32, false, false, Location::NONE);
        let this_ptr = env.new_pointer_type(class, 64, 64);

        let m = env.new_method_type(
            tu,
            class,
            int,
            vec![
                Parameter::new(this_ptr, Name::EMPTY).artificial(),
                Parameter::new(int, Name::EMPTY),
            ],
        );
        // The implicit `this` does not show up in the parameter list.
        assert_eq!(
            type_pretty_representation(&mut env, m, false),
            "int (C::*)(int)"
        );
    }

    #[test]
    fn qualified_names_flow_into_representations() {
        let mut env = Environment::new();
        let tu = env.new_translation_unit("t.cc", 64, SourceLanguage::CPlusPlus);
        let global = env.tu(tu).global_scope();

        let ns = env.new_namespace("ns", Location::NONE);
        add_decl_to_scope(&mut env, ns, global).expect("attach succeeds");
        let ns_scope = match &env.decl(ns).kind {
            DeclKind::Namespace(n) => n.scope,
            _ => unreachable!("namespace decl"),
        };
        let class = env.new_class_type("C", 32, 32, false, false, Location::NONE);
        let class_decl = env.type_decl(class).expect("class has a decl");
        add_decl_to_scope(&mut env, class_decl, ns_scope).expect("attach succeeds");

        assert_eq!(type_pretty_representation(&mut env, class, true), "class ns::C");
        assert_eq!(get_type_name(&mut env, class, true, false), "ns::C");
        assert_eq!(get_type_name(&mut env, class, false, false), "C");
    }

    #[test]
    fn anonymous_types_use_stable_markers() {
        let mut env = Environment::new();
        let anon_class = env.new_class_type("", 32, 32, true, false, Location::NONE);
        let anon_union = env.new_union_type("", 32, 32, false, Location::NONE);
        assert_eq!(
            type_pretty_representation(&mut env, anon_class, true),
            "class __anonymous_struct__"
        );
        assert_eq!(
            type_pretty_representation(&mut env, anon_union, false),
            "union __anonymous_union__"
        );
    }

    #[test]
    fn var_id_string_prefers_symbol_then_linkage_name() {
        let mut env = Environment::new();
        let int = env.new_scalar_type("int", 32, 32);
        let v = env.new_var_decl("x", int, DeclBinding::Global, Location::NONE);
        assert_eq!(decl_id_string(&mut env, v), "int x");

        env.set_decl_linkage_name(v, "mangled_x");
        assert_eq!(decl_id_string(&mut env, v), "mangled_x");

        let name = env.intern("x");
        let version = crate::SymbolVersion::new(env.intern("V1"), true);
        let sym = env.symtab_mut().create(
            0,
            4,
            name,
            crate::SymbolType::Object,
            crate::SymbolBinding::Global,
            true,
            version,
        );
        env.set_decl_symbol(v, sym);
        assert_eq!(decl_id_string(&mut env, v), "x@@V1");
    }
}
