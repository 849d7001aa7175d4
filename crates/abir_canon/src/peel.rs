//! Type peeling helpers for the diff engine's query API.
//!
//! Every peeler is idempotent: applying it twice is the same as
//! applying it once.

use abir_ir::{Environment, TypeId, TypeTag};

/// Follow top-level typedef links until a non-typedef is reached.
pub fn strip_typedef(env: &Environment, t: TypeId) -> TypeId {
    let mut current = t;
    while env.type_tag(current) == TypeTag::Typedef {
        current = env.typedef_underlying(current);
    }
    current
}

/// Peel top-level qualified layers.
pub fn peel_qualified_type(env: &Environment, t: TypeId) -> TypeId {
    let mut current = t;
    while env.type_tag(current) == TypeTag::Qualified {
        current = env.qualified_underlying(current);
    }
    current
}

/// Peel top-level pointer layers.
pub fn peel_pointer_type(env: &Environment, t: TypeId) -> TypeId {
    let mut current = t;
    while env.type_tag(current) == TypeTag::Pointer {
        current = env.pointer_pointee(current);
    }
    current
}

/// Peel top-level reference layers.
pub fn peel_reference_type(env: &Environment, t: TypeId) -> TypeId {
    let mut current = t;
    while env.type_tag(current) == TypeTag::Reference {
        current = env.reference_pointee(current);
    }
    current
}

/// Peel top-level array layers, down to the element type.
pub fn peel_array_type(env: &Environment, t: TypeId) -> TypeId {
    let mut current = t;
    while env.type_tag(current) == TypeTag::Array {
        current = env.array_element(current);
    }
    current
}

/// Peel typedefs, qualifiers, pointers, references and arrays, in any
/// interleaving, down to the core type.
pub fn peel_composition(env: &Environment, t: TypeId) -> TypeId {
    let mut current = t;
    loop {
        current = match env.type_tag(current) {
            TypeTag::Typedef => env.typedef_underlying(current),
            TypeTag::Qualified => env.qualified_underlying(current),
            TypeTag::Pointer => env.pointer_pointee(current),
            TypeTag::Reference => env.reference_pointee(current),
            TypeTag::Array => env.array_element(current),
            _ => return current,
        };
    }
}

/// The given type, or the environment's void sentinel when absent.
pub fn type_or_void(env: &mut Environment, t: Option<TypeId>) -> TypeId {
    match t {
        Some(t) => t,
        None => env.get_void_type(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abir_ir::{Location, Qualifiers, Subrange};

    #[test]
    fn peelers_are_idempotent() {
        let mut env = Environment::new();
        let int = env.new_scalar_type("int", 32, 32);
        let alias = env.new_typedef("a", int, Location::NONE);
        let alias2 = env.new_typedef("b", alias, Location::NONE);
        let q = env.new_qualified_type(alias2, Qualifiers::CONST);
        let ptr = env.new_pointer_type(q, 64, 64);
        let arr = env.new_array_type(ptr, vec![Subrange::with_length(3)]);

        assert_eq!(strip_typedef(&env, alias2), int);
        assert_eq!(strip_typedef(&env, strip_typedef(&env, alias2)), int);

        assert_eq!(peel_qualified_type(&env, q), alias2);
        assert_eq!(peel_qualified_type(&env, peel_qualified_type(&env, q)), alias2);

        assert_eq!(peel_pointer_type(&env, ptr), q);
        assert_eq!(peel_array_type(&env, arr), ptr);
        assert_eq!(peel_array_type(&env, peel_array_type(&env, arr)), ptr);

        // The combined peel goes all the way down.
        assert_eq!(peel_composition(&env, arr), int);
        assert_eq!(peel_composition(&env, peel_composition(&env, arr)), int);
    }

    #[test]
    fn type_or_void_falls_back_to_the_sentinel() {
        let mut env = Environment::new();
        let int = env.new_scalar_type("int", 32, 32);
        assert_eq!(type_or_void(&mut env, Some(int)), int);
        let v = type_or_void(&mut env, None);
        assert!(env.is_void_type(v));
    }
}
