//! ELF symbol model.
//!
//! Decls of a corpus read from a binary may be associated with the
//! linker symbols that export them. Symbols carry type, binding,
//! version and defined-ness, and may alias each other: aliases form a
//! closed ring through `next_alias` links, every member pointing back
//! at the main symbol.

use crate::{Name, StringInterner, SymbolId};
use std::fmt;
use std::str::FromStr;

/// The type of an ELF symbol.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum SymbolType {
    /// No type (STT_NOTYPE).
    NoType,
    /// Data object (STT_OBJECT).
    Object,
    /// Function (STT_FUNC).
    Func,
    /// Section (STT_SECTION).
    Section,
    /// Source file (STT_FILE).
    File,
    /// Common block (STT_COMMON).
    Common,
    /// Thread-local storage (STT_TLS).
    Tls,
    /// Indirect function (STT_GNU_IFUNC).
    GnuIfunc,
}

impl fmt::Display for SymbolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SymbolType::NoType => "no-type",
            SymbolType::Object => "object",
            SymbolType::Func => "func",
            SymbolType::Section => "section",
            SymbolType::File => "file",
            SymbolType::Common => "common",
            SymbolType::Tls => "tls",
            SymbolType::GnuIfunc => "gnu-ifunc",
        };
        f.write_str(s)
    }
}

impl FromStr for SymbolType {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no-type" => Ok(SymbolType::NoType),
            "object" => Ok(SymbolType::Object),
            "func" => Ok(SymbolType::Func),
            "section" => Ok(SymbolType::Section),
            "file" => Ok(SymbolType::File),
            "common" => Ok(SymbolType::Common),
            "tls" => Ok(SymbolType::Tls),
            "gnu-ifunc" => Ok(SymbolType::GnuIfunc),
            other => Err(SymbolError::UnknownType(other.to_owned())),
        }
    }
}

/// The binding of an ELF symbol.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum SymbolBinding {
    /// Local binding (STB_LOCAL).
    Local,
    /// Global binding (STB_GLOBAL).
    Global,
    /// Weak binding (STB_WEAK).
    Weak,
    /// GNU unique binding (STB_GNU_UNIQUE).
    GnuUnique,
}

impl fmt::Display for SymbolBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SymbolBinding::Local => "local",
            SymbolBinding::Global => "global",
            SymbolBinding::Weak => "weak",
            SymbolBinding::GnuUnique => "gnu-unique",
        };
        f.write_str(s)
    }
}

impl FromStr for SymbolBinding {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(SymbolBinding::Local),
            "global" => Ok(SymbolBinding::Global),
            "weak" => Ok(SymbolBinding::Weak),
            "gnu-unique" => Ok(SymbolBinding::GnuUnique),
            other => Err(SymbolError::UnknownBinding(other.to_owned())),
        }
    }
}

/// The version of an ELF symbol.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct SymbolVersion {
    /// Interned version string; empty means unversioned.
    pub name: Name,
    /// Whether this is the default version of the symbol.
    pub is_default: bool,
}

impl SymbolVersion {
    /// Create a version.
    pub fn new(name: Name, is_default: bool) -> Self {
        Self { name, is_default }
    }

    /// Check whether the version is empty (unversioned symbol).
    pub fn is_empty(self) -> bool {
        self.name.is_empty()
    }
}

/// Errors from the symbol model's fallible entry points.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolError {
    /// `add_alias` was invoked on a symbol that is not a main symbol.
    #[error("aliases can only be added to a main symbol")]
    NotMainSymbol,
    /// The alias passed to `add_alias` already has aliases of its own.
    #[error("alias already carries aliases of its own")]
    AliasHasAliases,
    /// Unknown symbol type string.
    #[error("unknown symbol type: `{0}`")]
    UnknownType(String),
    /// Unknown symbol binding string.
    #[error("unknown symbol binding: `{0}`")]
    UnknownBinding(String),
}

/// An ELF symbol.
#[derive(Clone, Debug)]
pub struct Symbol {
    /// Index of the symbol in the symbol table it was read from.
    pub index: u64,
    /// Size of the symbol, in bytes.
    pub size: u64,
    /// Interned symbol name.
    pub name: Name,
    /// Symbol type.
    pub kind: SymbolType,
    /// Symbol binding.
    pub binding: SymbolBinding,
    /// Symbol version.
    pub version: SymbolVersion,
    /// Whether the symbol is defined (not "undefined" in the symtab).
    pub is_defined: bool,
    /// Back-reference to the main symbol of the alias ring; a main
    /// symbol points at itself.
    main: SymbolId,
    /// Forward link of the alias ring; `None` for a symbol with no
    /// aliases, and the last alias links back to the main symbol.
    next_alias: Option<SymbolId>,
}

/// Arena of [`Symbol`]s, owned by the environment.
#[derive(Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a symbol. The new symbol is its own main symbol and has
    /// no aliases.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &mut self,
        index: u64,
        size: u64,
        name: Name,
        kind: SymbolType,
        binding: SymbolBinding,
        is_defined: bool,
        version: SymbolVersion,
    ) -> SymbolId {
        let id = SymbolId::from_raw(
            u32::try_from(self.symbols.len())
                .unwrap_or_else(|_| panic!("symbol table exceeded u32::MAX entries")),
        );
        self.symbols.push(Symbol {
            index,
            size,
            name,
            kind,
            binding,
            version,
            is_defined,
            main: id,
            next_alias: None,
        });
        id
    }

    /// Get a symbol by handle.
    ///
    /// # Panics
    /// Panics if the handle was not produced by this table.
    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.index()]
    }

    /// Number of symbols in the table.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Check whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// The main symbol of the alias ring `id` belongs to.
    pub fn main_symbol(&self, id: SymbolId) -> SymbolId {
        self.get(id).main
    }

    /// Check whether `id` is the main symbol of its ring.
    pub fn is_main_symbol(&self, id: SymbolId) -> bool {
        self.get(id).main == id
    }

    /// The next symbol in the alias ring, if any.
    pub fn next_alias(&self, id: SymbolId) -> Option<SymbolId> {
        self.get(id).next_alias
    }

    /// Check whether the ring of `id` has more than one member.
    pub fn has_aliases(&self, id: SymbolId) -> bool {
        self.get(self.main_symbol(id)).next_alias.is_some()
    }

    /// Number of aliases of the symbol (ring length minus one).
    pub fn number_of_aliases(&self, id: SymbolId) -> usize {
        let main = self.main_symbol(id);
        let mut count = 0;
        let mut cursor = self.get(main).next_alias;
        while let Some(s) = cursor {
            if s == main {
                break;
            }
            count += 1;
            cursor = self.get(s).next_alias;
        }
        count
    }

    /// Append `alias` at the end of the ring of `main`.
    ///
    /// `main` must be a main symbol and `alias` must be free of aliases
    /// of its own; both violations are contract errors.
    pub fn add_alias(&mut self, main: SymbolId, alias: SymbolId) -> Result<(), SymbolError> {
        if !self.is_main_symbol(main) {
            return Err(SymbolError::NotMainSymbol);
        }
        if self.get(alias).next_alias.is_some() || !self.is_main_symbol(alias) {
            return Err(SymbolError::AliasHasAliases);
        }

        // Find the last link of the ring (the one pointing back at the
        // main symbol, or the main symbol itself when the ring is 1).
        let mut last = main;
        while let Some(next) = self.get(last).next_alias {
            if next == main {
                break;
            }
            last = next;
        }

        self.get_mut(last).next_alias = Some(alias);
        self.get_mut(alias).next_alias = Some(main);
        self.get_mut(alias).main = main;
        Ok(())
    }

    /// Textual equality: name, type, defined-ness, publicness, version,
    /// and size for variable symbols.
    pub fn textually_equals(&self, a: SymbolId, b: SymbolId) -> bool {
        let sa = self.get(a);
        let sb = self.get(b);
        let mut equal = sa.name == sb.name
            && sa.kind == sb.kind
            && sa.is_defined == sb.is_defined
            && self.is_public(a) == self.is_public(b)
            && sa.version == sb.version;
        if equal && self.is_variable(a) {
            equal = sa.size == sb.size;
        }
        equal
    }

    /// Check whether `a` aliases `b`: walk `a`'s ring once, comparing
    /// each member textually with `b`.
    pub fn does_alias(&self, a: SymbolId, b: SymbolId) -> bool {
        let main = self.main_symbol(a);
        let mut cursor = main;
        loop {
            if cursor != a && self.textually_equals(cursor, b) {
                return true;
            }
            match self.get(cursor).next_alias {
                Some(next) if next != main => cursor = next,
                _ => return false,
            }
        }
    }

    /// Symbol equality: textual equality or aliasing.
    pub fn equals(&self, a: SymbolId, b: SymbolId) -> bool {
        self.textually_equals(a, b) || self.does_alias(a, b)
    }

    /// Find the ring member with the given name.
    pub fn alias_from_name(&self, id: SymbolId, name: Name) -> Option<SymbolId> {
        let main = self.main_symbol(id);
        let mut cursor = main;
        loop {
            if self.get(cursor).name == name {
                return Some(cursor);
            }
            match self.get(cursor).next_alias {
                Some(next) if next != main => cursor = next,
                _ => return None,
            }
        }
    }

    /// Find the ring member that textually equals `other`.
    pub fn alias_which_equals(&self, id: SymbolId, other: SymbolId) -> Option<SymbolId> {
        let main = self.main_symbol(id);
        let mut cursor = main;
        loop {
            if self.textually_equals(cursor, other) {
                return Some(cursor);
            }
            match self.get(cursor).next_alias {
                Some(next) if next != main => cursor = next,
                _ => return None,
            }
        }
    }

    /// Check whether the symbol is exported: defined, with global,
    /// weak or GNU-unique binding.
    pub fn is_public(&self, id: SymbolId) -> bool {
        let s = self.get(id);
        s.is_defined
            && matches!(
                s.binding,
                SymbolBinding::Global | SymbolBinding::Weak | SymbolBinding::GnuUnique
            )
    }

    /// Check whether the symbol designates a function.
    pub fn is_function(&self, id: SymbolId) -> bool {
        matches!(self.get(id).kind, SymbolType::Func | SymbolType::GnuIfunc)
    }

    /// Check whether the symbol designates a variable.
    pub fn is_variable(&self, id: SymbolId) -> bool {
        matches!(
            self.get(id).kind,
            SymbolType::Object | SymbolType::Common | SymbolType::Tls
        )
    }

    /// The identifier string of the symbol: `name`, `name@version` for
    /// a non-default version, `name@@version` for the default one.
    pub fn id_string(&self, id: SymbolId, interner: &StringInterner) -> String {
        let s = self.get(id);
        let name = interner.lookup(s.name);
        if s.version.is_empty() {
            return name.to_owned();
        }
        let sep = if s.version.is_default { "@@" } else { "@" };
        format!("{name}{sep}{}", interner.lookup(s.version.name))
    }

    /// Comma-separated id strings of the whole ring, starting at the
    /// main symbol.
    pub fn aliases_id_string(
        &self,
        id: SymbolId,
        include_symbol_itself: bool,
        interner: &StringInterner,
    ) -> String {
        let main = self.main_symbol(id);
        let mut out = String::new();
        let mut cursor = main;
        loop {
            if include_symbol_itself || cursor != id {
                if !out.is_empty() {
                    out.push_str(", ");
                }
                out.push_str(&self.id_string(cursor, interner));
            }
            match self.get(cursor).next_alias {
                Some(next) if next != main => cursor = next,
                _ => break,
            }
        }
        out
    }
}

/// Split a symbol id string back into `(name, version)`.
///
/// Inverse of [`SymbolTable::id_string`]: `"foo"` gives `("foo", "")`,
/// `"foo@v1"` and `"foo@@v1"` both give `("foo", "v1")`.
pub fn get_name_and_version_from_id(id: &str) -> (&str, &str) {
    if let Some(pos) = id.find("@@") {
        (&id[..pos], &id[pos + 2..])
    } else if let Some(pos) = id.find('@') {
        (&id[..pos], &id[pos + 1..])
    } else {
        (id, "")
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "Tests use expect for clarity")]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table_with_interner() -> (SymbolTable, StringInterner) {
        (SymbolTable::new(), StringInterner::new())
    }

    fn func(
        table: &mut SymbolTable,
        interner: &StringInterner,
        name: &str,
        version: &str,
        is_default: bool,
    ) -> SymbolId {
        table.create(
            0,
            0,
            interner.intern(name),
            SymbolType::Func,
            SymbolBinding::Global,
            true,
            SymbolVersion::new(interner.intern(version), is_default),
        )
    }

    #[test]
    fn lone_symbol_is_its_own_main() {
        let (mut table, interner) = table_with_interner();
        let foo = func(&mut table, &interner, "foo", "", false);

        assert!(table.is_main_symbol(foo));
        assert_eq!(table.main_symbol(foo), foo);
        assert!(!table.has_aliases(foo));
        assert_eq!(table.number_of_aliases(foo), 0);
        assert_eq!(table.next_alias(foo), None);
    }

    #[test]
    fn alias_ring_closes_back_on_main() {
        let (mut table, interner) = table_with_interner();
        let foo = func(&mut table, &interner, "foo", "", false);
        let foo_v1 = func(&mut table, &interner, "foo_v1", "", false);

        table.add_alias(foo, foo_v1).expect("aliasing is legal");

        // Ring traversal yields [foo, foo_v1, foo].
        assert_eq!(table.next_alias(foo), Some(foo_v1));
        assert_eq!(table.next_alias(foo_v1), Some(foo));
        assert_eq!(table.number_of_aliases(foo), 1);
        assert!(table.has_aliases(foo));
        assert!(table.has_aliases(foo_v1));
        assert_eq!(table.main_symbol(foo_v1), foo);
        assert!(!table.is_main_symbol(foo_v1));
    }

    #[test]
    fn ring_traversal_is_bounded() {
        let (mut table, interner) = table_with_interner();
        let a = func(&mut table, &interner, "a", "", false);
        let b = func(&mut table, &interner, "b", "", false);
        let c = func(&mut table, &interner, "c", "", false);
        table.add_alias(a, b).expect("aliasing is legal");
        table.add_alias(a, c).expect("aliasing is legal");

        // Ring length is 1 + number of aliases.
        let mut steps = 1;
        let mut cursor = table.next_alias(table.main_symbol(a));
        while let Some(s) = cursor {
            if s == a {
                break;
            }
            steps += 1;
            cursor = table.next_alias(s);
        }
        assert_eq!(steps, 1 + table.number_of_aliases(a));
    }

    #[test]
    fn add_alias_contract_violations() {
        let (mut table, interner) = table_with_interner();
        let a = func(&mut table, &interner, "a", "", false);
        let b = func(&mut table, &interner, "b", "", false);
        let c = func(&mut table, &interner, "c", "", false);
        table.add_alias(a, b).expect("aliasing is legal");

        // b is not a main symbol.
        assert_eq!(table.add_alias(b, c), Err(SymbolError::NotMainSymbol));
        // a already has aliases, so it cannot become an alias itself.
        assert_eq!(table.add_alias(c, a), Err(SymbolError::AliasHasAliases));
    }

    #[test]
    fn does_alias_compares_textually() {
        let (mut table, interner) = table_with_interner();
        let foo = func(&mut table, &interner, "foo", "", false);
        let foo_alias = func(&mut table, &interner, "foo_v1", "", false);
        table.add_alias(foo, foo_alias).expect("aliasing is legal");

        // A textual twin of the alias, wired to nothing.
        let twin = func(&mut table, &interner, "foo_v1", "", false);
        assert!(table.does_alias(foo, twin));
        assert!(table.equals(foo, twin));
        // Equality is also transitive across the ring.
        assert!(table.equals(foo_alias, twin));
    }

    #[test]
    fn id_string_formats() {
        let (mut table, interner) = table_with_interner();
        let plain = func(&mut table, &interner, "foo", "", false);
        let versioned = func(&mut table, &interner, "foo", "VER_1", false);
        let default = func(&mut table, &interner, "foo", "VER_1", true);

        assert_eq!(table.id_string(plain, &interner), "foo");
        assert_eq!(table.id_string(versioned, &interner), "foo@VER_1");
        assert_eq!(table.id_string(default, &interner), "foo@@VER_1");
    }

    #[test]
    fn id_string_round_trips() {
        let (mut table, interner) = table_with_interner();
        for (name, version, is_default) in
            [("foo", "", false), ("foo", "V1", false), ("foo", "V1", true)]
        {
            let s = func(&mut table, &interner, name, version, is_default);
            let id = table.id_string(s, &interner);
            let (parsed_name, parsed_version) = get_name_and_version_from_id(&id);
            assert_eq!(parsed_name, name);
            assert_eq!(parsed_version, version);
        }
    }

    #[test]
    fn publicness_requires_definition_and_binding() {
        let (mut table, interner) = table_with_interner();
        let name = interner.intern("x");
        let version = SymbolVersion::default();

        let public = table.create(0, 8, name, SymbolType::Object, SymbolBinding::Global, true, version);
        let undefined =
            table.create(0, 8, name, SymbolType::Object, SymbolBinding::Global, false, version);
        let local = table.create(0, 8, name, SymbolType::Object, SymbolBinding::Local, true, version);

        assert!(table.is_public(public));
        assert!(!table.is_public(undefined));
        assert!(!table.is_public(local));
    }

    #[test]
    fn variable_symbols_compare_sizes() {
        let (mut table, interner) = table_with_interner();
        let name = interner.intern("v");
        let version = SymbolVersion::default();
        let a = table.create(0, 8, name, SymbolType::Object, SymbolBinding::Global, true, version);
        let b = table.create(0, 16, name, SymbolType::Object, SymbolBinding::Global, true, version);
        let c = table.create(0, 8, name, SymbolType::Object, SymbolBinding::Global, true, version);

        assert!(!table.textually_equals(a, b));
        assert!(table.textually_equals(a, c));
    }

    #[test]
    fn alias_queries() {
        let (mut table, interner) = table_with_interner();
        let foo = func(&mut table, &interner, "foo", "", false);
        let bar = func(&mut table, &interner, "bar", "", false);
        table.add_alias(foo, bar).expect("aliasing is legal");

        assert_eq!(table.alias_from_name(foo, interner.intern("bar")), Some(bar));
        assert_eq!(table.alias_from_name(foo, interner.intern("baz")), None);
        assert_eq!(table.aliases_id_string(foo, true, &interner), "foo, bar");
        assert_eq!(table.aliases_id_string(foo, false, &interner), "bar");
    }

    #[test]
    fn type_and_binding_strings_round_trip() {
        for kind in [
            SymbolType::NoType,
            SymbolType::Object,
            SymbolType::Func,
            SymbolType::Section,
            SymbolType::File,
            SymbolType::Common,
            SymbolType::Tls,
            SymbolType::GnuIfunc,
        ] {
            assert_eq!(kind.to_string().parse::<SymbolType>(), Ok(kind));
        }
        for binding in [
            SymbolBinding::Local,
            SymbolBinding::Global,
            SymbolBinding::Weak,
            SymbolBinding::GnuUnique,
        ] {
            assert_eq!(binding.to_string().parse::<SymbolBinding>(), Ok(binding));
        }
    }
}
