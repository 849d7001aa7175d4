//! Integral-type descriptor.
//!
//! Fundamental integral types reach the IR under many spellings:
//! "unsigned long", "long unsigned int" and "long unsigned" are the
//! same type. The descriptor normalizes a base type plus a modifier
//! bitmask so that all spellings collapse to one canonical name, which
//! is what the canonicalization registry keys on.

use bitflags::bitflags;
use std::fmt;
use std::str::FromStr;

/// The base of an integral type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum IntegralBase {
    /// The "int" base type.
    Int,
    /// The "char" base type.
    Char,
    /// The "bool" base type ("_Bool" in C11).
    Bool,
    /// The "double" base type.
    Double,
    /// The "float" base type.
    Float,
    /// The "char16_t" base type.
    Char16,
    /// The "char32_t" base type.
    Char32,
    /// The "wchar_t" base type.
    WChar,
}

impl IntegralBase {
    fn as_str(self) -> &'static str {
        match self {
            IntegralBase::Int => "int",
            IntegralBase::Char => "char",
            IntegralBase::Bool => "bool",
            IntegralBase::Double => "double",
            IntegralBase::Float => "float",
            IntegralBase::Char16 => "char16_t",
            IntegralBase::Char32 => "char32_t",
            IntegralBase::WChar => "wchar_t",
        }
    }
}

bitflags! {
    /// Modifiers of an integral base type. Several can be combined.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct IntegralModifiers: u8 {
        /// The "signed" modifier.
        const SIGNED = 1 << 0;
        /// The "unsigned" modifier.
        const UNSIGNED = 1 << 1;
        /// The "short" modifier.
        const SHORT = 1 << 2;
        /// The "long" modifier.
        const LONG = 1 << 3;
        /// The "long long" modifier.
        const LONG_LONG = 1 << 4;
    }
}

/// Error parsing an integral type name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseIntegralError {
    /// A word of the name is neither a known base nor a modifier.
    #[error("unknown integral type token: `{0}`")]
    UnknownToken(String),
    /// The name contains no words at all.
    #[error("empty integral type name")]
    Empty,
}

/// A normalized integral type: base + modifiers.
///
/// Two descriptors compare equal whenever the spellings they were
/// parsed from denote the same type, regardless of token order.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct IntegralType {
    base: IntegralBase,
    modifiers: IntegralModifiers,
}

impl IntegralType {
    /// Create a descriptor from a base and modifiers.
    pub fn new(base: IntegralBase, modifiers: IntegralModifiers) -> Self {
        Self { base, modifiers }
    }

    /// Plain "int".
    pub fn int() -> Self {
        Self::new(IntegralBase::Int, IntegralModifiers::empty())
    }

    /// The base type.
    pub fn base(self) -> IntegralBase {
        self.base
    }

    /// The modifier bitmask.
    pub fn modifiers(self) -> IntegralModifiers {
        self.modifiers
    }

    /// Render the normalized name.
    ///
    /// The `internal` form is the one used for canonicalization keys.
    /// Both forms use the same fixed token order (sign, width, base),
    /// with one difference: the internal form of a plain modified `int`
    /// keeps the explicit `int` token ("unsigned int", not "unsigned"),
    /// so distinct descriptors can never render to the same key.
    pub fn to_string(self, internal: bool) -> String {
        let mut out = String::new();

        if self.modifiers.contains(IntegralModifiers::UNSIGNED) {
            out.push_str("unsigned ");
        } else if self.modifiers.contains(IntegralModifiers::SIGNED)
            // "signed int" is just "int"; only char and friends keep it.
            && self.base != IntegralBase::Int
        {
            out.push_str("signed ");
        }

        if self.modifiers.contains(IntegralModifiers::SHORT) {
            out.push_str("short ");
        } else if self.modifiers.contains(IntegralModifiers::LONG_LONG) {
            out.push_str("long long ");
        } else if self.modifiers.contains(IntegralModifiers::LONG) {
            out.push_str("long ");
        }

        let drop_int = !internal
            && self.base == IntegralBase::Int
            && self
                .modifiers
                .intersects(IntegralModifiers::SHORT | IntegralModifiers::LONG | IntegralModifiers::LONG_LONG);
        if drop_int {
            // External form: "long", "short", "long long".
            out.truncate(out.trim_end().len());
        } else {
            out.push_str(self.base.as_str());
        }

        out
    }

    /// Parse a (possibly unordered) spelling like "long unsigned int".
    pub fn parse(name: &str) -> Result<Self, ParseIntegralError> {
        let mut base = None;
        let mut modifiers = IntegralModifiers::empty();

        let mut saw_token = false;
        for token in name.split_whitespace() {
            saw_token = true;
            match token {
                "signed" => modifiers |= IntegralModifiers::SIGNED,
                "unsigned" => modifiers |= IntegralModifiers::UNSIGNED,
                "short" => modifiers |= IntegralModifiers::SHORT,
                "long" => {
                    if modifiers.contains(IntegralModifiers::LONG) {
                        modifiers.remove(IntegralModifiers::LONG);
                        modifiers |= IntegralModifiers::LONG_LONG;
                    } else {
                        modifiers |= IntegralModifiers::LONG;
                    }
                }
                "int" => base = Some(IntegralBase::Int),
                "char" => base = Some(IntegralBase::Char),
                "bool" | "_Bool" => base = Some(IntegralBase::Bool),
                "double" => base = Some(IntegralBase::Double),
                "float" => base = Some(IntegralBase::Float),
                "char16_t" => base = Some(IntegralBase::Char16),
                "char32_t" => base = Some(IntegralBase::Char32),
                "wchar_t" => base = Some(IntegralBase::WChar),
                other => return Err(ParseIntegralError::UnknownToken(other.to_owned())),
            }
        }

        if !saw_token {
            return Err(ParseIntegralError::Empty);
        }

        // "unsigned", "long", "short" alone mean a modified int.
        Ok(Self::new(base.unwrap_or(IntegralBase::Int), modifiers))
    }
}

impl FromStr for IntegralType {
    type Err = ParseIntegralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for IntegralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&IntegralType::to_string(*self, false))
    }
}
