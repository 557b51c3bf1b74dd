//! Dispatch catalog
//!
//! The closed set of operations a proxy can intercept, and the handling
//! strategy each one gets. Operations are grouped into byte ranges:
//!
//! - 0x00-0x0F: Identity machinery (never checked)
//! - 0x10-0x1F: Conversions (`str`, `repr`, numeric coercion)
//! - 0x20-0x2F: Rich comparison
//! - 0x30-0x3F: Call, container and iteration protocol
//! - 0x40-0x4F: Unary arithmetic
//! - 0x50-0x5F: Binary arithmetic and bitwise operators
//! - 0x60-0x6F: Reflected binary operators (mirrors 0x50 at +0x10)
//! - 0x70-0x7F: In-place operators
//!
//! The name-to-strategy mapping is fixed when the catalog is built. Nothing
//! about it varies per proxy instance.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::fmt;

/// How a proxy handles an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Forwarded straight to the wrapped value; the checker is never asked
    Unchecked,
    /// Checked, then forwarded; the result is mediated
    CheckedForwarding,
    /// Checked, then applied in place when the wrapped value can do so
    CheckedInPlace,
}

impl Strategy {
    /// Human-readable strategy name
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Unchecked => "unchecked",
            Strategy::CheckedForwarding => "checked-forwarding",
            Strategy::CheckedInPlace => "checked-in-place",
        }
    }
}

/// Interceptable operation
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    // ===== Identity machinery (0x00-0x0F) =====
    /// Default total ordering (sorting)
    Compare = 0x00,
    /// Hashing
    Hash = 0x01,
    /// Truthiness
    Bool = 0x02,

    // ===== Conversions (0x10-0x1F) =====
    /// Text conversion
    Str = 0x10,
    /// Representation
    Repr = 0x11,
    /// Integer coercion
    Int = 0x12,
    /// Float coercion
    Float = 0x13,
    /// Index coercion
    Index = 0x14,

    // ===== Rich comparison (0x20-0x2F) =====
    /// `<`
    Lt = 0x20,
    /// `<=`
    Le = 0x21,
    /// `==`
    Eq = 0x22,
    /// `!=`
    Ne = 0x23,
    /// `>`
    Gt = 0x24,
    /// `>=`
    Ge = 0x25,

    // ===== Protocol (0x30-0x3F) =====
    /// Invoke a callable
    Call = 0x30,
    /// Length
    Len = 0x31,
    /// `x[k]`
    GetItem = 0x32,
    /// `x[k] = v`
    SetItem = 0x33,
    /// `del x[k]`
    DelItem = 0x34,
    /// Obtain an iterator
    Iter = 0x35,
    /// Advance an iterator
    Next = 0x36,
    /// Membership test
    Contains = 0x37,

    // ===== Unary (0x40-0x4F) =====
    /// `-x`
    Neg = 0x40,
    /// `+x`
    Pos = 0x41,
    /// `abs(x)`
    Abs = 0x42,
    /// `~x`
    Invert = 0x43,

    // ===== Binary (0x50-0x5F) =====
    /// `+`
    Add = 0x50,
    /// `-`
    Sub = 0x51,
    /// `*`
    Mul = 0x52,
    /// `@`
    MatMul = 0x53,
    /// `/`
    TrueDiv = 0x54,
    /// `//`
    FloorDiv = 0x55,
    /// `%`
    Mod = 0x56,
    /// `divmod`
    DivMod = 0x57,
    /// `**`
    Pow = 0x58,
    /// `<<`
    LShift = 0x59,
    /// `>>`
    RShift = 0x5A,
    /// `&`
    And = 0x5B,
    /// `^`
    Xor = 0x5C,
    /// `|`
    Or = 0x5D,

    // ===== Reflected binary (0x60-0x6F) =====
    /// Reflected `+`
    RAdd = 0x60,
    /// Reflected `-`
    RSub = 0x61,
    /// Reflected `*`
    RMul = 0x62,
    /// Reflected `@`
    RMatMul = 0x63,
    /// Reflected `/`
    RTrueDiv = 0x64,
    /// Reflected `//`
    RFloorDiv = 0x65,
    /// Reflected `%`
    RMod = 0x66,
    /// Reflected `divmod`
    RDivMod = 0x67,
    /// Reflected `**`
    RPow = 0x68,
    /// Reflected `<<`
    RLShift = 0x69,
    /// Reflected `>>`
    RRShift = 0x6A,
    /// Reflected `&`
    RAnd = 0x6B,
    /// Reflected `^`
    RXor = 0x6C,
    /// Reflected `|`
    ROr = 0x6D,

    // ===== In-place (0x70-0x7F) =====
    /// `+=`
    IAdd = 0x70,
    /// `-=`
    ISub = 0x71,
    /// `*=`
    IMul = 0x72,
    /// `@=`
    IMatMul = 0x73,
    /// `/=`
    ITrueDiv = 0x74,
    /// `//=`
    IFloorDiv = 0x75,
    /// `%=`
    IMod = 0x76,
    /// `**=`
    IPow = 0x77,
    /// `<<=`
    ILShift = 0x78,
    /// `>>=`
    IRShift = 0x79,
    /// `&=`
    IAnd = 0x7A,
    /// `^=`
    IXor = 0x7B,
    /// `|=`
    IOr = 0x7C,
}

/// Number of operations in the catalog
pub const OPERATION_COUNT: usize = 67;

impl Operation {
    /// Every operation, in byte order
    pub const ALL: [Operation; OPERATION_COUNT] = [
        Self::Compare,
        Self::Hash,
        Self::Bool,
        Self::Str,
        Self::Repr,
        Self::Int,
        Self::Float,
        Self::Index,
        Self::Lt,
        Self::Le,
        Self::Eq,
        Self::Ne,
        Self::Gt,
        Self::Ge,
        Self::Call,
        Self::Len,
        Self::GetItem,
        Self::SetItem,
        Self::DelItem,
        Self::Iter,
        Self::Next,
        Self::Contains,
        Self::Neg,
        Self::Pos,
        Self::Abs,
        Self::Invert,
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::MatMul,
        Self::TrueDiv,
        Self::FloorDiv,
        Self::Mod,
        Self::DivMod,
        Self::Pow,
        Self::LShift,
        Self::RShift,
        Self::And,
        Self::Xor,
        Self::Or,
        Self::RAdd,
        Self::RSub,
        Self::RMul,
        Self::RMatMul,
        Self::RTrueDiv,
        Self::RFloorDiv,
        Self::RMod,
        Self::RDivMod,
        Self::RPow,
        Self::RLShift,
        Self::RRShift,
        Self::RAnd,
        Self::RXor,
        Self::ROr,
        Self::IAdd,
        Self::ISub,
        Self::IMul,
        Self::IMatMul,
        Self::ITrueDiv,
        Self::IFloorDiv,
        Self::IMod,
        Self::IPow,
        Self::ILShift,
        Self::IRShift,
        Self::IAnd,
        Self::IXor,
        Self::IOr,
    ];

    /// Convert byte to operation
    ///
    /// Returns None if the byte does not correspond to a catalog entry.
    pub fn from_u8(byte: u8) -> Option<Self> {
        BY_CODE[byte as usize]
    }

    /// Convert operation to byte
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Look an operation up by its catalog name
    pub fn from_name(name: &str) -> Option<Self> {
        Catalog::global().lookup(name).map(|entry| entry.operation)
    }

    /// Catalog name of the operation; also the name the checker sees
    pub const fn name(self) -> &'static str {
        match self {
            Self::Compare => "compare",
            Self::Hash => "hash",
            Self::Bool => "bool",
            Self::Str => "str",
            Self::Repr => "repr",
            Self::Int => "int",
            Self::Float => "float",
            Self::Index => "index",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Call => "call",
            Self::Len => "len",
            Self::GetItem => "item-get",
            Self::SetItem => "item-set",
            Self::DelItem => "item-delete",
            Self::Iter => "iter",
            Self::Next => "next",
            Self::Contains => "contains",
            Self::Neg => "neg",
            Self::Pos => "pos",
            Self::Abs => "abs",
            Self::Invert => "invert",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::MatMul => "matmul",
            Self::TrueDiv => "truediv",
            Self::FloorDiv => "floordiv",
            Self::Mod => "mod",
            Self::DivMod => "divmod",
            Self::Pow => "pow",
            Self::LShift => "lshift",
            Self::RShift => "rshift",
            Self::And => "and",
            Self::Xor => "xor",
            Self::Or => "or",
            Self::RAdd => "radd",
            Self::RSub => "rsub",
            Self::RMul => "rmul",
            Self::RMatMul => "rmatmul",
            Self::RTrueDiv => "rtruediv",
            Self::RFloorDiv => "rfloordiv",
            Self::RMod => "rmod",
            Self::RDivMod => "rdivmod",
            Self::RPow => "rpow",
            Self::RLShift => "rlshift",
            Self::RRShift => "rrshift",
            Self::RAnd => "rand",
            Self::RXor => "rxor",
            Self::ROr => "ror",
            Self::IAdd => "inplace-add",
            Self::ISub => "inplace-sub",
            Self::IMul => "inplace-mul",
            Self::IMatMul => "inplace-matmul",
            Self::ITrueDiv => "inplace-truediv",
            Self::IFloorDiv => "inplace-floordiv",
            Self::IMod => "inplace-mod",
            Self::IPow => "inplace-pow",
            Self::ILShift => "inplace-lshift",
            Self::IRShift => "inplace-rshift",
            Self::IAnd => "inplace-and",
            Self::IXor => "inplace-xor",
            Self::IOr => "inplace-or",
        }
    }

    /// Strategy assigned to this operation
    pub const fn strategy(self) -> Strategy {
        match self as u8 {
            0x00..=0x0F => Strategy::Unchecked,
            0x70..=0x7F => Strategy::CheckedInPlace,
            _ => Strategy::CheckedForwarding,
        }
    }

    /// Whether a denial of this operation is replaced by a redacted rendering
    pub const fn is_conversion_fallback(self) -> bool {
        matches!(self, Self::Str | Self::Repr)
    }

    /// Check if this is a unary arithmetic operation
    pub const fn is_unary(self) -> bool {
        matches!(self as u8, 0x40..=0x4F)
    }

    /// Check if this is a forward binary operator
    pub const fn is_binary(self) -> bool {
        matches!(self as u8, 0x50..=0x5F)
    }

    /// Check if this is a reflected binary operator
    pub const fn is_reflected(self) -> bool {
        matches!(self as u8, 0x60..=0x6F)
    }

    /// Check if this is a rich comparison
    pub const fn is_comparison(self) -> bool {
        matches!(self as u8, 0x20..=0x2F)
    }

    /// Check if this is an in-place operator
    pub const fn is_in_place(self) -> bool {
        matches!(self as u8, 0x70..=0x7F)
    }

    /// Reflected partner of a binary operator, and vice versa
    pub fn reflected(self) -> Option<Self> {
        if self.is_binary() {
            Self::from_u8(self as u8 + 0x10)
        } else if self.is_reflected() {
            Self::from_u8(self as u8 - 0x10)
        } else {
            None
        }
    }

    /// Non-in-place operator used when the receiver has no true in-place form
    pub const fn forward(self) -> Option<Self> {
        match self {
            Self::IAdd => Some(Self::Add),
            Self::ISub => Some(Self::Sub),
            Self::IMul => Some(Self::Mul),
            Self::IMatMul => Some(Self::MatMul),
            Self::ITrueDiv => Some(Self::TrueDiv),
            Self::IFloorDiv => Some(Self::FloorDiv),
            Self::IMod => Some(Self::Mod),
            Self::IPow => Some(Self::Pow),
            Self::ILShift => Some(Self::LShift),
            Self::IRShift => Some(Self::RShift),
            Self::IAnd => Some(Self::And),
            Self::IXor => Some(Self::Xor),
            Self::IOr => Some(Self::Or),
            _ => None,
        }
    }

    /// Number of arguments the operation takes, `None` when variadic
    pub const fn arity(self) -> Option<usize> {
        match self {
            Self::Call => None,
            Self::SetItem => Some(2),
            Self::Compare | Self::GetItem | Self::DelItem | Self::Contains => Some(1),
            _ if self.is_comparison()
                || self.is_binary()
                || self.is_reflected()
                || self.is_in_place() =>
            {
                Some(1)
            }
            _ => Some(0),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const fn build_code_table() -> [Option<Operation>; 256] {
    let mut table = [None; 256];
    let mut i = 0;
    while i < OPERATION_COUNT {
        let op = Operation::ALL[i];
        table[op as u8 as usize] = Some(op);
        i += 1;
    }
    table
}

static BY_CODE: [Option<Operation>; 256] = build_code_table();

/// Catalog entry: an operation and its strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// The operation
    pub operation: Operation,
    /// Its handling strategy
    pub strategy: Strategy,
}

/// Name-keyed dispatch table, built once per process
#[derive(Debug)]
pub struct Catalog {
    by_name: FxHashMap<&'static str, CatalogEntry>,
}

static CATALOG: Lazy<Catalog> = Lazy::new(Catalog::build);

impl Catalog {
    fn build() -> Self {
        let mut by_name = FxHashMap::default();
        for op in Operation::ALL {
            by_name.insert(
                op.name(),
                CatalogEntry {
                    operation: op,
                    strategy: op.strategy(),
                },
            );
        }
        Self { by_name }
    }

    /// The process-wide catalog
    pub fn global() -> &'static Catalog {
        &CATALOG
    }

    /// Look up an entry by operation name
    pub fn lookup(&self, name: &str) -> Option<CatalogEntry> {
        self.by_name.get(name).copied()
    }

    /// Strategy for a name, if it is a catalog operation
    pub fn strategy(&self, name: &str) -> Option<Strategy> {
        self.lookup(name).map(|entry| entry.strategy)
    }

    /// All operation names handled with `strategy`, sorted
    pub fn names_with(&self, strategy: Strategy) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .by_name
            .values()
            .filter(|entry| entry.strategy == strategy)
            .map(|entry| entry.operation.name())
            .collect();
        names.sort_unstable();
        names
    }

    /// Number of catalog entries
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_roundtrip() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_u8(op.to_u8()), Some(op), "byte roundtrip for {:?}", op);
            assert_eq!(Operation::from_name(op.name()), Some(op), "name roundtrip for {:?}", op);
        }
    }

    #[test]
    fn test_invalid_codes() {
        assert_eq!(Operation::from_u8(0x03), None);
        assert_eq!(Operation::from_u8(0x7D), None);
        assert_eq!(Operation::from_u8(0xFF), None);
        assert_eq!(Operation::from_name("__getitem__"), None);
    }

    #[test]
    fn test_family_sizes() {
        let catalog = Catalog::global();
        assert_eq!(catalog.len(), OPERATION_COUNT);
        assert_eq!(catalog.names_with(Strategy::Unchecked), vec!["bool", "compare", "hash"]);
        assert_eq!(catalog.names_with(Strategy::CheckedInPlace).len(), 13);
        assert_eq!(catalog.names_with(Strategy::CheckedForwarding).len(), 51);
    }

    #[test]
    fn test_reflected_pairs() {
        assert_eq!(Operation::Add.reflected(), Some(Operation::RAdd));
        assert_eq!(Operation::ROr.reflected(), Some(Operation::Or));
        assert_eq!(Operation::DivMod.reflected(), Some(Operation::RDivMod));
        assert_eq!(Operation::Len.reflected(), None);
        for op in Operation::ALL.iter().filter(|op| op.is_binary()) {
            let partner = op.reflected().unwrap();
            assert_eq!(&partner.name()[1..], op.name());
        }
    }

    #[test]
    fn test_in_place_forwards() {
        for op in Operation::ALL.iter().filter(|op| op.is_in_place()) {
            let forward = op.forward().unwrap();
            assert!(forward.is_binary());
            assert_eq!(op.name(), format!("inplace-{}", forward.name()));
        }
        assert_eq!(Operation::Add.forward(), None);
    }

    #[test]
    fn test_arity() {
        assert_eq!(Operation::Call.arity(), None);
        assert_eq!(Operation::SetItem.arity(), Some(2));
        assert_eq!(Operation::GetItem.arity(), Some(1));
        assert_eq!(Operation::Lt.arity(), Some(1));
        assert_eq!(Operation::IAdd.arity(), Some(1));
        assert_eq!(Operation::Len.arity(), Some(0));
        assert_eq!(Operation::Neg.arity(), Some(0));
    }
}
