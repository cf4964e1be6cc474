//! Type Classification
//!
//! Every marshallable host type belongs to exactly one [`Kind`]. The kind is
//! an associated constant, so it is fixed at compile time and the codec for a
//! type is picked by trait resolution rather than at run time. A type with no
//! [`Classify`] impl simply cannot be encoded or decoded.

/// The marshalling category of a host type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Boolean values
    Bool,
    /// Integers and floating-point numbers (all carried as the engine's number)
    Numeric,
    /// Text
    Text,
    /// Homogeneous sequences, mapped to 1-based tables
    Sequence,
    /// Fixed-arity heterogeneous tuples, mapped to 1-based tables
    Tuple,
    /// Named-field records, mapped to keyed tables
    Aggregate,
    /// Native callables the engine can invoke
    Callable,
}

impl Kind {
    /// Short lowercase name of the category
    pub fn name(self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::Numeric => "numeric",
            Kind::Text => "text",
            Kind::Sequence => "sequence",
            Kind::Tuple => "tuple",
            Kind::Aggregate => "aggregate",
            Kind::Callable => "callable",
        }
    }

    /// The engine type name a value of this kind is carried as
    pub fn engine_type(self) -> &'static str {
        match self {
            Kind::Bool => "boolean",
            Kind::Numeric => "number",
            Kind::Text => "string",
            Kind::Sequence | Kind::Tuple | Kind::Aggregate => "table",
            Kind::Callable => "function",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Compile-time classification of a host type
pub trait Classify {
    const KIND: Kind;
}

impl<T: Classify + ?Sized> Classify for &T {
    const KIND: Kind = T::KIND;
}

impl Classify for bool {
    const KIND: Kind = Kind::Bool;
}

macro_rules! classify_numeric {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Classify for $ty {
                const KIND: Kind = Kind::Numeric;
            }
        )*
    };
}

classify_numeric!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64
);

impl Classify for str {
    const KIND: Kind = Kind::Text;
}

impl Classify for String {
    const KIND: Kind = Kind::Text;
}

impl Classify for char {
    const KIND: Kind = Kind::Text;
}

impl<T: Classify> Classify for Vec<T> {
    const KIND: Kind = Kind::Sequence;
}

impl<T: Classify> Classify for [T] {
    const KIND: Kind = Kind::Sequence;
}

impl<T: Classify, const N: usize> Classify for [T; N] {
    const KIND: Kind = Kind::Sequence;
}
