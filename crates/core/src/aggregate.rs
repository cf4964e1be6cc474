//! Aggregate Codec
//!
//! Tuples and named-field records travel as tables.
//!
//! A tuple of arity N becomes a table with its elements at positions
//! `1..=N`. A record becomes a table keyed by its field names. Both decode
//! left to right, and a nested failure is reported with the position or
//! field it came from. Keys or positions the host type does not name are
//! ignored; missing ones decode as `nil` and fail the element's own check.
//!
//! Records are declared with the [`aggregate!`](crate::aggregate!) macro,
//! which derives the field list from the struct definition:
//!
//! ```ignore
//! luabind::aggregate! {
//!     #[derive(Debug, Clone, PartialEq)]
//!     pub struct Foo {
//!         pub biz: f64,
//!         pub buz: String,
//!     }
//! }
//! ```

use crate::error::Result;
use crate::kind::{Classify, Kind};
use crate::stack::{State, Tag};
use crate::value::{Decode, Encode, expect_tag, pop, push, reserve};
use std::ffi::c_int;

/// A record type whose fields are marshalled by name
pub trait Aggregate: Classify {
    /// Field names in declaration order
    const FIELDS: &'static [&'static str];
}

/// Writes named fields into the table an aggregate is being encoded into
pub struct FieldWriter {
    state: State,
    table: c_int,
}

impl FieldWriter {
    /// Stack effect: ( -- ), with `table[name] = value`
    pub fn field<T: Encode + ?Sized>(&mut self, name: &str, value: &T) -> &mut Self {
        push(self.state, value);
        self.state.set_keyed(self.table, name);
        self
    }
}

/// Reads named fields out of the table an aggregate is being decoded from
pub struct FieldReader {
    state: State,
    table: c_int,
}

impl FieldReader {
    /// Decode `table[name]`, annotating a failure with the field name
    pub fn field<T: Decode>(&self, name: &str) -> Result<T> {
        reserve(self.state);
        self.state.get_keyed(self.table, name);
        pop::<T>(self.state).map_err(|e| e.at_field(name))
    }
}

/// Table key for a field identifier
///
/// Raw identifiers lose their `r#` prefix, so a field declared as `r#type`
/// is stored under `type`.
pub const fn field_key(ident: &'static str) -> &'static str {
    let bytes = ident.as_bytes();
    if bytes.len() > 2 && bytes[0] == b'r' && bytes[1] == b'#' {
        let (_, rest) = bytes.split_at(2);
        // SAFETY: removing an ASCII prefix from valid UTF-8 leaves valid UTF-8
        unsafe { std::str::from_utf8_unchecked(rest) }
    } else {
        ident
    }
}

/// Encode a record as a keyed table
///
/// Stack effect: ( -- table )
pub fn encode_aggregate(state: State, fields: usize, write: impl FnOnce(&mut FieldWriter)) {
    state.create_table(0, fields);
    let mut writer = FieldWriter {
        state,
        table: state.top(),
    };
    write(&mut writer);
}

/// Decode a record from the keyed table on top of the stack
pub fn decode_aggregate<T, F>(state: State, read: F) -> Result<T>
where
    T: Classify,
    F: FnOnce(&FieldReader) -> Result<T>,
{
    expect_tag::<T>(state, Tag::Table)?;
    let reader = FieldReader {
        state,
        table: state.abs_index(-1),
    };
    read(&reader)
}

/// Declare a struct and make it marshallable as a keyed table
///
/// Every field type must itself be [`Encode`] and [`Decode`]; the field
/// identifiers become the table keys.
#[macro_export]
macro_rules! aggregate {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$field_meta:meta])* $field_vis:vis $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$field_meta])* $field_vis $field : $ty ),*
        }

        impl $crate::kind::Classify for $name {
            const KIND: $crate::kind::Kind = $crate::kind::Kind::Aggregate;
        }

        impl $crate::aggregate::Aggregate for $name {
            const FIELDS: &'static [&'static str] = &[$($crate::aggregate::field_key(stringify!($field))),*];
        }

        impl $crate::value::Encode for $name {
            fn encode(&self, state: $crate::stack::State) {
                $crate::aggregate::encode_aggregate(
                    state,
                    <Self as $crate::aggregate::Aggregate>::FIELDS.len(),
                    |fields| {
                        $( fields.field($crate::aggregate::field_key(stringify!($field)), &self.$field); )*
                    },
                );
            }
        }

        impl $crate::value::Decode for $name {
            fn decode(state: $crate::stack::State) -> $crate::error::Result<Self> {
                $crate::aggregate::decode_aggregate(state, |fields| {
                    Ok(Self {
                        $( $field: fields.field($crate::aggregate::field_key(stringify!($field)))?, )*
                    })
                })
            }
        }
    };
}

macro_rules! tuple_codec {
    ($($name:ident . $idx:tt),+) => {
        impl<$($name: Classify),+> Classify for ($($name,)+) {
            const KIND: Kind = Kind::Tuple;
        }

        impl<$($name: Encode),+> Encode for ($($name,)+) {
            fn encode(&self, state: State) {
                state.create_table([$(stringify!($name)),+].len(), 0);
                let table = state.top();
                $(
                    push(state, &self.$idx);
                    state.set_indexed(table, $idx + 1);
                )+
            }
        }

        impl<$($name: Decode),+> Decode for ($($name,)+) {
            fn decode(state: State) -> Result<Self> {
                expect_tag::<Self>(state, Tag::Table)?;
                let table = state.abs_index(-1);
                Ok(($(
                    {
                        reserve(state);
                        state.get_indexed(table, $idx + 1);
                        pop::<$name>(state).map_err(|e| e.at_position($idx + 1))?
                    },
                )+))
            }
        }
    };
}

tuple_codec!(A.0);
tuple_codec!(A.0, B.1);
tuple_codec!(A.0, B.1, C.2);
tuple_codec!(A.0, B.1, C.2, D.3);
tuple_codec!(A.0, B.1, C.2, D.3, E.4);
tuple_codec!(A.0, B.1, C.2, D.3, E.4, F.5);
tuple_codec!(A.0, B.1, C.2, D.3, E.4, F.5, G.6);
tuple_codec!(A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7);
tuple_codec!(A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7, I.8);
tuple_codec!(A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7, I.8, J.9);
tuple_codec!(A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7, I.8, J.9, K.10);
tuple_codec!(A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7, I.8, J.9, K.10, L.11);
