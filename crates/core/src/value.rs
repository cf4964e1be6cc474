//! Value Codec
//!
//! Moves single host values onto and off the engine's stack.
//!
//! [`Encode`] and [`Decode`] are the per-type halves; [`push`] and [`pop`]
//! are the entry points everything else goes through. They own the stack
//! discipline: `push` always leaves exactly one more slot, `pop` always
//! leaves exactly one fewer, whether the codec succeeded, failed or panicked.
//!
//! Decoding is strict about engine tags. A number never decodes as text and
//! a numeric-looking string never decodes as a number, even though the
//! engine itself would coerce between them.

use crate::error::{Error, Result};
use crate::kind::Classify;
use crate::stack::{StackGuard, State, Tag};
use std::ffi::c_int;

/// Free slots made available before each push
const SLOTS_PER_VALUE: c_int = 4;

/// Host types that can become one stack value
pub trait Encode: Classify {
    /// Push `self` as exactly one value
    ///
    /// Stack effect: ( -- v )
    fn encode(&self, state: State);
}

/// Host types that can be rebuilt from one stack value
pub trait Decode: Classify + Sized {
    /// Read the value on top of the stack without consuming it
    ///
    /// Implementations may push scratch values but must leave the stack as
    /// they found it on success.
    fn decode(state: State) -> Result<Self>;
}

/// Encode `value` onto the stack
///
/// Stack effect: ( -- v )
///
/// # Panics
/// Panics if the engine cannot grow its stack.
pub fn push<T: Encode + ?Sized>(state: State, value: &T) {
    reserve(state);
    let guard = StackGuard::new(state);
    value.encode(state);
    guard.keep(1);
}

/// Decode and remove the value on top of the stack
///
/// The value is removed even when decoding fails.
///
/// Stack effect: ( v -- )
pub fn pop<T: Decode>(state: State) -> Result<T> {
    if state.top() < 1 {
        return Err(Error::incorrect_type(T::KIND.engine_type(), "no value"));
    }
    let guard = StackGuard::with_base(state, state.top() - 1);
    let value = T::decode(state)?;
    guard.expect(1);
    Ok(value)
}

pub(crate) fn reserve(state: State) {
    if !state.reserve(SLOTS_PER_VALUE) {
        panic!("engine stack overflow");
    }
}

/// Check the tag of the top value against what `T` is carried as
pub(crate) fn expect_tag<T: Classify + ?Sized>(state: State, tag: Tag) -> Result<()> {
    let found = state.tag(-1);
    if found == tag {
        Ok(())
    } else {
        Err(Error::incorrect_type(T::KIND.engine_type(), found.name()))
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, state: State) {
        (**self).encode(state);
    }
}

// ============================================================================
// Scalars
// ============================================================================

impl Encode for bool {
    fn encode(&self, state: State) {
        state.push_bool(*self);
    }
}

impl Decode for bool {
    fn decode(state: State) -> Result<Self> {
        expect_tag::<Self>(state, Tag::Bool)?;
        Ok(state.to_bool(-1))
    }
}

// Every number travels as the engine's double. Narrowing back uses `as`:
// truncation toward zero, saturation at the bounds, NaN to zero.
macro_rules! numeric_codec {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode(&self, state: State) {
                    state.push_number(*self as f64);
                }
            }

            impl Decode for $ty {
                fn decode(state: State) -> Result<Self> {
                    expect_tag::<Self>(state, Tag::Number)?;
                    Ok(state.to_number(-1) as $ty)
                }
            }
        )*
    };
}

numeric_codec!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64
);

// ============================================================================
// Text
// ============================================================================

impl Encode for str {
    fn encode(&self, state: State) {
        state.push_text(self);
    }
}

impl Encode for String {
    fn encode(&self, state: State) {
        state.push_text(self);
    }
}

impl Decode for String {
    fn decode(state: State) -> Result<Self> {
        let found = state.tag(-1);
        let bytes = state
            .to_bytes(-1)
            .ok_or_else(|| Error::incorrect_type("string", found.name()))?;
        String::from_utf8(bytes).map_err(|_| Error::incorrect_type("UTF-8 string", "binary string"))
    }
}

impl Encode for char {
    fn encode(&self, state: State) {
        let mut buf = [0u8; 4];
        state.push_text(self.encode_utf8(&mut buf));
    }
}

impl Decode for char {
    fn decode(state: State) -> Result<Self> {
        let text = String::decode(state)?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(Error::incorrect_type(
                "single-character string",
                format!("string of {} characters", text.chars().count()),
            )),
        }
    }
}

// ============================================================================
// Sequences
// ============================================================================

/// Stack effect: ( -- table )
fn encode_sequence<T: Encode>(state: State, items: &[T]) {
    state.create_table(items.len(), 0);
    let table = state.top();
    for (i, item) in items.iter().enumerate() {
        push(state, item);
        state.set_indexed(table, i + 1);
    }
}

fn decode_sequence<T: Decode>(state: State) -> Result<Vec<T>> {
    expect_tag::<Vec<T>>(state, Tag::Table)?;
    let table = state.abs_index(-1);
    let len = state.raw_len(table);
    let mut items = Vec::with_capacity(len);
    for position in 1..=len {
        reserve(state);
        state.get_indexed(table, position);
        items.push(pop::<T>(state).map_err(|e| e.at_position(position))?);
    }
    Ok(items)
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, state: State) {
        encode_sequence(state, self);
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, state: State) {
        encode_sequence(state, self);
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(state: State) -> Result<Self> {
        decode_sequence(state)
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode(&self, state: State) {
        encode_sequence(state, self);
    }
}

impl<T: Decode, const N: usize> Decode for [T; N] {
    fn decode(state: State) -> Result<Self> {
        let items = decode_sequence::<T>(state)?;
        let len = items.len();
        items.try_into().map_err(|_| {
            Error::incorrect_type(format!("table of {N} elements"), format!("table of {len} elements"))
        })
    }
}
