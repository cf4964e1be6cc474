//! Deferred calls
//!
//! [`Session::call_global`](crate::Session::call_global) does not run
//! anything by itself. It returns a [`Call`] that waits until the caller says
//! what it wants back:
//!
//! - [`Call::get`] runs the function asking for one result and decodes it
//! - [`Call::invoke`] runs it asking for no results
//! - dropping the `Call` unresolved runs it asking for no results
//!
//! Either way the function runs exactly once. Both resolving methods consume
//! the descriptor, so a second resolution cannot be written.
//!
//! A descriptor dropped while its thread is already panicking does not run
//! script code; the call is skipped and a warning is logged.

use crate::error::Result;
use crate::session::Session;
use crate::stack::State;
use crate::value::{Decode, Encode, pop, push};
use std::ffi::c_int;

/// An argument list for a script function call
///
/// Implemented for `()` and for tuples of up to twelve [`Encode`] values;
/// each element is passed as its own argument.
pub trait CallArgs {
    /// Push the arguments in order and return how many there are
    fn push_args(self, state: State) -> c_int;
}

impl CallArgs for () {
    fn push_args(self, _state: State) -> c_int {
        0
    }
}

macro_rules! call_args {
    ($arity:literal; $($name:ident . $idx:tt),+) => {
        impl<$($name: Encode),+> CallArgs for ($($name,)+) {
            fn push_args(self, state: State) -> c_int {
                $( push(state, &self.$idx); )+
                $arity
            }
        }
    };
}

call_args!(1; A.0);
call_args!(2; A.0, B.1);
call_args!(3; A.0, B.1, C.2);
call_args!(4; A.0, B.1, C.2, D.3);
call_args!(5; A.0, B.1, C.2, D.3, E.4);
call_args!(6; A.0, B.1, C.2, D.3, E.4, F.5);
call_args!(7; A.0, B.1, C.2, D.3, E.4, F.5, G.6);
call_args!(8; A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7);
call_args!(9; A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7, I.8);
call_args!(10; A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7, I.8, J.9);
call_args!(11; A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7, I.8, J.9, K.10);
call_args!(12; A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7, I.8, J.9, K.10, L.11);

/// A pending call of a global script function
pub struct Call<'s, A: CallArgs> {
    session: &'s Session,
    name: String,
    /// Taken when the call runs; `None` means resolved
    args: Option<A>,
}

impl<'s, A: CallArgs> Call<'s, A> {
    pub(crate) fn new(session: &'s Session, name: &str, args: A) -> Self {
        Self {
            session,
            name: name.to_string(),
            args: Some(args),
        }
    }

    /// Name of the global being called
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the call and decode its single result
    pub fn get<T: Decode>(mut self) -> Result<T> {
        let args = self.take_args();
        let state = self.session.state();
        self.session.call_function(&self.name, args, 1)?;
        pop::<T>(state)
    }

    /// Run the call, discarding any results
    pub fn invoke(mut self) -> Result<()> {
        let args = self.take_args();
        self.session.call_function(&self.name, args, 0)
    }

    fn take_args(&mut self) -> A {
        match self.args.take() {
            Some(args) => args,
            None => unreachable!("call to `{}` resolved twice", self.name),
        }
    }
}

impl<A: CallArgs> Drop for Call<'_, A> {
    fn drop(&mut self) {
        let Some(args) = self.args.take() else {
            return;
        };
        // Don't run script code while unwinding
        if std::thread::panicking() {
            tracing::warn!(function = %self.name, "deferred call skipped during panic");
            return;
        }
        if let Err(err) = self.session.call_function(&self.name, args, 0) {
            tracing::error!(function = %self.name, error = %err, "deferred call failed");
        }
    }
}
