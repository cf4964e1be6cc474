//! Callable Adapter
//!
//! Turns host callables into functions the engine can invoke.
//!
//! The engine only understands one native signature: take the state, return
//! how many results were pushed. [`adapt`] stores a host callable in a
//! per-thread slot and hands back a [`NativeFunction`] whose entry point is a
//! trampoline monomorphized for that callable. When the engine calls it, the
//! trampoline looks the callable up again, decodes the arguments, invokes it
//! and encodes the result.
//!
//! # Slot identity
//!
//! A slot is keyed by the callable's type, its argument types and a
//! call-site token type. The [`adapt!`](crate::adapt!) macro declares a fresh
//! token at every expansion, so two `fn(f64) -> f64` pointers adapted in
//! different places get different slots. Adapting again at the same place
//! replaces what that slot holds, and every function already handed out from
//! that place then calls the replacement.
//!
//! # Errors
//!
//! Decode failures, `Err` results and panics all become script errors raised
//! in the calling script. Nothing unwinds into the engine.

use crate::error::{Error, Result, format_panic_payload};
use crate::kind::{Classify, Kind};
use crate::stack::{NativeFn, RawState, State};
use crate::value::{Decode, Encode, pop, push};
use std::any::{Any, TypeId, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_int;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

thread_local! {
    /// Durable storage for adapted callables, one slot per identity
    ///
    /// Slots are never removed: a function value may outlive every host
    /// handle to it inside the engine.
    static SLOTS: RefCell<HashMap<TypeId, Rc<dyn Any>>> = RefCell::new(HashMap::new());
}

/// A host callable with a fixed argument list
///
/// Implemented for every `Fn` of up to ten [`Decode`] arguments whose return
/// type is [`Returns`]. `Args` is the argument tuple and only exists to keep
/// the impls for different arities apart.
pub trait HostFn<Args>: 'static {
    /// Number of arguments the engine must pass
    const ARITY: usize;

    /// Decode the arguments from slots `1..=ARITY`, invoke, encode the result
    ///
    /// Returns the number of results left on the stack.
    fn call(&self, state: State) -> Result<c_int>;
}

/// What a host callable can hand back to a script
pub trait Returns {
    /// Push the results and report how many there are
    fn push_results(self, state: State) -> Result<c_int>;
}

impl Returns for () {
    fn push_results(self, _state: State) -> Result<c_int> {
        Ok(0)
    }
}

impl<T: Encode> Returns for T {
    fn push_results(self, state: State) -> Result<c_int> {
        push(state, &self);
        Ok(1)
    }
}

impl<T: Returns, E: fmt::Display> Returns for std::result::Result<T, E> {
    fn push_results(self, state: State) -> Result<c_int> {
        match self {
            Ok(value) => value.push_results(state),
            Err(err) => Err(Error::Runtime(err.to_string())),
        }
    }
}

macro_rules! host_fn {
    ($arity:literal; $($arg:ident),*) => {
        impl<Func, Ret, $($arg,)*> HostFn<($($arg,)*)> for Func
        where
            Func: Fn($($arg),*) -> Ret + 'static,
            Ret: Returns,
            $($arg: Decode,)*
        {
            const ARITY: usize = $arity;

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn call(&self, state: State) -> Result<c_int> {
                let mut argument = 0;
                $(
                    argument += 1;
                    state.push_copy(argument);
                    let $arg = pop::<$arg>(state).map_err(|e| e.at_argument(argument as usize))?;
                )*
                (self)($($arg),*).push_results(state)
            }
        }
    };
}

host_fn!(0;);
host_fn!(1; A);
host_fn!(2; A, B);
host_fn!(3; A, B, C);
host_fn!(4; A, B, C, D);
host_fn!(5; A, B, C, D, E);
host_fn!(6; A, B, C, D, E, F);
host_fn!(7; A, B, C, D, E, F, G);
host_fn!(8; A, B, C, D, E, F, G, H);
host_fn!(9; A, B, C, D, E, F, G, H, I);
host_fn!(10; A, B, C, D, E, F, G, H, I, J);

/// An engine-callable function value
///
/// Encodes as a function; produced by [`adapt`] or wrapped around an
/// existing native entry point with [`NativeFunction::from_raw`].
#[derive(Clone, Copy)]
pub struct NativeFunction {
    entry: NativeFn,
}

impl NativeFunction {
    /// Wrap an existing native entry point
    pub fn from_raw(entry: NativeFn) -> Self {
        Self { entry }
    }

    /// The entry point the engine calls
    pub fn entry(self) -> NativeFn {
        self.entry
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("entry", &(self.entry as *const ()))
            .finish()
    }
}

impl Classify for NativeFunction {
    const KIND: Kind = Kind::Callable;
}

impl Encode for NativeFunction {
    fn encode(&self, state: State) {
        state.push_native_fn(self.entry);
    }
}

/// Store `func` in the slot for `(F, Args, Site)` and return its entry point
///
/// `Site` is the identity token; [`adapt!`](crate::adapt!) supplies a fresh
/// one per call site.
pub fn adapt<F, Args, Site>(func: F) -> NativeFunction
where
    F: HostFn<Args>,
    Args: 'static,
    Site: 'static,
{
    tracing::debug!(
        site = type_name::<Site>(),
        arity = F::ARITY,
        "registering host function"
    );
    SLOTS.with(|slots| {
        slots
            .borrow_mut()
            .insert(TypeId::of::<(F, Args, Site)>(), Rc::new(func));
    });
    NativeFunction {
        entry: trampoline::<F, Args, Site>,
    }
}

/// Adapt a host callable with an identity token unique to this call site
///
/// ```ignore
/// let twice = luabind::adapt!(|x: f64| x * 2.0);
/// session.set_global("timesTwo", &twice);
/// ```
#[macro_export]
macro_rules! adapt {
    ($func:expr $(,)?) => {{
        enum CallSite {}
        $crate::function::adapt::<_, _, CallSite>($func)
    }};
}

fn lookup<F: 'static, Args: 'static, Site: 'static>() -> Option<Rc<F>> {
    // Clone out so the map is not borrowed while the callable runs
    let slot = SLOTS.with(|slots| {
        slots
            .borrow()
            .get(&TypeId::of::<(F, Args, Site)>())
            .cloned()
    })?;
    slot.downcast::<F>().ok()
}

fn invoke<F, Args, Site>(state: State) -> Result<c_int>
where
    F: HostFn<Args>,
    Args: 'static,
    Site: 'static,
{
    let func = lookup::<F, Args, Site>().ok_or_else(|| {
        Error::Runtime(format!(
            "host function {} is not registered on this thread",
            type_name::<Site>()
        ))
    })?;
    let found = state.top();
    tracing::trace!(site = type_name::<Site>(), args = found, "host function entered");
    if found < 0 || found as usize != F::ARITY {
        return Err(Error::incorrect_type(
            format!("{} argument(s)", F::ARITY),
            format!("{found} argument(s)"),
        ));
    }
    func.call(state)
}

/// Entry point the engine calls for an adapted callable
///
/// All Rust values of the invocation are dropped before an error is raised,
/// since raising leaves this frame without running destructors.
unsafe extern "C-unwind" fn trampoline<F, Args, Site>(raw: *mut RawState) -> c_int
where
    F: HostFn<Args>,
    Args: 'static,
    Site: 'static,
{
    // SAFETY: the engine only calls native functions with its live state
    let Some(state) = (unsafe { State::from_raw(raw) }) else {
        return 0;
    };
    let message = match panic::catch_unwind(AssertUnwindSafe(|| invoke::<F, Args, Site>(state))) {
        Ok(Ok(results)) => return results,
        Ok(Err(err)) => err.to_string(),
        Err(payload) => format!(
            "host function panicked: {}",
            format_panic_payload(&*payload)
        ),
    };
    tracing::debug!(site = type_name::<Site>(), error = %message, "raising host function error");
    // SAFETY: called from the engine, and nothing else in this frame needs dropping
    unsafe { state.raise_error(message) }
}
