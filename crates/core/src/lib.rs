//! luabind: compile-time type marshalling between Rust and embedded Lua
//!
//! This crate moves host values onto and off the stack of an embedded Lua
//! 5.4 interpreter, and lets scripts call host functions as if they were
//! native. Which codec a type uses is decided by trait resolution at compile
//! time; a type with no codec is a compile error, not a runtime surprise.
//!
//! Key design principles:
//! - Every codec operation changes the engine stack depth by exactly +1
//!   (encode) or -1 (decode), on success, failure and panic alike
//! - Session operations are net-zero on the stack
//! - Script errors are values: a failing script leaves the session usable
//! - Host failures (errors and panics) surface as script errors and never
//!   unwind through the interpreter
//!
//! # Modules
//!
//! - `stack`: Engine boundary (state handle, type tags, status codes, balance guard)
//! - `kind`: Compile-time type classification
//! - `value`: `Encode`/`Decode` and the `push`/`pop` entry points
//! - `aggregate`: Tuples and named-field records as tables
//! - `function`: Host callables as engine functions
//! - `session`: Owned or borrowed engine handle with global access
//! - `call`: Deferred calls of script functions
//! - `module`: Tables of host functions for `require`
//! - `config`: Session configuration
//! - `error`: The crate's error type
//!
//! # Example
//!
//! ```rust,ignore
//! use luabind::{Session, adapt};
//!
//! let session = Session::new()?;
//! session.set_global("timesTwo", &adapt!(|x: f64| x * 2.0));
//! let eight: f64 = session.call_global("timesTwo", (4.0,)).get()?;
//! ```

pub mod aggregate;
pub mod call;
pub mod config;
pub mod error;
pub mod function;
pub mod kind;
pub mod module;
pub mod session;
pub mod stack;
pub mod value;

pub use aggregate::Aggregate;
pub use call::{Call, CallArgs};
pub use config::SessionConfig;
pub use error::{Error, Result};
pub use function::{HostFn, NativeFunction, Returns};
pub use kind::{Classify, Kind};
pub use module::Module;
pub use session::Session;
pub use stack::{StackGuard, State, Status, Tag};
pub use value::{Decode, Encode, pop, push};
