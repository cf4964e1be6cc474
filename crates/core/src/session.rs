//! Session
//!
//! The host-side handle to one engine instance.
//!
//! A session either owns its engine (created by [`Session::new`] or
//! [`Session::with_config`], closed when the session is dropped) or borrows
//! one the embedding application already has ([`Session::from_raw`], never
//! closed by the session).
//!
//! Every operation leaves the engine's stack exactly as deep as it found it,
//! whether it succeeds or fails. Script failures come back as [`Error`]
//! values and leave the session usable.
//!
//! Operations take `&self`. A host callable that needs to run more script
//! code captures an `Rc<Session>` and calls back in; nested calls keep the
//! same balance guarantee relative to the frame they start in.

use crate::call::{Call, CallArgs};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::module::Module;
use crate::stack::{RawState, StackGuard, State, Status, Tag, traceback_handler};
use crate::value::{Decode, Encode, pop, push, reserve};
use std::ffi::{CString, c_int};
use std::path::Path;

/// A handle to one engine instance
pub struct Session {
    state: State,
    owned: bool,
    traceback: bool,
    chunk_name: CString,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state.as_ptr())
            .field("owned", &self.owned)
            .field("top", &self.top())
            .finish()
    }
}

impl Session {
    /// Create and own a fresh engine with the standard libraries open
    pub fn new() -> Result<Self> {
        Self::with_config(SessionConfig::default())
    }

    /// Create and own a fresh engine set up per `config`
    pub fn with_config(config: SessionConfig) -> Result<Self> {
        let chunk_name = config
            .chunk_name_cstr()
            .map_err(|e| Error::Runtime(format!("invalid session config: {e}")))?;
        let state =
            State::create().ok_or_else(|| Error::Memory("cannot allocate engine state".into()))?;
        if config.open_libs {
            state.open_libs();
        }
        tracing::debug!(owned = true, open_libs = config.open_libs, "session created");
        Ok(Self {
            state,
            owned: true,
            traceback: config.traceback,
            chunk_name,
        })
    }

    /// Borrow an engine the caller owns
    ///
    /// The session never closes a borrowed engine. Returns `None` for a null
    /// pointer.
    ///
    /// # Safety
    /// `raw` must be a live engine state that outlives the session, used
    /// only from this thread while the session exists.
    pub unsafe fn from_raw(raw: *mut RawState) -> Option<Self> {
        // SAFETY: forwarded from the caller
        let state = unsafe { State::from_raw(raw) }?;
        tracing::debug!(owned = false, "session created");
        Some(Self {
            state,
            owned: false,
            traceback: false,
            chunk_name: CString::from(c"=chunk"),
        })
    }

    /// The underlying engine pointer
    pub fn as_raw(&self) -> *mut RawState {
        self.state.as_ptr()
    }

    /// The stack handle, for working with the codec directly
    pub fn state(&self) -> State {
        self.state
    }

    /// True when dropping the session closes the engine
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Current stack depth
    pub fn top(&self) -> c_int {
        self.state.top()
    }

    /// Compile and run source text
    ///
    /// Parse failures are [`Error::Syntax`]; failures while running are
    /// [`Error::Runtime`]. Returns the session so scripts can be chained.
    pub fn run_source(&self, source: &str) -> Result<&Self> {
        let guard = StackGuard::new(self.state);
        reserve(self.state);
        let status = self.state.load_source(source, &self.chunk_name);
        if !status.is_ok() {
            return Err(self.failure(status));
        }
        self.protected_call(0, 0)?;
        guard.keep(0);
        Ok(self)
    }

    /// Compile and run a script file
    ///
    /// A file that cannot be opened or read is [`Error::File`].
    pub fn run_file(&self, path: impl AsRef<Path>) -> Result<&Self> {
        let path = path.as_ref();
        let path = path
            .to_str()
            .and_then(|p| CString::new(p).ok())
            .ok_or_else(|| Error::File(format!("unusable script path {}", path.display())))?;

        let guard = StackGuard::new(self.state);
        reserve(self.state);
        let status = self.state.load_file(&path);
        if !status.is_ok() {
            return Err(self.failure(status));
        }
        self.protected_call(0, 0)?;
        guard.keep(0);
        Ok(self)
    }

    /// Read a global and decode it
    pub fn get_global<T: Decode>(&self, name: &str) -> Result<T> {
        reserve(self.state);
        self.state.get_global(name);
        pop::<T>(self.state)
    }

    /// Encode a value and bind it to a global
    ///
    /// Host callables go through [`adapt!`](crate::adapt!) first, which
    /// turns them into an encodable [`NativeFunction`](crate::NativeFunction).
    pub fn set_global<T: Encode + ?Sized>(&self, name: &str, value: &T) -> &Self {
        push(self.state, value);
        self.state.set_global(name);
        self
    }

    /// Prepare a call of the global function `name`
    ///
    /// Nothing runs until the returned [`Call`] is resolved with
    /// [`Call::get`] or [`Call::invoke`], or dropped (which runs the call and
    /// discards its results).
    pub fn call_global<A: CallArgs>(&self, name: &str, args: A) -> Call<'_, A> {
        Call::new(self, name, args)
    }

    /// Expose a module as a global table and as `package.loaded[name]`
    ///
    /// The second binding makes `require(name)` return the module. Without
    /// the standard libraries there is no `package` table and only the
    /// global is set.
    pub fn load_module(&self, module: &Module) -> &Self {
        let state = self.state;
        let guard = StackGuard::new(state);
        push(state, module);
        let table = state.top();

        state.push_copy(table);
        state.set_global(module.name());

        reserve(state);
        if state.get_global("package") == Tag::Table
            && state.get_keyed(-1, "loaded") == Tag::Table
        {
            state.push_copy(table);
            state.set_keyed(-2, module.name());
        }
        tracing::debug!(module = module.name(), functions = module.len(), "module loaded");
        drop(guard);
        self
    }

    /// Close the session now
    ///
    /// Same as dropping it; an owned engine is destroyed, a borrowed one is
    /// left alone.
    pub fn close(self) {
        drop(self);
    }

    /// Run the global function `name` with `args`, leaving `results` values
    ///
    /// Stack effect: ( -- r1 .. rn ) on success, ( -- ) on failure.
    pub(crate) fn call_function<A: CallArgs>(
        &self,
        name: &str,
        args: A,
        results: c_int,
    ) -> Result<()> {
        let state = self.state;
        let guard = StackGuard::new(state);
        reserve(state);
        state.get_global(name);
        let count = args.push_args(state);
        self.protected_call(count, results)?;
        guard.keep(results);
        Ok(())
    }

    /// Protected call of the function below the top `args` values
    ///
    /// Stack effect: ( f a1 .. an -- r1 .. rm ) on success,
    /// ( f a1 .. an -- ) on failure.
    fn protected_call(&self, args: c_int, results: c_int) -> Result<()> {
        let state = self.state;
        let function = state.top() - args;
        let handler = if self.traceback {
            reserve(state);
            state.push_native_fn(traceback_handler);
            state.insert(function);
            function
        } else {
            0
        };

        let status = state.call_function(args, results, handler);
        if handler != 0 {
            state.remove(handler);
        }
        if status.is_ok() {
            Ok(())
        } else {
            Err(self.failure(status))
        }
    }

    /// Consume the error value on top of the stack
    fn failure(&self, status: Status) -> Error {
        let message = self.state.error_message(-1);
        self.state.pop(1);
        tracing::debug!(status = ?status, message = %message, "script failed");
        Error::from_status(status, message)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        tracing::debug!(owned = self.owned, "session closed");
        if self.owned {
            // SAFETY: an owned state was created by this session and no
            // handle to it escapes the session's lifetime
            unsafe { self.state.close() };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_session_basics() {
        let session = Session::new().unwrap();
        assert!(session.is_owned());
        assert_eq!(session.top(), 0);

        session.set_global("answer", &42_i32);
        assert_eq!(session.get_global::<i32>("answer").unwrap(), 42);
        assert_eq!(session.top(), 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SessionConfig::new().with_chunk_name("");
        let err = Session::with_config(config).unwrap_err();
        assert!(matches!(err, Error::Runtime(msg) if msg.contains("chunk_name")));
    }

    #[test]
    fn test_chunk_name_in_errors() {
        let session = Session::with_config(SessionConfig::new().with_chunk_name("=setup")).unwrap();
        let err = session.run_source("error('bad')").unwrap_err();
        assert_eq!(err, Error::Runtime("setup:1: bad".into()));
    }

    #[test]
    fn test_traceback_is_appended() {
        let session = Session::with_config(SessionConfig::new().with_traceback(true)).unwrap();
        let err = session.run_source("local function f() error('deep') end f()").unwrap_err();
        match err {
            Error::Runtime(msg) => {
                assert!(msg.starts_with("chunk:1: deep"), "{msg}");
                assert!(msg.contains("stack traceback:"), "{msg}");
            }
            other => panic!("expected runtime error, got {other:?}"),
        }
        assert_eq!(session.top(), 0);
    }

    #[test]
    fn test_without_libs() {
        let session = Session::with_config(SessionConfig::new().with_open_libs(false)).unwrap();
        let err = session.run_source("print('x')").unwrap_err();
        assert!(matches!(err, Error::Runtime(_)));
        assert_eq!(session.top(), 0);
    }

    #[test]
    fn test_non_string_error_objects() {
        let session = Session::new().unwrap();
        let err = session.run_source("error({})").unwrap_err();
        assert_eq!(err, Error::Runtime("(error object is a table value)".into()));
    }
}
