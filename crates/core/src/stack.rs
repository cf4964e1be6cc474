//! Engine Boundary
//!
//! Thin, typed wrappers over the Lua C API. This is the only module that
//! talks to the interpreter directly; everything above it works in terms of
//! [`State`], [`Tag`], [`Status`] and [`StackGuard`].
//!
//! Stack effects are written in the usual `( before -- after )` notation,
//! describing the top of the engine's value stack.
//!
//! Table and global accesses are raw (no metamethods), so none of the
//! operations here can raise a script error outside a protected call.

use mlua_sys as ffi;
use std::ffi::{CStr, c_char, c_int};
use std::ptr::{self, NonNull};

/// The interpreter's opaque state type
pub type RawState = ffi::lua_State;

/// The engine's native-callable convention: take the state, return the
/// number of results pushed
pub type NativeFn = ffi::lua_CFunction;

/// Status reported by the auxiliary file loader (one past the core codes)
const LUA_ERRFILE: c_int = ffi::LUA_ERRERR + 1;

/// Status code of a load or protected call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Yield,
    Runtime,
    Syntax,
    Memory,
    ErrorHandler,
    File,
    Unknown(c_int),
}

impl Status {
    pub fn from_code(code: c_int) -> Self {
        match code {
            ffi::LUA_OK => Status::Ok,
            ffi::LUA_YIELD => Status::Yield,
            ffi::LUA_ERRRUN => Status::Runtime,
            ffi::LUA_ERRSYNTAX => Status::Syntax,
            ffi::LUA_ERRMEM => Status::Memory,
            ffi::LUA_ERRERR => Status::ErrorHandler,
            LUA_ERRFILE => Status::File,
            other => Status::Unknown(other),
        }
    }

    /// True for a successful load or call
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

/// Runtime type tag of a stack slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// The index does not refer to a slot
    None,
    Nil,
    Bool,
    Number,
    String,
    Table,
    Function,
    Userdata,
    Thread,
}

impl Tag {
    fn from_code(code: c_int) -> Self {
        match code {
            ffi::LUA_TNIL => Tag::Nil,
            ffi::LUA_TBOOLEAN => Tag::Bool,
            ffi::LUA_TNUMBER => Tag::Number,
            ffi::LUA_TSTRING => Tag::String,
            ffi::LUA_TTABLE => Tag::Table,
            ffi::LUA_TFUNCTION => Tag::Function,
            ffi::LUA_TUSERDATA | ffi::LUA_TLIGHTUSERDATA => Tag::Userdata,
            ffi::LUA_TTHREAD => Tag::Thread,
            _ => Tag::None,
        }
    }

    /// The engine's own name for the tag (as `type()` reports it)
    pub fn name(self) -> &'static str {
        match self {
            Tag::None => "no value",
            Tag::Nil => "nil",
            Tag::Bool => "boolean",
            Tag::Number => "number",
            Tag::String => "string",
            Tag::Table => "table",
            Tag::Function => "function",
            Tag::Userdata => "userdata",
            Tag::Thread => "thread",
        }
    }
}

/// Handle to a live interpreter state
///
/// `State` is a plain pointer wrapper: copying it does not copy the engine.
/// Every method assumes the pointer is live, which `from_raw`'s contract
/// (and [`crate::Session`]'s ownership of the engine) guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct State(NonNull<RawState>);

impl State {
    /// Wrap a raw engine pointer
    ///
    /// Returns `None` for a null pointer.
    ///
    /// # Safety
    /// `raw` must point to a live interpreter state for as long as the
    /// returned handle (or any copy of it) is used.
    pub unsafe fn from_raw(raw: *mut RawState) -> Option<Self> {
        NonNull::new(raw).map(State)
    }

    /// The raw engine pointer
    pub fn as_ptr(self) -> *mut RawState {
        self.0.as_ptr()
    }

    /// Create a fresh engine instance
    ///
    /// Returns `None` when the engine cannot allocate its state.
    pub fn create() -> Option<Self> {
        // SAFETY: luaL_newstate has no preconditions
        let raw = unsafe { ffi::luaL_newstate() };
        // SAFETY: a non-null result is a fresh, live state
        unsafe { Self::from_raw(raw) }
    }

    /// Destroy the engine
    ///
    /// # Safety
    /// No copy of this handle may be used afterwards.
    pub unsafe fn close(self) {
        unsafe { ffi::lua_close(self.as_ptr()) }
    }

    /// Open the engine's standard libraries
    pub fn open_libs(self) {
        unsafe { ffi::luaL_openlibs(self.as_ptr()) }
    }

    // ------------------------------------------------------------------
    // Stack shape
    // ------------------------------------------------------------------

    /// Number of slots in the current frame
    pub fn top(self) -> c_int {
        unsafe { ffi::lua_gettop(self.as_ptr()) }
    }

    /// Truncate (or nil-extend) the current frame to `top` slots
    pub fn set_top(self, top: c_int) {
        unsafe { ffi::lua_settop(self.as_ptr(), top) }
    }

    /// Stack effect: ( v1 .. vn -- )
    pub fn pop(self, count: c_int) {
        self.set_top(-count - 1);
    }

    /// Convert a relative index into one that survives pushes
    pub fn abs_index(self, index: c_int) -> c_int {
        unsafe { ffi::lua_absindex(self.as_ptr(), index) }
    }

    /// Stack effect: ( -- copy-of-slot )
    pub fn push_copy(self, index: c_int) {
        unsafe { ffi::lua_pushvalue(self.as_ptr(), index) }
    }

    /// Remove the slot at `index`, shifting the slots above it down
    pub fn remove(self, index: c_int) {
        unsafe {
            ffi::lua_rotate(self.as_ptr(), index, -1);
            ffi::lua_settop(self.as_ptr(), -2);
        }
    }

    /// Move the top value down to `index`, shifting the slots above it up
    pub fn insert(self, index: c_int) {
        unsafe { ffi::lua_rotate(self.as_ptr(), index, 1) }
    }

    /// Make sure `slots` more values can be pushed
    pub fn reserve(self, slots: c_int) -> bool {
        unsafe { ffi::lua_checkstack(self.as_ptr(), slots) != 0 }
    }

    pub fn tag(self, index: c_int) -> Tag {
        Tag::from_code(unsafe { ffi::lua_type(self.as_ptr(), index) })
    }

    // ------------------------------------------------------------------
    // Primitives
    // ------------------------------------------------------------------

    /// Stack effect: ( -- nil )
    pub fn push_nil(self) {
        unsafe { ffi::lua_pushnil(self.as_ptr()) }
    }

    /// Stack effect: ( -- bool )
    pub fn push_bool(self, value: bool) {
        unsafe { ffi::lua_pushboolean(self.as_ptr(), c_int::from(value)) }
    }

    /// Stack effect: ( -- number )
    pub fn push_number(self, value: f64) {
        unsafe { ffi::lua_pushnumber(self.as_ptr(), value) }
    }

    /// Stack effect: ( -- string )
    pub fn push_text(self, value: &str) {
        self.push_bytes(value.as_bytes());
    }

    /// Stack effect: ( -- string )
    ///
    /// The engine copies the bytes; embedded NULs are preserved.
    pub fn push_bytes(self, value: &[u8]) {
        unsafe {
            ffi::lua_pushlstring(self.as_ptr(), value.as_ptr().cast::<c_char>(), value.len());
        }
    }

    /// Stack effect: ( -- function )
    pub fn push_native_fn(self, func: NativeFn) {
        unsafe { ffi::lua_pushcclosure(self.as_ptr(), func, 0) }
    }

    pub fn is_bool(self, index: c_int) -> bool {
        self.tag(index) == Tag::Bool
    }

    pub fn is_number(self, index: c_int) -> bool {
        self.tag(index) == Tag::Number
    }

    /// True only for genuine strings
    ///
    /// Unlike the engine's `lua_isstring`, numbers (which the engine would
    /// happily coerce) do not count.
    pub fn is_text(self, index: c_int) -> bool {
        self.tag(index) == Tag::String
    }

    pub fn is_table(self, index: c_int) -> bool {
        self.tag(index) == Tag::Table
    }

    pub fn is_function(self, index: c_int) -> bool {
        self.tag(index) == Tag::Function
    }

    pub fn to_bool(self, index: c_int) -> bool {
        unsafe { ffi::lua_toboolean(self.as_ptr(), index) != 0 }
    }

    pub fn to_number(self, index: c_int) -> f64 {
        unsafe { ffi::lua_tonumberx(self.as_ptr(), index, ptr::null_mut()) }
    }

    /// Copy the bytes of a string slot
    ///
    /// Returns `None` for anything that is not a genuine string; numbers are
    /// not converted (which would also rewrite the slot in place).
    pub fn to_bytes(self, index: c_int) -> Option<Vec<u8>> {
        if !self.is_text(index) {
            return None;
        }
        let mut len = 0usize;
        unsafe {
            let data = ffi::lua_tolstring(self.as_ptr(), index, &mut len);
            if data.is_null() {
                return None;
            }
            Some(std::slice::from_raw_parts(data.cast::<u8>(), len).to_vec())
        }
    }

    // ------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------

    /// Stack effect: ( -- table )
    pub fn create_table(self, sequence_hint: usize, keyed_hint: usize) {
        let narr = c_int::try_from(sequence_hint).unwrap_or(c_int::MAX);
        let nrec = c_int::try_from(keyed_hint).unwrap_or(c_int::MAX);
        unsafe { ffi::lua_createtable(self.as_ptr(), narr, nrec) }
    }

    /// Store the top value at `table[position]`
    ///
    /// Stack effect: ( v -- )
    pub fn set_indexed(self, table: c_int, position: usize) {
        let table = self.abs_index(table);
        unsafe { ffi::lua_rawseti(self.as_ptr(), table, lua_position(position)) }
    }

    /// Push `table[position]`
    ///
    /// Stack effect: ( -- v )
    pub fn get_indexed(self, table: c_int, position: usize) -> Tag {
        let table = self.abs_index(table);
        Tag::from_code(unsafe { ffi::lua_rawgeti(self.as_ptr(), table, lua_position(position)) })
    }

    /// Store the top value at `table[name]`
    ///
    /// Stack effect: ( v -- )
    pub fn set_keyed(self, table: c_int, name: &str) {
        let table = self.abs_index(table);
        self.push_text(name);
        unsafe {
            // ( v k -- k v )
            ffi::lua_rotate(self.as_ptr(), -2, 1);
            ffi::lua_rawset(self.as_ptr(), table);
        }
    }

    /// Push `table[name]`
    ///
    /// Stack effect: ( -- v )
    pub fn get_keyed(self, table: c_int, name: &str) -> Tag {
        let table = self.abs_index(table);
        self.push_text(name);
        Tag::from_code(unsafe { ffi::lua_rawget(self.as_ptr(), table) })
    }

    /// Length of the sequence part of a table (the `#` border, without metamethods)
    pub fn raw_len(self, index: c_int) -> usize {
        unsafe { ffi::lua_rawlen(self.as_ptr(), index) as usize }
    }

    // ------------------------------------------------------------------
    // Globals
    // ------------------------------------------------------------------

    /// Stack effect: ( -- globals )
    fn push_globals(self) {
        unsafe {
            ffi::lua_rawgeti(
                self.as_ptr(),
                ffi::LUA_REGISTRYINDEX,
                ffi::LUA_RIDX_GLOBALS as ffi::lua_Integer,
            );
        }
    }

    /// Push the global `name`
    ///
    /// Stack effect: ( -- v )
    pub fn get_global(self, name: &str) -> Tag {
        self.push_globals();
        let globals = self.top();
        let tag = self.get_keyed(globals, name);
        self.remove(globals);
        tag
    }

    /// Bind the top value to the global `name`
    ///
    /// Stack effect: ( v -- )
    pub fn set_global(self, name: &str) {
        self.push_globals();
        unsafe {
            // ( v globals -- globals v )
            ffi::lua_rotate(self.as_ptr(), -2, 1);
        }
        let globals = self.top() - 1;
        self.set_keyed(globals, name);
        self.pop(1);
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Compile source text into a function
    ///
    /// Stack effect: ( -- function ) on success, ( -- message ) on failure.
    /// Only text chunks are accepted; precompiled bytecode is refused.
    pub fn load_source(self, source: &str, chunk_name: &CStr) -> Status {
        Status::from_code(unsafe {
            ffi::luaL_loadbufferx(
                self.as_ptr(),
                source.as_ptr().cast::<c_char>(),
                source.len(),
                chunk_name.as_ptr(),
                c"t".as_ptr(),
            )
        })
    }

    /// Compile a script file into a function
    ///
    /// Stack effect: ( -- function ) on success, ( -- message ) on failure.
    pub fn load_file(self, path: &CStr) -> Status {
        Status::from_code(unsafe {
            ffi::luaL_loadfilex(self.as_ptr(), path.as_ptr(), c"t".as_ptr())
        })
    }

    /// Protected call of the function sitting below `args` arguments
    ///
    /// `handler` is the stack index of a message handler, or 0 for none.
    ///
    /// Stack effect: ( f a1 .. an -- r1 .. rm ) on success,
    /// ( f a1 .. an -- message ) on failure.
    pub fn call_function(self, args: c_int, results: c_int, handler: c_int) -> Status {
        Status::from_code(unsafe {
            ffi::lua_pcallk(self.as_ptr(), args, results, handler, 0, None)
        })
    }

    /// Render the error value at `index` as text
    pub fn error_message(self, index: c_int) -> String {
        match self.tag(index) {
            Tag::String | Tag::Number => {
                let mut len = 0usize;
                unsafe {
                    let data = ffi::lua_tolstring(self.as_ptr(), index, &mut len);
                    if data.is_null() {
                        return String::new();
                    }
                    let bytes = std::slice::from_raw_parts(data.cast::<u8>(), len);
                    String::from_utf8_lossy(bytes).into_owned()
                }
            }
            other => format!("(error object is a {} value)", other.name()),
        }
    }

    /// Raise `message` as a script error from inside a native function
    ///
    /// The message is copied onto the stack and dropped before control
    /// leaves through the engine, which does not run Rust destructors.
    ///
    /// # Safety
    /// Must only be called from a native function invoked by the engine,
    /// with no live values that need dropping in the calling frames.
    pub unsafe fn raise_error(self, message: String) -> c_int {
        self.push_text(&message);
        drop(message);
        unsafe { ffi::lua_error(self.as_ptr()) }
    }
}

fn lua_position(position: usize) -> ffi::lua_Integer {
    ffi::lua_Integer::try_from(position).unwrap_or(ffi::lua_Integer::MAX)
}

/// Message handler that appends a stack traceback to string errors
///
/// Installed below the callee of a protected call when tracebacks are
/// enabled. Non-string error objects pass through untouched.
pub(crate) unsafe extern "C-unwind" fn traceback_handler(raw: *mut RawState) -> c_int {
    unsafe {
        if ffi::lua_type(raw, 1) != ffi::LUA_TSTRING {
            return 1;
        }
        let message = ffi::lua_tolstring(raw, 1, ptr::null_mut());
        ffi::luaL_traceback(raw, raw, message, 1);
        1
    }
}

/// RAII guard for the stack-balance invariant
///
/// Remembers a base depth and, when dropped while armed, truncates the stack
/// back to it. Success paths that must leave values behind disarm it with
/// [`StackGuard::keep`]; everything else (errors, panics, early returns)
/// restores the base.
#[derive(Debug)]
pub struct StackGuard {
    state: State,
    base: c_int,
    armed: bool,
}

impl StackGuard {
    /// Guard the current depth
    pub fn new(state: State) -> Self {
        Self::with_base(state, state.top())
    }

    /// Guard an explicit base depth
    pub fn with_base(state: State, base: c_int) -> Self {
        Self {
            state,
            base,
            armed: true,
        }
    }

    /// Depth the guard restores to
    pub fn base(&self) -> c_int {
        self.base
    }

    /// Slots currently above the base
    pub fn depth(&self) -> c_int {
        self.state.top() - self.base
    }

    /// Debug-check that exactly `extra` slots sit above the base
    pub fn expect(&self, extra: c_int) {
        debug_assert_eq!(
            self.depth(),
            extra,
            "stack imbalance: expected {} slot(s) above base {}",
            extra,
            self.base
        );
    }

    /// Disarm the guard, leaving `extra` slots above the base
    pub fn keep(mut self, extra: c_int) {
        self.expect(extra);
        self.armed = false;
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        if self.armed {
            self.state.set_top(self.base);
        }
    }
}
