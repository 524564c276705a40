//! Stack growth for the recursive passes.
//!
//! The parser, the resolver and the interpreter all recurse once per level of
//! source nesting.  Each recursive entry point goes through
//! [`ensure_sufficient_stack`], so deeply nested programs run on freshly
//! allocated stack segments instead of overflowing the thread's stack.

/// If less than this remains, the stack is grown.
const RED_ZONE: usize = 100 * 1024;

/// Size of each freshly allocated stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Runs `f`, first moving to a new stack segment if the current one is
/// nearly exhausted.
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
