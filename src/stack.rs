//! Native stack growth for the recursive passes.
//!
//! The parser, resolver, AST printer and evaluator all recurse once per
//! level of syntactic nesting.  Each of them wraps its recursive entry points
//! in [`ensure_sufficient_stack`], so a deeply nested but valid program grows
//! the stack instead of aborting the process.

/// If less than this much native stack remains, grow it before recursing.
const RED_ZONE: usize = 128 * 1024;

/// Size of each native stack extension.
const STACK_PER_RECURSION: usize = 2 * 1024 * 1024;

/// Runs `f`, first moving to a fresh stack segment if the current one is
/// nearly exhausted.
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(n: usize) -> usize {
        ensure_sufficient_stack(|| if n == 0 { 0 } else { 1 + depth(n - 1) })
    }

    #[test]
    fn deep_recursion_completes() {
        assert_eq!(depth(200_000), 200_000);
    }
}
