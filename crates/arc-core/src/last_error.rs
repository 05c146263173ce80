//! Thread-confined last-error channel.
//!
//! Bindings report failures here as `"<function>: <cause>"` strings. The
//! cell is thread-local, which is exactly the confinement the runtime
//! wants: only the main thread runs bindings, and a stray read from another
//! thread can never observe its errors.

use std::cell::RefCell;

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Records a binding failure. Successful calls never touch the cell.
pub fn set_last_error(function: &str, cause: impl std::fmt::Display) {
    LAST_ERROR.with(|cell| {
        *cell.borrow_mut() = Some(format!("{}: {}", function, cause));
    });
}

/// Returns the current last-error string, or an empty string if clear.
pub fn last_error() -> String {
    LAST_ERROR.with(|cell| cell.borrow().clone().unwrap_or_default())
}

/// Clears and returns the current last-error string, if any.
pub fn take_last_error() -> Option<String> {
    LAST_ERROR.with(|cell| cell.borrow_mut().take())
}

pub fn clear_last_error() {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = None);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_clear() {
        clear_last_error();
        assert_eq!(last_error(), "");

        set_last_error("gfx.arc", "radius must be positive");
        assert_eq!(last_error(), "gfx.arc: radius must be positive");

        // Reads do not clear.
        assert_eq!(last_error(), "gfx.arc: radius must be positive");

        clear_last_error();
        assert_eq!(last_error(), "");
    }

    #[test]
    fn confined_to_thread() {
        set_last_error("fs.readText", "not found");
        std::thread::spawn(|| {
            assert_eq!(last_error(), "");
        })
        .join()
        .unwrap();
        assert_eq!(last_error(), "fs.readText: not found");
    }
}
