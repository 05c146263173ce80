//! Script-visible key codes.
//!
//! Codes are physical-key (scancode) based and stable across platforms and
//! runtime versions; they are published to cartridges through the constant
//! table. The numbering is frozen: appending is allowed, renumbering is not.

use winit::keyboard::KeyCode;

macro_rules! keys {
    ($(($name:ident, $code:expr, $winit:ident)),+ $(,)?) => {
        /// A physical key, identified by a frozen integer code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum Key {
            $($name = $code,)+
        }

        impl Key {
            /// All keys, for constant-table generation.
            pub const ALL: &'static [Key] = &[$(Key::$name,)+];

            pub fn code(self) -> u32 {
                self as u32
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$name => stringify!($name),)+
                }
            }

            pub fn from_code(code: u32) -> Option<Self> {
                match code {
                    $($code => Some(Self::$name),)+
                    _ => None,
                }
            }

            pub(crate) fn from_keycode(key: KeyCode) -> Option<Self> {
                match key {
                    $(KeyCode::$winit => Some(Self::$name),)+
                    _ => None,
                }
            }
        }
    };
}

keys! {
    // Letters.
    (A, 0, KeyA), (B, 1, KeyB), (C, 2, KeyC), (D, 3, KeyD), (E, 4, KeyE),
    (F, 5, KeyF), (G, 6, KeyG), (H, 7, KeyH), (I, 8, KeyI), (J, 9, KeyJ),
    (K, 10, KeyK), (L, 11, KeyL), (M, 12, KeyM), (N, 13, KeyN), (O, 14, KeyO),
    (P, 15, KeyP), (Q, 16, KeyQ), (R, 17, KeyR), (S, 18, KeyS), (T, 19, KeyT),
    (U, 20, KeyU), (V, 21, KeyV), (W, 22, KeyW), (X, 23, KeyX), (Y, 24, KeyY),
    (Z, 25, KeyZ),
    // Digit row.
    (Digit0, 26, Digit0), (Digit1, 27, Digit1), (Digit2, 28, Digit2),
    (Digit3, 29, Digit3), (Digit4, 30, Digit4), (Digit5, 31, Digit5),
    (Digit6, 32, Digit6), (Digit7, 33, Digit7), (Digit8, 34, Digit8),
    (Digit9, 35, Digit9),
    // Function row.
    (F1, 36, F1), (F2, 37, F2), (F3, 38, F3), (F4, 39, F4), (F5, 40, F5),
    (F6, 41, F6), (F7, 42, F7), (F8, 43, F8), (F9, 44, F9), (F10, 45, F10),
    (F11, 46, F11), (F12, 47, F12),
    // Control keys.
    (Escape, 48, Escape), (Tab, 49, Tab), (CapsLock, 50, CapsLock),
    (ShiftLeft, 51, ShiftLeft), (ShiftRight, 52, ShiftRight),
    (ControlLeft, 53, ControlLeft), (ControlRight, 54, ControlRight),
    (AltLeft, 55, AltLeft), (AltRight, 56, AltRight),
    (SuperLeft, 57, SuperLeft), (SuperRight, 58, SuperRight),
    (Space, 59, Space), (Enter, 60, Enter), (Backspace, 61, Backspace),
    // Navigation block.
    (Insert, 62, Insert), (Delete, 63, Delete), (Home, 64, Home),
    (End, 65, End), (PageUp, 66, PageUp), (PageDown, 67, PageDown),
    (ArrowUp, 68, ArrowUp), (ArrowDown, 69, ArrowDown),
    (ArrowLeft, 70, ArrowLeft), (ArrowRight, 71, ArrowRight),
    // Punctuation.
    (Minus, 72, Minus), (Equal, 73, Equal), (BracketLeft, 74, BracketLeft),
    (BracketRight, 75, BracketRight), (Backslash, 76, Backslash),
    (Semicolon, 77, Semicolon), (Quote, 78, Quote), (Backquote, 79, Backquote),
    (Comma, 80, Comma), (Period, 81, Period), (Slash, 82, Slash),
    // Keypad.
    (Numpad0, 83, Numpad0), (Numpad1, 84, Numpad1), (Numpad2, 85, Numpad2),
    (Numpad3, 86, Numpad3), (Numpad4, 87, Numpad4), (Numpad5, 88, Numpad5),
    (Numpad6, 89, Numpad6), (Numpad7, 90, Numpad7), (Numpad8, 91, Numpad8),
    (Numpad9, 92, Numpad9), (NumpadAdd, 93, NumpadAdd),
    (NumpadSubtract, 94, NumpadSubtract), (NumpadMultiply, 95, NumpadMultiply),
    (NumpadDivide, 96, NumpadDivide), (NumpadDecimal, 97, NumpadDecimal),
    (NumpadEnter, 98, NumpadEnter), (NumLock, 99, NumLock),
}

/// One past the highest key code, for state-array sizing.
pub const KEY_STATE_SIZE: usize = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_dense_and_roundtrip() {
        assert_eq!(Key::ALL.len(), KEY_STATE_SIZE);
        for (expected, key) in Key::ALL.iter().enumerate() {
            assert_eq!(key.code() as usize, expected);
            assert_eq!(Key::from_code(key.code()), Some(*key));
        }
        assert!(Key::from_code(KEY_STATE_SIZE as u32).is_none());
    }

    #[test]
    fn winit_mapping_covers_the_basics() {
        assert_eq!(Key::from_keycode(KeyCode::Space), Some(Key::Space));
        assert_eq!(Key::from_keycode(KeyCode::KeyA), Some(Key::A));
        assert_eq!(Key::from_keycode(KeyCode::ArrowLeft), Some(Key::ArrowLeft));
        assert_eq!(Key::from_keycode(KeyCode::ScrollLock), None);
    }
}
