//! Recognized input key codes.

use std::fmt;
use std::str::FromStr;

/// A key code players may report through `KEY_PRESSED` / `KEY_RELEASED`.
///
/// The set is closed; any other code is dropped by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKey {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    KeyW,
    KeyA,
    KeyS,
    KeyD,
    ShiftLeft,
    Space,
    KeyF,
}

impl InputKey {
    pub const ALL: [InputKey; 11] = [
        InputKey::ArrowUp,
        InputKey::ArrowDown,
        InputKey::ArrowLeft,
        InputKey::ArrowRight,
        InputKey::KeyW,
        InputKey::KeyA,
        InputKey::KeyS,
        InputKey::KeyD,
        InputKey::ShiftLeft,
        InputKey::Space,
        InputKey::KeyF,
    ];

    /// The browser `KeyboardEvent.code` spelling of this key.
    pub fn as_str(&self) -> &'static str {
        match self {
            InputKey::ArrowUp => "ArrowUp",
            InputKey::ArrowDown => "ArrowDown",
            InputKey::ArrowLeft => "ArrowLeft",
            InputKey::ArrowRight => "ArrowRight",
            InputKey::KeyW => "KeyW",
            InputKey::KeyA => "KeyA",
            InputKey::KeyS => "KeyS",
            InputKey::KeyD => "KeyD",
            InputKey::ShiftLeft => "ShiftLeft",
            InputKey::Space => "Space",
            InputKey::KeyF => "KeyF",
        }
    }
}

impl FromStr for InputKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InputKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for InputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitelisted_keys_parse() {
        for key in InputKey::ALL {
            assert_eq!(key.as_str().parse::<InputKey>(), Ok(key));
        }
        assert_eq!("KeyF".parse::<InputKey>(), Ok(InputKey::KeyF));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!("KeyZ".parse::<InputKey>().is_err());
        assert!("keyf".parse::<InputKey>().is_err());
        assert!("".parse::<InputKey>().is_err());
    }
}
