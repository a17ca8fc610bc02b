//! Keyboard bindings.
//!
//! Voice `i` sits on digit key `i + 1`; the digit after the last voice
//! merges the sounding pulses. Arrow keys transpose, Escape quits.

use winit::keyboard::KeyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Voice(usize),
    Merge,
    PitchUp,
    PitchDown,
    Quit,
}

/// Digit 1..=9 from the main row or the numpad
pub fn digit_of(code: KeyCode) -> Option<usize> {
    let digit = match code {
        KeyCode::Digit1 | KeyCode::Numpad1 => 1,
        KeyCode::Digit2 | KeyCode::Numpad2 => 2,
        KeyCode::Digit3 | KeyCode::Numpad3 => 3,
        KeyCode::Digit4 | KeyCode::Numpad4 => 4,
        KeyCode::Digit5 | KeyCode::Numpad5 => 5,
        KeyCode::Digit6 | KeyCode::Numpad6 => 6,
        KeyCode::Digit7 | KeyCode::Numpad7 => 7,
        KeyCode::Digit8 | KeyCode::Numpad8 => 8,
        KeyCode::Digit9 | KeyCode::Numpad9 => 9,
        _ => return None,
    };
    Some(digit)
}

pub fn control_for_key(code: KeyCode, voice_count: usize) -> Option<Control> {
    match code {
        KeyCode::ArrowUp => Some(Control::PitchUp),
        KeyCode::ArrowDown => Some(Control::PitchDown),
        KeyCode::Escape => Some(Control::Quit),
        _ => {
            let digit = digit_of(code)?;
            if digit <= voice_count {
                Some(Control::Voice(digit - 1))
            } else if digit == voice_count + 1 {
                Some(Control::Merge)
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        assert_eq!(control_for_key(KeyCode::Digit1, 4), Some(Control::Voice(0)));
        assert_eq!(control_for_key(KeyCode::Numpad4, 4), Some(Control::Voice(3)));
        assert_eq!(control_for_key(KeyCode::Digit5, 4), Some(Control::Merge));
        assert_eq!(control_for_key(KeyCode::Digit6, 4), None);
        assert_eq!(control_for_key(KeyCode::ArrowUp, 4), Some(Control::PitchUp));
        assert_eq!(control_for_key(KeyCode::ArrowDown, 4), Some(Control::PitchDown));
        assert_eq!(control_for_key(KeyCode::KeyA, 4), None);
    }

    #[test]
    fn test_merge_key_follows_voice_count() {
        assert_eq!(control_for_key(KeyCode::Digit3, 2), Some(Control::Merge));
        assert_eq!(control_for_key(KeyCode::Digit9, 8), Some(Control::Merge));
    }
}
