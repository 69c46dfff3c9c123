//! # Keycode resolution and key-event compilation
//!
//! Maps characters to Linux evdev keycodes for a US layout, compiles text
//! into ordered key events, and generates the XKB keymap source uploaded to
//! the compositor so it can translate those keycodes back into characters.
//!
//! Event ordering per character is strict: press each modifier, press the
//! main key, release the main key, release the modifiers in reverse press
//! order. This prevents compositors from latching stuck modifiers.

use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

// Evdev key codes (from linux/input-event-codes.h) for the keys we emit.
pub const KEY_LEFTSHIFT: u32 = 42;

/// Modifier bit for Shift in the compositor's depressed-modifier mask.
pub const MOD_SHIFT_MASK: u32 = 1;

/// Key event states as transmitted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u32)]
pub enum KeyState {
    Released = 0,
    Pressed = 1,
}

/// A single transient key event. Generated per character, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct KeyEvent {
    pub keycode: u32,
    pub state: KeyState,
    /// Modifier keycodes held while this key is pressed. Empty for the
    /// modifier press/release events themselves.
    pub modifiers: Vec<u32>,
    pub timestamp_ns: u64,
}

/// US-layout table: evdev keycode, base keysym, shifted keysym.
///
/// Also drives XKB keymap generation, so the symbol names must be valid
/// xkbcommon keysym names.
const US_LAYOUT: &[(u32, &str, Option<&str>)] = &[
    (2, "1", Some("exclam")),
    (3, "2", Some("at")),
    (4, "3", Some("numbersign")),
    (5, "4", Some("dollar")),
    (6, "5", Some("percent")),
    (7, "6", Some("asciicircum")),
    (8, "7", Some("ampersand")),
    (9, "8", Some("asterisk")),
    (10, "9", Some("parenleft")),
    (11, "0", Some("parenright")),
    (12, "minus", Some("underscore")),
    (13, "equal", Some("plus")),
    (14, "BackSpace", None),
    (15, "Tab", None),
    (16, "q", Some("Q")),
    (17, "w", Some("W")),
    (18, "e", Some("E")),
    (19, "r", Some("R")),
    (20, "t", Some("T")),
    (21, "y", Some("Y")),
    (22, "u", Some("U")),
    (23, "i", Some("I")),
    (24, "o", Some("O")),
    (25, "p", Some("P")),
    (26, "bracketleft", Some("braceleft")),
    (27, "bracketright", Some("braceright")),
    (28, "Return", None),
    (30, "a", Some("A")),
    (31, "s", Some("S")),
    (32, "d", Some("D")),
    (33, "f", Some("F")),
    (34, "g", Some("G")),
    (35, "h", Some("H")),
    (36, "j", Some("J")),
    (37, "k", Some("K")),
    (38, "l", Some("L")),
    (39, "semicolon", Some("colon")),
    (40, "apostrophe", Some("quotedbl")),
    (41, "grave", Some("asciitilde")),
    (42, "Shift_L", None),
    (43, "backslash", Some("bar")),
    (44, "z", Some("Z")),
    (45, "x", Some("X")),
    (46, "c", Some("C")),
    (47, "v", Some("V")),
    (48, "b", Some("B")),
    (49, "n", Some("N")),
    (50, "m", Some("M")),
    (51, "comma", Some("less")),
    (52, "period", Some("greater")),
    (53, "slash", Some("question")),
    (57, "space", None),
];

/// Resolve a character to its evdev keycode and whether Shift is required.
pub fn lookup(ch: char) -> Option<(u32, bool)> {
    let (code, shifted) = match ch {
        'a' => (30, false), 'b' => (48, false), 'c' => (46, false), 'd' => (32, false),
        'e' => (18, false), 'f' => (33, false), 'g' => (34, false), 'h' => (35, false),
        'i' => (23, false), 'j' => (36, false), 'k' => (37, false), 'l' => (38, false),
        'm' => (50, false), 'n' => (49, false), 'o' => (24, false), 'p' => (25, false),
        'q' => (16, false), 'r' => (19, false), 's' => (31, false), 't' => (20, false),
        'u' => (22, false), 'v' => (47, false), 'w' => (17, false), 'x' => (45, false),
        'y' => (21, false), 'z' => (44, false),

        'A' => (30, true), 'B' => (48, true), 'C' => (46, true), 'D' => (32, true),
        'E' => (18, true), 'F' => (33, true), 'G' => (34, true), 'H' => (35, true),
        'I' => (23, true), 'J' => (36, true), 'K' => (37, true), 'L' => (38, true),
        'M' => (50, true), 'N' => (49, true), 'O' => (24, true), 'P' => (25, true),
        'Q' => (16, true), 'R' => (19, true), 'S' => (31, true), 'T' => (20, true),
        'U' => (22, true), 'V' => (47, true), 'W' => (17, true), 'X' => (45, true),
        'Y' => (21, true), 'Z' => (44, true),

        '1' => (2, false), '2' => (3, false), '3' => (4, false), '4' => (5, false),
        '5' => (6, false), '6' => (7, false), '7' => (8, false), '8' => (9, false),
        '9' => (10, false), '0' => (11, false),

        '!' => (2, true), '@' => (3, true), '#' => (4, true), '$' => (5, true),
        '%' => (6, true), '^' => (7, true), '&' => (8, true), '*' => (9, true),
        '(' => (10, true), ')' => (11, true),

        '-' => (12, false), '_' => (12, true),
        '=' => (13, false), '+' => (13, true),
        '[' => (26, false), '{' => (26, true),
        ']' => (27, false), '}' => (27, true),
        ';' => (39, false), ':' => (39, true),
        '\'' => (40, false), '"' => (40, true),
        '`' => (41, false), '~' => (41, true),
        '\\' => (43, false), '|' => (43, true),
        ',' => (51, false), '<' => (51, true),
        '.' => (52, false), '>' => (52, true),
        '/' => (53, false), '?' => (53, true),

        ' ' => (57, false),
        '\n' => (28, false),
        '\t' => (15, false),

        _ => return None,
    };
    Some((code, shifted))
}

/// Compile text into an ordered event stream with explicit timestamps.
///
/// Returns the events plus the graphemes that have no keycode in the current
/// layout (skipped, reported to the caller for logging).
pub fn compile_key_events(text: &str) -> (Vec<KeyEvent>, Vec<String>) {
    let base_ns = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    compile_key_events_from(text, base_ns)
}

/// Deterministic variant used by tests: timestamps start at `base_ns` and
/// advance 1 µs per event.
pub fn compile_key_events_from(text: &str, base_ns: u64) -> (Vec<KeyEvent>, Vec<String>) {
    let mut events = Vec::new();
    let mut unsupported = Vec::new();
    let mut ts = base_ns;

    for grapheme in text.graphemes(true) {
        let mut chars = grapheme.chars();
        let resolved = match (chars.next(), chars.next()) {
            (Some(ch), None) => lookup(ch),
            _ => None,
        };

        let Some((keycode, shifted)) = resolved else {
            unsupported.push(grapheme.to_string());
            continue;
        };

        let modifiers: Vec<u32> = if shifted { vec![KEY_LEFTSHIFT] } else { Vec::new() };

        // Press modifiers, outer to inner.
        for &m in &modifiers {
            events.push(KeyEvent {
                keycode: m,
                state: KeyState::Pressed,
                modifiers: Vec::new(),
                timestamp_ns: ts,
            });
            ts += 1_000;
        }

        events.push(KeyEvent {
            keycode,
            state: KeyState::Pressed,
            modifiers: modifiers.clone(),
            timestamp_ns: ts,
        });
        ts += 1_000;

        events.push(KeyEvent {
            keycode,
            state: KeyState::Released,
            modifiers: modifiers.clone(),
            timestamp_ns: ts,
        });
        ts += 1_000;

        // Release modifiers, inner to outer.
        for &m in modifiers.iter().rev() {
            events.push(KeyEvent {
                keycode: m,
                state: KeyState::Released,
                modifiers: Vec::new(),
                timestamp_ns: ts,
            });
            ts += 1_000;
        }
    }

    (events, unsupported)
}

/// Generate the XKB keymap source uploaded to the compositor.
///
/// Covers exactly the keys in [`US_LAYOUT`]; keycode names are offset by 8
/// per the XKB convention for evdev codes.
pub fn xkb_keymap_source() -> String {
    let mut keycodes = String::new();
    let mut symbols = String::new();

    for &(code, base, shifted) in US_LAYOUT {
        let xkb_code = code + 8;
        keycodes.push_str(&format!("        <I{xkb_code}> = {xkb_code};\n"));
        match shifted {
            Some(upper) => {
                symbols.push_str(&format!("        key <I{xkb_code}> {{ [ {base}, {upper} ] }};\n"))
            }
            None => symbols.push_str(&format!("        key <I{xkb_code}> {{ [ {base} ] }};\n")),
        }
    }

    format!(
        "xkb_keymap {{\n\
         \x20   xkb_keycodes \"(unnamed)\" {{\n\
         \x20       minimum = 8;\n\
         \x20       maximum = 255;\n\
         {keycodes}\
         \x20   }};\n\
         \x20   xkb_types \"(unnamed)\" {{ include \"complete\" }};\n\
         \x20   xkb_compat \"(unnamed)\" {{ include \"complete\" }};\n\
         \x20   xkb_symbols \"(unnamed)\" {{\n\
         {symbols}\
         \x20   }};\n\
         }};\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercase_char_is_press_release() {
        let (events, unsupported) = compile_key_events_from("a", 0);
        assert!(unsupported.is_empty());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].keycode, 30);
        assert_eq!(events[0].state, KeyState::Pressed);
        assert_eq!(events[1].state, KeyState::Released);
        assert!(events[0].modifiers.is_empty());
    }

    #[test]
    fn shifted_char_orders_modifiers_correctly() {
        // Expected order: shift press, key press, key release, shift release.
        let (events, _) = compile_key_events_from("A", 0);
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].keycode, KEY_LEFTSHIFT);
        assert_eq!(events[0].state, KeyState::Pressed);
        assert_eq!(events[1].keycode, 30);
        assert_eq!(events[1].state, KeyState::Pressed);
        assert_eq!(events[1].modifiers, vec![KEY_LEFTSHIFT]);
        assert_eq!(events[2].keycode, 30);
        assert_eq!(events[2].state, KeyState::Released);
        assert_eq!(events[3].keycode, KEY_LEFTSHIFT);
        assert_eq!(events[3].state, KeyState::Released);
    }

    #[test]
    fn shifted_punctuation_requires_shift() {
        let (events, _) = compile_key_events_from("?", 0);
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].keycode, KEY_LEFTSHIFT);
        assert_eq!(events[1].keycode, 53);
    }

    #[test]
    fn timestamps_are_strictly_increasing() {
        let (events, _) = compile_key_events_from("Hi there!", 1_000_000);
        for pair in events.windows(2) {
            assert!(pair[1].timestamp_ns > pair[0].timestamp_ns);
        }
        assert_eq!(events[0].timestamp_ns, 1_000_000);
    }

    #[test]
    fn unsupported_graphemes_are_reported_not_dropped_silently() {
        let (events, unsupported) = compile_key_events_from("a\u{00e9}b", 0);
        assert_eq!(unsupported, vec!["\u{00e9}".to_string()]);
        // 'a' and 'b' still compile.
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn hello_with_trailing_space_compiles_fully() {
        let (events, unsupported) = compile_key_events_from("hello ", 0);
        assert!(unsupported.is_empty());
        // 6 characters, no shift: 2 events each.
        assert_eq!(events.len(), 12);
    }

    #[test]
    fn keymap_source_covers_layout() {
        let source = xkb_keymap_source();
        assert!(source.starts_with("xkb_keymap {"));
        // 'a' is evdev 30 → xkb keycode 38.
        assert!(source.contains("<I38> = 38;"));
        assert!(source.contains("key <I38> { [ a, A ] };"));
        // Shift itself maps without a second level.
        assert!(source.contains("key <I50> { [ Shift_L ] };"));
        assert!(source.contains("xkb_symbols"));
    }

    #[test]
    fn newline_and_tab_resolve() {
        assert_eq!(lookup('\n'), Some((28, false)));
        assert_eq!(lookup('\t'), Some((15, false)));
        assert_eq!(lookup(' '), Some((57, false)));
    }
}
