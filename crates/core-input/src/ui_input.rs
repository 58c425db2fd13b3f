//! Maps a `VtToken` stream onto editor-level input events: key presses,
//! pasted/typed text, SGR mouse reports, and terminal resize reports.
//!
//! Grounded byte-for-byte on the CSI final-byte and `CSI < ... M`/`m` SGR
//! mouse decoding tables; unrecognized tokens (an OSC reply, a DCS, an
//! unmapped CSI final byte) map to `None` rather than the original's
//! `assert(false)` — malformed or not-yet-handled input is dropped, not
//! fatal.

use crate::vt::{CsiParams, VtToken};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct KeyModifiers: u32 {
        const CTRL = 0x01;
        const ALT = 0x02;
        const SHIFT = 0x04;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Null,
    Back,
    Tab,
    Enter,
    Escape,
    Char(char),
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    F(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    None,
    Release,
    Left,
    Middle,
    Right,
    Scroll,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Resize { width: i32, height: i32 },
    Text(String),
    Key { code: KeyCode, modifiers: KeyModifiers },
    Mouse { action: MouseAction, modifiers: KeyModifiers, x: i32, y: i32, scroll_x: i32, scroll_y: i32 },
}

fn key(code: KeyCode) -> Option<InputEvent> {
    Some(InputEvent::Key { code, modifiers: KeyModifiers::empty() })
}

fn key_with_mods(code: KeyCode, modifiers: KeyModifiers) -> Option<InputEvent> {
    Some(InputEvent::Key { code, modifiers })
}

/// Modifiers encoded as `params[1] - 1`, bit 0 = shift, bit 1 = alt, bit 2 = ctrl.
fn csi_modifiers(csi: &CsiParams) -> KeyModifiers {
    let p1 = (csi.get(1) - 1).max(0);
    let mut m = KeyModifiers::empty();
    if p1 & 0x01 != 0 {
        m |= KeyModifiers::SHIFT;
    }
    if p1 & 0x02 != 0 {
        m |= KeyModifiers::ALT;
    }
    if p1 & 0x04 != 0 {
        m |= KeyModifiers::CTRL;
    }
    m
}

fn csi_arrow_or_edge_key(csi: &CsiParams) -> Option<KeyCode> {
    if csi.final_byte > b'H' {
        return None;
    }
    match csi.final_byte {
        b'A' => Some(KeyCode::Up),
        b'B' => Some(KeyCode::Down),
        b'C' => Some(KeyCode::Right),
        b'D' => Some(KeyCode::Left),
        b'F' => Some(KeyCode::End),
        b'H' => Some(KeyCode::Home),
        _ => None,
    }
}

fn csi_tilde_key(param0: i32) -> Option<KeyCode> {
    Some(match param0 {
        1 => KeyCode::Home,
        2 => KeyCode::Insert,
        3 => KeyCode::Delete,
        4 => KeyCode::End,
        5 => KeyCode::PageUp,
        6 => KeyCode::PageDown,
        15 => KeyCode::F(5),
        17 => KeyCode::F(6),
        18 => KeyCode::F(7),
        19 => KeyCode::F(8),
        20 => KeyCode::F(9),
        21 => KeyCode::F(10),
        23 => KeyCode::F(11),
        24 => KeyCode::F(12),
        25 => KeyCode::F(13),
        26 => KeyCode::F(14),
        28 => KeyCode::F(15),
        29 => KeyCode::F(16),
        31 => KeyCode::F(17),
        32 => KeyCode::F(18),
        33 => KeyCode::F(19),
        34 => KeyCode::F(20),
        _ => return None,
    })
}

fn sgr_mouse(csi: &CsiParams) -> Option<InputEvent> {
    if csi.private_byte != b'<' {
        return None;
    }
    let btn = csi.get(0);
    let action = if btn & 0x40 != 0 {
        MouseAction::Scroll
    } else if csi.final_byte == b'M' {
        match btn & 0x03 {
            0 => MouseAction::Left,
            1 => MouseAction::Middle,
            2 => MouseAction::Right,
            _ => MouseAction::None,
        }
    } else {
        MouseAction::Release
    };
    let mut modifiers = KeyModifiers::empty();
    if btn & 0x04 != 0 {
        modifiers |= KeyModifiers::SHIFT;
    }
    if btn & 0x08 != 0 {
        modifiers |= KeyModifiers::ALT;
    }
    if btn & 0x10 != 0 {
        modifiers |= KeyModifiers::CTRL;
    }
    let scroll_y = if btn & 0x40 != 0 { if btn & 0x01 != 0 { -3 } else { 3 } } else { 0 };
    Some(InputEvent::Mouse {
        action,
        modifiers,
        x: csi.get(1) - 1,
        y: csi.get(2) - 1,
        scroll_x: 0,
        scroll_y,
    })
}

/// Translate one `VtToken` into an editor input event, if it maps to one.
pub fn map_token(token: &VtToken<'_>) -> Option<InputEvent> {
    match token {
        VtToken::Text(bytes) => Some(InputEvent::Text(String::from_utf8_lossy(bytes).into_owned())),
        VtToken::Ctrl(b) => match *b {
            0x00 => key(KeyCode::Null),
            0x09 => key(KeyCode::Tab),
            0x0d => key(KeyCode::Enter),
            0x01..=0x1a => {
                let upper = (b | 0b0100_0000) as char;
                key_with_mods(KeyCode::Char(upper), KeyModifiers::CTRL)
            }
            0x7f => key(KeyCode::Back),
            _ => None,
        },
        VtToken::Esc(b) => {
            if (0x20..=0x7e).contains(b) {
                key_with_mods(KeyCode::Char(*b as char), KeyModifiers::ALT)
            } else {
                None
            }
        }
        VtToken::Ss3(b) => {
            if (b'P'..=b'S').contains(b) {
                key(KeyCode::F(b - b'P' + 1))
            } else {
                None
            }
        }
        VtToken::Csi(csi) => {
            if let Some(code) = csi_arrow_or_edge_key(csi) {
                return key_with_mods(code, csi_modifiers(csi));
            }
            match csi.final_byte {
                b'~' => csi_tilde_key(csi.get(0)).and_then(|code| key_with_mods(code, csi_modifiers(csi))),
                b'm' | b'M' => sgr_mouse(csi),
                b't' if csi.get(0) == 8 => Some(InputEvent::Resize {
                    width: csi.get(2).max(1),
                    height: csi.get(1).max(1),
                }),
                _ => None,
            }
        }
        VtToken::Osc(_) | VtToken::Dcs(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vt::VtParser;

    fn tok<'a>(p: &'a mut VtParser, bytes: &'a [u8]) -> VtToken<'a> {
        p.parse_next(bytes).0.expect("token should complete")
    }

    #[test]
    fn plain_char_is_text() {
        let mut p = VtParser::new();
        let t = tok(&mut p, b"a");
        assert_eq!(map_token(&t), Some(InputEvent::Text("a".to_string())));
    }

    #[test]
    fn ctrl_c_maps_to_ctrl_char() {
        let mut p = VtParser::new();
        let t = tok(&mut p, b"\x03");
        assert_eq!(
            map_token(&t),
            Some(InputEvent::Key { code: KeyCode::Char('C'), modifiers: KeyModifiers::CTRL })
        );
    }

    #[test]
    fn backspace() {
        let mut p = VtParser::new();
        let t = tok(&mut p, b"\x7f");
        assert_eq!(map_token(&t), Some(InputEvent::Key { code: KeyCode::Back, modifiers: KeyModifiers::empty() }));
    }

    #[test]
    fn arrow_up() {
        let mut p = VtParser::new();
        let t = tok(&mut p, b"\x1b[A");
        assert_eq!(map_token(&t), Some(InputEvent::Key { code: KeyCode::Up, modifiers: KeyModifiers::empty() }));
    }

    #[test]
    fn delete_via_tilde() {
        let mut p = VtParser::new();
        let t = tok(&mut p, b"\x1b[3~");
        assert_eq!(map_token(&t), Some(InputEvent::Key { code: KeyCode::Delete, modifiers: KeyModifiers::empty() }));
    }

    #[test]
    fn sgr_mouse_left_click() {
        let mut p = VtParser::new();
        let t = tok(&mut p, b"\x1b[<0;10;20M");
        match map_token(&t) {
            Some(InputEvent::Mouse { action: MouseAction::Left, x, y, .. }) => {
                assert_eq!((x, y), (9, 19));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn sgr_mouse_scroll_up() {
        let mut p = VtParser::new();
        let t = tok(&mut p, b"\x1b[<64;1;1M");
        match map_token(&t) {
            Some(InputEvent::Mouse { action: MouseAction::Scroll, scroll_y, .. }) => assert_eq!(scroll_y, 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn resize_report() {
        let mut p = VtParser::new();
        let t = tok(&mut p, b"\x1b[8;40;120t");
        assert_eq!(map_token(&t), Some(InputEvent::Resize { width: 120, height: 40 }));
    }

    #[test]
    fn alt_d_sets_alt_modifier() {
        let mut p = VtParser::new();
        let t = tok(&mut p, b"\x1bd");
        assert_eq!(
            map_token(&t),
            Some(InputEvent::Key { code: KeyCode::Char('d'), modifiers: KeyModifiers::ALT })
        );
    }

    #[test]
    fn unrecognized_osc_maps_to_none() {
        let mut p = VtParser::new();
        let t = tok(&mut p, b"\x1b]0;title\x07");
        assert_eq!(map_token(&t), None);
    }
}
