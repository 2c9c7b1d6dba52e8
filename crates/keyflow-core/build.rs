use std::env;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// HID keyboard page (0x07) usages known by name.
const HID_KEYS: &[(&str, u16)] = &[
    ("NO", 0x00),
    ("A", 0x04),
    ("B", 0x05),
    ("C", 0x06),
    ("D", 0x07),
    ("E", 0x08),
    ("F", 0x09),
    ("G", 0x0A),
    ("H", 0x0B),
    ("I", 0x0C),
    ("J", 0x0D),
    ("K", 0x0E),
    ("L", 0x0F),
    ("M", 0x10),
    ("N", 0x11),
    ("O", 0x12),
    ("P", 0x13),
    ("Q", 0x14),
    ("R", 0x15),
    ("S", 0x16),
    ("T", 0x17),
    ("U", 0x18),
    ("V", 0x19),
    ("W", 0x1A),
    ("X", 0x1B),
    ("Y", 0x1C),
    ("Z", 0x1D),
    ("KEY_1", 0x1E),
    ("KEY_2", 0x1F),
    ("KEY_3", 0x20),
    ("KEY_4", 0x21),
    ("KEY_5", 0x22),
    ("KEY_6", 0x23),
    ("KEY_7", 0x24),
    ("KEY_8", 0x25),
    ("KEY_9", 0x26),
    ("KEY_0", 0x27),
    ("ENTER", 0x28),
    ("ESC", 0x29),
    ("BACKSPACE", 0x2A),
    ("TAB", 0x2B),
    ("SPACE", 0x2C),
    ("MINUS", 0x2D),
    ("EQUAL", 0x2E),
    ("LEFT_BRACE", 0x2F),
    ("RIGHT_BRACE", 0x30),
    ("BACKSLASH", 0x31),
    ("SEMICOLON", 0x33),
    ("APOSTROPHE", 0x34),
    ("GRAVE", 0x35),
    ("COMMA", 0x36),
    ("DOT", 0x37),
    ("SLASH", 0x38),
    ("CAPSLOCK", 0x39),
    ("F1", 0x3A),
    ("F2", 0x3B),
    ("F3", 0x3C),
    ("F4", 0x3D),
    ("F5", 0x3E),
    ("F6", 0x3F),
    ("F7", 0x40),
    ("F8", 0x41),
    ("F9", 0x42),
    ("F10", 0x43),
    ("F11", 0x44),
    ("F12", 0x45),
    ("PRINT", 0x46),
    ("SCROLLLOCK", 0x47),
    ("PAUSE", 0x48),
    ("INSERT", 0x49),
    ("HOME", 0x4A),
    ("PAGE_UP", 0x4B),
    ("DELETE", 0x4C),
    ("END", 0x4D),
    ("PAGE_DOWN", 0x4E),
    ("RIGHT", 0x4F),
    ("LEFT", 0x50),
    ("DOWN", 0x51),
    ("UP", 0x52),
    ("NUMLOCK", 0x53),
    ("APPLICATION", 0x65),
    ("F13", 0x68),
    ("F14", 0x69),
    ("F15", 0x6A),
    ("F16", 0x6B),
    ("F17", 0x6C),
    ("F18", 0x6D),
    ("F19", 0x6E),
    ("F20", 0x6F),
    ("F21", 0x70),
    ("F22", 0x71),
    ("F23", 0x72),
    ("F24", 0x73),
    ("MUTE", 0x7F),
    ("VOLUMEUP", 0x80),
    ("VOLUMEDOWN", 0x81),
    ("LEFT_CTRL", 0xE0),
    ("LEFT_SHIFT", 0xE1),
    ("LEFT_ALT", 0xE2),
    ("LEFT_META", 0xE3),
    ("RIGHT_CTRL", 0xE4),
    ("RIGHT_SHIFT", 0xE5),
    ("RIGHT_ALT", 0xE6),
    ("RIGHT_META", 0xE7),
];

fn main() {
    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("key_codes.rs");
    let mut f = File::create(&dest_path).unwrap();

    // Generate the Key newtype wrapper
    writeln!(
        f,
        r#"
/// Represents a single keyboard key code.
///
/// This is a newtype wrapper around u16 for type safety.
/// The numeric values are usages from the HID keyboard/keypad page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Key(pub u16);

impl Key {{
    /// Get the raw numeric code value
    pub fn code(self) -> u16 {{
        self.0
    }}

    /// Get the name of this key
    pub fn name(self) -> &'static str {{
        key_name(self.0)
    }}
}}

impl From<u16> for Key {{
    fn from(code: u16) -> Self {{
        Key(code)
    }}
}}

impl From<Key> for u16 {{
    fn from(key: Key) -> Self {{
        key.0
    }}
}}

impl fmt::Display for Key {{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {{
        write!(f, "{{}}", self.name())
    }}
}}

impl FromStr for Key {{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {{
        key_from_name(s).ok_or_else(|| format!("Unknown key: {{}}", s))
    }}
}}
"#
    )
    .unwrap();

    writeln!(f, "#[allow(missing_docs)]\nimpl Key {{").unwrap();
    for (name, code) in HID_KEYS {
        writeln!(f, "    pub const {}: Key = Key(0x{:02X});", name, code).unwrap();
    }
    writeln!(f, "}}\n").unwrap();

    writeln!(f, "/// Canonical (name, usage) pairs, in usage order.").unwrap();
    writeln!(f, "const KEY_TABLE: &[(&str, u16)] = &[").unwrap();
    for (name, code) in HID_KEYS {
        writeln!(f, "    (\"{}\", 0x{:02X}),", name, code).unwrap();
    }
    writeln!(f, "];").unwrap();

    println!("cargo:rerun-if-changed=build.rs");
}
