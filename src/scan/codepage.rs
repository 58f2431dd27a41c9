//! OEM code pages used by Windows console tools.
//!
//! `netsh` and `arp` write in the console's OEM code page rather than UTF-8. The lower half of
//! these pages is ASCII; only the upper half needs a table.

use serde::Deserialize;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodePage {
    /// Western European OEM page, the usual console page on non-US Windows.
    #[strum(to_string = "cp850")]
    Cp850,
    /// Original IBM PC page, the console default on US Windows.
    #[strum(to_string = "cp437")]
    Cp437,
    /// No legacy page: decode as UTF-8 straight away.
    #[serde(alias = "utf-8")]
    #[strum(to_string = "utf8")]
    Utf8,
}

impl Default for CodePage {
    fn default() -> Self {
        if cfg!(target_os = "windows") {
            CodePage::Cp850
        } else {
            CodePage::Utf8
        }
    }
}

const CP850_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å', //
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', 'ø', '£', 'Ø', '×', 'ƒ', //
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '®', '¬', '½', '¼', '¡', '«', '»', //
    '░', '▒', '▓', '│', '┤', 'Á', 'Â', 'À', '©', '╣', '║', '╗', '╝', '¢', '¥', '┐', //
    '└', '┴', '┬', '├', '─', '┼', 'ã', 'Ã', '╚', '╔', '╩', '╦', '╠', '═', '╬', '¤', //
    'ð', 'Ð', 'Ê', 'Ë', 'È', 'ı', 'Í', 'Î', 'Ï', '┘', '┌', '█', '▄', '¦', 'Ì', '▀', //
    'Ó', 'ß', 'Ô', 'Ò', 'õ', 'Õ', 'µ', 'þ', 'Þ', 'Ú', 'Û', 'Ù', 'ý', 'Ý', '¯', '´', //
    '\u{ad}', '±', '‗', '¾', '¶', '§', '÷', '¸', '°', '¨', '·', '¹', '³', '²', '■', '\u{a0}',
];

const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å', //
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ', //
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»', //
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐', //
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧', //
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀', //
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩', //
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{a0}',
];

impl CodePage {
    fn high_half(&self) -> Option<&'static [char; 128]> {
        match self {
            CodePage::Cp850 => Some(&CP850_HIGH),
            CodePage::Cp437 => Some(&CP437_HIGH),
            CodePage::Utf8 => None,
        }
    }

    /// Strict single-byte decode.
    ///
    /// Returns `None` for [`CodePage::Utf8`] and for input holding NUL bytes, which only occur in
    /// wide-character (UTF-16) console output.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        let table = self.high_half()?;
        if bytes.contains(&0) {
            return None;
        }
        Some(
            bytes
                .iter()
                .map(|&b| {
                    if b < 0x80 {
                        b as char
                    } else {
                        table[(b - 0x80) as usize]
                    }
                })
                .collect(),
        )
    }
}
