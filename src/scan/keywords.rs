//! Locale keyword table for `netsh wlan show networks mode=bssid` output.
//!
//! `netsh` translates its field names with the OS display language. Each [`Locale`] lists the
//! spellings of one language; [`KeywordTable`] compiles every known locale into one matcher per
//! field. Adding a language means adding a row, either here or under `wifi.locales` in the
//! config file.

use derive_deref::{Deref, DerefMut};
use regex::Regex;
use serde::Deserialize;

/// Field names as printed by one OS language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Locale {
    pub name: String,
    pub network: Vec<String>,
    pub access_point: Vec<String>,
    pub authentication: Vec<String>,
    pub encryption: Vec<String>,
    pub signal: Vec<String>,
    pub channel: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Locale {
    fn builtin(
        name: &str,
        authentication: &[&str],
        encryption: &[&str],
        signal: &[&str],
        channel: &[&str],
    ) -> Self {
        Self {
            name: name.to_string(),
            network: words(&["SSID"]),
            access_point: words(&["BSSID"]),
            authentication: words(authentication),
            encryption: words(encryption),
            signal: words(signal),
            channel: words(channel),
        }
    }
}

/// Ordered collection of locales.
#[derive(Debug, Clone, PartialEq, Eq, Deref, DerefMut)]
pub struct Locales(pub Vec<Locale>);

impl Default for Locales {
    fn default() -> Self {
        Locales(vec![
            Locale::builtin(
                "en",
                &["Authentication"],
                &["Encryption", "Cipher"],
                &["Signal"],
                &["Channel"],
            ),
            Locale::builtin(
                "fr",
                &["Authentification"],
                &["Chiffrement", "Chiffrage"],
                &["Signal", "Signaux"],
                &["Canal"],
            ),
            Locale::builtin(
                "de",
                &["Authentifizierung"],
                &["Verschlüsselung"],
                &["Signal"],
                &["Kanal"],
            ),
            Locale::builtin(
                "es",
                &["Autenticación"],
                &["Cifrado"],
                &["Señal"],
                &["Canal"],
            ),
            Locale::builtin(
                "pt",
                &["Autenticação"],
                &["Criptografia", "Codificação"],
                &["Sinal"],
                &["Canal"],
            ),
            Locale::builtin(
                "it",
                &["Autenticazione"],
                &["Crittografia"],
                &["Segnale"],
                &["Canale"],
            ),
        ])
    }
}

impl Locales {
    /// Built-in locales followed by `extra`.
    pub fn with_extra(extra: &[Locale]) -> Self {
        let mut locales = Self::default();
        locales.extend(extra.iter().cloned());
        locales
    }
}

/// Field a line key was recognised as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Network,
    AccessPoint,
    Authentication,
    Encryption,
    Signal,
    Channel,
}

/// Compiled matchers, one per field.
///
/// Keys are compared against the text before a line's first colon, trimmed. Header keys must be
/// followed by a numeric index (`SSID 3`, `BSSID 1`). Attribute keys may only be followed by
/// symbols or spaces, so `Channel Utilization` is not mistaken for `Channel`. Both tolerate the
/// NBSP residue a mis-decoded console leaves before the colon (`SSID 1 \u{fffd}`).
#[derive(Debug, Clone)]
pub struct KeywordTable {
    network: Regex,
    access_point: Regex,
    authentication: Regex,
    encryption: Regex,
    signal: Regex,
    channel: Regex,
}

fn alternation<'a>(keywords: impl Iterator<Item = &'a String>) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for keyword in keywords {
        let keyword = keyword.trim();
        if !keyword.is_empty() && !seen.contains(&keyword) {
            seen.push(keyword);
        }
    }
    if seen.is_empty() {
        // matches nothing
        return String::from("[^\\s\\S]");
    }
    seen.iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|")
}

impl KeywordTable {
    pub fn new(locales: &Locales) -> Result<Self, regex::Error> {
        let header = |pick: fn(&Locale) -> &Vec<String>| {
            let alts = alternation(locales.iter().flat_map(pick));
            Regex::new(&format!(r"(?i)^(?:{alts})\s*\d+\b[^\p{L}\p{N}]*$"))
        };
        let exact = |pick: fn(&Locale) -> &Vec<String>| {
            let alts = alternation(locales.iter().flat_map(pick));
            Regex::new(&format!(r"(?i)^(?:{alts})[^\p{L}\p{N}]*$"))
        };
        Ok(Self {
            network: header(|l| &l.network)?,
            access_point: header(|l| &l.access_point)?,
            authentication: exact(|l| &l.authentication)?,
            encryption: exact(|l| &l.encryption)?,
            signal: exact(|l| &l.signal)?,
            channel: exact(|l| &l.channel)?,
        })
    }

    pub fn is(&self, field: Field, key: &str) -> bool {
        let matcher = match field {
            Field::Network => &self.network,
            Field::AccessPoint => &self.access_point,
            Field::Authentication => &self.authentication,
            Field::Encryption => &self.encryption,
            Field::Signal => &self.signal,
            Field::Channel => &self.channel,
        };
        matcher.is_match(key)
    }
}

impl Default for KeywordTable {
    fn default() -> Self {
        // built-in keywords are escaped literals
        Self::new(&Locales::default()).expect("built-in keyword table compiles")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_need_an_index() {
        let table = KeywordTable::default();
        assert!(table.is(Field::Network, "SSID 1"));
        assert!(table.is(Field::Network, "ssid 12"));
        assert!(!table.is(Field::Network, "SSID"));
        assert!(!table.is(Field::Network, "BSSID 1"));
        assert!(table.is(Field::AccessPoint, "BSSID 2"));
    }

    #[test]
    fn localized_attributes() {
        let table = KeywordTable::default();
        assert!(table.is(Field::Authentication, "Authentification"));
        assert!(table.is(Field::Encryption, "chiffrement"));
        assert!(table.is(Field::Encryption, "Verschlüsselung"));
        assert!(table.is(Field::Signal, "Señal"));
        assert!(table.is(Field::Channel, "Kanal"));
    }

    #[test]
    fn compound_keys_do_not_match() {
        let table = KeywordTable::default();
        assert!(!table.is(Field::Channel, "Channel Utilization"));
        assert!(!table.is(Field::Signal, "Signal strength history"));
    }

    #[test]
    fn decoding_residue_before_the_colon_is_tolerated() {
        let table = KeywordTable::default();
        assert!(table.is(Field::Network, "SSID 1 \u{fffd}"));
        assert!(table.is(Field::AccessPoint, "BSSID 2\u{a0}"));
        assert!(table.is(Field::Authentication, "Authentification\u{fffd}"));
        assert!(table.is(Field::Signal, "Signal \u{fffd}"));
        assert!(!table.is(Field::Network, "SSID 1 name"));
        assert!(!table.is(Field::Channel, "Channel\u{fffd}Utilization"));
    }

    #[test]
    fn extra_locales_are_additive() {
        let extra = Locale {
            name: "nl".into(),
            authentication: vec!["Verificatie".into()],
            channel: vec!["Kanaal".into()],
            ..Locale::default()
        };
        let table = KeywordTable::new(&Locales::with_extra(&[extra])).unwrap();
        assert!(table.is(Field::Authentication, "Verificatie"));
        assert!(table.is(Field::Channel, "Kanaal"));
        assert!(table.is(Field::Channel, "Channel"));
    }
}
