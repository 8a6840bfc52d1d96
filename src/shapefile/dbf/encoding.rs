//! Picks the text encoding of a ".dbf" file.
//!
//! In order of preference: what the caller asked for, the ".cpg" sidecar, the
//! language driver byte in the ".dbf" header, then Windows-1252.

use std::collections::HashMap;
use encoding::all;
use encoding::label::encoding_from_whatwg_label;
use encoding::{Encoding, EncodingRef};
use regex::Regex;

pub const DEFAULT_ENCODING: EncodingRef = all::WINDOWS_1252;

/// Where a resolved encoding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingSource {
    Explicit,
    CodePageFile,
    LanguageDriver,
    Default,
}

lazy_static! {
    // Language driver IDs, byte 29 of the header
    static ref LANGUAGE_DRIVERS: HashMap<u8, EncodingRef> = {
        let mut m: HashMap<u8, EncodingRef> = HashMap::new();
        m.insert(0x03, all::WINDOWS_1252);
        m.insert(0x57, all::WINDOWS_1252);
        m.insert(0x58, all::WINDOWS_1252);
        m.insert(0x59, all::WINDOWS_1252);
        m.insert(0x13, all::WINDOWS_31J);
        m.insert(0x7b, all::WINDOWS_31J);
        m.insert(0x26, all::IBM866);
        m.insert(0x65, all::IBM866);
        m.insert(0x4d, all::GBK);
        m.insert(0x7a, all::GBK);
        m.insert(0x4e, all::WINDOWS_949);
        m.insert(0x79, all::WINDOWS_949);
        m.insert(0x4f, all::BIG5_2003);
        m.insert(0x78, all::BIG5_2003);
        m.insert(0x7c, all::WINDOWS_874);
        m.insert(0x7d, all::WINDOWS_1255);
        m.insert(0x7e, all::WINDOWS_1256);
        m.insert(0xc8, all::WINDOWS_1250);
        m.insert(0xc9, all::WINDOWS_1251);
        m.insert(0xca, all::WINDOWS_1254);
        m.insert(0xcb, all::WINDOWS_1253);
        m.insert(0xcc, all::WINDOWS_1257);
        m
    };

    static ref ISO_8859: Regex = Regex::new(r"(?i)^(?:iso)?[\s_-]*8859[\s_-]*(\d{1,2})$").unwrap();
    static ref CODE_PAGE: Regex = Regex::new(r"(?i)^(?:ansi|cp|windows|oem|ibm|ms)?[\s_-]*(\d{3,5})$").unwrap();
}

pub fn from_language_driver(ldid: u8) -> Option<EncodingRef> {
    LANGUAGE_DRIVERS.get(&ldid).cloned()
}

/// The byte to write in the header for `encoding`, or 0 when it has none
/// (as for UTF-8, which only a ".cpg" file can announce).
pub fn language_driver_for(encoding: EncodingRef) -> u8 {
    if encoding.name() == all::WINDOWS_1252.name() {
        return 0x57;
    }
    LANGUAGE_DRIVERS
        .iter()
        .filter(|&(_, e)| e.name() == encoding.name())
        .map(|(&ldid, _)| ldid)
        .min()
        .unwrap_or(0)
}

fn from_code_page(number: u32) -> Option<EncodingRef> {
    match number {
        65001 => Some(all::UTF_8),
        874 => Some(all::WINDOWS_874),
        866 => Some(all::IBM866),
        932 => Some(all::WINDOWS_31J),
        936 => Some(all::GBK),
        949 => Some(all::WINDOWS_949),
        950 => Some(all::BIG5_2003),
        20866 => Some(all::KOI8_R),
        1250..=1258 => encoding_from_whatwg_label(&format!("windows-{}", number)),
        28591 => Some(all::ISO_8859_1),
        28592..=28599 => encoding_from_whatwg_label(&format!("iso-8859-{}", number - 28590)),
        _ => None,
    }
}

/// Interprets the contents of a ".cpg" file: "UTF-8", "65001", "ANSI 1252",
/// "CP1252", "88591", "ISO 8859-1", ...
pub fn from_cpg(text: &str) -> Option<EncodingRef> {
    let text = text.lines().next().unwrap_or("").trim();
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = ISO_8859.captures(text) {
        return match caps[1].parse::<u32>() {
            // the WHATWG label maps ISO-8859-1 to Windows-1252
            Ok(1) => Some(all::ISO_8859_1),
            Ok(n) => encoding_from_whatwg_label(&format!("iso-8859-{}", n)),
            Err(_) => None,
        };
    }

    if let Some(caps) = CODE_PAGE.captures(text) {
        return caps[1].parse::<u32>().ok().and_then(from_code_page);
    }

    encoding_from_whatwg_label(&text.to_lowercase())
}

/// The name to write in a ".cpg" file.
pub fn cpg_name(encoding: EncodingRef) -> String {
    match encoding.whatwg_name() {
        Some("utf-8") => "UTF-8".to_string(),
        Some(name) => name.to_string(),
        None => encoding.name().to_string(),
    }
}

pub fn resolve(explicit: Option<EncodingRef>, cpg: Option<&str>, ldid: u8) -> (EncodingRef, EncodingSource) {
    if let Some(encoding) = explicit {
        return (encoding, EncodingSource::Explicit);
    }
    if let Some(text) = cpg {
        match from_cpg(text) {
            Some(encoding) => return (encoding, EncodingSource::CodePageFile),
            None => tracing::warn!(cpg = text.trim(), "Unrecognized '.cpg' code page"),
        }
    }
    if let Some(encoding) = from_language_driver(ldid) {
        return (encoding, EncodingSource::LanguageDriver);
    }
    if ldid != 0 {
        tracing::warn!(ldid = ldid, "Unknown language driver byte");
    }
    (DEFAULT_ENCODING, EncodingSource::Default)
}
