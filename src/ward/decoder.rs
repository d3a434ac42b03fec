//! Ward code decoder
//!
//! File names look like `<district>_Ward_<n>_<zone>[ (<sheet>)].mdb`.
//! The structured pattern yields both ward and zone; when it does not match,
//! the first digit run in the name is taken as the ward.

use std::sync::OnceLock;

use regex::Regex;

use super::zones::zone_code;

const STRUCTURED_PATTERN: &str =
    r"^.{3}[A-Za-z][A-Za-z_-]+(\d+)([_(-]*[A-Za-z]+[()_-]*)(\d*)";
const DIGITS_PATTERN: &str = r"\d+";
const SEPARATORS: [char; 5] = ['_', '-', '(', ')', ' '];
const MAX_WARD: u32 = 99;

struct Patterns {
    structured: Regex,
    digits: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        structured: Regex::new(STRUCTURED_PATTERN).expect("structured ward pattern is valid"),
        digits: Regex::new(DIGITS_PATTERN).expect("digit pattern is valid"),
    })
}

/// How a ward number was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeSource {
    /// Ward and zone from the structured pattern
    Structured,
    /// First digit run only
    DigitRun,
}

/// A decoded ward
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WardCode {
    pub ward: u32,
    /// Two-digit zone code; only known for structured names
    pub zone: Option<&'static str>,
    pub source: DecodeSource,
}

/// Strip whitespace and a trailing `.mdb` (any case)
fn clean_name(file_name: &str) -> String {
    let compact: String = file_name.chars().filter(|c| !c.is_whitespace()).collect();
    match compact.len().checked_sub(4) {
        Some(i) if compact.is_char_boundary(i) && compact[i..].eq_ignore_ascii_case(".mdb") => {
            compact[..i].to_string()
        }
        _ => compact,
    }
}

fn in_range(n: u32) -> bool {
    (1..=MAX_WARD).contains(&n)
}

/// Decode the ward from a container file name, or `None` when undecodable
pub fn decode_ward(file_name: &str) -> Option<WardCode> {
    let name = clean_name(file_name);
    let p = patterns();

    if let Some(caps) = p.structured.captures(&name) {
        let ward = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
        let token: String = caps
            .get(2)
            .map(|m| m.as_str().chars().filter(|c| !SEPARATORS.contains(c)).collect())
            .unwrap_or_default();
        if let Some(ward) = ward.filter(|w| in_range(*w)) {
            return Some(WardCode {
                ward,
                zone: Some(zone_code(&token)),
                source: DecodeSource::Structured,
            });
        }
    }

    let ward = p.digits.find(&name)?.as_str().parse::<u32>().ok()?;
    in_range(ward).then_some(WardCode {
        ward,
        zone: None,
        source: DecodeSource::DigitRun,
    })
}
