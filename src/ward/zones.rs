//! Zone-letter dictionaries
//!
//! The case-sensitive table is consulted first so tokens such as `sha` and
//! `SHA` keep distinct codes; everything else is matched lowercased.

/// Code used when the zone token is not recognised
pub const UNKNOWN_ZONE: &str = "00";

const CASE_SENSITIVE: &[(&str, &str)] = &[
    ("Ta", "11"),
    ("Tha", "12"),
    ("Da", "13"),
    ("Dha", "14"),
    ("tta", "16"),
    ("ttha", "17"),
    ("dda", "18"),
    ("ddha", "19"),
    ("dhha", "19"),
    ("sha", "30"),
    ("SHA", "31"),
    ("sa", "32"),
];

const CASE_INSENSITIVE: &[(&str, &str)] = &[
    ("", "00"),
    ("ka", "01"),
    ("k", "01"),
    ("kha", "02"),
    ("kh", "02"),
    ("ga", "03"),
    ("gha", "04"),
    ("nga", "05"),
    ("ng", "05"),
    ("ch", "06"),
    ("cha", "06"),
    ("chha", "07"),
    ("ja", "08"),
    ("jha", "09"),
    ("yna", "10"),
    ("yan", "10"),
    ("ana", "15"),
    ("na", "20"),
    ("pa", "21"),
    ("pha", "22"),
    ("fa", "22"),
    ("ba", "23"),
    ("bha", "24"),
    ("ma", "25"),
    ("ya", "26"),
    ("ra", "27"),
    ("la", "28"),
    ("wa", "29"),
    ("ha", "33"),
    ("ksha", "34"),
    ("kshya", "34"),
    ("tra", "35"),
    ("gya", "36"),
];

/// Two-digit zone code for a cleaned token
pub fn zone_code(token: &str) -> &'static str {
    if let Some((_, code)) = CASE_SENSITIVE.iter().find(|(k, _)| *k == token) {
        return code;
    }
    let lowered = token.to_lowercase();
    CASE_INSENSITIVE
        .iter()
        .find(|(k, _)| *k == lowered)
        .map(|(_, code)| *code)
        .unwrap_or(UNKNOWN_ZONE)
}
