//! Presentation helpers for lead fields

/// Brazilian phone formatting.
///
/// 11 digits → `+55 (DD) D DDDD-DDDD`, 10 digits → `+55 (DD) DDDD-DDDD`.
/// Other inputs are returned unchanged; absent or empty → `N/A`.
pub fn format_phone(phone: Option<&str>) -> String {
    let Some(raw) = phone.filter(|p| !p.is_empty()) else {
        return "N/A".to_string();
    };
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        11 => format!("+55 ({}) {} {}-{}", &digits[..2], &digits[2..3], &digits[3..7], &digits[7..]),
        10 => format!("+55 ({}) {}-{}", &digits[..2], &digits[2..6], &digits[6..]),
        _ => raw.to_string(),
    }
}

/// Uppercased initials of the first and last word (`Ana Maria Souza` → `AS`).
pub fn initials(name: Option<&str>) -> String {
    let mut words = name.unwrap_or_default().split_whitespace();
    let first = words.next().and_then(|w| w.chars().next());
    let last = words.last().and_then(|w| w.chars().next());
    first
        .into_iter()
        .chain(last)
        .flat_map(char::to_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_phone() {
        assert_eq!(format_phone(Some("11987654321")), "+55 (11) 9 8765-4321");
        assert_eq!(format_phone(Some("(11) 3456-7890")), "+55 (11) 3456-7890");
        assert_eq!(format_phone(Some("+1 555 0100")), "+1 555 0100");
        assert_eq!(format_phone(None), "N/A");
        assert_eq!(format_phone(Some("")), "N/A");
    }

    #[test]
    fn test_initials() {
        assert_eq!(initials(Some("Ana Maria Souza")), "AS");
        assert_eq!(initials(Some("  joão  ")), "J");
        assert_eq!(initials(Some("")), "");
        assert_eq!(initials(None), "");
    }
}
