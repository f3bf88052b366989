/// Display name used for any category byte outside the known table.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CategoryEntry {
    pub name: &'static str,
    pub code: u8,
}

/// The 16 preset categories in display (and sort) order.
pub const CATEGORIES: [CategoryEntry; 16] = [
    CategoryEntry { name: "Bass", code: 0x00 },
    CategoryEntry { name: "Lead", code: 0x01 },
    CategoryEntry { name: "Pad", code: 0x02 },
    CategoryEntry { name: "Keys", code: 0x03 },
    CategoryEntry { name: "Organ", code: 0x04 },
    CategoryEntry { name: "String", code: 0x05 },
    CategoryEntry { name: "Brass", code: 0x06 },
    CategoryEntry { name: "Percussion", code: 0x07 },
    CategoryEntry { name: "Drone", code: 0x08 },
    CategoryEntry { name: "Noise", code: 0x09 },
    CategoryEntry { name: "SFX", code: 0x0A },
    CategoryEntry { name: "Arp", code: 0x0B },
    CategoryEntry { name: "Misc", code: 0x0C },
    CategoryEntry { name: "User1", code: 0x0D },
    CategoryEntry { name: "User2", code: 0x0E },
    CategoryEntry { name: "User3", code: 0x0F },
];

/// Forward lookup: category name to byte code. Matching ignores ASCII case.
pub fn category_code(name: &str) -> Option<u8> {
    CATEGORIES
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(name.trim()))
        .map(|entry| entry.code)
}

/// Reverse lookup: byte code to display name, `"Unknown"` when unmatched.
pub fn category_name(code: u8) -> &'static str {
    CATEGORIES
        .iter()
        .find(|entry| entry.code == code)
        .map(|entry| entry.name)
        .unwrap_or(UNKNOWN_CATEGORY)
}

/// Position of a category code in the display order. Unknown codes sort
/// after every known category.
pub fn display_order(code: u8) -> usize {
    CATEGORIES
        .iter()
        .position(|entry| entry.code == code)
        .unwrap_or(CATEGORIES.len())
}

pub fn available_categories() -> String {
    let mut names: Vec<&str> = CATEGORIES.iter().map(|entry| entry.name).collect();
    names.sort_unstable();
    names.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_and_reverse_lookups_agree() {
        for entry in CATEGORIES.iter() {
            assert_eq!(category_code(entry.name), Some(entry.code));
            assert_eq!(category_name(entry.code), entry.name);
        }
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(category_code("lead"), Some(0x01));
        assert_eq!(category_code("sfx"), Some(0x0A));
        assert_eq!(category_code("Choir"), None);
    }

    #[test]
    fn unknown_code_displays_as_unknown_and_sorts_last() {
        assert_eq!(category_name(0x42), UNKNOWN_CATEGORY);
        assert_eq!(display_order(0x42), 16);
        assert!(display_order(0x0F) < display_order(0x42));
        assert_eq!(display_order(0x00), 0);
    }
}
