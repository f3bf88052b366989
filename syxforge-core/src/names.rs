use rand::Rng;
use std::collections::HashSet;

use crate::patch::{truncate_name, NAME_LEN};
use crate::{ForgeError, Result};

/// Highest numeric suffix tried once the plain words are used up.
const MAX_SUFFIX: u32 = 9_999;

static ADJECTIVES: &[&str] = &[
    "aged", "ancient", "autumn", "billowy", "bitter", "black", "blue", "bold",
    "broad", "broken", "calm", "cold", "cool", "crimson", "curly", "damp",
    "dark", "dawn", "delicate", "divine", "dry", "empty", "falling", "fancy",
    "flat", "floral", "fragrant", "frosty", "gentle", "green", "hidden", "holy",
    "icy", "jolly", "late", "lingering", "little", "lively", "long", "lucky",
    "misty", "morning", "muddy", "mute", "nameless", "noisy", "odd", "old",
    "orange", "patient", "plain", "polished", "proud", "purple", "quiet", "rapid",
    "raspy", "red", "restless", "rough", "round", "royal", "shiny", "shrill",
    "shy", "silent", "small", "snowy", "soft", "solitary", "sparkling", "spring",
    "square", "steep", "still", "summer", "super", "sweet", "throbbing", "tight",
    "tiny", "twilight", "wandering", "weathered", "white", "wild", "winter", "wispy",
    "withered", "yellow", "young", "amber", "brisk", "cosmic", "dusty", "electric",
    "fuzzy", "glassy", "golden", "hollow", "humming", "lunar", "molten", "neon",
    "oblique", "pale", "pulsing", "rusty", "silver", "smoky", "solar", "static",
    "velvet", "warped", "woolly", "zesty", "brassy", "buzzing", "chilly", "crunchy",
];

/// The one place names are normalised for comparison: lookup, exclusion
/// membership and conflict detection all go through here.
pub fn canonical_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Case-insensitive set of names that must not be handed out again.
#[derive(Debug, Clone, Default)]
pub struct NameExclusions {
    names: HashSet<String>,
}

impl NameExclusions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for name in names {
            set.insert(name.as_ref());
        }
        set
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&canonical_name(name))
    }

    /// Returns `false` if the name was already excluded.
    pub fn insert(&mut self, name: &str) -> bool {
        self.names.insert(canonical_name(name))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Draws a dictionary word cut to the 8-byte name field that is not in
/// `exclusions`. The caller adds the result to its exclusions.
pub fn allocate_name<R: Rng + ?Sized>(rng: &mut R, exclusions: &NameExclusions) -> Result<String> {
    allocate_from(ADJECTIVES, rng, exclusions)
}

pub(crate) fn allocate_from<R: Rng + ?Sized>(
    words: &[&str],
    rng: &mut R,
    exclusions: &NameExclusions,
) -> Result<String> {
    if words.is_empty() {
        return Err(ForgeError::NamesExhausted);
    }

    let draws = words.len() * 4;
    for _ in 0..draws {
        let candidate = truncate_name(words[rng.gen_range(0..words.len())]);
        if !exclusions.contains(&candidate) {
            return Ok(candidate);
        }
    }

    // Random draws keep missing; settle it with one pass over the list.
    if let Some(free) = words
        .iter()
        .map(|word| truncate_name(word))
        .find(|candidate| !exclusions.contains(candidate))
    {
        return Ok(free);
    }

    // Every plain word is taken. Numbered variants still fit the field.
    for n in 2..=MAX_SUFFIX {
        for word in words {
            let candidate = numbered(word, n);
            if !exclusions.contains(&candidate) {
                return Ok(candidate);
            }
        }
    }
    Err(ForgeError::NamesExhausted)
}

/// `word` shortened so that `word` + `n` fits the 8-byte name field.
fn numbered(word: &str, n: u32) -> String {
    let digits = n.to_string();
    let room = NAME_LEN.saturating_sub(digits.len());
    let mut out: String = word
        .char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= room)
        .map(|(_, c)| c)
        .collect();
    out.push_str(&digits);
    out
}

/// `"velvet"` -> `"Velvet"`, used for bundle directory names.
pub fn title_case(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn canonical_form_ignores_case_and_padding() {
        assert_eq!(canonical_name("  Shiny "), "shiny");
        assert_eq!(canonical_name("BASS"), canonical_name("bass"));
    }

    #[test]
    fn exclusions_are_case_insensitive() {
        let set = NameExclusions::from_names(["Velvet", "NEON"]);
        assert!(set.contains("velvet"));
        assert!(set.contains("Neon"));
        assert!(!set.contains("lunar"));
    }

    #[test]
    fn allocated_names_fit_and_avoid_exclusions() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut taken = NameExclusions::new();
        for _ in 0..50 {
            let name = allocate_name(&mut rng, &taken).unwrap();
            assert!(name.len() <= 8);
            assert!(taken.insert(&name), "duplicate name {name}");
        }
    }

    #[test]
    fn falls_back_to_the_last_free_word() {
        let words = ["alpha", "beta", "gamma"];
        let taken = NameExclusions::from_names(["ALPHA", "gamma"]);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(allocate_from(&words, &mut rng, &taken).unwrap(), "beta");
    }

    #[test]
    fn empty_dictionary_is_an_error() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            allocate_from(&[], &mut rng, &NameExclusions::new()),
            Err(ForgeError::NamesExhausted)
        ));
    }

    #[test]
    fn used_up_words_get_numbered() {
        let words = ["alpha", "beta"];
        let mut taken = NameExclusions::from_names(words);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(allocate_from(&words, &mut rng, &taken).unwrap(), "alpha2");
        taken.insert("alpha2");
        assert_eq!(allocate_from(&words, &mut rng, &taken).unwrap(), "beta2");
    }

    #[test]
    fn long_words_are_truncated_before_the_exclusion_check() {
        let words = ["lingering"];
        let taken = NameExclusions::from_names(["Lingerin"]);
        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(allocate_from(&words, &mut rng, &taken).unwrap(), "lingeri2");
    }

    #[test]
    fn numbered_names_fit_the_field() {
        assert_eq!(numbered("wandering", 2), "wanderi2");
        assert_eq!(numbered("odd", 7), "odd7");
        assert_eq!(numbered("restless", 1234), "rest1234");
    }

    #[test]
    fn hundreds_of_names_stay_distinct() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut taken = NameExclusions::new();
        for _ in 0..500 {
            let name = allocate_name(&mut rng, &taken).unwrap();
            assert!(name.len() <= NAME_LEN);
            assert!(taken.insert(&name), "duplicate name {name}");
        }
        assert_eq!(taken.len(), 500);
    }

    #[test]
    fn title_case_capitalises_first_letter() {
        assert_eq!(title_case("velvet"), "Velvet");
        assert_eq!(title_case("NEON"), "Neon");
        assert_eq!(title_case(""), "");
    }
}
