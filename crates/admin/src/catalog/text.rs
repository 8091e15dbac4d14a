//! Text folding used for name comparison, keyword scans and slugs.

/// Strip Latin diacritics from a lowercase character.
///
/// Returns `None` for characters that should disappear entirely (ordinal
/// indicators such as the `º` in `nº`).
const fn fold_char(c: char) -> Option<char> {
    let folded = match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        'ý' | 'ÿ' => 'y',
        'º' | 'ª' | '°' => return None,
        other => other,
    };
    Some(folded)
}

/// Lowercase and strip diacritics, keeping everything else as is.
#[must_use]
pub fn fold(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .filter_map(fold_char)
        .collect()
}

/// Fold and reduce to space-separated alphanumeric words.
///
/// Two names that differ only in case, accents, punctuation or spacing
/// normalize to the same string.
///
/// ```
/// use vitrine_admin::catalog::text::normalize;
///
/// assert_eq!(normalize("  Sandália   LAURA - "), "sandalia laura");
/// assert_eq!(normalize("Off-White"), "off white");
/// ```
#[must_use]
pub fn normalize(s: &str) -> String {
    let folded: String = fold(s)
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Words of the normalized string.
#[must_use]
pub fn tokens(s: &str) -> Vec<String> {
    normalize(s).split(' ').filter(|t| !t.is_empty()).map(String::from).collect()
}

/// URL slug for a name.
///
/// ```
/// use vitrine_admin::catalog::text::slugify;
///
/// assert_eq!(slugify("Calçados Femininos"), "calcados-femininos");
/// ```
#[must_use]
pub fn slugify(s: &str) -> String {
    normalize(s).replace(' ', "-")
}

/// Whether `needle` appears in `haystack` as a run of whole words.
///
/// Both arguments must already be normalized.
#[must_use]
pub fn contains_words(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    format!(" {haystack} ").contains(&format!(" {needle} "))
}
