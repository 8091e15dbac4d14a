//! Size and color inference for variants.
//!
//! Attributes are resolved one at a time through a fixed chain, stopping at
//! the first source that yields a value:
//!
//! 1. structured `(key, value)` pairs from the ERP variation record
//! 2. `key: value` tokens embedded in the name (`;` or `|` separated)
//! 3. size patterns on the bare name (shoe sizes, letter sizes, prefixes)
//! 4. color keyword scan, longest keyword first, whole words only
//!
//! Everything here is pure and deterministic.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::text::{contains_words, normalize};
use crate::models::DEFAULT_SIZE;

/// Inferred attributes of a single variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantAttributes {
    pub size: String,
    pub color: Option<String>,
    pub color_hex: Option<String>,
}

/// `word:` marker. Group 1 is the key.
static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\p{L}º°]+)\s*:\s*").expect("Invalid regex"));

/// Parenthesized numeric ids, e.g. the `(501)` in `Sandália Laura (501)`.
static PAREN_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*\d+\s*\)").expect("Invalid regex"));

static SIZE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:tamanho|tam|n[úu]mero|numera[çc][ãa]o|n[º°])\.?\s*(\d{1,2}(?:/\d{1,2})?|\p{L}+\d?)\b",
    )
    .expect("Invalid regex")
});

static SHOE_SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{2})(?:/(\d{2}))?\b").expect("Invalid regex"));

const SHOE_SIZES: std::ops::RangeInclusive<u32> = 15..=48;

const LETTER_SIZES: &[&str] = &[
    "PP", "P", "M", "G", "GG", "XG", "XGG", "EG", "EGG", "U", "G1", "G2", "G3", "G4",
];

const SIZE_KEYS: &[&str] = &["tamanho", "tam", "numero", "numeracao", "num", "n", "size"];

const COLOR_KEYS: &[&str] = &["cor", "cores", "color", "colour"];

/// Keys that mark the start of an attribute suffix but carry neither size
/// nor color.
const OTHER_KEYS: &[&str] = &["estampa", "modelo", "voltagem", "sabor", "material"];

/// Color keyword table: normalized keyword, display name, hex.
const COLORS: &[(&str, &str, &str)] = &[
    ("preto", "Preto", "#000000"),
    ("preta", "Preto", "#000000"),
    ("black", "Preto", "#000000"),
    ("branco", "Branco", "#FFFFFF"),
    ("branca", "Branco", "#FFFFFF"),
    ("white", "Branco", "#FFFFFF"),
    ("off white", "Off White", "#FAF9F6"),
    ("azul marinho", "Azul Marinho", "#000080"),
    ("azul claro", "Azul Claro", "#ADD8E6"),
    ("azul royal", "Azul Royal", "#4169E1"),
    ("azul", "Azul", "#0000FF"),
    ("vermelho", "Vermelho", "#FF0000"),
    ("vermelha", "Vermelho", "#FF0000"),
    ("verde militar", "Verde Militar", "#4B5320"),
    ("verde agua", "Verde Água", "#A8E6CF"),
    ("verde", "Verde", "#008000"),
    ("amarelo", "Amarelo", "#FFFF00"),
    ("amarela", "Amarelo", "#FFFF00"),
    ("rosa", "Rosa", "#FFC0CB"),
    ("pink", "Pink", "#FF1493"),
    ("roxo", "Roxo", "#800080"),
    ("lilas", "Lilás", "#C8A2C8"),
    ("cinza", "Cinza", "#808080"),
    ("grafite", "Grafite", "#474A51"),
    ("chumbo", "Chumbo", "#5A5A5A"),
    ("marrom", "Marrom", "#8B4513"),
    ("caramelo", "Caramelo", "#C68E17"),
    ("camel", "Camel", "#C19A6B"),
    ("bege", "Bege", "#F5F5DC"),
    ("nude", "Nude", "#E3BC9A"),
    ("areia", "Areia", "#C2B280"),
    ("creme", "Creme", "#FFFDD0"),
    ("laranja", "Laranja", "#FFA500"),
    ("coral", "Coral", "#FF7F50"),
    ("mostarda", "Mostarda", "#FFDB58"),
    ("dourado", "Dourado", "#FFD700"),
    ("dourada", "Dourado", "#FFD700"),
    ("prata", "Prata", "#C0C0C0"),
    ("prateado", "Prata", "#C0C0C0"),
    ("vinho", "Vinho", "#722F37"),
    ("bordo", "Bordô", "#800000"),
    ("caqui", "Caqui", "#C3B091"),
    ("jeans", "Jeans", "#5D8AA8"),
    ("turquesa", "Turquesa", "#40E0D0"),
];

/// Color table ordered longest keyword first.
static COLORS_BY_LENGTH: LazyLock<Vec<(&'static str, &'static str, &'static str)>> =
    LazyLock::new(|| {
        let mut table = COLORS.to_vec();
        table.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
        table
    });

/// Infer size and color for a variant.
///
/// `structured` holds explicit attribute pairs from the ERP record; they
/// always win over anything derived from `raw_name`.
///
/// ```
/// use vitrine_admin::catalog::extract::extract_attributes;
///
/// let attrs = extract_attributes("Sandália Laura (501) Cor: Preto", &[]);
/// assert_eq!(attrs.size, "Único");
/// assert_eq!(attrs.color.as_deref(), Some("Preto"));
/// assert_eq!(attrs.color_hex.as_deref(), Some("#000000"));
/// ```
#[must_use]
pub fn extract_attributes(raw_name: &str, structured: &[(String, String)]) -> VariantAttributes {
    let inline = attribute_pairs(raw_name);

    let size = size_from_pairs(structured)
        .or_else(|| size_from_pairs(&inline))
        .or_else(|| size_from_name(raw_name))
        .unwrap_or_else(|| DEFAULT_SIZE.to_string());

    let color = color_from_pairs(structured)
        .or_else(|| color_from_pairs(&inline))
        .or_else(|| color_from_name(raw_name));

    let (color, color_hex) = match color {
        Some((name, hex)) => (Some(name), Some(hex)),
        None => (None, None),
    };

    VariantAttributes {
        size,
        color,
        color_hex,
    }
}

/// Parse `key: value` tokens out of free text.
///
/// A value runs until the next `;` or `|` separator or the next `key:`
/// marker, whichever comes first. Keys are returned normalized.
///
/// ```
/// use vitrine_admin::catalog::extract::attribute_pairs;
///
/// let pairs = attribute_pairs("Cor:Preto;Tamanho:37");
/// assert_eq!(pairs, vec![
///     ("cor".to_string(), "Preto".to_string()),
///     ("tamanho".to_string(), "37".to_string()),
/// ]);
/// ```
#[must_use]
pub fn attribute_pairs(text: &str) -> Vec<(String, String)> {
    let markers: Vec<(usize, usize, String)> = KEY_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let key = caps.get(1)?;
            Some((whole.start(), whole.end(), normalize(key.as_str())))
        })
        .collect();

    markers
        .iter()
        .enumerate()
        .filter_map(|(i, (_, value_start, key))| {
            let value_end = markers.get(i + 1).map_or(text.len(), |next| next.0);
            let raw = text.get(*value_start..value_end)?;
            let value = raw.split([';', '|']).next()?.trim();
            (!key.is_empty() && !value.is_empty()).then(|| (key.clone(), value.to_string()))
        })
        .collect()
}

/// Byte offset where an attribute suffix (`Cor: ...`, `Tamanho: ...`)
/// starts in a name, if it has one.
#[must_use]
pub fn attribute_suffix_start(name: &str) -> Option<usize> {
    KEY_RE.captures_iter(name).find_map(|caps| {
        let key = normalize(caps.get(1)?.as_str());
        if is_attribute_key(&key) {
            caps.get(0).map(|m| m.start())
        } else {
            None
        }
    })
}

/// Whether a normalized key names a variant attribute.
#[must_use]
pub fn is_attribute_key(key: &str) -> bool {
    SIZE_KEYS.contains(&key) || COLOR_KEYS.contains(&key) || OTHER_KEYS.contains(&key)
}

/// Stable display color for a color name that is not in the table.
///
/// FNV-1a over the normalized name; each RGB channel lands in
/// `0x40..=0xBF` so the swatch is neither black nor white.
#[must_use]
pub fn hash_color_hex(name: &str) -> String {
    const FNV_OFFSET: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;

    let hash = normalize(name).bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    });
    let [_, r, g, b] = hash.to_be_bytes();
    let channel = |byte: u8| 0x40 + (byte % 0x80);
    format!("#{:02X}{:02X}{:02X}", channel(r), channel(g), channel(b))
}

// =============================================================================
// Size
// =============================================================================

fn size_from_pairs(pairs: &[(String, String)]) -> Option<String> {
    pairs
        .iter()
        .find(|(key, _)| SIZE_KEYS.contains(&normalize(key).as_str()))
        .and_then(|(_, value)| normalize_size(value))
}

fn normalize_size(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let upper = value.to_uppercase();
    if LETTER_SIZES.contains(&upper.as_str()) {
        return Some(upper);
    }
    if normalize(value) == "unico" {
        return Some(DEFAULT_SIZE.to_string());
    }
    Some(value.to_string())
}

fn size_from_name(raw_name: &str) -> Option<String> {
    let bare = PAREN_ID_RE.replace_all(raw_name, " ");

    if let Some(size) = SIZE_PREFIX_RE.captures_iter(&bare).find_map(|caps| {
        let value = caps.get(1)?.as_str();
        if value.chars().next()?.is_ascii_digit() {
            return Some(value.to_string());
        }
        let upper = value.to_uppercase();
        if LETTER_SIZES.contains(&upper.as_str()) {
            Some(upper)
        } else if normalize(value) == "unico" {
            Some(DEFAULT_SIZE.to_string())
        } else {
            None
        }
    }) {
        return Some(size);
    }

    if let Some(size) = SHOE_SIZE_RE.captures_iter(&bare).find_map(|caps| {
        let first = caps.get(1)?.as_str();
        if !SHOE_SIZES.contains(&first.parse::<u32>().ok()?) {
            return None;
        }
        match caps.get(2) {
            Some(second) => {
                let second = second.as_str();
                SHOE_SIZES
                    .contains(&second.parse::<u32>().ok()?)
                    .then(|| format!("{first}/{second}"))
            }
            None => Some(first.to_string()),
        }
    }) {
        return Some(size);
    }

    bare.rsplit(|c: char| !c.is_alphanumeric())
        .find(|token| LETTER_SIZES.contains(token))
        .map(String::from)
}

// =============================================================================
// Color
// =============================================================================

fn color_from_pairs(pairs: &[(String, String)]) -> Option<(String, String)> {
    pairs
        .iter()
        .find(|(key, _)| COLOR_KEYS.contains(&normalize(key).as_str()))
        .and_then(|(_, value)| color_from_value(value))
}

/// Resolve an explicit color value: exact table hit, otherwise keep the
/// value and derive a hex from it.
fn color_from_value(value: &str) -> Option<(String, String)> {
    let value = value.trim();
    let normalized = normalize(value);
    if normalized.is_empty() {
        return None;
    }
    if let Some((_, display, hex)) = COLORS.iter().find(|(kw, _, _)| *kw == normalized) {
        return Some(((*display).to_string(), (*hex).to_string()));
    }
    Some((value.to_string(), hash_color_hex(value)))
}

fn color_from_name(raw_name: &str) -> Option<(String, String)> {
    let bare = normalize(&PAREN_ID_RE.replace_all(raw_name, " "));
    COLORS_BY_LENGTH
        .iter()
        .find(|(kw, _, _)| contains_words(&bare, kw))
        .map(|(_, display, hex)| ((*display).to_string(), (*hex).to_string()))
}
