//! # Offsets por caractere
//!
//! Os offsets do PubTator contam caracteres (escalares Unicode), enquanto
//! `String` em Rust é indexada por bytes. [`CharText`] guarda as fronteiras
//! de byte de cada caractere para fatiar o texto em O(1) usando offsets de
//! caractere.

use serde::{Deserialize, Serialize};

/// Texto com tabela de fronteiras caractere → byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CharText {
    text: String,
    /// `boundaries[i]` é o byte inicial do i-ésimo caractere; o último
    /// elemento é `text.len()`.
    boundaries: Vec<usize>,
}

impl CharText {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut boundaries: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        boundaries.push(text.len());
        Self { text, boundaries }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Número de caracteres do texto
    pub fn len_chars(&self) -> usize {
        self.boundaries.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Fatia `[start, end)` em offsets de caractere. `None` se fora dos limites.
    pub fn slice(&self, start: usize, end: usize) -> Option<&str> {
        if start > end || end > self.len_chars() {
            return None;
        }
        Some(&self.text[self.boundaries[start]..self.boundaries[end]])
    }
}

impl From<String> for CharText {
    fn from(text: String) -> Self {
        CharText::new(text)
    }
}

impl From<CharText> for String {
    fn from(text: CharText) -> Self {
        text.text
    }
}

/// Quantidade de caracteres de `s` (atalho legível para `chars().count()`).
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Colapsa sequências de espaço em branco num único espaço e apara as pontas.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_uses_char_offsets() {
        let t = CharText::new("α-synuclein in Parkinson");
        assert_eq!(t.len_chars(), 24);
        assert_eq!(t.slice(0, 11), Some("α-synuclein"));
        assert_eq!(t.slice(15, 24), Some("Parkinson"));
        assert_eq!(t.slice(20, 30), None);
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a\n\tb  c "), "a b c");
    }
}
