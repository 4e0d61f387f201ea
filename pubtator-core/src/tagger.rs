//! # Esquema de Tags IOB2
//!
//! Define o esquema de anotação **IOB2** (Beginning-Inside-Outside) usado
//! para rotular tokens a partir das menções do PubTator.
//!
//! - `B-TIPO`: Begin, primeiro token de uma menção
//! - `I-TIPO`: Inside, tokens subsequentes da mesma menção
//! - `O`: Outside, não pertence a nenhuma menção
//!
//! Diferente de esquemas com categorias fixas, os tipos do PubTator são
//! abertos (ex: "Disease", "Chemical", "T116"), por isso a categoria é uma
//! `String`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag IOB2 aplicada a um token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Tag {
    /// **Begin**: início de uma menção. Ex: **EG** (B-Gene) ##FR.
    Begin(String),
    /// **Inside**: continuação de uma menção. Ex: EG **##FR** (I-Gene).
    Inside(String),
    /// **Outside**: o token não faz parte de nenhuma menção.
    Outside,
}

impl Tag {
    /// Representação textual da tag (ex: "B-Gene", "I-Disease", "O")
    pub fn label(&self) -> String {
        match self {
            Tag::Begin(t) => format!("B-{}", t),
            Tag::Inside(t) => format!("I-{}", t),
            Tag::Outside => "O".to_string(),
        }
    }

    /// Retorna o tipo de entidade desta tag (se for B- ou I-)
    pub fn entity_type(&self) -> Option<&str> {
        match self {
            Tag::Begin(t) | Tag::Inside(t) => Some(t),
            Tag::Outside => None,
        }
    }

    pub fn is_outside(&self) -> bool {
        matches!(self, Tag::Outside)
    }

    /// Verifica se a transição prev → next é válida em IOB2
    ///
    /// - `I-X` só pode seguir `B-X` ou `I-X` (mesmo tipo)
    /// - `B-X` e `O` podem seguir qualquer tag
    pub fn is_valid_transition(prev: &Tag, next: &Tag) -> bool {
        match next {
            Tag::Inside(t) => match prev {
                Tag::Begin(p) | Tag::Inside(p) => p == t,
                Tag::Outside => false,
            },
            _ => true,
        }
    }

    /// Parseia uma tag a partir de string (ex: "B-Gene" → Begin("Gene")).
    /// O tipo pode conter hífens ("B-Gene-Or-Protein").
    pub fn from_label(s: &str) -> Option<Self> {
        if s == "O" {
            return Some(Tag::Outside);
        }
        let (prefix, entity_type) = s.split_once('-')?;
        if entity_type.is_empty() {
            return None;
        }
        match prefix {
            "B" => Some(Tag::Begin(entity_type.to_string())),
            "I" => Some(Tag::Inside(entity_type.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.label()
    }
}

impl TryFrom<String> for Tag {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Tag::from_label(&s).ok_or_else(|| format!("invalid IOB2 tag '{}'", s))
    }
}

/// Verifica se uma sequência inteira respeita IOB2 (nenhum `I-X` órfão).
pub fn is_well_formed(tags: &[Tag]) -> bool {
    let mut prev = Tag::Outside;
    for tag in tags {
        if !Tag::is_valid_transition(&prev, tag) {
            return false;
        }
        prev = tag.clone();
    }
    true
}
