//! # Segmentação em Sentenças
//!
//! A segmentação é um colaborador externo injetado no [`Corpus`](crate::corpus::Corpus):
//! qualquer tipo que implemente [`SentenceSegmenter`] (inclusive closures
//! `Fn(&str) -> Vec<(usize, usize)>`) pode ser usado. O núcleo apenas valida
//! os intervalos devolvidos com [`validate_spans`].
//!
//! O segmentador padrão usa as fronteiras de sentença do UAX #29
//! (`unicode-segmentation`) e sempre quebra em `\n`, de modo que o título do
//! documento fica numa sentença própria.

use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, Result};
use crate::text::char_len;

/// Divide um texto em intervalos de caracteres `[start, end)` ordenados e
/// sem sobreposição.
pub trait SentenceSegmenter: Send + Sync {
    fn segment(&self, text: &str) -> Vec<(usize, usize)>;
}

impl<F> SentenceSegmenter for F
where
    F: Fn(&str) -> Vec<(usize, usize)> + Send + Sync,
{
    fn segment(&self, text: &str) -> Vec<(usize, usize)> {
        self(text)
    }
}

/// Segmentador padrão (UAX #29 + quebra de linha).
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeSentenceSegmenter;

impl SentenceSegmenter for UnicodeSentenceSegmenter {
    fn segment(&self, text: &str) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        let mut offset = 0;

        for sentence in text.split_sentence_bounds() {
            for line in sentence.split_inclusive('\n') {
                let len = char_len(line);
                let leading = line.chars().take_while(|c| c.is_whitespace()).count();
                if leading < len {
                    let trailing = line.chars().rev().take_while(|c| c.is_whitespace()).count();
                    spans.push((offset + leading, offset + len - trailing));
                }
                offset += len;
            }
        }
        spans
    }
}

/// Valida intervalos de sentença: não vazios, ordenados, sem sobreposição e
/// dentro de `[0, text_len]`.
pub fn validate_spans(spans: &[(usize, usize)], text_len: usize) -> Result<()> {
    let mut prev_end = 0;
    for (i, &(start, end)) in spans.iter().enumerate() {
        if start >= end {
            return Err(Error::Alignment(format!(
                "sentence {} has empty or inverted span ({}, {})",
                i, start, end
            )));
        }
        if end > text_len {
            return Err(Error::Alignment(format!(
                "sentence {} span ({}, {}) exceeds document text length {}",
                i, start, end, text_len
            )));
        }
        if start < prev_end {
            return Err(Error::Alignment(format!(
                "sentence {} span ({}, {}) overlaps or precedes previous sentence ending at {}",
                i, start, end, prev_end
            )));
        }
        prev_end = end;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_is_its_own_sentence() {
        let text = "EGFR in lung cancer\nEGFR mutations occur. They are common.";
        let spans = UnicodeSentenceSegmenter.segment(text);
        assert_eq!(spans, vec![(0, 19), (20, 41), (42, 58)]);
        validate_spans(&spans, char_len(text)).unwrap();
    }

    #[test]
    fn test_whitespace_only_segments_are_dropped() {
        let spans = UnicodeSentenceSegmenter.segment("  \n\nA b.  ");
        assert_eq!(spans, vec![(4, 8)]);
    }

    #[test]
    fn test_closure_segmenter() {
        let fixed = |_: &str| vec![(0, 10), (10, 20)];
        assert_eq!(fixed.segment("ignored"), vec![(0, 10), (10, 20)]);
    }

    #[test]
    fn test_validate_spans_rejects_structural_violations() {
        assert!(validate_spans(&[(0, 5), (5, 9)], 9).is_ok());
        assert!(matches!(validate_spans(&[(0, 5), (4, 9)], 9), Err(Error::Alignment(_))));
        assert!(matches!(validate_spans(&[(0, 12)], 9), Err(Error::Alignment(_))));
        assert!(matches!(validate_spans(&[(3, 3)], 9), Err(Error::Alignment(_))));
    }
}
