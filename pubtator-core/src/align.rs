//! # Motor de Alinhamento Menção → Token
//!
//! Reconcilia as menções do PubTator (offsets de caractere no documento) com
//! a saída de um tokenizador qualquer, produzindo exatamente uma tag IOB2 por
//! token, e faz o caminho inverso: reconstrói intervalos de menção a partir
//! de sequências de tags (previstas por um modelo, por exemplo).
//!
//! ## Algoritmo (direção tags)
//!
//! 1. Cada menção é recortada ao intervalo da sentença; menções sem
//!    interseção são descartadas.
//! 2. O *conjunto de cobertura* de uma menção é todo token mapeado com
//!    interseção ≥ 1 caractere. Tokens sintéticos nunca entram e recebem `O`.
//! 3. O primeiro token do conjunto recebe `B-<tipo>`, os demais `I-<tipo>`.
//!    Um token parcialmente coberto (sub-palavra cortada pela fronteira)
//!    recebe a tag inteira.
//! 4. Menções que cruzam a fronteira da sentença são marcadas em cada
//!    sentença de forma independente.
//! 5. Sobreposição entre menções: vence a de menor início; empate → maior
//!    extensão; empate → ordem na lista do documento. A perdedora é
//!    registrada em [`SuppressedMention`].
//!
//! ## Algoritmo (direção spans)
//!
//! Cada sequência máxima `B-X I-X*` vira um [`DecodedSpan`]. Um `I-X` sem
//! `B-X` anterior (ou após outro tipo) **inicia** uma nova sequência.
//! Tokens sintéticos dentro da sequência marcam o span como `partial`.
//!
//! Só violações estruturais geram [`Error::Alignment`]; divergências de
//! tokenização nunca falham.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::document::Mention;
use crate::error::{Error, Result};
use crate::tagger::Tag;
use crate::tokenizer::Token;

/// Menção que perdeu tokens para outra(s) de maior precedência.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressedMention {
    /// Índice na lista de menções do documento
    pub mention: usize,
    /// Menções que ficaram com os tokens disputados
    pub winners: Vec<usize>,
    /// Índices (na sentença) dos tokens perdidos
    pub lost_tokens: Vec<usize>,
    /// A menção não ficou com nenhum token nesta sentença
    pub fully_suppressed: bool,
}

/// Resultado do alinhamento de uma sentença.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceAlignment {
    /// Uma tag por token
    pub tags: Vec<Tag>,
    /// Menção dona de cada token (índice na lista do documento)
    pub owners: Vec<Option<usize>>,
    pub suppressed: Vec<SuppressedMention>,
    /// Menções que tocam a sentença mas não cobrem nenhum token mapeado
    pub unaligned: Vec<usize>,
}

/// Span reconstruído a partir de uma sequência de tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedSpan {
    pub entity_type: String,
    /// `(start, end)` em caracteres; `None` se todos os tokens forem sintéticos
    pub span: Option<(usize, usize)>,
    /// Algum token da sequência não tinha offsets
    pub partial: bool,
    /// Primeiro token da sequência
    pub token_start: usize,
    /// Último token da sequência (exclusivo)
    pub token_end: usize,
}

struct Candidate<'a> {
    index: usize,
    start: usize,
    end: usize,
    entity_type: &'a str,
}

/// Ordem de precedência entre menções: início, maior extensão, ordem na lista.
fn precedence_key(index: usize, start: usize, end: usize) -> (usize, Reverse<usize>, usize) {
    (start, Reverse(end - start), index)
}

fn check_mention(index: usize, mention: &Mention, text_len: usize) -> Result<()> {
    if mention.start >= mention.end || mention.end > text_len {
        return Err(Error::Alignment(format!(
            "mention {} ({}, {}) outside document text of length {}",
            index, mention.start, mention.end, text_len
        )));
    }
    Ok(())
}

fn check_tokens(span: (usize, usize), tokens: &[Token]) -> Result<()> {
    let mut prev_end = span.0;
    for (i, token) in tokens.iter().enumerate() {
        if let Some((start, end)) = token.offsets {
            if start >= end || start < prev_end || end > span.1 {
                return Err(Error::Alignment(format!(
                    "token {} '{}' at ({}, {}) is empty, out of order or outside sentence ({}, {})",
                    i, token.text, start, end, span.0, span.1
                )));
            }
            prev_end = end;
        }
    }
    Ok(())
}

/// Alinha as menções do documento sobre os tokens de uma sentença.
///
/// `span` é o intervalo da sentença e os offsets dos `tokens` são absolutos
/// no texto do documento (de tamanho `text_len` caracteres).
pub fn align_sentence(
    span: (usize, usize),
    tokens: &[Token],
    mentions: &[Mention],
    text_len: usize,
) -> Result<SentenceAlignment> {
    let (sent_start, sent_end) = span;
    if sent_start >= sent_end || sent_end > text_len {
        return Err(Error::Alignment(format!(
            "sentence span ({}, {}) is not inside document text of length {}",
            sent_start, sent_end, text_len
        )));
    }
    check_tokens(span, tokens)?;

    let mut candidates = Vec::new();
    for (index, mention) in mentions.iter().enumerate() {
        check_mention(index, mention, text_len)?;
        let start = mention.start.max(sent_start);
        let end = mention.end.min(sent_end);
        if start < end {
            candidates.push(Candidate {
                index,
                start,
                end,
                entity_type: &mention.entity_type,
            });
        }
    }
    candidates.sort_by_key(|c| precedence_key(c.index, c.start, c.end));

    let mut alignment = SentenceAlignment {
        tags: vec![Tag::Outside; tokens.len()],
        owners: vec![None; tokens.len()],
        ..Default::default()
    };

    for cand in &candidates {
        let covering: Vec<usize> = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.offsets.is_some_and(|(s, e)| s < cand.end && cand.start < e))
            .map(|(i, _)| i)
            .collect();

        if covering.is_empty() {
            alignment.unaligned.push(cand.index);
            continue;
        }

        let mut claimed = 0usize;
        let mut lost_tokens = Vec::new();
        let mut winners: Vec<usize> = Vec::new();
        for &i in &covering {
            match alignment.owners[i] {
                Some(owner) => {
                    lost_tokens.push(i);
                    if !winners.contains(&owner) {
                        winners.push(owner);
                    }
                }
                None => {
                    alignment.owners[i] = Some(cand.index);
                    alignment.tags[i] = if claimed == 0 {
                        Tag::Begin(cand.entity_type.to_string())
                    } else {
                        Tag::Inside(cand.entity_type.to_string())
                    };
                    claimed += 1;
                }
            }
        }

        if !lost_tokens.is_empty() {
            winners.sort_unstable();
            alignment.suppressed.push(SuppressedMention {
                mention: cand.index,
                winners,
                lost_tokens,
                fully_suppressed: claimed == 0,
            });
        }
    }

    Ok(alignment)
}

/// Acumulador de uma sequência `B-X I-X*` em construção.
struct Run {
    entity_type: String,
    token_start: usize,
    token_end: usize,
    span: Option<(usize, usize)>,
    partial: bool,
}

impl Run {
    fn open(entity_type: &str, index: usize, token: &Token) -> Self {
        let mut run = Run {
            entity_type: entity_type.to_string(),
            token_start: index,
            token_end: index,
            span: None,
            partial: false,
        };
        run.push(index, token);
        run
    }

    fn push(&mut self, index: usize, token: &Token) {
        self.token_end = index + 1;
        match (token.offsets, self.span) {
            (Some((s, e)), Some((rs, re))) => self.span = Some((rs.min(s), re.max(e))),
            (Some(offsets), None) => self.span = Some(offsets),
            (None, _) => self.partial = true,
        }
    }

    fn close(self) -> DecodedSpan {
        DecodedSpan {
            entity_type: self.entity_type,
            span: self.span,
            partial: self.partial,
            token_start: self.token_start,
            token_end: self.token_end,
        }
    }
}

/// Reconstrói spans a partir de uma sequência de tags alinhada aos tokens.
pub fn decode_tags(tokens: &[Token], tags: &[Tag]) -> Result<Vec<DecodedSpan>> {
    if tokens.len() != tags.len() {
        return Err(Error::Alignment(format!(
            "tag sequence length {} does not match token sequence length {}",
            tags.len(),
            tokens.len()
        )));
    }

    let mut spans = Vec::new();
    let mut current: Option<Run> = None;

    for (i, (token, tag)) in tokens.iter().zip(tags).enumerate() {
        if let (Tag::Inside(t), Some(run)) = (tag, current.as_mut()) {
            if run.entity_type == *t {
                run.push(i, token);
                continue;
            }
        }
        if let Some(run) = current.take() {
            spans.push(run.close());
        }
        // B-X e I-X órfão abrem uma nova sequência
        current = tag.entity_type().map(|t| Run::open(t, i, token));
    }
    if let Some(run) = current {
        spans.push(run.close());
    }

    Ok(spans)
}

/// Dono de cada caractere do texto segundo a mesma precedência do alinhamento.
pub fn char_owners(mentions: &[Mention], text_len: usize) -> Result<Vec<Option<usize>>> {
    let mut order: Vec<usize> = Vec::with_capacity(mentions.len());
    for (index, mention) in mentions.iter().enumerate() {
        check_mention(index, mention, text_len)?;
        order.push(index);
    }
    order.sort_by_key(|&i| precedence_key(i, mentions[i].start, mentions[i].end));

    let mut owners = vec![None; text_len];
    for index in order {
        let mention = &mentions[index];
        for owner in &mut owners[mention.start..mention.end] {
            if owner.is_none() {
                *owner = Some(index);
            }
        }
    }
    Ok(owners)
}
