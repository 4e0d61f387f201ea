//! # Modelo de Documento PubTator
//!
//! Um [`Document`] guarda o texto bruto (título + abstract), as menções e as
//! relações de um bloco PubTator. Esses dados são imutáveis depois da carga.
//!
//! Sentenças, tokens e tags são **derivados**: calculados sob demanda com o
//! tokenizador e o segmentador vinculados ao documento e guardados num cache
//! (`OnceLock`). Trocar o tokenizador ([`Document::bind_tokenizer`]) invalida
//! o cache inteiro, sem reler o arquivo.
//!
//! ## Junção título/abstract
//!
//! O texto do documento é `título + "\n" + abstract`; o separador conta como
//! um caractere, exatamente como os offsets do PubTator.

use std::collections::BTreeSet;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::align::{
    align_sentence, char_owners, decode_tags, DecodedSpan, SentenceAlignment, SuppressedMention,
};
use crate::error::{Error, Result};
use crate::parser::{self, RawDocument};
use crate::segmenter::{validate_spans, SentenceSegmenter, UnicodeSentenceSegmenter};
use crate::tagger::Tag;
use crate::text::{char_len, CharText};
use crate::tokenizer::{Token, Tokenizer, WordTokenizer};

/// Separador entre título e abstract no texto do documento
pub const TITLE_ABSTRACT_SEPARATOR: char = '\n';

/// Uma menção de entidade anotada no texto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    /// Offset inicial (caracteres, inclusivo)
    pub start: usize,
    /// Offset final (caracteres, exclusivo)
    pub end: usize,
    /// Texto de superfície (ex: "breast cancer")
    pub text: String,
    /// Tipo de entidade (ex: "Disease", "T047")
    pub entity_type: String,
    /// Identificadores de conceito, como escritos no arquivo (ex: "UMLS:C0006142")
    pub concept_ids: Vec<String>,
}

impl Mention {
    pub fn new(
        start: usize,
        end: usize,
        text: impl Into<String>,
        entity_type: impl Into<String>,
        concept_ids: Vec<String>,
    ) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            entity_type: entity_type.into(),
            concept_ids,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identificadores sem prefixo de namespace ("UMLS:C0006142" → "C0006142").
    pub fn normalized_concepts(&self) -> Vec<&str> {
        self.concept_ids.iter().map(|c| normalize_concept(c)).collect()
    }

    fn rebased(mut self, by: usize) -> Self {
        self.start -= by;
        self.end -= by;
        self
    }
}

pub(crate) fn normalize_concept(id: &str) -> &str {
    id.rsplit(':').next().unwrap_or(id)
}

/// Relação entre duas ou mais menções/conceitos. Opaca para o alinhamento.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Tipo da relação (ex: "CID")
    pub kind: String,
    /// Identificadores dos argumentos, em ordem
    pub arguments: Vec<String>,
}

/// Sentença: intervalo no texto do documento + seus tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub span: (usize, usize),
    /// Tokens com offsets absolutos no texto do documento
    pub tokens: Vec<Token>,
}

impl Sentence {
    pub fn start(&self) -> usize {
        self.span.0
    }

    pub fn end(&self) -> usize {
        self.span.1
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Qual parte do bloco forma o texto do documento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextScope {
    /// `título + "\n" + abstract` (offsets do PubTator sem ajuste)
    TitleAndAbstract,
    /// Só o abstract; menções do título são descartadas e as demais rebaseadas
    AbstractOnly,
}

impl Default for TextScope {
    fn default() -> Self {
        TextScope::TitleAndAbstract
    }
}

pub(crate) fn scoped_text(title: &str, abstract_text: &str, scope: TextScope) -> CharText {
    match scope {
        TextScope::TitleAndAbstract => CharText::new(format!(
            "{}{}{}",
            title, TITLE_ABSTRACT_SEPARATOR, abstract_text
        )),
        TextScope::AbstractOnly => CharText::new(abstract_text),
    }
}

fn check_bounds(pmid: &str, text: &CharText, mention: &Mention) -> Result<()> {
    let bounds_error = |message: String| Error::Bounds {
        pmid: pmid.to_string(),
        start: mention.start,
        end: mention.end,
        message,
    };
    if mention.start >= mention.end {
        return Err(bounds_error("empty or inverted mention span".to_string()));
    }
    match text.slice(mention.start, mention.end) {
        None => Err(bounds_error(format!(
            "mention exceeds document text of length {}",
            text.len_chars()
        ))),
        Some(surface) if surface != mention.text => Err(bounds_error(format!(
            "text at offsets is '{}' but mention text is '{}'",
            surface, mention.text
        ))),
        Some(_) => Ok(()),
    }
}

/// Dados derivados (recalculáveis) de um documento.
#[derive(Debug, Clone)]
struct Derived {
    sentences: Vec<Sentence>,
    alignments: Vec<SentenceAlignment>,
}

/// Um documento PubTator.
#[derive(Clone)]
pub struct Document {
    pmid: String,
    title: String,
    abstract_text: String,
    scope: TextScope,
    text: CharText,
    mentions: Vec<Mention>,
    relations: Vec<Relation>,
    tokenizer: Arc<dyn Tokenizer>,
    segmenter: Arc<dyn SentenceSegmenter>,
    derived: OnceLock<Derived>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("pmid", &self.pmid)
            .field("title", &self.title)
            .field("scope", &self.scope)
            .field("mentions", &self.mentions.len())
            .field("relations", &self.relations.len())
            .field("tokenizer", &self.tokenizer.kind())
            .field("prepared", &self.is_prepared())
            .finish()
    }
}

impl Document {
    /// Constrói o documento a partir de um bloco já lido, validando as menções.
    pub fn from_raw(
        raw: RawDocument,
        scope: TextScope,
        tokenizer: Arc<dyn Tokenizer>,
        segmenter: Arc<dyn SentenceSegmenter>,
    ) -> Result<Self> {
        let full = scoped_text(&raw.title, &raw.abstract_text, TextScope::TitleAndAbstract);
        for mention in &raw.mentions {
            check_bounds(&raw.pmid, &full, mention)?;
        }

        let (text, mentions) = match scope {
            TextScope::TitleAndAbstract => (full, raw.mentions),
            TextScope::AbstractOnly => {
                let offset = char_len(&raw.title) + 1;
                let mut kept = Vec::with_capacity(raw.mentions.len());
                for mention in raw.mentions {
                    if mention.start >= offset {
                        kept.push(mention.rebased(offset));
                    } else {
                        tracing::debug!(
                            pmid = %raw.pmid,
                            start = mention.start,
                            end = mention.end,
                            "mention outside abstract dropped"
                        );
                    }
                }
                (CharText::new(raw.abstract_text.as_str()), kept)
            }
        };

        Ok(Self {
            pmid: raw.pmid,
            title: raw.title,
            abstract_text: raw.abstract_text,
            scope,
            text,
            mentions,
            relations: raw.relations,
            tokenizer,
            segmenter,
            derived: OnceLock::new(),
        })
    }

    /// Constrói a partir de partes cujas menções já estão nas coordenadas de `scope`.
    pub(crate) fn from_scoped_parts(
        raw: RawDocument,
        scope: TextScope,
        tokenizer: Arc<dyn Tokenizer>,
        segmenter: Arc<dyn SentenceSegmenter>,
    ) -> Result<Self> {
        let text = scoped_text(&raw.title, &raw.abstract_text, scope);
        for mention in &raw.mentions {
            check_bounds(&raw.pmid, &text, mention)?;
        }
        Ok(Self {
            pmid: raw.pmid,
            title: raw.title,
            abstract_text: raw.abstract_text,
            scope,
            text,
            mentions: raw.mentions,
            relations: raw.relations,
            tokenizer,
            segmenter,
            derived: OnceLock::new(),
        })
    }

    /// Lê um único bloco PubTator em memória, com tokenizador por palavras e
    /// segmentador padrão.
    pub fn parse(block: &str) -> Result<Self> {
        Self::parse_with(block, Arc::new(WordTokenizer))
    }

    /// Como [`Document::parse`], com um tokenizador específico.
    ///
    /// Linhas em branco nas pontas são aceitas; os números de linha nos
    /// erros contam a partir do início de `block`.
    pub fn parse_with(block: &str, tokenizer: Arc<dyn Tokenizer>) -> Result<Self> {
        let file = Path::new("<memory>");
        let blocks = parser::split_blocks(block);
        let first = match blocks.as_slice() {
            [first] => first,
            [] => {
                return Err(Error::Format {
                    file: file.to_path_buf(),
                    line: 1,
                    pmid: None,
                    message: "empty block".to_string(),
                })
            }
            [first, second, ..] => {
                return Err(Error::Format {
                    file: file.to_path_buf(),
                    line: second.line,
                    pmid: parser::block_pmid(first).map(str::to_string),
                    message: format!("expected a single block, found {}", blocks.len()),
                })
            }
        };
        let raw = parser::parse_block(file, first.line, &first.lines)?;
        Self::from_raw(
            raw,
            TextScope::default(),
            tokenizer,
            Arc::new(UnicodeSentenceSegmenter),
        )
    }

    pub fn pmid(&self) -> &str {
        &self.pmid
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn abstract_text(&self) -> &str {
        &self.abstract_text
    }

    /// Texto sobre o qual os offsets das menções são definidos.
    pub fn text(&self) -> &str {
        self.text.as_str()
    }

    /// Tamanho do texto em caracteres
    pub fn text_len(&self) -> usize {
        self.text.len_chars()
    }

    /// Fatia do texto em offsets de caractere.
    pub fn slice(&self, start: usize, end: usize) -> Option<&str> {
        self.text.slice(start, end)
    }

    pub fn scope(&self) -> TextScope {
        self.scope
    }

    /// Quanto somar aos offsets do documento para voltar aos offsets do arquivo.
    pub fn file_offset(&self) -> usize {
        match self.scope {
            TextScope::TitleAndAbstract => 0,
            TextScope::AbstractOnly => char_len(&self.title) + 1,
        }
    }

    pub fn mentions(&self) -> &[Mention] {
        &self.mentions
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    /// Vincula outro tokenizador e invalida sentenças, tokens e tags.
    pub fn bind_tokenizer(&mut self, tokenizer: Arc<dyn Tokenizer>) {
        tracing::debug!(
            pmid = %self.pmid,
            tokenizer = %tokenizer.kind(),
            "derived data invalidated"
        );
        self.tokenizer = tokenizer;
        self.derived = OnceLock::new();
    }

    /// Vincula outro segmentador e invalida os dados derivados.
    pub fn bind_segmenter(&mut self, segmenter: Arc<dyn SentenceSegmenter>) {
        tracing::debug!(pmid = %self.pmid, "segmenter rebound, derived data invalidated");
        self.segmenter = segmenter;
        self.derived = OnceLock::new();
    }

    /// Os dados derivados já foram calculados?
    pub fn is_prepared(&self) -> bool {
        self.derived.get().is_some()
    }

    fn derived(&self) -> Result<&Derived> {
        if let Some(derived) = self.derived.get() {
            return Ok(derived);
        }
        let computed = self.compute()?;
        Ok(self.derived.get_or_init(|| computed))
    }

    fn compute(&self) -> Result<Derived> {
        let text_len = self.text.len_chars();
        let spans = self.segmenter.segment(self.text.as_str());
        validate_spans(&spans, text_len)?;

        let mut sentences = Vec::with_capacity(spans.len());
        let mut alignments = Vec::with_capacity(spans.len());
        for (start, end) in spans {
            let sentence_text = self.text.slice(start, end).ok_or_else(|| {
                Error::Alignment(format!("sentence ({}, {}) outside document text", start, end))
            })?;
            let tokens: Vec<Token> = self
                .tokenizer
                .tokenize(sentence_text)?
                .into_iter()
                .map(|t| t.shifted(start))
                .collect();
            let alignment = align_sentence((start, end), &tokens, &self.mentions, text_len)?;
            sentences.push(Sentence {
                span: (start, end),
                tokens,
            });
            alignments.push(alignment);
        }

        let synthetic = sentences
            .iter()
            .flat_map(|s| &s.tokens)
            .filter(|t| !t.is_mapped())
            .count();
        tracing::debug!(
            pmid = %self.pmid,
            sentences = sentences.len(),
            synthetic,
            "document aligned"
        );
        Ok(Derived {
            sentences,
            alignments,
        })
    }

    /// Força o cálculo dos dados derivados.
    pub fn prepare(&self) -> Result<()> {
        self.derived().map(|_| ())
    }

    /// Sentenças tokenizadas, em ordem.
    pub fn sentences(&self) -> Result<&[Sentence]> {
        Ok(&self.derived()?.sentences)
    }

    /// Uma sequência de tags por sentença, alinhada aos tokens da sentença.
    ///
    /// O iterador pode ser clonado ou pedido de novo quantas vezes for
    /// preciso: os valores vêm do cache.
    pub fn sentence_targets(&self) -> Result<impl Iterator<Item = &[Tag]> + Clone + '_> {
        Ok(self.derived()?.alignments.iter().map(|a| a.tags.as_slice()))
    }

    /// Resultado completo do alinhamento de cada sentença.
    pub fn alignments(&self) -> Result<&[SentenceAlignment]> {
        Ok(&self.derived()?.alignments)
    }

    /// Menções suprimidas por sobreposição, com o índice da sentença.
    pub fn suppressed(&self) -> Result<Vec<(usize, &SuppressedMention)>> {
        Ok(self
            .derived()?
            .alignments
            .iter()
            .enumerate()
            .flat_map(|(i, a)| a.suppressed.iter().map(move |s| (i, s)))
            .collect())
    }

    /// Spans reconstruídos a partir das próprias tags do documento.
    pub fn decoded_mentions(&self) -> Result<Vec<DecodedSpan>> {
        let derived = self.derived()?;
        let mut spans = Vec::new();
        for (sentence, alignment) in derived.sentences.iter().zip(&derived.alignments) {
            spans.extend(decode_tags(&sentence.tokens, &alignment.tags)?);
        }
        Ok(spans)
    }

    /// Menção dona de cada caractere do texto (mesma precedência do alinhamento).
    pub fn char_targets(&self) -> Result<Vec<Option<&Mention>>> {
        let owners = char_owners(&self.mentions, self.text.len_chars())?;
        Ok(owners
            .into_iter()
            .map(|o| o.map(|i| &self.mentions[i]))
            .collect())
    }

    /// Conjunto de textos de token do documento.
    pub fn vocab(&self) -> Result<BTreeSet<&str>> {
        Ok(self
            .derived()?
            .sentences
            .iter()
            .flat_map(|s| s.tokens.iter().map(|t| t.text.as_str()))
            .collect())
    }

    /// Menções cujo identificador de conceito aparece como argumento da relação.
    pub fn relation_mentions(&self, relation: &Relation) -> Vec<&Mention> {
        let arguments: Vec<&str> = relation
            .arguments
            .iter()
            .map(|a| normalize_concept(a))
            .collect();
        self.mentions
            .iter()
            .filter(|m| m.normalized_concepts().iter().any(|c| arguments.contains(c)))
            .collect()
    }

    /// Escreve o documento de volta no formato PubTator.
    pub fn write_pubtator<W: Write>(&self, writer: &mut W) -> Result<()> {
        parser::write_document(self, writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{Vocabulary, WordpieceTokenizer, PAD_TOKEN, UNK_TOKEN};

    const BLOCK: &str = "\
100|t|EGFR in lung cancer
100|a|EGFR mutations occur. BRCA1 loss causes breast cancer.
100\t0\t4\tEGFR\tGene\tNCBI:1956
100\t8\t19\tlung cancer\tDisease\tMESH:D008175
100\t20\t24\tEGFR\tGene\tNCBI:1956
100\t42\t47\tBRCA1\tGene\t672
100\t60\t73\tbreast cancer\tDisease\tMESH:D001943
100\t1956\tAssociation\tD008175
";

    fn labels(tags: &[Tag]) -> Vec<String> {
        tags.iter().map(Tag::label).collect()
    }

    #[test]
    fn test_parse_and_sentence_targets() {
        let doc = Document::parse(BLOCK).unwrap();
        assert_eq!(doc.pmid(), "100");
        assert_eq!(doc.mentions().len(), 5);
        assert_eq!(doc.relations().len(), 1);

        let sentences = doc.sentences().unwrap();
        assert_eq!(sentences.len(), 3);
        let targets: Vec<&[Tag]> = doc.sentence_targets().unwrap().collect();
        assert_eq!(labels(targets[0]), ["B-Gene", "O", "B-Disease", "I-Disease"]);
        assert_eq!(labels(targets[1]), ["B-Gene", "O", "O", "O"]);
        for (sentence, tags) in sentences.iter().zip(&targets) {
            assert_eq!(sentence.tokens.len(), tags.len());
        }
    }

    #[test]
    fn test_sentence_targets_are_restartable() {
        let doc = Document::parse(BLOCK).unwrap();
        let targets = doc.sentence_targets().unwrap();
        let first: Vec<_> = targets.clone().collect();
        let second: Vec<_> = targets.collect();
        let third: Vec<_> = doc.sentence_targets().unwrap().collect();
        assert_eq!(first, second);
        assert_eq!(first, third);
    }

    #[test]
    fn test_decoded_mentions_match_originals_for_word_tokens() {
        let doc = Document::parse(BLOCK).unwrap();
        let decoded = doc.decoded_mentions().unwrap();
        let got: Vec<(usize, usize, &str)> = decoded
            .iter()
            .map(|d| {
                let (s, e) = d.span.unwrap();
                (s, e, d.entity_type.as_str())
            })
            .collect();
        let expected: Vec<(usize, usize, &str)> = doc
            .mentions()
            .iter()
            .map(|m| (m.start, m.end, m.entity_type.as_str()))
            .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_mention_beyond_text_is_bounds_error() {
        let block = "7|t|Short\n7|a|Text.\n7\t6\t40\tText.\tGene\tX\n";
        let err = Document::parse(block).unwrap_err();
        assert!(matches!(err, Error::Bounds { ref pmid, .. } if pmid == "7"));
    }

    #[test]
    fn test_surface_text_mismatch_is_bounds_error() {
        let block = "7|t|Short\n7|a|Text.\n7\t0\t5\tShirt\tGene\tX\n";
        assert!(matches!(Document::parse(block), Err(Error::Bounds { .. })));
    }

    #[test]
    fn test_rebinding_tokenizer_invalidates_cache() {
        let mut doc = Document::parse(BLOCK).unwrap();
        doc.prepare().unwrap();
        assert!(doc.is_prepared());

        let vocab = Arc::new(Vocabulary::from_tokens([
            PAD_TOKEN, UNK_TOKEN, "EG", "##FR", "in", "lung", "cancer",
        ]));
        doc.bind_tokenizer(Arc::new(WordpieceTokenizer::new(vocab)));
        assert!(!doc.is_prepared());

        let first: Vec<Tag> = doc.sentence_targets().unwrap().next().unwrap().to_vec();
        assert_eq!(labels(&first), ["B-Gene", "I-Gene", "O", "B-Disease", "I-Disease"]);
        // texto e menções continuam os mesmos
        assert_eq!(doc.mentions().len(), 5);
    }

    #[test]
    fn test_rebinding_segmenter_invalidates_cache() {
        let mut doc = Document::parse(BLOCK).unwrap();
        doc.prepare().unwrap();
        assert_eq!(doc.sentences().unwrap().len(), 3);

        let whole = |text: &str| vec![(0, char_len(text))];
        doc.bind_segmenter(Arc::new(whole));
        assert!(!doc.is_prepared());

        assert_eq!(doc.sentences().unwrap().len(), 1);
        let spans: Vec<(usize, usize)> = doc
            .decoded_mentions()
            .unwrap()
            .iter()
            .filter_map(|d| d.span)
            .collect();
        assert_eq!(spans, [(0, 4), (8, 19), (20, 24), (42, 47), (60, 73)]);
    }

    #[test]
    fn test_overlapping_segmenter_spans_are_alignment_error() {
        let mut doc = Document::parse(BLOCK).unwrap();
        doc.bind_segmenter(Arc::new(|_: &str| vec![(0, 5), (3, 9)]));
        let err = doc.sentence_targets().err().expect("overlapping sentences");
        match err {
            Error::Alignment(message) => assert!(message.contains("overlaps")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!doc.is_prepared());
    }

    #[test]
    fn test_parse_counts_lines_from_block_start() {
        let block = "\n\n5|t|Title\n5|a|Abstract.\n5\t0\t5\tTitle\n";
        match Document::parse(block).unwrap_err() {
            Error::Format { line, pmid, .. } => {
                assert_eq!(line, 5);
                assert_eq!(pmid.as_deref(), Some("5"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let padded = format!("\n{}\n\n", BLOCK);
        assert_eq!(Document::parse(&padded).unwrap().mentions().len(), 5);
    }

    #[test]
    fn test_parse_rejects_several_blocks() {
        let two = format!("{}\n9|t|T\n9|a|A\n", BLOCK);
        assert!(matches!(
            Document::parse(&two),
            Err(Error::Format { line: 10, .. })
        ));
        assert!(matches!(Document::parse("\n \n"), Err(Error::Format { .. })));
    }

    #[test]
    fn test_abstract_only_scope_rebases_mentions() {
        let lines: Vec<&str> = BLOCK.lines().collect();
        let raw = parser::parse_block(Path::new("<memory>"), 1, &lines).unwrap();
        let doc = Document::from_raw(
            raw,
            TextScope::AbstractOnly,
            Arc::new(WordTokenizer),
            Arc::new(UnicodeSentenceSegmenter),
        )
        .unwrap();
        assert_eq!(doc.mentions().len(), 3);
        assert_eq!(doc.mentions()[0].start, 0);
        assert_eq!(doc.slice(0, 4), Some("EGFR"));
        assert_eq!(doc.file_offset(), 20);
    }

    #[test]
    fn test_char_targets_and_relation_mentions() {
        let doc = Document::parse(BLOCK).unwrap();
        let chars = doc.char_targets().unwrap();
        assert_eq!(chars.len(), doc.text_len());
        assert_eq!(chars[0].map(|m| m.entity_type.as_str()), Some("Gene"));
        assert!(chars[4].is_none());

        let related = doc.relation_mentions(&doc.relations()[0]);
        let texts: Vec<&str> = related.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["EGFR", "lung cancer", "EGFR"]);
    }

    #[test]
    fn test_normalized_concepts() {
        let m = Mention::new(0, 4, "EGFR", "Gene", vec!["UMLS:C0034802".into(), "1956".into()]);
        assert_eq!(m.normalized_concepts(), ["C0034802", "1956"]);
    }
}
