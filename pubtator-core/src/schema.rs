//! # Esquema de Persistência Versionado
//!
//! Registros serde explícitos para Document/Mention/Relation/Token, em vez de
//! despejar o grafo de objetos inteiro. Todo registro carrega
//! `schema_version`; versões desconhecidas falham com [`Error::Schema`].
//!
//! Sentenças e tags são opcionais no registro: servem para inspeção e para
//! consumidores externos. Ao reconstruir um [`Document`] elas são ignoradas e
//! recalculadas com o tokenizador vinculado.

use std::io::{Read, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::corpus::{Corpus, CorpusBuilder};
use crate::document::{Document, Mention, Relation, TextScope};
use crate::error::{Error, Result};
use crate::parser::RawDocument;
use crate::segmenter::SentenceSegmenter;
use crate::tagger::Tag;
use crate::tokenizer::{TokenOrigin, Tokenizer, TokenizerKind};

/// Versão atual do esquema
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionRecord {
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub entity_type: String,
    #[serde(default)]
    pub concept_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRecord {
    pub kind: String,
    pub arguments: Vec<String>,
}

/// Token com a sua tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub text: String,
    pub offsets: Option<(usize, usize)>,
    pub origin: TokenOrigin,
    pub tag: Tag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceRecord {
    pub span: (usize, usize),
    pub tokens: Vec<TokenRecord>,
}

/// Um documento. Offsets das menções estão nas coordenadas de `text_scope`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub schema_version: u32,
    pub pmid: String,
    pub title: String,
    pub abstract_text: String,
    #[serde(default)]
    pub text_scope: TextScope,
    pub mentions: Vec<MentionRecord>,
    #[serde(default)]
    pub relations: Vec<RelationRecord>,
    /// Tokenizador que produziu `sentences`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer: Option<TokenizerKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentences: Option<Vec<SentenceRecord>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusRecord {
    pub schema_version: u32,
    pub documents: Vec<DocumentRecord>,
}

fn check_version(found: u32) -> Result<()> {
    if found != SCHEMA_VERSION {
        return Err(Error::Schema(format!(
            "unsupported schema version {} (supported: {})",
            found, SCHEMA_VERSION
        )));
    }
    Ok(())
}

impl From<&Mention> for MentionRecord {
    fn from(m: &Mention) -> Self {
        Self {
            start: m.start,
            end: m.end,
            text: m.text.clone(),
            entity_type: m.entity_type.clone(),
            concept_ids: m.concept_ids.clone(),
        }
    }
}

impl From<MentionRecord> for Mention {
    fn from(r: MentionRecord) -> Self {
        Mention::new(r.start, r.end, r.text, r.entity_type, r.concept_ids)
    }
}

impl From<&Relation> for RelationRecord {
    fn from(r: &Relation) -> Self {
        Self {
            kind: r.kind.clone(),
            arguments: r.arguments.clone(),
        }
    }
}

impl From<RelationRecord> for Relation {
    fn from(r: RelationRecord) -> Self {
        Relation {
            kind: r.kind,
            arguments: r.arguments,
        }
    }
}

impl Document {
    /// Registro versionado do documento; `include_sentences` inclui tokens e tags.
    pub fn to_record(&self, include_sentences: bool) -> Result<DocumentRecord> {
        let sentences = if include_sentences {
            let records = self
                .sentences()?
                .iter()
                .zip(self.sentence_targets()?)
                .map(|(sentence, tags)| SentenceRecord {
                    span: sentence.span,
                    tokens: sentence
                        .tokens
                        .iter()
                        .zip(tags)
                        .map(|(token, tag)| TokenRecord {
                            text: token.text.clone(),
                            offsets: token.offsets,
                            origin: token.origin,
                            tag: tag.clone(),
                        })
                        .collect(),
                })
                .collect();
            Some(records)
        } else {
            None
        };

        Ok(DocumentRecord {
            schema_version: SCHEMA_VERSION,
            pmid: self.pmid().to_string(),
            title: self.title().to_string(),
            abstract_text: self.abstract_text().to_string(),
            text_scope: self.scope(),
            mentions: self.mentions().iter().map(MentionRecord::from).collect(),
            relations: self.relations().iter().map(RelationRecord::from).collect(),
            tokenizer: sentences.as_ref().map(|_| self.tokenizer().kind()),
            sentences,
        })
    }

    /// Reconstrói um documento, validando versão e offsets de novo.
    pub fn from_record(
        record: DocumentRecord,
        tokenizer: Arc<dyn Tokenizer>,
        segmenter: Arc<dyn SentenceSegmenter>,
    ) -> Result<Self> {
        check_version(record.schema_version)?;
        let raw = RawDocument {
            pmid: record.pmid,
            title: record.title,
            abstract_text: record.abstract_text,
            mentions: record.mentions.into_iter().map(Mention::from).collect(),
            relations: record.relations.into_iter().map(Relation::from).collect(),
        };
        Document::from_scoped_parts(raw, record.text_scope, tokenizer, segmenter)
    }
}

impl Corpus {
    pub fn to_record(&self, include_sentences: bool) -> Result<CorpusRecord> {
        Ok(CorpusRecord {
            schema_version: SCHEMA_VERSION,
            documents: self
                .iter()
                .map(|d| d.to_record(include_sentences))
                .collect::<Result<_>>()?,
        })
    }

    /// JSON do corpus inteiro.
    pub fn write_json<W: Write>(&self, writer: W, include_sentences: bool) -> Result<()> {
        serde_json::to_writer_pretty(writer, &self.to_record(include_sentences)?)?;
        Ok(())
    }
}

impl CorpusBuilder {
    /// Constrói um corpus a partir de um registro, com o tokenizador e o
    /// segmentador deste construtor.
    pub fn from_record(self, record: CorpusRecord) -> Result<Corpus> {
        check_version(record.schema_version)?;
        let mut corpus = self.empty_corpus();
        for doc in record.documents {
            let doc = Document::from_record(
                doc,
                Arc::clone(corpus.tokenizer()),
                Arc::clone(corpus.segmenter()),
            )?;
            corpus.push(doc);
        }
        corpus.log_summary();
        Ok(corpus)
    }

    pub fn read_json<R: Read>(self, reader: R) -> Result<Corpus> {
        let record: CorpusRecord = serde_json::from_reader(reader)?;
        self.from_record(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmenter::UnicodeSentenceSegmenter;
    use crate::tokenizer::WordTokenizer;

    const BLOCK: &str = "\
12|t|Cocaine overdose
12|a|Cocaine causes seizures.
12\t0\t7\tCocaine\tChemical\tD003042
12\t17\t24\tCocaine\tChemical\tD003042
12\t32\t40\tseizures\tDisease\tD012640
12\tD003042\tCID\tD012640
";

    #[test]
    fn test_document_record_round_trip() {
        let doc = Document::parse(BLOCK).unwrap();
        let record = doc.to_record(false).unwrap();
        assert_eq!(record.schema_version, SCHEMA_VERSION);
        assert!(record.sentences.is_none());

        let json = serde_json::to_string(&record).unwrap();
        let back: DocumentRecord = serde_json::from_str(&json).unwrap();
        let rebuilt = Document::from_record(
            back,
            Arc::new(WordTokenizer),
            Arc::new(UnicodeSentenceSegmenter),
        )
        .unwrap();
        assert_eq!(rebuilt.mentions(), doc.mentions());
        assert_eq!(rebuilt.relations(), doc.relations());
        assert_eq!(rebuilt.text(), doc.text());
    }

    #[test]
    fn test_record_with_sentences_carries_tags() {
        let doc = Document::parse(BLOCK).unwrap();
        let record = doc.to_record(true).unwrap();
        assert_eq!(record.tokenizer, Some(TokenizerKind::Word));
        let sentences = record.sentences.unwrap();
        assert_eq!(sentences.len(), 2);
        let first = &sentences[0].tokens[0];
        assert_eq!(first.text, "Cocaine");
        assert_eq!(first.tag, Tag::Begin("Chemical".into()));
        assert_eq!(first.offsets, Some((0, 7)));
    }

    #[test]
    fn test_unknown_version_is_schema_error() {
        let mut record = Document::parse(BLOCK).unwrap().to_record(false).unwrap();
        record.schema_version = 99;
        let err = Document::from_record(
            record,
            Arc::new(WordTokenizer),
            Arc::new(UnicodeSentenceSegmenter),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_tampered_offsets_are_revalidated() {
        let mut record = Document::parse(BLOCK).unwrap().to_record(false).unwrap();
        record.mentions[0].end = 500;
        let err = Document::from_record(
            record,
            Arc::new(WordTokenizer),
            Arc::new(UnicodeSentenceSegmenter),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Bounds { .. }));
    }

    #[test]
    fn test_corpus_json_round_trip() {
        let corpus = Corpus::parse_str(BLOCK, None).unwrap();
        let mut buf = Vec::new();
        corpus.write_json(&mut buf, true).unwrap();
        let back = Corpus::builder().read_json(buf.as_slice()).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.documents()[0].mentions(), corpus.documents()[0].mentions());
        let tags: Vec<Vec<Tag>> = back.documents()[0]
            .sentence_targets()
            .unwrap()
            .map(<[Tag]>::to_vec)
            .collect();
        let expected: Vec<Vec<Tag>> = corpus.documents()[0]
            .sentence_targets()
            .unwrap()
            .map(<[Tag]>::to_vec)
            .collect();
        assert_eq!(tags, expected);
    }
}
