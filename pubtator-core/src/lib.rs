//! # pubtator-core: Corpus PubTator e Alinhamento de Menções a Tokens
//!
//! Este crate carrega corpora biomédicos no formato PubTator (título, abstract,
//! menções e relações por documento) e produz sequências de tags **IOB2**
//! alinhadas aos tokens de cada sentença, prontas para treinar modelos de
//! rotulagem de sequência (NER).
//!
//! ## Fluxo dos Dados
//!
//! 1.  **Entrada**: um ou mais arquivos PubTator ([`parser`]).
//! 2.  **Documento** ([`document`]): texto `título + "\n" + abstract`, menções
//!     e relações, validados na carga.
//! 3.  **Segmentação** ([`segmenter`]): o texto é dividido em sentenças por um
//!     segmentador injetado.
//! 4.  **Tokenização** ([`tokenizer`]): palavras, caracteres ou sub-palavras
//!     (wordpiece), com offsets.
//! 5.  **Alinhamento** ([`align`]): cada menção vira `B-TIPO`/`I-TIPO` nos tokens que ela cobre.
//! 6.  **Saída**: `sentence_targets()`, uma sequência de [`Tag`] por sentença.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use pubtator_core::{Corpus, Tag};
//!
//! let content = "\
//! 1|t|EGFR in lung cancer
//! 1|a|EGFR mutations occur.
//! 1\t0\t4\tEGFR\tGene\tNCBI:1956
//! 1\t20\t24\tEGFR\tGene\tNCBI:1956
//! ";
//!
//! // 1. Carrega o corpus (tokenizador por palavras por padrão)
//! let corpus = Corpus::parse_str(content, None).unwrap();
//!
//! // 2. Uma sequência de tags por sentença
//! let doc = &corpus.documents()[0];
//! let targets: Vec<&[Tag]> = doc.sentence_targets().unwrap().collect();
//! let labels: Vec<String> = targets[1].iter().map(Tag::label).collect();
//! assert_eq!(labels, ["B-Gene", "O", "O", "O"]);
//! ```
//!
//! ## Módulos Principais
//!
//! - [`corpus`]: carga de arquivos, políticas de erro e estatísticas.
//! - [`align`]: o motor de alinhamento (direto e inverso).
//! - [`config`]: configuração JSON do tokenizador e do corpus.
//! - [`schema`]: persistência versionada.

pub mod align;
pub mod config;
pub mod corpus;
pub mod document;
pub mod error;
pub mod export;
pub mod parser;
pub mod schema;
pub mod segmenter;
pub mod tagger;
pub mod text;
pub mod tokenizer;

pub use align::{DecodedSpan, SentenceAlignment, SuppressedMention};
pub use config::{CorpusConfig, TokenizerConfig};
pub use corpus::{Corpus, CorpusBuilder, CorpusOptions, ErrorPolicy, SkippedDocument};
pub use document::{Document, Mention, Relation, Sentence, TextScope};
pub use error::{Error, Result};
pub use segmenter::{SentenceSegmenter, UnicodeSentenceSegmenter};
pub use tagger::Tag;
pub use tokenizer::{
    CharTokenizer, Token, TokenOrigin, Tokenizer, TokenizerKind, Vocabulary, WordTokenizer,
    WordpieceTokenizer,
};
