//! # Corpus PubTator
//!
//! Carrega um ou mais arquivos PubTator e produz a lista ordenada de
//! [`Document`]s (ordem dos arquivos, depois ordem dentro de cada arquivo).
//!
//! Todos os documentos compartilham o mesmo tokenizador (`Arc`), de modo que
//! o vocabulário é carregado uma única vez. Trocar o tokenizador com
//! [`Corpus::set_tokenizer`] invalida os dados derivados de todos os
//! documentos sem reler os arquivos.
//!
//! ## Exemplo
//!
//! ```rust,no_run
//! use pubtator_core::corpus::{Corpus, ErrorPolicy};
//!
//! let corpus = Corpus::builder()
//!     .on_error(ErrorPolicy::Skip)
//!     .load(["train.pubtator", "dev.pubtator"])
//!     .unwrap();
//! for doc in corpus.documents() {
//!     for tags in doc.sentence_targets().unwrap() {
//!         println!("{} tags", tags.len());
//!     }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::document::{normalize_concept, Document, TextScope};
use crate::error::{Error, Result};
use crate::parser::{self, block_pmid};
use crate::segmenter::{SentenceSegmenter, UnicodeSentenceSegmenter};
use crate::tokenizer::{Tokenizer, WordTokenizer};

/// O que fazer quando um bloco é malformado ou tem menções fora do texto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Interrompe a carga inteira (padrão)
    #[default]
    Abort,
    /// Descarta o documento, registra um aviso e continua
    Skip,
}

/// Documento descartado sob [`ErrorPolicy::Skip`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    pub file: PathBuf,
    /// Linha (1-based) onde o bloco começa
    pub line: usize,
    pub pmid: Option<String>,
    pub reason: String,
}

/// Opções de carga.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusOptions {
    #[serde(default)]
    pub on_error: ErrorPolicy,
    #[serde(default)]
    pub text_scope: TextScope,
}

/// Construtor de [`Corpus`].
#[derive(Default)]
pub struct CorpusBuilder {
    tokenizer: Option<Arc<dyn Tokenizer>>,
    segmenter: Option<Arc<dyn SentenceSegmenter>>,
    options: CorpusOptions,
}

impl CorpusBuilder {
    pub fn tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    /// Segmentador externo (qualquer `Fn(&str) -> Vec<(usize, usize)>` serve).
    pub fn segmenter(mut self, segmenter: Arc<dyn SentenceSegmenter>) -> Self {
        self.segmenter = Some(segmenter);
        self
    }

    pub fn on_error(mut self, policy: ErrorPolicy) -> Self {
        self.options.on_error = policy;
        self
    }

    pub fn text_scope(mut self, scope: TextScope) -> Self {
        self.options.text_scope = scope;
        self
    }

    pub fn options(mut self, options: CorpusOptions) -> Self {
        self.options = options;
        self
    }

    pub(crate) fn empty_corpus(self) -> Corpus {
        Corpus {
            documents: Vec::new(),
            files: Vec::new(),
            tokenizer: self.tokenizer.unwrap_or_else(|| Arc::new(WordTokenizer)),
            segmenter: self
                .segmenter
                .unwrap_or_else(|| Arc::new(UnicodeSentenceSegmenter)),
            options: self.options,
            skipped: Vec::new(),
        }
    }

    /// Lê os arquivos na ordem dada.
    pub fn load<I, P>(self, paths: I) -> Result<Corpus>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut corpus = self.empty_corpus();
        for path in paths {
            let path = path.as_ref();
            let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
            let before = corpus.documents.len();
            corpus.ingest(path, &content)?;
            info!(
                file = %path.display(),
                documents = corpus.documents.len() - before,
                "PubTator file loaded"
            );
        }
        corpus.log_summary();
        Ok(corpus)
    }

    /// Lê conteúdo PubTator já em memória; `name` aparece nas mensagens de erro.
    pub fn parse_str(self, name: impl AsRef<Path>, content: &str) -> Result<Corpus> {
        let mut corpus = self.empty_corpus();
        corpus.ingest(name.as_ref(), content)?;
        corpus.log_summary();
        Ok(corpus)
    }
}

/// Coleção ordenada de documentos PubTator com um tokenizador comum.
pub struct Corpus {
    documents: Vec<Document>,
    files: Vec<PathBuf>,
    tokenizer: Arc<dyn Tokenizer>,
    segmenter: Arc<dyn SentenceSegmenter>,
    options: CorpusOptions,
    skipped: Vec<SkippedDocument>,
}

impl std::fmt::Debug for Corpus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Corpus")
            .field("documents", &self.documents.len())
            .field("files", &self.files)
            .field("tokenizer", &self.tokenizer.kind())
            .field("options", &self.options)
            .field("skipped", &self.skipped.len())
            .finish()
    }
}

impl Corpus {
    pub fn builder() -> CorpusBuilder {
        CorpusBuilder::default()
    }

    /// Carrega os arquivos com o tokenizador dado (ou por palavras, se `None`).
    pub fn load<I, P>(paths: I, tokenizer: Option<Arc<dyn Tokenizer>>) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut builder = Self::builder();
        if let Some(tokenizer) = tokenizer {
            builder = builder.tokenizer(tokenizer);
        }
        builder.load(paths)
    }

    /// Como [`Corpus::load`], para conteúdo em memória.
    pub fn parse_str(content: &str, tokenizer: Option<Arc<dyn Tokenizer>>) -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(tokenizer) = tokenizer {
            builder = builder.tokenizer(tokenizer);
        }
        builder.parse_str("<memory>", content)
    }

    fn ingest(&mut self, file: &Path, content: &str) -> Result<()> {
        self.files.push(file.to_path_buf());
        for block in parser::split_blocks(content) {
            let result = parser::parse_block(file, block.line, &block.lines).and_then(|raw| {
                Document::from_raw(
                    raw,
                    self.options.text_scope,
                    Arc::clone(&self.tokenizer),
                    Arc::clone(&self.segmenter),
                )
            });
            let skip = self.options.on_error == ErrorPolicy::Skip;
            match result {
                Ok(doc) => self.documents.push(doc),
                Err(e) if skip && e.is_document_local() => {
                    let pmid = block_pmid(&block).map(str::to_string);
                    warn!(
                        file = %file.display(),
                        line = block.line,
                        pmid = pmid.as_deref().unwrap_or("?"),
                        error = %e,
                        "document skipped"
                    );
                    self.skipped.push(SkippedDocument {
                        file: file.to_path_buf(),
                        line: block.line,
                        pmid,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub(crate) fn segmenter(&self) -> &Arc<dyn SentenceSegmenter> {
        &self.segmenter
    }

    pub(crate) fn push(&mut self, doc: Document) {
        self.documents.push(doc);
    }

    pub(crate) fn log_summary(&self) {
        info!(
            documents = self.documents.len(),
            skipped = self.skipped.len(),
            tokenizer = %self.tokenizer.kind(),
            "corpus ready"
        );
    }

    /// Documentos em ordem de arquivo, depois ordem dentro do arquivo.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.documents.iter()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Arquivos lidos, em ordem.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn options(&self) -> CorpusOptions {
        self.options
    }

    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    pub fn skipped(&self) -> &[SkippedDocument] {
        &self.skipped
    }

    /// Vincula outro tokenizador a todos os documentos, invalidando seus caches.
    pub fn set_tokenizer(&mut self, tokenizer: Arc<dyn Tokenizer>) {
        for doc in &mut self.documents {
            doc.bind_tokenizer(Arc::clone(&tokenizer));
        }
        info!(
            documents = self.documents.len(),
            tokenizer = %tokenizer.kind(),
            "corpus tokenizer rebound"
        );
        self.tokenizer = tokenizer;
    }

    /// Calcula sentenças, tokens e tags de todos os documentos em paralelo.
    pub fn prepare(&self) -> Result<()> {
        self.documents.par_iter().try_for_each(Document::prepare)
    }

    /// Frequência de cada identificador de conceito (sem prefixo de namespace).
    pub fn concept_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for mention in self.documents.iter().flat_map(|d| d.mentions()) {
            for id in &mention.concept_ids {
                *counts.entry(normalize_concept(id).to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Frequência de cada tipo de entidade.
    pub fn type_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for mention in self.documents.iter().flat_map(|d| d.mentions()) {
            *counts.entry(mention.entity_type.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Vocabulário de tokens do corpus inteiro.
    pub fn vocab(&self) -> Result<BTreeSet<String>> {
        let mut vocab = BTreeSet::new();
        for doc in &self.documents {
            vocab.extend(doc.vocab()?.into_iter().map(str::to_string));
        }
        Ok(vocab)
    }

    /// Reescreve o corpus inteiro no formato PubTator.
    pub fn write_pubtator<W: Write>(&self, writer: &mut W) -> Result<()> {
        for doc in &self.documents {
            doc.write_pubtator(writer)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Corpus {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagger::Tag;
    use crate::tokenizer::{
        CharTokenizer, TokenizerKind, Vocabulary, WordpieceTokenizer, PAD_TOKEN,
    };

    const FIRST: &str = "\
1|t|Aspirin and asthma
1|a|Aspirin induced asthma.
1\t0\t7\tAspirin\tChemical\tMESH:D001241
1\t12\t18\tasthma\tDisease\tMESH:D001249
1\t19\t26\tAspirin\tChemical\tMESH:D001241
1\tD001241\tCID\tD001249

2|t|Lithium
2|a|Lithium toxicity.
2\t0\t7\tLithium\tChemical\tD008094
";

    const BROKEN: &str = "\
3|t|Fine title
3|a|Fine abstract.
3\t0\t4\tFine\tT1\tC1

4|t|Bad offsets
4|a|Short.
4\t0\t90\tBad\tT1\tC2

5|t|Another
5|a|Ok.
";

    const MISMATCHED: &str = "\
1|t|First
1|a|Fine.

2|t|Second
2|a|Broken block.
3\t0\t6\tSecond\tT1\tC1

4|t|Fourth
4|a|Fine again.
";

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_documents_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.txt", FIRST);
        let b = write_file(dir.path(), "b.txt", "9|t|Last\n9|a|One.\n");
        let corpus = Corpus::load([&b, &a], None).unwrap();
        let pmids: Vec<&str> = corpus.iter().map(Document::pmid).collect();
        assert_eq!(pmids, ["9", "1", "2"]);
        assert_eq!(corpus.files(), [b, a]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Corpus::load(["/nonexistent/corpus.txt"], None).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_abort_policy_stops_at_bad_document() {
        let err = Corpus::parse_str(BROKEN, None).unwrap_err();
        assert!(matches!(err, Error::Bounds { ref pmid, .. } if pmid == "4"));
    }

    #[test]
    fn test_skip_policy_records_skipped_document() {
        let corpus = Corpus::builder()
            .on_error(ErrorPolicy::Skip)
            .parse_str("broken.txt", BROKEN)
            .unwrap();
        let pmids: Vec<&str> = corpus.iter().map(Document::pmid).collect();
        assert_eq!(pmids, ["3", "5"]);
        let skipped = &corpus.skipped()[0];
        assert_eq!(skipped.pmid.as_deref(), Some("4"));
        assert_eq!(skipped.line, 5);
        assert_eq!(skipped.file, PathBuf::from("broken.txt"));
    }

    #[test]
    fn test_skip_policy_skips_malformed_block() {
        let corpus = Corpus::builder()
            .on_error(ErrorPolicy::Skip)
            .parse_str("f", MISMATCHED)
            .unwrap();
        let pmids: Vec<&str> = corpus.iter().map(Document::pmid).collect();
        assert_eq!(pmids, ["1", "4"]);

        assert_eq!(corpus.skipped().len(), 1);
        let skipped = &corpus.skipped()[0];
        assert_eq!(skipped.pmid.as_deref(), Some("2"));
        assert_eq!(skipped.line, 4);
        assert!(skipped.reason.starts_with("format error in f:6 (PMID 2): PMID '3' differs"));
    }

    #[test]
    fn test_abort_policy_names_malformed_document() {
        let err = Corpus::builder().parse_str("f", MISMATCHED).unwrap_err();
        match err {
            Error::Format { line, pmid, .. } => {
                assert_eq!(line, 6);
                assert_eq!(pmid.as_deref(), Some("2"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_tokenization_error_is_never_skipped() {
        let vocab = Arc::new(Vocabulary::from_tokens([PAD_TOKEN, "Aspirin", "and"]));
        let corpus = Corpus::builder()
            .on_error(ErrorPolicy::Skip)
            .tokenizer(Arc::new(WordpieceTokenizer::new(vocab)))
            .parse_str("first.txt", FIRST)
            .unwrap();
        assert_eq!(corpus.len(), 2);

        let err = corpus.prepare().unwrap_err();
        match err {
            Error::Tokenization(message) => assert!(message.contains("[UNK]")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(corpus.skipped().is_empty());
        assert_eq!(corpus.len(), 2);
    }

    #[test]
    fn test_overlapping_sentences_from_injected_segmenter() {
        let overlapping = |_: &str| vec![(0, 5), (3, 9)];
        let corpus = Corpus::builder()
            .on_error(ErrorPolicy::Skip)
            .segmenter(Arc::new(overlapping))
            .parse_str("first.txt", FIRST)
            .unwrap();
        assert!(corpus.skipped().is_empty());

        let doc = &corpus.documents()[0];
        let err = doc.sentence_targets().err().expect("overlapping sentences");
        match err {
            Error::Alignment(message) => {
                assert!(message.contains("overlaps or precedes previous sentence ending at 5"))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(corpus.prepare(), Err(Error::Alignment(_))));
    }

    #[test]
    fn test_rebinding_tokenizer_recomputes_targets() {
        let mut corpus = Corpus::parse_str(FIRST, None).unwrap();
        corpus.prepare().unwrap();
        assert!(corpus.iter().all(Document::is_prepared));
        let word_tags = corpus.documents()[1].sentence_targets().unwrap().next().unwrap().len();
        assert_eq!(word_tags, 1);

        corpus.set_tokenizer(Arc::new(CharTokenizer));
        assert!(corpus.iter().all(|d| !d.is_prepared()));
        assert_eq!(corpus.tokenizer().kind(), TokenizerKind::Char);

        let tags: Vec<Tag> = corpus.documents()[1]
            .sentence_targets()
            .unwrap()
            .next()
            .unwrap()
            .to_vec();
        assert_eq!(tags.len(), "Lithium".len());
        assert_eq!(tags[0], Tag::Begin("Chemical".into()));
        assert!(tags[1..].iter().all(|t| *t == Tag::Inside("Chemical".into())));
    }

    #[test]
    fn test_statistics() {
        let corpus = Corpus::parse_str(FIRST, None).unwrap();
        let concepts = corpus.concept_counts();
        assert_eq!(concepts["D001241"], 2);
        assert_eq!(concepts["D008094"], 1);
        let types = corpus.type_counts();
        assert_eq!(types["Chemical"], 3);
        assert_eq!(types["Disease"], 1);

        let vocab = corpus.vocab().unwrap();
        assert!(vocab.contains("Aspirin"));
        assert!(vocab.contains("toxicity"));
    }

    #[test]
    fn test_abstract_only_scope() {
        let corpus = Corpus::builder()
            .text_scope(TextScope::AbstractOnly)
            .parse_str("first.txt", FIRST)
            .unwrap();
        let doc = &corpus.documents()[0];
        assert_eq!(doc.text(), "Aspirin induced asthma.");
        assert_eq!(doc.mentions().len(), 1);

        let mut out = Vec::new();
        doc.write_pubtator(&mut out).unwrap();
        let written = String::from_utf8(out).unwrap();
        assert!(written.contains("1\t19\t26\tAspirin"));
    }

    #[test]
    fn test_custom_segmenter_closure() {
        let whole = |text: &str| vec![(0, text.chars().count())];
        let corpus = Corpus::builder()
            .segmenter(Arc::new(whole))
            .parse_str("first.txt", FIRST)
            .unwrap();
        assert_eq!(corpus.documents()[0].sentences().unwrap().len(), 1);
    }

    #[test]
    fn test_write_pubtator_round_trip() {
        let corpus = Corpus::parse_str(FIRST, None).unwrap();
        let mut out = Vec::new();
        corpus.write_pubtator(&mut out).unwrap();
        let again = Corpus::parse_str(&String::from_utf8(out).unwrap(), None).unwrap();
        assert_eq!(again.len(), corpus.len());
        assert_eq!(again.documents()[0].mentions(), corpus.documents()[0].mentions());
        assert_eq!(again.documents()[0].relations(), corpus.documents()[0].relations());
    }
}
