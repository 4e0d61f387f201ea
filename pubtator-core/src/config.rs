//! Configuração do carregamento (JSON via serde).
//!
//! ```json
//! {
//!   "files": ["train.pubtator"],
//!   "tokenizer": { "tokenization": "wordpiece", "vocab": "biobert/", "lowercase": false },
//!   "on_error": "skip",
//!   "text_scope": "title_and_abstract"
//! }
//! ```
//!
//! Valores desconhecidos falham com [`Error::Config`] na construção, nunca
//! no meio da carga.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::corpus::{Corpus, CorpusOptions, ErrorPolicy};
use crate::document::TextScope;
use crate::error::{Error, Result};
use crate::tokenizer::{
    CharTokenizer, Tokenizer, TokenizerKind, Vocabulary, WordTokenizer, WordpieceTokenizer,
};

fn default_tokenization() -> String {
    TokenizerKind::default().name().to_string()
}

/// Escolha e parâmetros do tokenizador.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenizerConfig {
    /// "word", "char" ou "wordpiece" (aliases: "character", "wp")
    #[serde(default = "default_tokenization")]
    pub tokenization: String,
    /// Arquivo de vocabulário (ou diretório com `vocab.txt`); exigido por wordpiece
    #[serde(default)]
    pub vocab: Option<PathBuf>,
    /// Minúsculas antes do wordpiece (modelos "uncased")
    #[serde(default)]
    pub lowercase: bool,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            tokenization: default_tokenization(),
            vocab: None,
            lowercase: false,
        }
    }
}

impl TokenizerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn kind(&self) -> Result<TokenizerKind> {
        self.tokenization.parse()
    }

    /// Constrói o tokenizador. O vocabulário é lido aqui, uma única vez.
    pub fn build(&self) -> Result<Arc<dyn Tokenizer>> {
        let tokenizer: Arc<dyn Tokenizer> = match self.kind()? {
            TokenizerKind::Word => Arc::new(WordTokenizer),
            TokenizerKind::Char => Arc::new(CharTokenizer),
            TokenizerKind::Wordpiece => {
                let path = self.vocab.as_ref().ok_or_else(|| {
                    Error::Config("wordpiece tokenization requires a 'vocab' path".to_string())
                })?;
                let vocab = Vocabulary::from_file(path)?;
                Arc::new(WordpieceTokenizer::new(Arc::new(vocab)).with_lowercase(self.lowercase))
            }
        };
        Ok(tokenizer)
    }
}

/// Configuração completa de um corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorpusConfig {
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub tokenizer: Option<TokenizerConfig>,
    #[serde(default)]
    pub on_error: ErrorPolicy,
    #[serde(default)]
    pub text_scope: TextScope,
}

impl CorpusConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Lê a configuração de um arquivo JSON. Caminhos relativos em `files`
    /// e `vocab` são resolvidos a partir do diretório do arquivo.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut config = Self::from_json(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for file in &mut self.files {
            if file.is_relative() {
                *file = base.join(&*file);
            }
        }
        if let Some(vocab) = self.tokenizer.as_mut().and_then(|t| t.vocab.as_mut()) {
            if vocab.is_relative() {
                *vocab = base.join(&*vocab);
            }
        }
    }

    pub fn options(&self) -> CorpusOptions {
        CorpusOptions {
            on_error: self.on_error,
            text_scope: self.text_scope,
        }
    }

    /// Constrói o tokenizador e carrega os arquivos.
    pub fn load(&self) -> Result<Corpus> {
        let tokenizer = self.tokenizer.clone().unwrap_or_default().build()?;
        Corpus::builder()
            .tokenizer(tokenizer)
            .options(self.options())
            .load(&self.files)
    }
}
