//! # Erros do pubtator-core
//!
//! Taxonomia de falhas do carregamento e do alinhamento:
//!
//! | Variante        | Quando ocorre                                                 |
//! |-----------------|---------------------------------------------------------------|
//! | `Format`        | Bloco PubTator malformado (arquivo, linha e PMID se houver)   |
//! | `Bounds`        | Menção fora do texto ou com texto de superfície divergente    |
//! | `Tokenization`  | O tokenizador não consegue codificar o texto de forma alguma  |
//! | `Alignment`     | Violação estrutural dentro do motor de alinhamento            |
//! | `Config`        | Opção de configuração desconhecida ou inválida                |
//! | `Schema`        | Registro persistido com versão de esquema não suportada       |
//!
//! Divergências benignas causadas pela tokenização (sub-palavras, `[UNK]`,
//! pontuação descartada) **nunca** viram erro: são resolvidas pelas políticas
//! determinísticas do módulo [`align`](crate::align).

use std::path::PathBuf;

/// Alias de resultado usado em todo o crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(
        "format error in {}:{line}{}: {message}",
        file.display(),
        pmid.as_deref().map(|p| format!(" (PMID {})", p)).unwrap_or_default()
    )]
    Format {
        file: PathBuf,
        line: usize,
        /// PMID do bloco, quando a primeira linha permite identificá-lo
        pmid: Option<String>,
        message: String,
    },

    #[error("bounds error in document {pmid} at ({start}, {end}): {message}")]
    Bounds {
        pmid: String,
        start: usize,
        end: usize,
        message: String,
    },

    #[error("Tokenization error: {0}")]
    Tokenization(String),

    #[error("Alignment error: {0}")]
    Alignment(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Write error: {0}")]
    Write(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Indica se o erro pertence a um único documento (e pode ser pulado
    /// quando o corpus é carregado com `ErrorPolicy::Skip`).
    pub fn is_document_local(&self) -> bool {
        matches!(self, Error::Format { .. } | Error::Bounds { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
