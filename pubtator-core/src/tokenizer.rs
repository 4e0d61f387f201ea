//! # Tokenizadores com proveniência de offsets
//!
//! Divide o texto em tokens preservando, para cada token, o intervalo de
//! caracteres `[start, end)` no texto de entrada. São esses offsets que
//! permitem ao motor de [`align`](crate::align) projetar as menções do
//! PubTator sobre a saída do tokenizador.
//!
//! ## Variantes
//!
//! - **Word**: sequências alfanuméricas e cada sinal de pontuação isolado.
//!   Preserva números decimais (ex: "1.5"). Offsets exatos.
//! - **Char**: cada caractere que não é espaço vira um token.
//! - **Wordpiece**: sub-palavras de um vocabulário fixo (estilo BERT). Uma
//!   palavra pode gerar vários tokens (continuações marcadas com `##`);
//!   palavras fora do vocabulário viram um `[UNK]` sintético, sem offsets.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use pubtator_core::tokenizer::{Tokenizer, WordTokenizer};
//!
//! let tokens = WordTokenizer.tokenize("EGFR mutations occur.").unwrap();
//! let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
//! assert_eq!(texts, ["EGFR", "mutations", "occur", "."]);
//! assert_eq!(tokens[1].offsets, Some((5, 14)));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Prefixo das peças de continuação no vocabulário wordpiece
pub const CONTINUATION_PREFIX: &str = "##";
/// Token desconhecido
pub const UNK_TOKEN: &str = "[UNK]";
/// Token de preenchimento
pub const PAD_TOKEN: &str = "[PAD]";

/// Origem de um token em relação ao texto original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenOrigin {
    /// Início de palavra, mapeado no texto.
    Word,
    /// Continuação de palavra (sub-palavra `##xx`), mapeada no texto.
    Continuation,
    /// Token sintético (`[UNK]`, marcadores de controle): sem offsets.
    Synthetic,
}

/// Um token extraído do texto.
///
/// `offsets` é `None` para tokens sintéticos; para os demais é um intervalo
/// `[start, end)` não vazio, em caracteres. Depois de passar pelo
/// [`Document`](crate::document::Document) os offsets são absolutos no texto
/// do documento.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// O texto do token (ex: "EGFR", "##FR", "[UNK]").
    pub text: String,
    /// Intervalo de caracteres no texto original, se mapeado.
    pub offsets: Option<(usize, usize)>,
    /// Índice sequencial do token na lista (0, 1, 2...).
    pub index: usize,
    pub origin: TokenOrigin,
}

impl Token {
    /// Token mapeado no texto
    pub fn mapped(text: impl Into<String>, start: usize, end: usize, origin: TokenOrigin) -> Self {
        Self {
            text: text.into(),
            offsets: Some((start, end)),
            index: 0,
            origin,
        }
    }

    /// Token sintético (sem offsets)
    pub fn synthetic(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            offsets: None,
            index: 0,
            origin: TokenOrigin::Synthetic,
        }
    }

    pub fn is_mapped(&self) -> bool {
        self.offsets.is_some()
    }

    /// Desloca os offsets (texto da sentença → texto do documento).
    pub fn shifted(mut self, by: usize) -> Self {
        self.offsets = self.offsets.map(|(s, e)| (s + by, e + by));
        self
    }

    /// Texto de superfície sem o prefixo de continuação.
    pub fn surface(&self) -> &str {
        match self.origin {
            TokenOrigin::Continuation => self
                .text
                .strip_prefix(CONTINUATION_PREFIX)
                .unwrap_or(&self.text),
            _ => &self.text,
        }
    }
}

/// Estratégias de tokenização disponíveis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    /// **Palavra**: separa por espaços e pontuações.
    Word,
    /// **Caractere**: cada caractere não branco é um token.
    Char,
    /// **Wordpiece**: sub-palavras de um vocabulário fixo.
    Wordpiece,
}

impl Default for TokenizerKind {
    fn default() -> Self {
        TokenizerKind::Word
    }
}

impl TokenizerKind {
    pub fn name(&self) -> &'static str {
        match self {
            TokenizerKind::Word => "word",
            TokenizerKind::Char => "char",
            TokenizerKind::Wordpiece => "wordpiece",
        }
    }
}

impl fmt::Display for TokenizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TokenizerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "word" => Ok(TokenizerKind::Word),
            "char" | "character" => Ok(TokenizerKind::Char),
            "wordpiece" | "wp" => Ok(TokenizerKind::Wordpiece),
            other => Err(Error::Config(format!(
                "'{}' not recognized as a tokenization; available: 'word', 'char', 'wordpiece'",
                other
            ))),
        }
    }
}

/// Contrato comum dos tokenizadores.
///
/// `tokenize` devolve tokens em ordem, sem sobreposição entre os mapeados.
/// `decode` é melhor-esforço e nunca falha.
pub trait Tokenizer: Send + Sync + fmt::Debug {
    fn kind(&self) -> TokenizerKind;

    fn tokenize(&self, text: &str) -> Result<Vec<Token>>;

    fn decode(&self, tokens: &[Token]) -> String {
        join_tokens(tokens)
    }
}

/// Tokenizador por palavras.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn kind(&self) -> TokenizerKind {
        TokenizerKind::Word
    }

    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        Ok(reindex(tokenize_word(text)))
    }
}

/// Tokenizador por caracteres.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn kind(&self) -> TokenizerKind {
        TokenizerKind::Char
    }

    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        Ok(reindex(tokenize_char_level(text)))
    }
}

fn reindex(mut tokens: Vec<Token>) -> Vec<Token> {
    for (i, token) in tokens.iter_mut().enumerate() {
        token.index = i;
    }
    tokens
}

fn tokenize_char_level(text: &str) -> Vec<Token> {
    text.chars()
        .enumerate()
        .filter(|(_, c)| !c.is_whitespace())
        .map(|(i, c)| Token::mapped(c.to_string(), i, i + 1, TokenOrigin::Word))
        .collect()
}

fn tokenize_word(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current_start = 0;
    let mut current_text = String::new();
    let chars: Vec<char> = text.chars().collect();

    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_alphanumeric() {
            if current_text.is_empty() {
                current_start = i;
            }
            current_text.push(ch);
        } else if ch == '.' && !current_text.is_empty() {
            // Número decimal (ex: 1.5) continua no mesmo token
            let current_is_num = current_text.chars().all(|c| c.is_numeric() || c == '.');
            let next_is_num = chars.get(i + 1).map(|c| c.is_numeric()).unwrap_or(false);
            if current_is_num && next_is_num {
                current_text.push('.');
            } else {
                flush_token(&mut tokens, &mut current_text, current_start, i);
                push_token(&mut tokens, ".".to_string(), i, i + 1);
            }
        } else if ch.is_whitespace() {
            flush_token(&mut tokens, &mut current_text, current_start, i);
        } else {
            flush_token(&mut tokens, &mut current_text, current_start, i);
            push_token(&mut tokens, ch.to_string(), i, i + 1);
        }
    }

    flush_token(&mut tokens, &mut current_text, current_start, chars.len());
    tokens
}

/// Fecha o token acumulado e adiciona à lista (se não vazio)
fn flush_token(tokens: &mut Vec<Token>, text: &mut String, start: usize, end: usize) {
    if !text.is_empty() {
        tokens.push(Token::mapped(text.clone(), start, end, TokenOrigin::Word));
        text.clear();
    }
}

/// Adiciona um token de pontuação diretamente
fn push_token(tokens: &mut Vec<Token>, text: String, start: usize, end: usize) {
    tokens.push(Token::mapped(text, start, end, TokenOrigin::Word));
}

fn is_punctuation(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(c), None) if !c.is_alphanumeric() && !c.is_whitespace()
    )
}

/// Reconstrói texto a partir de tokens.
///
/// Entre dois tokens mapeados, insere um espaço somente se havia um
/// intervalo entre eles no texto original. Sem offsets, recorre à heurística:
/// continuações e pontuação colam no token anterior.
pub fn join_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;

    for token in tokens {
        let surface = token.surface();
        if let Some(p) = prev {
            let space = match (p.offsets, token.offsets) {
                (Some((_, prev_end)), Some((start, _))) => start > prev_end,
                _ => token.origin != TokenOrigin::Continuation && !is_punctuation(surface),
            };
            if space {
                out.push(' ');
            }
        }
        out.push_str(surface);
        prev = Some(token);
    }
    out
}

/// Vocabulário fixo de sub-palavras.
///
/// Carregado uma única vez e compartilhado (`Arc`) por todos os documentos.
/// Os ids seguem a ordem das linhas do arquivo.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    tokens: Vec<String>,
    ids: HashMap<String, u32>,
}

impl Vocabulary {
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocab = Vocabulary::default();
        for token in tokens {
            let token = token.into();
            if vocab.ids.contains_key(&token) {
                continue;
            }
            vocab.ids.insert(token.clone(), vocab.tokens.len() as u32);
            vocab.tokens.push(token);
        }
        vocab
    }

    /// Lê um vocabulário com um token por linha. Aceita o caminho do arquivo
    /// ou de um diretório contendo `vocab.txt`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file: PathBuf = if path.is_dir() {
            path.join("vocab.txt")
        } else {
            path.to_path_buf()
        };
        if !file.is_file() {
            return Err(Error::Config(format!(
                "vocabulary '{}' is not a readable file",
                file.display()
            )));
        }
        let content = std::fs::read_to_string(&file).map_err(|e| Error::io(&file, e))?;
        let vocab = Self::from_tokens(
            content
                .lines()
                .map(|l| l.trim_end_matches('\r'))
                .filter(|l| !l.is_empty()),
        );
        if vocab.is_empty() {
            return Err(Error::Config(format!(
                "vocabulary '{}' is empty",
                file.display()
            )));
        }
        tracing::info!(path = %file.display(), size = vocab.len(), "vocabulary loaded");
        Ok(vocab)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.ids.contains_key(token)
    }

    pub fn id(&self, token: &str) -> Option<u32> {
        self.ids.get(token).copied()
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    /// Converte tokens em ids; desconhecidos viram o id de `[UNK]`.
    pub fn encode(&self, tokens: &[Token]) -> Result<Vec<u32>> {
        let unk = self.id(UNK_TOKEN);
        tokens
            .iter()
            .map(|t| {
                self.id(&t.text).or(unk).ok_or_else(|| {
                    Error::Tokenization(format!(
                        "token '{}' not in vocabulary and no {} entry",
                        t.text, UNK_TOKEN
                    ))
                })
            })
            .collect()
    }

    /// Converte ids de volta em tokens sintéticos (sem offsets).
    pub fn decode_ids(&self, ids: &[u32]) -> Vec<Token> {
        let tokens: Vec<Token> = ids
            .iter()
            .map(|&id| {
                let text = self.token(id).unwrap_or(UNK_TOKEN);
                match text.strip_prefix(CONTINUATION_PREFIX) {
                    Some(_) => Token {
                        origin: TokenOrigin::Continuation,
                        ..Token::synthetic(text)
                    },
                    None => Token::synthetic(text),
                }
            })
            .collect();
        reindex(tokens)
    }
}

/// Tokenizador wordpiece (guloso, maior prefixo primeiro).
#[derive(Debug, Clone)]
pub struct WordpieceTokenizer {
    vocab: Arc<Vocabulary>,
    lowercase: bool,
    max_input_chars_per_word: usize,
}

impl WordpieceTokenizer {
    pub fn new(vocab: Arc<Vocabulary>) -> Self {
        Self {
            vocab,
            lowercase: false,
            max_input_chars_per_word: 100,
        }
    }

    /// Converte para minúsculas antes de consultar o vocabulário (uncased).
    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    pub fn vocab(&self) -> &Arc<Vocabulary> {
        &self.vocab
    }

    fn unknown(&self, word: &str) -> Result<Token> {
        if self.vocab.contains(UNK_TOKEN) {
            Ok(Token::synthetic(UNK_TOKEN))
        } else {
            Err(Error::Tokenization(format!(
                "cannot encode '{}': no vocabulary match and no {} entry",
                word, UNK_TOKEN
            )))
        }
    }

    /// Quebra uma palavra `chars[start..end]` em peças do vocabulário.
    fn split_word(
        &self,
        chars: &[char],
        start: usize,
        end: usize,
        out: &mut Vec<Token>,
    ) -> Result<()> {
        // Texto normalizado + caractere de origem de cada posição
        let mut norm: Vec<char> = Vec::with_capacity(end - start);
        let mut origin: Vec<usize> = Vec::with_capacity(end - start);
        for (i, &c) in chars.iter().enumerate().take(end).skip(start) {
            if self.lowercase {
                for lc in c.to_lowercase() {
                    norm.push(lc);
                    origin.push(i);
                }
            } else {
                norm.push(c);
                origin.push(i);
            }
        }

        let word: String = chars[start..end].iter().collect();
        if norm.len() > self.max_input_chars_per_word {
            out.push(self.unknown(&word)?);
            return Ok(());
        }

        let mut pieces: Vec<(String, usize, usize)> = Vec::new();
        let mut s = 0;
        while s < norm.len() {
            let mut e = norm.len();
            let mut found = None;
            while s < e {
                let sub: String = norm[s..e].iter().collect();
                let candidate = if s > 0 {
                    format!("{}{}", CONTINUATION_PREFIX, sub)
                } else {
                    sub
                };
                if self.vocab.contains(&candidate) {
                    found = Some(candidate);
                    break;
                }
                e -= 1;
            }
            match found {
                Some(piece) => {
                    pieces.push((piece, s, e));
                    s = e;
                }
                None => {
                    out.push(self.unknown(&word)?);
                    return Ok(());
                }
            }
        }

        let mut prev_end = start;
        for (piece, s, e) in pieces {
            let origin_kind = if s == 0 {
                TokenOrigin::Word
            } else {
                TokenOrigin::Continuation
            };
            let piece_start = origin[s].max(prev_end);
            let piece_end = origin[e - 1] + 1;
            if piece_start < piece_end {
                out.push(Token::mapped(piece, piece_start, piece_end, origin_kind));
                prev_end = piece_end;
            } else {
                // Peça caiu dentro de um caractere expandido pela normalização
                out.push(Token {
                    origin: origin_kind,
                    ..Token::synthetic(piece)
                });
            }
        }
        Ok(())
    }
}

impl Tokenizer for WordpieceTokenizer {
    fn kind(&self) -> TokenizerKind {
        TokenizerKind::Wordpiece
    }

    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        let chars: Vec<char> = text.chars().collect();
        let mut tokens = Vec::new();
        for (start, end) in basic_split(&chars) {
            self.split_word(&chars, start, end, &mut tokens)?;
        }
        Ok(reindex(tokens))
    }
}

/// Pré-tokenização estilo BERT: separa por espaços e isola cada pontuação.
fn basic_split(chars: &[char]) -> Vec<(usize, usize)> {
    let mut words = Vec::new();
    let mut word_start: Option<usize> = None;

    for (i, &c) in chars.iter().enumerate() {
        if c.is_whitespace() || !c.is_alphanumeric() {
            if let Some(s) = word_start.take() {
                words.push((s, i));
            }
            if !c.is_whitespace() {
                words.push((i, i + 1));
            }
        } else if word_start.is_none() {
            word_start = Some(i);
        }
    }
    if let Some(s) = word_start {
        words.push((s, chars.len()));
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::normalize_whitespace;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    fn bio_vocab() -> Arc<Vocabulary> {
        Arc::new(Vocabulary::from_tokens([
            PAD_TOKEN, UNK_TOKEN, "EG", "##FR", "mutation", "##s", "occur", ".", "in", "cancer",
        ]))
    }

    #[test]
    fn test_word_tokenizer_offsets() {
        let tokens = WordTokenizer.tokenize("EGFR mutations occur.").unwrap();
        assert_eq!(texts(&tokens), ["EGFR", "mutations", "occur", "."]);
        let offsets: Vec<_> = tokens.iter().map(|t| t.offsets.unwrap()).collect();
        assert_eq!(offsets, [(0, 4), (5, 14), (15, 20), (20, 21)]);
        assert_eq!(tokens[3].index, 3);
    }

    #[test]
    fn test_word_tokenizer_keeps_decimals_and_splits_hyphens() {
        let tokens = WordTokenizer.tokenize("TNF-alpha at 1.5 mg.").unwrap();
        assert_eq!(texts(&tokens), ["TNF", "-", "alpha", "at", "1.5", "mg", "."]);
    }

    #[test]
    fn test_word_tokenizer_char_offsets_with_unicode() {
        let tokens = WordTokenizer.tokenize("α-synuclein é").unwrap();
        assert_eq!(texts(&tokens), ["α", "-", "synuclein", "é"]);
        assert_eq!(tokens[2].offsets, Some((2, 11)));
        assert_eq!(tokens[3].offsets, Some((12, 13)));
    }

    #[test]
    fn test_word_decode_is_lossless_modulo_whitespace() {
        let samples = [
            "EGFR mutations occur.",
            "  Loss of BRCA1 (breast cancer 1) , in  vivo\n",
            "IL-6/STAT3 signalling; p < 0.05!",
            "Naïve T-cells [CD4+] — 3.14",
        ];
        for text in samples {
            let tokens = WordTokenizer.tokenize(text).unwrap();
            assert_eq!(WordTokenizer.decode(&tokens), normalize_whitespace(text));
        }
    }

    #[test]
    fn test_char_tokenizer_skips_whitespace() {
        let tokens = CharTokenizer.tokenize("a b").unwrap();
        assert_eq!(texts(&tokens), ["a", "b"]);
        assert_eq!(tokens[1].offsets, Some((2, 3)));
        assert_eq!(CharTokenizer.decode(&tokens), "a b");
    }

    #[test]
    fn test_wordpiece_splits_into_continuations() {
        let tokenizer = WordpieceTokenizer::new(bio_vocab());
        let tokens = tokenizer.tokenize("EGFR mutations occur.").unwrap();
        assert_eq!(texts(&tokens), ["EG", "##FR", "mutation", "##s", "occur", "."]);
        assert_eq!(tokens[0].offsets, Some((0, 2)));
        assert_eq!(tokens[1].offsets, Some((2, 4)));
        assert_eq!(tokens[1].origin, TokenOrigin::Continuation);
        assert_eq!(tokens[3].offsets, Some((13, 14)));
        assert_eq!(tokenizer.decode(&tokens), "EGFR mutations occur.");
    }

    #[test]
    fn test_wordpiece_unknown_word_is_synthetic() {
        let tokenizer = WordpieceTokenizer::new(bio_vocab());
        let tokens = tokenizer.tokenize("KRAS in cancer").unwrap();
        assert_eq!(texts(&tokens), [UNK_TOKEN, "in", "cancer"]);
        assert_eq!(tokens[0].offsets, None);
        assert_eq!(tokens[0].origin, TokenOrigin::Synthetic);
    }

    #[test]
    fn test_wordpiece_without_unk_fails() {
        let vocab = Arc::new(Vocabulary::from_tokens(["in", "cancer"]));
        let tokenizer = WordpieceTokenizer::new(vocab);
        let err = tokenizer.tokenize("KRAS in cancer").unwrap_err();
        assert!(matches!(err, Error::Tokenization(_)));
        assert!(tokenizer.tokenize("in cancer").is_ok());
    }

    #[test]
    fn test_wordpiece_lowercase_keeps_original_offsets() {
        let vocab = Arc::new(Vocabulary::from_tokens([UNK_TOKEN, "cancer", "in"]));
        let tokenizer = WordpieceTokenizer::new(vocab).with_lowercase(true);
        let tokens = tokenizer.tokenize("In Cancer").unwrap();
        assert_eq!(texts(&tokens), ["in", "cancer"]);
        assert_eq!(tokens[1].offsets, Some((3, 9)));
        // decode é com perdas: caixa baixa
        assert_eq!(tokenizer.decode(&tokens), "in cancer");
    }

    #[test]
    fn test_vocabulary_encode_and_decode_ids() {
        let vocab = bio_vocab();
        let tokens = WordpieceTokenizer::new(vocab.clone())
            .tokenize("EGFR KRAS")
            .unwrap();
        let ids = vocab.encode(&tokens).unwrap();
        assert_eq!(ids, [2, 3, 1]);
        let back = vocab.decode_ids(&ids);
        assert_eq!(join_tokens(&back), "EGFR [UNK]");
    }

    #[test]
    fn test_tokenizer_kind_from_str() {
        assert_eq!("WordPiece".parse::<TokenizerKind>().unwrap(), TokenizerKind::Wordpiece);
        assert_eq!("wp".parse::<TokenizerKind>().unwrap(), TokenizerKind::Wordpiece);
        assert_eq!("character".parse::<TokenizerKind>().unwrap(), TokenizerKind::Char);
        assert!(matches!("bpe".parse::<TokenizerKind>(), Err(Error::Config(_))));
    }
}
