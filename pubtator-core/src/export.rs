//! Exportação no formato colunar `token<TAB>tag` (estilo CoNLL).
//!
//! Cada documento começa com uma linha `# <pmid>`; cada sentença termina com
//! uma linha em branco. Tokens sintéticos (`[UNK]`) são escritos como estão.

use std::io::Write;

use crate::corpus::Corpus;
use crate::document::Document;
use crate::error::{Error, Result};

/// Escreve um documento.
pub fn write_tsv_document<W: Write>(doc: &Document, writer: &mut W) -> Result<()> {
    writeln!(writer, "# {}", doc.pmid())?;
    let sentences = doc.sentences()?;
    for (sentence, tags) in sentences.iter().zip(doc.sentence_targets()?) {
        if sentence.len() != tags.len() {
            return Err(Error::Alignment(format!(
                "document {}: sentence ({}, {}) has {} tokens but {} tags",
                doc.pmid(),
                sentence.start(),
                sentence.end(),
                sentence.len(),
                tags.len()
            )));
        }
        for (token, tag) in sentence.tokens.iter().zip(tags) {
            writeln!(writer, "{}\t{}", token.text, tag)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Escreve todos os documentos do corpus, em ordem.
pub fn write_tsv<W: Write>(corpus: &Corpus, writer: &mut W) -> Result<()> {
    for doc in corpus {
        write_tsv_document(doc, writer)?;
    }
    Ok(())
}
