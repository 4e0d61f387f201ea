//! # Leitor e Escritor do Formato PubTator
//!
//! Um arquivo PubTator é uma sequência de blocos separados por linha em branco:
//!
//! ```text
//! PMID|t|Título
//! PMID|a|Abstract
//! PMID<TAB>início<TAB>fim<TAB>texto<TAB>tipo<TAB>conceito[,conceito...]
//! PMID<TAB>id<TAB>tipo-de-relação<TAB>id[<TAB>id...]
//! ```
//!
//! Linhas de menção têm os campos 2 e 3 numéricos; as demais linhas com pelo
//! menos 4 campos são relações. Problemas estruturais viram
//! [`Error::Format`] com arquivo e linha.

use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::document::{Document, Mention, Relation};
use crate::error::{Error, Result};

/// Bloco lido do arquivo, antes da validação de offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub pmid: String,
    pub title: String,
    pub abstract_text: String,
    pub mentions: Vec<Mention>,
    pub relations: Vec<Relation>,
}

/// Um bloco de linhas não vazias e o número da sua primeira linha.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'a> {
    pub line: usize,
    pub lines: Vec<&'a str>,
}

fn text_line_regex() -> &'static Regex {
    static TEXT_LINE: OnceLock<Regex> = OnceLock::new();
    TEXT_LINE.get_or_init(|| Regex::new(r"^([^|\t]+)\|([ta])\|(.*)$").expect("static regex"))
}

/// Separa o conteúdo em blocos (linhas em branco são separadores).
pub fn split_blocks(content: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut current: Option<Block<'_>> = None;

    for (i, line) in content.lines().enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            continue;
        }
        current
            .get_or_insert_with(|| Block {
                line: i + 1,
                lines: Vec::new(),
            })
            .lines
            .push(line);
    }
    if let Some(block) = current {
        blocks.push(block);
    }
    blocks
}

/// PMID no início de uma linha de texto ou de anotação.
fn line_pmid(line: &str) -> Option<&str> {
    line.split(|c| c == '|' || c == '\t')
        .next()
        .filter(|p| !p.is_empty())
}

fn format_error(file: &Path, line: usize, pmid: Option<&str>, message: String) -> Error {
    Error::Format {
        file: file.to_path_buf(),
        line,
        pmid: pmid.map(str::to_string),
        message,
    }
}

/// Título ou abstract: `(pmid, texto)`. `block_pmid` identifica o bloco nos erros.
fn parse_text_line<'a>(
    file: &Path,
    line_no: usize,
    line: &'a str,
    expected: &str,
    block_pmid: Option<&str>,
) -> Result<(&'a str, &'a str)> {
    let caps = text_line_regex().captures(line).ok_or_else(|| {
        format_error(
            file,
            line_no,
            block_pmid,
            format!("expected '{}' line of the form 'PMID|{}|text'", expected, expected),
        )
    })?;
    let kind = caps.get(2).map_or("", |m| m.as_str());
    if kind != expected {
        return Err(format_error(
            file,
            line_no,
            block_pmid,
            format!("expected '|{}|' line, found '|{}|'", expected, kind),
        ));
    }
    let pmid = caps.get(1).map_or("", |m| m.as_str());
    let text = caps.get(3).map_or("", |m| m.as_str());
    Ok((pmid, text))
}

fn parse_offset(field: &str) -> Option<usize> {
    field.trim().parse().ok()
}

/// Interpreta um bloco. `first_line` é o número (1-based) da primeira linha.
pub fn parse_block(file: &Path, first_line: usize, lines: &[&str]) -> Result<RawDocument> {
    let title_line = lines
        .first()
        .ok_or_else(|| format_error(file, first_line, None, "empty block".to_string()))?;
    let (pmid, title) =
        parse_text_line(file, first_line, title_line, "t", line_pmid(title_line))?;
    let block_error = |line: usize, message: String| format_error(file, line, Some(pmid), message);

    let abstract_line = lines
        .get(1)
        .ok_or_else(|| block_error(first_line + 1, "missing abstract line".to_string()))?;
    let (abstract_pmid, abstract_text) =
        parse_text_line(file, first_line + 1, abstract_line, "a", Some(pmid))?;
    if abstract_pmid != pmid {
        return Err(block_error(
            first_line + 1,
            format!("PMID '{}' differs from title PMID '{}'", abstract_pmid, pmid),
        ));
    }

    let mut mentions = Vec::new();
    let mut relations = Vec::new();
    for (offset, line) in lines.iter().enumerate().skip(2) {
        let line_no = first_line + offset;
        let fields: Vec<&str> = line.split('\t').collect();
        if fields[0] != pmid {
            return Err(block_error(
                line_no,
                format!("PMID '{}' differs from block PMID '{}'", fields[0], pmid),
            ));
        }

        let offsets = match (fields.get(1), fields.get(2)) {
            (Some(start), Some(end)) => parse_offset(start).zip(parse_offset(end)),
            _ => None,
        };
        if let Some((start, end)) = offsets {
            if fields.len() < 5 {
                return Err(block_error(
                    line_no,
                    format!("mention line has {} fields, expected at least 5", fields.len()),
                ));
            }
            let concept_ids = fields
                .get(5)
                .map(|ids| {
                    ids.split(',')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            mentions.push(Mention::new(start, end, fields[3], fields[4], concept_ids));
        } else if fields.len() >= 4 {
            let mut arguments = vec![fields[1].to_string()];
            arguments.extend(fields[3..].iter().map(|a| a.to_string()));
            relations.push(Relation {
                kind: fields[2].to_string(),
                arguments,
            });
        } else {
            return Err(block_error(
                line_no,
                format!("unrecognized annotation line with {} fields", fields.len()),
            ));
        }
    }

    Ok(RawDocument {
        pmid: pmid.to_string(),
        title: title.to_string(),
        abstract_text: abstract_text.to_string(),
        mentions,
        relations,
    })
}

/// Lê todos os blocos de um conteúdo, um resultado por bloco.
pub fn parse_str<'a>(
    file: &'a Path,
    content: &'a str,
) -> impl Iterator<Item = Result<RawDocument>> + 'a {
    split_blocks(content)
        .into_iter()
        .map(move |block| parse_block(file, block.line, &block.lines))
}

/// PMID de um bloco, se a primeira linha permitir identificá-lo.
pub fn block_pmid<'a>(block: &Block<'a>) -> Option<&'a str> {
    block.lines.first().and_then(|line| line_pmid(line))
}

/// Escreve um documento no formato PubTator (offsets do arquivo original).
pub fn write_document<W: Write>(doc: &Document, writer: &mut W) -> Result<()> {
    let offset = doc.file_offset();
    writeln!(writer, "{}|t|{}", doc.pmid(), doc.title())?;
    writeln!(writer, "{}|a|{}", doc.pmid(), doc.abstract_text())?;
    for m in doc.mentions() {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            doc.pmid(),
            m.start + offset,
            m.end + offset,
            m.text,
            m.entity_type,
            m.concept_ids.join(",")
        )?;
    }
    for r in doc.relations() {
        let (first, rest) = r
            .arguments
            .split_first()
            .map_or(("", &[][..]), |(f, r)| (f.as_str(), r));
        let mut fields = vec![doc.pmid(), first, r.kind.as_str()];
        fields.extend(rest.iter().map(String::as_str));
        writeln!(writer, "{}", fields.join("\t"))?;
    }
    writeln!(writer)?;
    Ok(())
}
