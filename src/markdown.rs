//! A deliberately small markdown subset: `##`/`###` headings, whole-line bold,
//! bullet lines and paragraphs. Anything else is paragraph text.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static BOLD_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*\*(.+?)\*\*:?$").expect("bold line pattern"));
static RULE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(-{3,}|\*{3,}|_{3,})$").expect("rule line pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Block {
    Heading { level: u8, text: String },
    Bold(String),
    Bullet(String),
    Paragraph(String),
}

pub fn to_blocks(md: &str) -> Vec<Block> {
    let md = md.replace("\r\n", "\n");
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();

    for raw in md.lines() {
        let line = raw.trim();

        let block = if line.is_empty() || RULE_LINE.is_match(line) {
            None
        } else if let Some(text) = line.strip_prefix("### ") {
            Some(Block::Heading {
                level: 3,
                text: strip_inline(text),
            })
        } else if let Some(text) = line.strip_prefix("## ") {
            Some(Block::Heading {
                level: 2,
                text: strip_inline(text),
            })
        } else if let Some(caps) = BOLD_LINE.captures(line) {
            Some(Block::Bold(caps[1].trim().to_string()))
        } else if let Some(text) = bullet_text(line) {
            Some(Block::Bullet(strip_inline(text)))
        } else {
            paragraph.push(line);
            continue;
        };

        flush_paragraph(&mut paragraph, &mut blocks);
        if let Some(block) = block {
            blocks.push(block);
        }
    }
    flush_paragraph(&mut paragraph, &mut blocks);
    blocks
}

fn bullet_text(line: &str) -> Option<&str> {
    ["- ", "* ", "• "]
        .iter()
        .find_map(|marker| line.strip_prefix(marker))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn flush_paragraph(lines: &mut Vec<&str>, blocks: &mut Vec<Block>) {
    if lines.is_empty() {
        return;
    }
    blocks.push(Block::Paragraph(strip_inline(&lines.join(" "))));
    lines.clear();
}

/// Drops inline emphasis markers; the terminal shows plain text.
pub fn strip_inline(s: &str) -> String {
    s.replace("**", "").replace("__", "").trim().to_string()
}

/// Plain-text rendering of a block list.
pub fn blocks_to_text(blocks: &[Block]) -> String {
    let mut out: Vec<String> = Vec::new();
    for block in blocks {
        match block {
            Block::Heading { level: 2, text } => {
                out.push(String::new());
                out.push(text.to_uppercase());
                out.push("=".repeat(text.chars().count().max(3)));
            }
            Block::Heading { text, .. } => {
                out.push(String::new());
                out.push(text.clone());
                out.push("-".repeat(text.chars().count().max(3)));
            }
            Block::Bold(text) => out.push(format!("[{text}]")),
            Block::Bullet(text) => out.push(format!("  • {text}")),
            Block::Paragraph(text) => {
                out.push(text.clone());
                out.push(String::new());
            }
        }
    }
    while out.first().is_some_and(|l| l.is_empty()) {
        out.remove(0);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_supported_constructs() {
        let md = "## Executive Summary\n\nIntro line one\nline two\n\n### Risks\n**Cash first**\n- keep reserve\n* cut burn\n---\nTail";
        assert_eq!(
            to_blocks(md),
            vec![
                Block::Heading { level: 2, text: "Executive Summary".into() },
                Block::Paragraph("Intro line one line two".into()),
                Block::Heading { level: 3, text: "Risks".into() },
                Block::Bold("Cash first".into()),
                Block::Bullet("keep reserve".into()),
                Block::Bullet("cut burn".into()),
                Block::Paragraph("Tail".into()),
            ]
        );
    }

    #[test]
    fn unsupported_syntax_stays_paragraph_text() {
        let blocks = to_blocks("# Top\n1. first\n> quote");
        assert_eq!(blocks, vec![Block::Paragraph("# Top 1. first > quote".into())]);
    }

    #[test]
    fn inline_bold_is_stripped() {
        assert_eq!(
            to_blocks("- **Q2** expansion"),
            vec![Block::Bullet("Q2 expansion".into())]
        );
    }
}
