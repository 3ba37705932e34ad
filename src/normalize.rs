//! Whitespace normalization for converted paragraphs.
//!
//! Runs and line breaks are visited in document order, looking through
//! `Span` and `Hyperlink` boundaries. Two rules are applied:
//!
//! - **join rule**: when a run ending in a space is followed (without a line
//!   break in between) by a run starting with a space, the trailing spaces of
//!   the first run are removed;
//! - **edge rule**: within every line (paragraph start, line breaks and
//!   paragraph end delimit lines) the first run with visible text loses its
//!   leading whitespace and the last one loses its trailing whitespace.
//!
//! Runs left empty are pruned. Normalizing twice gives the same tree as
//! normalizing once.

use crate::richtext::{Block, Inline, Paragraph, Section};

/// A run's text or a line break, borrowed from the paragraph tree.
enum Token<'a> {
    Text(&'a mut String),
    Break,
}

fn collect<'a>(inlines: &'a mut [Inline], out: &mut Vec<Token<'a>>) {
    for inline in inlines.iter_mut() {
        match inline {
            Inline::Run { text } => out.push(Token::Text(text)),
            Inline::LineBreak => out.push(Token::Break),
            Inline::Span(span) => collect(&mut span.inlines, out),
            Inline::Hyperlink(link) => collect(&mut link.inlines, out),
        }
    }
}

/// Normalize one paragraph in place.
pub fn normalize_paragraph(paragraph: &mut Paragraph) {
    {
        let mut tokens = Vec::new();
        collect(&mut paragraph.inlines, &mut tokens);
        for line in tokens.split_mut(|t| matches!(t, Token::Break)) {
            let mut texts: Vec<&mut String> = line
                .iter_mut()
                .filter_map(|t| match t {
                    Token::Text(text) => Some(&mut **text),
                    Token::Break => None,
                })
                .collect();
            join_rule(&mut texts);
            edge_rule(&mut texts);
        }
    }
    prune_empty_runs(&mut paragraph.inlines);
}

/// Normalize every paragraph of a section, including nested sections.
pub fn normalize_section(section: &mut Section) {
    for block in &mut section.blocks {
        match block {
            Block::Paragraph(p) => normalize_paragraph(p),
            Block::Section(s) => normalize_section(s),
        }
    }
}

fn join_rule(texts: &mut [&mut String]) {
    let mut prev: Option<usize> = None;
    for i in 0..texts.len() {
        if texts[i].is_empty() {
            continue;
        }
        if let Some(p) = prev {
            if texts[p].ends_with(' ') && texts[i].starts_with(' ') {
                let trimmed = texts[p].trim_end_matches(' ').len();
                texts[p].truncate(trimmed);
            }
        }
        prev = Some(i);
    }
}

fn edge_rule(texts: &mut [&mut String]) {
    let has_content = |s: &str| s.chars().any(|c| !c.is_whitespace());
    if let Some(first) = texts.iter_mut().find(|t| has_content(t.as_str())) {
        let start = first.len() - first.trim_start().len();
        first.replace_range(..start, "");
    }
    if let Some(last) = texts.iter_mut().rev().find(|t| has_content(t.as_str())) {
        let end = last.trim_end().len();
        last.truncate(end);
    }
}

fn prune_empty_runs(inlines: &mut Vec<Inline>) {
    inlines.retain(|i| !matches!(i, Inline::Run { text } if text.is_empty()));
    for inline in inlines.iter_mut() {
        match inline {
            Inline::Span(span) => prune_empty_runs(&mut span.inlines),
            Inline::Hyperlink(link) => prune_empty_runs(&mut link.inlines),
            Inline::Run { .. } | Inline::LineBreak => {}
        }
    }
}

/// True when the paragraph has no visible text and no line break.
pub fn is_blank(paragraph: &Paragraph) -> bool {
    fn blank(inlines: &[Inline]) -> bool {
        inlines.iter().all(|i| match i {
            Inline::Run { text } => text.trim().is_empty(),
            Inline::LineBreak => false,
            Inline::Span(span) => blank(&span.inlines),
            Inline::Hyperlink(link) => blank(&link.inlines),
        })
    }
    blank(&paragraph.inlines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::richtext::{Span, TextStyle};

    fn runs(p: &Paragraph) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut clone = p.clone();
        collect(&mut clone.inlines, &mut tokens);
        tokens
            .into_iter()
            .map(|t| match t {
                Token::Text(s) => s.clone(),
                Token::Break => "<br>".to_string(),
            })
            .collect()
    }

    #[test]
    fn join_rule_across_spans() {
        let mut p = Paragraph::new(vec![
            Inline::run("Hello "),
            Span::styled(TextStyle::BOLD, vec![Inline::run(" world")]).into(),
        ]);
        normalize_paragraph(&mut p);
        assert_eq!(runs(&p), vec!["Hello", " world"]);
    }

    #[test]
    fn edge_rule_per_line() {
        let mut p = Paragraph::new(vec![
            Inline::run(" Hello "),
            Inline::LineBreak,
            Inline::run(" World "),
        ]);
        normalize_paragraph(&mut p);
        assert_eq!(runs(&p), vec!["Hello", "<br>", "World"]);
    }

    #[test]
    fn whitespace_only_runs_before_content_collapse() {
        let mut p = Paragraph::new(vec![Inline::run(" "), Inline::run(" a"), Inline::run(" ")]);
        normalize_paragraph(&mut p);
        assert_eq!(p.plain_text(), "a ");
        let once = p.clone();
        normalize_paragraph(&mut p);
        assert_eq!(p, once);
    }

    #[test]
    fn normalization_is_idempotent() {
        let mut p = Paragraph::new(vec![
            Inline::run("  a "),
            Inline::run(" "),
            Span::new(vec![Inline::run(" b  ")]).into(),
            Inline::LineBreak,
            Inline::run(" "),
            Inline::run(" c"),
        ]);
        normalize_paragraph(&mut p);
        let once = p.clone();
        normalize_paragraph(&mut p);
        assert_eq!(p, once);
        assert_eq!(p.plain_text(), "a b\nc");
    }

    #[test]
    fn blank_detection() {
        assert!(is_blank(&Paragraph::new(vec![Inline::run(" \n ")])));
        assert!(!is_blank(&Paragraph::new(vec![Inline::LineBreak])));
        assert!(!is_blank(&Paragraph::text("x")));
    }
}
