//! Document export
//!
//! A printable report of the board: title, export date, one section per
//! category and a summary. Written as Markdown; the HTML form is the same
//! document run through pulldown-cmark.

use chrono::{DateTime, Utc};
use pulldown_cmark::{html::push_html, CowStr, Event, Options, Parser};
use std::fmt::Write;

use retro_store_lib::{Category, Project};

/// Backslash-escape characters Markdown would otherwise interpret
fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '\\' | '`' | '*' | '_' | '{' | '}' | '[' | ']' | '(' | ')' | '#' | '+' | '-' | '.' | '!' | '|' | '<' | '>'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn to_markdown(project: &Project, exported_at: DateTime<Utc>) -> String {
    let mut doc = String::new();
    // Writing into a String cannot fail
    let _ = writeln!(doc, "# {}\n", escape_markdown(&single_line(&project.name)));
    let _ = writeln!(doc, "Exported on: {}\n", exported_at.format("%Y-%m-%d"));

    for category in Category::ALL {
        let _ = writeln!(doc, "## {}\n", category.label());
        let cards = project.cards.get(category);
        if cards.is_empty() {
            let _ = writeln!(doc, "*No cards in this section*\n");
            continue;
        }
        for (index, card) in cards.iter().enumerate() {
            let _ = writeln!(doc, "{}. {}", index + 1, escape_markdown(&single_line(&card.text)));
            let _ = writeln!(
                doc,
                "   Likes: {} | Dislikes: {} | {}",
                card.likes,
                card.dislikes,
                card.created_at.format("%Y-%m-%d")
            );
        }
        doc.push('\n');
    }

    let summary = project.summary();
    let _ = writeln!(doc, "## Summary\n");
    let _ = writeln!(doc, "- Total cards: {}", summary.total_cards);
    for (category, count) in &summary.per_category {
        let _ = writeln!(doc, "- {}: {} cards", category.label(), count);
    }
    let _ = writeln!(doc, "- Likes: {} | Dislikes: {}", summary.total_likes, summary.total_dislikes);
    doc
}

pub fn to_html(project: &Project, exported_at: DateTime<Utc>) -> String {
    let markdown = to_markdown(project, exported_at);
    // Raw HTML in card text is shown, never interpreted
    let events = Parser::new_ext(&markdown, Options::ENABLE_STRIKETHROUGH).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut body = String::new();
    push_html(&mut body, events);

    let title: CowStr = single_line(&project.name).into();
    let mut title_html = String::new();
    push_html(&mut title_html, std::iter::once(Event::Text(title)));

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        title_html, body
    )
}
