//! Spreadsheet export
//!
//! One row per card in category order. Every field is quoted and reduced to
//! printable ASCII; the file starts with a UTF-8 byte order mark so
//! spreadsheet apps pick the right encoding.

use retro_store_lib::{Card, Category, Project};

const HEADER: [&str; 5] = ["Section", "Card Text", "Likes", "Dislikes", "Created Date"];
const BOM: char = '\u{FEFF}';

fn printable_ascii(value: &str) -> String {
    value.chars().filter(|c| (' '..='~').contains(c)).collect()
}

fn quote(field: &str) -> String {
    format!("\"{}\"", printable_ascii(field).replace('"', "\"\""))
}

fn card_row(category: Category, card: &Card) -> [String; 5] {
    [
        category.label().to_string(),
        card.text.clone(),
        card.likes.to_string(),
        card.dislikes.to_string(),
        card.created_at.format("%Y-%m-%d").to_string(),
    ]
}

pub fn to_csv(project: &Project) -> String {
    let mut lines = vec![HEADER.iter().map(|h| quote(h)).collect::<Vec<_>>().join(",")];
    for (category, card) in project.cards.iter() {
        let row = card_row(category, card);
        lines.push(row.iter().map(|field| quote(field)).collect::<Vec<_>>().join(","));
    }

    let mut out = String::new();
    out.push(BOM);
    out.push_str(&lines.join("\n"));
    out
}
