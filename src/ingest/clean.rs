//! Text segmentation and the line-cleaning rules applied before a candidate
//! line is considered for the corpus.

use std::collections::HashSet;

/// Characters that end a candidate line.
const DELIMITERS: &[char] = &[',', '.', '!', '?', ';', ':', '\t', '\n'];

/// Punctuation dropped outright. The ASCII apostrophe survives so
/// contractions stay single words.
const BLACKLIST: &[char] = &[
    '"', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}', '(', ')', '[', ']', '{', '}', '<', '>',
    '*', '_', '#', '~', '`', '|', '\\', '/', '^', '%',
];

/// Symbols spelled out as words.
const SUBSTITUTIONS: &[(char, &str)] = &[
    ('&', "and"),
    ('@', "at"),
    ('=', "equals"),
    ('+', "plus"),
    ('\u{bd}', "one half"),
    ('\u{bc}', "one quarter"),
    ('\u{be}', "three quarters"),
    ('\u{2153}', "one third"),
    ('\u{2154}', "two thirds"),
    ('\u{215b}', "one eighth"),
];

/// Dash variants, each replaced by a space.
const DASHES: &[char] = &['-', '\u{2010}', '\u{2012}', '\u{2013}', '\u{2014}', '\u{2015}'];

/// Split raw text into candidate segments, keeping the first occurrence of
/// each exact segment text.
pub fn segment(text: &str) -> Vec<&str> {
    let mut seen = HashSet::new();
    text.split(DELIMITERS)
        .filter(|segment| seen.insert(*segment))
        .collect()
}

/// Normalize one candidate segment. Returns `None` when nothing usable is
/// left.
pub fn clean_line(segment: &str) -> Option<String> {
    let printable: String = segment
        .chars()
        .filter(|c| !c.is_control())
        .flat_map(char::to_lowercase)
        .collect();

    let start = printable.find(char::is_alphabetic)?;
    let end = printable
        .rfind(char::is_alphabetic)
        .map(|i| i + printable[i..].chars().next().map_or(1, char::len_utf8))?;
    let span = &printable[start..end];

    let mut spelled = String::with_capacity(span.len());
    for c in span.chars() {
        if BLACKLIST.contains(&c) {
            continue;
        }
        if DASHES.contains(&c) {
            spelled.push(' ');
        } else if let Some((_, word)) = SUBSTITUTIONS.iter().find(|(symbol, _)| *symbol == c) {
            spelled.push(' ');
            spelled.push_str(word);
            spelled.push(' ');
        } else {
            spelled.push(c);
        }
    }

    let collapsed = spelled.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned = collapsed.strip_prefix("and ").unwrap_or(&collapsed);

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
