//! Text normalization shared by indexed content and query terms.
//!
//! Only the accented vowels and cedilla listed in [`fold_char`] are folded;
//! every other character passes through after lower-casing.

/// Lower-cases, collapses line breaks into spaces, trims surrounding
/// whitespace and folds accented vowels and `ç` to ASCII.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .replace('\n', " ")
        .trim()
        .chars()
        .map(fold_char)
        .collect()
}

/// Normalizes full document content and pads it with one space on each side
/// so keyword boundary checks hold at the very start and end of a document.
pub fn process_content(raw: &str) -> String {
    let mut content = String::with_capacity(raw.len() + 2);
    content.push(' ');
    content.push_str(&normalize(raw));
    content.push(' ');
    content
}

fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        other => other,
    }
}
