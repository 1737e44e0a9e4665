//! Quote-aware whitespace tokenizer used by every attribute parser.

/// Split on spaces, except inside single-quoted spans.
///
/// `'I am' the link` -> `["I am", "the", "link"]`
///
/// Quotes toggle the "inside" state and are dropped. A backslash right before a
/// quote makes it literal content (the backslash is dropped). Empty tokens
/// produced by consecutive spaces are skipped.
pub fn better_split(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut quote_count = 0usize;
    let mut current = String::new();
    let mut previous: Option<char> = None;

    for c in input.chars() {
        let escaped = previous == Some('\\');
        previous = Some(c);

        if c == '\'' && !escaped {
            quote_count += 1;
            continue;
        }

        if c == ' ' && quote_count % 2 == 0 {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c == '\'' && escaped {
            current.pop();
        }
        current.push(c);
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}
