use std::borrow::Cow;

/// Trims leading/trailing whitespace while borrowing when unchanged.
pub fn trim(input: &str) -> Cow<'_, str> {
    let trimmed = input.trim();
    if trimmed.len() == input.len() {
        Cow::Borrowed(input)
    } else {
        Cow::Borrowed(trimmed)
    }
}

/// Returns an uppercase representation, avoiding allocation when unnecessary.
pub fn uppercase(input: &str) -> Cow<'_, str> {
    if input.chars().all(|ch| !ch.is_lowercase()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.to_uppercase())
    }
}

/// Capitalizes the first letter of every alphabetic run and lowercases the
/// rest, leaving punctuation and digits in place.
pub fn title_case(input: &str) -> Cow<'_, str> {
    let mut changed = false;
    let mut output = String::with_capacity(input.len());
    let mut at_word_start = true;
    for ch in input.chars() {
        if ch.is_alphabetic() {
            let folded: String = if at_word_start {
                ch.to_uppercase().collect()
            } else {
                ch.to_lowercase().collect()
            };
            if folded.chars().next() != Some(ch) || folded.chars().count() != 1 {
                changed = true;
            }
            output.push_str(&folded);
            at_word_start = false;
        } else {
            output.push(ch);
            at_word_start = true;
        }
    }
    if changed {
        Cow::Owned(output)
    } else {
        Cow::Borrowed(input)
    }
}

/// Removes every whitespace character.
pub fn strip_whitespace(input: &str) -> Cow<'_, str> {
    if input.chars().any(char::is_whitespace) {
        Cow::Owned(input.chars().filter(|c| !c.is_whitespace()).collect())
    } else {
        Cow::Borrowed(input)
    }
}

/// Removes every occurrence of the listed characters.
pub fn strip_chars<'a>(input: &'a str, unwanted: &[char]) -> Cow<'a, str> {
    if input.chars().any(|c| unwanted.contains(&c)) {
        Cow::Owned(input.chars().filter(|c| !unwanted.contains(c)).collect())
    } else {
        Cow::Borrowed(input)
    }
}

/// Keeps only the first `length` characters (UTF-8 safe).
pub fn truncate(input: &str, length: usize) -> Cow<'_, str> {
    match input.char_indices().nth(length) {
        Some((byte_index, _)) => Cow::Borrowed(&input[..byte_index]),
        None => Cow::Borrowed(input),
    }
}
