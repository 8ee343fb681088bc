use crate::error::ShelfError;

pub const MAX_NAME_ATTEMPTS: usize = 10_000;
const MAX_BASE_BYTES: usize = 200;

/// Build the on-disk base name `<sender>-<subject>`, made safe to use as a
/// single path component.
pub fn base_name(sender: &str, subject: &str) -> String {
    sanitize_component(&format!("{sender}-{subject}"))
}

pub fn sanitize_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '/' | '\\' | '\0' => out.push('_'),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    let trimmed = out.trim();
    let mut name = truncate_on_char_boundary(trimmed, MAX_BASE_BYTES).to_string();
    if name.is_empty() || name == "." || name == ".." {
        name = "_".to_string();
    }
    name
}

fn truncate_on_char_boundary(input: &str, max_bytes: usize) -> &str {
    if input.len() <= max_bytes {
        return input;
    }
    let mut end = max_bytes;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    &input[..end]
}

/// Split a trailing `[<digits>]` disambiguation suffix off `name`.
pub fn split_suffix(name: &str) -> (&str, Option<usize>) {
    let Some(inner) = name.strip_suffix(']') else {
        return (name, None);
    };
    let Some(open) = inner.rfind('[') else {
        return (name, None);
    };
    let digits = &inner[open + 1..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return (name, None);
    }
    match digits.parse::<usize>() {
        Ok(index) => (&inner[..open], Some(index)),
        Err(_) => (name, None),
    }
}

/// First name in `base`, `stem[1]`, `stem[2]`, ... that `is_occupied` rejects.
pub fn resolve(base: &str, mut is_occupied: impl FnMut(&str) -> bool) -> Result<String, ShelfError> {
    if !is_occupied(base) {
        return Ok(base.to_string());
    }

    let (stem, _) = split_suffix(base);
    for index in 1..MAX_NAME_ATTEMPTS {
        let candidate = format!("{stem}[{index}]");
        if candidate == base {
            continue;
        }
        if !is_occupied(&candidate) {
            return Ok(candidate);
        }
    }

    Err(ShelfError::NamesExhausted {
        base: base.to_string(),
        attempts: MAX_NAME_ATTEMPTS,
    })
}
