/// Drop a duplicated second rendition from a message body.
///
/// The second line is taken as a delimiter token (for multipart bodies this
/// is the MIME boundary). When the same line shows up again further down, the
/// body is cut just before that occurrence, blank lines included. A cut that
/// would leave nothing returns the body untouched.
pub fn strip_duplicate_rendition(body: &str) -> String {
    let lines: Vec<&str> = body.split('\n').collect();
    let Some(token) = lines.get(1) else {
        return body.to_string();
    };

    let Some(cut) = lines
        .iter()
        .enumerate()
        .skip(2)
        .find(|(_, line)| *line == token)
        .map(|(idx, _)| idx)
    else {
        return body.to_string();
    };

    let kept = lines[..cut].join("\n");
    if kept.is_empty() {
        return body.to_string();
    }
    kept
}
