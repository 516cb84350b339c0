//! Multipart body splitting (RFC 2046 section 5.1).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    SeekFirst,
    InPart { start: usize },
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Next,
    Close,
}

/// Splits a multipart body into the raw bytes of each part.
///
/// The preamble before the first `--boundary` line and the epilogue after
/// `--boundary--` are discarded. The line break before a boundary line
/// belongs to the boundary. A body that ends without the closing delimiter
/// keeps its last part, minus the final line break. Empty parts are dropped.
#[must_use]
pub fn split<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut state = State::SeekFirst;
    let mut line_start = 0;

    while line_start < body.len() && state != State::Done {
        let (line_end, next_start) = match body[line_start..].iter().position(|&b| b == b'\n') {
            Some(i) => (line_start + i, line_start + i + 1),
            None => (body.len(), body.len()),
        };

        if let Some(delimiter) = match_delimiter(&body[line_start..line_end], boundary) {
            if let State::InPart { start } = state {
                let end = strip_line_break_before(body, line_start);
                if start < end {
                    parts.push(&body[start..end]);
                }
            }
            state = match delimiter {
                Delimiter::Next => State::InPart { start: next_start },
                Delimiter::Close => State::Done,
            };
        }

        line_start = next_start;
    }

    match state {
        State::InPart { start } => {
            tracing::debug!(boundary, "multipart body has no closing delimiter");
            let end = strip_trailing_line_break(body);
            if start < end {
                parts.push(&body[start..end]);
            }
        }
        State::SeekFirst => tracing::debug!(boundary, "boundary not found in multipart body"),
        State::Done => {}
    }

    parts
}

/// Matches `--boundary` or `--boundary--`, allowing trailing whitespace.
fn match_delimiter(line: &[u8], boundary: &str) -> Option<Delimiter> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let rest = line.strip_prefix(b"--")?.strip_prefix(boundary.as_bytes())?;
    let (delimiter, rest) = match rest.strip_prefix(b"--") {
        Some(rest) => (Delimiter::Close, rest),
        None => (Delimiter::Next, rest),
    };
    rest.iter()
        .all(|&b| b == b' ' || b == b'\t')
        .then_some(delimiter)
}

fn strip_line_break_before(body: &[u8], pos: usize) -> usize {
    if body[..pos].ends_with(b"\r\n") {
        pos - 2
    } else if body[..pos].ends_with(b"\n") {
        pos - 1
    } else {
        pos
    }
}

fn strip_trailing_line_break(body: &[u8]) -> usize {
    strip_line_break_before(body, body.len())
}
