// src/split.rs

//! SQL statement splitting
//!
//! Script files hold many statements. The split rule is textual: a
//! semicolon that immediately precedes a line terminator (LF or CRLF), or
//! that is the last non-whitespace character of the file, ends a statement.
//! A semicolon anywhere else does not split, which is what lets authors
//! write trigger and function bodies - any trailing characters on the line
//! (conventionally a `--` comment) keep an inner semicolon from
//! terminating the statement. The splitter knows nothing about quotes or
//! SQL comments.

/// Split one script body into individual statements.
///
/// Statements are trimmed of surrounding whitespace and the terminating
/// semicolon; whitespace-only statements are dropped.
pub fn split_statements(body: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in body.split_inclusive('\n') {
        let (content, terminated) = match line.strip_suffix('\n') {
            Some(rest) => (rest, true),
            None => (line, false),
        };
        // CRLF: the carriage return belongs to the terminator.
        let content = content.strip_suffix('\r').unwrap_or(content);

        if terminated && content.ends_with(';') {
            current.push_str(&content[..content.len() - 1]);
            push_statement(&mut statements, &mut current);
        } else {
            current.push_str(line);
        }
    }

    // End of file: a trailing semicolon may be followed by whitespace only.
    let tail = current.trim_end();
    if tail.ends_with(';') {
        current.truncate(tail.len() - 1);
    }
    push_statement(&mut statements, &mut current);

    statements
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
    current.clear();
}
