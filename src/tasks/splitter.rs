//! `key=value` argument strings as written in shorthand task declarations

use indexmap::IndexMap;

use super::keywords::FREEFORM_OPTIONS;
use crate::loader::Node;

/// Splits on unquoted whitespace, keeping quotes and `{{ }}` / `{% %}`
/// blocks intact.
pub fn split_args(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut jinja_depth = 0usize;
    let mut escaped = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if quote.is_none() && jinja_depth == 0 && c.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }

        current.push(c);

        if escaped {
            escaped = false;
            continue;
        }

        match c {
            '\\' => escaped = true,
            '\'' | '"' if jinja_depth == 0 => match quote {
                Some(open) if open == c => quote = None,
                None => quote = Some(c),
                _ => {}
            },
            '{' if matches!(chars.peek(), Some('{') | Some('%') | Some('#')) => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                jinja_depth += 1;
            }
            '}' | '%' | '#' if jinja_depth > 0 && chars.peek() == Some(&'}') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                jinja_depth -= 1;
            }
            _ => {}
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Strips one layer of matching surrounding quotes.
pub fn unquote(text: &str) -> &str {
    let bytes = text.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
        && bytes[bytes.len() - 2] != b'\\'
    {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

fn unescaped_equals(token: &str) -> Option<usize> {
    let mut previous = None;
    for (i, c) in token.char_indices() {
        if c == '=' && previous != Some('\\') {
            return Some(i);
        }
        previous = Some(c);
    }
    None
}

/// Parses `k=v` options out of an argument string.
///
/// With `check_raw` only the free-form control options are taken as
/// options. Everything that is not an option is joined into `_raw_params`.
pub fn parse_kv(text: &str, check_raw: bool) -> IndexMap<String, Node> {
    let mut options = IndexMap::new();
    let mut raw_params = Vec::new();

    for token in split_args(text) {
        match unescaped_equals(&token) {
            Some(pos) => {
                let key = token[..pos].trim();
                if check_raw && !FREEFORM_OPTIONS.contains(&key) {
                    raw_params.push(token);
                } else {
                    let value = unquote(token[pos + 1..].trim());
                    options.insert(key.to_string(), Node::String(value.to_string()));
                }
            }
            None => raw_params.push(token),
        }
    }

    if !raw_params.is_empty() {
        options.insert("_raw_params".to_string(), Node::String(raw_params.join(" ")));
    }
    options
}

/// Splits `module arg...` into the module name and the rest of the line.
pub fn split_module_string(text: &str) -> (String, String) {
    let tokens = split_args(text);
    match tokens.split_first() {
        Some((module, rest)) => (module.trim().to_string(), rest.join(" ")),
        None => (String::new(), String::new()),
    }
}
