//! Best-effort parsing of structured (JSON object) model output.
//!
//! Models asked for JSON frequently wrap it in prose or code fences, emit
//! `<think>` blocks, use Python literals or single quotes, leave trailing
//! commas, or get cut off mid-object. [`parse_structured`] tries the strict
//! parse first and only then applies [`repair`]. Callers decide their own
//! fallback when it still fails.

use super::{extract_balanced_json, extract_fenced_json};
use serde_json::{Map, Value};

/// Why structured output could not be recovered
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuredError {
    #[error("no JSON object found in model output")]
    NoObject,

    #[error("JSON object could not be repaired: {0}")]
    Unrepairable(String),
}

/// Recover a JSON object from model output.
pub fn parse_structured(text: &str) -> Result<Map<String, Value>, StructuredError> {
    let cleaned = strip_think_blocks(text);
    let cleaned = cleaned.trim();

    let mut candidates: Vec<&str> = Vec::new();
    if let Some(fenced) = extract_fenced_json(cleaned) {
        candidates.push(fenced.trim());
    }
    candidates.push(cleaned);
    if let Some(start) = cleaned.find('{') {
        let tail = &cleaned[start..];
        if let Some(balanced) = extract_balanced_json(tail) {
            candidates.push(balanced);
        }
        candidates.push(tail);
    }

    let mut last_error = None;
    for candidate in &candidates {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(candidate) {
            return Ok(map);
        }
    }
    for candidate in candidates.iter().filter(|c| c.starts_with('{')) {
        match serde_json::from_str::<Value>(&repair(candidate)) {
            Ok(Value::Object(map)) => return Ok(map),
            Ok(_) => {}
            Err(e) => last_error = Some(e.to_string()),
        }
    }

    match last_error {
        Some(e) => Err(StructuredError::Unrepairable(e)),
        None => Err(StructuredError::NoObject),
    }
}

/// Remove `<think>...</think>` reasoning blocks, including an unterminated one.
fn strip_think_blocks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<think>") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</think>") {
            Some(end) => rest = &rest[start + end + "</think>".len()..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Rewrite a JSON-like object into strict JSON.
///
/// Handles single-quoted strings, Python `None`/`True`/`False`, bare words,
/// trailing commas and unclosed strings, arrays and objects.
pub fn repair(candidate: &str) -> String {
    let chars: Vec<char> = candidate.chars().collect();
    let mut out = String::with_capacity(candidate.len() + 8);
    let mut closers: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escape = false;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if let Some(q) = quote {
            if escape {
                if ch == '\'' {
                    // \' is not a JSON escape
                    out.pop();
                }
                out.push(ch);
                escape = false;
            } else if ch == '\\' {
                out.push(ch);
                escape = true;
            } else if ch == q {
                out.push('"');
                quote = None;
            } else if ch == '"' {
                out.push_str("\\\"");
            } else if ch == '\n' {
                out.push_str("\\n");
            } else {
                out.push(ch);
            }
            i += 1;
            continue;
        }

        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                out.push('"');
            }
            '{' => {
                closers.push('}');
                out.push(ch);
            }
            '[' => {
                closers.push(']');
                out.push(ch);
            }
            '}' | ']' => {
                strip_trailing_comma(&mut out);
                if closers.last() == Some(&ch) {
                    closers.pop();
                }
                out.push(ch);
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let after_number = out
                    .chars()
                    .last()
                    .map(|p| p.is_ascii_digit() || p == '.')
                    .unwrap_or(false);
                out.push_str(&render_word(&word, after_number, next_is_colon(&chars, i)));
                continue;
            }
            c => out.push(c),
        }
        i += 1;
    }

    if quote.is_some() {
        out.push('"');
    }
    while let Some(close) = closers.pop() {
        strip_trailing_comma(&mut out);
        out.push(close);
    }
    out
}

fn render_word(word: &str, after_number: bool, is_key: bool) -> String {
    if after_number {
        return word.to_string();
    }
    if is_key {
        return format!("\"{}\"", word);
    }
    match word {
        "None" | "null" | "NULL" => "null".to_string(),
        "True" | "true" => "true".to_string(),
        "False" | "false" => "false".to_string(),
        other => format!("\"{}\"", other),
    }
}

fn next_is_colon(chars: &[char], from: usize) -> bool {
    chars[from..]
        .iter()
        .find(|c| !c.is_whitespace())
        .map(|c| *c == ':')
        .unwrap_or(false)
}

fn strip_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out[..trimmed_len].ends_with(',') {
        out.truncate(trimmed_len - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_json_passes_through() {
        let map = parse_structured(r#"{"status": "PASS", "feedback": "ok"}"#).unwrap();
        assert_eq!(map["status"], "PASS");
    }

    #[test]
    fn test_fenced_json_with_prose() {
        let text = "Here is my plan:\n```json\n{\"cleaner_task\": \"drop nulls\"}\n```\nLet me know.";
        let map = parse_structured(text).unwrap();
        assert_eq!(map["cleaner_task"], "drop nulls");
    }

    #[test]
    fn test_think_block_is_ignored() {
        let text = "<think>maybe {\"status\": \"FAIL\"}</think>{\"status\": \"WARN\"}";
        let map = parse_structured(text).unwrap();
        assert_eq!(map["status"], "WARN");
    }

    #[test]
    fn test_python_literals_and_single_quotes() {
        let text = "{'cleaner_task': None, 'viz_task': 'plot it', 'done': True,}";
        let map = parse_structured(text).unwrap();
        assert!(map["cleaner_task"].is_null());
        assert_eq!(map["viz_task"], "plot it");
        assert_eq!(map["done"], true);
    }

    #[test]
    fn test_truncated_object_is_closed() {
        let text = r#"{"chat_response": "Working on it", "fe_task": "encode categ"#;
        let map = parse_structured(text).unwrap();
        assert_eq!(map["fe_task"], "encode categ");
    }

    #[test]
    fn test_bare_words_are_quoted() {
        let map = parse_structured("{status: retry, feedback: x}").unwrap();
        assert_eq!(map["status"], "retry");
        assert_eq!(map["feedback"], "x");
    }

    #[test]
    fn test_numbers_with_exponent_survive() {
        let map = parse_structured("{'lr': 1e5, 'n': 3,}").unwrap();
        assert_eq!(map["n"], 3);
        assert!(map["lr"].is_number());
    }

    #[test]
    fn test_plain_prose_has_no_object() {
        assert_eq!(
            parse_structured("Sure, which column is the target?"),
            Err(StructuredError::NoObject)
        );
    }

    #[test]
    fn test_array_is_not_an_object() {
        assert!(parse_structured("[1, 2, 3]").is_err());
    }
}
