//! System-prompt formatting.
//!
//! Templates use single-brace named markers. Only `{context_data}` and
//! `{response_type}` are defined; `{{` and `}}` produce literal braces.
//! Anything else is a formatting error, which the search orchestrator treats
//! as a generation failure.

use tariff_core::{AppError, AppResult};

/// Marker replaced with the retrieved context text.
pub const CONTEXT_MARKER: &str = "context_data";

/// Marker replaced with the response-type hint.
pub const RESPONSE_TYPE_MARKER: &str = "response_type";

/// Substitute the context and response-type markers into `template`.
///
/// # Errors
/// `AppError::Prompt` on an unknown or empty placeholder, an unclosed `{`,
/// or a lone `}`.
///
/// # Example
/// ```
/// use tariff_prompt::format_system_prompt;
///
/// let prompt = format_system_prompt(
///     "Answer in {response_type}.\n{context_data}",
///     "Carrier X charges $5/cwt",
///     "one sentence",
/// )
/// .unwrap();
/// assert_eq!(prompt, "Answer in one sentence.\nCarrier X charges $5/cwt");
/// ```
pub fn format_system_prompt(
    template: &str,
    context_data: &str,
    response_type: &str,
) -> AppResult<String> {
    let mut output = String::with_capacity(template.len() + context_data.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    output.push('{');
                    continue;
                }

                let mut name = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    name.push(inner);
                }

                if !closed {
                    return Err(AppError::Prompt(format!(
                        "Unclosed '{{' at byte {} in system prompt template",
                        pos
                    )));
                }

                match name.as_str() {
                    CONTEXT_MARKER => output.push_str(context_data),
                    RESPONSE_TYPE_MARKER => output.push_str(response_type),
                    other => {
                        return Err(AppError::Prompt(format!(
                            "Unknown placeholder '{{{}}}' in system prompt template (expected {{{}}} or {{{}}})",
                            other, CONTEXT_MARKER, RESPONSE_TYPE_MARKER
                        )));
                    }
                }
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    output.push('}');
                } else {
                    return Err(AppError::Prompt(format!(
                        "Single '}}' at byte {} in system prompt template",
                        pos
                    )));
                }
            }
            _ => output.push(c),
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_both_markers() {
        let result = format_system_prompt(
            "## Response Format\n{response_type}\n## Data Tables\n{context_data}",
            "-----Sources-----\nid|text",
            "multiple paragraphs",
        )
        .unwrap();

        assert!(result.contains("multiple paragraphs"));
        assert!(result.ends_with("-----Sources-----\nid|text"));
    }

    #[test]
    fn test_markers_may_repeat_or_be_absent() {
        let result = format_system_prompt("{response_type} / {response_type}", "ctx", "table").unwrap();
        assert_eq!(result, "table / table");

        let plain = format_system_prompt("No markers here.", "ctx", "table").unwrap();
        assert_eq!(plain, "No markers here.");
    }

    #[test]
    fn test_doubled_braces_are_literal() {
        let result = format_system_prompt("JSON like {{\"carrier\": 1}} then {context_data}", "C", "x").unwrap();
        assert_eq!(result, "JSON like {\"carrier\": 1} then C");
    }

    #[test]
    fn test_context_braces_are_not_reinterpreted() {
        let result = format_system_prompt("{context_data}", "{weird} }", "x").unwrap();
        assert_eq!(result, "{weird} }");
    }

    #[test]
    fn test_unknown_placeholder_fails() {
        let err = format_system_prompt("Hello {carrier_name}", "ctx", "x").unwrap_err();
        assert!(matches!(err, AppError::Prompt(ref msg) if msg.contains("carrier_name")));

        assert!(format_system_prompt("Empty {}", "ctx", "x").is_err());
    }

    #[test]
    fn test_unbalanced_braces_fail() {
        assert!(format_system_prompt("Open {context_data", "ctx", "x").is_err());
        assert!(format_system_prompt("Close } alone", "ctx", "x").is_err());
    }

    #[test]
    fn test_multibyte_text_survives() {
        let result = format_system_prompt("Tarif — {context_data} ✓", "données", "x").unwrap();
        assert_eq!(result, "Tarif — données ✓");
    }
}
