//! Recovery of a JSON object from free-form model output.
//!
//! Models are told to answer with bare JSON but regularly wrap it in
//! reasoning blocks, markdown fences or commentary. Recovery is purely
//! textual: strip the known wrappers, then slice from the first `{` to the
//! last `}`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::MalformedResponseError;

static RE_REASONING_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<reasoning>.*?</reasoning>|<thinking>.*?</thinking>|<think>.*?</think>|<analysis>.*?</analysis>|<explanation>.*?</explanation>",
    )
    .unwrap()
});
static RE_STRAY_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(reasoning|thinking|think|analysis|explanation)\s*>").unwrap()
});
static RE_CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_-]*").unwrap());

/// Removes reasoning blocks and code-fence markers from model output.
pub fn clean_response(raw: &str) -> String {
    let without_reasoning = RE_REASONING_BLOCK.replace_all(raw, "");
    let without_tags = RE_STRAY_TAG.replace_all(&without_reasoning, "");
    RE_CODE_FENCE
        .replace_all(&without_tags, "")
        .trim()
        .to_string()
}

/// Returns the slice between the first `{` and the last `}`, inclusive.
fn object_slice(cleaned: &str) -> Option<&str> {
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&cleaned[start..=end])
}

/// Recovers the JSON object embedded in `raw`.
pub fn recover(raw: &str) -> Result<Value, MalformedResponseError> {
    let cleaned = clean_response(raw);

    let Some(slice) = object_slice(&cleaned) else {
        return Err(MalformedResponseError {
            reason: "no JSON object found".to_string(),
            raw: raw.to_string(),
            cleaned,
        });
    };

    match serde_json::from_str::<Value>(slice) {
        Ok(value) => Ok(value),
        Err(e) => Err(MalformedResponseError {
            reason: e.to_string(),
            raw: raw.to_string(),
            cleaned,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reasoning_and_fence_are_stripped() {
        let raw = "<reasoning>ignore</reasoning>```json\n{\"a\":1}\n```";
        assert_eq!(recover(raw).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_plain_json() {
        assert_eq!(recover(r#"{"a": [1, 2]}"#).unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn test_leading_and_trailing_commentary() {
        let raw = "Sure! Here is the data:\n{\"company\": \"Allianz\"}\nLet me know if you need more.";
        assert_eq!(recover(raw).unwrap(), json!({"company": "Allianz"}));
    }

    #[test]
    fn test_multiline_reasoning_with_braces() {
        let raw = "<think>\nThe user wants {json}. I will comply.\n</think>\n{\"ok\": true}";
        assert_eq!(recover(raw).unwrap(), json!({"ok": true}));
    }

    #[test]
    fn test_unclosed_reasoning_tag_is_removed() {
        let raw = "<reasoning>{\"a\": 2}";
        assert_eq!(recover(raw).unwrap(), json!({"a": 2}));
    }

    #[test]
    fn test_nested_objects_use_last_brace() {
        let raw = "```\n{\"outer\": {\"inner\": 1}}\n```";
        assert_eq!(recover(raw).unwrap(), json!({"outer": {"inner": 1}}));
    }

    #[test]
    fn test_no_object() {
        let err = recover("I could not read the document.").unwrap_err();
        assert_eq!(err.reason, "no JSON object found");
        assert_eq!(err.raw, "I could not read the document.");
    }

    #[test]
    fn test_reversed_braces() {
        assert!(recover("} nothing here {").is_err());
    }

    #[test]
    fn test_parse_error_carries_raw_and_cleaned() {
        let raw = "```json\n{\"a\": 1,}\n```";
        let err = recover(raw).unwrap_err();
        assert_eq!(err.raw, raw);
        assert_eq!(err.cleaned, "{\"a\": 1,}");
        let message = err.to_string();
        assert!(message.contains("Cleaned"));
        assert!(message.contains("Raw"));
    }
}
