//! Recovery of JSON records from raw extractor output.
//!
//! Language models wrap their answer in prose or code fences, and often emit
//! JSON that a strict parser rejects: full-width punctuation, trailing commas,
//! single-quoted strings. [`extract_json_object`] applies a fixed series of
//! repairs before parsing.
//!
//! # Repairs (in order)
//!
//! 1. Keep the body of the first ```` ```json ```` fence, if any
//! 2. Keep the text from the first `{` to the last `}`
//! 3. Full-width `：` and `，` become `:` and `,`
//! 4. Commas directly before `}` or `]` are dropped
//! 5. Single quotes become double quotes
//! 6. On a parse failure, control characters are removed and parsing retried

use crate::error::EvalError;
use crate::record::Record;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json(.*?)```").expect("Invalid fence regex pattern"));

static TRAILING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*([}\]])").expect("Invalid trailing comma regex pattern"));

/// Extracts and parses the outermost JSON object in `text`.
///
/// ```
/// use tripeval_core::extraction::extract_json_object;
///
/// let raw = "结果如下：{'vendor'：'高德打车'，'trips': [],}";
/// let value = extract_json_object(raw).unwrap();
/// assert_eq!(value["vendor"], "高德打车");
/// ```
pub fn extract_json_object(text: &str) -> Result<Value, EvalError> {
    let text = match JSON_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(body) => body.as_str(),
        None => text,
    };
    let text = text.trim();

    let (start, end) = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => {
            return Err(EvalError::UnparsableOutput(
                "no JSON object found in output".to_string(),
            ))
        }
    };

    let repaired = text[start..=end].replace('：', ":").replace('，', ",");
    let repaired = TRAILING_COMMA.replace_all(&repaired, "$1");
    let repaired = repaired.replace('\'', "\"");

    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => Ok(value),
        Err(_) => {
            let cleaned: String = repaired.chars().filter(|c| !c.is_control()).collect();
            serde_json::from_str(&cleaned).map_err(|e| EvalError::UnparsableOutput(e.to_string()))
        }
    }
}

/// Recovers a [`Record`] from raw extractor output.
///
/// `id` labels the error if the recovered JSON is not record-shaped.
pub fn parse_predicted(id: &str, text: &str) -> Result<Record, EvalError> {
    let value = extract_json_object(text)?;
    Record::from_json(id, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Scalar;

    #[test]
    fn test_plain_object() {
        let value = extract_json_object(r#"{"vendor": "滴滴出行"}"#).unwrap();
        assert_eq!(value["vendor"], "滴滴出行");
    }

    #[test]
    fn test_surrounding_prose_is_dropped() {
        let raw = "Here is the result:\n{\"total_amount\": 23.5}\nLet me know if you need more.";
        let value = extract_json_object(raw).unwrap();
        assert_eq!(value["total_amount"], 23.5);
    }

    #[test]
    fn test_code_fence_is_preferred() {
        let raw = "{ignored}\n```json\n{\"city\": \"上海\"}\n```";
        let value = extract_json_object(raw).unwrap();
        assert_eq!(value["city"], "上海");
    }

    #[test]
    fn test_full_width_punctuation_and_trailing_commas() {
        let raw = "{\"vendor\"：\"曹操出行\"，\"trips\": [{\"city\": \"杭州\",},],}";
        let value = extract_json_object(raw).unwrap();
        assert_eq!(value["vendor"], "曹操出行");
        assert_eq!(value["trips"][0]["city"], "杭州");
    }

    #[test]
    fn test_single_quotes() {
        let value = extract_json_object("{'currency': 'CNY'}").unwrap();
        assert_eq!(value["currency"], "CNY");
    }

    #[test]
    fn test_control_characters_are_retried() {
        let raw = "{\"vendor\": \"T3\u{0007}出行\"}";
        let value = extract_json_object(raw).unwrap();
        assert_eq!(value["vendor"], "T3出行");
    }

    #[test]
    fn test_no_object() {
        assert!(matches!(
            extract_json_object("I could not read the receipt."),
            Err(EvalError::UnparsableOutput(_))
        ));
        assert!(extract_json_object("} backwards {").is_err());
    }

    #[test]
    fn test_unrepairable_output() {
        assert!(matches!(
            extract_json_object("{\"vendor\": }"),
            Err(EvalError::UnparsableOutput(_))
        ));
    }

    #[test]
    fn test_parse_predicted() {
        let raw = "```json\n{\"type\": \"行程单\", \"total_amount\": \"88.00\", \"trips\": null}\n```";
        let record = parse_predicted("doc-1", raw).unwrap();
        assert_eq!(record.doc_type, Some(Scalar::from("行程单")));
        assert!(record.trips.is_empty());

        let err = parse_predicted("doc-2", "{\"trips\": 3}").unwrap_err();
        assert!(matches!(err, EvalError::MalformedRecord { ref id, .. } if id == "doc-2"));
    }
}
