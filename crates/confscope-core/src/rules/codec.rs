//! Parse and serialize the rule language.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use super::RuleRecord;

const SEPARATOR: &str = ", ";

/// Parses raw rule settings into records keyed by domain.
///
/// Entries whose key has fewer than two `:` segments, or whose value is not
/// a string, are dropped. A later entry for the same domain replaces an
/// earlier one.
pub fn parse(raw: &Map<String, Value>) -> BTreeMap<String, RuleRecord> {
    let mut rules = BTreeMap::new();

    for (names, value) in raw {
        let segments: Vec<&str> = names.split(':').map(str::trim).collect();
        if segments.len() < 2 {
            debug!(entry = %names, "rule entry without display name dropped");
            continue;
        }
        let Some(rule) = value.as_str() else {
            debug!(entry = %names, "non-string rule entry dropped");
            continue;
        };

        let mut record = RuleRecord::new(segments[1]);
        for token in rule.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match token.strip_prefix('!') {
                Some(excluded) => {
                    let excluded = excluded.trim();
                    if !excluded.is_empty() {
                        record.exclude.push(excluded.to_string());
                    }
                }
                None => record.include.push(token.to_string()),
            }
        }
        rules.insert(segments[0].to_string(), record);
    }

    rules
}

/// Renders a record as `include, include, !exclude, !exclude`, leaving out
/// empty groups.
pub fn serialize(record: &RuleRecord) -> String {
    let include = record.include.join(SEPARATOR);
    let exclude = record
        .exclude
        .iter()
        .map(|token| format!("!{token}"))
        .collect::<Vec<_>>()
        .join(SEPARATOR);

    [include, exclude]
        .into_iter()
        .filter(|group| !group.is_empty())
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

/// Drops records that serialize to nothing.
pub fn validate(rules: BTreeMap<String, RuleRecord>) -> BTreeMap<String, RuleRecord> {
    rules
        .into_iter()
        .filter(|(_, record)| !serialize(record).is_empty())
        .collect()
}

/// Converts records back to the stored `"domain:displayName"` form.
pub fn to_raw(rules: &BTreeMap<String, RuleRecord>) -> Map<String, Value> {
    rules
        .iter()
        .map(|(domain, record)| {
            (
                format!("{}:{}", domain, record.display_name),
                Value::String(serialize(record)),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn parses_include_and_exclude_tokens() {
        let rules = parse(&raw(json!({
            "main:Main": "warning, error",
            "exthost:Extension Host": "info, !copilot-chat, !claude-code"
        })));

        assert_eq!(
            rules["main"],
            RuleRecord::new("Main").with_include(["warning", "error"])
        );
        assert_eq!(rules["exthost"].include, vec!["info"]);
        assert_eq!(rules["exthost"].exclude, vec!["copilot-chat", "claude-code"]);
    }

    #[test]
    fn drops_keys_without_display_name() {
        let rules = parse(&raw(json!({"main": "warning", "other:Other": "x"})));
        assert_eq!(rules.len(), 1);
        assert!(rules.contains_key("other"));
    }

    #[test]
    fn trims_key_segments_and_tokens() {
        let rules = parse(&raw(json!({" tasks : Tasks ": "  a ,b,  ! c "})));
        let record = &rules["tasks"];
        assert_eq!(record.display_name, "Tasks");
        assert_eq!(record.include, vec!["a", "b"]);
        assert_eq!(record.exclude, vec!["c"]);
    }

    #[test]
    fn keeps_entries_without_tokens() {
        let rules = parse(&raw(json!({"git:Git": " , ,", "bare:Bare": "!"})));
        assert!(rules["git"].is_empty());
        assert!(rules["bare"].is_empty());
        assert!(validate(rules).is_empty());
    }

    #[test]
    fn serialize_omits_empty_groups() {
        assert_eq!(
            serialize(&RuleRecord::new("X").with_include(["a", "b"])),
            "a, b"
        );
        assert_eq!(
            serialize(&RuleRecord::new("X").with_exclude(["a", "b"])),
            "!a, !b"
        );
        assert_eq!(
            serialize(&RuleRecord::new("X").with_include(["a"]).with_exclude(["b"])),
            "a, !b"
        );
        assert_eq!(serialize(&RuleRecord::new("X")), "");
    }

    #[test]
    fn serialized_record_parses_back() {
        let record = RuleRecord::new("Extension Host")
            .with_include(["info", "trace"])
            .with_exclude(["copilot-chat", "claude-code"]);
        let mut map = Map::new();
        map.insert("exthost:Extension Host".into(), json!(serialize(&record)));

        assert_eq!(parse(&map)["exthost"], record);
    }

    #[test]
    fn to_raw_restores_wire_keys() {
        let rules = parse(&raw(json!({"main:Main": "error ,  warning"})));
        assert_eq!(
            Value::Object(to_raw(&rules)),
            json!({"main:Main": "error, warning"})
        );
    }
}
