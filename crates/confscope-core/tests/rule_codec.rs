use confscope_core::rules::{self, RuleRecord};
use serde_json::{Map, Value, json};

fn raw(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[test]
fn parses_output_channel_rules() {
    let parsed = rules::parse(&raw(json!({
        "main:Main": "warning, error",
        "exthost:Extension Host": "info, !copilot-chat, !claude-code"
    })));

    assert_eq!(
        parsed.get("main"),
        Some(&RuleRecord::new("Main").with_include(["warning", "error"]))
    );
    assert_eq!(
        parsed.get("exthost"),
        Some(
            &RuleRecord::new("Extension Host")
                .with_include(["info"])
                .with_exclude(["copilot-chat", "claude-code"])
        )
    );
}

#[test]
fn normalizes_sloppy_rules_end_to_end() {
    let parsed = rules::validate(rules::parse(&raw(json!({
        " tasks : Tasks ": "  build ,, ! noise ,!,",
        "broken": "error",
        "numbers:Numbers": 42,
        "empty:Empty": " , ! "
    }))));

    assert_eq!(parsed.keys().collect::<Vec<_>>(), vec!["tasks"]);
    assert_eq!(
        rules::to_raw(&parsed),
        raw(json!({"tasks:Tasks": "build, !noise"}))
    );
}

#[test]
fn serialized_rules_parse_back_to_the_same_record() {
    let record = RuleRecord::new("Git")
        .with_include(["error"])
        .with_exclude(["fetch"]);
    let text = rules::serialize(&record);
    assert_eq!(text, "error, !fetch");

    let mut entry = Map::new();
    entry.insert("git:Git".to_string(), Value::String(text));
    assert_eq!(rules::parse(&entry).get("git"), Some(&record));
}

#[test]
fn exclude_only_rule_has_no_leading_separator() {
    let record = RuleRecord::new("Log").with_exclude(["a", "b"]);
    assert_eq!(rules::serialize(&record), "!a, !b");
}

#[test]
fn keeps_both_channels_of_a_typical_configuration() {
    let parsed = rules::validate(rules::parse(&raw(json!({
        "main:Main": "warning, error",
        "exthost:Extension Host": "!copilot-chat, !claude-code"
    }))));

    assert_eq!(parsed.len(), 2);
    assert_eq!(rules::serialize(&parsed["main"]), "warning, error");
    let exthost = &parsed["exthost"];
    assert_eq!(exthost.display_name, "Extension Host");
    assert!(exthost.include.is_empty());
    assert_eq!(rules::serialize(exthost), "!copilot-chat, !claude-code");
}
