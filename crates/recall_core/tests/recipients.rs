use recall_core::{normalize_recipients, parse_address_list, RecipientConfig};
use pretty_assertions::assert_eq;

fn init_logging() {
    recall_logging::initialize_for_tests();
}

#[test]
fn duplicates_are_removed_by_lowercased_email() {
    init_logging();
    let configs = vec![
        RecipientConfig::new(" Alice@Example.com ").with_distributeurs(["Acme"]),
        RecipientConfig::new("alice@example.com").only_new(),
        RecipientConfig::new("bob@example.com"),
    ];
    let normalized = normalize_recipients(configs);
    assert_eq!(
        normalized,
        vec![
            RecipientConfig::new("Alice@Example.com").with_distributeurs(["Acme"]),
            RecipientConfig::new("bob@example.com"),
        ]
    );
}

#[test]
fn invalid_addresses_and_blank_filters_are_dropped() {
    let configs = vec![
        RecipientConfig::new(""),
        RecipientConfig::new("not-an-address"),
        RecipientConfig::new("@example.com"),
        RecipientConfig::new("c@example.com").with_distributeurs([" Lidl ", "", "LIDL", "Acme"]),
    ];
    let normalized = normalize_recipients(configs);
    assert_eq!(normalized.len(), 1);
    assert_eq!(normalized[0].distributeurs, vec!["Lidl", "Acme"]);
}

#[test]
fn legacy_address_list_is_parsed() {
    let parsed = parse_address_list("a@example.com, b@example.com,,A@example.com");
    let emails: Vec<_> = parsed.iter().map(|r| r.email.as_str()).collect();
    assert_eq!(emails, vec!["a@example.com", "b@example.com"]);
    assert!(parsed.iter().all(|r| r.distributeurs.is_empty() && !r.only_new_items));
}

#[test]
fn describe_mentions_mode_and_filters() {
    let all = RecipientConfig::new("a@example.com");
    assert_eq!(all.describe(), "a@example.com (all distributeurs) · latest 10 + new first");
    let filtered = RecipientConfig::new("b@example.com")
        .with_distributeurs(["Acme", "Lidl"])
        .only_new();
    assert_eq!(filtered.describe(), "b@example.com (Acme, Lidl) · new only");
}

#[test]
fn recipient_json_uses_camel_case() {
    let parsed: RecipientConfig =
        serde_json::from_str(r#"{"email":"a@example.com","onlyNewItems":true}"#).unwrap();
    assert!(parsed.only_new_items);
    assert!(parsed.distributeurs.is_empty());
}
