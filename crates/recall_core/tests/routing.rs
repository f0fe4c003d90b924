use recall_core::{
    matches_distributeurs, route, ContentSpec, DistributorInfo, EmailMode, FeedItem,
    RecipientConfig, RouteError, RoutePlan,
};
use pretty_assertions::assert_eq;

fn item(id: &str, distributeurs: &[&str]) -> FeedItem {
    FeedItem {
        id: id.to_string(),
        title: format!("Recall {id}"),
        link: format!("https://rappel.conso.gouv.fr/fiche-rappel/{id}/Interne"),
        ..Default::default()
    }
    .with_distributor(DistributorInfo {
        distributeurs_raw: distributeurs.join(", "),
        distributeurs_list: distributeurs.iter().map(|d| d.to_string()).collect(),
        motif_raw: String::new(),
    })
}

fn ids(spec: &ContentSpec) -> Vec<&str> {
    spec.items().iter().map(|i| i.id.as_str()).collect()
}

fn diff_plan() -> RoutePlan {
    RoutePlan::new(EmailMode::Auto, false, true)
}

#[test]
fn zero_recipients_is_a_configuration_error() {
    let err = route(&[], &[], &[], diff_plan()).unwrap_err();
    assert_eq!(err, RouteError::NoRecipients);
}

#[test]
fn only_new_recipient_gets_filtered_new_items() {
    let new_items = vec![item("5", &["Acme"]), item("4", &["Lidl"])];
    let latest = vec![item("5", &["Acme"]), item("4", &["Lidl"]), item("3", &["Acme"])];
    let recipients = vec![RecipientConfig::new("a@example.com")
        .with_distributeurs(["acme"])
        .only_new()];

    let routed = route(&new_items, &latest, &recipients, diff_plan()).unwrap();
    let spec = routed[0].content.as_ref().expect("content");
    assert!(matches!(spec, ContentSpec::NewOnly(_)));
    assert_eq!(ids(spec), vec!["5"]);
}

#[test]
fn only_new_recipient_without_matches_gets_nothing() {
    let new_items = vec![item("4", &["Lidl"])];
    let recipients = vec![RecipientConfig::new("a@example.com")
        .with_distributeurs(["Acme"])
        .only_new()];
    let routed = route(&new_items, &new_items, &recipients, diff_plan()).unwrap();
    assert_eq!(routed[0].content, None);
}

#[test]
fn only_new_recipient_never_gets_latest_items_even_when_forced() {
    let latest = vec![item("3", &[]), item("2", &[])];
    let recipients = vec![RecipientConfig::new("a@example.com").only_new()];
    let plan = RoutePlan::new(EmailMode::Latest10, false, false);
    let routed = route(&[], &latest, &recipients, plan).unwrap();
    assert_eq!(routed[0].content, None);
}

#[test]
fn latest_view_puts_new_items_first_without_duplicates() {
    let new_items = vec![item("9", &[]), item("2", &[])];
    let latest = vec![item("3", &[]), item("2", &[]), item("1", &[])];
    let recipients = vec![RecipientConfig::new("a@example.com")];

    let routed = route(&new_items, &latest, &recipients, diff_plan()).unwrap();
    match routed[0].content.as_ref().expect("content") {
        spec @ ContentSpec::LatestPlusNew { new_count, .. } => {
            assert_eq!(*new_count, 2);
            assert_eq!(ids(spec), vec!["9", "2", "3", "1"]);
        }
        other => panic!("unexpected spec {other:?}"),
    }
}

#[test]
fn quiet_run_sends_nothing_to_latest_recipients() {
    let latest = vec![item("3", &[])];
    let recipients = vec![RecipientConfig::new("a@example.com")];
    let plan = RoutePlan::new(EmailMode::Auto, false, false);
    let routed = route(&[], &latest, &recipients, plan).unwrap();
    assert_eq!(routed[0].content, None);
}

#[test]
fn forced_mode_and_bootstrap_send_latest_without_diff() {
    let latest = vec![item("3", &[]), item("2", &[])];
    let recipients = vec![RecipientConfig::new("a@example.com")];
    for plan in [
        RoutePlan::new(EmailMode::Latest10, false, false),
        RoutePlan::new(EmailMode::Auto, true, false),
    ] {
        let routed = route(&[], &latest, &recipients, plan).unwrap();
        let spec = routed[0].content.as_ref().expect("content");
        assert_eq!(ids(spec), vec!["3", "2"]);
    }
}

#[test]
fn filtered_recipient_never_receives_other_distributors() {
    let new_items = vec![item("6", &["Lidl"]), item("5", &["ACME market"])];
    let latest = vec![
        item("6", &["Lidl"]),
        item("5", &["ACME market"]),
        item("4", &["Carrefour", "acme"]),
        FeedItem {
            id: "3".into(),
            ..Default::default()
        },
    ];
    let filters = vec!["Acme".to_string()];
    let recipients = vec![RecipientConfig::new("a@example.com").with_distributeurs(filters.clone())];

    let routed = route(&new_items, &latest, &recipients, diff_plan()).unwrap();
    let spec = routed[0].content.as_ref().expect("content");
    assert_eq!(ids(spec), vec!["5", "4"]);
    for delivered in spec.items() {
        assert!(matches_distributeurs(delivered, &filters));
        let info = delivered.distributor.as_ref().unwrap();
        let haystack = format!("{} {}", info.distributeurs_raw, info.distributeurs_list.join(" "));
        assert!(haystack.to_lowercase().contains("acme"));
    }
}

#[test]
fn routing_is_deterministic_and_per_recipient() {
    let new_items = vec![item("2", &["Acme"])];
    let latest = vec![item("2", &["Acme"]), item("1", &["Lidl"])];
    let recipients = vec![
        RecipientConfig::new("a@example.com").only_new(),
        RecipientConfig::new("b@example.com").with_distributeurs(["lidl"]),
        RecipientConfig::new("c@example.com").with_distributeurs(["nobody"]),
    ];
    let first = route(&new_items, &latest, &recipients, diff_plan()).unwrap();
    let second = route(&new_items, &latest, &recipients, diff_plan()).unwrap();
    assert_eq!(first, second);

    assert_eq!(ids(first[0].content.as_ref().unwrap()), vec!["2"]);
    assert_eq!(ids(first[1].content.as_ref().unwrap()), vec!["1"]);
    assert_eq!(first[2].content, None);
}

#[test]
fn email_mode_parsing_accepts_aliases() {
    assert_eq!("diff".parse::<EmailMode>(), Ok(EmailMode::Auto));
    assert_eq!(" LATEST10 ".parse::<EmailMode>(), Ok(EmailMode::Latest10));
    assert_eq!("".parse::<EmailMode>(), Ok(EmailMode::Auto));
    assert!("weekly".parse::<EmailMode>().is_err());
}
