use pretty_assertions::assert_eq;
use recall_engine::{
    extract_distributor_info, DetailFetcher, FailureKind, FetchSettings, HttpDetailFetcher,
    ReqwestFetcher,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FICHE: &str = r#"<html><body>
<dl>
  <dt>Nom de la marque</dt><dd>Acme</dd>
  <dt> Distributeurs </dt>
  <dd>
     Carrefour ;  Leclerc,
     Intermarché
  </dd>
  <dt>Motif du rappel</dt>
  <dd>Présence de   listeria</dd>
</dl>
</body></html>"#;

// wiremock listens on 127.0.0.1 over plain http.
fn local_fetcher() -> HttpDetailFetcher {
    HttpDetailFetcher::new(
        ReqwestFetcher::new(FetchSettings::default()),
        vec!["127.0.0.1".to_string()],
    )
    .allow_plain_http()
}

#[test]
fn extracts_labelled_definitions() {
    let info = extract_distributor_info(FICHE);
    assert_eq!(info.distributeurs_raw, "Carrefour ; Leclerc, Intermarché");
    assert_eq!(
        info.distributeurs_list,
        vec!["Carrefour", "Leclerc", "Intermarché"]
    );
    assert_eq!(info.motif_raw, "Présence de listeria");
}

#[test]
fn missing_labels_give_empty_info() {
    let info = extract_distributor_info("<html><body><p>Rien</p></body></html>");
    assert!(info.distributeurs_raw.is_empty());
    assert!(info.distributeurs_list.is_empty());
    assert!(info.motif_raw.is_empty());
}

#[tokio::test]
async fn fetches_and_extracts_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fiche-rappel/1/Interne"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(FICHE, "text/html; charset=utf-8"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = local_fetcher();
    let info = fetcher
        .fetch_detail(&format!("{}/fiche-rappel/1/Interne", server.uri()))
        .await
        .unwrap();
    assert_eq!(info.distributeurs_list.len(), 3);
    assert_eq!(info.motif_raw, "Présence de listeria");
}

#[tokio::test]
async fn rejects_foreign_hosts_and_plain_http() {
    let strict = HttpDetailFetcher::new(
        ReqwestFetcher::new(FetchSettings::default()),
        vec!["rappel.conso.gouv.fr".to_string()],
    );
    let err = strict
        .fetch_detail("http://rappel.conso.gouv.fr/fiche-rappel/1")
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::DisallowedUrl);

    let err = strict
        .fetch_detail("https://evil.example/fiche-rappel/1")
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::DisallowedUrl);

    let err = strict.fetch_detail("").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}

#[tokio::test]
async fn http_errors_surface_as_fetch_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = local_fetcher()
        .fetch_detail(&format!("{}/fiche-rappel/2", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(503));
}
