/// One-shot lookup from the command line: fetch, restructure, print.
use std::io::Write;

use anyhow::Context;
use tracing::info;

use lookup_common::document::LookupDocument;
use lookup_common::upstream::LookupClient;

use crate::resolver::FieldResolver;

/// Fetch `basic_type`, write the restructured document as pretty JSON to `out`
/// and, when `structure` is given, the raw category layout to it first.
pub async fn run(
    client: &LookupClient,
    resolver: &FieldResolver,
    basic_type: &str,
    structure: Option<&mut dyn Write>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let document = client
        .fetch(basic_type)
        .await
        .with_context(|| format!("lookup for basic type {basic_type} failed"))?;
    info!(
        basic_type,
        categories = document.main_categories.len(),
        "lookup document fetched"
    );

    if let Some(structure) = structure {
        write_structure(&document, structure)?;
    }

    let result = resolver.resolve(&document);
    serde_json::to_writer_pretty(&mut *out, &result)?;
    writeln!(out)?;
    Ok(())
}

/// List every category with its parameters and their first value.
pub fn write_structure(document: &LookupDocument, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "Categories and parameters:")?;
    for category in &document.main_categories {
        writeln!(out, "  {}", category.name)?;
        for parameter in &category.parameters {
            match parameter.first_value() {
                Some(value) => writeln!(out, "    {} = {value}", parameter.name)?,
                None => writeln!(out, "    {} (no values)", parameter.name)?,
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::routing::get;
    use axum::Router;
    use lookup_common::document::decode_lookup_body;
    use lookup_common::upstream::LookupClientConfig;
    use serde_json::{json, Value};

    use super::*;
    use crate::mapping::{FieldMappingTable, OUTPUT_FIELDS};

    const BODY: &str = "{'mainCategories': [{'name': 'Product', 'parameters': [{'name': 'Division', 'values': ['ATV']}, {'name': 'Q-Status', 'values': []}]}]}";

    async fn client_for(body: &'static str) -> LookupClient {
        let upstream = Router::new().route("/simple_search", get(move || async move { body }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, upstream).await.unwrap();
        });
        LookupClient::new(LookupClientConfig {
            base_url: format!("http://{addr}"),
            api_key: "k".to_string(),
            client_id: "1".to_string(),
            pa_number: "2".to_string(),
            timeout: Duration::from_secs(5),
            health_timeout: Duration::from_secs(2),
            max_retries: 0,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            max_error_body_bytes: 1024,
            accept_invalid_certs: false,
        })
        .unwrap()
    }

    #[test]
    fn test_write_structure() {
        let document = decode_lookup_body(BODY).unwrap();
        let mut buf = Vec::new();
        write_structure(&document, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "Categories and parameters:\n  Product\n    Division = \"ATV\"\n    Q-Status (no values)\n"
        );
    }

    #[tokio::test]
    async fn test_run_prints_pretty_json() {
        let client = client_for(BODY).await;
        let resolver = FieldResolver::new(FieldMappingTable::builtin(), OUTPUT_FIELDS);
        let mut out = Vec::new();
        run(&client, &resolver, "P5151E", None, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("{\n  \"PROCESS_GROUP\": \"NaN\""));
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["DIVISION"], json!("ATV"));
        assert_eq!(parsed["QUALITY_REQUIREMENT_CAT"], json!("NaN"));
    }

    #[tokio::test]
    async fn test_run_with_structure() {
        let client = client_for(BODY).await;
        let resolver = FieldResolver::new(FieldMappingTable::builtin(), OUTPUT_FIELDS);
        let mut structure = Vec::new();
        let mut out = Vec::new();
        run(&client, &resolver, "P5151E", Some(&mut structure as &mut dyn Write), &mut out)
            .await
            .unwrap();
        assert!(String::from_utf8(structure).unwrap().contains("Division = \"ATV\""));
        assert!(!out.is_empty());
    }

    #[tokio::test]
    async fn test_run_reports_malformed_body() {
        let client = client_for("not a literal").await;
        let resolver = FieldResolver::new(FieldMappingTable::builtin(), OUTPUT_FIELDS);
        let mut out = Vec::new();
        let err = run(&client, &resolver, "P5151E", None, &mut out)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("P5151E"));
        assert!(out.is_empty());
    }
}
