//! End-to-end harvest pipeline: taxonomy → commodity details → pesticide
//! details → three flattened datasets.
//!
//! The walk is single-pass and sequential. Per-record fetch failures are
//! recorded by id and skipped; only a taxonomy fetch failure aborts the run.

use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{Local, Utc};
use tracing::{info, instrument, warn};

use pestres_api::CodexClient;
use pestres_shared::{
    Commodity, CommodityMrlRow, ParentNode, PesticideDetail, PesticideMrlRow, PesticideRow, Result,
};

use crate::export::{self, ExportPaths};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Everything the walk collects before export.
#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    /// One row per MRL entry found under a commodity detail.
    pub commodity_rows: Vec<CommodityMrlRow>,
    /// One row per MRL entry found under a pesticide detail.
    pub pesticide_rows: Vec<PesticideMrlRow>,
    /// One row per retained pesticide detail.
    pub pesticide_detail_rows: Vec<PesticideRow>,
    /// Commodity ids whose detail fetch failed, in walk order.
    pub failed_commodity_ids: Vec<String>,
    /// Pesticide ids whose detail fetch failed, in discovery order.
    pub failed_pesticide_ids: Vec<String>,
}

/// Summary of a completed harvest run.
#[derive(Debug)]
pub struct HarvestReport {
    /// Rows written to the commodity-MRL dataset.
    pub commodity_mrl_rows: usize,
    /// Rows written to the pesticide-MRL dataset.
    pub pesticide_mrl_rows: usize,
    /// Rows written to the pesticide metadata dataset.
    pub pesticide_rows: usize,
    /// Commodity ids whose detail fetch failed.
    pub failed_commodity_ids: Vec<String>,
    /// Pesticide ids whose detail fetch failed.
    pub failed_pesticide_ids: Vec<String>,
    /// Where the datasets landed.
    pub paths: ExportPaths,
    /// Total elapsed wall time.
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait HarvestProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before each commodity detail fetch.
    fn commodity_fetched(&self, id: &str, current: usize, total: usize);
    /// Called before each pesticide detail fetch.
    fn pesticide_fetched(&self, id: &str, discovered: usize);
    /// Called when the pipeline completes.
    fn done(&self, report: &HarvestReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl HarvestProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn commodity_fetched(&self, _id: &str, _current: usize, _total: usize) {}
    fn pesticide_fetched(&self, _id: &str, _discovered: usize) {}
    fn done(&self, _report: &HarvestReport) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the full harvest and write the three datasets under `out_dir`.
#[instrument(skip_all, fields(out_dir = %out_dir.display()))]
pub async fn harvest(
    client: &CodexClient,
    out_dir: &Path,
    progress: &dyn HarvestProgress,
) -> Result<HarvestReport> {
    let start = Instant::now();

    let outcome = collect(client, progress).await?;

    progress.phase("Writing datasets");
    let paths = export::write_datasets(out_dir, &outcome, Local::now())?;

    let report = HarvestReport {
        commodity_mrl_rows: outcome.commodity_rows.len(),
        pesticide_mrl_rows: outcome.pesticide_rows.len(),
        pesticide_rows: outcome.pesticide_detail_rows.len(),
        failed_commodity_ids: outcome.failed_commodity_ids,
        failed_pesticide_ids: outcome.failed_pesticide_ids,
        paths,
        elapsed: start.elapsed(),
    };

    info!(
        commodity_mrl_rows = report.commodity_mrl_rows,
        pesticide_mrl_rows = report.pesticide_mrl_rows,
        pesticide_rows = report.pesticide_rows,
        failed_commodities = report.failed_commodity_ids.len(),
        failed_pesticides = report.failed_pesticide_ids.len(),
        elapsed_ms = report.elapsed.as_millis(),
        "harvest complete"
    );

    progress.done(&report);
    Ok(report)
}

/// Walk the taxonomy and collect all flattened rows.
///
/// A taxonomy fetch failure propagates; everything downstream is per-record
/// and non-fatal.
#[instrument(skip_all)]
pub async fn collect(
    client: &CodexClient,
    progress: &dyn HarvestProgress,
) -> Result<HarvestOutcome> {
    // --- Stage 1: taxonomy ---
    progress.phase("Fetching commodity taxonomy");
    let categories = client.fetch_categories(Utc::now()).await?;

    // Full enumeration down to the leaves, preserving each level's order.
    let mut leaves: Vec<&Commodity> = Vec::new();
    for category in &categories {
        for sub_category in category.children() {
            for commodity_type in sub_category.children() {
                leaves.extend(commodity_type.children());
            }
        }
    }

    info!(
        categories = categories.len(),
        commodities = leaves.len(),
        "taxonomy enumerated"
    );

    // --- Stage 2: commodity details ---
    progress.phase("Fetching commodity details");
    let mut commodity_details = Vec::new();
    let mut failed_commodity_ids: Vec<String> = Vec::new();
    let total = leaves.len();

    for (i, leaf) in leaves.iter().enumerate() {
        let Some(id) = leaf.lookup_id() else {
            warn!(node = %leaf.id, "commodity leaf has no lookup key");
            failed_commodity_ids.push(leaf.id.clone());
            continue;
        };

        progress.commodity_fetched(id, i + 1, total);

        match client.fetch_commodity_detail(id).await {
            Ok(detail) => commodity_details.push(detail),
            Err(e) => {
                warn!(id, error = %e, "failed to fetch commodity detail");
                failed_commodity_ids.push(id.to_string());
            }
        }
    }

    // --- Stage 3: flatten commodity MRLs, discover pesticides ---
    progress.phase("Flattening MRLs and fetching pesticide details");
    let mut commodity_rows: Vec<CommodityMrlRow> = Vec::new();
    let mut pesticide_details: Vec<PesticideDetail> = Vec::new();
    let mut seen_pesticide_ids: HashSet<String> = HashSet::new();
    let mut failed_pesticide_ids: Vec<String> = Vec::new();

    for detail in &commodity_details {
        // No MRL data is a silent skip, not an error.
        let Some((commodity_name, mrls)) = detail.commodity_mrls() else {
            continue;
        };

        for mrl in mrls {
            commodity_rows.push(mrl.to_row(commodity_name));

            let pesticide_id = &mrl.pesticide.id;
            // First claim of an id wins; later occurrences skip, including
            // when the first fetch failed.
            if !seen_pesticide_ids.insert(pesticide_id.clone()) {
                continue;
            }

            progress.pesticide_fetched(pesticide_id, seen_pesticide_ids.len());

            match client.fetch_pesticide_detail(pesticide_id).await {
                Ok(pesticide_detail) => pesticide_details.push(pesticide_detail),
                Err(e) => {
                    warn!(id = %pesticide_id, error = %e, "failed to fetch pesticide detail");
                    failed_pesticide_ids.push(pesticide_id.clone());
                }
            }
        }
    }

    // --- Stage 4: flatten pesticide MRLs ---
    let mut pesticide_rows: Vec<PesticideMrlRow> = Vec::new();
    for detail in &pesticide_details {
        let Some((pesticide_name, mrls)) = detail.pesticide_mrls() else {
            continue;
        };
        for mrl in mrls {
            pesticide_rows.push(mrl.to_row(pesticide_name));
        }
    }

    // --- Stage 5: pesticide metadata rows ---
    let pesticide_detail_rows: Vec<PesticideRow> = pesticide_details
        .iter()
        .map(PesticideDetail::to_detail_row)
        .collect();

    Ok(HarvestOutcome {
        commodity_rows,
        pesticide_rows,
        pesticide_detail_rows,
        failed_commodity_ids,
        failed_pesticide_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pestres_shared::{Endpoints, FetchConfig};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server_uri: &str) -> CodexClient {
        let config = FetchConfig {
            endpoints: Endpoints {
                categories_url: format!("{server_uri}/codex-commodities-en.json"),
                commodity_detail_url: format!("{server_uri}/commodities/details.html"),
                pesticide_detail_url: format!("{server_uri}/pesticides/details.html"),
            },
            timeout_secs: 5,
            max_attempts: 2,
            backoff_base_ms: 1,
        };
        CodexClient::new(&config).unwrap()
    }

    /// 1 category → 1 subcategory → 1 type → the given leaf lookup ids.
    fn taxonomy_body(leaf_ids: &[&str]) -> String {
        let leaves: Vec<String> = leaf_ids
            .iter()
            .map(|id| {
                format!(r#"{{"id": "node-{id}", "metadata": {{"id": "{id}"}}, "data": "Leaf {id}"}}"#)
            })
            .collect();
        format!(
            r#"[{{
                "id": "c1", "metadata": {{}}, "data": "Plant origin",
                "children": [{{
                    "id": "s1", "metadata": {{}}, "data": "Fruits",
                    "children": [{{
                        "id": "t1", "metadata": {{}}, "data": "Citrus",
                        "children": [{}]
                    }}]
                }}]
            }}]"#,
            leaves.join(", ")
        )
    }

    fn commodity_mrl_entry(pesticide_id: &str, pesticide_name: &str) -> String {
        format!(
            r#"{{
                "mrl": "0.05", "mrlFormatted": "0.05", "jmpr": "2019", "ccpr": "51",
                "priorCcpr": "", "cacYear": "2019", "lod": "", "sourceOfRes": "FS",
                "fatPh": "", "tev": "", "footnote": "", "footnoteCcpr": "",
                "commodity": {{"commCode": "FC 0004", "name": "Orange"}},
                "pesticide": {{"name": "{pesticide_name}", "id": "{pesticide_id}"}}
            }}"#
        )
    }

    fn commodity_detail_body(name: &str, mrl_entries: &[String]) -> String {
        format!(
            r#"{{"commodity": "{name}", "commCode": "FC 0004", "mrls": {{"mrl": [{}]}}}}"#,
            mrl_entries.join(", ")
        )
    }

    fn pesticide_detail_body(id: &str, name: &str) -> String {
        format!(
            r#"{{
                "name": "{name}", "pestIdCodex": "{id}", "pesticide": "{name}",
                "adi": "0-1", "adiUnit": "mg/kg bw", "adiNote": "", "vetdFlag": "",
                "residue": "{name}",
                "note": {{"en": "evaluated"}},
                "mrls": {{"mrl": [{{
                    "mrl": "", "mrlFormatted": "", "jmpr": "2016", "ccpr": "49",
                    "priorCcpr": "", "cacYear": "2017", "lod": "", "sourceOfRes": "FS",
                    "fatPh": "", "tev": "", "footnote": "", "footnoteCcpr": "",
                    "commodity": {{"commCode": "GC 0654", "name": "Wheat"}},
                    "step": {{"stepCode": "8"}}
                }}]}}
            }}"#
        )
    }

    async fn mount_categories(server: &MockServer, body: String) {
        Mock::given(method("GET"))
            .and(path("/codex-commodities-en.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    async fn mount_commodity(server: &MockServer, id: &str, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/commodities/details.html"))
            .and(query_param("id", id))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn end_to_end_with_one_failing_leaf() {
        let server = MockServer::start().await;
        mount_categories(&server, taxonomy_body(&["315", "316"])).await;

        // 315 succeeds with two MRL entries for the same pesticide.
        let entries = vec![
            commodity_mrl_entry("158", "Glyphosate"),
            commodity_mrl_entry("158", "Glyphosate"),
        ];
        mount_commodity(
            &server,
            "315",
            ResponseTemplate::new(200).set_body_string(commodity_detail_body("Orange", &entries)),
        )
        .await;

        // 316 fails hard.
        mount_commodity(&server, "316", ResponseTemplate::new(500)).await;

        // Same pesticide referenced twice: exactly one fetch.
        Mock::given(method("GET"))
            .and(path("/pesticides/details.html"))
            .and(query_param("id", "158"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(pesticide_detail_body("158", "Glyphosate")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let outcome = collect(&client, &SilentProgress).await.unwrap();

        assert_eq!(outcome.failed_commodity_ids, vec!["316".to_string()]);
        assert!(outcome.failed_pesticide_ids.is_empty());

        // Rows derive only from the surviving commodity.
        assert_eq!(outcome.commodity_rows.len(), 2);
        assert!(
            outcome
                .commodity_rows
                .iter()
                .all(|row| row.commodity_name == "Orange")
        );

        assert_eq!(outcome.pesticide_rows.len(), 1);
        assert_eq!(outcome.pesticide_rows[0].step, "8");
        // Empty-string wire value stays absent through flattening.
        assert_eq!(outcome.pesticide_rows[0].mrl, None);

        assert_eq!(outcome.pesticide_detail_rows.len(), 1);
        assert_eq!(outcome.pesticide_detail_rows[0].note, "evaluated");
    }

    #[tokio::test]
    async fn detail_without_mrls_contributes_nothing() {
        let server = MockServer::start().await;
        mount_categories(&server, taxonomy_body(&["315"])).await;

        mount_commodity(
            &server,
            "315",
            ResponseTemplate::new(200)
                .set_body_string(r#"{"commodity": "Orange", "commCode": "FC 0004"}"#),
        )
        .await;

        let client = test_client(&server.uri());
        let outcome = collect(&client, &SilentProgress).await.unwrap();

        assert!(outcome.commodity_rows.is_empty());
        assert!(outcome.failed_commodity_ids.is_empty());
        assert!(outcome.failed_pesticide_ids.is_empty());
    }

    #[tokio::test]
    async fn failed_pesticide_id_recorded_once_and_not_refetched() {
        let server = MockServer::start().await;
        mount_categories(&server, taxonomy_body(&["315", "317"])).await;

        // Both commodities reference pesticide 99.
        for id in ["315", "317"] {
            let entries = vec![commodity_mrl_entry("99", "Carbaryl")];
            mount_commodity(
                &server,
                id,
                ResponseTemplate::new(200)
                    .set_body_string(commodity_detail_body("Orange", &entries)),
            )
            .await;
        }

        // The pesticide endpoint always fails; the id must be claimed on the
        // first attempt and never retried for the second occurrence.
        Mock::given(method("GET"))
            .and(path("/pesticides/details.html"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let outcome = collect(&client, &SilentProgress).await.unwrap();

        assert_eq!(outcome.failed_pesticide_ids, vec!["99".to_string()]);
        assert_eq!(outcome.commodity_rows.len(), 2);
        assert!(outcome.pesticide_rows.is_empty());
        assert!(outcome.pesticide_detail_rows.is_empty());
    }

    #[tokio::test]
    async fn taxonomy_failure_aborts_the_run() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/codex-commodities-en.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = collect(&client, &SilentProgress)
            .await
            .expect_err("category fetch failure must abort");
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn harvest_writes_datasets_and_reports() {
        let server = MockServer::start().await;
        mount_categories(&server, taxonomy_body(&["315"])).await;

        let entries = vec![commodity_mrl_entry("158", "Glyphosate")];
        mount_commodity(
            &server,
            "315",
            ResponseTemplate::new(200).set_body_string(commodity_detail_body("Orange", &entries)),
        )
        .await;

        Mock::given(method("GET"))
            .and(path("/pesticides/details.html"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(pesticide_detail_body("158", "Glyphosate")),
            )
            .mount(&server)
            .await;

        let out_dir =
            std::env::temp_dir().join(format!("pestres-harvest-{}", std::process::id()));

        let client = test_client(&server.uri());
        let report = harvest(&client, &out_dir, &SilentProgress).await.unwrap();

        assert_eq!(report.commodity_mrl_rows, 1);
        assert_eq!(report.pesticide_mrl_rows, 1);
        assert_eq!(report.pesticide_rows, 1);
        assert!(report.failed_commodity_ids.is_empty());
        assert!(report.paths.commodity_mrl.exists());
        assert!(report.paths.pesticide_mrl.exists());
        assert!(report.paths.pesticide.exists());

        let _ = std::fs::remove_dir_all(&out_dir);
    }
}
