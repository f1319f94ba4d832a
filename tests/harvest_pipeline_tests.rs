//! End-to-end pipeline tests against a scripted portal
//!
//! The orchestrator, resolver and download executor run for real; only the
//! portal and the raw HTTP transport are scripted. Filesystem effects are
//! asserted under a temp directory.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use cv_harvester::application::{RunOrchestrator, RunState};
use cv_harvester::domain::filter::{FilterDimensions, FilterValue, GridCell};
use cv_harvester::domain::record::{RowRecord, RunSummary};
use cv_harvester::domain::services::PortalDriver;
use cv_harvester::infrastructure::config::DownloadConfig;
use cv_harvester::infrastructure::downloader::{DownloadExecutor, FileTransport, RetryPolicy};
use cv_harvester::infrastructure::resolver::AttachmentResolver;

type CellKey = (String, String);

fn key(cell: &GridCell) -> CellKey {
    (cell.year.text.clone(), cell.program.text.clone())
}

#[derive(Default)]
struct PortalState {
    visits: Vec<CellKey>,
    current: Option<CellKey>,
    auth_checks: u32,
    repairs: u32,
    resets: u32,
    extract_calls: u32,
}

/// Scripted portal: rows per cell, plus switches for empty cells, failing
/// cells and a mid-run session expiry.
struct ScriptedPortal {
    dimensions: FilterDimensions,
    rows: HashMap<CellKey, Vec<RowRecord>>,
    no_data_cells: HashSet<CellKey>,
    failing_cells: HashSet<CellKey>,
    /// Session counts as expired at this (1-based) authentication check.
    expire_on_check: Option<u32>,
    fail_enumeration: bool,
    state: Mutex<PortalState>,
}

impl ScriptedPortal {
    fn new(years: &[&str], programs: &[&str]) -> Self {
        Self {
            dimensions: FilterDimensions {
                years: years
                    .iter()
                    .map(|y| FilterValue::new(*y, format!("y-{y}")))
                    .collect(),
                programs: programs
                    .iter()
                    .map(|p| FilterValue::new(*p, format!("p-{p}")))
                    .collect(),
            },
            rows: HashMap::new(),
            no_data_cells: HashSet::new(),
            failing_cells: HashSet::new(),
            expire_on_check: None,
            fail_enumeration: false,
            state: Mutex::new(PortalState::default()),
        }
    }

    fn with_rows(mut self, year: &str, program: &str, rows: Vec<RowRecord>) -> Self {
        self.rows.insert((year.to_string(), program.to_string()), rows);
        self
    }

    fn with_no_data(mut self, year: &str, program: &str) -> Self {
        self.no_data_cells
            .insert((year.to_string(), program.to_string()));
        self
    }

    fn with_failing_cell(mut self, year: &str, program: &str) -> Self {
        self.failing_cells
            .insert((year.to_string(), program.to_string()));
        self
    }

    fn with_expiry_on_check(mut self, check: u32) -> Self {
        self.expire_on_check = Some(check);
        self
    }

    fn with_failing_enumeration(mut self) -> Self {
        self.fail_enumeration = true;
        self
    }

    fn visits(&self) -> Vec<CellKey> {
        self.state.lock().unwrap().visits.clone()
    }

    fn repairs(&self) -> u32 {
        self.state.lock().unwrap().repairs
    }

    fn resets(&self) -> u32 {
        self.state.lock().unwrap().resets
    }

    fn extract_calls(&self) -> u32 {
        self.state.lock().unwrap().extract_calls
    }
}

#[async_trait]
impl PortalDriver for ScriptedPortal {
    async fn login(&self) -> Result<()> {
        Ok(())
    }

    async fn ensure_authenticated(&self) {
        let mut state = self.state.lock().unwrap();
        state.auth_checks += 1;
        if self.expire_on_check == Some(state.auth_checks) {
            // Login form detected: the guardian repairs in place.
            state.repairs += 1;
        }
    }

    async fn enumerate_filters(&self) -> Result<FilterDimensions> {
        if self.fail_enumeration {
            anyhow::bail!("filter controls did not appear within the bounded wait");
        }
        Ok(self.dimensions.clone())
    }

    async fn select_cell(&self, cell: &GridCell) -> Result<()> {
        let key = key(cell);
        let mut state = self.state.lock().unwrap();
        state.visits.push(key.clone());
        if self.failing_cells.contains(&key) {
            state.current = None;
            anyhow::bail!("timed out waiting for '#select-program'");
        }
        state.current = Some(key);
        Ok(())
    }

    async fn has_no_data(&self) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state
            .current
            .as_ref()
            .is_some_and(|key| self.no_data_cells.contains(key)))
    }

    async fn extract_rows(&self) -> Result<Vec<RowRecord>> {
        let mut state = self.state.lock().unwrap();
        state.extract_calls += 1;
        let rows = state
            .current
            .as_ref()
            .and_then(|key| self.rows.get(key))
            .cloned()
            .unwrap_or_default();
        Ok(rows)
    }

    async fn reset_to_tool_page(&self) {
        let mut state = self.state.lock().unwrap();
        state.resets += 1;
        state.current = None;
    }
}

/// Transport that serves deterministic bytes and counts every call.
struct CountingTransport {
    calls: AtomicU32,
    fail_matching: Option<String>,
}

impl CountingTransport {
    fn serving() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail_matching: None,
        }
    }

    fn failing_urls_containing(pattern: &str) -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail_matching: Some(pattern.to_string()),
        }
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileTransport for CountingTransport {
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(pattern) = &self.fail_matching {
            if url.contains(pattern) {
                anyhow::bail!("503 Service Unavailable: {url}");
            }
        }
        Ok(format!("bytes from {url}").into_bytes())
    }
}

fn instructor_row(name: &str, hrefs: &[&str]) -> RowRecord {
    let cells = vec![
        name.to_string(),
        "Associate Professor".to_string(),
        "Submitted".to_string(),
        String::new(),
    ];
    RowRecord {
        instructor: name.to_string(),
        cells,
        attachment_urls: hrefs.iter().map(|h| h.to_string()).collect(),
    }
}

async fn run_pipeline(
    portal: Arc<ScriptedPortal>,
    transport: Arc<CountingTransport>,
    root: &std::path::Path,
) -> Result<RunSummary> {
    let fetcher = Arc::new(DownloadExecutor::new(
        transport,
        RetryPolicy {
            max_attempts: 2,
            backoff: Duration::from_millis(1),
        },
    ));
    let resolver = AttachmentResolver::new(&DownloadConfig {
        root_dir: root.to_path_buf(),
        ..DownloadConfig::default()
    });
    RunOrchestrator::new(portal, fetcher, resolver).run().await
}

#[tokio::test]
async fn cells_are_visited_in_fixed_nested_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let portal = Arc::new(ScriptedPortal::new(
        &["2023", "2024"],
        &["Pharmacy", "Nursing"],
    ));
    let transport = Arc::new(CountingTransport::serving());

    let summary = run_pipeline(portal.clone(), transport, dir.path())
        .await
        .expect("run");

    let expected: Vec<(String, String)> = [
        ("2023", "Pharmacy"),
        ("2023", "Nursing"),
        ("2024", "Pharmacy"),
        ("2024", "Nursing"),
    ]
    .iter()
    .map(|(y, p)| (y.to_string(), p.to_string()))
    .collect();
    assert_eq!(portal.visits(), expected);
    assert_eq!(summary.cells_total, 4);
    // No scripted rows anywhere: every cell is empty, none fail.
    assert_eq!(summary.cells_empty, 4);
    assert_eq!(summary.cells_failed, 0);
}

#[tokio::test]
async fn no_data_marker_short_circuits_extraction() {
    let dir = tempfile::tempdir().expect("tempdir");
    let portal = Arc::new(
        ScriptedPortal::new(&["2024"], &["Pharmacy"])
            .with_no_data("2024", "Pharmacy")
            // Rows behind the marker must never be read.
            .with_rows(
                "2024",
                "Pharmacy",
                vec![instructor_row(
                    "Jane Doe",
                    &["https://cdn.example.com/cv.pdf"],
                )],
            ),
    );
    let transport = Arc::new(CountingTransport::serving());

    let summary = run_pipeline(portal.clone(), transport.clone(), dir.path())
        .await
        .expect("run");

    assert_eq!(portal.extract_calls(), 0);
    assert_eq!(transport.call_count(), 0);
    assert_eq!(summary.cells_empty, 1);
    assert_eq!(summary.rows_extracted, 0);
}

#[tokio::test]
async fn failing_cell_is_isolated_and_navigator_is_reset() {
    let dir = tempfile::tempdir().expect("tempdir");
    let portal = Arc::new(
        ScriptedPortal::new(&["2024"], &["Pharmacy", "Nursing", "Dentistry"])
            .with_rows(
                "2024",
                "Pharmacy",
                vec![instructor_row(
                    "Jane Doe",
                    &["https://cdn.example.com/pharmacy/cv.pdf"],
                )],
            )
            .with_failing_cell("2024", "Nursing")
            .with_rows(
                "2024",
                "Dentistry",
                vec![instructor_row(
                    "John Roe",
                    &["https://cdn.example.com/dentistry/cv.pdf"],
                )],
            ),
    );
    let transport = Arc::new(CountingTransport::serving());

    let summary = run_pipeline(portal.clone(), transport.clone(), dir.path())
        .await
        .expect("run");

    // All three cells are visited; only the middle one fails.
    assert_eq!(portal.visits().len(), 3);
    assert_eq!(summary.cells_processed, 2);
    assert_eq!(summary.cells_failed, 1);
    assert_eq!(portal.resets(), 1);

    assert!(dir.path().join("2024/Pharmacy/Jane Doe/cv.pdf").exists());
    assert!(dir.path().join("2024/Dentistry/John Roe/cv.pdf").exists());
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn full_scenario_downloads_once_and_reruns_are_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let build_portal = || {
        Arc::new(
            ScriptedPortal::new(&["2023", "2024"], &["Pharmacy"])
                .with_no_data("2023", "Pharmacy")
                .with_rows(
                    "2024",
                    "Pharmacy",
                    vec![instructor_row(
                        "Jane Doe",
                        &[
                            "https://cdn.example.com/files/cv_jane.pdf",
                            "https://cdn.example.com/files/teaching_statement.pdf",
                        ],
                    )],
                ),
        )
    };

    let first_transport = Arc::new(CountingTransport::serving());
    let first = run_pipeline(build_portal(), first_transport.clone(), dir.path())
        .await
        .expect("first run");

    assert_eq!(first.downloads_succeeded, 2);
    assert_eq!(first_transport.call_count(), 2);

    let instructor_dir = dir.path().join("2024/Pharmacy/Jane Doe");
    let mut files: Vec<String> = std::fs::read_dir(&instructor_dir)
        .expect("instructor dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    assert_eq!(files, vec!["cv_jane.pdf", "teaching_statement.pdf"]);

    // Second identical run against unchanged portal state: zero transfers.
    let second_transport = Arc::new(CountingTransport::serving());
    let second = run_pipeline(build_portal(), second_transport.clone(), dir.path())
        .await
        .expect("second run");

    assert_eq!(second_transport.call_count(), 0);
    assert_eq!(second.downloads_succeeded, 0);
    assert_eq!(second.downloads_skipped, 2);
}

#[tokio::test]
async fn row_without_links_is_skipped_and_creates_no_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let portal = Arc::new(ScriptedPortal::new(&["2024"], &["Pharmacy"]).with_rows(
        "2024",
        "Pharmacy",
        vec![
            instructor_row("No Files", &[]),
            instructor_row("Jane Doe", &["https://cdn.example.com/cv.pdf"]),
        ],
    ));
    let transport = Arc::new(CountingTransport::serving());

    let summary = run_pipeline(portal, transport, dir.path())
        .await
        .expect("run");

    assert_eq!(summary.rows_extracted, 2);
    assert_eq!(summary.rows_skipped, 1);
    assert_eq!(summary.downloads_succeeded, 1);
    assert!(!dir.path().join("2024/Pharmacy/No Files").exists());
    assert!(dir.path().join("2024/Pharmacy/Jane Doe/cv.pdf").exists());
}

#[tokio::test]
async fn session_expiry_mid_run_is_repaired_without_affecting_outcomes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let programs = ["P1", "P2", "P3", "P4", "P5"];
    let mut portal = ScriptedPortal::new(&["2023", "2024"], &programs);
    for year in ["2023", "2024"] {
        for program in &programs {
            let url = format!("https://cdn.example.com/{year}/{program}/cv.pdf");
            portal = portal.with_rows(
                year,
                program,
                vec![instructor_row("Jane Doe", &[url.as_str()])],
            );
        }
    }
    // The session drops right before the 5th of 10 cells.
    let portal = Arc::new(portal.with_expiry_on_check(5));
    let transport = Arc::new(CountingTransport::serving());

    let summary = run_pipeline(portal.clone(), transport.clone(), dir.path())
        .await
        .expect("run");

    assert_eq!(portal.repairs(), 1);
    assert_eq!(summary.cells_processed, 10);
    assert_eq!(summary.cells_failed, 0);
    assert_eq!(summary.downloads_succeeded, 10);
    assert_eq!(transport.call_count(), 10);
}

#[tokio::test]
async fn failed_download_is_recorded_and_siblings_continue() {
    let dir = tempfile::tempdir().expect("tempdir");
    let portal = Arc::new(ScriptedPortal::new(&["2024"], &["Pharmacy"]).with_rows(
        "2024",
        "Pharmacy",
        vec![instructor_row(
            "Jane Doe",
            &[
                "https://cdn.example.com/bad/cv.pdf",
                "https://cdn.example.com/files/statement.pdf",
            ],
        )],
    ));
    let transport = Arc::new(CountingTransport::failing_urls_containing("/bad/"));

    let summary = run_pipeline(portal, transport.clone(), dir.path())
        .await
        .expect("run");

    assert_eq!(summary.downloads_failed, 1);
    assert_eq!(summary.downloads_succeeded, 1);
    // Two attempts for the failing task, one for its sibling.
    assert_eq!(transport.call_count(), 3);
    assert!(!dir.path().join("2024/Pharmacy/Jane Doe/cv.pdf").exists());
    assert!(
        dir.path()
            .join("2024/Pharmacy/Jane Doe/statement.pdf")
            .exists()
    );
}

#[tokio::test]
async fn missing_filter_controls_abort_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let portal = Arc::new(ScriptedPortal::new(&["2024"], &["Pharmacy"]).with_failing_enumeration());
    let transport = Arc::new(CountingTransport::serving());

    let fetcher = Arc::new(DownloadExecutor::new(
        transport,
        RetryPolicy {
            max_attempts: 2,
            backoff: Duration::from_millis(1),
        },
    ));
    let resolver = AttachmentResolver::new(&DownloadConfig {
        root_dir: dir.path().to_path_buf(),
        ..DownloadConfig::default()
    });
    let mut orchestrator = RunOrchestrator::new(portal.clone(), fetcher, resolver);

    let result = orchestrator.run().await;
    assert!(result.is_err());
    assert_eq!(orchestrator.state(), RunState::CriticalFailure);
    assert!(portal.visits().is_empty());
}
