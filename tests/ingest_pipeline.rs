use commodity_analytics::imf_client::{SdmxSource, SourceError};
use commodity_analytics::sdmx::{CodeEntry, DataStructure, ObservationRow, SdmxSeries};
use commodity_analytics::{Database, Frequency, IngestError, IngestionPipeline, SeriesKey, SeriesLoader};
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

/// Scripted source: a fixed structure and per-key responses. Unknown keys
/// answer with HTTP 404.
struct MockSource {
    structure: Option<DataStructure>,
    series: HashMap<String, Vec<SdmxSeries>>,
    requested: RefCell<Vec<String>>,
}

impl MockSource {
    fn new(structure: DataStructure) -> Self {
        MockSource {
            structure: Some(structure),
            series: HashMap::new(),
            requested: RefCell::new(Vec::new()),
        }
    }

    fn with_series(mut self, key: &str, rows: &[(&str, &str)]) -> Self {
        let series = SdmxSeries {
            rows: rows
                .iter()
                .map(|(period, value)| ObservationRow {
                    time_period: period.to_string(),
                    value: value.to_string(),
                })
                .collect(),
            ..SdmxSeries::default()
        };
        self.series.entry(key.to_string()).or_default().push(series);
        self
    }
}

impl SdmxSource for &MockSource {
    async fn data_structure(&self) -> Result<DataStructure, SourceError> {
        self.structure.clone().ok_or(SourceError::Status {
            url: "mock://DataStructure/PCPS".to_string(),
            status: 500,
        })
    }

    async fn compact_data(&self, key: &SeriesKey) -> Result<Vec<SdmxSeries>, SourceError> {
        self.requested.borrow_mut().push(key.as_string());
        self.series
            .get(&key.as_string())
            .cloned()
            .ok_or_else(|| SourceError::Status {
                url: format!("mock://CompactData/PCPS/{key}"),
                status: 404,
            })
    }
}

fn entry(code: &str, description: &str) -> CodeEntry {
    CodeEntry {
        code: code.to_string(),
        description: description.to_string(),
    }
}

fn structure(indicators: &[(&str, &str)]) -> DataStructure {
    DataStructure {
        frequencies: vec![entry("M", "Monthly")],
        areas: vec![entry("W00", "All Countries")],
        indicators: indicators.iter().map(|(c, d)| entry(c, d)).collect(),
        units: vec![entry("USD", "US Dollars"), entry("IX", "Index")],
    }
}

#[tokio::test]
async fn ingests_every_planned_series_and_skips_failures() {
    let db = Database::open_in_memory().unwrap();
    let source = MockSource::new(structure(&[
        ("PGOLD", "Primary Commodity Prices, Gold"),
        ("PFOOD", "Primary Commodity Prices, Food"),
        ("PMISSING", "Primary Commodity Prices, Missing"),
    ]))
    .with_series(
        "M.W00.PGOLD.USD",
        &[("2020-01", "1560.5"), ("2020-02", "1597.1"), ("2020-03", "n/a")],
    )
    .with_series("M.W00.PFOOD.IX", &[("2020-01-01", "101.2")]);

    let report = IngestionPipeline::new(&source, &db, Duration::ZERO)
        .run()
        .await
        .unwrap();

    assert_eq!(
        *source.requested.borrow(),
        vec!["M.W00.PGOLD.USD", "M.W00.PFOOD.IX", "M.W00.PMISSING.USD"]
    );
    assert_eq!(report.configurations, 3);
    assert_eq!(report.failed_configurations, 1);
    assert_eq!(report.writes.inserted, 3);
    assert_eq!(report.dropped_rows, 1);
    assert_eq!(report.registry.inserted, 3);
    assert_eq!(report.active_indicators.len(), 3);

    let gold = SeriesLoader::new(&db).load("PGOLD", Frequency::Monthly).unwrap();
    assert_eq!(gold.len(), 2);
    let food = SeriesLoader::new(&db).load("PFOOD", Frequency::Monthly).unwrap();
    assert_eq!(food.points()[0].period.to_string(), "2020-01");
}

#[tokio::test]
async fn second_run_is_idempotent_and_detects_revisions() {
    let db = Database::open_in_memory().unwrap();
    let first = MockSource::new(structure(&[("PGOLD", "Gold")]))
        .with_series("M.W00.PGOLD.USD", &[("2020-01", "10"), ("2020-02", "11")]);
    IngestionPipeline::new(&first, &db, Duration::ZERO).run().await.unwrap();

    let again = IngestionPipeline::new(&first, &db, Duration::ZERO).run().await.unwrap();
    assert_eq!(again.writes.inserted, 0);
    assert_eq!(again.writes.unchanged, 2);

    let revised = MockSource::new(structure(&[("PGOLD", "Gold")]))
        .with_series("M.W00.PGOLD.USD", &[("2020-01", "10"), ("2020-02", "12"), ("2020-03", "13")]);
    let report = IngestionPipeline::new(&revised, &db, Duration::ZERO).run().await.unwrap();
    assert_eq!(report.writes.inserted, 1);
    assert_eq!(report.writes.updated, 1);
    assert_eq!(report.writes.unchanged, 1);
    assert_eq!(db.series_store().count().unwrap(), 3);
}

#[tokio::test]
async fn multiple_series_use_the_first() {
    let db = Database::open_in_memory().unwrap();
    let source = MockSource::new(structure(&[("PGOLD", "Gold")]))
        .with_series("M.W00.PGOLD.USD", &[("2020-01", "1")])
        .with_series("M.W00.PGOLD.USD", &[("2020-01", "2"), ("2020-02", "3")]);
    let report = IngestionPipeline::new(&source, &db, Duration::ZERO).run().await.unwrap();
    assert_eq!(report.writes.inserted, 1);
}

#[tokio::test]
async fn empty_leading_series_is_skipped() {
    let db = Database::open_in_memory().unwrap();
    let source = MockSource::new(structure(&[("PGOLD", "Gold")]))
        .with_series("M.W00.PGOLD.USD", &[])
        .with_series("M.W00.PGOLD.USD", &[("2020-01", "2"), ("2020-02", "3")]);
    let report = IngestionPipeline::new(&source, &db, Duration::ZERO).run().await.unwrap();
    assert_eq!(report.writes.inserted, 2);
    assert_eq!(report.empty_configurations, 0);

    let gold = SeriesLoader::new(&db).load("PGOLD", Frequency::Monthly).unwrap();
    assert_eq!(gold.points()[0].value, 2.0);
}

#[tokio::test]
async fn only_empty_series_count_as_empty_configuration() {
    let db = Database::open_in_memory().unwrap();
    let source = MockSource::new(structure(&[("PGOLD", "Gold")]))
        .with_series("M.W00.PGOLD.USD", &[])
        .with_series("M.W00.PGOLD.USD", &[]);
    let report = IngestionPipeline::new(&source, &db, Duration::ZERO).run().await.unwrap();
    assert_eq!(report.empty_configurations, 1);
    assert_eq!(report.writes.inserted, 0);
}

#[tokio::test]
async fn dropped_indicator_is_retired() {
    let db = Database::open_in_memory().unwrap();
    let before = MockSource::new(structure(&[("PGOLD", "Gold"), ("POLD", "Old")]));
    IngestionPipeline::new(&before, &db, Duration::ZERO).run().await.unwrap();

    let after = MockSource::new(structure(&[("PGOLD", "Gold")]));
    let report = IngestionPipeline::new(&after, &db, Duration::ZERO).run().await.unwrap();
    assert_eq!(report.registry.retired, vec!["POLD".to_string()]);
    assert_eq!(report.failed_configurations, 1);
    assert!(!db.registry().get("POLD").unwrap().unwrap().is_active);
}

#[tokio::test]
async fn structure_failure_aborts_the_run() {
    let db = Database::open_in_memory().unwrap();
    let mut source = MockSource::new(DataStructure::default());
    source.structure = None;
    let err = IngestionPipeline::new(&source, &db, Duration::ZERO)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Structure(SourceError::Status { status: 500, .. })));
}

#[tokio::test]
async fn empty_listing_leaves_registry_untouched() {
    let db = Database::open_in_memory().unwrap();
    db.registry()
        .refresh(&[commodity_analytics::IndicatorInfo::new("PGOLD", "Gold")])
        .unwrap();
    let source = MockSource::new(structure(&[]));
    let report = IngestionPipeline::new(&source, &db, Duration::ZERO).run().await.unwrap();
    assert_eq!(report.configurations, 0);
    assert!(db.registry().get("PGOLD").unwrap().unwrap().is_active);
}
