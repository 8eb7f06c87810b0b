pub mod series_key;
pub mod period;
pub mod time_series;
pub mod store;
pub mod registry;
pub mod loader;
pub mod align;
pub mod correlation;
pub mod ranking;
pub mod analysis;
pub mod sdmx;
pub mod imf_client;
pub mod ingest;
pub mod sink;
pub mod config;


pub use series_key::{Frequency, SeriesKey, SeriesKeyError};
pub use period::{Period, PeriodParseError};
pub use time_series::{
    InMemoryObservationSource, Observation, ObservationSource, RawObservation, Series, SeriesPoint,
    StoredValue,
};
pub use store::{Database, SeriesStore, StoreError, UpsertSummary, WriteOutcome};
pub use registry::{IndicatorInfo, IndicatorMetadata, IndicatorRegistry, RefreshSummary};
pub use loader::SeriesLoader;
pub use align::{
    inner_join, AlignedPoint, AlignedWindow, FullHistory, LatestWindow, RollingWindow, WindowSpec,
    WindowStrategy,
};
pub use correlation::{pearson, Correlation, CorrelationEngine, CorrelationResult, ScoreOutcome};
pub use ranking::{rank, RankedResult};
pub use analysis::{
    AnalysisError, CorrelationMatrix, MatrixConfig, MatrixReport, RollingPairAnalysis, RollingReport,
};
pub use sdmx::{DataStructure, DecodeError, SdmxSeries};
pub use imf_client::{ClientConfig, ImfClient, SdmxSource, SourceError};
pub use ingest::{IngestError, IngestReport, IngestionPipeline};
pub use sink::{CsvResultSink, MemorySink, ResultSink, SinkError};
pub use config::AppConfig;
