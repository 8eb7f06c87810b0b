use crate::correlation::{Correlation, CorrelationResult};
use crate::ranking::RankedResult;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Consumer of correlation results in final output order.
pub trait ResultSink {
    /// Accepts one result. `rank` is `None` for unranked output.
    fn accept(&mut self, rank: Option<usize>, result: &CorrelationResult) -> Result<(), SinkError>;

    /// Flushes anything buffered.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Sends ranked results to a sink in rank order, then finishes it.
pub fn write_ranked<S: ResultSink + ?Sized>(
    sink: &mut S,
    results: &[RankedResult],
) -> Result<usize, SinkError> {
    for ranked in results {
        sink.accept(ranked.rank, &ranked.result)?;
    }
    sink.finish()?;
    Ok(results.len())
}

/// Sends results to a sink unranked, in the given order, then finishes it.
pub fn write_unranked<S: ResultSink + ?Sized>(
    sink: &mut S,
    results: &[CorrelationResult],
) -> Result<usize, SinkError> {
    for result in results {
        sink.accept(None, result)?;
    }
    sink.finish()?;
    Ok(results.len())
}

#[derive(Debug, Serialize)]
struct CsvRecord<'a> {
    rank: Option<usize>,
    indicator1_code: &'a str,
    indicator1_description: &'a str,
    indicator2_code: &'a str,
    indicator2_description: &'a str,
    analysis_window_start: String,
    analysis_window_end: String,
    /// Empty for full-history windows
    window_size: Option<usize>,
    common_data_points: usize,
    correlation: Option<f64>,
    status: &'static str,
}

impl<'a> CsvRecord<'a> {
    fn new(rank: Option<usize>, result: &'a CorrelationResult) -> Self {
        let (correlation, status) = match result.correlation {
            Correlation::Defined(r) => (Some(r), "ok"),
            Correlation::Undefined => (None, "undefined"),
        };
        CsvRecord {
            rank,
            indicator1_code: &result.indicator_a,
            indicator1_description: &result.description_a,
            indicator2_code: &result.indicator_b,
            indicator2_description: &result.description_b,
            analysis_window_start: result.window_start.to_string(),
            analysis_window_end: result.window_end.to_string(),
            window_size: result.nominal_length,
            common_data_points: result.sample_count,
            correlation,
            status,
        }
    }
}

/// Writes one CSV row per result, with a header row.
pub struct CsvResultSink<W: Write> {
    writer: csv::Writer<W>,
}

impl CsvResultSink<File> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        Ok(CsvResultSink {
            writer: csv::Writer::from_path(path)?,
        })
    }
}

impl<W: Write> CsvResultSink<W> {
    pub fn from_writer(writer: W) -> Self {
        CsvResultSink {
            writer: csv::Writer::from_writer(writer),
        }
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer
            .into_inner()
            .map_err(|e| SinkError::Io(e.into_error()))
    }
}

impl<W: Write> ResultSink for CsvResultSink<W> {
    fn accept(&mut self, rank: Option<usize>, result: &CorrelationResult) -> Result<(), SinkError> {
        self.writer.serialize(CsvRecord::new(rank, result))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Collects results in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub rows: Vec<(Option<usize>, CorrelationResult)>,
    pub finished: bool,
}

impl ResultSink for MemorySink {
    fn accept(&mut self, rank: Option<usize>, result: &CorrelationResult) -> Result<(), SinkError> {
        self.rows.push((rank, result.clone()));
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::Period;

    fn result(correlation: Correlation, nominal_length: Option<usize>) -> CorrelationResult {
        CorrelationResult {
            indicator_a: "PGOLD".to_string(),
            indicator_b: "PSILVER".to_string(),
            description_a: "Gold".to_string(),
            description_b: "Silver, 99.9%".to_string(),
            window_start: Period::month(2020, 3).unwrap(),
            window_end: Period::month(2020, 12).unwrap(),
            nominal_length,
            sample_count: 10,
            correlation,
        }
    }

    #[test]
    fn csv_rows_carry_every_field() {
        let mut sink = CsvResultSink::from_writer(Vec::new());
        write_ranked(
            &mut sink,
            &[
                RankedResult {
                    rank: Some(1),
                    result: result(Correlation::Defined(0.75), Some(12)),
                },
                RankedResult {
                    rank: None,
                    result: result(Correlation::Undefined, None),
                },
            ],
        )
        .unwrap();
        let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "rank,indicator1_code,indicator1_description,indicator2_code,indicator2_description,\
             analysis_window_start,analysis_window_end,window_size,common_data_points,correlation,status"
        );
        assert_eq!(lines[1], "1,PGOLD,Gold,PSILVER,\"Silver, 99.9%\",2020-03,2020-12,12,10,0.75,ok");
        assert_eq!(lines[2], ",PGOLD,Gold,PSILVER,\"Silver, 99.9%\",2020-03,2020-12,,10,,undefined");
    }

    #[test]
    fn annual_windows_format_as_years() {
        let mut annual = result(Correlation::Defined(-0.5), Some(5));
        annual.window_start = Period::Year(2001);
        annual.window_end = Period::Year(2005);
        let mut sink = CsvResultSink::from_writer(Vec::new());
        write_unranked(&mut sink, &[annual]).unwrap();
        let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert!(text.lines().nth(1).unwrap().contains(",2001,2005,5,10,-0.5,ok"));
    }

    #[test]
    fn memory_sink_records_order_and_finish() {
        let mut sink = MemorySink::default();
        let written = write_unranked(
            &mut sink,
            &[result(Correlation::Defined(0.1), Some(3)), result(Correlation::Undefined, Some(3))],
        )
        .unwrap();
        assert_eq!(written, 2);
        assert!(sink.finished);
        assert_eq!(sink.rows[1].1.correlation, Correlation::Undefined);
    }
}
