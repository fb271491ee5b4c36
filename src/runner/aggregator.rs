use tracing::debug;

use crate::runner::reader::SharedReader;
use crate::runner::types::{RunMode, RunSummary, SampleRecord};
use crate::{ApiforgeError, Result};

/// 结果聚合方：接收 runner 注册的 reader
pub trait Aggregator {
    /// 是否消费该模式的结果
    fn accepts(&self, mode: RunMode) -> bool;

    fn add_underling(&mut self, reader: SharedReader);
}

/// 内置的聚合实现：拉取所有 reader 的新记录并累计摘要
pub struct SampleCollector {
    mode: RunMode,
    readers: Vec<SharedReader>,
    summary: RunSummary,
}

impl SampleCollector {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            readers: Vec::new(),
            summary: RunSummary::default(),
        }
    }

    /// 读取所有 reader 中新增的记录
    pub fn collect(&mut self) -> Result<Vec<SampleRecord>> {
        let mut samples = Vec::new();
        for reader in &self.readers {
            let mut reader = reader
                .lock()
                .map_err(|_| ApiforgeError::Other("samples reader lock poisoned".to_string()))?;
            samples.extend(reader.read_new()?);
        }

        for sample in &samples {
            self.summary.record(sample);
        }
        Ok(samples)
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }
}

impl Aggregator for SampleCollector {
    fn accepts(&self, mode: RunMode) -> bool {
        self.mode == mode
    }

    fn add_underling(&mut self, reader: SharedReader) {
        debug!("Collector ({}) attached a samples reader", self.mode);
        self.readers.push(reader);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::reader::SamplesReader;
    use std::fs;

    #[test]
    fn test_collect_accumulates_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.ldjson");
        fs::write(
            &path,
            concat!(
                r#"{"test_case": "a", "status": "PASSED", "start_time": 1.0, "duration": 0.5}"#,
                "\n",
                r#"{"test_case": "b", "status": "BROKEN", "start_time": 2.0, "duration": 0.5}"#,
                "\n",
            ),
        )
        .unwrap();

        let mut collector = SampleCollector::new(RunMode::Functional);
        assert!(collector.accepts(RunMode::Functional));
        assert!(!collector.accepts(RunMode::Load));

        collector.add_underling(SamplesReader::new(&path, RunMode::Functional).shared());
        let samples = collector.collect().unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(collector.summary().passed, 1);
        assert_eq!(collector.summary().broken, 1);

        assert!(collector.collect().unwrap().is_empty());
        assert_eq!(collector.summary().total, 2);
    }
}
