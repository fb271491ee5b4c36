use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 结果消费方的运行模式，功能测试与负载测试互斥
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Functional,
    Load,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Functional => write!(f, "functional"),
            RunMode::Load => write!(f, "load"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SampleStatus {
    Passed,
    Failed,
    Broken,
    Skipped,
}

/// worker 每执行一次请求写出的一条记录（LDJSON 中的一行）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// 测试方法名
    pub test_case: String,

    #[serde(default)]
    pub test_suite: String,

    pub status: SampleStatus,

    /// 开始时间（Unix 时间戳，秒）
    pub start_time: f64,

    /// 耗时（秒）
    pub duration: f64,

    #[serde(default)]
    pub error_msg: Option<String>,

    #[serde(default)]
    pub error_trace: Option<String>,

    /// 运行时附加的信息，例如请求/响应明细
    #[serde(default)]
    pub extras: Map<String, Value>,
}

impl SampleRecord {
    pub fn label(&self) -> &str {
        &self.test_case
    }

    pub fn passed(&self) -> bool {
        self.status == SampleStatus::Passed
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let secs = self.start_time.trunc() as i64;
        let nanos = (self.start_time.fract() * 1e9) as u32;
        DateTime::from_timestamp(secs, nanos)
    }

    pub fn elapsed(&self) -> Duration {
        Duration::try_from_secs_f64(self.duration).unwrap_or_default()
    }

    /// 响应状态码（运行时在 extras 中提供时）
    pub fn response_code(&self) -> Option<u16> {
        self.extras
            .get("responseCode")
            .and_then(|v| match v {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            })
            .and_then(|code| u16::try_from(code).ok())
    }
}

/// 运行摘要
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub broken: usize,
    pub skipped: usize,
    pub total_duration: Duration,
}

impl RunSummary {
    pub fn from_samples(samples: &[SampleRecord]) -> Self {
        let mut summary = Self::default();
        for sample in samples {
            summary.record(sample);
        }
        summary
    }

    pub fn record(&mut self, sample: &SampleRecord) {
        self.total += 1;
        self.total_duration += sample.elapsed();
        match sample.status {
            SampleStatus::Passed => self.passed += 1,
            SampleStatus::Failed => self.failed += 1,
            SampleStatus::Broken => self.broken += 1,
            SampleStatus::Skipped => self.skipped += 1,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.broken == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(status: SampleStatus, duration: f64) -> SampleRecord {
        SampleRecord {
            test_case: "test_00000__".to_string(),
            test_suite: "TestRequests".to_string(),
            status,
            start_time: 1_700_000_000.5,
            duration,
            error_msg: None,
            error_trace: None,
            extras: Map::new(),
        }
    }

    #[test]
    fn test_parse_record() {
        let line = r#"{"test_case": "test_00000_x", "test_suite": "TestRequests", "status": "FAILED", "start_time": 1700000000.25, "duration": 0.5, "error_msg": "boom", "extras": {"responseCode": 404}}"#;
        let record: SampleRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.label(), "test_00000_x");
        assert_eq!(record.status, SampleStatus::Failed);
        assert!(!record.passed());
        assert_eq!(record.error_msg.as_deref(), Some("boom"));
        assert_eq!(record.response_code(), Some(404));
        assert_eq!(record.elapsed(), Duration::from_millis(500));
    }

    #[test]
    fn test_timestamp() {
        let record = sample(SampleStatus::Passed, 0.1);
        let ts = record.timestamp().unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_summary() {
        let samples = vec![
            sample(SampleStatus::Passed, 0.1),
            sample(SampleStatus::Passed, 0.2),
            sample(SampleStatus::Failed, 0.3),
            sample(SampleStatus::Skipped, 0.0),
        ];

        let summary = RunSummary::from_samples(&samples);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert!(!summary.all_passed());
    }
}
