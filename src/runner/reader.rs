use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::Result;
use crate::runner::types::{RunMode, SampleRecord};

/// 在多个消费者之间共享的 reader
pub type SharedReader = Arc<Mutex<SamplesReader>>;

/// 流式读取 worker 写出的 LDJSON 报告
///
/// 文件在读取期间仍在增长：每次只返回完整的行，末尾未写完的部分留到下次读取。
#[derive(Debug)]
pub struct SamplesReader {
    path: PathBuf,
    mode: RunMode,
    offset: u64,
    partial: Vec<u8>,
    read_records: usize,
}

impl SamplesReader {
    pub fn new(path: impl Into<PathBuf>, mode: RunMode) -> Self {
        Self {
            path: path.into(),
            mode,
            offset: 0,
            partial: Vec::new(),
            read_records: 0,
        }
    }

    pub fn shared(self) -> SharedReader {
        Arc::new(Mutex::new(self))
    }

    /// 已读取的记录数
    pub fn read_records(&self) -> usize {
        self.read_records
    }

    /// 读取上次位置之后新增的完整记录；文件尚不存在时返回空
    pub fn read_new(&mut self) -> Result<Vec<SampleRecord>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        file.seek(SeekFrom::Start(self.offset))?;
        let mut chunk = Vec::new();
        let read = file.read_to_end(&mut chunk)?;
        if read == 0 {
            return Ok(Vec::new());
        }
        self.offset += read as u64;
        self.partial.extend_from_slice(&chunk);

        let mut records = Vec::new();
        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<SampleRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping malformed report line in {}: {}", self.path.display(), e),
            }
        }

        self.read_records += records.len();
        if !records.is_empty() {
            debug!(
                "Read {} new {} records from {}",
                records.len(),
                self.mode,
                self.path.display()
            );
        }
        Ok(records)
    }
}
