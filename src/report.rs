// src/report.rs

use crate::{error::AppResult, models::CaptionVerdict};
use log::{debug, warn};
use serde::Serialize;
use serde_json::{Value, ser::PrettyFormatter};
use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

/// 累积式审核报告：一个 JSON 数组，每次只追加，不合并重复记录。
///
/// 已有记录按原样保留（包括本程序不认识的字段）。文件无法解析或不是数组时，
/// 以本次的新记录重新开始。写入先落到同目录的临时文件再原子替换。
#[derive(Debug, Clone)]
pub struct ResultSink {
    path: PathBuf,
}

impl ResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加记录，返回写入后文件中的记录总数
    pub fn append(&self, verdicts: &[CaptionVerdict]) -> AppResult<usize> {
        let mut records = self.load_existing();
        for verdict in verdicts {
            records.push(serde_json::to_value(verdict)?);
        }
        write_json_file(&self.path, &records)?;
        debug!("报告 {:?} 现有 {} 条记录", self.path, records.len());
        Ok(records.len())
    }

    fn load_existing(&self) -> Vec<Value> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("读取报告 {:?} 失败，将重新开始: {}", self.path, e);
                return Vec::new();
            }
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(items)) => items,
            Ok(_) => {
                warn!("报告 {:?} 不是 JSON 数组，将重新开始", self.path);
                Vec::new()
            }
            Err(e) => {
                warn!("报告 {:?} 已损坏，将重新开始: {}", self.path, e);
                Vec::new()
            }
        }
    }
}

/// 先写同目录临时文件再原子替换，4 空格缩进；父目录不存在时创建
pub fn write_json_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> AppResult<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    let mut serializer = serde_json::Serializer::with_formatter(&mut tmp, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}
