//! 持久化表格 (带表头的 CSV) 的读取与导出.
//!
//! 两张输入表都按列位置解析, 不依赖表头的具体名称:
//!
//! - 标注表: `scan_id, x, y, z, diameter_mm`;
//! - 候选表: `scan_id, x, y, z, flag`.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{LunaError, LunaResult};

mod annotation;
mod candidate;
mod report;

pub use annotation::{Annotation, AnnotationIndex};
pub use candidate::{
    match_diameter, read_candidate_rows, read_candidate_rows_from, resolve_candidates,
    CandidateInfo, CandidateRow, MatchPolicy,
};
pub use report::{write_candidates, CandidateSummary};

/// 每张输入表的列数.
const TABLE_COLUMNS: usize = 5;

#[inline]
fn builder() -> csv::ReaderBuilder {
    let mut b = csv::ReaderBuilder::new();
    b.has_headers(true).trim(csv::Trim::All);
    b
}

/// 从路径打开表格.
fn open_table(path: &Path) -> LunaResult<csv::Reader<File>> {
    builder()
        .from_path(path)
        .map_err(|source| LunaError::TableOpen {
            path: path.to_owned(),
            source,
        })
}

/// 从任意输入流打开表格.
#[inline]
fn table_from_reader<R: Read>(rdr: R) -> csv::Reader<R> {
    builder().from_reader(rdr)
}

/// 逐行读取表格, 把每条记录连同行号交给 `f` 处理.
///
/// 列数不符时整表读取失败.
fn for_each_record<R, F>(rdr: &mut csv::Reader<R>, mut f: F) -> LunaResult<()>
where
    R: Read,
    F: FnMut(u64, &csv::StringRecord) -> LunaResult<()>,
{
    let mut record = csv::StringRecord::new();
    while rdr.read_record(&mut record)? {
        let line = record.position().map_or(0, |p| p.line());
        if record.len() != TABLE_COLUMNS {
            return Err(LunaError::MalformedRow {
                line,
                reason: format!("expected {TABLE_COLUMNS} columns, got {}", record.len()),
            });
        }
        f(line, &record)?;
    }
    Ok(())
}
