//! 候选子域名列表
//!
//! 文件格式：每行一个子域名标签，去除首尾空白，忽略空行，不支持注释。

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ReconError;

lazy_static! {
    // 一个或多个以点分隔的标签；允许下划线(_dmarc)和通配符(*)
    static ref LABEL_PATTERN: Regex =
        Regex::new(r"^[A-Za-z0-9_*]([A-Za-z0-9_*-]*)(\.[A-Za-z0-9_*]([A-Za-z0-9_*-]*))*$")
            .expect("label pattern is valid");
}

const MAX_NAME_LEN: usize = 253;

/// 待检测的候选目标：标签 + 基础域名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    label: String,
    target: String,
}

impl Candidate {
    /// `label` 和 `domain` 首尾的点会被去掉
    pub fn new(label: &str, domain: &str) -> Self {
        let label = label.trim().trim_end_matches('.');
        let domain = normalize_domain(domain);
        Candidate {
            label: label.to_string(),
            target: format!("{}.{}", label, domain),
        }
    }

    /// 原始标签
    pub fn label(&self) -> &str {
        &self.label
    }

    /// 完整域名
    pub fn target(&self) -> &str {
        &self.target
    }
}

/// 去掉首尾空白以及首尾的点
pub fn normalize_domain(domain: &str) -> &str {
    domain.trim().trim_start_matches('.').trim_end_matches('.')
}

/// 从文件读取候选标签
pub fn load_labels(path: &Path) -> Result<Vec<String>, ReconError> {
    let file = File::open(path).map_err(|source| ReconError::CandidateSourceUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_labels(BufReader::new(file), path)
}

/// 解析候选标签，`origin` 只用于错误信息
pub fn parse_labels<R: BufRead>(reader: R, origin: &Path) -> Result<Vec<String>, ReconError> {
    let mut labels = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| ReconError::CandidateSourceUnreadable {
            path: origin.to_path_buf(),
            source,
        })?;
        let label = line.trim();
        if label.is_empty() {
            continue;
        }
        if !is_valid_label(label) {
            return Err(ReconError::CandidateSourceMalformed {
                path: origin.to_path_buf(),
                line: index + 1,
                entry: label.to_string(),
            });
        }
        labels.push(label.to_string());
    }

    Ok(labels)
}

fn is_valid_label(label: &str) -> bool {
    label.len() <= MAX_NAME_LEN && LABEL_PATTERN.is_match(label)
}

/// 构造候选目标列表
pub fn build_candidates(domain: &str, labels: &[String]) -> Vec<Candidate> {
    labels.iter().map(|label| Candidate::new(label, domain)).collect()
}
