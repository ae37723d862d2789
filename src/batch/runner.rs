//! # 批量执行器
//!
//! 并行处理多个请求文件。
//!
//! ## 功能
//! - 基于 rayon 线程池的并行迭代，线程数默认为 CPU 核数
//! - 进度条显示
//! - 文件级与吸收边级的失败汇总
//!
//! ## 依赖关系
//! - 被 `commands/calc.rs` 调用
//! - 使用 `utils/progress.rs` 创建进度条
//! - 使用 `rayon` 进行并行计算

use crate::error::{Result, XasError};
use crate::utils::progress;

use rayon::prelude::*;
use std::path::PathBuf;

/// 单个请求文件的处理结果
#[derive(Debug, Clone)]
pub enum ProcessResult {
    /// 计算完成，部分吸收边可能失败
    Done {
        computed: usize,
        failed_edges: usize,
    },
    /// 跳过（如输出已存在），附原因
    Skipped(String),
    /// 整个文件失败（读取、解析或请求级错误）
    Failed(String, String), // (文件路径, 错误信息)
}

/// 批量处理结果统计
#[derive(Debug, Default)]
pub struct BatchResult {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
    /// 成功计算的吸收边总数
    pub edges_computed: usize,
    /// 失败的吸收边总数
    pub edges_failed: usize,
    /// 失败文件详情
    pub failures: Vec<(String, String)>,
    /// 跳过原因
    pub skips: Vec<String>,
}

impl BatchResult {
    pub fn merge(&mut self, result: ProcessResult) {
        match result {
            ProcessResult::Done {
                computed,
                failed_edges,
                ..
            } => {
                self.done += 1;
                self.edges_computed += computed;
                self.edges_failed += failed_edges;
            }
            ProcessResult::Skipped(reason) => {
                self.skipped += 1;
                self.skips.push(reason);
            }
            ProcessResult::Failed(path, err) => {
                self.failed += 1;
                self.failures.push((path, err));
            }
        }
    }

    pub fn total(&self) -> usize {
        self.done + self.skipped + self.failed
    }
}

/// 批量执行器
pub struct BatchRunner {
    /// 并行作业数
    jobs: usize,
}

impl BatchRunner {
    /// `jobs` 为 0 时使用全部 CPU 核
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self { jobs }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// 并行处理文件列表
    pub fn run<F>(&self, files: Vec<PathBuf>, processor: F) -> Result<BatchResult>
    where
        F: Fn(&PathBuf) -> ProcessResult + Sync + Send,
    {
        let pb = progress::create_progress_bar(files.len() as u64, "Calculating");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| XasError::Other(format!("failed to build thread pool: {}", e)))?;

        let results: Vec<ProcessResult> = pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    let result = processor(file);
                    pb.inc(1);
                    result
                })
                .collect()
        });

        pb.finish_and_clear();

        let mut batch_result = BatchResult::default();
        for result in results {
            batch_result.merge(result);
        }

        Ok(batch_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_counts_edges() {
        let mut result = BatchResult::default();
        result.merge(ProcessResult::Done {
            computed: 2,
            failed_edges: 1,
        });
        result.merge(ProcessResult::Skipped("b".to_string()));
        result.merge(ProcessResult::Failed("c.json".to_string(), "bad".to_string()));

        assert_eq!(result.total(), 3);
        assert_eq!(result.edges_computed, 2);
        assert_eq!(result.edges_failed, 1);
        assert_eq!(result.failures, vec![("c.json".to_string(), "bad".to_string())]);
        assert_eq!(result.skips, vec!["b".to_string()]);
    }

    #[test]
    fn test_run_processes_every_file() {
        let files: Vec<PathBuf> = (0..8).map(|i| PathBuf::from(format!("{}.json", i))).collect();
        let runner = BatchRunner::new(2);
        assert_eq!(runner.jobs(), 2);

        let result = runner
            .run(files, |file| {
                if file.to_string_lossy().starts_with('3') {
                    ProcessResult::Failed(file.display().to_string(), "broken".to_string())
                } else {
                    ProcessResult::Done {
                        computed: 1,
                        failed_edges: 0,
                    }
                }
            })
            .unwrap();

        assert_eq!(result.done, 7);
        assert_eq!(result.failed, 1);
        assert_eq!(result.edges_computed, 7);
    }
}
