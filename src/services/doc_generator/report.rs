//! 批次报告
//!
//! 每个文件一节：文档覆盖率、函数计数以及文件级或函数级错误。
//! 批次结束后写到 `<output_dir>/result.md`。

use std::path::{Path, PathBuf};
use tokio::fs;

use super::artifacts::ArtifactError;
use super::types::FileOutcome;

pub const REPORT_FILE: &str = "result.md";

/// 渲染批次报告（Markdown）
pub fn render_report(outcomes: &[FileOutcome]) -> String {
    let mut out = String::from("# Documentation Results\n");

    for outcome in outcomes {
        if outcome.total_functions == 0 {
            out.push_str(&format!("## {} was documented at 0%\n", outcome.file));
            out.push_str("Couldn't count the number of functions\n");
        } else {
            let percentage = outcome.documented_functions * 100 / outcome.total_functions;
            out.push_str(&format!("## {} was documented at {}%\n", outcome.file, percentage));
            out.push_str(&format!(
                "Functions documented: {}/{}\n",
                outcome.documented_functions, outcome.total_functions
            ));
        }

        if let Some(error) = &outcome.global_error {
            out.push_str(&format!("### File error:\n{}\n", error));
        } else if !outcome.function_errors.is_empty() {
            out.push_str("### Function errors:\n");
            for (function, error) in &outcome.function_errors {
                out.push_str(&format!("- {} {}\n", function, error));
            }
        }
    }
    out
}

/// 写出批次报告，返回报告路径
pub async fn write_report(output_dir: &Path, outcomes: &[FileOutcome]) -> Result<PathBuf, ArtifactError> {
    let path = output_dir.join(REPORT_FILE);
    fs::create_dir_all(output_dir)
        .await
        .map_err(|e| ArtifactError::Io(output_dir.to_path_buf(), e))?;
    fs::write(&path, render_report(outcomes))
        .await
        .map_err(|e| ArtifactError::Io(path.clone(), e))?;
    Ok(path)
}
