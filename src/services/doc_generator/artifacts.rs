//! 文档产物输出
//!
//! 把收集到的 [`DocLine`] 渲染为 Markdown 与 Word 文档，行的顺序保持不变。
//!
//! 输出路径：`<output_dir>/<相对父目录>/<文件名>.md` 与 `.docx`，
//! 例如 `src/main.py` → `<output_dir>/src/main.py.md`

use chrono::Local;
use docx_rs::{
    AbstractNumbering, Docx, IndentLevel, Level, LevelJc, LevelText, NumberFormat, Numbering,
    NumberingId, Paragraph, Run, Start, Style, StyleType,
};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::types::OutputFormats;
use crate::services::language::DocLine;

const BULLET_NUMBERING: usize = 1;

/// 产物写出错误
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to write documentation artifact {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to build Word document {0}: {1}")]
    Docx(PathBuf, String),
}

/// 文档标题行
pub fn title_line(file: &str) -> DocLine {
    DocLine::Title(format!("Documentation for {}", file))
}

/// 产物基础路径（不含最终扩展名）
pub fn artifact_base(output_dir: &Path, relative: &Path) -> PathBuf {
    let name = relative
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let parent = relative.parent().unwrap_or(Path::new(""));
    output_dir.join(parent).join(name)
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut path = base.as_os_str().to_owned();
    path.push(suffix);
    PathBuf::from(path)
}

/// 渲染 Markdown
pub fn render_markdown(lines: &[DocLine]) -> String {
    let mut out = String::new();
    let mut header_done = false;

    for line in lines {
        match line {
            DocLine::Title(text) => {
                out.push_str(&format!("# {}\n\n", text));
                if !header_done {
                    out.push_str(&format!(
                        "> Generated at {}\n\n",
                        Local::now().format("%Y-%m-%d %H:%M:%S")
                    ));
                    header_done = true;
                }
            }
            DocLine::Subheader(text) => out.push_str(&format!("## {}\n\n", text)),
            DocLine::Bold(text) => out.push_str(&format!("**{}**\n\n", text)),
            DocLine::Text(text) => out.push_str(&format!("{}\n\n", text)),
            DocLine::Bullet(text) => out.push_str(&format!("- {}\n\n", text)),
            DocLine::BulletList(items) => {
                for item in items {
                    // 多行条目的后续行缩进到列表项内
                    out.push_str(&format!("- {}\n", item.replace('\n', "\n  ")));
                }
                out.push('\n');
            }
        }
    }

    out.trim_end().to_string() + "\n"
}

fn text_paragraph(text: &str) -> Paragraph {
    text.lines().enumerate().fold(Paragraph::new(), |p, (i, line)| {
        let run = Run::new().add_text(line);
        p.add_run(if i == 0 { run } else { run.add_break(docx_rs::BreakType::TextWrapping) })
    })
}

fn bullet_paragraph(text: &str) -> Paragraph {
    text_paragraph(text).numbering(NumberingId::new(BULLET_NUMBERING), IndentLevel::new(0))
}

/// 渲染 Word 文档
pub fn render_docx(lines: &[DocLine]) -> Docx {
    let mut docx = Docx::new()
        .add_style(Style::new("Heading1", StyleType::Paragraph).name("Heading 1").bold().size(32))
        .add_style(Style::new("Heading2", StyleType::Paragraph).name("Heading 2").bold().size(26))
        .add_abstract_numbering(AbstractNumbering::new(BULLET_NUMBERING).add_level(Level::new(
            0,
            Start::new(1),
            NumberFormat::new("bullet"),
            LevelText::new("•"),
            LevelJc::new("left"),
        )))
        .add_numbering(Numbering::new(BULLET_NUMBERING, BULLET_NUMBERING));

    for line in lines {
        docx = match line {
            DocLine::Title(text) => {
                docx.add_paragraph(Paragraph::new().style("Heading1").add_run(Run::new().add_text(text)))
            }
            DocLine::Subheader(text) => {
                docx.add_paragraph(Paragraph::new().style("Heading2").add_run(Run::new().add_text(text)))
            }
            DocLine::Bold(text) => docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(text).bold())),
            DocLine::Text(text) => docx.add_paragraph(text_paragraph(text)),
            DocLine::Bullet(text) => docx.add_paragraph(bullet_paragraph(text)),
            DocLine::BulletList(items) => items
                .iter()
                .fold(docx, |docx, item| docx.add_paragraph(bullet_paragraph(item))),
        };
    }
    docx
}

/// 写出启用的产物，返回写出的路径
///
/// 只有标题行时不写出任何文件
pub async fn write_artifacts(
    lines: &[DocLine],
    output_dir: &Path,
    relative: &Path,
    formats: OutputFormats,
) -> Result<Vec<PathBuf>, ArtifactError> {
    if lines.len() <= 1 || !formats.any() {
        return Ok(Vec::new());
    }

    let base = artifact_base(output_dir, relative);
    if let Some(parent) = base.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| ArtifactError::Io(parent.to_path_buf(), e))?;
    }

    let mut written = Vec::new();

    if formats.markdown {
        let path = with_suffix(&base, ".md");
        fs::write(&path, render_markdown(lines))
            .await
            .map_err(|e| ArtifactError::Io(path.clone(), e))?;
        debug!("Wrote {}", path.display());
        written.push(path);
    }

    if formats.document {
        let path = with_suffix(&base, ".docx");
        let mut buffer = Cursor::new(Vec::new());
        render_docx(lines)
            .build()
            .pack(&mut buffer)
            .map_err(|e| ArtifactError::Docx(path.clone(), e.to_string()))?;
        fs::write(&path, buffer.into_inner())
            .await
            .map_err(|e| ArtifactError::Io(path.clone(), e))?;
        debug!("Wrote {}", path.display());
        written.push(path);
    }

    Ok(written)
}
