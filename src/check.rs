//! `hamlc check`：批量编译目录下的全部模板，汇总错误与警告。

use crate::{Options, compile_named};
use anyhow::Result;
use std::path::{Path, PathBuf};

pub struct CheckResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub checked: usize,
}

/// 依次编译 root 下（或单个文件）的所有模板，只验证不落盘
pub fn run(root: &Path, options: &Options) -> Result<CheckResult> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let templates = if root.is_file() {
        vec![root.to_path_buf()]
    } else {
        collect_templates(root)?
    };

    if templates.is_empty() {
        warnings.push(format!("{} 下没有找到任何模板", root.display()));
    }

    for path in &templates {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                errors.push(format!("读取 {} 失败：{e}", path.display()));
                continue;
            }
        };
        if let Err(e) = compile_named(&source, &path.display().to_string(), options) {
            errors.push(e.to_string());
        }
    }

    Ok(CheckResult {
        errors,
        warnings,
        checked: templates.len(),
    })
}

/// 递归收集目录下的模板文件
pub fn collect_templates(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut templates = Vec::new();
    collect_into(dir, &mut templates)?;
    templates.sort();
    Ok(templates)
}

fn collect_into(dir: &Path, templates: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_into(&path, templates)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| crate::loader::VALID_EXTENSIONS.contains(&e))
        {
            templates.push(path);
        }
    }
    Ok(())
}
