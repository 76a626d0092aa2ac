use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HamlError {
    #[error("{}", format_error("缩进错误", file, *line, *col, context, message, hint))]
    Indentation {
        file: String,
        line: usize,
        col: usize,
        message: String,
        context: String,
        hint: Option<String>,
    },

    #[error("{}", format_error("属性语法错误", file, *line, *col, context, message, hint))]
    AttributeSyntax {
        file: String,
        line: usize,
        col: usize,
        message: String,
        context: String,
        hint: Option<String>,
    },

    #[error("{}", format_error("指令错误", file, *line, *col, context, message, hint))]
    InvalidDirective {
        file: String,
        line: usize,
        col: usize,
        message: String,
        context: String,
        hint: Option<String>,
    },

    #[error("{}", format_error("过滤器错误", file, *line, *col, context, message, hint))]
    FilterNotFound {
        file: String,
        line: usize,
        col: usize,
        message: String,
        context: String,
        hint: Option<String>,
    },

    /// 脚本过滤器内部错误，原样向调用方传递
    #[error(transparent)]
    Script(#[from] anyhow::Error),
}

fn format_error(
    kind: &str,
    file: &str,
    line: usize,
    col: usize,
    context: &str,
    message: &str,
    hint: &Option<String>,
) -> String {
    let mut out = format!("haml {kind}\n  → {file}:{line}:{col}\n\n");
    if !context.is_empty() {
        out.push_str(context);
    }
    out.push_str(&format!("  错误：{message}"));
    if let Some(h) = hint {
        out.push_str(&format!("\n  提示：{h}"));
    }
    out
}

impl HamlError {
    pub fn indentation(
        file: &str,
        line: usize,
        col: usize,
        message: impl Into<String>,
        source: &str,
    ) -> Self {
        Self::Indentation {
            file: file.to_string(),
            line,
            col,
            message: message.into(),
            context: build_error_context(source, line),
            hint: None,
        }
    }

    pub fn attribute_syntax(
        file: &str,
        line: usize,
        col: usize,
        message: impl Into<String>,
        source: &str,
    ) -> Self {
        Self::AttributeSyntax {
            file: file.to_string(),
            line,
            col,
            message: message.into(),
            context: build_error_context(source, line),
            hint: None,
        }
    }

    pub fn invalid_directive(
        file: &str,
        line: usize,
        col: usize,
        message: impl Into<String>,
        hint: impl fmt::Display,
        source: &str,
    ) -> Self {
        Self::InvalidDirective {
            file: file.to_string(),
            line,
            col,
            message: message.into(),
            context: build_error_context(source, line),
            hint: Some(hint.to_string()),
        }
    }

    pub fn filter_not_found(
        file: &str,
        line: usize,
        col: usize,
        message: impl Into<String>,
        source: &str,
    ) -> Self {
        Self::FilterNotFound {
            file: file.to_string(),
            line,
            col,
            message: message.into(),
            context: build_error_context(source, line),
            hint: None,
        }
    }

    /// 在无源码的上下文中创建过滤器错误（渲染阶段），仅标注行列号
    pub fn filter_unavailable(file: &str, line: usize, message: impl Into<String>) -> Self {
        Self::FilterNotFound {
            file: file.to_string(),
            line,
            col: 1,
            message: message.into(),
            context: String::new(),
            hint: None,
        }
    }
}

fn build_error_context(source: &str, error_line: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let start = error_line.saturating_sub(3);
    let end = (error_line + 2).min(lines.len());

    let mut ctx = String::new();
    let width = format!("{}", end).len();
    for i in start..end {
        let marker = if i + 1 == error_line { ">" } else { " " };
        ctx.push_str(&format!(
            "  {} {:>width$} | {}\n",
            marker,
            i + 1,
            lines.get(i).unwrap_or(&""),
            width = width,
        ));
    }
    ctx
}
