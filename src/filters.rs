//! 过滤器分发：`:plain`、`:python`、`:javascript`、`:css`。
//! 过滤器正文绕过普通语法，整块按过滤器种类产出文本。

use crate::Options;
use crate::error::HamlError;

/// 过滤器种类（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Plain,
    /// 脚本执行过滤器：正文交给调用方提供的执行器求值
    Python,
    Javascript,
    Css,
}

impl FilterKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "plain" => Some(Self::Plain),
            "python" => Some(Self::Python),
            "javascript" => Some(Self::Javascript),
            "css" => Some(Self::Css),
            _ => None,
        }
    }
}

/// 脚本执行钩子。编译器默认不执行任何代码——这是一条显式的信任边界，
/// 只有调用方通过 [`Options`] 注入执行器后 `:python` 过滤器才可用，
/// 且只应在模板来源可信时注入。
pub trait ScriptEvaluator: Send + Sync {
    /// 同步执行代码片段，返回其写入输出流的全部内容；
    /// 执行期错误会原样传递给 compile 的调用方
    fn eval(&self, code: &str) -> anyhow::Result<String>;
}

/// 行首反斜杠可转义的方言标记字符
const ESCAPABLE_SIGILS: [char; 10] = ['%', '.', '#', '!', '/', '-', '=', ':', '&', '\\'];

/// 渲染一个过滤器节点的正文到输出缓冲
pub fn render(
    kind: FilterKind,
    body: &[String],
    options: &Options,
    file: &str,
    line: usize,
    out: &mut String,
) -> Result<(), HamlError> {
    match kind {
        FilterKind::Plain => {
            for raw in body {
                out.push_str(strip_line_escape(raw));
                out.push('\n');
            }
        }
        FilterKind::Python => {
            let Some(evaluator) = options.evaluator.as_deref() else {
                return Err(HamlError::filter_unavailable(
                    file,
                    line,
                    ":python 过滤器需要调用方注入脚本执行器（默认关闭）",
                ));
            };
            let code = body.join("\n");
            let captured = evaluator.eval(&code)?;
            // 每条打印行对应一条输出行，不产生多余空行
            for printed in captured.split('\n') {
                if printed.is_empty() {
                    continue;
                }
                out.push_str(printed);
                out.push('\n');
            }
        }
        FilterKind::Javascript => {
            let w = options.attr_wrapper;
            out.push_str(&format!("<script type={w}text/javascript{w}>\n// <![CDATA[\n"));
            for raw in body {
                out.push_str(raw);
                out.push('\n');
            }
            out.push_str("// ]]>\n</script>\n");
        }
        FilterKind::Css => {
            let w = options.attr_wrapper;
            out.push_str(&format!("<style type={w}text/css{w}>\n/*<![CDATA[*/\n"));
            for raw in body {
                out.push_str(raw);
                out.push('\n');
            }
            out.push_str("/*]]>*/\n</style>\n");
        }
    }
    Ok(())
}

/// 行首的 `\标记` 剥掉一个转义反斜杠；反斜杠后不是方言标记时原样保留
fn strip_line_escape(raw: &str) -> &str {
    let mut chars = raw.chars();
    if chars.next() == Some('\\') && chars.next().is_some_and(|c| ESCAPABLE_SIGILS.contains(&c)) {
        &raw[1..]
    } else {
        raw
    }
}
