//! 树构建：按缩进层级把源码行组装为节点树。
//!
//! 节点存放在按下标寻址的 arena 中，子节点以下标列表引用，
//! 保证无环与确定的深度优先顺序；树随单次编译创建与销毁。

use crate::element::{self, ParsedElement};
use crate::error::HamlError;
use crate::filters::FilterKind;
use crate::inline;
use crate::lexer::{SourceLine, Tokenized};

pub type NodeId = usize;

#[derive(Debug)]
pub struct Node {
    pub depth: usize,
    pub line: usize,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
}

#[derive(Debug)]
pub enum NodeKind {
    Root,
    Element(ParsedElement),
    PlainText {
        text: String,
    },
    Comment {
        text: String,
        /// 条件注释的条件表达式，如 `if IE`
        condition: Option<String>,
    },
    Statement {
        body: String,
        keyword: String,
    },
    Expression {
        body: String,
    },
    Filter {
        kind: FilterKind,
        /// 已剥离公共缩进的原始正文行
        body: Vec<String>,
    },
    Doctype {
        token: String,
    },
}

#[derive(Debug)]
pub struct Arena {
    pub nodes: Vec<Node>,
    pub file: String,
    /// 渲染时按层级重复的缩进单位
    pub indent_unit: String,
}

impl Arena {
    pub const ROOT: NodeId = 0;

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }
}

/// 语句关键字 → 自动补全的闭合关键字
pub const CLOSING_KEYWORDS: &[(&str, &str)] = &[
    ("for", "endfor"),
    ("if", "endif"),
    ("ifchanged", "endifchanged"),
    ("ifequal", "endifequal"),
    ("ifnotequal", "endifnotequal"),
    ("block", "endblock"),
    ("filter", "endfilter"),
    ("autoescape", "endautoescape"),
    ("with", "endwith"),
    ("blocktrans", "endblocktrans"),
    ("spaceless", "endspaceless"),
    ("comment", "endcomment"),
    ("cache", "endcache"),
    ("localize", "endlocalize"),
    ("compress", "endcompress"),
];

/// 块语句 → 允许出现在块内同层的延续关键字（如 if 的 else）
const CONTINUATION_KEYWORDS: &[(&str, &str)] = &[
    ("if", "else"),
    ("ifchanged", "else"),
    ("ifequal", "else"),
    ("ifnotequal", "else"),
    ("for", "empty"),
    ("with", "with"),
];

pub fn closing_keyword(keyword: &str) -> Option<&'static str> {
    CLOSING_KEYWORDS
        .iter()
        .find(|(open, _)| *open == keyword)
        .map(|(_, close)| *close)
}

fn is_closing_keyword(keyword: &str) -> bool {
    CLOSING_KEYWORDS.iter().any(|(_, close)| *close == keyword)
}

fn continues(open: &str, keyword: &str) -> bool {
    CONTINUATION_KEYWORDS
        .iter()
        .any(|(o, c)| *o == open && *c == keyword)
}

/// 将行序列解析为节点树
pub fn parse(tokenized: &Tokenized, file: &str, source: &str) -> Result<Arena, HamlError> {
    let mut arena = Arena {
        nodes: vec![Node {
            depth: 0,
            line: 0,
            children: Vec::new(),
            kind: NodeKind::Root,
        }],
        file: file.to_string(),
        indent_unit: tokenized.indent_unit.clone().unwrap_or_else(|| "  ".to_string()),
    };

    // (层级, 节点) 栈；根节点层级视为 -1
    let mut stack: Vec<(i64, NodeId)> = vec![(-1, Arena::ROOT)];

    let lines = &tokenized.lines;
    let mut idx = 0;

    while idx < lines.len() {
        let line = &lines[idx];
        idx += 1;

        // 语法层面跳过空行；过滤器正文在下方整块收集，空行在其中保留
        if line.blank {
            continue;
        }

        let depth = line.depth.ok_or_else(|| {
            HamlError::indentation(
                file,
                line.line,
                line.indent_width + 1,
                "缩进与首个缩进行确立的缩进单位不一致",
                source,
            )
        })?;

        let mut kind = classify(line, file, source)?;

        // 过滤器正文：比过滤器更深的行原样收集，不再参与语法
        if let NodeKind::Filter { body, .. } = &mut kind {
            idx = collect_filter_body(lines, idx, line.indent_width, body);
        }

        // 弹栈：更深的节点全部出栈；同层时仅延续语句保留所属块
        while stack.last().is_some_and(|(d, _)| *d > depth as i64) {
            stack.pop();
        }
        while let Some(&(d, open_id)) = stack.last() {
            if d != depth as i64 {
                break;
            }
            if let (NodeKind::Statement { keyword, .. }, NodeKind::Statement { keyword: open_kw, .. }) = (
                &kind,
                &arena.nodes[open_id].kind,
            ) {
                if continues(open_kw, keyword) {
                    break;
                }
            }
            stack.pop();
        }

        let &(parent_depth, parent_id) = stack.last().expect("根节点始终在栈底");
        if depth as i64 > parent_depth + 1 {
            return Err(HamlError::indentation(
                file,
                line.line,
                line.indent_width + 1,
                format!("缩进层级跳跃：第 {} 层直接进入第 {} 层", parent_depth + 1, depth),
                source,
            ));
        }

        let id = arena.nodes.len();
        arena.nodes.push(Node {
            depth,
            line: line.line,
            children: Vec::new(),
            kind,
        });
        arena.nodes[parent_id].children.push(id);
        stack.push((depth as i64, id));
    }

    Ok(arena)
}

/// 按行首标记分类
fn classify(line: &SourceLine, file: &str, source: &str) -> Result<NodeKind, HamlError> {
    let content = &line.content;
    let mut chars = content.chars();
    let first = chars.next().expect("空行已在上游跳过");
    let second = chars.next();

    match first {
        '!' if content.starts_with("!!!") => Ok(NodeKind::Doctype {
            token: content[3..].trim().to_string(),
        }),

        '/' => {
            let rest = content[1..].trim_start();
            if let Some(bracketed) = rest.strip_prefix('[') {
                let Some(end) = bracketed.find(']') else {
                    return Err(HamlError::attribute_syntax(
                        file,
                        line.line,
                        line.indent_width + 1,
                        "条件注释缺少闭合 ']'",
                        source,
                    ));
                };
                Ok(NodeKind::Comment {
                    condition: Some(bracketed[..end].to_string()),
                    text: bracketed[end + 1..].trim().to_string(),
                })
            } else {
                Ok(NodeKind::Comment {
                    condition: None,
                    text: rest.trim().to_string(),
                })
            }
        }

        ':' if second.is_some_and(|c| c.is_ascii_alphabetic()) => {
            let name: String = content[1..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .collect();
            let Some(kind) = FilterKind::parse(&name) else {
                return Err(HamlError::filter_not_found(
                    file,
                    line.line,
                    line.indent_width + 1,
                    format!("未知过滤器 :{name}"),
                    source,
                ));
            };
            // 过滤器行的尾随内容作为单行正文
            let trailing = content[1 + name.len()..].trim();
            let body = if trailing.is_empty() {
                Vec::new()
            } else {
                vec![trailing.to_string()]
            };
            Ok(NodeKind::Filter { kind, body })
        }

        '-' if second != Some('{') => {
            let body = content[1..].trim().to_string();
            let keyword = body.split_whitespace().next().unwrap_or("").to_string();
            if is_closing_keyword(&keyword) {
                return Err(HamlError::invalid_directive(
                    file,
                    line.line,
                    line.indent_width + 1,
                    format!("闭合指令 {keyword} 不可手写"),
                    "块级指令的闭合由渲染器按树结构自动补全",
                    source,
                ));
            }
            Ok(NodeKind::Statement { body, keyword })
        }

        '=' if second != Some('{') => Ok(NodeKind::Expression {
            body: content[1..].trim().to_string(),
        }),

        '%' if second.is_some_and(|c| c.is_alphanumeric()) => Ok(NodeKind::Element(
            element::parse(content, file, line.line, line.indent_width + 1, source)?,
        )),

        '.' | '#' if second.is_some_and(element::is_name_char) => Ok(NodeKind::Element(
            element::parse(content, file, line.line, line.indent_width + 1, source)?,
        )),

        '\\' => {
            // 行内标记前缀的转义交给替换引擎处理，其余场合直接剥掉反斜杠
            let text = if second.is_some_and(inline::is_marker_sigil) {
                content.clone()
            } else {
                content[1..].to_string()
            };
            Ok(NodeKind::PlainText { text })
        }

        _ => Ok(NodeKind::PlainText {
            text: content.clone(),
        }),
    }
}

/// 收集过滤器正文：比过滤器缩进更深的行（含内部空行）原样纳入，
/// 去掉尾部空行后按非空行的最小缩进剥离一次公共缩进
fn collect_filter_body(
    lines: &[SourceLine],
    mut idx: usize,
    filter_width: usize,
    body: &mut Vec<String>,
) -> usize {
    let mut collected: Vec<(usize, String)> = Vec::new();

    while idx < lines.len() {
        let l = &lines[idx];
        if l.blank {
            collected.push((usize::MAX, String::new()));
            idx += 1;
            continue;
        }
        if l.indent_width <= filter_width {
            break;
        }
        collected.push((l.indent_width, l.raw.clone()));
        idx += 1;
    }

    while collected.last().is_some_and(|(_, s)| s.is_empty()) {
        collected.pop();
    }

    let common = collected
        .iter()
        .filter(|(_, s)| !s.is_empty())
        .map(|(w, _)| *w)
        .min()
        .unwrap_or(0);

    body.extend(collected.into_iter().map(|(_, s)| {
        if s.is_empty() {
            String::new()
        } else {
            s.chars().skip(common).collect()
        }
    }));

    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;

    fn parse_src(src: &str) -> Arena {
        parse(&lexer::tokenize(src), "<test>", src).unwrap()
    }

    #[test]
    fn test_nesting_follows_indentation() {
        let arena = parse_src("%div\n  %p one\n  %p two\n%span");
        let root = arena.node(Arena::ROOT);
        assert_eq!(root.children.len(), 2);
        let div = arena.node(root.children[0]);
        assert_eq!(div.children.len(), 2);
        assert_eq!(arena.node(root.children[1]).depth, 0);
    }

    #[test]
    fn test_else_attaches_inside_if_block() {
        let arena = parse_src("- if x\n  %p a\n- else\n  %p b");
        let root = arena.node(Arena::ROOT);
        assert_eq!(root.children.len(), 1, "else 应归入 if 块内");
        let if_node = arena.node(root.children[0]);
        assert_eq!(if_node.children.len(), 2);
        let else_node = arena.node(if_node.children[1]);
        assert!(matches!(
            &else_node.kind,
            NodeKind::Statement { keyword, .. } if keyword == "else"
        ));
        assert_eq!(else_node.children.len(), 1);
    }

    #[test]
    fn test_explicit_closing_directive_rejected() {
        let err = parse(&lexer::tokenize("- endfor"), "<test>", "- endfor").unwrap_err();
        assert!(matches!(err, HamlError::InvalidDirective { line: 1, .. }));
    }

    #[test]
    fn test_filter_body_not_reclassified() {
        let arena = parse_src(":plain\n  -This is not a statement\n  .nor an element\n%p after");
        let root = arena.node(Arena::ROOT);
        assert_eq!(root.children.len(), 2);
        match &arena.node(root.children[0]).kind {
            NodeKind::Filter { body, .. } => {
                assert_eq!(body, &["-This is not a statement", ".nor an element"]);
            }
            other => panic!("期望 Filter 节点，得到 {other:?}"),
        }
    }

    #[test]
    fn test_filter_body_keeps_relative_indent() {
        let arena = parse_src(":plain\n    a\n      b");
        match &arena.node(1).kind {
            NodeKind::Filter { body, .. } => assert_eq!(body, &["a", "  b"]),
            other => panic!("期望 Filter 节点，得到 {other:?}"),
        }
    }

    #[test]
    fn test_inconsistent_indent_is_fatal() {
        let src = "%div\n  %p\n %span";
        let err = parse(&lexer::tokenize(src), "<test>", src).unwrap_err();
        assert!(matches!(err, HamlError::Indentation { line: 3, .. }));
    }

    #[test]
    fn test_depth_jump_is_fatal() {
        // 首个缩进行本身确立单位，宽缩进只要自洽就合法
        let src = "%div\n    %p deep";
        assert!(parse(&lexer::tokenize(src), "<test>", src).is_ok());

        let src = "%div\n  %p\n%a\n    %b";
        let err = parse(&lexer::tokenize(src), "<test>", src).unwrap_err();
        assert!(matches!(err, HamlError::Indentation { line: 4, .. }));
    }

    #[test]
    fn test_escaped_sigil_becomes_plain_text() {
        let arena = parse_src("\\%div not a tag");
        match &arena.node(1).kind {
            NodeKind::PlainText { text } => assert_eq!(text, "%div not a tag"),
            other => panic!("期望 PlainText 节点，得到 {other:?}"),
        }
    }

    #[test]
    fn test_inline_marker_lines_are_plain_text() {
        for src in ["-{bar}, how are you?", "={greeting} hi", "#{name} hi", "&{bar} hi"] {
            let arena = parse_src(src);
            assert!(
                matches!(&arena.node(1).kind, NodeKind::PlainText { .. }),
                "{src} 应按纯文本处理"
            );
        }
    }
}
