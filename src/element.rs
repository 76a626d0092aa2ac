//! 元素行解析：标签名、`.class`/`#id` 速记、花括号属性块、
//! 自闭合/行内标记与行内内容。

use crate::error::HamlError;
use std::iter::Peekable;
use std::str::Chars;

/// 自闭合 void 元素
const VOID_ELEMENTS: &[&str] = &[
    "meta", "link", "input", "br", "hr", "img", "source", "area", "base", "col", "embed",
    "track", "wbr",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// 属性值：单个字面量，或按固定分隔符拼接的多段值
/// （`id` 用 `_`，class 与一般属性用空格）
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Literal(String),
    Parts(Vec<String>),
}

/// 元素行的行内内容
#[derive(Debug, Clone, PartialEq)]
pub enum InlineContent {
    Text(String),
    Expression(String),
}

#[derive(Debug, Clone)]
pub struct ParsedElement {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    /// 声明顺序保留；键唯一，重复键后值覆盖前值、位置不变
    pub attributes: Vec<(String, AttrValue)>,
    pub self_closing: bool,
    /// 尾随 `<`：内容收拢为单行，不插入换行
    pub inline: bool,
    pub content: Option<InlineContent>,
}

/// 解析元素行内容（`%tag.cls#id{…}` 或以 `.`/`#` 开头的隐式 div）
pub fn parse(
    line_content: &str,
    file: &str,
    line: usize,
    col: usize,
    source: &str,
) -> Result<ParsedElement, HamlError> {
    let mut chars = line_content.chars().peekable();

    let tag = if chars.peek() == Some(&'%') {
        chars.next();
        let name = take_while(&mut chars, is_tag_char);
        if name.is_empty() {
            return Err(HamlError::attribute_syntax(
                file, line, col, "元素缺少标签名", source,
            ));
        }
        name
    } else {
        // `.class` / `#id` 开头的隐式 div
        "div".to_string()
    };

    let mut id = None;
    let mut classes = Vec::new();

    // `.class` 与 `#id` 速记链
    while let Some(&c) = chars.peek() {
        if c == '.' {
            chars.next();
            let class = take_while(&mut chars, is_name_char);
            if !class.is_empty() {
                classes.push(class);
            }
        } else if c == '#' {
            chars.next();
            let name = take_while(&mut chars, is_name_char);
            if !name.is_empty() {
                id = Some(name);
            }
        } else {
            break;
        }
    }

    // 花括号属性块必须紧随其后，隔着空格的 `{` 属于行内文本
    let attributes = if chars.peek() == Some(&'{') {
        parse_attribute_dict(&mut chars, file, line, col, source)?
    } else {
        Vec::new()
    };

    // 尾随标记：`<` 行内、`/` 自闭合
    let mut self_closing = false;
    let mut inline = false;
    while let Some(&c) = chars.peek() {
        match c {
            '<' if !inline => {
                inline = true;
                chars.next();
            }
            '/' if !self_closing => {
                self_closing = true;
                chars.next();
            }
            _ => break,
        }
    }

    let rest: String = chars.collect();
    let content = parse_inline_content(&rest);

    Ok(ParsedElement {
        tag,
        id,
        classes,
        attributes,
        self_closing,
        inline,
        content,
    })
}

fn parse_inline_content(rest: &str) -> Option<InlineContent> {
    if let Some(expr) = rest.strip_prefix('=') {
        let expr = expr.trim();
        if !expr.is_empty() {
            return Some(InlineContent::Expression(expr.to_string()));
        }
        return None;
    }
    let text = rest.trim();
    if text.is_empty() {
        None
    } else {
        Some(InlineContent::Text(text.to_string()))
    }
}

/// 解析 `{…}` 属性块：`'key': value`、裸键、`:key => value` 三种写法，
/// 逗号分隔；值为带引号字符串、`(…)`/`[…]` 序列或裸 token
fn parse_attribute_dict(
    chars: &mut Peekable<Chars>,
    file: &str,
    line: usize,
    col: usize,
    source: &str,
) -> Result<Vec<(String, AttrValue)>, HamlError> {
    let err = |msg: String| HamlError::attribute_syntax(file, line, col, msg, source);

    chars.next(); // 消费 '{'
    let mut attributes: Vec<(String, AttrValue)> = Vec::new();

    loop {
        skip_separators(chars);
        match chars.peek() {
            Some(&'}') => {
                chars.next();
                break;
            }
            None => return Err(err("未闭合的属性块，缺少 '}'".to_string())),
            _ => {}
        }

        // 键：引号字符串、`:key =>` 箭头式、或裸标识符
        let (key, arrow) = match chars.peek() {
            Some(&q) if q == '\'' || q == '"' => {
                chars.next();
                (read_quoted(chars, q).ok_or_else(|| err(format!("属性键缺少闭合引号 {q}")))?, false)
            }
            Some(&':') => {
                chars.next();
                let k = take_while(chars, is_key_char);
                if k.is_empty() {
                    return Err(err("箭头式属性缺少键名".to_string()));
                }
                (k, true)
            }
            _ => {
                let k = take_while(chars, is_key_char);
                if k.is_empty() {
                    return Err(err("无法解析的属性键".to_string()));
                }
                (k, false)
            }
        };

        skip_spaces(chars);

        // 分隔符：普通式 `:`，箭头式 `=>`
        if arrow {
            if !(chars.next() == Some('=') && chars.next() == Some('>')) {
                return Err(err(format!("属性 {key} 缺少 '=>' 分隔符")));
            }
        } else if chars.next() != Some(':') {
            return Err(err(format!("属性 {key} 缺少 ':' 分隔符")));
        }
        skip_spaces(chars);

        let value = parse_attribute_value(chars).map_err(|m| err(format!("属性 {key} {m}")))?;

        // 重复键：后值覆盖，保留首次出现的位置
        if let Some(slot) = attributes.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            attributes.push((key, value));
        }
    }

    Ok(attributes)
}

fn parse_attribute_value(chars: &mut Peekable<Chars>) -> Result<AttrValue, String> {
    match chars.peek() {
        Some(&q) if q == '\'' || q == '"' => {
            chars.next();
            let v = read_quoted(chars, q).ok_or(format!("的值缺少闭合引号 {q}"))?;
            Ok(AttrValue::Literal(v))
        }
        Some(&open) if open == '(' || open == '[' => {
            let close = if open == '(' { ')' } else { ']' };
            chars.next();
            let mut parts = Vec::new();
            loop {
                skip_separators(chars);
                match chars.peek() {
                    Some(&c) if c == close => {
                        chars.next();
                        break;
                    }
                    Some(&q) if q == '\'' || q == '"' => {
                        chars.next();
                        let part =
                            read_quoted(chars, q).ok_or(format!("的序列项缺少闭合引号 {q}"))?;
                        parts.push(part);
                    }
                    Some(_) => {
                        let part = take_bare_value(chars, &[',', close]);
                        if part.is_empty() {
                            return Err("的序列项无法解析".to_string());
                        }
                        parts.push(part);
                    }
                    None => return Err(format!("的序列缺少闭合 '{close}'")),
                }
            }
            Ok(AttrValue::Parts(parts))
        }
        Some(_) => {
            let v = take_bare_value(chars, &[',', '}']);
            if v.is_empty() {
                return Err("的值为空".to_string());
            }
            Ok(AttrValue::Literal(v))
        }
        None => Err("缺少值".to_string()),
    }
}

/// 读取带引号字符串并处理 `\\`、`\'`、`\"` 转义；未闭合返回 None
fn read_quoted(chars: &mut Peekable<Chars>, quote: char) -> Option<String> {
    let mut out = String::new();
    while let Some(c) = chars.next() {
        if c == quote {
            return Some(out);
        }
        if c == '\\' {
            match chars.peek() {
                Some(&n) if n == '\\' || n == '\'' || n == '"' => {
                    out.push(n);
                    chars.next();
                }
                _ => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    None
}

/// 读取裸值直到顶层终止符，花括号按嵌套深度跟踪
fn take_bare_value(chars: &mut Peekable<Chars>, stops: &[char]) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    while let Some(&c) = chars.peek() {
        if depth == 0 && stops.contains(&c) {
            break;
        }
        match c {
            '{' => depth += 1,
            '}' => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            _ => {}
        }
        out.push(c);
        chars.next();
    }
    out.trim().to_string()
}

fn take_while(chars: &mut Peekable<Chars>, pred: fn(char) -> bool) -> String {
    let mut out = String::new();
    while let Some(&c) = chars.peek() {
        if pred(c) {
            out.push(c);
            chars.next();
        } else {
            break;
        }
    }
    out
}

fn skip_spaces(chars: &mut Peekable<Chars>) {
    while chars.peek().is_some_and(|c| *c == ' ') {
        chars.next();
    }
}

fn skip_separators(chars: &mut Peekable<Chars>) {
    while chars.peek().is_some_and(|c| *c == ' ' || *c == ',') {
        chars.next();
    }
}

/// 标签名：字母数字、命名空间冒号、连字符、下划线
fn is_tag_char(c: char) -> bool {
    c.is_alphanumeric() || c == ':' || c == '-' || c == '_'
}

/// id/class 名：字母数字（含非 ASCII）、连字符、下划线
pub fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

/// 裸属性键：不含命名空间冒号，带冒号的键须加引号
fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(s: &str) -> ParsedElement {
        parse(s, "<test>", 1, 1, s).unwrap()
    }

    #[test]
    fn test_tag_with_id_shorthand() {
        let e = parse_ok("%div#someId Some text");
        assert_eq!(e.tag, "div");
        assert_eq!(e.id.as_deref(), Some("someId"));
        assert_eq!(e.content, Some(InlineContent::Text("Some text".to_string())));
    }

    #[test]
    fn test_implicit_div_with_classes() {
        let e = parse_ok(".header.span-24.last");
        assert_eq!(e.tag, "div");
        assert_eq!(e.classes, vec!["header", "span-24", "last"]);
    }

    #[test]
    fn test_namespaced_tag() {
        let e = parse_ok("%fb:tag");
        assert_eq!(e.tag, "fb:tag");
    }

    #[test]
    fn test_non_ascii_id() {
        let e = parse_ok("%div#これはテストです test");
        assert_eq!(e.id.as_deref(), Some("これはテストです"));
    }

    #[test]
    fn test_quoted_key_dict() {
        let e = parse_ok("%html{'xmlns':'http://www.w3.org/1999/xhtml', 'xml:lang':'en'}");
        assert_eq!(
            e.attributes,
            vec![
                (
                    "xmlns".to_string(),
                    AttrValue::Literal("http://www.w3.org/1999/xhtml".to_string())
                ),
                ("xml:lang".to_string(), AttrValue::Literal("en".to_string())),
            ]
        );
    }

    #[test]
    fn test_tuple_and_list_values() {
        let e = parse_ok("%div{'id':('itemType', '5'), 'class':['a','b']}");
        assert_eq!(
            e.attributes[0].1,
            AttrValue::Parts(vec!["itemType".to_string(), "5".to_string()])
        );
        assert_eq!(
            e.attributes[1].1,
            AttrValue::Parts(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_arrow_pairs_and_flags() {
        let e = parse_ok("%a{:href => \"/\"}<");
        assert_eq!(
            e.attributes,
            vec![("href".to_string(), AttrValue::Literal("/".to_string()))]
        );
        assert!(e.inline);
        assert!(!e.self_closing);
    }

    #[test]
    fn test_bare_key_and_quote_unescape() {
        let e = parse_ok("%a{title: \"It can't be removed\", 'b': '\\\\x'}");
        assert_eq!(
            e.attributes[0].1,
            AttrValue::Literal("It can't be removed".to_string())
        );
        assert_eq!(e.attributes[1].1, AttrValue::Literal("\\x".to_string()));
    }

    #[test]
    fn test_duplicate_key_last_wins_first_position() {
        let e = parse_ok("%div{'a':'1', 'b':'2', 'a':'3'}");
        assert_eq!(
            e.attributes,
            vec![
                ("a".to_string(), AttrValue::Literal("3".to_string())),
                ("b".to_string(), AttrValue::Literal("2".to_string())),
            ]
        );
    }

    #[test]
    fn test_inline_expression_content() {
        let e = parse_ok("%div= story.tease");
        assert_eq!(
            e.content,
            Some(InlineContent::Expression("story.tease".to_string()))
        );
    }

    #[test]
    fn test_self_close_marker() {
        let e = parse_ok("%foo/");
        assert!(e.self_closing);
        assert!(is_void_element("br"));
        assert!(!is_void_element("div"));
    }

    #[test]
    fn test_unclosed_dict_is_error() {
        let r = parse("%div{'a':'1'", "<test>", 1, 1, "%div{'a':'1'");
        assert!(matches!(r, Err(HamlError::AttributeSyntax { .. })));
    }

    #[test]
    fn test_space_before_brace_is_content() {
        let e = parse_ok("%p {hello}");
        assert!(e.attributes.is_empty());
        assert_eq!(e.content, Some(InlineContent::Text("{hello}".to_string())));
    }
}
