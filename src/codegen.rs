//! 渲染：深度优先遍历节点树，产出嵌入指令语法的标记文本。
//! 每条输出行对应一个源节点或一条过滤器正文行，
//! 行首缩进按树层级重复缩进单位。

use crate::Options;
use crate::element::{self, AttrValue, InlineContent, ParsedElement};
use crate::error::HamlError;
use crate::filters;
use crate::inline;
use crate::parser::{self, Arena, NodeId, NodeKind};

const XHTML_TRANSITIONAL: &str = "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Transitional//EN\" \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd\">";

/// 将节点树渲染为目标模板文本
pub fn generate(arena: &Arena, options: &Options) -> Result<String, HamlError> {
    let mut out = String::new();
    for &child in &arena.node(Arena::ROOT).children {
        render_node(arena, child, options, &mut out)?;
    }
    Ok(out)
}

fn indent(arena: &Arena, id: NodeId) -> String {
    arena.indent_unit.repeat(arena.node(id).depth)
}

fn render_children(
    arena: &Arena,
    id: NodeId,
    options: &Options,
    out: &mut String,
) -> Result<(), HamlError> {
    for &child in &arena.node(id).children {
        render_node(arena, child, options, out)?;
    }
    Ok(())
}

fn render_node(
    arena: &Arena,
    id: NodeId,
    options: &Options,
    out: &mut String,
) -> Result<(), HamlError> {
    let node = arena.node(id);
    let ind = indent(arena, id);

    match &node.kind {
        NodeKind::Root => render_children(arena, id, options, out)?,

        NodeKind::PlainText { text } => {
            out.push_str(&format!("{ind}{}\n", inline::substitute(text)));
            render_children(arena, id, options, out)?;
        }

        NodeKind::Doctype { token } => {
            out.push_str(&format!("{ind}{}\n", doctype(token, options.attr_wrapper)));
        }

        NodeKind::Comment { text, condition } => {
            let has_children = !node.children.is_empty();
            // 同行文本并入开标记行，不单独占行
            let inline_text = if text.is_empty() {
                String::new()
            } else {
                format!(" {}", inline::substitute(text))
            };
            match condition {
                Some(cond) if has_children => {
                    out.push_str(&format!("{ind}<!--[{cond}]>{inline_text}\n"));
                    render_children(arena, id, options, out)?;
                    out.push_str(&format!("{ind}<![endif]-->\n"));
                }
                Some(cond) => {
                    out.push_str(&format!("{ind}<!--[{cond}]>{inline_text}<![endif]-->\n"));
                }
                None if has_children => {
                    out.push_str(&format!("{ind}<!--{inline_text}\n"));
                    render_children(arena, id, options, out)?;
                    out.push_str(&format!("{ind}-->\n"));
                }
                None => {
                    out.push_str(&format!("{ind}<!--{inline_text} -->\n"));
                }
            }
        }

        NodeKind::Expression { body } => {
            out.push_str(&format!("{ind}{}\n", inline::expression_token(body)));
            render_children(arena, id, options, out)?;
        }

        NodeKind::Statement { body, keyword } => {
            out.push_str(&format!("{ind}{}\n", inline::statement_token(body)));
            render_children(arena, id, options, out)?;
            // 块关键字的闭合指令由树结构自动补全；延续关键字没有闭合
            if let Some(close) = parser::closing_keyword(keyword) {
                out.push_str(&format!("{ind}{}\n", inline::statement_token(close)));
            }
        }

        NodeKind::Filter { kind, body } => {
            filters::render(*kind, body, options, &arena.file, node.line, out)?;
        }

        NodeKind::Element(e) => render_element(arena, id, e, options, out)?,
    }

    Ok(())
}

fn render_element(
    arena: &Arena,
    id: NodeId,
    e: &ParsedElement,
    options: &Options,
    out: &mut String,
) -> Result<(), HamlError> {
    let node = arena.node(id);
    let ind = indent(arena, id);
    let open = open_tag(e, options.attr_wrapper);
    let close = format!("</{}>", e.tag);

    if e.self_closing || element::is_void_element(&e.tag) {
        out.push_str(&format!("{ind}{open} />\n"));
        return Ok(());
    }

    let content = e.content.as_ref().map(|c| match c {
        InlineContent::Text(t) => inline::substitute(t),
        InlineContent::Expression(b) => inline::expression_token(b),
    });

    if e.inline {
        // `<` 标记：内容与子节点收拢为单行
        let mut body = content.unwrap_or_default();
        for &child in &node.children {
            body.push_str(&render_inline(arena, child, options)?);
        }
        out.push_str(&format!("{ind}{open}>{body}{close}\n"));
    } else if node.children.is_empty() {
        out.push_str(&format!("{ind}{open}>{}{close}\n", content.unwrap_or_default()));
    } else {
        out.push_str(&format!("{ind}{open}>{}\n", content.unwrap_or_default()));
        render_children(arena, id, options, out)?;
        out.push_str(&format!("{ind}{close}\n"));
    }

    Ok(())
}

/// 序列化开标签（不含收尾的 `>`）：id、class 在前，
/// 其余属性按声明顺序；值经行内替换，字面量片段转义包裹引号
fn open_tag(e: &ParsedElement, w: char) -> String {
    let mut s = format!("<{}", e.tag);

    let mut id_parts: Vec<String> = Vec::new();
    if let Some(id) = &e.id {
        id_parts.push(id.clone());
    }
    let mut class_parts: Vec<String> = e.classes.clone();

    for (key, value) in &e.attributes {
        let parts = match value {
            AttrValue::Literal(v) => vec![v.clone()],
            AttrValue::Parts(parts) => parts.clone(),
        };
        match key.as_str() {
            "id" => id_parts.extend(parts),
            "class" => class_parts.extend(parts),
            _ => {}
        }
    }

    if !id_parts.is_empty() {
        let v = inline::substitute_quoted(&id_parts.join("_"), Some(w));
        s.push_str(&format!(" id={w}{v}{w}"));
    }
    if !class_parts.is_empty() {
        let v = inline::substitute_quoted(&class_parts.join(" "), Some(w));
        s.push_str(&format!(" class={w}{v}{w}"));
    }

    for (key, value) in &e.attributes {
        if key == "id" || key == "class" {
            continue;
        }
        let joined = match value {
            AttrValue::Literal(v) => v.clone(),
            AttrValue::Parts(parts) => parts.join(" "),
        };
        let v = inline::substitute_quoted(&joined, Some(w));
        s.push_str(&format!(" {key}={w}{v}{w}"));
    }

    s
}

/// 节点的单行渲染形式，用于 `<` 行内元素的子节点
fn render_inline(arena: &Arena, id: NodeId, options: &Options) -> Result<String, HamlError> {
    let node = arena.node(id);
    let mut s = String::new();

    match &node.kind {
        NodeKind::PlainText { text } => {
            s.push_str(&inline::substitute(text));
            for &child in &node.children {
                s.push_str(&render_inline(arena, child, options)?);
            }
        }
        NodeKind::Expression { body } => s.push_str(&inline::expression_token(body)),
        NodeKind::Statement { body, keyword } => {
            s.push_str(&inline::statement_token(body));
            for &child in &node.children {
                s.push_str(&render_inline(arena, child, options)?);
            }
            if let Some(close) = parser::closing_keyword(keyword) {
                s.push_str(&inline::statement_token(close));
            }
        }
        NodeKind::Element(e) => {
            let open = open_tag(e, options.attr_wrapper);
            if e.self_closing || element::is_void_element(&e.tag) {
                s.push_str(&format!("{open} />"));
            } else {
                let content = e.content.as_ref().map(|c| match c {
                    InlineContent::Text(t) => inline::substitute(t),
                    InlineContent::Expression(b) => inline::expression_token(b),
                });
                s.push_str(&format!("{open}>{}", content.unwrap_or_default()));
                for &child in &node.children {
                    s.push_str(&render_inline(arena, child, options)?);
                }
                s.push_str(&format!("</{}>", e.tag));
            }
        }
        NodeKind::Comment { text, .. } => {
            s.push_str(&format!("<!-- {} -->", inline::substitute(text)));
        }
        // 过滤器正文保持独立成行，不参与行内收拢
        NodeKind::Filter { kind, body } => {
            filters::render(*kind, body, options, &arena.file, node.line, &mut s)?;
        }
        NodeKind::Root | NodeKind::Doctype { .. } => {}
    }

    Ok(s)
}

/// 文档类型声明表
fn doctype(token: &str, w: char) -> String {
    let token = token.trim();
    if token == "5" {
        return "<!DOCTYPE html>".to_string();
    }
    if let Some(rest) = token.strip_prefix("XML") {
        let encoding = rest.trim();
        let encoding = if encoding.is_empty() { "utf-8" } else { encoding };
        return format!("<?xml version={w}1.0{w} encoding={w}{encoding}{w} ?>");
    }
    // 空声明与未识别的声明一律回落到 XHTML 过渡式
    XHTML_TRANSITIONAL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doctype_table() {
        assert_eq!(doctype("5", '\''), "<!DOCTYPE html>");
        assert_eq!(doctype("", '\''), XHTML_TRANSITIONAL);
        assert_eq!(doctype("Strict", '\''), XHTML_TRANSITIONAL);
        assert_eq!(
            doctype("XML", '\''),
            "<?xml version='1.0' encoding='utf-8' ?>"
        );
        assert_eq!(
            doctype("XML iso-8859-1", '\''),
            "<?xml version='1.0' encoding='iso-8859-1' ?>"
        );
    }
}
