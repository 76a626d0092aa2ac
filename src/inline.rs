//! 行内插值替换：把文本中的 `#{…}`/`={…}` 与 `-{…}`/`&{…}` 标记
//! 改写为目标引擎的表达式/语句定界符，并处理反斜杠转义。

/// 表达式定界符对
pub fn expression_token(body: &str) -> String {
    format!("{{{{ {} }}}}", body)
}

/// 语句定界符对
pub fn statement_token(body: &str) -> String {
    format!("{{% {} %}}", body)
}

/// 表达式家族前缀
const EXPRESSION_SIGILS: [char; 2] = ['=', '#'];
/// 语句家族前缀
const STATEMENT_SIGILS: [char; 2] = ['-', '&'];

pub fn is_marker_sigil(c: char) -> bool {
    EXPRESSION_SIGILS.contains(&c) || STATEMENT_SIGILS.contains(&c)
}

/// 对普通文本做行内替换
pub fn substitute(text: &str) -> String {
    substitute_quoted(text, None)
}

/// 对属性值做行内替换：字面量片段中出现的包裹引号转义为 `\引号`，
/// 替换产生的指令文本原样插入、不做转义
pub fn substitute_quoted(text: &str, wrapper: Option<char>) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        // 反斜杠转义：紧跟标记前缀、且该前缀处于可成为标记的位置
        // （后随 `{`，或位于文本开头的裸前缀）时，丢弃反斜杠、前缀字面输出
        if c == '\\'
            && i + 1 < chars.len()
            && is_marker_sigil(chars[i + 1])
            && (chars.get(i + 2) == Some(&'{') || i == 0)
        {
            out.push(chars[i + 1]);
            i += 2;
            continue;
        }

        // 标记：前缀 + 花括号包裹的主体，花括号按嵌套深度匹配
        if is_marker_sigil(c) && chars.get(i + 1) == Some(&'{') {
            if let Some(close) = find_matching_brace(&chars, i + 1) {
                let body: String = chars[i + 2..close].iter().collect();
                let body = body.trim();
                if EXPRESSION_SIGILS.contains(&c) {
                    out.push_str(&expression_token(body));
                } else {
                    out.push_str(&statement_token(body));
                }
                i = close + 1;
                continue;
            }
            // 未闭合的标记原样通过
        }

        push_literal(&mut out, c, wrapper);
        i += 1;
    }

    out
}

fn push_literal(out: &mut String, c: char, wrapper: Option<char>) {
    if Some(c) == wrapper {
        out.push('\\');
    }
    out.push(c);
}

/// 从 `open`（指向 `{`）起寻找配对的 `}`，返回其下标
fn find_matching_brace(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &c) in chars.iter().enumerate().skip(open) {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_markers() {
        assert_eq!(
            substitute("={greeting} #{name}, how are you ={date}?"),
            "{{ greeting }} {{ name }}, how are you {{ date }}?"
        );
    }

    #[test]
    fn test_statement_markers() {
        assert_eq!(
            substitute("-{ url 'main'  } and &{cycle 'odd' 'even' }"),
            "{% url 'main' %} and {% cycle 'odd' 'even' %}"
        );
    }

    #[test]
    fn test_escaped_marker_is_literal() {
        assert_eq!(
            substitute("Hi, dude. \\-{firstof v1 v2}, how are you \\&{foo }?"),
            "Hi, dude. -{firstof v1 v2}, how are you &{foo }?"
        );
    }

    #[test]
    fn test_escaped_bare_sigil_at_start() {
        assert_eq!(substitute("\\= Escaped"), "= Escaped");
        assert_eq!(substitute("\\#{name}, how are you?"), "#{name}, how are you?");
    }

    #[test]
    fn test_backslash_elsewhere_untouched() {
        assert_eq!(substitute("a\\b \\= c"), "a\\b \\= c");
    }

    #[test]
    fn test_nested_braces() {
        assert_eq!(substitute("#{ a{b{c}d} e }"), "{{ a{b{c}d} e }}");
    }

    #[test]
    fn test_unmatched_marker_passes_through() {
        assert_eq!(substitute("#{oops"), "#{oops");
    }

    #[test]
    fn test_non_ascii_body() {
        assert_eq!(substitute("Hi, &{ テスト}"), "Hi, {% テスト %}");
    }

    #[test]
    fn test_wrapper_escaped_in_literal_only() {
        // 字面量中的引号转义，替换产物中的引号保留
        assert_eq!(
            substitute_quoted("&{ url 'video' video.id }", Some('\'')),
            "{% url 'video' video.id %}"
        );
        assert_eq!(
            substitute_quoted("\\&{ url 'video' video.id }", Some('\'')),
            "&{ url \\'video\\' video.id }"
        );
        assert_eq!(
            substitute_quoted("It can't be removed", Some('\'')),
            "It can\\'t be removed"
        );
    }
}
