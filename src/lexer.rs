/// 一条源码行记录，携带计算好的缩进层级
#[derive(Debug, Clone)]
pub struct SourceLine {
    /// 原始行内容（含前导空白，不含行尾换行符）
    pub raw: String,
    /// 去除首尾空白后的内容
    pub content: String,
    /// 前导空白的码点数
    pub indent_width: usize,
    /// 缩进层级；前导空白不是缩进单位的整数倍时为 None，
    /// 由树构建阶段在该行真正参与语法时报错（过滤器正文不受限制）
    pub depth: Option<usize>,
    /// 1-based 行号
    pub line: usize,
    pub blank: bool,
}

#[derive(Debug)]
pub struct Tokenized {
    pub lines: Vec<SourceLine>,
    /// 首个缩进行确立的缩进单位；全文无缩进时为 None
    pub indent_unit: Option<String>,
}

/// 按行切分源码并计算每行的缩进层级
pub fn tokenize(source: &str) -> Tokenized {
    let mut lines = Vec::new();
    let mut indent_unit: Option<String> = None;

    for (idx, line) in source.lines().enumerate() {
        let raw = line.strip_suffix('\r').unwrap_or(line);
        let content = raw.trim();
        let blank = content.is_empty();

        let leading: String = raw.chars().take_while(|c| c.is_whitespace()).collect();
        let indent_width = if blank { 0 } else { leading.chars().count() };

        let depth = if blank {
            None
        } else if indent_width == 0 {
            Some(0)
        } else {
            match &indent_unit {
                None => {
                    // 首个缩进行确立缩进单位
                    indent_unit = Some(leading.clone());
                    Some(1)
                }
                Some(unit) => depth_of(&leading, unit),
            }
        };

        lines.push(SourceLine {
            raw: raw.to_string(),
            content: content.to_string(),
            indent_width,
            depth,
            line: idx + 1,
            blank,
        });
    }

    Tokenized { lines, indent_unit }
}

/// 前导空白必须恰好是缩进单位的整数次重复（同种空白、整数倍宽度）
fn depth_of(leading: &str, unit: &str) -> Option<usize> {
    let unit_len = unit.chars().count();
    let lead_len = leading.chars().count();
    if unit_len == 0 || lead_len % unit_len != 0 {
        return None;
    }
    let k = lead_len / unit_len;
    if leading == unit.repeat(k) { Some(k) } else { None }
}
