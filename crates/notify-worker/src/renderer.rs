//! 模板渲染
//!
//! 纯函数式的扁平占位符替换：`{{.Field}}` 替换为上下文中的同名字符串值。
//! 不支持循环、条件或嵌套结构。未解析的占位符渲染为显式的
//! `<no value>` 标记而非静默丢弃或报错——模板必须容忍部分数据缺失，
//! 且同样的输入永远产生同样的输出。
//!
//! 渲染上下文只接受字符串值，这是一条文档化的契约：事件负载中的
//! 非字符串字段是否纳入上下文由上游分发器的配置决定。

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// 占位符语法：{{.Field}}，字段名为字母数字与下划线
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\.([A-Za-z0-9_]+)\}\}").expect("占位符正则不合法"));

/// 占位符无法解析时的输出标记
pub const MISSING_VALUE: &str = "<no value>";

/// 渲染结果
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub title: String,
    pub body: String,
}

/// 渲染标题与正文模板
///
/// 对 (模板, 数据) 而言是确定性的纯函数，事件重投递时重复渲染
/// 得到完全一致的结果。
pub fn render(
    subject_template: &str,
    body_template: &str,
    data: &HashMap<String, String>,
) -> Rendered {
    Rendered {
        title: render_str(subject_template, data),
        body: render_str(body_template, data),
    }
}

fn render_str(template: &str, data: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            data.get(&caps[1])
                .map(String::as_str)
                .unwrap_or(MISSING_VALUE)
                .to_string()
        })
        .into_owned()
}
