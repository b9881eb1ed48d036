// Template 模块 - 提示词模板的解析与渲染

use serde_json::Value;
use thiserror::Error;

use crate::error::MediFlowError;

/// 模板解析错误（构建期发现，属于启动配置问题）
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unterminated placeholder starting at byte {0}")]
    UnterminatedPlaceholder(usize),
    #[error("empty placeholder at byte {0}")]
    EmptyPlaceholder(usize),
    #[error("`{directive}` block is missing its field")]
    MissingBlockField { directive: String },
    #[error("`{{{{/{kind}}}}}` without a matching opening block")]
    UnmatchedClose { kind: String },
    #[error("`{{{{#{kind} {field}}}}}` block is never closed")]
    UnclosedBlock { kind: String, field: String },
    #[error("unknown directive `{0}`")]
    UnknownDirective(String),
}

impl From<TemplateError> for MediFlowError {
    fn from(error: TemplateError) -> Self {
        MediFlowError::Configuration(format!("invalid prompt template: {error}"))
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Segment {
    Text(String),
    Field(Vec<String>),
    Each {
        path: Vec<String>,
        body: Vec<Segment>,
    },
    If {
        path: Vec<String>,
        body: Vec<Segment>,
    },
}

/// 提示词模板
///
/// 支持三种占位语法：
/// - `{{field}}` 字段替换（点号访问嵌套字段，`{{this}}` 指当前作用域）
/// - `{{#each field}} ... {{/each}}` 对数组字段逐元素展开
/// - `{{#if field}} ... {{/if}}` 字段为真值时才包含
///
/// 解析在构建时完成；渲染是纯函数，不做任何 I/O。
#[derive(Clone, Debug)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn parse(source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        let tokens = tokenize(&source)?;
        let segments = build_segments(tokens)?;
        Ok(Self { source, segments })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// 渲染模板。缺失字段渲染为空串，数组为空或缺失时迭代块展开零次。
    pub fn render(&self, input: &Value) -> String {
        let mut out = String::new();
        render_segments(&self.segments, input, &mut out);
        out
    }
}

enum Token {
    Text(String),
    OpenEach(Vec<String>),
    OpenIf(Vec<String>),
    CloseEach,
    CloseIf,
    Field(Vec<String>),
}

fn tokenize(source: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    let mut offset = 0usize;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            tokens.push(Token::Text(rest[..start].to_string()));
        }
        let after_open = &rest[start + 2..];
        let end = after_open
            .find("}}")
            .ok_or(TemplateError::UnterminatedPlaceholder(offset + start))?;
        let raw = after_open[..end].trim();
        if raw.is_empty() {
            return Err(TemplateError::EmptyPlaceholder(offset + start));
        }
        tokens.push(parse_directive(raw)?);

        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }
    if !rest.is_empty() {
        tokens.push(Token::Text(rest.to_string()));
    }
    Ok(tokens)
}

fn parse_directive(raw: &str) -> Result<Token, TemplateError> {
    if let Some(stripped) = raw.strip_prefix('#') {
        let mut parts = stripped.splitn(2, char::is_whitespace);
        let directive = parts.next().unwrap_or_default();
        let field = parts.next().map(str::trim).unwrap_or_default();
        if field.is_empty() {
            return Err(TemplateError::MissingBlockField {
                directive: directive.to_string(),
            });
        }
        return match directive {
            "each" => Ok(Token::OpenEach(field_path(field))),
            "if" => Ok(Token::OpenIf(field_path(field))),
            other => Err(TemplateError::UnknownDirective(other.to_string())),
        };
    }
    if let Some(stripped) = raw.strip_prefix('/') {
        return match stripped.trim() {
            "each" => Ok(Token::CloseEach),
            "if" => Ok(Token::CloseIf),
            other => Err(TemplateError::UnknownDirective(format!("/{other}"))),
        };
    }
    Ok(Token::Field(field_path(raw)))
}

fn field_path(raw: &str) -> Vec<String> {
    raw.split('.').map(|part| part.trim().to_string()).collect()
}

fn build_segments(tokens: Vec<Token>) -> Result<Vec<Segment>, TemplateError> {
    // (kind, path, collected body)；栈顶是当前敞开的块
    let mut stack: Vec<(&'static str, Vec<String>, Vec<Segment>)> = Vec::new();
    let mut current = Vec::new();

    for token in tokens {
        match token {
            Token::Text(text) => current.push(Segment::Text(text)),
            Token::Field(path) => current.push(Segment::Field(path)),
            Token::OpenEach(path) => {
                stack.push(("each", path, std::mem::take(&mut current)));
            }
            Token::OpenIf(path) => {
                stack.push(("if", path, std::mem::take(&mut current)));
            }
            Token::CloseEach => {
                let (kind, path, outer) = stack.pop().ok_or(TemplateError::UnmatchedClose {
                    kind: "each".to_string(),
                })?;
                if kind != "each" {
                    return Err(TemplateError::UnclosedBlock {
                        kind: kind.to_string(),
                        field: path.join("."),
                    });
                }
                let body = std::mem::replace(&mut current, outer);
                current.push(Segment::Each { path, body });
            }
            Token::CloseIf => {
                let (kind, path, outer) = stack.pop().ok_or(TemplateError::UnmatchedClose {
                    kind: "if".to_string(),
                })?;
                if kind != "if" {
                    return Err(TemplateError::UnclosedBlock {
                        kind: kind.to_string(),
                        field: path.join("."),
                    });
                }
                let body = std::mem::replace(&mut current, outer);
                current.push(Segment::If { path, body });
            }
        }
    }

    if let Some((kind, path, _)) = stack.pop() {
        return Err(TemplateError::UnclosedBlock {
            kind: kind.to_string(),
            field: path.join("."),
        });
    }
    Ok(current)
}

fn render_segments(segments: &[Segment], scope: &Value, out: &mut String) {
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Field(path) => {
                if let Some(value) = resolve(scope, path) {
                    out.push_str(&value_text(value));
                }
            }
            Segment::Each { path, body } => {
                let Some(items) = resolve(scope, path).and_then(Value::as_array) else {
                    continue;
                };
                for element in items {
                    render_segments(body, element, out);
                }
            }
            Segment::If { path, body } => {
                if resolve(scope, path).is_some_and(truthy) {
                    render_segments(body, scope, out);
                }
            }
        }
    }
}

fn resolve<'a>(scope: &'a Value, path: &[String]) -> Option<&'a Value> {
    if path.len() == 1 && path[0] == "this" {
        return Some(scope);
    }
    let mut value = scope;
    for part in path {
        value = value.get(part)?;
    }
    Some(value)
}

/// 非字符串字段按其自然文本形式拼入，不做本地化格式化
fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
