use crate::error::{ChainError, Result};
use crate::values::ChainValues;

/// Default prompt used by [`RetrievalQa::from_model`](crate::chain::RetrievalQa::from_model).
pub const DEFAULT_STUFF_QA_PROMPT: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.

{context}

Question: {question}
Helpful Answer:";

/// Something that turns a value bag into prompt text.
///
/// [`LlmChain`](crate::chain::LlmChain) declares the template's variables as
/// its input keys.
pub trait PromptTemplate: Send + Sync {
    /// Variable names the template needs, in first-appearance order.
    fn input_variables(&self) -> &[String];

    /// Render the template against `values`.
    ///
    /// Fails with [`ChainError::TemplateRender`] naming the variable that
    /// could not be substituted.
    fn render(&self, values: &ChainValues) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Var(String),
}

/// A `{name}` placeholder template.
///
/// Use `{{` to insert a literal `{` and `}}` to insert a literal `}`.
///
/// # Example
///
/// ```
/// use llm_chains::prompt::{PromptTemplate, Template};
/// use llm_chains::ChainValues;
///
/// let template = Template::new("Hello {name}, here is JSON: {{\"key\": \"val\"}}").unwrap();
/// let values = ChainValues::from([("name", "Alice")]);
/// let result = template.render(&values).unwrap();
/// assert_eq!(result, r#"Hello Alice, here is JSON: {"key": "val"}"#);
/// ```
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
    variables: Vec<String>,
}

impl Template {
    /// Parse a template. Unbalanced or empty placeholders are rejected.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let source = template.into();
        let segments = parse(&source)?;
        let mut variables: Vec<String> = Vec::new();
        for seg in &segments {
            if let Segment::Var(name) = seg {
                if !variables.contains(name) {
                    variables.push(name.clone());
                }
            }
        }
        Ok(Self {
            source,
            segments,
            variables,
        })
    }

    /// The raw template text.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl PromptTemplate for Template {
    fn input_variables(&self) -> &[String] {
        &self.variables
    }

    fn render(&self, values: &ChainValues) -> Result<String> {
        let mut rendered = String::with_capacity(self.source.len());
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Var(name) => {
                    let value = values.get(name).ok_or_else(|| ChainError::TemplateRender {
                        variable: name.clone(),
                        reason: "no value supplied".to_string(),
                    })?;
                    let text = value.to_prompt_text().ok_or_else(|| ChainError::TemplateRender {
                        variable: name.clone(),
                        reason: format!("{} value cannot be rendered as text", value.kind()),
                    })?;
                    rendered.push_str(&text);
                }
            }
        }
        Ok(rendered)
    }
}

fn parse(template: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' if chars.peek().map(|&(_, n)| n) == Some('{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek().map(|&(_, n)| n) == Some('}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, n) in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                let name = name.trim().to_string();
                if !closed {
                    return Err(ChainError::InvalidConfig(format!(
                        "Unclosed placeholder at byte {} in prompt template",
                        pos
                    )));
                }
                if name.is_empty() || name.contains('{') {
                    return Err(ChainError::InvalidConfig(format!(
                        "Malformed placeholder at byte {} in prompt template",
                        pos
                    )));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Var(name));
            }
            '}' => {
                return Err(ChainError::InvalidConfig(format!(
                    "Unmatched '}}' at byte {} in prompt template",
                    pos
                )));
            }
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}
