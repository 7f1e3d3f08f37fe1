//! Named prompt templates with `{placeholder}` substitution.

use std::collections::HashMap;

use crate::error::Error;

/// Template name for the per-chunk summary prompt.
pub const CHUNK_SUMMARY: &str = "chunk_summary";
/// Template name for the reduction prompt.
pub const FINAL_SUMMARY: &str = "final_summary";

/// Render `template` in a single pass.
///
/// `{name}` is replaced by the matching value in `vars`, `{{` and `}}` emit
/// literal braces. Unknown placeholders, empty `{}` and unbalanced braces are
/// errors. Substituted values are never scanned again, so a value that
/// itself contains braces is inserted verbatim.
pub fn render(name: &str, template: &str, vars: &[(&str, &str)]) -> Result<String, Error> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }

                let start = pos + 1;
                let mut end = None;
                for (idx, ch) in chars.by_ref() {
                    if ch == '}' {
                        end = Some(idx);
                        break;
                    }
                    if ch == '{' {
                        return Err(Error::template(
                            name,
                            format!("unexpected '{{' inside placeholder at byte {}", idx),
                        ));
                    }
                }

                let end = end.ok_or_else(|| {
                    Error::template(name, format!("unclosed '{{' at byte {}", pos))
                })?;
                let key = &template[start..end];
                if key.is_empty() {
                    return Err(Error::template(name, "empty placeholder '{}'"));
                }

                let value = vars
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| *v)
                    .ok_or_else(|| {
                        Error::template(name, format!("unknown placeholder '{{{}}}'", key))
                    })?;
                out.push_str(value);
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(Error::template(
                        name,
                        format!("single '}}' encountered at byte {}", pos),
                    ));
                }
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

/// Prompt templates loaded from an agent configuration.
///
/// The store may be empty; every lookup supplies its own fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptTemplates {
    templates: HashMap<String, String>,
}

impl PromptTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(name.into(), template.into());
    }

    /// Look up `name`, returning `fallback` when it is not configured.
    pub fn get<'a>(&'a self, name: &str, fallback: &'a str) -> &'a str {
        self.templates
            .get(name)
            .map(String::as_str)
            .unwrap_or(fallback)
    }

    /// Look up `name` (or `fallback`) and render it with `vars`.
    pub fn render(
        &self,
        name: &str,
        fallback: &str,
        vars: &[(&str, &str)],
    ) -> Result<String, Error> {
        render(name, self.get(name, fallback), vars)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }
}

impl From<HashMap<String, String>> for PromptTemplates {
    fn from(templates: HashMap<String, String>) -> Self {
        Self { templates }
    }
}
