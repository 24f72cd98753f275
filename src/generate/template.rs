//! Minimal text templating for provider config-file assets.
//!
//! Supports `{{ .KEY }}` interpolation and `{{ if .KEY }} / {{ else }} /
//! {{ end }}` blocks over a flat string/bool data map, which is all the
//! bundled provider templates need.

use anyhow::{anyhow, bail, Result};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateValue {
    Str(String),
    Bool(bool),
}

impl TemplateValue {
    fn truthy(&self) -> bool {
        match self {
            TemplateValue::Str(s) => !s.is_empty(),
            TemplateValue::Bool(b) => *b,
        }
    }
}

impl From<&str> for TemplateValue {
    fn from(value: &str) -> Self {
        TemplateValue::Str(value.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(value: String) -> Self {
        TemplateValue::Str(value)
    }
}

impl From<bool> for TemplateValue {
    fn from(value: bool) -> Self {
        TemplateValue::Bool(value)
    }
}

pub type TemplateData = BTreeMap<String, TemplateValue>;

/// Render `template` with `data`. Interpolating an unknown key is an error;
/// an unknown key in a condition is simply false.
pub fn render(template: &str, data: &TemplateData) -> Result<String> {
    let tokens = tokenize(template)?;
    let mut cursor = 0;
    let nodes = parse_nodes(&tokens, &mut cursor, false)?;

    let mut out = String::new();
    render_nodes(&nodes, data, &mut out)?;
    Ok(out)
}

#[derive(Debug)]
enum Token {
    Text(String),
    Tag(String),
}

#[derive(Debug)]
enum Node {
    Text(String),
    Var(String),
    If {
        key: String,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

fn tokenize(template: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            tokens.push(Token::Text(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| anyhow!("unclosed `{{{{` in template"))?;
        tokens.push(Token::Tag(after[..end].trim().to_string()));
        rest = &after[end + 2..];
    }

    if !rest.is_empty() {
        tokens.push(Token::Text(rest.to_string()));
    }

    Ok(tokens)
}

fn parse_nodes(tokens: &[Token], cursor: &mut usize, in_block: bool) -> Result<Vec<Node>> {
    let mut nodes = Vec::new();

    while *cursor < tokens.len() {
        match &tokens[*cursor] {
            Token::Text(text) => {
                nodes.push(Node::Text(text.clone()));
                *cursor += 1;
            }
            Token::Tag(tag) => {
                if tag == "end" || tag == "else" {
                    if !in_block {
                        bail!("`{{{{ {tag} }}}}` outside of an if block");
                    }
                    return Ok(nodes);
                }

                if let Some(key) = tag.strip_prefix("if ") {
                    *cursor += 1;
                    let key = parse_key(key.trim())?;
                    let then = parse_nodes(tokens, cursor, true)?;

                    let mut otherwise = Vec::new();
                    match &tokens[*cursor] {
                        Token::Tag(t) if t == "else" => {
                            *cursor += 1;
                            otherwise = parse_nodes(tokens, cursor, true)?;
                            expect_end(tokens, cursor)?;
                        }
                        Token::Tag(t) if t == "end" => {
                            *cursor += 1;
                        }
                        _ => bail!("if block is missing `{{{{ end }}}}`"),
                    }

                    nodes.push(Node::If {
                        key,
                        then,
                        otherwise,
                    });
                } else {
                    nodes.push(Node::Var(parse_key(tag)?));
                    *cursor += 1;
                }
            }
        }
    }

    if in_block {
        bail!("if block is missing `{{{{ end }}}}`");
    }

    Ok(nodes)
}

fn expect_end(tokens: &[Token], cursor: &mut usize) -> Result<()> {
    match tokens.get(*cursor) {
        Some(Token::Tag(t)) if t == "end" => {
            *cursor += 1;
            Ok(())
        }
        _ => bail!("if block is missing `{{{{ end }}}}`"),
    }
}

fn parse_key(tag: &str) -> Result<String> {
    tag.strip_prefix('.')
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("invalid template expression `{{{{ {tag} }}}}`"))
}

fn render_nodes(nodes: &[Node], data: &TemplateData, out: &mut String) -> Result<()> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var(key) => match data.get(key) {
                Some(TemplateValue::Str(s)) => out.push_str(s),
                Some(TemplateValue::Bool(b)) => out.push_str(if *b { "true" } else { "false" }),
                None => bail!("template references unknown key `{key}`"),
            },
            Node::If {
                key,
                then,
                otherwise,
            } => {
                let branch = if data.get(key).is_some_and(TemplateValue::truthy) {
                    then
                } else {
                    otherwise
                };
                render_nodes(branch, data, out)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, TemplateValue)]) -> TemplateData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_interpolation() {
        let out = render(
            "root * \"{{ .ROOT }}\"",
            &data(&[("ROOT", ".".into())]),
        )
        .unwrap();
        assert_eq!(out, "root * \".\"");
    }

    #[test]
    fn test_if_block_true() {
        let out = render(
            "{{ if .IS_LARAVEL }}laravel{{ else }}plain{{ end }}",
            &data(&[("IS_LARAVEL", true.into())]),
        )
        .unwrap();
        assert_eq!(out, "laravel");
    }

    #[test]
    fn test_if_block_false_and_missing() {
        let tmpl = "{{ if .IS_LARAVEL }}laravel{{ end }}!";
        assert_eq!(
            render(tmpl, &data(&[("IS_LARAVEL", false.into())])).unwrap(),
            "!"
        );
        assert_eq!(render(tmpl, &data(&[])).unwrap(), "!");
    }

    #[test]
    fn test_nested_if() {
        let tmpl = "{{ if .A }}{{ if .B }}ab{{ else }}a{{ end }}{{ end }}";
        assert_eq!(
            render(tmpl, &data(&[("A", true.into()), ("B", false.into())])).unwrap(),
            "a"
        );
    }

    #[test]
    fn test_empty_string_is_falsy() {
        let out = render(
            "{{ if .ROOT }}has root{{ end }}",
            &data(&[("ROOT", "".into())]),
        )
        .unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn test_unknown_interpolation_key_errors() {
        assert!(render("{{ .MISSING }}", &data(&[])).is_err());
    }

    #[test]
    fn test_unclosed_tag_errors() {
        assert!(render("{{ .ROOT", &data(&[])).is_err());
    }

    #[test]
    fn test_unbalanced_end_errors() {
        assert!(render("{{ end }}", &data(&[])).is_err());
        assert!(render("{{ if .A }}x", &data(&[])).is_err());
    }
}
