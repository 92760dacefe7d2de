//! Router prompt and response parsing for model-driven tool selection.
//!
//! The router model is asked to answer in a small XML dialect:
//!
//! ```text
//! <rationale>why</rationale>
//! <tool>tool_name</tool>
//! <args>
//!     <arg name="query">value</arg>
//! </args>
//! ```
//!
//! Omitting `<tool>`, leaving it empty, or answering `none` means no tool.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::{Map, Value};

use crate::tools::tool::Tool;

static RATIONALE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<rationale>(.*?)</rationale>").expect("valid rationale regex")
});
static TOOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<tool>(.*?)</tool>").expect("valid tool regex"));
static ARGS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<args>(.*?)</args>").expect("valid args regex"));
static ARG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<arg\s+name\s*=\s*"([^"]+)"\s*>(.*?)</arg>"#).expect("valid arg regex")
});

/// What the router decided.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolSelection {
    pub rationale: String,
    /// `None` when no tool should be used.
    pub tool: Option<String>,
    pub args: Map<String, Value>,
}

/// Build the router system prompt for the given tools.
pub fn tool_use_prompt(tools: &[Arc<dyn Tool>]) -> String {
    let tool_list = tools
        .iter()
        .map(|tool| {
            let params: Vec<String> = tool
                .params()
                .iter()
                .map(|p| format!("{}: {}", p.name, p.param_type))
                .collect();
            let param_str = if params.is_empty() {
                String::new()
            } else {
                format!(" (Parameters: {})", params.join(", "))
            };
            let instructions = if tool.instructions().is_empty() {
                tool.description()
            } else {
                tool.instructions()
            };
            format!(
                "- <tool-definition name=\"{}\">{}: {}</tool-definition>",
                tool.name(),
                param_str,
                instructions
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Determine whether or not additional tools are needed to answer the user's query.

These are the tools:

{tool_list}

Do NOT use a tool unless you need it. If the user is asking a generic question, answer without tools.

If a tool has *already* been used, do not use it again unless it's REALLY necessary.

Return it in the following format:

<rationale>$rationale</rationale>
<tool>$tool_name</tool>
<args>
    <arg name="param_name1">value1</arg>
    <arg name="param_name2">value2</arg>
</args>

Each parameter should be provided as an arg tag with a name attribute.

---

<example>
<input>Tell me a haiku</input>
<output>
<rationale>I do not need to use any tools</rationale>
</output>
</example>
"#
    )
}

/// Parse a router response. Never fails: anything unparseable means no tool.
pub fn parse_tool_selection(response: &str) -> ToolSelection {
    let capture = |re: &Regex, text: &str| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    };

    let rationale = capture(&RATIONALE_RE, response).unwrap_or_default();
    let tool = capture(&TOOL_RE, response)
        .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("none"));

    let mut args = Map::new();
    if let Some(block) = ARGS_RE.captures(response).and_then(|c| c.get(1)) {
        for arg in ARG_RE.captures_iter(block.as_str()) {
            args.insert(arg[1].trim().to_string(), Value::String(arg[2].trim().to_string()));
        }
    }

    ToolSelection {
        rationale,
        tool,
        args,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_selection() {
        let response = r#"
<rationale>needs fresh info</rationale>
<tool>web_search</tool>
<args>
    <arg name="query">rust 2024 edition
release date</arg>
    <arg name = "limit">3</arg>
</args>"#;
        let sel = parse_tool_selection(response);
        assert_eq!(sel.rationale, "needs fresh info");
        assert_eq!(sel.tool.as_deref(), Some("web_search"));
        assert_eq!(sel.args["query"], "rust 2024 edition\nrelease date");
        assert_eq!(sel.args["limit"], "3");
    }

    #[test]
    fn test_parse_no_tool() {
        let sel = parse_tool_selection("<rationale>I do not need to use any tools</rationale>");
        assert_eq!(sel.tool, None);
        assert!(sel.args.is_empty());

        assert_eq!(parse_tool_selection("<tool>None</tool>").tool, None);
        assert_eq!(parse_tool_selection("<tool>  </tool>").tool, None);
        assert_eq!(parse_tool_selection("just chatting").tool, None);
    }

    #[test]
    fn test_args_outside_block_are_ignored() {
        let sel = parse_tool_selection(r#"<tool>x</tool><arg name="a">1</arg>"#);
        assert!(sel.args.is_empty());
    }
}
