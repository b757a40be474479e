//! Directive parsing and template rendering.
//!
//! A directive is an embedded `{{v-<name>=<argument>}}` token inside a
//! string leaf. Rendering evaluates every token against an immutable
//! snapshot of the pipeline ([`RenderContext`]) and substitutes the
//! results back into the string. A token may resolve to several values;
//! the leaf then renders to one string per value, with single-valued
//! tokens broadcast across all of them.

use crate::error::{Error, Result};
use crate::pipeline::Position;
use crate::query;
use crate::step::{ResponseData, Step};
use crate::tree::{self, Path};
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::OnceLock;

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{v-.+?\}\}").expect("static regex"))
}

fn wildcard_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{[^}]*\[\*\][^}]*\}\}").expect("static regex"))
}

/// The builtin directive names, resolved through a fixed dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    /// `v-refer` — the whole reference context.
    Refer,
    /// `v-state` — the position object.
    State,
    /// `v-meta` — the meta bag.
    Meta,
    /// `v-prev` — the step before the cursor.
    Prev,
    /// `v-prev-resu-raw` — the previous step's raw results.
    PrevRawResults,
    /// `v-prev-resu` — the previous step's results.
    PrevResults,
    /// `v-prev-resp` — the previous step's responses.
    PrevResponses,
    /// `v-curr` — the step under the cursor.
    Curr,
    /// `v-resp` — the current response.
    Resp,
    /// `v-resp-html` — the current response body as HTML;
    /// argument is `<selector>|<query>`.
    RespHtml,
}

impl DirectiveKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "v-refer" => Some(DirectiveKind::Refer),
            "v-state" => Some(DirectiveKind::State),
            "v-meta" => Some(DirectiveKind::Meta),
            "v-prev" => Some(DirectiveKind::Prev),
            "v-prev-resu-raw" => Some(DirectiveKind::PrevRawResults),
            "v-prev-resu" => Some(DirectiveKind::PrevResults),
            "v-prev-resp" => Some(DirectiveKind::PrevResponses),
            "v-curr" => Some(DirectiveKind::Curr),
            "v-resp" => Some(DirectiveKind::Resp),
            "v-resp-html" => Some(DirectiveKind::RespHtml),
            _ => None,
        }
    }
}

/// One parsed directive token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The full source text including braces, used for substitution.
    pub source: String,
    /// The directive name, e.g. `v-state`.
    pub name: String,
    /// Everything after the first `=`.
    pub arg: String,
}

/// Parse every directive token inside a string.
pub fn parse_tokens(input: &str) -> Result<Vec<Token>> {
    token_regex()
        .find_iter(input)
        .map(|m| {
            let inner = &input[m.start() + 2..m.end() - 2];
            let eq = inner
                .find('=')
                .ok_or_else(|| Error::MalformedDirective(m.as_str().to_string()))?;
            Ok(Token {
                source: m.as_str().to_string(),
                name: inner[..eq].to_string(),
                arg: inner[eq + 1..].to_string(),
            })
        })
        .collect()
}

/// Immutable snapshot of pipeline state, built once per render call.
///
/// Directives only ever read from this value, so rendering is a pure
/// function of its inputs and cannot alias live step state across steps.
#[derive(Debug, Clone)]
pub struct RenderContext {
    steps: Vec<Value>,
    state: Value,
    meta: Value,
    response: Option<Value>,
    current: usize,
}

impl RenderContext {
    /// Serialize the current pipeline state into a snapshot.
    pub fn snapshot(
        steps: &[Step],
        position: &Position,
        meta: &Map<String, Value>,
    ) -> Result<Self> {
        let steps = steps
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            steps,
            state: serde_json::to_value(position)?,
            meta: Value::Object(meta.clone()),
            response: None,
            current: position.current,
        })
    }

    /// The same snapshot with the current response attached, for
    /// result-template rendering.
    pub fn with_response(&self, response: &ResponseData) -> Result<Self> {
        let mut ctx = self.clone();
        ctx.response = Some(serde_json::to_value(response)?);
        Ok(ctx)
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// The full context as one queryable value, for `v-refer`.
    fn refer_value(&self) -> Value {
        json!({
            "steps": self.steps,
            "state": self.state,
            "meta": self.meta,
            "response": self.response,
        })
    }

    /// The step before the cursor; Null at the first step. The cursor is
    /// the single source of truth here — a step never references itself.
    fn prev_step(&self) -> Value {
        if self.current == 0 {
            return Value::Null;
        }
        self.steps
            .get(self.current - 1)
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn prev_step_field(&self, field: &str) -> Value {
        self.prev_step().get(field).cloned().unwrap_or(Value::Null)
    }

    fn curr_step(&self) -> Value {
        self.steps.get(self.current).cloned().unwrap_or(Value::Null)
    }

    fn response_value(&self) -> Value {
        self.response.clone().unwrap_or(Value::Null)
    }

    fn response_body_text(&self) -> String {
        match self.response.as_ref().and_then(|r| r.get("data")) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

/// A custom directive handler, consulted when no builtin name matches.
pub type DirectiveFn = Box<dyn Fn(&RenderContext, &str) -> Result<Value> + Send + Sync>;

/// A rendered tree plus the paths flagged for fan-out.
///
/// A path is flagged when its raw leaf text carried a wildcard (`[*]`)
/// directive argument — independent of whether rendering actually produced
/// more than one value there. This is the contract with the expander.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub value: Value,
    pub flagged: Vec<Path>,
}

/// Evaluates directives and renders template trees.
#[derive(Default)]
pub struct DirectiveEngine {
    custom: HashMap<String, DirectiveFn>,
}

impl DirectiveEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom directive by name, e.g. `"v-env"`.
    ///
    /// The token scanner only recognizes `{{v-...}}`, so a name given
    /// without the `v-` prefix is normalized to `v-<name>`.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&RenderContext, &str) -> Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let name = if name.starts_with("v-") {
            name
        } else {
            format!("v-{name}")
        };
        self.custom.insert(name, Box::new(handler));
    }

    fn evaluate(&self, ctx: &RenderContext, name: &str, arg: &str) -> Result<Value> {
        if let Some(kind) = DirectiveKind::from_name(name) {
            return self.evaluate_builtin(ctx, kind, arg);
        }
        if let Some(handler) = self.custom.get(name) {
            return handler(ctx, arg);
        }
        Err(Error::UnknownDirective(name.to_string()))
    }

    fn evaluate_builtin(&self, ctx: &RenderContext, kind: DirectiveKind, arg: &str) -> Result<Value> {
        match kind {
            DirectiveKind::Refer => query::search(&ctx.refer_value(), arg),
            DirectiveKind::State => query::search(&ctx.state, arg),
            DirectiveKind::Meta => query::search(&ctx.meta, arg),
            DirectiveKind::Prev => query::search(&ctx.prev_step(), arg),
            DirectiveKind::PrevRawResults => {
                query::search(&ctx.prev_step_field("rawResults"), arg)
            }
            DirectiveKind::PrevResults => query::search(&ctx.prev_step_field("results"), arg),
            DirectiveKind::PrevResponses => query::search(&ctx.prev_step_field("responses"), arg),
            DirectiveKind::Curr => query::search(&ctx.curr_step(), arg),
            DirectiveKind::Resp => query::search(&ctx.response_value(), arg),
            DirectiveKind::RespHtml => {
                let (selector, expr) = arg
                    .split_once('|')
                    .ok_or_else(|| Error::MalformedDirective(arg.to_string()))?;
                let nodes = query::select_html(&ctx.response_body_text(), selector)?;
                query::search(&nodes, expr)
            }
        }
    }

    /// Render one string leaf.
    ///
    /// Every distinct token is evaluated once and coerced to an array; all
    /// arrays are aligned to the longest by repeating their last element,
    /// and one output string is produced per index. A single-valued render
    /// stays a scalar string. Non-string leaves pass through unchanged.
    pub fn transform(&self, value: &Value, ctx: &RenderContext) -> Result<Value> {
        let text = match value {
            Value::String(text) => text,
            _ => return Ok(value.clone()),
        };
        let tokens = parse_tokens(text)?;
        if tokens.is_empty() {
            return Ok(value.clone());
        }

        // Evaluate each distinct token once; identical tokens share a column.
        let mut columns: Vec<(String, Vec<Value>)> = Vec::new();
        for token in &tokens {
            if columns.iter().any(|(source, _)| source == &token.source) {
                continue;
            }
            let result = self.evaluate(ctx, &token.name, &token.arg)?;
            let items = match result {
                Value::Array(items) if !items.is_empty() => items,
                Value::Array(_) => vec![Value::Null],
                scalar => vec![scalar],
            };
            columns.push((token.source.clone(), items));
        }

        let max_len = columns.iter().map(|(_, items)| items.len()).max().unwrap_or(1);
        let mut rendered = Vec::with_capacity(max_len);
        for i in 0..max_len {
            let mut out = text.clone();
            for (source, items) in &columns {
                let item = &items[i.min(items.len() - 1)];
                out = out.replace(source.as_str(), &scalar_text(item));
            }
            rendered.push(Value::String(out));
        }
        Ok(if rendered.len() == 1 {
            rendered.remove(0)
        } else {
            Value::Array(rendered)
        })
    }

    /// Render a whole template tree and flag every leaf whose raw text
    /// carries a wildcard directive argument.
    pub fn deep_transform(&self, template: &Value, ctx: &RenderContext) -> Result<Rendered> {
        let mut flagged = Vec::new();
        let value = tree::walk(template, &mut |leaf, path| {
            if let Value::String(text) = leaf {
                if wildcard_regex().is_match(text) {
                    flagged.push(path.clone());
                }
            }
            self.transform(leaf, ctx)
        })?;
        Ok(Rendered { value, flagged })
    }
}

/// Substitution text for one resolved value: strings bare, everything else
/// as its JSON text.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
