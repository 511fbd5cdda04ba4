//! State table parser - PEST-based, line-oriented
//!
//! Compiles DSL text into a `StateMachine`. The table is read in a single
//! forward pass; each non-blank line (comments stripped) is matched against the
//! `table_line` rule and interpreted relative to the currently open block.
//!
//! ```text
//! # comments run to end of line
//! timeout = 30
//!
//! start {
//!     '*' poll
//! }
//!
//! poll:checkJob [user] {
//!     done   finish
//!     retry  poll   wait=60 max=10
//!     queued poll   wait=30 exec=false
//! }
//! ```

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use crate::model::{ModelError, StateMachine, Transition, TransitionBlock};

pub mod semantic_validator;


/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "parser/table.pest"]
struct TableParser;

/* ===================== Error Types ===================== */

/// A fatal error compiling a table or script. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}, col {col}: {message}")]
    Syntax {
        line: usize,
        col: usize,
        message: String,
    },

    #[error("line {line}: {message}")]
    Structure { line: usize, message: String },

    #[error("line {line}: block '{state}' is never closed")]
    UnterminatedBlock { line: usize, state: String },

    #[error("line {line}: {source}")]
    Model { line: usize, source: ModelError },
}

impl ParseError {
    /// The offending line, or the opening line of an unterminated block
    pub fn line(&self) -> usize {
        match self {
            ParseError::Syntax { line, .. }
            | ParseError::Structure { line, .. }
            | ParseError::UnterminatedBlock { line, .. }
            | ParseError::Model { line, .. } => *line,
        }
    }

    fn structure(line: usize, message: impl Into<String>) -> Self {
        ParseError::Structure {
            line,
            message: message.into(),
        }
    }

    /// Move a syntax error's column right by `by` characters
    fn shift_col(self, by: usize) -> Self {
        match self {
            ParseError::Syntax { line, col, message } => ParseError::Syntax {
                line,
                col: col + by,
                message,
            },
            other => other,
        }
    }

    /// Convert a PEST error, offsetting its line by `first_line - 1`
    fn from_pest(err: pest::error::Error<Rule>, first_line: usize) -> Self {
        let (line, col) = match err.line_col {
            pest::error::LineColLocation::Pos((line, col)) => (line, col),
            pest::error::LineColLocation::Span((line, col), _) => (line, col),
        };
        ParseError::Syntax {
            line: first_line + line.saturating_sub(1),
            col,
            message: err.variant.message().into_owned(),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/* ===================== Public API ===================== */

/// Compile DSL text into a state machine.
///
/// No partial machine is returned: any malformed line, misplaced construct or
/// unterminated block fails the whole table.
pub fn parse_state_table(source: &str) -> ParseResult<StateMachine> {
    let mut machine = StateMachine::new();
    let mut open: Option<TransitionBlock> = None;

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let stripped = strip_comment(raw);
        let line = stripped.trim();
        if line.is_empty() {
            continue;
        }
        // Columns from the trimmed line are shifted back to source columns
        let indent = stripped[..stripped.len() - stripped.trim_start().len()]
            .chars()
            .count();

        let pair = parse_line(line, line_no).map_err(|e| e.shift_col(indent))?;
        match pair.as_rule() {
            Rule::block_open => {
                if let Some(current) = &open {
                    return Err(ParseError::structure(
                        line_no,
                        format!(
                            "block opened while '{}' (line {}) is still open",
                            current.state(),
                            current.line()
                        ),
                    ));
                }
                let block = build_block_header(pair, line_no)?;
                if machine.has_block(block.state()) {
                    let first_line = machine
                        .transition_block(block.state())
                        .map(|b| b.line())
                        .unwrap_or_default();
                    return Err(ParseError::Model {
                        line: line_no,
                        source: ModelError::DuplicateBlock {
                            state: block.state().to_string(),
                            first_line,
                        },
                    });
                }
                open = Some(block);
            }
            Rule::block_close => {
                let block = open
                    .take()
                    .ok_or_else(|| ParseError::structure(line_no, "'}' without an open block"))?;
                machine
                    .add_transition_block(block)
                    .map_err(|source| ParseError::Model {
                        line: line_no,
                        source,
                    })?;
            }
            Rule::assignment => {
                if let Some(current) = &open {
                    return Err(ParseError::structure(
                        line_no,
                        format!(
                            "assignments are only allowed outside blocks (inside '{}')",
                            current.state()
                        ),
                    ));
                }
                let (name, value) = build_assignment(pair, line_no)?;
                machine.set_variable(name, value);
            }
            Rule::transition => {
                let block = open.as_mut().ok_or_else(|| {
                    ParseError::structure(line_no, "transition outside of a block")
                })?;
                let transition =
                    build_transition(pair, line_no).map_err(|e| e.shift_col(indent))?;
                block
                    .add_transition(transition)
                    .map_err(|source| ParseError::Model {
                        line: line_no,
                        source,
                    })?;
            }
            other => {
                return Err(ParseError::structure(
                    line_no,
                    format!("unexpected line content: {:?}", other),
                ))
            }
        }
    }

    if let Some(block) = open {
        return Err(ParseError::UnterminatedBlock {
            line: block.line(),
            state: block.state().to_string(),
        });
    }

    machine.set_source(source);
    Ok(machine)
}

/// Parse a simulation script: `state { 'value' ... }` groups in file order.
pub fn parse_script(source: &str) -> ParseResult<Vec<(String, Vec<String>)>> {
    let source = strip_comments(source);
    let mut pairs =
        TableParser::parse(Rule::script, &source).map_err(|e| ParseError::from_pest(e, 1))?;
    let script = next_inner(pairs.next(), 1, "script")?;

    let mut groups = Vec::new();
    for block in script.into_inner() {
        if block.as_rule() != Rule::script_block {
            continue;
        }
        let line = block.as_span().start_pos().line_col().0;
        let mut inner = block.into_inner();
        let state = next_inner(inner.next(), line, "state name")?.as_str().to_string();
        let values = inner.map(build_value).collect();
        groups.push((state, values));
    }
    Ok(groups)
}

/// Parse a verification script: one `state value` pair per entry.
pub fn parse_verify_script(source: &str) -> ParseResult<Vec<(String, String)>> {
    let source = strip_comments(source);
    let mut pairs = TableParser::parse(Rule::verify_script, &source)
        .map_err(|e| ParseError::from_pest(e, 1))?;
    let script = next_inner(pairs.next(), 1, "verification script")?;

    let mut entries = Vec::new();
    for entry in script.into_inner() {
        if entry.as_rule() != Rule::verify_entry {
            continue;
        }
        let line = entry.as_span().start_pos().line_col().0;
        let mut inner = entry.into_inner();
        let state = next_inner(inner.next(), line, "state name")?.as_str().to_string();
        let value = build_value(next_inner(inner.next(), line, "value")?);
        entries.push((state, value));
    }
    Ok(entries)
}

/// Render a value for a table or script, quoting when the bare form would
/// not survive a round trip.
pub fn quote_value(value: &str) -> String {
    let bare_ok = !value.is_empty()
        && !value.chars().any(|c| {
            c.is_whitespace() || matches!(c, '{' | '}' | '[' | ']' | '#' | '\'' | '"' | '=')
        });
    if bare_ok {
        value.to_string()
    } else if value.contains('\'') {
        format!("\"{}\"", value)
    } else {
        format!("'{}'", value)
    }
}

/* ===================== Line Helpers ===================== */

/// Remove a `#` comment, ignoring `#` inside quoted values
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (idx, ch) in line.char_indices() {
        match (quote, ch) {
            (None, '#') => return &line[..idx],
            (None, '\'' | '"') => quote = Some(ch),
            (Some(q), c) if c == q => quote = None,
            _ => {}
        }
    }
    line
}

/// Strip comments from every line, keeping line numbering intact
fn strip_comments(source: &str) -> String {
    source
        .lines()
        .map(strip_comment)
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_line(line: &str, line_no: usize) -> ParseResult<Pair<'_, Rule>> {
    let mut pairs = TableParser::parse(Rule::table_line, line)
        .map_err(|e| ParseError::from_pest(e, line_no))?;
    let table_line = next_inner(pairs.next(), line_no, "table line")?;
    next_inner(table_line.into_inner().next(), line_no, "line content")
}

fn next_inner<'a>(pair: Option<Pair<'a, Rule>>, line: usize, what: &str) -> ParseResult<Pair<'a, Rule>> {
    pair.ok_or_else(|| ParseError::structure(line, format!("missing {}", what)))
}

/* ===================== Model Builders ===================== */

fn build_block_header(pair: Pair<Rule>, line_no: usize) -> ParseResult<TransitionBlock> {
    // block_open = { state_name ~ (":" ~ method_name)? ~ ("[" ~ timer_name ~ "]")? ~ "{" }
    let mut inner = pair.into_inner();
    let state = next_inner(inner.next(), line_no, "state name")?;
    let mut block = TransitionBlock::new(state.as_str(), line_no);

    for part in inner {
        match part.as_rule() {
            Rule::method_name => block = block.with_method(part.as_str()),
            Rule::timer_name => block = block.with_timer(part.as_str()),
            _ => {}
        }
    }
    Ok(block)
}

fn build_assignment(pair: Pair<Rule>, line_no: usize) -> ParseResult<(String, String)> {
    // assignment = { ident ~ "=" ~ value }
    let mut inner = pair.into_inner();
    let name = next_inner(inner.next(), line_no, "variable name")?.as_str().to_string();
    let value = build_value(next_inner(inner.next(), line_no, "variable value")?);
    Ok((name, value))
}

fn build_transition(pair: Pair<Rule>, line_no: usize) -> ParseResult<Transition> {
    // transition = { value ~ state_name ~ option* }
    let mut inner = pair.into_inner();
    let value = build_value(next_inner(inner.next(), line_no, "transition value")?);
    let target = next_inner(inner.next(), line_no, "target state")?;
    let mut transition = Transition::new(value, target.as_str(), line_no);

    for option in inner {
        let rule = option.as_rule();
        let col = option.as_span().start() + 1;
        let raw = next_inner(option.into_inner().next(), line_no, "option value")?;
        match rule {
            Rule::wait_opt => transition = transition.with_wait(parse_uint(raw.as_str(), line_no, col)?),
            Rule::max_opt => transition = transition.with_max(parse_uint(raw.as_str(), line_no, col)?),
            Rule::exec_opt => transition = transition.with_exec(raw.as_str() == "true"),
            _ => {}
        }
    }
    Ok(transition)
}

/// Unquote a `value` pair
fn build_value(pair: Pair<Rule>) -> String {
    // value = ${ single_quoted | double_quoted | bare_value }
    let Some(inner) = pair.clone().into_inner().next() else {
        return pair.as_str().to_string();
    };
    match inner.as_rule() {
        Rule::single_quoted | Rule::double_quoted => inner
            .into_inner()
            .next()
            .map(|content| content.as_str().to_string())
            .unwrap_or_default(),
        _ => inner.as_str().to_string(),
    }
}

fn parse_uint(raw: &str, line: usize, col: usize) -> ParseResult<u32> {
    raw.parse::<u32>().map_err(|e| ParseError::Syntax {
        line,
        col,
        message: format!("invalid number '{}': {}", raw, e),
    })
}
