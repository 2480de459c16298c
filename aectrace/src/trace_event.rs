// SPDX-License-Identifier: Apache-2.0

//! Line-oriented trace event grammar.
//!
//! Each line of a trace names one instrumented event:
//!
//! ```text
//! BEGIN <method>
//! CALL(<iid>,<line>[,<callee>])
//! BRANCH(<iid>,<line>)
//! BRANCH(<iid>,<arm>,<line>)
//! RET
//! HEAPLOAD(<iid>,<line>,<object_id>,<field>)
//! ALLOC(<iid>,<line>,<size>)
//! # End <label>
//! ```
//!
//! Any other line starting with `#` is a comment; a blank line terminates the
//! stream.

use std::fmt;

/// Instrumentation-site identifier.
pub type Iid = i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Begin {
        method: String,
    },
    /// `callee` is absent in the two-argument form, where the callee announces
    /// itself with its own `BEGIN`.
    Call {
        iid: Iid,
        line: u32,
        callee: Option<String>,
    },
    /// `arm` is only present in the three-argument form.
    Branch {
        iid: Iid,
        arm: Option<i64>,
        line: u32,
    },
    HeapLoad {
        iid: Iid,
        line: u32,
        object_id: i64,
        field: String,
    },
    Alloc {
        iid: Iid,
        line: u32,
        size: i64,
    },
    Ret,
    EndOfInput {
        label: String,
    },
}

impl Event {
    /// Returns the `(iid, line)` pair for events that carry a source location.
    pub fn site(&self) -> Option<(Iid, u32)> {
        match self {
            Event::Call { iid, line, .. }
            | Event::Branch { iid, line, .. }
            | Event::HeapLoad { iid, line, .. }
            | Event::Alloc { iid, line, .. } => Some((*iid, *line)),
            Event::Begin { .. } | Event::Ret | Event::EndOfInput { .. } => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Event::Begin { .. } => "BEGIN",
            Event::Call { .. } => "CALL",
            Event::Branch { .. } => "BRANCH",
            Event::HeapLoad { .. } => "HEAPLOAD",
            Event::Alloc { .. } => "ALLOC",
            Event::Ret => "RET",
            Event::EndOfInput { .. } => "END",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Begin { method } => write!(f, "BEGIN {}", method),
            Event::Call {
                iid,
                line,
                callee: Some(callee),
            } => write!(f, "CALL({},{},{})", iid, line, callee),
            Event::Call {
                iid,
                line,
                callee: None,
            } => write!(f, "CALL({},{})", iid, line),
            Event::Branch {
                iid,
                arm: Some(arm),
                line,
            } => write!(f, "BRANCH({},{},{})", iid, arm, line),
            Event::Branch {
                iid,
                arm: None,
                line,
            } => write!(f, "BRANCH({},{})", iid, line),
            Event::HeapLoad {
                iid,
                line,
                object_id,
                field,
            } => write!(f, "HEAPLOAD({},{},{},{})", iid, line, object_id, field),
            Event::Alloc { iid, line, size } => write!(f, "ALLOC({},{},{})", iid, line, size),
            Event::Ret => write!(f, "RET"),
            Event::EndOfInput { label } => write!(f, "# End {}", label),
        }
    }
}

/// Classification of a single raw trace line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceLine {
    Event(Event),
    Comment,
    /// End of the event stream.
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    line: String,
    reason: String,
}

impl ParseError {
    pub(crate) fn new(line: &str, reason: impl Into<String>) -> Self {
        Self {
            line: line.to_string(),
            reason: reason.into(),
        }
    }

    /// The offending trace line, as read.
    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot parse trace line {:?}: {}", self.line, self.reason)
    }
}

impl std::error::Error for ParseError {}

fn split_keyword(s: &str) -> (&str, &str) {
    let end = s
        .find(|c: char| !(c.is_ascii_uppercase() || c == '_'))
        .unwrap_or(s.len());
    s.split_at(end)
}

fn parenthesized<'a>(raw: &str, rest: &'a str) -> Result<&'a str, ParseError> {
    rest.strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| ParseError::new(raw, "expected a parenthesized argument list"))
}

/// Signed decimal integer; unlike `str::parse`, an explicit `+` is rejected.
fn int_arg<T: std::str::FromStr>(raw: &str, what: &str, text: &str) -> Result<T, ParseError> {
    let invalid = || ParseError::new(raw, format!("invalid {}: {:?}", what, text));
    if text.starts_with('+') {
        return Err(invalid());
    }
    text.parse::<T>().map_err(|_| invalid())
}

fn parse_call(raw: &str, args: &str) -> Result<Event, ParseError> {
    let parts: Vec<&str> = args.splitn(3, ',').collect();
    if parts.len() < 2 {
        return Err(ParseError::new(raw, "CALL takes (iid,line[,callee])"));
    }
    let callee = match parts.get(2) {
        Some(name) if name.is_empty() => {
            return Err(ParseError::new(raw, "CALL callee name is empty"));
        }
        Some(name) => Some(name.to_string()),
        None => None,
    };
    Ok(Event::Call {
        iid: int_arg(raw, "iid", parts[0])?,
        line: int_arg(raw, "line", parts[1])?,
        callee,
    })
}

fn parse_branch(raw: &str, args: &str) -> Result<Event, ParseError> {
    let parts: Vec<&str> = args.split(',').collect();
    match parts.as_slice() {
        [iid, line] => Ok(Event::Branch {
            iid: int_arg(raw, "iid", iid)?,
            arm: None,
            line: int_arg(raw, "line", line)?,
        }),
        [iid, arm, line] => Ok(Event::Branch {
            iid: int_arg(raw, "iid", iid)?,
            arm: Some(int_arg(raw, "arm", arm)?),
            line: int_arg(raw, "line", line)?,
        }),
        _ => Err(ParseError::new(raw, "BRANCH takes (iid,line) or (iid,arm,line)")),
    }
}

fn parse_heap_load(raw: &str, args: &str) -> Result<Event, ParseError> {
    let parts: Vec<&str> = args.splitn(4, ',').collect();
    if parts.len() != 4 {
        return Err(ParseError::new(raw, "HEAPLOAD takes (iid,line,object_id,field)"));
    }
    Ok(Event::HeapLoad {
        iid: int_arg(raw, "iid", parts[0])?,
        line: int_arg(raw, "line", parts[1])?,
        object_id: int_arg(raw, "object id", parts[2])?,
        field: parts[3].to_string(),
    })
}

fn parse_alloc(raw: &str, args: &str) -> Result<Event, ParseError> {
    let parts: Vec<&str> = args.split(',').collect();
    match parts.as_slice() {
        [iid, line, size] => Ok(Event::Alloc {
            iid: int_arg(raw, "iid", iid)?,
            line: int_arg(raw, "line", line)?,
            size: int_arg(raw, "size", size)?,
        }),
        _ => Err(ParseError::new(raw, "ALLOC takes (iid,line,size)")),
    }
}

/// Classifies one raw line of a trace.
pub fn parse_line(raw: &str) -> Result<TraceLine, ParseError> {
    let text = raw.trim();
    if text.is_empty() {
        return Ok(TraceLine::Blank);
    }

    if let Some(comment) = text.strip_prefix('#') {
        if let Some(label) = comment.strip_prefix(" End") {
            if label.is_empty() || label.starts_with(' ') {
                return Ok(TraceLine::Event(Event::EndOfInput {
                    label: label.strip_prefix(' ').unwrap_or(label).to_string(),
                }));
            }
        }
        return Ok(TraceLine::Comment);
    }

    let (keyword, rest) = split_keyword(text);
    let event = match keyword {
        "BEGIN" => {
            let method = rest.trim_start();
            if method.len() == rest.len() || method.is_empty() {
                return Err(ParseError::new(raw, "BEGIN requires a method name"));
            }
            Event::Begin {
                method: method.to_string(),
            }
        }
        "CALL" => parse_call(raw, parenthesized(raw, rest)?)?,
        "BRANCH" => parse_branch(raw, parenthesized(raw, rest)?)?,
        "HEAPLOAD" => parse_heap_load(raw, parenthesized(raw, rest)?)?,
        "ALLOC" => parse_alloc(raw, parenthesized(raw, rest)?)?,
        "RET" => {
            if !rest.is_empty() {
                return Err(ParseError::new(raw, "RET takes no arguments"));
            }
            Event::Ret
        }
        _ => return Err(ParseError::new(raw, "unknown event kind")),
    };
    Ok(TraceLine::Event(event))
}
