// SPDX-License-Identifier: Apache-2.0

//! Stack-trace style rendering of instrumented method names.
//!
//! Method names look like `pkg/sub/Outer$Inner#method(Ljava/lang/String;)V`:
//! slash-separated class path, an optional `$` nested-class suffix, `#`, the
//! member name and its descriptor.

use std::collections::BTreeMap;
use std::fmt;

use crate::aec::Aec;
use crate::trace_event::Iid;

pub const DEFAULT_SOURCE_EXTENSION: &str = "java";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocationError {
    MissingMemberDelimiter { method: String },
    MissingParameterList { method: String },
}

impl fmt::Display for SourceLocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocationError::MissingMemberDelimiter { method } => {
                write!(f, "method {:?} has no '#' member delimiter", method)
            }
            SourceLocationError::MissingParameterList { method } => {
                write!(f, "method {:?} has no parameter list", method)
            }
        }
    }
}

impl std::error::Error for SourceLocationError {}

/// Renders `pkg.Class#method(pkg/Class.<ext>:line)`.
pub fn render_source_location(
    method: &str,
    line: u32,
    extension: &str,
) -> Result<String, SourceLocationError> {
    let hash = match method.find('#') {
        Some(i) if i > 0 => i,
        _ => {
            return Err(SourceLocationError::MissingMemberDelimiter {
                method: method.to_string(),
            })
        }
    };
    let paren = match method.find('(') {
        Some(i) if i > 0 => i,
        _ => {
            return Err(SourceLocationError::MissingParameterList {
                method: method.to_string(),
            })
        }
    };
    let class_end = match method.find('$') {
        Some(dollar) if dollar < hash => dollar,
        _ => hash,
    };
    let class_file = &method[..class_end];
    let qualified = method[..paren].replace('/', ".");
    Ok(format!("{}({}.{}:{})", qualified, class_file, extension, line))
}

/// Renders one frame, falling back to `method @ iid` for names that are not
/// in the instrumented-method format and `?` for unknown lines.
pub fn render_frame(method: &str, iid: Iid, line_numbers: &BTreeMap<Iid, u32>) -> String {
    match line_numbers.get(&iid) {
        Some(&line) => render_source_location(method, line, DEFAULT_SOURCE_EXTENSION)
            .unwrap_or_else(|_| format!("{}(line {})", method, line)),
        None => format!("{} @ iid {} (line ?)", method, iid),
    }
}

/// Renders an AEC like a stack trace: innermost frame first, one per line,
/// indented by two spaces.
pub fn render_aec(aec: &Aec, line_numbers: &BTreeMap<Iid, u32>) -> String {
    let mut out = String::new();
    for frame in aec.frames().iter().rev() {
        out.push_str("  ");
        out.push_str(&render_frame(&frame.method, frame.iid, line_numbers));
        out.push('\n');
    }
    out
}
