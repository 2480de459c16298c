// SPDX-License-Identifier: Apache-2.0

//! Builders for synthetic instrumentation traces used across the workspace
//! tests.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Accumulates trace lines in the textual event grammar.
#[derive(Debug, Default, Clone)]
pub struct TraceBuilder {
    text: String,
}

impl TraceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn line(mut self, args: std::fmt::Arguments<'_>) -> Self {
        self.text
            .write_fmt(args)
            .expect("writing to a String cannot fail");
        self.text.push('\n');
        self
    }

    pub fn begin(self, method: &str) -> Self {
        self.line(format_args!("BEGIN {}", method))
    }

    pub fn call(self, iid: i64, line: u32, callee: &str) -> Self {
        self.line(format_args!("CALL({},{},{})", iid, line, callee))
    }

    /// The two-argument form: moves the program counter without entering a
    /// callee.
    pub fn call_site(self, iid: i64, line: u32) -> Self {
        self.line(format_args!("CALL({},{})", iid, line))
    }

    pub fn branch(self, iid: i64, arm: i64, line: u32) -> Self {
        self.line(format_args!("BRANCH({},{},{})", iid, arm, line))
    }

    pub fn heap_load(self, iid: i64, line: u32, object_id: i64, field: &str) -> Self {
        self.line(format_args!(
            "HEAPLOAD({},{},{},{})",
            iid, line, object_id, field
        ))
    }

    pub fn alloc(self, iid: i64, line: u32, size: i64) -> Self {
        self.line(format_args!("ALLOC({},{},{})", iid, line, size))
    }

    pub fn ret(self) -> Self {
        self.line(format_args!("RET"))
    }

    pub fn end_of_input(self, label: &str) -> Self {
        self.line(format_args!("# End {}", label))
    }

    pub fn comment(self, text: &str) -> Self {
        self.line(format_args!("# {}", text))
    }

    /// Appends `body` `n` times.
    pub fn repeat(mut self, n: usize, body: impl Fn(TraceBuilder) -> TraceBuilder) -> Self {
        for _ in 0..n {
            self = body(self);
        }
        self
    }

    pub fn build(self) -> String {
        self.text
    }
}

/// Writes `text` to `dir/name` and returns the path.
pub fn write_trace(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).expect("write trace file");
    log::info!("write_trace; wrote {} bytes to {}", text.len(), path.display());
    path
}

/// Temporary directory whose name identifies the test that made it, so stale
/// directories left behind by a crashed run are easy to attribute.
pub fn make_test_tmpdir(base_prefix: &str) -> tempfile::TempDir {
    let prefix = format!("aectrace_{}_{}_", base_prefix, std::process::id());
    tempfile::Builder::new()
        .prefix(&prefix)
        .tempdir_in(std::env::temp_dir())
        .expect("tempdir create")
}

pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A trace where a recursive `fib` keeps reloading the memo field of two
/// objects, alternating between them at every level.
pub fn recursive_memo_trace(depth: usize) -> String {
    let mut b = TraceBuilder::new()
        .begin("app/Main#main([Ljava/lang/String;)V")
        .call(1, 10, "app/Main#fib(I)I");
    for i in 0..depth {
        b = b
            .heap_load(2, 20, 42 + (i % 2) as i64, "memo")
            .call(3, 21, "app/Main#fib(I)I");
    }
    for _ in 0..depth {
        b = b.ret();
    }
    b.ret().build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_grammar_lines() {
        let text = TraceBuilder::new()
            .begin("m")
            .branch(1, 0, 10)
            .call_site(2, 11)
            .alloc(3, 12, 16)
            .end_of_input("x")
            .build();
        assert_eq!(
            text,
            "BEGIN m\nBRANCH(1,0,10)\nCALL(2,11)\nALLOC(3,12,16)\n# End x\n"
        );
    }

    #[test]
    fn write_trace_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_trace(dir.path(), "t.log", "BEGIN m\n");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "BEGIN m\n");
    }
}
