// SPDX-License-Identifier: Apache-2.0

use aectrace::cycle_count::CycleCounter;
use aectrace::redundancy::RedundancyAnalysis;
use aectrace::report::{diff_redundancy, SerializedReport};
use aectrace::source_location::render_aec;
use aectrace::{Aec, Frame, TraceError, TraceSource};
use aectrace_test_helpers::{
    init_test_logging, make_test_tmpdir, recursive_memo_trace, write_trace, TraceBuilder,
};
use pretty_assertions::assert_eq;

fn fib_aec() -> Aec {
    Aec::from(vec![
        Frame::new("app/Main#main([Ljava/lang/String;)V", 1),
        Frame::new("app/Main#fib(I)I", 2),
    ])
}

#[test]
fn recursion_depth_collapses_to_one_aec() {
    init_test_logging();
    let tmp = make_test_tmpdir("recursion_depth");
    let shallow = write_trace(tmp.path(), "shallow.log", &recursive_memo_trace(4));
    let deep = write_trace(tmp.path(), "deep.log", &recursive_memo_trace(40));

    let mut analysis = RedundancyAnalysis::new();
    analysis
        .process_traces(&[TraceSource::File(shallow), TraceSource::File(deep)])
        .unwrap();
    let report = analysis.compute_redundancies();

    assert_eq!(report.aecs.len(), 1);
    let r = &report.aecs[&fib_aec()];
    assert_eq!(r.counts, vec![22, 22]);
    // (44/2 - 1) * (2 - 1) / 44
    assert!((r.score - 21.0 / 44.0).abs() < 1e-12);
    assert_eq!(report.line_numbers.get(&2), Some(&20));

    assert_eq!(
        render_aec(&fib_aec(), &report.line_numbers),
        "  app.Main#fib(app/Main.java:20)\n  app.Main#main(app/Main.java:10)\n"
    );
}

#[test]
fn saved_reports_diff_against_each_other() {
    init_test_logging();
    let tmp = make_test_tmpdir("saved_reports");
    let mut paths = Vec::new();
    for depth in [2usize, 8] {
        let mut analysis = RedundancyAnalysis::new();
        analysis
            .process_trace(&TraceSource::Text(recursive_memo_trace(depth)))
            .unwrap();
        let path = tmp.path().join(format!("depth{}.bin", depth));
        SerializedReport::Redundancy(analysis.compute_redundancies())
            .save(&path)
            .unwrap();
        paths.push(path);
    }

    let before = match SerializedReport::load(&paths[0]).unwrap() {
        SerializedReport::Redundancy(r) => r,
        other => panic!("unexpected report kind {}", other.kind_name()),
    };
    let after = match SerializedReport::load(&paths[1]).unwrap() {
        SerializedReport::Redundancy(r) => r,
        other => panic!("unexpected report kind {}", other.kind_name()),
    };
    let diff = diff_redundancy(&before, &after).unwrap();
    let delta = diff.deltas[&fib_aec()];
    assert_eq!(delta.loads, 6);
    assert_eq!(delta.locations, 0);
    // [1,1] scores 0.0; [4,4] scores 3/8.
    assert!((delta.score - 0.375).abs() < 1e-12);
}

#[test]
fn branches_in_loops_accumulate_per_aec() {
    init_test_logging();
    let trace = TraceBuilder::new()
        .begin("app/Main#main([Ljava/lang/String;)V")
        .call(1, 10, "app/Main#loop()V")
        .repeat(25, |b| b.branch(2, 1, 30))
        .branch(2, 0, 30)
        .ret()
        .branch(3, 0, 11)
        .build();
    let mut counter = CycleCounter::new();
    counter.process_trace(&TraceSource::Text(trace)).unwrap();
    assert_eq!(counter.distinct_aecs(), 2);
    let report = counter.report();
    let (top, count) = report.top().unwrap();
    assert_eq!(count, 26);
    assert_eq!(top.len(), 2);
}

#[test]
fn malformed_trace_reports_the_line() {
    let trace = TraceBuilder::new()
        .begin("m")
        .branch(1, 0, 10)
        .build()
        + "BRANCH(1,x,10)\n";
    let err = CycleCounter::new()
        .process_trace(&TraceSource::Text(trace))
        .unwrap_err();
    assert!(matches!(err, TraceError::Parse { line_no: 3, .. }), "{}", err);
}

#[test]
fn missing_trace_file_is_an_io_error() {
    let tmp = make_test_tmpdir("missing_trace");
    let err = RedundancyAnalysis::new()
        .process_trace(&TraceSource::File(tmp.path().join("nope.log")))
        .unwrap_err();
    assert!(matches!(err, TraceError::Io(_)));
    assert_eq!(err.line_no(), None);
}
