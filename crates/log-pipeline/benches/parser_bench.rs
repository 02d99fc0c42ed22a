//! 라인 파서 벤치마크
//!
//! 구조화 라인, fallback 라인, 규칙이 많은 파서, 오브젝트 라인 분할의 처리량을 측정합니다.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use logferry_core::types::ObjectReference;
use logferry_log_pipeline::parser::{LineParser, PatternRule};
use logferry_log_pipeline::retriever::DecodedObject;

/// 짧은 구조화 라인
const CONNECT_SHORT: &str = "12:34:56 connect: E:10.0.0.1 T[Auth]:42 login failed";

/// 긴 구조화 라인 (접두 타임스탬프와 긴 메시지)
const CONNECT_LONG: &str = "Dec 31 23:59:59 gw-eu-west-1a connect: W:2.14.1.7 T[Session Manager:118] session for user admin@example.com from 203.0.113.45 exceeded idle timeout after 3600 seconds, tearing down tunnel and releasing 4 leases";

/// 어떤 규칙에도 매칭되지 않는 라인
const KERNEL_LINE: &str = "[    0.000000] Linux version 6.1.0 (gcc version 12.2.0) #1 SMP PREEMPT_DYNAMIC";

fn bench_single_line(c: &mut Criterion) {
    let parser = LineParser::new().unwrap();
    let mut group = c.benchmark_group("line_parser");
    group.throughput(Throughput::Elements(1));

    group.bench_function("connect_short", |b| {
        b.iter(|| parser.parse(black_box(CONNECT_SHORT)))
    });

    group.bench_function("connect_long", |b| {
        b.iter(|| parser.parse(black_box(CONNECT_LONG)))
    });

    group.bench_function("kernel_fallback", |b| {
        b.iter(|| parser.parse(black_box(KERNEL_LINE)))
    });

    group.finish();
}

fn bench_rule_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("fallback_with_rules");

    for count in [1usize, 10, 50] {
        let mut parser = LineParser::new().unwrap();
        for i in 0..count {
            let rule = PatternRule::new(
                format!("custom-{i}"),
                "Custom",
                200 + i as u32,
                &format!(r"^app{i}: (?P<level>\w) (?P<message>.*)$"),
            )
            .unwrap();
            parser.register(Arc::new(rule)).unwrap();
        }

        group.bench_with_input(BenchmarkId::from_parameter(count), &parser, |b, parser| {
            b.iter(|| parser.parse(black_box(KERNEL_LINE)))
        });
    }

    group.finish();
}

fn bench_object_lines(c: &mut Criterion) {
    let parser = LineParser::new().unwrap();
    let origin = ObjectReference::new("logs", "2024-01-01/abc-123/app.log.gz")
        .origin()
        .unwrap();

    let mut body = String::new();
    for i in 0..1000 {
        if i % 4 == 0 {
            body.push_str(KERNEL_LINE);
        } else {
            body.push_str(CONNECT_SHORT);
        }
        body.push('\n');
    }
    let object = DecodedObject::new(body.into_bytes());

    let mut group = c.benchmark_group("object");
    group.throughput(Throughput::Elements(1000));
    group.bench_function("parse_1000_lines", |b| {
        b.iter(|| {
            object
                .lines()
                .map(|line| parser.parse(&line).with_origin(&origin))
                .count()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_single_line, bench_rule_count, bench_object_lines);
criterion_main!(benches);
