// Copyright (c) 2026 Bountyy Oy. All rights reserved.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use browserk::injast::{Body, InjectKind, InjectionRequest, Uri};

const URL: &str = "http://shop.test/api/v2/items/42/details.json?q=shoes&sort=price&page=3&tags[]=a&tags[]=b#reviews";
const JSON_BODY: &str = r#"{"user":{"name":"alice","roles":["admin","ops"],"age":31},"items":[{"id":1,"qty":2},{"id":7,"qty":1}],"coupon":null}"#;
const FORM_BODY: &str = "username=alice&password=hunter2&remember=on&next=%2Fdashboard";

fn uri_parsing_benchmark(c: &mut Criterion) {
    c.bench_function("parse_uri", |b| b.iter(|| black_box(Uri::parse(black_box(URL)))));
}

fn body_parsing_benchmark(c: &mut Criterion) {
    c.bench_function("parse_json_body", |b| {
        b.iter(|| black_box(Body::parse(black_box(JSON_BODY))))
    });
    c.bench_function("parse_form_body", |b| {
        b.iter(|| black_box(Body::parse(black_box(FORM_BODY))))
    });
}

fn injection_benchmark(c: &mut Criterion) {
    let headers = vec![("Content-Type".to_string(), "application/json".to_string())];
    c.bench_function("inject_every_site", |b| {
        b.iter(|| {
            let mut req = InjectionRequest::new("POST", URL, &headers, Some(JSON_BODY));
            for site in req.sites() {
                req.inject(&site, "'\"><svg onload=alert(1)>", InjectKind::Value);
                black_box(req.url());
                black_box(req.body());
                req.reset();
            }
        })
    });
}

criterion_group!(benches, uri_parsing_benchmark, body_parsing_benchmark, injection_benchmark);
criterion_main!(benches);
