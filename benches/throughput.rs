use brrtcore::chain::{chain, handler, Handler};
use brrtcore::context::Context;
use brrtcore::dispatcher::Dispatcher;
use brrtcore::env::Env;
use brrtcore::middleware::{logging, recover};
use brrtcore::pool::ContextPool;
use brrtcore::response::{BufferedResponse, ResponseWriter};
use brrtcore::router::{RouteResolver, Router};
use criterion::{criterion_group, criterion_main, Criterion};
use http::{Method, Request, StatusCode};
use std::hint::black_box;
use std::sync::Arc;

fn ok() -> Handler {
    handler(|ctx: &mut Context| {
        let _ = ctx.serve_plain(StatusCode::OK, "ok");
    })
}

fn example_router() -> Router {
    let mut router = Router::new();
    for (method, pattern) in [
        (Method::GET, "/"),
        (Method::GET, "/zoo/animals"),
        (Method::POST, "/zoo/animals"),
        (Method::GET, "/zoo/animals/{id}"),
        (Method::PUT, "/zoo/animals/{id}"),
        (Method::DELETE, "/zoo/animals/{id}"),
        (Method::GET, "/zoo/animals/{id}/toys/{toy_id}"),
        (
            Method::GET,
            "/zoo/{category}/animals/{id}/habitats/{habitat_id}/sections/{section_id}",
        ),
        (
            Method::POST,
            "/inventory/{warehouse_id}/feeds/{feed_id}/items/{item_id}/batches/{batch_id}",
        ),
        (Method::GET, "/complex/{a}/{b}/{c}/{d}/{e}/{f}/{g}/{h}/{i}"),
    ] {
        router
            .add(method, pattern, vec![recover(), logging(), ok()])
            .expect("valid pattern");
    }
    router
}

fn bench_route_match(c: &mut Criterion) {
    let router = example_router();
    let test_paths = [
        (Method::GET, "/zoo/animals/123"),
        (Method::GET, "/zoo/animals/123/toys/456"),
        (Method::GET, "/zoo/cats/animals/123/habitats/88/sections/5"),
        (Method::POST, "/inventory/1/feeds/2/items/3/batches/4"),
        (Method::GET, "/complex/1/2/3/4/5/6/7/8/9"),
    ];
    c.bench_function("route_match", |b| {
        b.iter(|| {
            for (method, path) in &test_paths {
                black_box(router.resolve(method, path));
            }
        })
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let env = Arc::new(Env::new());
    let dispatcher = Dispatcher::with_pool(
        example_router(),
        ContextPool::with_capacity(Arc::clone(&env), 64, 8),
    );
    c.bench_function("dispatch_pooled", |b| {
        b.iter(|| {
            let request = Request::get("/zoo/animals/123/toys/456")
                .body(Vec::new())
                .expect("request");
            black_box(dispatcher.handle(request, Box::new(BufferedResponse::new())))
        })
    });

    c.bench_function("dispatch_not_found", |b| {
        b.iter(|| {
            let request = Request::get("/nowhere").body(Vec::new()).expect("request");
            black_box(dispatcher.handle(request, Box::new(BufferedResponse::new())))
        })
    });
}

fn bench_context_reset(c: &mut Criterion) {
    let env = Arc::new(Env::new());
    let handlers = chain([
        handler(|ctx: &mut Context| {
            ctx.defer(|| {});
            ctx.next();
        }),
        ok(),
    ]);
    let mut ctx = Context::new(env);
    c.bench_function("context_reset_run", |b| {
        b.iter(|| {
            ctx.reset(
                Request::new(Vec::new()),
                ResponseWriter::new(Box::new(BufferedResponse::new())),
                Arc::clone(&handlers),
            );
            ctx.run();
            black_box(ctx.response().size())
        })
    });
}

criterion_group!(benches, bench_route_match, bench_dispatch, bench_context_reset);
criterion_main!(benches);
