use std::sync::{Arc, Mutex};

use hearth::HttpError;
use hearth::http::request::{Method, Request, RequestBuilder};
use hearth::http::response::Response;
use hearth::router::Router;
use hearth::router::middleware::{self, MiddlewareChain, Next};

fn request(path: &str) -> Request {
    RequestBuilder::new()
        .method(Method::GET)
        .path(path)
        .build()
        .unwrap()
}

type Trace = Arc<Mutex<Vec<String>>>;

fn tracer(trace: &Trace, name: &'static str) -> middleware::Middleware {
    let trace = trace.clone();
    middleware::from_fn(move |req, res, next| {
        trace.lock().unwrap().push(format!("{name} before"));
        let result = next.run(req, res);
        trace.lock().unwrap().push(format!("{name} after"));
        result
    })
}

#[test]
fn test_middleware_runs_as_onion() {
    let trace: Trace = Arc::default();

    let mut chain = MiddlewareChain::new();
    chain.add(tracer(&trace, "outer")).add(tracer(&trace, "inner"));

    let endpoint_trace = trace.clone();
    let endpoint = move |_req: &mut Request, res: &mut Response| -> anyhow::Result<()> {
        endpoint_trace.lock().unwrap().push("handler".to_string());
        res.send("ok");
        Ok(())
    };

    let mut req = request("/");
    let mut res = Response::new();
    chain.execute(&mut req, &mut res, &endpoint).unwrap();

    assert_eq!(
        *trace.lock().unwrap(),
        ["outer before", "inner before", "handler", "inner after", "outer after"]
    );
}

#[test]
fn test_auth_middleware_short_circuits() {
    let reached = Arc::new(Mutex::new(false));
    let reached_in_handler = reached.clone();

    let auth = middleware::from_fn(|req, res, next: Next<'_>| {
        if req.header("Authorization").is_none() {
            res.status(401).json(&serde_json::json!({ "error": "Unauthorized" }));
            return Ok(());
        }
        next.run(req, res)
    });

    let mut router = Router::new();
    router.get_with("/secret", vec![auth], move |_req, res| {
        *reached_in_handler.lock().unwrap() = true;
        res.send("secret");
        Ok(())
    });

    let mut req = request("/secret");
    let mut res = Response::new();
    assert!(router.handle(&mut req, &mut res).unwrap());

    assert_eq!(res.status_code().as_u16(), 401);
    assert!(!*reached.lock().unwrap());
}

#[test]
fn test_router_middleware_runs_before_route_middleware() {
    let trace: Trace = Arc::default();

    let mut router = Router::new();
    router.add_middleware(tracer(&trace, "router"));
    router.get_with("/", vec![tracer(&trace, "route")], |_req, res| {
        res.send("ok");
        Ok(())
    });

    let mut req = request("/");
    let mut res = Response::new();
    router.handle(&mut req, &mut res).unwrap();

    assert_eq!(
        *trace.lock().unwrap(),
        ["router before", "route before", "route after", "router after"]
    );
}

#[test]
fn test_next_fail_stops_chain_with_error() {
    let mut router = Router::new();
    router.use_middleware(|_req, _res, next| next.fail(HttpError::forbidden("nope")));
    router.get("/", |_req, res| {
        res.send("unreachable");
        Ok(())
    });

    let mut req = request("/");
    let mut res = Response::new();
    let err = router.handle(&mut req, &mut res).unwrap_err();

    assert_eq!(err.downcast_ref::<HttpError>().unwrap().status().as_u16(), 403);
    assert!(!res.is_sent());
}

#[test]
fn test_middleware_can_pass_properties_to_handler() {
    let mut router = Router::new();
    router.use_middleware(|req, res, next| {
        req.set("user", "ada".to_string());
        next.run(req, res)
    });
    router.get("/me", |req, res| {
        let user = req.get::<String>("user").cloned().unwrap_or_default();
        res.send(user);
        Ok(())
    });

    let mut req = request("/me");
    let mut res = Response::new();
    router.handle(&mut req, &mut res).unwrap();

    assert_eq!(res.body_bytes(), Some(&b"ada"[..]));
}

#[test]
fn test_handler_skipped_when_middleware_already_sent() {
    let mut router = Router::new();
    router.use_middleware(|req, res, next| {
        res.send("cached");
        next.run(req, res)
    });
    router.get("/", |_req, res| {
        res.status(500).send("fresh");
        Ok(())
    });

    let mut req = request("/");
    let mut res = Response::new();
    router.handle(&mut req, &mut res).unwrap();

    assert_eq!(res.status_code().as_u16(), 200);
    assert_eq!(res.body_bytes(), Some(&b"cached"[..]));
}

#[test]
fn test_scoped_middleware_only_applies_under_prefix() {
    let mut router = Router::new();
    router.use_at("/admin", |_req, res, _next| {
        res.status(403).send("forbidden");
        Ok(())
    });
    router.get("/admin/panel", |_req, res| {
        res.send("panel");
        Ok(())
    });
    router.get("/public", |_req, res| {
        res.send("public");
        Ok(())
    });

    let mut req = request("/admin/panel");
    let mut res = Response::new();
    router.handle(&mut req, &mut res).unwrap();
    assert_eq!(res.status_code().as_u16(), 403);

    let mut req = request("/public");
    let mut res = Response::new();
    router.handle(&mut req, &mut res).unwrap();
    assert_eq!(res.body_bytes(), Some(&b"public"[..]));
}
