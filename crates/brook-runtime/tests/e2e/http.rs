//! E2E tests for the HTTP bridge

use std::thread;

use super::harness::*;

#[test]
fn test_handler_sees_request_and_sets_status() {
    let ((status, body), _) = serve(
        r#"
        http.createServer((req, res) => {
            res.statusCode = 201;
            res.end("hi " + req.method + " " + req.url + " " + req.query);
        });
        "#,
        |addr| get(addr, "/path?x=1"),
    );
    assert_eq!(status, 201);
    assert_eq!(body, "hi GET /path x=1");
}

#[test]
fn test_url_without_query() {
    let ((_, body), _) = serve(
        r#"http.createServer((req, res) => res.end(JSON.stringify([req.url, req.query])));"#,
        |addr| get(addr, "/plain"),
    );
    assert_eq!(body, r#"["/plain",""]"#);
}

#[test]
fn test_oversized_body_gets_413_and_server_keeps_serving() {
    let ((rejected, after), lines) = serve(
        r#"http.createServer((req, res) => { console.log("handled", req.url); res.end("ok"); });"#,
        |addr| {
            let rejected = send_raw(
                addr,
                b"POST /upload HTTP/1.1\r\nContent-Length: 99999999999\r\n\r\n",
            );
            (rejected, get(addr, "/after"))
        },
    );
    assert_eq!(rejected.0, 413);
    assert_eq!(after, (200, "ok".to_string()));
    assert_eq!(lines, vec!["handled /after"]);
}

#[test]
fn test_malformed_request_gets_400() {
    let ((status, _), lines) = serve(
        r#"http.createServer((req, res) => { console.log("handled"); res.end(); });"#,
        |addr| send_raw(addr, b"NONSENSE\r\n\r\n"),
    );
    assert_eq!(status, 400);
    assert!(lines.is_empty(), "{lines:?}");
}

#[test]
fn test_request_body_and_headers() {
    let ((status, body), _) = serve(
        r#"
        http.createServer((req, res) => {
            res.end(req.headers["x-test"] + ":" + req.body);
        });
        "#,
        |addr| request(addr, "POST", "/echo", &[("X-Test", "yes")], "payload"),
    );
    assert_eq!(status, 200);
    assert_eq!(body, "yes:payload");
}

#[test]
fn test_handler_without_end_gets_empty_200() {
    let ((status, body), lines) = serve(
        r#"http.createServer((req) => console.log("saw", req.url));"#,
        |addr| get(addr, "/quiet"),
    );
    assert_eq!((status, body.as_str()), (200, ""));
    assert_eq!(lines, vec!["saw /quiet"]);
}

#[test]
fn test_end_twice_keeps_first_response() {
    let ((status, body), _) = serve(
        r#"
        http.createServer((req, res) => {
            res.end("first");
            res.statusCode = 404;
            res.end("second");
        });
        "#,
        |addr| get(addr, "/"),
    );
    assert_eq!((status, body.as_str()), (200, "first"));
}

#[test]
fn test_throwing_handler_gets_500() {
    let ((first, second), lines) = serve(
        r#"http.createServer(() => { throw new Error("nope"); });"#,
        |addr| (get(addr, "/"), get(addr, "/")),
    );
    assert_eq!((first.0, first.1.as_str()), (500, "Internal Server Error"));
    assert_eq!(second.0, 500);
    assert_eq!(lines, vec!["Uncaught Error: nope", "Uncaught Error: nope"]);
}

#[test]
fn test_invalid_status_code_gets_500() {
    let ((status, _), lines) = serve(
        r#"
        http.createServer((req, res) => {
            res.statusCode = 42;
            res.end("bad");
        });
        "#,
        |addr| get(addr, "/"),
    );
    assert_eq!(status, 500);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("Uncaught InvalidArgument:"), "{:?}", lines);
}

#[test]
fn test_response_from_promise_job() {
    let ((status, body), _) = serve(
        r#"
        http.createServer(async (req, res) => {
            const word = await Promise.resolve("later");
            res.end(word);
        });
        "#,
        |addr| get(addr, "/"),
    );
    assert_eq!((status, body.as_str()), (200, "later"));
}

#[test]
fn test_requests_are_serialized() {
    let (bodies, _) = serve(
        r#"
        let served = 0;
        http.createServer((req, res) => {
            served += 1;
            res.end(String(served));
        });
        "#,
        |addr| {
            let clients: Vec<_> = (0..8).map(|_| thread::spawn(move || get(addr, "/"))).collect();
            let mut bodies: Vec<u32> = clients
                .into_iter()
                .map(|client| client.join().unwrap().1.parse().unwrap())
                .collect();
            bodies.sort_unstable();
            bodies
        },
    );
    assert_eq!(bodies, (1..=8).collect::<Vec<_>>());
}

#[test]
fn test_handler_can_schedule_timers() {
    let ((status, body), lines) = serve(
        r#"
        let hits = 0;
        http.createServer((req, res) => {
            hits += 1;
            setTimeout(() => console.log("after", hits), 0);
            res.end("ok");
        });
        "#,
        |addr| {
            let response = get(addr, "/");
            thread::sleep(std::time::Duration::from_millis(50));
            response
        },
    );
    assert_eq!((status, body.as_str()), (200, "ok"));
    assert_eq!(lines, vec!["after 1"]);
}

#[test]
fn test_create_server_returns_address() {
    let fixture = Fixture::new();
    let address = fixture.eval("http.createServer(() => {}).address");
    assert_eq!(Some(address), fixture.runtime.http_address().map(|addr| addr.to_string()));
}

#[test]
fn test_second_server_is_rejected() {
    let fixture = Fixture::new();
    let output = fixture.eval(
        r#"
        http.createServer(() => {});
        let name;
        try { http.createServer(() => {}); } catch (e) { name = e.name; }
        name
        "#,
    );
    assert_eq!(output, "InvalidArgument");
}

#[test]
fn test_create_server_requires_function() {
    let fixture = Fixture::new();
    let output = fixture.eval(
        r#"
        let name;
        try { http.createServer("nope"); } catch (e) { name = e.name; }
        name
        "#,
    );
    assert_eq!(output, "InvalidArgument");
    assert!(fixture.runtime.http_address().is_none());
}
