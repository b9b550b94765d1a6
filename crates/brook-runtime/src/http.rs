//! HTTP bridge.
//!
//! One accept thread per server plus one thread per connection. A connection
//! thread parses the request, parks it in the pending registry, and blocks on
//! the dispatcher until the script handler has run. The response is written
//! by `res.end`, or by the bridge when the handler returns without it.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use brook_posix::http::{rejection_status, HttpRequest, PendingRequest};
use brook_posix::HandleRegistry;
use rquickjs::function::Rest;
use rquickjs::{Coerced, Ctx, FromJs, Object, Value};

use crate::bindings::method;
use crate::error::{script_error, RuntimeError};
use crate::instance::{report_uncaught, InstanceId};
use crate::runtime::Shared;
use crate::scheduler::{DispatchHandle, Task};

pub(crate) type PendingRequests = Arc<HandleRegistry<PendingRequest>>;

/// A listening server and its accept thread.
pub(crate) struct HttpServer {
    address: SocketAddr,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl HttpServer {
    /// Bind `host:port` and start accepting. Requests are dispatched to
    /// `instance`.
    pub(crate) fn start(
        host: &str,
        port: u16,
        instance: InstanceId,
        dispatch: DispatchHandle,
        pending: PendingRequests,
    ) -> io::Result<Self> {
        let listener = brook_posix::http::bind(host, port)?;
        let address = listener.local_addr()?;
        let stop = Arc::new(AtomicBool::new(false));

        let accept_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("brook-http".to_string())
            .spawn(move || {
                for stream in listener.incoming() {
                    if accept_stop.load(Ordering::Acquire) {
                        break;
                    }
                    match stream {
                        Ok(stream) => {
                            let dispatch = dispatch.clone();
                            let pending = Arc::clone(&pending);
                            let spawned = thread::Builder::new()
                                .name("brook-conn".to_string())
                                .spawn(move || {
                                    handle_connection(stream, instance, dispatch, pending)
                                });
                            if let Err(err) = spawned {
                                tracing::warn!("failed to spawn connection thread: {}", err);
                            }
                        }
                        Err(err) => tracing::warn!("accept failed: {}", err),
                    }
                }
                tracing::debug!("http accept loop stopped");
            })?;

        Ok(Self {
            address,
            stop,
            handle: Some(handle),
        })
    }

    pub(crate) fn address(&self) -> SocketAddr {
        self.address
    }

    /// Stop accepting and join the accept thread. Connections already
    /// accepted finish on their own.
    pub(crate) fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        let mut wake = self.address;
        if wake.ip().is_unspecified() {
            wake.set_ip(match wake {
                SocketAddr::V4(_) => Ipv4Addr::LOCALHOST.into(),
                SocketAddr::V6(_) => Ipv6Addr::LOCALHOST.into(),
            });
        }
        // unblock accept()
        let _ = TcpStream::connect(wake);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

fn handle_connection(
    stream: TcpStream,
    instance: InstanceId,
    dispatch: DispatchHandle,
    pending: PendingRequests,
) {
    let peer = stream.peer_addr().ok();
    let request = match PendingRequest::read_from(stream) {
        Ok(request) => request,
        Err(err) => {
            let status = rejection_status(&err);
            tracing::warn!(?peer, ?status, "rejected request: {}", err);
            return;
        }
    };
    tracing::debug!(
        method = %request.request.method,
        path = %request.request.path,
        "request received"
    );

    let id = pending.insert(request);
    let completed = dispatch.call(|done| Task::Request {
        instance,
        request: id,
        done,
    });

    // still here: the dispatcher went away before the handler could answer
    if let Some(request) = pending.remove(id) {
        tracing::debug!(request = id, completed, "answering unhandled request with 503");
        if let Err(err) = request.respond(503, b"Service Unavailable") {
            tracing::warn!("failed to write response: {}", err);
        }
    }
}

/// Run the script handler for one pending request on the dispatcher thread.
pub(crate) fn serve_request(shared: &Shared, instance_id: InstanceId, request_id: u64) {
    let Some(instance) = shared.instance(instance_id) else {
        return;
    };
    // copy the request out so no registry guard is held while script runs
    let Some(request) = shared.pending.get(request_id).map(|pending| pending.request.clone()) else {
        return;
    };

    let result = instance.enter(|ctx| {
        let Some(handler) = instance.http_handler(&ctx)? else {
            return Ok(());
        };
        let req = request_object(&ctx, &request)?;
        let res = response_object(&ctx, Arc::clone(&shared.pending), request_id)?;
        handler
            .call::<_, Value>((req, res))
            .map(|_| ())
            .map_err(|err| script_error(&ctx, err))
    });
    shared.drain_jobs();

    let (status, body) = match result {
        Ok(()) => (200, ""),
        Err(err) => {
            report_uncaught(&shared.options.console, instance_id, &err.to_string());
            (500, "Internal Server Error")
        }
    };
    if let Some(pending) = shared.pending.remove(request_id) {
        if let Err(err) = pending.respond(status, body.as_bytes()) {
            tracing::warn!("failed to write response: {}", err);
        }
    }
}

fn request_object<'js>(ctx: &Ctx<'js>, request: &HttpRequest) -> rquickjs::Result<Object<'js>> {
    let req = Object::new(ctx.clone())?;
    req.set("method", request.method.as_str())?;
    req.set("url", request.path.as_str())?;
    req.set("query", request.query.as_str())?;

    let headers = Object::new(ctx.clone())?;
    for (name, value) in &request.headers {
        headers.set(name.as_str(), value.as_str())?;
    }
    req.set("headers", headers)?;
    req.set("body", String::from_utf8_lossy(&request.body).into_owned())?;
    Ok(req)
}

fn response_object<'js>(
    ctx: &Ctx<'js>,
    pending: PendingRequests,
    request_id: u64,
) -> rquickjs::Result<Object<'js>> {
    let res = Object::new(ctx.clone())?;
    res.set("statusCode", 200)?;
    res.set(
        "end",
        method(move |ctx, this, args| {
            let status = status_code(&this.0).map_err(|err| err.throw(&ctx))?;
            let body = body_text(&ctx, &args)?;
            if let Some(request) = pending.remove(request_id) {
                if let Err(err) = request.respond(status, body.as_bytes()) {
                    tracing::warn!("failed to write response: {}", err);
                }
            }
            Ok(Value::new_undefined(ctx))
        }),
    )?;
    Ok(res)
}

fn status_code(res: &Value<'_>) -> Result<u16, RuntimeError> {
    // a detached `end` has no receiver to read from
    let Some(res) = res.as_object() else {
        return Ok(200);
    };
    let status: Value = res.get("statusCode")?;
    if status.is_undefined() {
        return Ok(200);
    }
    match status.as_number() {
        Some(code) if (100.0..=599.0).contains(&code) && code.fract() == 0.0 => Ok(code as u16),
        _ => Err(RuntimeError::InvalidArgument(
            "res.end: statusCode must be an integer between 100 and 599".to_string(),
        )),
    }
}

fn body_text<'js>(ctx: &Ctx<'js>, args: &Rest<Value<'js>>) -> rquickjs::Result<String> {
    match args.0.first() {
        Some(body) if !body.is_undefined() && !body.is_null() => {
            Ok(Coerced::<String>::from_js(ctx, body.clone())?.0)
        }
        _ => Ok(String::new()),
    }
}
