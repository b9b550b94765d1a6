//! `fs.readFileSync` / `fs.writeFileSync`.

use std::io;

use rquickjs::{Ctx, IntoJs, Object, Value};

use super::{native, string_arg};
use crate::error::RuntimeError;

pub(super) fn install(ctx: &Ctx<'_>) -> rquickjs::Result<()> {
    let fs = Object::new(ctx.clone())?;

    fs.set(
        "readFileSync",
        native(|ctx, args| {
            let path = string_arg(&ctx, &args, 0, "fs.readFileSync: path")
                .map_err(|err| err.throw(&ctx))?;
            match brook_posix::fs::read_text_file(&path) {
                Ok(text) => text.into_js(&ctx),
                Err(err) => Err(io_error(&path, err).throw(&ctx)),
            }
        }),
    )?;

    fs.set(
        "writeFileSync",
        native(|ctx, args| {
            let path = string_arg(&ctx, &args, 0, "fs.writeFileSync: path")
                .map_err(|err| err.throw(&ctx))?;
            let content = string_arg(&ctx, &args, 1, "fs.writeFileSync: content")
                .map_err(|err| err.throw(&ctx))?;
            brook_posix::fs::write_text_file(&path, &content)
                .map_err(|err| io_error(&path, err).throw(&ctx))?;
            tracing::trace!(path = %path, bytes = content.len(), "file written");
            Ok(Value::new_undefined(ctx))
        }),
    )?;

    ctx.globals().set("fs", fs)
}

fn io_error(path: &str, err: io::Error) -> RuntimeError {
    RuntimeError::Io(io::Error::new(err.kind(), format!("{path}: {err}")))
}
