use rquickjs::{Array, Ctx, IntoJs, Object};

use super::native;
use crate::error::RuntimeError;

pub(super) fn install(ctx: &Ctx<'_>, argv: &[String]) -> rquickjs::Result<()> {
    let process = Object::new(ctx.clone())?;

    let array = Array::new(ctx.clone())?;
    for (index, arg) in argv.iter().enumerate() {
        array.set(index, arg.as_str())?;
    }
    process.set("argv", array)?;

    process.set(
        "cwd",
        native(|ctx, _args| match brook_posix::process::cwd() {
            Ok(cwd) => cwd.into_js(&ctx),
            Err(err) => Err(RuntimeError::Io(err).throw(&ctx)),
        }),
    )?;

    ctx.globals().set("process", process)
}
