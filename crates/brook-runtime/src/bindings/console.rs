use rquickjs::{Ctx, Object, Value};

use super::native;
use crate::console::{format_value, Console};

pub(super) fn install(ctx: &Ctx<'_>, sink: Console) -> rquickjs::Result<()> {
    let console = Object::new(ctx.clone())?;
    console.set(
        "log",
        native(move |ctx, args| {
            let line = args
                .0
                .iter()
                .map(|value| format_value(&ctx, value))
                .collect::<Vec<_>>()
                .join(" ");
            sink.write_line(&line);
            Ok(Value::new_undefined(ctx))
        }),
    )?;
    ctx.globals().set("console", console)
}
