use rquickjs::Ctx;

use super::{native, string_arg, Scope};
use crate::loader;

pub(super) fn install(ctx: &Ctx<'_>, scope: &Scope) -> rquickjs::Result<()> {
    let scope = scope.clone();
    ctx.globals().set(
        "require",
        native(move |ctx, args| {
            let name = string_arg(&ctx, &args, 0, "require: module name")
                .map_err(|err| err.throw(&ctx))?;
            loader::require(&ctx, &scope, &name).map_err(|err| err.throw(&ctx))
        }),
    )
}
