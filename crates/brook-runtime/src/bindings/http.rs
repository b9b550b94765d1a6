use rquickjs::{Ctx, Object};

use super::{native, Scope};
use crate::error::RuntimeError;

pub(super) fn install(ctx: &Ctx<'_>, scope: &Scope) -> rquickjs::Result<()> {
    let http = Object::new(ctx.clone())?;
    let scope = scope.clone();

    http.set(
        "createServer",
        native(move |ctx, args| {
            let Some(handler) = args.0.first().and_then(|value| value.as_function()).cloned() else {
                return Err(RuntimeError::InvalidArgument(
                    "http.createServer: handler must be a function".to_string(),
                )
                .throw(&ctx));
            };

            let shared = scope.shared().map_err(|err| err.throw(&ctx))?;
            let instance = scope.instance().map_err(|err| err.throw(&ctx))?;
            let address = shared.listen(instance.id()).map_err(|err| err.throw(&ctx))?;
            instance.set_http_handler(&ctx, handler);

            let server = Object::new(ctx.clone())?;
            server.set("address", address.to_string())?;
            Ok(server.into_value())
        }),
    )?;

    ctx.globals().set("http", http)
}
