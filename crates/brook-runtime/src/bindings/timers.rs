//! `setTimeout`, `setInterval`, `clearTimeout`, `clearInterval`.

use std::sync::Arc;
use std::time::Duration;

use rquickjs::function::Rest;
use rquickjs::{Ctx, Persistent, Value};

use super::{native, Scope};
use crate::error::RuntimeError;
use crate::scheduler::{TimerArm, TimerId, TimerKind};

/// Delays are capped at the largest value a signed 32-bit millisecond
/// counter holds.
pub(crate) const MAX_DELAY_MS: u64 = i32::MAX as u64;

pub(super) fn install(ctx: &Ctx<'_>, scope: &Scope) -> rquickjs::Result<()> {
    let globals = ctx.globals();

    for (name, kind) in [("setTimeout", TimerKind::Timeout), ("setInterval", TimerKind::Interval)] {
        let scope = scope.clone();
        globals.set(
            name,
            native(move |ctx, args| {
                let id = schedule(&ctx, &scope, &args, kind).map_err(|err| err.throw(&ctx))?;
                Ok(Value::new_number(ctx, id.0 as f64))
            }),
        )?;
    }

    let clears = [
        ("clearTimeout", TimerKind::Timeout),
        ("clearInterval", TimerKind::Interval),
    ];
    for (name, kind) in clears {
        let scope = scope.clone();
        globals.set(
            name,
            native(move |ctx, args| {
                if let Some(id) = args.0.first().and_then(timer_handle) {
                    clear(&scope, id, kind).map_err(|err| err.throw(&ctx))?;
                }
                Ok(Value::new_undefined(ctx))
            }),
        )?;
    }

    Ok(())
}

fn schedule<'js>(
    ctx: &Ctx<'js>,
    scope: &Scope,
    args: &Rest<Value<'js>>,
    kind: TimerKind,
) -> Result<TimerId, RuntimeError> {
    let name = match kind {
        TimerKind::Timeout => "setTimeout",
        TimerKind::Interval => "setInterval",
    };
    let callback = args
        .0
        .first()
        .and_then(|value| value.as_function())
        .cloned()
        .ok_or_else(|| {
            RuntimeError::InvalidArgument(format!("{name}: callback must be a function"))
        })?;
    let mut delay = delay_ms(args.0.get(1), name)?;
    if kind == TimerKind::Interval {
        delay = delay.max(1);
    }

    let shared = scope.shared()?;
    let instance = scope.instance()?;
    let id = shared.next_timer_id();
    let arm = Arc::new(TimerArm::new());
    instance
        .timers()
        .borrow_mut()
        .insert(id, kind, arm.clone(), Persistent::save(ctx, callback));

    let delay = Duration::from_millis(delay);
    let period = (kind == TimerKind::Interval).then_some(delay);
    shared.timers.arm(instance.id(), id, delay, period, arm);
    tracing::debug!(instance = %instance.id(), timer = %id, ?kind, ?delay, "timer registered");
    Ok(id)
}

fn clear(scope: &Scope, id: TimerId, kind: TimerKind) -> Result<(), RuntimeError> {
    let instance = scope.instance()?;
    let cleared = instance.timers().borrow_mut().cancel(id, kind);
    tracing::debug!(instance = %instance.id(), timer = %id, ?kind, cleared, "timer cleared");
    Ok(())
}

/// Validate a delay argument: omitted means 0, otherwise a finite,
/// non-negative number whose fractional part is dropped.
fn delay_ms(value: Option<&Value<'_>>, name: &str) -> Result<u64, RuntimeError> {
    let value = match value {
        None => return Ok(0),
        Some(value) if value.is_undefined() => return Ok(0),
        Some(value) => value,
    };
    match value.as_number() {
        Some(ms) if ms.is_finite() && ms >= 0.0 => Ok((ms.trunc() as u64).min(MAX_DELAY_MS)),
        _ => Err(RuntimeError::InvalidArgument(format!(
            "{name}: delay must be a finite, non-negative number of milliseconds"
        ))),
    }
}

fn timer_handle(value: &Value<'_>) -> Option<TimerId> {
    let n = value.as_number()?;
    (n.is_finite() && n >= 1.0 && n.fract() == 0.0).then(|| TimerId(n as u64))
}
