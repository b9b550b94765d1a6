//! E2E tests for setTimeout / setInterval and their clear functions

use std::time::{Duration, Instant};

use brook_runtime::RuntimeError;

use super::harness::*;

#[test]
fn test_timeout_runs_once() {
    expect_output("setTimeout(() => console.log('fired'), 10);", &["fired"]);
}

#[test]
fn test_timeout_never_early() {
    let fixture = Fixture::new();
    let start = Instant::now();
    fixture.eval("setTimeout(() => console.log('late enough'), 80);");
    assert_eq!(fixture.run(), vec!["late enough"]);
    assert!(start.elapsed() >= Duration::from_millis(80));
}

#[test]
fn test_timeout_order_follows_delay() {
    expect_output(
        r#"
        setTimeout(() => console.log('slow'), 60);
        setTimeout(() => console.log('fast'), 5);
        setTimeout(() => console.log('middle'), 30);
        "#,
        &["fast", "middle", "slow"],
    );
}

#[test]
fn test_equal_delays_fire_in_registration_order() {
    expect_output(
        r#"
        for (let i = 0; i < 5; i++) {
            setTimeout(() => console.log('t' + i), 10);
        }
        "#,
        &["t0", "t1", "t2", "t3", "t4"],
    );
}

#[test]
fn test_omitted_delay_means_zero() {
    expect_output("setTimeout(() => console.log('zero'));", &["zero"]);
}

#[test]
fn test_fractional_delay_truncated() {
    expect_output("setTimeout(() => console.log('frac'), 1.9);", &["frac"]);
}

#[test]
fn test_callback_runs_after_script_finishes() {
    expect_output(
        r#"
        setTimeout(() => console.log('callback'), 0);
        console.log('script');
        "#,
        &["script", "callback"],
    );
}

#[test]
fn test_clear_timeout_before_fire() {
    expect_output(
        r#"
        const h = setTimeout(() => console.log('never'), 30);
        clearTimeout(h);
        setTimeout(() => console.log('done'), 60);
        "#,
        &["done"],
    );
}

#[test]
fn test_clear_from_another_callback_suppresses_queued_fire() {
    expect_output(
        r#"
        let b;
        setTimeout(() => { console.log('a'); clearTimeout(b); }, 20);
        b = setTimeout(() => console.log('b'), 20);
        "#,
        &["a"],
    );
}

#[test]
fn test_clear_unknown_and_fired_handles_are_noops() {
    expect_output(
        r#"
        clearTimeout(12345);
        clearTimeout('nope');
        clearTimeout();
        clearInterval(undefined);
        const h = setTimeout(() => {
            console.log('fired');
            setTimeout(() => { clearTimeout(h); console.log('cleared after fire'); }, 5);
        }, 5);
        "#,
        &["fired", "cleared after fire"],
    );
}

#[test]
fn test_interval_ticks_until_cleared() {
    expect_output(
        r#"
        let n = 0;
        const h = setInterval(() => {
            n += 1;
            console.log('tick ' + n);
            if (n === 3) clearInterval(h);
        }, 10);
        "#,
        &["tick 1", "tick 2", "tick 3"],
    );
}

#[test]
fn test_interval_cleared_at_220ms_ticks_four_times() {
    expect_output(
        r#"
        const h = setInterval(() => console.log('tick'), 50);
        setTimeout(() => clearInterval(h), 220);
        "#,
        &["tick", "tick", "tick", "tick"],
    );
}

#[test]
fn test_zero_interval_still_repeats() {
    expect_output(
        r#"
        let n = 0;
        const h = setInterval(() => {
            n += 1;
            if (n === 3) { clearInterval(h); console.log('three'); }
        }, 0);
        "#,
        &["three"],
    );
}

#[test]
fn test_clear_functions_check_kind() {
    expect_output(
        r#"
        const i = setInterval(() => { console.log('interval'); clearInterval(i); }, 10);
        clearTimeout(i);
        const t = setTimeout(() => console.log('timeout'), 30);
        clearInterval(t);
        "#,
        &["interval", "timeout"],
    );
}

#[test]
fn test_handles_are_unique_across_kinds() {
    expect_output(
        r#"
        const a = setTimeout(() => {}, 0);
        const b = setInterval(() => {}, 10);
        const c = setTimeout(() => {}, 0);
        clearInterval(b);
        console.log(typeof a, a < b, b < c);
        "#,
        &["number true true"],
    );
}

#[test]
fn test_invalid_arguments_throw() {
    expect_output(
        r#"
        const attempts = [
            () => setTimeout('not a function', 10),
            () => setTimeout(() => {}, -1),
            () => setTimeout(() => {}, NaN),
            () => setTimeout(() => {}, Infinity),
            () => setInterval(() => {}, '100'),
            () => setInterval(),
        ];
        for (const attempt of attempts) {
            try {
                attempt();
                console.log('accepted');
            } catch (e) {
                console.log(e.name);
            }
        }
        "#,
        &[
            "InvalidArgument",
            "InvalidArgument",
            "InvalidArgument",
            "InvalidArgument",
            "InvalidArgument",
            "InvalidArgument",
        ],
    );
}

#[test]
fn test_uncaught_callback_error_is_reported_and_loop_continues() {
    expect_output(
        r#"
        setTimeout(() => { throw new Error('boom'); }, 0);
        setTimeout(() => console.log('still running'), 20);
        "#,
        &["Uncaught Error: boom", "still running"],
    );
}

#[test]
fn test_callbacks_never_overlap() {
    expect_output(
        r#"
        let active = 0;
        let overlaps = 0;
        let runs = 0;
        for (let i = 0; i < 20; i++) {
            setTimeout(() => {
                active += 1;
                if (active > 1) overlaps += 1;
                const until = Date.now() + 2;
                while (Date.now() < until) {}
                active -= 1;
                runs += 1;
                if (runs === 20) console.log('runs', runs, 'overlaps', overlaps);
            }, i % 3);
        }
        "#,
        &["runs 20 overlaps 0"],
    );
}

#[test]
fn test_promise_jobs_run_after_callbacks() {
    expect_output(
        r#"
        setTimeout(() => {
            Promise.resolve('resolved').then((v) => console.log(v));
            console.log('sync');
        }, 0);
        "#,
        &["sync", "resolved"],
    );
}

#[test]
fn test_live_timers_tracked() {
    let fixture = Fixture::new();
    fixture.eval("globalThis.h = setInterval(() => {}, 1000); setTimeout(() => {}, 1000);");
    assert_eq!(fixture.runtime.live_timers(), 2);
    fixture.eval("clearInterval(h);");
    assert_eq!(fixture.runtime.live_timers(), 1);
}

#[test]
fn test_entry_error_keeps_registered_timers() {
    let fixture = Fixture::new();
    let err = fixture
        .runtime
        .eval("setTimeout(() => console.log('survivor'), 10); throw new Error('entry failed');")
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Script(ref message) if message == "Error: entry failed"));
    assert_eq!(fixture.run(), vec!["survivor"]);
}
