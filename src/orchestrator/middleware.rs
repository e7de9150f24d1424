//! Middleware wrapping (spec §4.8): "error isolation, performance
//! instrumentation, logging", outermost to innermost. Built as plain
//! function-wrapping closures rather than `tower::Service` — the bus is a
//! synchronous single-threaded cooperative loop (spec §4.8/§5), not a
//! network service, so there's no async boundary for `tower`'s
//! `Service`/`Layer` machinery to add value over a direct wrap.

use super::messages::{Message, Response};
use std::time::Instant;

pub type HandlerFn = dyn Fn(Message) -> Response + Send + Sync;

pub fn build_pipeline(core: Box<HandlerFn>) -> Box<HandlerFn> {
    let logged = wrap_logging(core);
    let instrumented = wrap_instrumentation(logged);
    wrap_error_isolation(instrumented)
}

fn wrap_logging(next: Box<HandlerFn>) -> Box<HandlerFn> {
    Box::new(move |message: Message| {
        crate::logger::debug(&format!("dispatch {}", message.tag()));
        next(message)
    })
}

fn wrap_instrumentation(next: Box<HandlerFn>) -> Box<HandlerFn> {
    Box::new(move |message: Message| {
        let tag = message.tag();
        let start = Instant::now();
        let response = next(message);
        let elapsed = start.elapsed();
        if elapsed.as_millis() > 16 {
            crate::logger::warn(&format!("{tag} took {elapsed:?} (over one frame budget)"));
        }
        response
    })
}

/// Catches a panicking handler so one bad message doesn't poison the bus
/// (spec §4.8, §7 class 2).
fn wrap_error_isolation(next: Box<HandlerFn>) -> Box<HandlerFn> {
    Box::new(move |message: Message| {
        let tag = message.tag();
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| next(message))) {
            Ok(response) => response,
            Err(_) => {
                crate::logger::error(&format!("handler for {tag} panicked; isolated"));
                Response::None
            }
        }
    })
}
