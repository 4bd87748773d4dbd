use axum::{extract::Request, middleware::Next, response::Response};
use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::Once;

use super::request_id::RequestId;
use crate::api::responses;

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static BACKTRACE_HOOK: Once = Once::new();

/// Wraps the current panic hook so the panicking thread keeps a copy of the
/// backtrace. The previous hook still runs.
fn install_backtrace_hook() {
    BACKTRACE_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            PANIC_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

// catch_unwind polls the inner future on the panicking thread, so the
// thread-local still holds this panic's trace.
fn take_backtrace() -> String {
    PANIC_BACKTRACE
        .with(|slot| slot.take())
        .unwrap_or_else(|| "<no backtrace captured>".to_string())
}

pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Turns a panic anywhere downstream into a 500 error envelope.
///
/// The panic payload, backtrace, path and method are logged with the
/// request id; the process keeps serving.
pub async fn recover_panics(request: Request, next: Next) -> Response {
    install_backtrace_hook();

    let request_id = RequestId::lookup(request.extensions(), request.headers()).unwrap_or_default();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            tracing::error!(
                request_id = %request_id,
                error = %panic_message(payload.as_ref()),
                stack = %take_backtrace(),
                path = %path,
                method = %method,
                "Panic recovered"
            );
            responses::internal_error(&request_id, "Internal server error")
        }
    }
}
