//! Panic containment around host engine calls.
//!
//! A panic inside an engine call is reported as an error so the calling
//! thread can still reset the state it owns.

use std::panic::{AssertUnwindSafe, catch_unwind};

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}

/// Runs `f`, turning a panic into `Err` with the panic message.
pub(crate) fn guard_engine_call<T>(op: &str, f: impl FnOnce() -> T) -> Result<T, String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let msg = panic_message(payload);
        log::error!("Panic in engine call `{}`: {}", op, msg);
        format!("panic in `{op}`: {msg}")
    })
}
