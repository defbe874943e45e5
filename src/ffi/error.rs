// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Return codes and the thread-local last-error message for the C ABI.
//!
//! Every entry point returns `0` on success or a negative errno value. The
//! message describing the most recent failure on the calling thread is
//! available through [`tvmdp_get_last_error`].

use std::cell::RefCell;
use std::ffi::{c_char, CString};

use crate::error::{errno, TvmdpError};

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Store `message` as this thread's last error.
pub(crate) fn set_last_error(message: impl Into<String>) {
    let mut message = message.into();
    message.retain(|c| c != '\0');
    let message = CString::new(message).unwrap_or_default();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

/// Record `err` and return its code.
pub(crate) fn report(err: &TvmdpError) -> i32 {
    set_last_error(err.to_string());
    err.errno()
}

/// Record a null-pointer argument and return `-EINVAL`.
pub(crate) fn null_argument(what: &str) -> i32 {
    set_last_error(format!("null pointer argument: {what}"));
    -errno::EINVAL
}

/// Convert a `Result` into a return code, recording any error.
pub(crate) fn status<T>(result: crate::Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => report(&e),
    }
}

/// Message for the most recent failure on this thread, or null.
///
/// The pointer stays valid until the next failing call or
/// [`tvmdp_clear_last_error`] on the same thread.
#[no_mangle]
pub extern "C" fn tvmdp_get_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(std::ptr::null(), |message| message.as_ptr())
    })
}

#[no_mangle]
pub extern "C" fn tvmdp_clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}
