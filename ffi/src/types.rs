//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type with C-compatible representations:
//! `*mut c_char` instead of `String`, raw pointer plus length instead of
//! `Vec`, and an explicit `has_id` flag instead of `Option<i64>`. Conversion
//! and release helpers live here to keep `lib.rs` focused on the
//! `extern "C"` surface.

use std::ffi::CString;
use std::os::raw::c_char;
use std::sync::Mutex;

use tokio::runtime::Runtime;
use tokio::sync::watch;
use todolist_core::{ListCoordinator, ListView};

/// Opaque handle to a running coordinator. C callers receive a pointer to
/// this and pass it back into every `todo_list_*` function.
pub struct FfiTodoList {
    pub(crate) runtime: Runtime,
    pub(crate) inner: ListCoordinator,
    /// Tracks which state the host has already seen. Locked so snapshots
    /// may be taken from any thread.
    pub(crate) view: Mutex<watch::Receiver<ListView>>,
}

/// Status codes returned by command functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiStatus {
    Ok = 0,
    NullArg = 1,
    InvalidArg = 2,
    Closed = 3,
    Panic = 4,
}

/// A single to-do item exposed to C. `id` is meaningful only when `has_id`.
#[repr(C)]
pub struct FfiItem {
    pub id: i64,
    pub has_id: bool,
    pub title: *mut c_char,
    pub done: bool,
}

/// Owned snapshot of the list state.
///
/// `error_message` is null unless the latest command failed. Release with
/// `todo_list_free_snapshot`.
#[repr(C)]
pub struct FfiListView {
    pub items: *mut FfiItem,
    pub len: usize,
    pub busy: bool,
    pub error_message: *mut c_char,
}

/// Convert to a C string, dropping interior NULs rather than failing.
pub(crate) fn to_c_string(s: String) -> *mut c_char {
    let s = if s.contains('\0') { s.replace('\0', "") } else { s };
    CString::new(s).unwrap_or_default().into_raw()
}

/// Release a string produced by `to_c_string`. Null is ignored.
///
/// # Safety
/// `ptr` must be null or come from `to_c_string` and not be freed already.
pub(crate) unsafe fn free_c_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

impl FfiListView {
    /// Convert a core `ListView` into a heap-allocated `FfiListView`.
    pub(crate) fn from_core(view: ListView) -> *mut Self {
        let len = view.items.len();
        let items: Box<[FfiItem]> = view
            .items
            .into_iter()
            .map(|item| FfiItem {
                id: item.id.unwrap_or_default(),
                has_id: item.id.is_some(),
                title: to_c_string(item.title),
                done: item.done,
            })
            .collect();
        let items = if items.is_empty() {
            std::ptr::null_mut()
        } else {
            Box::into_raw(items) as *mut FfiItem
        };

        Box::into_raw(Box::new(FfiListView {
            items,
            len,
            busy: view.busy,
            error_message: view.last_error.map_or(std::ptr::null_mut(), to_c_string),
        }))
    }

    /// Release a snapshot and everything it owns.
    ///
    /// # Safety
    /// `ptr` must come from `from_core` and not be freed already.
    pub(crate) unsafe fn free(ptr: *mut Self) {
        let view = Box::from_raw(ptr);
        if !view.items.is_null() {
            let items = std::slice::from_raw_parts_mut(view.items, view.len);
            let items = Box::from_raw(items as *mut [FfiItem]);
            for item in items.iter() {
                free_c_string(item.title);
            }
        }
        free_c_string(view.error_message);
    }
}
