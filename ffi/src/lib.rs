//! C-ABI wrapper around `todolist-core`.
//!
//! # Overview
//! Exposes the list coordinator through `extern "C"` functions so a native
//! display layer can drive the to-do list without linking Rust's async
//! runtime or serde directly. Each handle owns a small tokio runtime, the
//! coordinator task, and a `ureq` transport.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Commands are fire-and-forget: they are queued in call order and return
//!   a status at once. Outcomes are observed through snapshots, with the
//!   latest failure in `FfiListView::error_message`.
//! - `todo_list_has_changed` lets a host poll cheaply before taking a new
//!   snapshot.
//! - The C caller owns all returned pointers and must call the matching
//!   `todo_list_free*` function to release them.

pub mod transport;
pub mod types;

use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use todolist_core::{HttpStore, Item, ListCoordinator, ListView, StoreClient, StoreConfig};
use tracing::warn;
use tracing_subscriber::EnvFilter;

pub use transport::UreqTransport;
use types::*;

/// Borrow a C string as UTF-8.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
unsafe fn read_str<'a>(ptr: *const c_char) -> Result<&'a str, FfiStatus> {
    if ptr.is_null() {
        return Err(FfiStatus::NullArg);
    }
    CStr::from_ptr(ptr).to_str().map_err(|_| FfiStatus::InvalidArg)
}

/// Like `read_str`, but null means "not given".
unsafe fn read_opt_str<'a>(ptr: *const c_char) -> Result<Option<&'a str>, FfiStatus> {
    if ptr.is_null() {
        Ok(None)
    } else {
        read_str(ptr).map(Some)
    }
}

fn open(config: StoreConfig) -> Result<*mut FfiTodoList, std::io::Error> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("todolist")
        .enable_all()
        .build()?;
    let store = HttpStore::new(StoreClient::from_config(&config), UreqTransport::new());
    let inner = ListCoordinator::spawn_on(store, runtime.handle());
    let view = Mutex::new(inner.subscribe());
    Ok(Box::into_raw(Box::new(FfiTodoList {
        runtime,
        inner,
        view,
    })))
}

/// Lock the host's seen-marker, ignoring poisoning.
fn seen(list: &FfiTodoList) -> MutexGuard<'_, watch::Receiver<ListView>> {
    list.view.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run a command against a live handle.
fn with_list(
    list: *const FfiTodoList,
    name: &str,
    f: impl FnOnce(&FfiTodoList) -> Result<(), FfiStatus>,
) -> FfiStatus {
    catch_unwind(AssertUnwindSafe(|| {
        if list.is_null() {
            return FfiStatus::NullArg;
        }
        let list = unsafe { &*list };
        if list.inner.is_closed() {
            return FfiStatus::Closed;
        }
        match f(list) {
            Ok(()) => FfiStatus::Ok,
            Err(status) => {
                warn!(command = name, ?status, "rejected at FFI boundary");
                status
            }
        }
    }))
    .unwrap_or(FfiStatus::Panic)
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Install a `tracing` subscriber writing to stderr.
///
/// `filter` uses `RUST_LOG` syntax (e.g. `"todolist_core=debug"`); null means
/// `"info"`. Returns `InvalidArg` for an unparsable filter. Calling it again
/// after a successful install is a no-op.
#[unsafe(no_mangle)]
pub extern "C" fn todo_init_logging(filter: *const c_char) -> FfiStatus {
    catch_unwind(|| {
        let directives = match unsafe { read_opt_str(filter) } {
            Ok(directives) => directives.unwrap_or("info"),
            Err(status) => return status,
        };
        let Ok(filter) = EnvFilter::try_new(directives) else {
            return FfiStatus::InvalidArg;
        };
        // A global subscriber may already be installed by the host.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
        FfiStatus::Ok
    })
    .unwrap_or(FfiStatus::Panic)
}

// ---------------------------------------------------------------------------
// Handle lifecycle
// ---------------------------------------------------------------------------

/// Start a coordinator for `table` at `base_url` and begin the initial load.
///
/// `api_key` and `table` may be null (no key, table `"todos"`).
/// Returns null if `base_url` is null or not UTF-8, or if the runtime cannot
/// start. The caller must free the handle with `todo_list_free`.
#[unsafe(no_mangle)]
pub extern "C" fn todo_list_new(
    base_url: *const c_char,
    api_key: *const c_char,
    table: *const c_char,
) -> *mut FfiTodoList {
    catch_unwind(|| {
        let (Ok(url), Ok(key), Ok(table)) = (unsafe {
            (
                read_str(base_url),
                read_opt_str(api_key),
                read_opt_str(table),
            )
        }) else {
            return std::ptr::null_mut();
        };

        let mut config = StoreConfig::new(url);
        if let Some(key) = key {
            config = config.with_api_key(key);
        }
        if let Some(table) = table {
            config = config.with_table(table);
        }
        open(config).unwrap_or_else(|err| {
            warn!(error = %err, "cannot start runtime");
            std::ptr::null_mut()
        })
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Start a coordinator configured from `TODO_STORE_URL`, `TODO_STORE_KEY`
/// and `TODO_STORE_TABLE`. Returns null when the configuration is invalid.
#[unsafe(no_mangle)]
pub extern "C" fn todo_list_new_from_env() -> *mut FfiTodoList {
    catch_unwind(|| match StoreConfig::from_env() {
        Ok(config) => open(config).unwrap_or_else(|err| {
            warn!(error = %err, "cannot start runtime");
            std::ptr::null_mut()
        }),
        Err(err) => {
            warn!(error = %err, "invalid store configuration");
            std::ptr::null_mut()
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Stop the coordinator and free the handle. Safe to call with null.
///
/// Commands still queued are abandoned.
#[unsafe(no_mangle)]
pub extern "C" fn todo_list_free(list: *mut FfiTodoList) {
    if !list.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let FfiTodoList {
                runtime,
                inner,
                view,
            } = *unsafe { Box::from_raw(list) };
            drop(view);
            drop(inner);
            runtime.shutdown_background();
        }));
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Queue a full reload, ascending by id.
#[unsafe(no_mangle)]
pub extern "C" fn todo_list_refresh(list: *const FfiTodoList) -> FfiStatus {
    with_list(list, "refresh", |list| {
        drop(list.inner.refresh());
        Ok(())
    })
}

/// Queue the creation of an item titled `title`.
#[unsafe(no_mangle)]
pub extern "C" fn todo_list_create(list: *const FfiTodoList, title: *const c_char) -> FfiStatus {
    with_list(list, "create", |list| {
        let title = unsafe { read_str(title) }?;
        drop(list.inner.create(title));
        Ok(())
    })
}

/// Queue the deletion of the row with `id`, followed by a reload.
#[unsafe(no_mangle)]
pub extern "C" fn todo_list_delete(list: *const FfiTodoList, id: i64) -> FfiStatus {
    with_list(list, "delete", |list| {
        let item = Item {
            id: Some(id),
            title: String::new(),
            done: false,
        };
        drop(list.inner.delete(&item));
        Ok(())
    })
}

/// Queue an overwrite of the row with `id`.
///
/// The snapshot does not change until the next reload.
#[unsafe(no_mangle)]
pub extern "C" fn todo_list_update(
    list: *const FfiTodoList,
    id: i64,
    title: *const c_char,
    done: bool,
) -> FfiStatus {
    with_list(list, "update", |list| {
        let title = unsafe { read_str(title) }?;
        let item = Item {
            id: Some(id),
            title: title.to_string(),
            done,
        };
        drop(list.inner.update(&item));
        Ok(())
    })
}

/// Queue a search; an empty `term` reloads everything.
#[unsafe(no_mangle)]
pub extern "C" fn todo_list_filter(list: *const FfiTodoList, term: *const c_char) -> FfiStatus {
    with_list(list, "filter", |list| {
        let term = unsafe { read_str(term) }?;
        drop(list.inner.filter(term));
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// True if the state changed since the last `todo_list_snapshot`.
#[unsafe(no_mangle)]
pub extern "C" fn todo_list_has_changed(list: *const FfiTodoList) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if list.is_null() {
            return false;
        }
        let list = unsafe { &*list };
        seen(list).has_changed().unwrap_or(false)
    }))
    .unwrap_or(false)
}

/// Copy the current state. Returns null if `list` is null.
///
/// Safe to call from several threads; each call marks the state as seen.
/// The caller must free the result with `todo_list_free_snapshot`.
#[unsafe(no_mangle)]
pub extern "C" fn todo_list_snapshot(list: *const FfiTodoList) -> *mut FfiListView {
    catch_unwind(AssertUnwindSafe(|| {
        if list.is_null() {
            return std::ptr::null_mut();
        }
        let list = unsafe { &*list };
        let view = seen(list).borrow_and_update().clone();
        FfiListView::from_core(view)
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Free a snapshot returned by `todo_list_snapshot`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn todo_list_free_snapshot(view: *mut FfiListView) {
    if !view.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| unsafe { FfiListView::free(view) }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::time::{Duration, Instant};

    /// Start the mock store on a random port and return its base URL.
    fn start_store() -> CString {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = std_listener.local_addr().unwrap();
        std_listener.set_nonblocking(true).unwrap();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
                mock_store::run(listener, mock_store::StoreSettings::default()).await
            })
            .unwrap();
        });

        CString::new(format!("http://{addr}")).unwrap()
    }

    /// Snapshot until `pred` holds; panics after five seconds.
    fn wait_until(list: *mut FfiTodoList, pred: impl Fn(&FfiListView) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let snapshot = todo_list_snapshot(list);
            let done = pred(unsafe { &*snapshot });
            todo_list_free_snapshot(snapshot);
            if done {
                return;
            }
            assert!(Instant::now() < deadline, "timed out waiting for state");
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    fn titles(view: &FfiListView) -> Vec<String> {
        if view.items.is_null() {
            return Vec::new();
        }
        let items = unsafe { std::slice::from_raw_parts(view.items, view.len) };
        items
            .iter()
            .map(|item| {
                unsafe { CStr::from_ptr(item.title) }
                    .to_str()
                    .unwrap()
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn new_with_null_url_returns_null() {
        let list = todo_list_new(std::ptr::null(), std::ptr::null(), std::ptr::null());
        assert!(list.is_null());
    }

    #[test]
    fn free_null_is_safe() {
        todo_list_free(std::ptr::null_mut());
        todo_list_free_snapshot(std::ptr::null_mut());
    }

    #[test]
    fn commands_on_null_handle_report_null_arg() {
        let title = CString::new("x").unwrap();
        assert_eq!(todo_list_refresh(std::ptr::null()), FfiStatus::NullArg);
        assert_eq!(todo_list_create(std::ptr::null(), title.as_ptr()), FfiStatus::NullArg);
        assert_eq!(todo_list_delete(std::ptr::null(), 1), FfiStatus::NullArg);
        assert_eq!(todo_list_filter(std::ptr::null(), title.as_ptr()), FfiStatus::NullArg);
        assert!(todo_list_snapshot(std::ptr::null()).is_null());
        assert!(!todo_list_has_changed(std::ptr::null()));
    }

    #[test]
    fn invalid_logging_filter_is_rejected() {
        let bad = CString::new("=[").unwrap();
        assert_eq!(todo_init_logging(bad.as_ptr()), FfiStatus::InvalidArg);
    }

    #[test]
    fn unreachable_store_surfaces_error_message() {
        let url = CString::new("http://127.0.0.1:1").unwrap();
        let list = todo_list_new(url.as_ptr(), std::ptr::null(), std::ptr::null());
        assert!(!list.is_null());

        wait_until(list, |view| !view.error_message.is_null() && !view.busy);
        let snapshot = todo_list_snapshot(list);
        let view = unsafe { &*snapshot };
        assert_eq!(view.len, 0);
        let message = unsafe { CStr::from_ptr(view.error_message) }.to_str().unwrap();
        assert!(message.contains("transport"));
        todo_list_free_snapshot(snapshot);

        todo_list_free(list);
    }

    #[test]
    fn snapshot_len_counts_every_item() {
        let view = ListView {
            items: (1..=3)
                .map(|id| Item {
                    id: Some(id),
                    title: format!("item {id}"),
                    done: false,
                })
                .collect(),
            busy: false,
            last_error: None,
        };
        let snapshot = FfiListView::from_core(view);
        let view = unsafe { &*snapshot };
        assert_eq!(view.len, 3);
        assert_eq!(titles(view), ["item 1", "item 2", "item 3"]);
        todo_list_free_snapshot(snapshot);
    }

    #[test]
    fn snapshots_from_several_threads() {
        let url = start_store();
        let list = todo_list_new(url.as_ptr(), std::ptr::null(), std::ptr::null());
        assert!(!list.is_null());

        // Raw pointers are not `Send`; the handle itself is shared by address.
        let addr = list as usize;
        let threads: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let snapshot = todo_list_snapshot(addr as *const FfiTodoList);
                        assert!(!snapshot.is_null());
                        todo_list_free_snapshot(snapshot);
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        todo_list_free(list);
    }

    #[test]
    fn list_lifecycle_over_http() {
        let url = start_store();
        let list = todo_list_new(url.as_ptr(), std::ptr::null(), std::ptr::null());
        assert!(!list.is_null());
        wait_until(list, |view| !view.busy);

        let milk = CString::new("Buy milk").unwrap();
        let dog = CString::new("Walk dog").unwrap();
        assert_eq!(todo_list_create(list, milk.as_ptr()), FfiStatus::Ok);
        assert_eq!(todo_list_create(list, dog.as_ptr()), FfiStatus::Ok);
        wait_until(list, |view| titles(view) == ["Buy milk", "Walk dog"]);
        assert!(!todo_list_has_changed(list));

        let term = CString::new("MILK").unwrap();
        assert_eq!(todo_list_filter(list, term.as_ptr()), FfiStatus::Ok);
        wait_until(list, |view| titles(view) == ["Buy milk"]);

        assert_eq!(todo_list_delete(list, 1), FfiStatus::Ok);
        wait_until(list, |view| titles(view) == ["Walk dog"]);

        let cat = CString::new("Walk cat").unwrap();
        assert_eq!(todo_list_update(list, 2, cat.as_ptr(), true), FfiStatus::Ok);
        assert_eq!(todo_list_refresh(list), FfiStatus::Ok);
        wait_until(list, |view| titles(view) == ["Walk cat"]);

        let snapshot = todo_list_snapshot(list);
        let view = unsafe { &*snapshot };
        let item = unsafe { &*view.items };
        assert!(item.has_id);
        assert_eq!(item.id, 2);
        assert!(item.done);
        assert!(view.error_message.is_null());
        todo_list_free_snapshot(snapshot);

        todo_list_free(list);
    }
}
