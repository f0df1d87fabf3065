//! The list coordinator: one task owns the to-do list and applies commands
//! against the store in submission order.
//!
//! # Design
//! `ListCoordinator` is a cheap, cloneable handle. Each operation pushes a
//! `Command` onto an unbounded channel at call time and returns a `Reply`
//! future for its outcome; the actor task pops commands one at a time, talks
//! to the `RemoteStore`, and publishes the new `ListView` through a `watch`
//! channel. Awaiting the reply is optional: dropping it leaves the command
//! queued, which is how a display layer fires and forgets.
//!
//! Every failed command is logged, recorded in `ListView::last_error`, and
//! returned through its reply. Local state after a failure is left as it was,
//! except that a failed full load clears `busy`. Commands rejected before
//! reaching the store (an item without an id) still pass through the task so
//! the rejection lands in the view in submission order. Once the task is gone
//! there is no view left to record into, and replies resolve to `Closed`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::RemoteStore;
use crate::types::{Item, Order};

/// What the display layer observes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListView {
    /// Current view of the table, ascending by id after every full load.
    pub items: Vec<Item>,
    /// True while a full load is in flight.
    pub busy: bool,
    /// Message of the latest failed command, cleared by the next success.
    pub last_error: Option<String>,
}

type Responder<T> = oneshot::Sender<Result<T, StoreError>>;

enum Command {
    Refresh(Responder<()>),
    Create(String, Responder<Item>),
    Delete(i64, Responder<()>),
    Update(i64, Item, Responder<()>),
    Filter(String, Responder<()>),
    /// Refused without contacting the store.
    Reject(&'static str, StoreError, Responder<()>),
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Refresh(_) => "refresh",
            Command::Create(..) => "create",
            Command::Delete(..) => "delete",
            Command::Update(..) => "update",
            Command::Filter(..) => "filter",
            Command::Reject(name, ..) => *name,
        }
    }
}

/// Handle to the coordinator task.
#[derive(Clone)]
pub struct ListCoordinator {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<ListView>,
}

impl ListCoordinator {
    /// Start the coordinator on the current tokio runtime and queue the
    /// initial full load.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime; use `spawn_on` from
    /// synchronous code.
    pub fn spawn<S: RemoteStore>(store: S) -> Self {
        Self::spawn_on(store, &Handle::current())
    }

    /// Start the coordinator on `handle` and queue the initial full load.
    pub fn spawn_on<S: RemoteStore>(store: S, handle: &Handle) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (view_tx, view) = watch::channel(ListView::default());
        handle.spawn(run(store, rx, view_tx));

        let coordinator = Self { commands, view };
        // The initial load's outcome is only observable through the view.
        drop(coordinator.refresh());
        coordinator
    }

    /// Reload every row, ascending by id.
    pub fn refresh(&self) -> Reply<()> {
        self.submit(Command::Refresh)
    }

    /// Insert a new item titled `title` and append the stored row.
    pub fn create(&self, title: impl Into<String>) -> Reply<Item> {
        let title = title.into();
        self.submit(|reply| Command::Create(title, reply))
    }

    /// Delete `item` from the store, then reload the list.
    pub fn delete(&self, item: &Item) -> Reply<()> {
        match item.id {
            Some(id) => self.submit(|reply| Command::Delete(id, reply)),
            None => self.submit(|reply| {
                Command::Reject("delete", StoreError::MissingId, reply)
            }),
        }
    }

    /// Overwrite the stored row with `item`'s fields.
    ///
    /// The in-memory list is not patched; the change shows up on the next
    /// full load.
    pub fn update(&self, item: &Item) -> Reply<()> {
        match item.id {
            Some(id) => {
                let item = item.clone();
                self.submit(|reply| Command::Update(id, item, reply))
            }
            None => self.submit(|reply| {
                Command::Reject("update", StoreError::MissingId, reply)
            }),
        }
    }

    /// Show only items whose title contains `term`, ignoring case. An empty
    /// term is a full `refresh`.
    pub fn filter(&self, term: impl Into<String>) -> Reply<()> {
        let term = term.into();
        if term.is_empty() {
            return self.refresh();
        }
        self.submit(|reply| Command::Filter(term, reply))
    }

    pub fn view(&self) -> ListView {
        self.view.borrow().clone()
    }

    pub fn items(&self) -> Vec<Item> {
        self.view.borrow().items.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.view.borrow().busy
    }

    /// A receiver that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<ListView> {
        self.view.clone()
    }

    /// True once the coordinator task has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn submit<T>(&self, command: impl FnOnce(Responder<T>) -> Command) -> Reply<T> {
        let (tx, rx) = oneshot::channel();
        match self.commands.send(command(tx)) {
            Ok(()) => Reply::pending(rx),
            Err(_) => Reply::failed(StoreError::Closed),
        }
    }
}

/// Outcome of a queued command.
///
/// Resolves once the coordinator has applied the command. Dropping it does
/// not cancel the command.
#[must_use = "the command runs either way; await the reply to observe its outcome"]
pub struct Reply<T> {
    state: ReplyState<T>,
}

enum ReplyState<T> {
    Pending(oneshot::Receiver<Result<T, StoreError>>),
    Failed(Option<StoreError>),
}

impl<T> Reply<T> {
    fn pending(rx: oneshot::Receiver<Result<T, StoreError>>) -> Self {
        Self {
            state: ReplyState::Pending(rx),
        }
    }

    fn failed(err: StoreError) -> Self {
        warn!(error = %err, "command rejected");
        Self {
            state: ReplyState::Failed(Some(err)),
        }
    }
}

impl<T> Future for Reply<T> {
    type Output = Result<T, StoreError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            ReplyState::Pending(rx) => Pin::new(rx)
                .poll(cx)
                .map(|received| received.unwrap_or(Err(StoreError::Closed))),
            ReplyState::Failed(err) => Poll::Ready(Err(err.take().unwrap_or(StoreError::Closed))),
        }
    }
}

async fn run<S: RemoteStore>(
    store: S,
    mut commands: mpsc::UnboundedReceiver<Command>,
    view: watch::Sender<ListView>,
) {
    while let Some(command) = commands.recv().await {
        let name = command.name();
        debug!(command = name, "applying command");
        match command {
            Command::Refresh(reply) => {
                let result = refresh(&store, &view).await;
                respond(name, &view, reply, result);
            }
            Command::Create(title, reply) => {
                let result = store.insert(&Item::new(title)).await.map(|item| {
                    view.send_modify(|v| v.items.push(item.clone()));
                    item
                });
                respond(name, &view, reply, result);
            }
            Command::Delete(id, reply) => {
                let result = match store.delete(id).await {
                    Ok(()) => refresh(&store, &view).await,
                    Err(err) => Err(err),
                };
                respond(name, &view, reply, result);
            }
            Command::Update(id, item, reply) => {
                let result = store.update(id, &item).await;
                respond(name, &view, reply, result);
            }
            Command::Filter(term, reply) => {
                let result = store
                    .filter(&term, Order::IdAscending)
                    .await
                    .map(|items| view.send_modify(|v| v.items = items));
                respond(name, &view, reply, result);
            }
            Command::Reject(_, err, reply) => respond(name, &view, reply, Err(err)),
        }
    }
    debug!("coordinator stopped");
}

async fn refresh<S: RemoteStore>(store: &S, view: &watch::Sender<ListView>) -> Result<(), StoreError> {
    view.send_modify(|v| v.busy = true);
    match store.list(Order::IdAscending).await {
        Ok(items) => {
            view.send_modify(|v| {
                v.items = items;
                v.busy = false;
            });
            Ok(())
        }
        Err(err) => {
            view.send_modify(|v| v.busy = false);
            Err(err)
        }
    }
}

fn respond<T>(
    command: &'static str,
    view: &watch::Sender<ListView>,
    reply: Responder<T>,
    result: Result<T, StoreError>,
) {
    if let Err(err) = &result {
        warn!(command, error = %err, "store command failed");
        view.send_modify(|v| v.last_error = Some(err.to_string()));
    } else {
        view.send_if_modified(|v| v.last_error.take().is_some());
    }
    // The caller may have dropped its reply.
    let _ = reply.send(result);
}
