//! Async driver for a [`Navigator`]
//!
//! [`NavigatorService`] owns the navigator on a single task and wakes up for
//! commands, host events, animation frames and the navigator's own timer
//! deadlines. Everything else talks to it through a cloneable
//! [`NavigatorHandle`] and observes state through a `watch` channel.

use std::future;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::host::{Host, HostEvent};
use crate::navigator::{NavigationSnapshot, Navigator};
use crate::scroll::ScrollFlagReader;
use crate::section::{ElementRef, SectionId};
use crate::{Error, Result};

/// Requests sent from a [`NavigatorHandle`] to the service
#[derive(Debug)]
pub enum NavCommand {
    Register {
        id: SectionId,
        element: ElementRef,
        order: i32,
        reply: oneshot::Sender<Result<()>>,
    },
    Unregister {
        id: SectionId,
        reply: oneshot::Sender<bool>,
    },
    Navigate {
        id: SectionId,
        reply: oneshot::Sender<Result<()>>,
    },
    Next {
        reply: oneshot::Sender<Option<SectionId>>,
    },
    Previous {
        reply: oneshot::Sender<Option<SectionId>>,
    },
    UpdateHash {
        id: SectionId,
        add_to_history: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Resolves once every earlier command has been applied and published
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Clone)]
pub struct NavigatorHandle {
    commands: mpsc::UnboundedSender<NavCommand>,
    snapshot: watch::Receiver<NavigationSnapshot>,
    flag: ScrollFlagReader,
}

impl NavigatorHandle {
    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> NavCommand) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .map_err(|_| Error::ServiceStopped)?;
        rx.await.map_err(|_| Error::ServiceStopped)
    }

    pub async fn register_section(&self, id: SectionId, element: ElementRef, order: i32) -> Result<()> {
        self.request(|reply| NavCommand::Register {
            id,
            element,
            order,
            reply,
        })
        .await?
    }

    pub async fn unregister_section(&self, id: SectionId) -> Result<bool> {
        self.request(|reply| NavCommand::Unregister { id, reply }).await
    }

    pub async fn navigate_to_section(&self, id: SectionId) -> Result<()> {
        self.request(|reply| NavCommand::Navigate { id, reply }).await?
    }

    pub async fn navigate_next(&self) -> Result<Option<SectionId>> {
        self.request(|reply| NavCommand::Next { reply }).await
    }

    pub async fn navigate_previous(&self) -> Result<Option<SectionId>> {
        self.request(|reply| NavCommand::Previous { reply }).await
    }

    pub async fn update_hash(&self, id: SectionId, add_to_history: bool) -> Result<()> {
        self.request(|reply| NavCommand::UpdateHash {
            id,
            add_to_history,
            reply,
        })
        .await?
    }

    pub async fn flush(&self) -> Result<()> {
        self.request(NavCommand::Flush).await
    }

    /// Latest published state
    pub fn snapshot(&self) -> NavigationSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn current_section(&self) -> Option<SectionId> {
        self.snapshot.borrow().current_section.clone()
    }

    pub fn previous_section(&self) -> Option<SectionId> {
        self.snapshot.borrow().previous_section.clone()
    }

    pub fn next_section(&self) -> Option<SectionId> {
        self.snapshot.borrow().next_section.clone()
    }

    pub fn sections(&self) -> Vec<SectionId> {
        self.snapshot.borrow().sections.clone()
    }

    /// Read straight from the flag, not the last snapshot
    pub fn is_programmatic_scroll(&self) -> bool {
        self.flag.is_set()
    }

    /// Wait for the next published change
    pub async fn changed(&mut self) -> Result<NavigationSnapshot> {
        self.snapshot
            .changed()
            .await
            .map_err(|_| Error::ServiceStopped)?;
        Ok(self.snapshot.borrow_and_update().clone())
    }
}

pub struct NavigatorService<H: Host> {
    navigator: Navigator<H>,
    frame_interval: Duration,
    commands: mpsc::UnboundedReceiver<NavCommand>,
    host_events: Option<mpsc::UnboundedReceiver<HostEvent>>,
    snapshot_tx: watch::Sender<NavigationSnapshot>,
}

impl<H: Host> NavigatorService<H> {
    pub fn new(navigator: Navigator<H>, frame_interval: Duration) -> (Self, NavigatorHandle) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(navigator.snapshot());
        let handle = NavigatorHandle {
            commands: command_tx,
            snapshot: snapshot_rx,
            flag: navigator.scroll_flag(),
        };

        let service = Self {
            navigator,
            frame_interval,
            commands,
            host_events: None,
            snapshot_tx,
        };
        (service, handle)
    }

    /// Feed host notifications from a channel (hosts that push instead of batching per frame)
    pub fn with_host_events(mut self, rx: mpsc::UnboundedReceiver<HostEvent>) -> Self {
        self.host_events = Some(rx);
        self
    }

    /// Drive the navigator until shutdown; returns it unmounted
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Navigator<H> {
        self.navigator.mount(Instant::now());
        self.publish();

        let mut frames = time::interval(self.frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Skip the first tick (fires immediately)
        frames.tick().await;

        info!(
            frame_ms = self.frame_interval.as_millis() as u64,
            "Navigator service started"
        );

        loop {
            let deadline = self.navigator.next_deadline();

            tokio::select! {
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        info!("Navigator service received shutdown signal");
                        break;
                    }
                }

                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("All navigator handles dropped");
                        break;
                    };
                    self.apply(command);
                }

                Some(event) = next_host_event(&mut self.host_events) => {
                    self.navigator.handle_event(event, Instant::now());
                }

                _ = frames.tick() => {
                    self.navigator.on_animation_frame(Instant::now());
                }

                _ = sleep_until(deadline) => {}
            }

            self.navigator.poll(Instant::now());
            self.publish();
        }

        self.navigator.unmount();
        self.publish();
        info!("Navigator service stopped");
        self.navigator
    }

    fn apply(&mut self, command: NavCommand) {
        let now = Instant::now();
        match command {
            NavCommand::Register {
                id,
                element,
                order,
                reply,
            } => {
                let result = self.navigator.register_section(id, element, order, now);
                if let Err(ref e) = result {
                    warn!(error = %e, "Section registration rejected");
                }
                let _ = reply.send(result);
            }
            NavCommand::Unregister { id, reply } => {
                let _ = reply.send(self.navigator.unregister_section(&id, now));
            }
            NavCommand::Navigate { id, reply } => {
                let _ = reply.send(self.navigator.navigate_to_section(id, now));
            }
            NavCommand::Next { reply } => {
                let _ = reply.send(self.navigator.navigate_next(now));
            }
            NavCommand::Previous { reply } => {
                let _ = reply.send(self.navigator.navigate_previous(now));
            }
            NavCommand::UpdateHash {
                id,
                add_to_history,
                reply,
            } => {
                let _ = reply.send(self.navigator.update_hash(id, add_to_history, now));
            }
            NavCommand::Flush(done) => {
                self.navigator.poll(now);
                self.publish();
                let _ = done.send(());
            }
        }
    }

    fn publish(&self) {
        let snapshot = self.navigator.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }
}

async fn next_host_event(rx: &mut Option<mpsc::UnboundedReceiver<HostEvent>>) -> Option<HostEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}
