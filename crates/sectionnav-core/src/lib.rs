pub mod config;
pub mod error;
pub mod event;
pub mod hash;
pub mod host;
pub mod navigator;
pub mod observer;
pub mod runtime;
pub mod scroll;
pub mod section;
pub mod sync;
pub mod timer;
pub mod visibility;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{EasingType, NavConfig, ScrollConfig};
pub use error::{Error, Result};
pub use event::NavigationEvent;
pub use host::{HistoryMode, Host, HostEvent, IntersectionEntry, ObserverOptions, Rect, ScrollBehavior};
pub use navigator::{NavigationSnapshot, Navigator};
pub use runtime::{NavigatorHandle, NavigatorService};
pub use section::{ElementRef, SectionId};
pub use visibility::RootMargin;
