//! Event listeners and one-way readiness signals.

#![doc(
    html_logo_url = "https://raw.githubusercontent.com/blockmesh/blockmesh/main/assets/blockmesh-docs.png",
    issue_tracker_base_url = "https://github.com/blockmesh/blockmesh/issues/"
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod event_sender;
mod event_stream;
mod ready;

pub use event_sender::EventSender;
pub use event_stream::EventStream;
pub use ready::{ReadyListener, Readiness};
