//! Chat bot surface for RSVP events
//!
//! - **Commands** (`commands`) - `rsvp init`, `rsvp yes`, `rsvp set date ...` parsing
//! - **Execution** (`executor`) - what each command does to the event mapping
//! - **Routing** (`router`) - line splitting, dispatch and a commit per successful command
//! - **Events** (`events`) - message and user-directory handlers over the chat event queue
//! - **Runner** (`runner`) - transport loop with reconnection logic
//!
//! ```text
//! ChatTransport → BotRunner → EventDispatcher → Router → Executor → EventStore
//!                     ↑                            ↓
//!                     └──────── OutboundMessage ←──┘
//! ```

pub mod commands;
pub mod events;
pub mod executor;
pub mod messages;
pub mod router;
pub mod runner;
pub mod texts;

pub use commands::{Command, CommandError, CommandKind, CommandRegistry};
pub use events::{
    default_dispatcher, ChatEvent, DispatchError, EventContext, EventDispatcher, HandlerResult,
};
pub use messages::{InboundMessage, MessageKind, OutboundMessage, Reply};
pub use router::{Router, RouterError, RouterSettings};
pub use runner::{BotRunner, ChatTransport, ReconnectPolicy, RunnerError, TransportError};
