//! WebSocket Live Push
//!
//! Pushes value changes to dashboard clients as they are detected.
//!
//! ## Architecture
//!
//! - **Handler**: Handles WebSocket upgrade and registers hub listeners per connection
//! - **Messages**: Defines client and server message formats
//!
//! ## Usage
//!
//! Clients connect to `/ws` and are subscribed to both metrics right away.
//! They can narrow or widen that with `subscribe`/`unsubscribe` messages.
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:3000/ws');
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   if (msg.type === 'new-temperature') {
//!     console.log('Temperature:', msg.value);
//!   }
//! };
//! ```

mod handler;
mod messages;

pub use handler::{websocket_handler, ConnectionSubscriptions};
pub use messages::{ClientMessage, ServerMessage};
