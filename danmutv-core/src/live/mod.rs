//! Live-broadcast chat protocol client.
//!
//! One [`session::LiveSession`] per room: it resolves the gateway, opens a
//! websocket, authenticates, then runs a receive loop and a heartbeat loop
//! until closed. Inbound frames pass through the codec, the decompression
//! pipeline and the event classifier before reaching the subscriber.

pub mod event;
pub mod frame;
pub mod gateway;
pub mod normalize;
pub mod session;
pub mod transport;
pub mod unpack;

pub use event::LiveEvent;
pub use frame::{encode_frame, FrameHeader};
pub use gateway::{GatewayError, GatewayHost, GatewayInfo, GatewayResolver, HttpGatewayResolver};
pub use session::{LiveSession, SessionConfig, SessionError, SessionNotice, SessionState};
pub use transport::{Connector, TransportError, TransportRx, TransportTx, WsConnector};
pub use unpack::{unpack, SubFrame, UnpackError};
