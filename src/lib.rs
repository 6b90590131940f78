//! Collaborative sketch editor core.
//!
//! Several peers edit a shared canvas of shapes. Each peer keeps its
//! own [`SharedSketch`] replica, encodes local edits as single text
//! lines ([`wire`]), and sends them through a dumb broadcast [`Relay`];
//! every other peer decodes and replays the lines in arrival order.
//! The GUI and pixel rendering live outside this crate, behind
//! [`DrawSurface`] and the [`PeerSession`] API.

pub mod relay;
pub mod session;
pub mod shapes;
pub mod sketch;
pub mod wire;

pub use relay::Relay;
pub use session::PeerSession;
pub use shapes::{DrawSurface, Point, Rgb, Shape};
pub use sketch::{ShapeId, SharedSketch, SketchError};
pub use wire::{Operation, WireError, decode, encode};
