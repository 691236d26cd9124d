//! Protocol module containing the kind namespace, wire primitives, and the codec.

pub mod channel;
pub mod codec;
pub mod kind;
pub mod wire;

pub use channel::{Channel, MemoryChannel};
pub use codec::{decode_command, encode_command, encode_frame, ProtocolError, WireCodec};
pub use kind::{CommandKind, Direction};
pub use wire::{WireReader, WireWriter};
