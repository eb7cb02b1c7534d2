//! The radio-bus wire protocol (spec §6): message set, text codec,
//! chunk reassembly, and the UDP transport standing in for the radio
//! hardware.

pub mod codec;
pub mod errors;
pub mod message;
pub mod reassembler;
pub mod transport;

pub use codec::Chunk;
pub use errors::{ReadingError, WritingError};
pub use message::{DroneOp, DroneSlotListing, ItemListing, Message, RecipeListing, RecipeProgress};
pub use reassembler::Reassembler;
pub use transport::BusSocket;
