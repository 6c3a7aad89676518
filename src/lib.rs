//! A host-side driver for the RoboMaster chassis control protocol over
//! Linux SocketCAN.
//!
//! The Linux kernel exposes CAN buses as network-like devices (see
//! https://www.kernel.org/doc/Documentation/networking/can.txt); this crate
//! opens one such device, keeps a control session alive with a periodic
//! heartbeat, fragments and reassembles framed packets across 8-byte CAN
//! frames with CRC8/CRC16 validation, serializes chassis/gimbal/LED/blaster
//! commands in the protocol's exact byte layout, and decodes the motion
//! controller's telemetry packet into a [`state::RoboMasterState`] delivered
//! to an application callback.
//!
//! [`facade::RoboMaster`] is the entry point for most callers; [`engine::Engine`]
//! and [`transport::CanTransport`] are exposed for callers who need to drive
//! the protocol engine directly, or substitute their own transport.
//!
//! # RawFd
//!
//! Raw access to the underlying CAN socket file descriptor is available
//! through the `AsRawFd`, `IntoRawFd` and `FromRawFd` implementations on
//! [`socket::CanSocket`].

extern crate libc;
extern crate nix;

mod constants;
pub mod errors;
pub mod util;
pub mod frame;
pub mod filter;
pub mod socket;

pub mod codec;
pub mod packet;
pub mod queue;
pub mod config;
pub mod state;
pub mod transport;
pub mod engine;
pub mod facade;

pub use errors::{
    CanError, CanErrorDecodingFailure, CanSocketOpenError, ConstructionError, Error, Result,
};
pub use frame::CanFrame;
pub use filter::CanFilter;
pub use socket::CanSocket;

pub use config::EngineConfig;
pub use engine::Engine;
pub use facade::{BlasterKind, RoboMaster};
pub use packet::Packet;
pub use state::{
    DataAttitude, DataBattery, DataEsc, DataImu, DataPosition, DataVelocity, RoboMasterState,
};
pub use transport::{CanTransport, SocketCanTransport};
