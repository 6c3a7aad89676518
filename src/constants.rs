//! Kernel-level and protocol-level constants.
//!
//! The `CAN_*`/`SOL_*`/`SIOCGSTAMP` constants mirror the values exposed by
//! `<linux/can.h>` and `<linux/can/raw.h>`; the `DEVICE_*`/`LED_MASK_*`
//! constants are RoboMaster protocol addresses reproduced from the vendor
//! controller firmware.

// Protocol of the PF_CAN family: raw sockets.
pub const CAN_RAW: libc::c_int = 1;

pub const SOL_CAN_BASE: libc::c_int = 100;
pub const SOL_CAN_RAW: libc::c_int = SOL_CAN_BASE + CAN_RAW;
pub const CAN_RAW_FILTER: libc::c_int = 1;
pub const CAN_RAW_ERR_FILTER: libc::c_int = 2;
pub const CAN_RAW_LOOPBACK: libc::c_int = 3;
pub const CAN_RAW_RECV_OWN_MSGS: libc::c_int = 4;
pub const CAN_RAW_JOIN_FILTERS: libc::c_int = 6;

/// ioctl to get the socket timestamp in a `struct timespec` (ns accuracy).
pub const SIOCGSTAMP: libc::c_int = 0x8906;

/// Special address description flags set in the MSB of the CAN ID.
pub const EFF_FLAG: u32 = 0x8000_0000;
/// Remote transmission request.
pub const RTR_FLAG: u32 = 0x4000_0000;
/// Error message frame.
pub const ERR_FLAG: u32 = 0x2000_0000;

/// Valid bits in a standard frame format (SFF) CAN ID.
pub const SFF_MASK: u32 = 0x0000_07ff;
/// Valid bits in an extended frame format (EFF) CAN ID.
pub const EFF_MASK: u32 = 0x1fff_ffff;
/// Valid bits in an error frame.
pub const ERR_MASK: u32 = 0x1fff_ffff;

/// Intelligent controller: the host's own device id on the bus.
pub const DEVICE_INTELLI_CONTROLLER: u32 = 0x201;
/// Motion controller: the chassis MCU.
pub const DEVICE_MOTION_CONTROLLER: u32 = 0x202;
/// Gimbal controller.
pub const DEVICE_GIMBAL: u32 = 0x203;
/// Hit detector modules, four in total.
pub const DEVICE_HIT_DETECTOR_1: u32 = 0x211;
pub const DEVICE_HIT_DETECTOR_2: u32 = 0x212;
pub const DEVICE_HIT_DETECTOR_3: u32 = 0x213;
pub const DEVICE_HIT_DETECTOR_4: u32 = 0x214;

/// LED masks, combinable with `|`.
pub const LED_MASK_ALL: u16 = 0x000f;
pub const LED_MASK_BACK: u16 = 0x0001;
pub const LED_MASK_FRONT: u16 = 0x0002;
pub const LED_MASK_LEFT: u16 = 0x0004;
pub const LED_MASK_RIGHT: u16 = 0x0008;

/// Framed-packet sync byte, always the first byte of a header.
pub const SYNC_BYTE: u8 = 0x55;
/// Protocol constant occupying header byte 2.
pub const PROTOCOL_VERSION: u8 = 0x04;
/// Header + CRC16 trailer overhead added to every payload.
pub const FRAME_OVERHEAD: usize = 10;
/// Length of the sync/len/version/crc8 header, the prefix validated before
/// a packet's declared length is trusted.
pub const HEADER_LEN: usize = 4;
