//! Telemetry sub-records and the fixed-offset decoder that builds them from
//! the motion controller's `0x0903` state payload.
//!
//! Offsets and field layouts are grounded in `original_source/src/data.cpp`.
//! A sub-record whose fixed window falls outside the payload is returned
//! zeroed with `has_data = false` rather than as an error: a short payload
//! is a normal transient condition during startup, not a protocol fault.

use crate::codec::{get_f32, get_i16, get_u16, get_u32, get_i32};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DataVelocity {
    pub vgx: f32,
    pub vgy: f32,
    pub vgz: f32,
    pub vbx: f32,
    pub vby: f32,
    pub vbz: f32,
    pub has_data: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DataBattery {
    pub adc_value: u16,
    pub temperature: u16,
    pub current: i32,
    pub percent: u8,
    pub recv: u8,
    pub has_data: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataEsc {
    pub speed: [i16; 4],
    pub angle: [i16; 4],
    pub time_stamp: [u32; 4],
    pub state: [u8; 4],
    pub has_data: bool,
}

impl Default for DataEsc {
    fn default() -> DataEsc {
        DataEsc {
            speed: [0; 4],
            angle: [0; 4],
            time_stamp: [0; 4],
            state: [0; 4],
            has_data: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DataImu {
    pub acc_x: f32,
    pub acc_y: f32,
    pub acc_z: f32,
    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,
    pub has_data: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DataAttitude {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    pub has_data: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DataPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub has_data: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RoboMasterState {
    pub velocity: DataVelocity,
    pub battery: DataBattery,
    pub esc: DataEsc,
    pub imu: DataImu,
    pub attitude: DataAttitude,
    pub position: DataPosition,
}

const VELOCITY_OFFSET: usize = 27;
const VELOCITY_LEN: usize = 24;
const BATTERY_OFFSET: usize = 51;
const BATTERY_LEN: usize = 10;
const ESC_OFFSET: usize = 61;
const ESC_LEN: usize = 36;
const IMU_OFFSET: usize = 97;
const IMU_LEN: usize = 24;
const ATTITUDE_OFFSET: usize = 121;
const ATTITUDE_LEN: usize = 12;
const POSITION_OFFSET: usize = 133;
const POSITION_LEN: usize = 12;

fn decode_velocity(payload: &[u8]) -> DataVelocity {
    if payload.len() < VELOCITY_OFFSET + VELOCITY_LEN {
        return DataVelocity::default();
    }
    let b = VELOCITY_OFFSET;
    DataVelocity {
        vgx: get_f32(payload, b),
        vgy: get_f32(payload, b + 4),
        vgz: get_f32(payload, b + 8),
        vbx: get_f32(payload, b + 12),
        vby: get_f32(payload, b + 16),
        vbz: get_f32(payload, b + 20),
        has_data: true,
    }
}

fn decode_battery(payload: &[u8]) -> DataBattery {
    if payload.len() < BATTERY_OFFSET + BATTERY_LEN {
        return DataBattery::default();
    }
    let b = BATTERY_OFFSET;
    DataBattery {
        adc_value: get_u16(payload, b),
        temperature: get_u16(payload, b + 2),
        current: get_i32(payload, b + 4),
        percent: payload[b + 8],
        recv: payload[b + 9],
        has_data: true,
    }
}

fn decode_esc(payload: &[u8]) -> DataEsc {
    if payload.len() < ESC_OFFSET + ESC_LEN {
        return DataEsc::default();
    }
    let b = ESC_OFFSET;
    let mut esc = DataEsc::default();
    for i in 0..4 {
        esc.speed[i] = get_i16(payload, b + i * 2);
    }
    for i in 0..4 {
        esc.angle[i] = get_i16(payload, b + 8 + i * 2);
    }
    for i in 0..4 {
        esc.time_stamp[i] = get_u32(payload, b + 16 + i * 4);
    }
    for i in 0..4 {
        esc.state[i] = payload[b + 32 + i];
    }
    esc.has_data = true;
    esc
}

fn decode_imu(payload: &[u8]) -> DataImu {
    if payload.len() < IMU_OFFSET + IMU_LEN {
        return DataImu::default();
    }
    let b = IMU_OFFSET;
    DataImu {
        acc_x: get_f32(payload, b),
        acc_y: get_f32(payload, b + 4),
        acc_z: get_f32(payload, b + 8),
        gyro_x: get_f32(payload, b + 12),
        gyro_y: get_f32(payload, b + 16),
        gyro_z: get_f32(payload, b + 20),
        has_data: true,
    }
}

fn decode_attitude(payload: &[u8]) -> DataAttitude {
    if payload.len() < ATTITUDE_OFFSET + ATTITUDE_LEN {
        return DataAttitude::default();
    }
    let b = ATTITUDE_OFFSET;
    DataAttitude {
        yaw: get_f32(payload, b),
        pitch: get_f32(payload, b + 4),
        roll: get_f32(payload, b + 8),
        has_data: true,
    }
}

fn decode_position(payload: &[u8]) -> DataPosition {
    if payload.len() < POSITION_OFFSET + POSITION_LEN {
        return DataPosition::default();
    }
    let b = POSITION_OFFSET;
    DataPosition {
        x: get_f32(payload, b),
        y: get_f32(payload, b + 4),
        z: get_f32(payload, b + 8),
        has_data: true,
    }
}

/// Decode a full `RoboMasterState` out of the motion controller's `0x0903`
/// telemetry payload. Each sub-record decodes independently: a payload too
/// short for, say, position still yields valid velocity/battery/esc data.
pub fn decode_state(payload: &[u8]) -> RoboMasterState {
    RoboMasterState {
        velocity: decode_velocity(payload),
        battery: decode_battery(payload),
        esc: decode_esc(payload),
        imu: decode_imu(payload),
        attitude: decode_attitude(payload),
        position: decode_position(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_of_len(len: usize) -> Vec<u8> {
        vec![0u8; len]
    }

    #[test]
    fn truncated_payload_yields_zeroed_unset_records() {
        let state = decode_state(&payload_of_len(10));
        assert!(!state.velocity.has_data);
        assert!(!state.battery.has_data);
        assert!(!state.esc.has_data);
        assert!(!state.imu.has_data);
        assert!(!state.attitude.has_data);
        assert!(!state.position.has_data);
        assert_eq!(state.velocity.vgx, 0.0);
    }

    #[test]
    fn full_payload_decodes_every_sub_record() {
        let mut payload = payload_of_len(POSITION_OFFSET + POSITION_LEN);
        // battery.percent lives at offset 59.
        payload[BATTERY_OFFSET + 8] = 77;
        let state = decode_state(&payload);
        assert!(state.velocity.has_data);
        assert!(state.battery.has_data);
        assert!(state.esc.has_data);
        assert!(state.imu.has_data);
        assert!(state.attitude.has_data);
        assert!(state.position.has_data);
        assert_eq!(state.battery.percent, 77);
    }

    #[test]
    fn partial_payload_decodes_only_fields_that_fit() {
        // Long enough for velocity and battery, short of esc.
        let payload = payload_of_len(ESC_OFFSET);
        let state = decode_state(&payload);
        assert!(state.velocity.has_data);
        assert!(state.battery.has_data);
        assert!(!state.esc.has_data);
    }
}
