extern crate robomaster_can_engine;

use robomaster_can_engine::{CanFrame, CanSocket};

fn main() {
    let bus = CanSocket::open("can0").unwrap();

    let data: [u8; 4] = [222, 173, 190, 239];
    let id: u32 = 123;
    let frame = CanFrame::new(id, &data, false, false).unwrap();
    match bus.write(&frame) {
        Ok(()) => println!("Frame send success"),
        Err(e) => println!("Frame send error {}", e),
    }
}
