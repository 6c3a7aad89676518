extern crate robomaster_can_engine;
extern crate log;
extern crate env_logger;

use std::thread;
use std::time::Duration;

use robomaster_can_engine::{EngineConfig, RoboMaster, SocketCanTransport};

fn main() {
    env_logger::init();

    let transport = SocketCanTransport::open("can0").unwrap();
    let robot = RoboMaster::new(transport, EngineConfig::default());

    robot.set_callback(|state| {
        log::debug!("battery {}%", state.battery.percent);
    });

    robot.init().unwrap();
    robot.set_work_mode(true);
    robot.set_velocity(0.5, 0.0, 0.0);

    thread::sleep(Duration::from_secs(2));

    robot.set_brake();
    robot.stop();
}
