use std::env;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use anyhow::anyhow;
use linux_embedded_hal::{Delay, I2cdev};

use imx415::{Config, Control, Imx415, PowerError, SensorResources};

/// For boards where the clock, supply rails, and reset line are strapped on
/// permanently, the resource seam has nothing to do.
struct AlwaysOn;

impl SensorResources for AlwaysOn {
    fn enable_clock(&mut self) -> Result<(), PowerError> {
        Ok(())
    }

    fn disable_clock(&mut self) {}

    fn enable_regulators(&mut self) -> Result<(), PowerError> {
        Ok(())
    }

    fn disable_regulators(&mut self) {}

    fn assert_reset(&mut self) {}

    fn deassert_reset(&mut self) {}
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        println!("Two arguments required: <I2C bus> <sensor address>");
        return Ok(());
    }
    let address: u8 = if args[2].starts_with("0x") {
        let hex_digits = args[2].split_at(2).1;
        u8::from_str_radix(hex_digits, 16)
            .expect("If the address starts with 0x, its a base-16 number")
    } else {
        args[2].parse().expect("The address to be an integer")
    };
    let bus_path = Path::new(&args[1]);
    let bus = I2cdev::new(bus_path).expect("The given path should work as an I2C device");

    let config = Config {
        data_lanes: 4,
        xclk_hz: 37_125_000,
    };
    let mut sensor =
        Imx415::new(bus, address, config, AlwaysOn, Delay).map_err(|e| anyhow!("{}", e))?;

    sensor.power_on().map_err(|e| anyhow!("power on: {}", e))?;
    let format = sensor.format();
    println!(
        "sensor up: {}x{} ({:?}), pixel rate {} px/s, link {} Hz",
        format.width,
        format.height,
        format.code,
        sensor.pixel_rate(),
        sensor.link_frequency(),
    );
    println!(
        "exposure range: {:?}, vblank range: {:?}, hblank: {}",
        sensor.exposure_range(),
        sensor.vblank_range(),
        sensor.horizontal_blank(),
    );

    sensor
        .start_streaming()
        .map_err(|e| anyhow!("start streaming: {}", e))?;

    // Push an exposure/gain pair onto the same frame boundary.
    sensor
        .with_group_hold(|s| {
            s.apply(Control::Exposure(0x400))?;
            s.apply(Control::AnalogGain(0x30))
        })
        .map_err(|e| anyhow!("apply controls: {}", e))?;

    sleep(Duration::from_secs(2));

    sensor
        .stop_streaming()
        .map_err(|e| anyhow!("stop streaming: {}", e))?;
    sensor.shutdown();
    Ok(())
}
