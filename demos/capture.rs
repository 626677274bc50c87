use std::env;
use std::time::{Duration, Instant};

use webcam::{Device, FourCC, Readiness};

fn main() -> webcam::Result<()> {
    env_logger::init();

    let path = env::args().nth(1).unwrap_or_else(|| "/dev/video0".to_string());
    println!("Using device: {}\n", path);

    // Capture 4 frames by default
    let count = 4;

    let mut dev = Device::with_path(&path)?;
    println!("{}", dev.capabilities());

    println!("Formats:");
    for desc in dev.formats() {
        let desc = desc?;
        print!("  {} ({}):", desc.fourcc, desc.description);
        for size in dev.framesizes(desc.fourcc) {
            print!(" {}", size?);
        }
        println!();
    }

    let format = dev.set_format(FourCC::YUYV, 640, 480)?;
    println!("\nActive format:\n{}", format);

    if let Err(e) = dev.set_framerate(30.0) {
        println!("Cannot set framerate: {}", e);
    }
    match dev.framerate() {
        Ok(fps) => println!("Framerate: {} fps\n", fps),
        Err(e) => println!("Framerate unknown: {}\n", e),
    }

    dev.set_buffer_count(4)?;
    dev.start_streaming()?;
    println!("Streaming with {} buffers\n", dev.buffers());

    let start = Instant::now();
    let mut captured = 0;
    while captured < count {
        if dev.wait_for_frame(Duration::from_secs(2))? == Readiness::TimedOut {
            println!("No frame within 2s, waiting again");
            continue;
        }

        let (buf, index) = dev.get_frame()?;
        let len = buf.len();
        let meta = dev.frame_metadata(index)?;
        println!("Buffer");
        println!("  index     : {}", index);
        println!("  sequence  : {}", meta.sequence);
        println!("  timestamp : {}", meta.timestamp);
        println!("  flags     : {}", meta.flags);
        println!("  length    : {}", len);
        dev.release_frame(index)?;
        captured += 1;
    }

    println!();
    println!("FPS: {}", count as f64 / start.elapsed().as_secs_f64());

    dev.close()
}
