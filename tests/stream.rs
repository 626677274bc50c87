mod common;

use std::time::Duration;

use common::FakeDriver;
use webcam::buffer::{Flags, State};
use webcam::v4l2::videodev::V4L2_BUF_TYPE_VIDEO_CAPTURE as CAPTURE;
use webcam::{Device, Error, Readiness, StreamState, DEFAULT_BUFFER_COUNT};

fn streaming_device(driver: &FakeDriver, count: u32) -> Device<FakeDriver> {
    common::init_logging();
    let mut dev = Device::from_handle(driver.clone()).unwrap();
    dev.set_buffer_count(count).unwrap();
    dev.start_streaming().unwrap();
    dev
}

#[test]
fn start_queues_every_granted_buffer() {
    let driver = FakeDriver::capture();
    let mut dev = Device::from_handle(driver.clone()).unwrap();
    assert_eq!(dev.buffer_count(), DEFAULT_BUFFER_COUNT);
    assert_eq!(dev.state(), StreamState::Idle);

    dev.start_streaming().unwrap();
    assert!(dev.is_streaming());
    // the driver clamps the request
    assert_eq!(dev.buffers(), 4);
    assert_eq!(driver.queued_count(CAPTURE), 4);
    assert_eq!(driver.events("REQBUFS"), vec!["REQBUFS 1 4"]);
    assert_eq!(driver.events("STREAMON"), vec!["STREAMON 1"]);
}

#[test]
fn frames_carry_payload_and_metadata() {
    let driver = FakeDriver::capture();
    let mut dev = streaming_device(&driver, 3);

    assert_eq!(
        dev.wait_for_frame(Duration::from_secs(1)).unwrap(),
        Readiness::Ready
    );
    let (frame, index) = dev.get_frame().unwrap();
    assert_eq!(frame.len(), 1000);
    assert!(frame.iter().all(|&b| b == 0));
    assert_eq!(index, 0);

    let meta = dev.frame_metadata(index).unwrap();
    assert_eq!(meta.bytesused, 1000);
    assert_eq!(meta.sequence, 0);
    assert!(meta.flags.contains(Flags::DONE));
    assert_eq!((meta.timestamp.sec, meta.timestamp.usec), (0, 500));
    dev.release_frame(index).unwrap();

    let frame = dev.read_frame().unwrap();
    assert_eq!(frame.len(), 1000);
    assert!(frame.iter().all(|&b| b == 1));
    assert_eq!(driver.queued_count(CAPTURE), 3);
}

#[test]
fn held_buffers_stay_with_the_consumer() {
    let driver = FakeDriver::capture();
    let mut dev = streaming_device(&driver, 3);

    let (_, first) = dev.get_frame().unwrap();
    assert_eq!(driver.queued_count(CAPTURE), 2);
    assert_eq!(dev.frame(first).unwrap().len(), 1000);

    let (_, second) = dev.get_frame().unwrap();
    assert_ne!(first, second);
    let (_, third) = dev.get_frame().unwrap();
    assert_eq!(driver.queued_count(CAPTURE), 0);

    // nothing left to dequeue until a frame is released
    let err = dev.get_frame().unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EAGAIN));

    dev.release_frame(second).unwrap();
    assert_eq!(driver.queued_count(CAPTURE), 1);
    let (_, next) = dev.get_frame().unwrap();
    assert_eq!(next, second);

    // the first frame is still readable while its neighbours circulate
    assert_eq!(dev.frame(first).unwrap().len(), 1000);
    dev.release_frame(first).unwrap();
    dev.release_frame(third).unwrap();
    assert_eq!(driver.queued_count(CAPTURE), 2);
}

#[test]
fn releasing_twice_is_refused() {
    let driver = FakeDriver::capture();
    let mut dev = streaming_device(&driver, 2);

    let (_, index) = dev.get_frame().unwrap();
    dev.release_frame(index).unwrap();
    match dev.release_frame(index) {
        Err(Error::BufferState { index: i, state }) => {
            assert_eq!(i, index);
            assert_eq!(state, State::Queued);
        }
        other => panic!("expected BufferState, got {:?}", other),
    }
    assert!(matches!(dev.frame(index), Err(Error::BufferState { .. })));
    assert!(matches!(dev.release_frame(7), Err(Error::BufferIndex(7))));
    assert_eq!(driver.events("QBUF").len(), 3);
}

#[test]
fn state_machine_rejects_illegal_transitions() {
    let driver = FakeDriver::capture();
    let mut dev = Device::from_handle(driver.clone()).unwrap();

    assert!(matches!(dev.stop_streaming(), Err(Error::NotStreaming)));
    assert!(matches!(dev.get_frame(), Err(Error::NotStreaming)));

    dev.start_streaming().unwrap();
    assert!(matches!(dev.start_streaming(), Err(Error::AlreadyStreaming)));
    assert!(matches!(dev.set_buffer_count(2), Err(Error::AlreadyStreaming)));
    assert!(matches!(dev.prepare_buffers(), Err(Error::AlreadyStreaming)));
    assert!(dev.is_streaming());

    dev.stop_streaming().unwrap();
    assert_eq!(dev.state(), StreamState::Idle);
    assert_eq!(dev.buffers(), 0);
    assert_eq!(driver.live_mappings(), 0);
    assert!(matches!(dev.stop_streaming(), Err(Error::NotStreaming)));
}

#[test]
fn stop_turns_off_before_releasing() {
    let driver = FakeDriver::capture();
    let mut dev = streaming_device(&driver, 2);
    let (_, _held) = dev.get_frame().unwrap();

    dev.stop_streaming().unwrap();
    let log = driver.with(|s| s.log.clone());
    let off = log.iter().position(|e| e == "STREAMOFF 1").unwrap();
    let free = log.iter().position(|e| e == "REQBUFS 1 0").unwrap();
    assert!(off < free);
    assert_eq!(driver.with(|s| s.unmapped), 2);
}

#[test]
fn restart_requests_buffers_anew() {
    let driver = FakeDriver::capture();
    let mut dev = streaming_device(&driver, 2);
    dev.stop_streaming().unwrap();

    dev.set_buffer_count(3).unwrap();
    dev.start_streaming().unwrap();
    assert_eq!(
        driver.events("REQBUFS"),
        vec!["REQBUFS 1 2", "REQBUFS 1 0", "REQBUFS 1 3"]
    );
    assert_eq!(dev.buffers(), 3);
    assert_eq!(driver.live_mappings(), 3);
    dev.read_frame().unwrap();
}

#[test]
fn prepared_buffers_are_reused_on_start() {
    let driver = FakeDriver::capture();
    let mut dev = Device::from_handle(driver.clone()).unwrap();
    dev.set_buffer_count(2).unwrap();

    dev.prepare_buffers().unwrap();
    assert_eq!(dev.state(), StreamState::Configured);
    assert_eq!(driver.live_mappings(), 2);
    assert_eq!(driver.queued_count(CAPTURE), 0);

    dev.start_streaming().unwrap();
    assert_eq!(driver.events("REQBUFS").len(), 1);
    assert_eq!(driver.queued_count(CAPTURE), 2);
}

#[test]
fn changing_the_count_releases_prepared_buffers() {
    let driver = FakeDriver::capture();
    let mut dev = Device::from_handle(driver.clone()).unwrap();
    dev.set_buffer_count(4).unwrap();
    dev.prepare_buffers().unwrap();

    // same count, the pool stays
    dev.set_buffer_count(4).unwrap();
    assert_eq!(dev.state(), StreamState::Configured);
    assert_eq!(driver.live_mappings(), 4);

    dev.set_buffer_count(2).unwrap();
    assert_eq!(dev.state(), StreamState::Idle);
    assert_eq!(dev.buffer_count(), 2);
    assert_eq!(driver.live_mappings(), 0);

    dev.start_streaming().unwrap();
    assert_eq!(
        driver.events("REQBUFS"),
        vec!["REQBUFS 1 4", "REQBUFS 1 0", "REQBUFS 1 2"]
    );
    assert_eq!(dev.buffers(), 2);
    assert_eq!(driver.queued_count(CAPTURE), 2);
}

#[test]
fn unexpected_dequeue_keeps_the_buffer_in_circulation() {
    let driver = FakeDriver::capture();
    let mut dev = streaming_device(&driver, 3);
    let (_, index) = dev.get_frame().unwrap();
    assert_eq!(index, 0);

    // the driver hands out the buffer the consumer already holds
    driver.with(|s| s.dequeue_index = Some(0));
    match dev.get_frame() {
        Err(Error::BufferState { index, state }) => {
            assert_eq!(index, 0);
            assert_eq!(state, State::Held);
        }
        other => panic!("expected BufferState, got {:?}", other.map(|(_, i)| i)),
    }
    assert_eq!(dev.frame_metadata(0).unwrap().sequence, 1);

    dev.release_frame(0).unwrap();
    assert_eq!(driver.queued_count(CAPTURE), 3);

    driver.with(|s| s.dequeue_index = Some(9));
    assert!(matches!(dev.get_frame(), Err(Error::BufferIndex(9))));
    assert_eq!(dev.read_frame().unwrap().len(), 1000);
}

#[test]
fn map_failure_rolls_the_pool_back() {
    let driver = FakeDriver::capture();
    driver.with(|s| s.fail_map_at = Some(2));
    let mut dev = Device::from_handle(driver.clone()).unwrap();

    match dev.start_streaming() {
        Err(Error::BufferMapError { index, source }) => {
            assert_eq!(index, 2);
            assert_eq!(source.raw_os_error(), Some(libc::ENOMEM));
        }
        other => panic!("expected BufferMapError, got {:?}", other),
    }

    assert_eq!(dev.state(), StreamState::Idle);
    assert_eq!(dev.buffers(), 0);
    driver.with(|s| {
        assert_eq!(s.mapped, 2);
        assert_eq!(s.unmapped, 2);
    });
    assert_eq!(driver.events("REQBUFS").last().unwrap(), "REQBUFS 1 0");
    assert!(driver.events("STREAMON").is_empty());

    driver.with(|s| s.fail_map_at = None);
    dev.start_streaming().unwrap();
}

#[test]
fn stream_on_failure_returns_to_idle() {
    let driver = FakeDriver::capture();
    driver.with(|s| s.fail_stream_on = Some(CAPTURE));
    let mut dev = Device::from_handle(driver.clone()).unwrap();

    let err = dev.start_streaming().unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EIO));
    assert_eq!(dev.state(), StreamState::Idle);
    assert_eq!(driver.live_mappings(), 0);
}

#[test]
fn zero_buffers_granted() {
    let driver = FakeDriver::capture();
    driver.with(|s| s.max_buffers = 0);
    let mut dev = Device::from_handle(driver).unwrap();

    assert!(dev.start_streaming().is_err());
    assert_eq!(dev.state(), StreamState::Idle);
}

#[test]
fn wait_distinguishes_ready_from_timeout() {
    let driver = FakeDriver::capture();
    driver.with(|s| s.ready_at = Some(3));
    let dev = Device::from_handle(driver.clone()).unwrap();
    assert_eq!(
        dev.wait_for_frame(Duration::from_secs(5)).unwrap(),
        Readiness::Ready
    );
    assert_eq!(driver.with(|s| s.clock), 3);

    driver.with(|s| {
        s.ready_at = None;
        s.clock = 0;
    });
    assert_eq!(
        dev.wait_for_frame(Duration::from_secs(2)).unwrap(),
        Readiness::TimedOut
    );
    assert_eq!(driver.with(|s| s.clock), 2);

    driver.with(|s| s.ready_at = Some(3));
    assert_eq!(
        dev.wait_for_frame(Duration::from_secs(2)).unwrap(),
        Readiness::Ready
    );
}

#[test]
fn wait_survives_interruptions() {
    let driver = FakeDriver::capture();
    driver.with(|s| s.interrupts = 2);
    let dev = Device::from_handle(driver.clone()).unwrap();

    assert_eq!(
        dev.wait_for_frame(Duration::from_secs(1)).unwrap(),
        Readiness::Ready
    );
    assert_eq!(driver.with(|s| s.waits), 3);

    // retries only wait for what is left of the timeout
    let timeouts = driver.with(|s| s.timeouts.clone());
    assert_eq!(timeouts[0], Duration::from_secs(1));
    assert!(timeouts[1] < timeouts[0]);
    assert!(timeouts[2] <= timeouts[1]);
}

#[test]
fn close_stops_a_running_stream() {
    let driver = FakeDriver::capture();
    let dev = streaming_device(&driver, 2);

    dev.close().unwrap();
    let log = driver.with(|s| s.log.clone());
    let tail: Vec<&str> = log.iter().rev().take(3).rev().map(String::as_str).collect();
    assert_eq!(tail, vec!["STREAMOFF 1", "REQBUFS 1 0", "CLOSE"]);
    assert_eq!(driver.with(|s| s.closed), 1);
    assert_eq!(driver.live_mappings(), 0);
}

#[test]
fn close_releases_prepared_buffers() {
    let driver = FakeDriver::capture();
    let mut dev = Device::from_handle(driver.clone()).unwrap();
    dev.set_buffer_count(2).unwrap();
    dev.prepare_buffers().unwrap();

    dev.close().unwrap();
    let log = driver.with(|s| s.log.clone());
    assert_eq!(&log[log.len() - 2..], ["REQBUFS 1 0", "CLOSE"]);
    assert!(driver.events("STREAMOFF").is_empty());
    assert_eq!(driver.with(|s| s.unmapped), 2);
    assert_eq!(driver.live_mappings(), 0);
}

#[test]
fn drop_releases_prepared_buffers() {
    let driver = FakeDriver::capture();
    {
        let mut dev = Device::from_handle(driver.clone()).unwrap();
        dev.set_buffer_count(3).unwrap();
        dev.prepare_buffers().unwrap();
    }
    assert_eq!(driver.events("REQBUFS"), vec!["REQBUFS 1 3", "REQBUFS 1 0"]);
    assert_eq!(driver.live_mappings(), 0);
    assert_eq!(driver.with(|s| s.closed), 1);
}

#[test]
fn drop_releases_everything() {
    let driver = FakeDriver::capture();
    {
        let mut dev = streaming_device(&driver, 2);
        let (_, _index) = dev.get_frame().unwrap();
    }
    assert_eq!(driver.with(|s| s.closed), 1);
    assert_eq!(driver.live_mappings(), 0);
    assert!(driver.with(|s| s.streaming.is_empty()));

    let dev = Device::from_handle(driver.clone()).unwrap();
    dev.close().unwrap();
    assert_eq!(driver.with(|s| s.closed), 2);
}
