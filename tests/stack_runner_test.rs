//! The async runner on tokio: ticks paced by the timer, frames moved between the bus
//! and the stack through embassy channels.
mod helpers;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use helpers::{node_name, MemoryHooks, MockCanBus, MockTimer, TestStack};
use korri_rvc::error::RunnerError;
use korri_rvc::protocol::managment::address_ranges::device_function;
use korri_rvc::protocol::messages::{PGN_ADDRESS_CLAIM, PGN_COMM_STATS, PGN_ISO_REQUEST};
use korri_rvc::protocol::stack::runner::StackRunner;
use korri_rvc::protocol::stack::{StackConfig, WakeFlag};
use korri_rvc::protocol::transport::can_frame::CanFrame;
use korri_rvc::protocol::transport::can_id::CanId;
use korri_rvc::protocol::transport::traits::can_bus::CanBus;
use static_cell::StaticCell;
use tokio::time::{sleep, timeout, Duration, Instant};

type Frames = Channel<CriticalSectionRawMutex, CanFrame, 32>;

const HOST: u8 = 0x90;

fn inverter(ms_per_tick: u32) -> (TestStack, MemoryHooks) {
    let config =
        StackConfig::new(node_name(1, device_function::INVERTER)).with_ms_per_tick(ms_per_tick);
    let mut stack = TestStack::new(config);
    let mut hooks = MemoryHooks::default();
    stack.begin(&mut hooks).unwrap();
    (stack, hooks)
}

fn claim_from(source: u8) -> CanFrame {
    let id = CanId::for_pgn(PGN_ADDRESS_CLAIM, 6, source, 0xFF).unwrap();
    let name = node_name(9, device_function::USER_INTERFACE);
    CanFrame::with_payload(id, &name.to_le_bytes())
}

#[tokio::test]
/// The node claims through the runner, then answers a statistics request.
async fn test_runner_claims_and_answers_request() {
    let (dut, mut host) = MockCanBus::create_pair();
    let (rx, tx) = (Frames::new(), Frames::new());
    let mut runner = StackRunner::new(dut, MockTimer, &rx, &tx);
    let (mut stack, mut hooks) = inverter(1);

    timeout(Duration::from_secs(5), async {
        while !stack.is_online() {
            runner.step(&mut stack, &mut hooks).await.unwrap();
        }
    })
    .await
    .expect("address claim did not complete");

    let claim = loop {
        let frame = host.recv().await.unwrap();
        if frame.id.pgn() == PGN_ADDRESS_CLAIM {
            break frame;
        }
    };
    assert_eq!(claim.id.source_address(), stack.address());

    let id = CanId::for_pgn(PGN_ISO_REQUEST, 6, HOST, stack.address()).unwrap();
    let request = CanFrame::with_payload(id, &PGN_COMM_STATS.to_le_bytes()[..3]);
    host.send(&request).await.unwrap();

    let address = stack.address();
    let reply = timeout(Duration::from_secs(5), async {
        tokio::select! {
            stopped = runner.run(&mut stack, &mut hooks) => panic!("runner stopped: {stopped:?}"),
            frame = async {
                loop {
                    let frame = host.recv().await.unwrap();
                    if frame.id.pgn() == PGN_COMM_STATS {
                        break frame;
                    }
                }
            } => frame,
        }
    })
    .await
    .expect("no statistics report");

    assert_eq!(reply.id.source_address(), address);
    // first fast-packet frame: index 0, then the total length
    assert_eq!(reply.data[0] & 0x1F, 0);
    assert!(reply.data[1] > 8);
}

#[tokio::test]
/// A raised wake flag cuts the tick period short.
async fn test_wake_flag_ticks_early() {
    static WAKE: StaticCell<WakeFlag<CriticalSectionRawMutex>> = StaticCell::new();
    let wake: &'static WakeFlag<CriticalSectionRawMutex> = WAKE.init(WakeFlag::new());

    let (dut, host) = MockCanBus::create_pair();
    let (rx, tx) = (Frames::new(), Frames::new());
    let mut runner = StackRunner::new(dut, MockTimer, &rx, &tx).with_wake(wake);
    let (mut stack, mut hooks) = inverter(1000);

    // already raised: no wait at all
    wake.set();
    let started = Instant::now();
    runner.step(&mut stack, &mut hooks).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(100));
    assert!(!wake.is_set());

    // raised by another task, along with a frame to process
    let mut sender = host.clone();
    let task = tokio::spawn(async move {
        sleep(Duration::from_millis(50)).await;
        wake.set();
        sender.send(&claim_from(HOST)).await.unwrap();
    });

    let started = Instant::now();
    runner.step(&mut stack, &mut hooks).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));
    task.await.unwrap();

    assert_eq!(stack.stats().rx_frames, 1);
    assert!(stack.roster().find_by_address(HOST).is_some());
    drop(host);
}

#[tokio::test]
/// Frames arriving while the rx channel is full are counted, not silently lost.
async fn test_full_rx_channel_counts_overruns() {
    let (dut, mut host) = MockCanBus::create_pair();
    let rx: Channel<CriticalSectionRawMutex, CanFrame, 1> = Channel::new();
    let tx = Frames::new();
    let mut runner = StackRunner::new(dut, MockTimer, &rx, &tx);
    let (mut stack, mut hooks) = inverter(50);

    for source in [HOST, HOST + 1, HOST + 2] {
        host.send(&claim_from(source)).await.unwrap();
    }
    runner.step(&mut stack, &mut hooks).await.unwrap();

    assert_eq!(stack.stats().rx_frames, 1);
    assert_eq!(stack.stats().rx_overrun, 2);

    // the count is handed over once
    runner.step(&mut stack, &mut hooks).await.unwrap();
    assert_eq!(stack.stats().rx_overrun, 2);
}

#[tokio::test]
/// Losing the bus ends the loop with a receive error.
async fn test_runner_stops_when_bus_closes() {
    let (dut, host) = MockCanBus::create_pair();
    let (rx, tx) = (Frames::new(), Frames::new());
    let mut runner = StackRunner::new(dut, MockTimer, &rx, &tx);
    let (mut stack, mut hooks) = inverter(1000);

    drop(host);
    let result = timeout(Duration::from_secs(5), runner.run(&mut stack, &mut hooks))
        .await
        .expect("runner kept going");
    assert!(matches!(result, Err(RunnerError::Receive(()))));
}
