use super::*;
use crate::protocol::transport::traits::can_driver::CanDriver;

/// Driver answering every send with a scripted status.
struct ScriptedDriver {
    reply: Result<TxHandle, SendStatus>,
    sent: usize,
    last: Option<CanFrame>,
    pending: bool,
}

impl ScriptedDriver {
    fn new(reply: Result<TxHandle, SendStatus>) -> Self {
        Self {
            reply,
            sent: 0,
            last: None,
            pending: false,
        }
    }
}

impl CanDriver for ScriptedDriver {
    fn send_frame(&mut self, _port: u8, frame: &CanFrame) -> Result<TxHandle, SendStatus> {
        if self.reply.is_ok() {
            self.sent += 1;
            self.last = Some(*frame);
        }
        self.reply
    }

    fn receive_frame(&mut self, _port: u8) -> Option<CanFrame> {
        None
    }

    fn tx_pending(&self, _port: u8, _handle: TxHandle) -> bool {
        self.pending
    }
}

fn single(payload: &[u8]) -> Dob {
    let mut dob = Dob::new(65240, 6, DobRole::AppTx, 125);
    dob.source = 0x42;
    dob.set_inline(payload);
    dob.state = DobState::Data;
    dob
}

#[test]
/// Each state maps to its disposition.
fn test_output_status_dispositions() {
    let mut dob = single(&[1]);
    assert_eq!(dob.output_status(true), OutputStatus::FrameReady);
    dob.state = DobState::Status;
    assert_eq!(dob.output_status(true), OutputStatus::Status);
    dob.state = DobState::Complete;
    assert_eq!(dob.output_status(true), OutputStatus::Delete);

    // an idle DOB without ticker never expires
    dob.state = DobState::Empty;
    dob.ticker = 0;
    assert_eq!(dob.output_status(true), OutputStatus::Ok);
}

#[test]
/// Waiting states count down only on tick and time out at zero.
fn test_ticker_countdown() {
    let mut dob = single(&[1]);
    dob.state = DobState::Wait;
    dob.ticker = 2;
    assert_eq!(dob.output_status(false), OutputStatus::Ok);
    assert_eq!(dob.ticker, 2);
    assert_eq!(dob.output_status(true), OutputStatus::Ok);
    assert_eq!(dob.output_status(true), OutputStatus::TimedOut);
}

#[test]
/// A single frame goes to Status with the ticker cleared, then completes.
fn test_single_frame_lifecycle() {
    let heap = Heap::<64>::new();
    let mut driver = ScriptedDriver::new(Ok(TxHandle(7)));
    let mut dob = single(&[0xAA, 0xBB, 0xCC]);

    dob.write(&heap, &mut driver).unwrap();
    assert_eq!(dob.state, DobState::Status);
    assert_eq!(dob.ticker, 0);
    assert_eq!(dob.tx_handle, Some(TxHandle(7)));

    let frame = driver.last.unwrap();
    assert_eq!(frame.id.pgn(), 65240);
    assert_eq!(frame.id.source_address(), 0x42);
    assert_eq!(frame.payload(), &[0xAA, 0xBB, 0xCC]);

    // still in the controller mailbox
    driver.pending = true;
    dob.do_status(&driver);
    assert_eq!(dob.state, DobState::Status);
    assert_eq!(dob.output_status(true), OutputStatus::Status);

    driver.pending = false;
    dob.do_status(&driver);
    assert_eq!(dob.state, DobState::Complete);
    assert_eq!(dob.terminating_status, TransferOutcome::Success);
}

#[test]
/// A busy driver leaves the cursors untouched so the frame is retried.
fn test_busy_restores_cursors() {
    let heap = Heap::<64>::new();
    let mut driver = ScriptedDriver::new(Err(SendStatus::Busy));
    let mut dob = single(&[1, 2]);

    assert_eq!(dob.write(&heap, &mut driver), Err(SendStatus::Busy));
    assert_eq!((dob.position, dob.current_frame), (0, 0));
    assert_eq!(dob.state, DobState::Data);
}

#[test]
/// A refused frame terminates the DOB with a transmit error.
fn test_driver_error_completes() {
    let heap = Heap::<64>::new();
    let mut driver = ScriptedDriver::new(Err(SendStatus::Error));
    let mut dob = single(&[1, 2]);

    assert_eq!(dob.write(&heap, &mut driver), Err(SendStatus::Error));
    assert_eq!(dob.state, DobState::Complete);
    assert_eq!(dob.terminating_status, TransferOutcome::FrameTransmitError);
}

#[test]
/// A PGN no identifier can carry fails the DOB without reaching the driver.
fn test_unbuildable_frame_fails() {
    let heap = Heap::<64>::new();
    let mut driver = ScriptedDriver::new(Ok(TxHandle(1)));
    let mut dob = single(&[1, 2]);
    dob.pgn = 0x4_0000;

    assert_eq!(dob.write(&heap, &mut driver), Err(SendStatus::Error));
    assert_eq!(dob.state, DobState::Complete);
    assert_eq!(dob.terminating_status, TransferOutcome::FrameTransmitError);
    assert_eq!(driver.sent, 0);
}

#[test]
/// Multipacket writes stop at the end of the granted window.
fn test_multipacket_window() {
    let mut heap = Heap::<128>::new();
    let handle = heap.allocate(20).unwrap();
    heap.bytes_mut(handle)
        .iter_mut()
        .enumerate()
        .for_each(|(i, b)| *b = i as u8);

    let mut dob = Dob::new(130816, 6, DobRole::AppTx, 125);
    dob.source = 0x42;
    dob.destination = 0x10;
    dob.data = DobData::Heap(handle);
    dob.len = 20;
    dob.flags.set(DobFlags::MULTIPACKET);
    dob.total_frames = 3;
    dob.current_frame = 1;
    dob.frames_to_send = 2;
    dob.state = DobState::Data;

    let mut driver = ScriptedDriver::new(Ok(TxHandle(1)));
    dob.write(&heap, &mut driver).unwrap();
    assert_eq!(dob.state, DobState::Data);
    dob.write(&heap, &mut driver).unwrap();
    assert_eq!(dob.state, DobState::Wait);
    assert_eq!(dob.current_frame, 3);

    let frame = driver.last.unwrap();
    assert_eq!(frame.id.pgn(), 60160);
    assert_eq!(frame.id.destination(), Some(0x10));
    assert_eq!(frame.data, [2, 7, 8, 9, 10, 11, 12, 13]);

    // last frame carries the tail and pads
    dob.frames_to_send = 1;
    dob.state = DobState::Data;
    dob.write(&heap, &mut driver).unwrap();
    assert_eq!(
        driver.last.unwrap().data,
        [3, 14, 15, 16, 17, 18, 19, 0xFF]
    );
    assert_eq!(dob.position, 20);
}

#[test]
/// Broadcast transfers send their data frames to the global address.
fn test_bam_frames_are_global() {
    let heap = Heap::<64>::new();
    let mut dob = Dob::new(130816, 6, DobRole::AppTx, 125);
    dob.source = 0x42;
    dob.data = DobData::Static(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
    dob.len = 9;
    dob.flags.set(DobFlags::MULTIPACKET | DobFlags::BAM);
    dob.current_frame = 1;
    dob.frames_to_send = 1;
    dob.state = DobState::Data;

    let mut driver = ScriptedDriver::new(Ok(TxHandle(1)));
    dob.write(&heap, &mut driver).unwrap();
    assert_eq!(driver.last.unwrap().id.destination(), Some(GLOBAL_ADDRESS));
}

#[test]
/// Control DOBs are ready to send as soon as they are built.
fn test_control_dob() {
    let dob = Dob::control(60416, 7, 0x42, 0x10, &[17, 2, 1], DobState::Cts, 125);
    assert_eq!(dob.role, DobRole::Control);
    assert_eq!(dob.len, 3);
    assert_eq!(dob.payload(&Heap::<8>::new()), &[17, 2, 1]);
    assert_eq!(dob.peer(), 0x10);
}

#[test]
/// The bitmap reports new frames once and checks full ranges.
fn test_frame_bitmap() {
    let mut bitmap = FrameBitmap::default();
    assert!(bitmap.test_and_set(1));
    assert!(!bitmap.test_and_set(1));
    assert!(bitmap.test_and_set(2));
    assert!(bitmap.all_set(1, 2));
    assert!(!bitmap.all_set(1, 3));
    assert!(bitmap.test_and_set(255));
    assert!(bitmap.is_set(255));
    bitmap.clear();
    assert!(!bitmap.is_set(1));
}
