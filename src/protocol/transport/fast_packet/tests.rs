//! Tests combining Fast Packet transmission from a DOB and reassembly.
use crate::infra::heap::Heap;
use crate::protocol::transport::{
    can_frame::CanFrame,
    dob::{Dob, DobData, DobFlags, DobRole, DobState},
    fast_packet::{
        assembler::{accept_frame, open, ProcessResult, SessionKey},
        frame_count, SequenceTable,
    },
    traits::can_driver::{CanDriver, SendStatus, TxHandle},
};

#[derive(Default)]
struct Recorder {
    frames: [Option<CanFrame>; 32],
    count: usize,
}

impl CanDriver for Recorder {
    fn send_frame(&mut self, _port: u8, frame: &CanFrame) -> Result<TxHandle, SendStatus> {
        self.frames[self.count] = Some(*frame);
        self.count += 1;
        Ok(TxHandle(self.count as u16))
    }

    fn receive_frame(&mut self, _port: u8) -> Option<CanFrame> {
        None
    }
}

fn transmit(payload: &[u8], heap: &mut Heap<512>, sequence: u8) -> Recorder {
    let handle = heap.allocate(payload.len()).unwrap();
    heap.bytes_mut(handle).copy_from_slice(payload);

    let mut dob = Dob::new(130816, 6, DobRole::AppTx, 125);
    dob.source = 42;
    dob.data = DobData::Heap(handle);
    dob.len = payload.len() as u16;
    dob.flags.set(DobFlags::FASTPACKET);
    dob.sequence = sequence;
    dob.state = DobState::Data;

    let mut driver = Recorder::default();
    while dob.state == DobState::Data {
        dob.write(&*heap, &mut driver).unwrap();
    }
    assert_eq!(dob.state, DobState::Status);
    driver
}

fn receive(driver: &Recorder, heap: &mut Heap<512>) -> Option<Dob> {
    let mut frames = driver.frames[..driver.count].iter().flatten();
    let first = frames.next()?;
    let key = SessionKey {
        pgn: first.id.pgn(),
        source: first.id.source_address(),
        destination: 255,
        port: 0,
        priority: first.id.priority(),
    };
    let (mut dob, mut result) = open(key, first.payload(), heap, 75).ok()?;
    for frame in frames {
        result = accept_frame(&mut dob, frame.payload(), heap, 75);
    }
    (result == ProcessResult::MessageComplete).then_some(dob)
}

#[test]
/// Validate a round-trip for a modest 15-byte payload.
fn test_roundtrip_15_bytes() {
    let original = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];
    let mut heap = Heap::<512>::new();

    let driver = transmit(&original, &mut heap, 3);
    assert_eq!(driver.count, 3);
    assert!(driver.frames[..3].iter().flatten().all(|f| f.len == 8));

    let dob = receive(&driver, &mut heap).expect("complete message");
    assert_eq!(dob.payload(&heap), &original);
    assert_eq!(dob.sequence, 3 << 5);
}

#[test]
/// Maximum payload: 223 bytes fragmented over 32 frames and reassembled.
fn test_roundtrip_max_payload() {
    let original = [0x42; 223];
    let mut heap = Heap::<512>::new();

    let driver = transmit(&original, &mut heap, 0);
    assert_eq!(driver.count, frame_count(223) as usize);

    let dob = receive(&driver, &mut heap).unwrap();
    assert_eq!(dob.len, 223);
    assert_eq!(dob.payload(&heap), &original[..]);
}

#[test]
/// Consecutive transfers of one PGN carry different sequences.
fn test_sequences_differ_between_transfers() {
    let mut table = SequenceTable::new();
    let mut heap = Heap::<512>::new();
    let a = transmit(&[0xAA; 20], &mut heap, table.next(130816));
    let b = transmit(&[0xBB; 20], &mut heap, table.next(130816));
    let seq = |r: &Recorder| r.frames[0].map(|f| f.data[0] & 0xE0);
    assert_ne!(seq(&a), seq(&b));
}
