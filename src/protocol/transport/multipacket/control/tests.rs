use super::*;

#[test]
/// Each control message has its documented byte layout.
fn test_encode_layouts() {
    let rts = TpCm::Rts {
        size: 20,
        frames: 3,
        max_per_cts: 16,
        pgn: 130816,
    };
    assert_eq!(rts.encode(), [16, 20, 0, 3, 16, 0x00, 0xFF, 0x01]);

    let cts = TpCm::Cts {
        count: 2,
        next: 1,
        pgn: 130816,
    };
    assert_eq!(cts.encode(), [17, 2, 1, 0xFF, 0xFF, 0x00, 0xFF, 0x01]);

    let eom = TpCm::Eom {
        size: 300,
        frames: 43,
        pgn: 126720,
    };
    assert_eq!(eom.encode(), [19, 0x2C, 0x01, 43, 0xFF, 0x00, 0xEF, 0x01]);

    let bam = TpCm::Bam {
        size: 100,
        frames: 15,
        pgn: 65240,
    };
    assert_eq!(bam.encode(), [32, 100, 0, 15, 0xFF, 0xD8, 0xFE, 0x00]);

    let abort = TpCm::Abort {
        reason: AbortReason::Resources,
        pgn: 130816,
    };
    assert_eq!(abort.encode(), [255, 2, 0xFF, 0xFF, 0xFF, 0x00, 0xFF, 0x01]);
}

#[test]
/// Decoding reads back what was encoded.
fn test_decode() {
    let frame = [16, 20, 0, 3, 2, 0x00, 0xFF, 0x01];
    assert_eq!(
        TpCm::decode(&frame),
        Some(TpCm::Rts {
            size: 20,
            frames: 3,
            max_per_cts: 2,
            pgn: 130816
        })
    );
    assert_eq!(
        TpCm::decode(&[255, 42, 0xFF, 0xFF, 0xFF, 0, 0xEF, 1]),
        Some(TpCm::Abort {
            reason: AbortReason::Unspecified,
            pgn: 126720
        })
    );
}

#[test]
/// Unknown control bytes and short frames are refused.
fn test_decode_refusals() {
    assert_eq!(TpCm::decode(&[18, 0, 0, 0, 0, 0, 0, 0]), None);
    assert_eq!(TpCm::decode(&[16, 20, 0, 3]), None);
}

#[test]
/// Control DOBs target the peer on the VIP path with the TP.CM PGN.
fn test_into_dob() {
    let dob = TpCm::Cts {
        count: 2,
        next: 3,
        pgn: 130816,
    }
    .into_dob(0x42, 0x10, 0, 125);
    assert_eq!(dob.pgn, TP_CM_PGN);
    assert_eq!(dob.priority, TP_CM_PRIORITY);
    assert_eq!((dob.source, dob.destination), (0x42, 0x10));
    assert_eq!(dob.state, DobState::Cts);
    assert!(dob.flags.has(DobFlags::VIP));
}
