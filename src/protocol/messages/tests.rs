use super::registry::{lookup, transport_for, STACK_PGNS};
use super::*;
use crate::infra::codec::traits::PgnData;
use crate::protocol::managment::iso_name::IsoName;

#[test]
/// A NAK for an unsupported request names the requested PGN in bytes 5..8.
fn test_ack_layout() {
    let ack = Pgn59392::reply(126996, AckStatus::Nak, AckReason::Unsupported);
    let mut buffer = [0u8; 8];
    assert_eq!(ack.to_payload(&mut buffer).unwrap(), 8);
    assert_eq!(buffer, [1, 1, 0xFF, 0xFF, 0xFF, 0x14, 0xF0, 0x01]);

    let back = Pgn59392::from_payload(&buffer).unwrap();
    assert_eq!(back.status(), AckStatus::Nak);
    assert_eq!(back.reason(), AckReason::Unsupported);
    assert_eq!(back.pgn, 126996);
}

#[test]
/// Requests are three bytes, also accepted padded to a full frame.
fn test_request_lengths() {
    assert_eq!(
        Pgn59904::from_payload(&[0x00, 0xEE, 0x00]).unwrap().pgn,
        60928
    );
    assert_eq!(
        Pgn59904::from_payload(&[0x00, 0xEE, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF])
            .unwrap()
            .pgn,
        60928
    );
    assert!(Pgn59904::from_payload(&[0x00, 0xEE]).is_err());
}

#[test]
/// The claim record packs to the little-endian NAME.
fn test_claim_matches_name_bytes() {
    let name = IsoName::builder()
        .unique_number(0x1ABCD)
        .manufacturer_code(119)
        .device_instance(9)
        .device_function(140)
        .device_class(35)
        .system_instance(2)
        .industry_group(0)
        .arbitrary_address_capable(true)
        .build();
    let record: Pgn60928 = name.into();
    let mut buffer = [0u8; 8];
    record.to_payload(&mut buffer).unwrap();
    assert_eq!(buffer, name.to_le_bytes());

    let decoded = Pgn60928::from_payload(&buffer).unwrap();
    assert_eq!(IsoName::from(decoded), name);
}

#[test]
fn test_commanded_address_layout() {
    let command = Pgn65240 {
        name: IsoName::from_raw(0x0102030405060708),
        new_source_address: 0x81,
    };
    let mut buffer = [0u8; 16];
    assert_eq!(command.to_payload(&mut buffer).unwrap(), 9);
    assert_eq!(&buffer[..9], &[8, 7, 6, 5, 4, 3, 2, 1, 0x81]);
    assert_eq!(Pgn65240::from_payload(&buffer[..9]).unwrap(), command);
}

#[test]
fn test_name_config_command() {
    let command = Pgn126720 {
        config_type: ConfigScope::Oem as u8,
        message_count: 0,
        cac: 4,
        name: IsoName::from_raw(0x8000_0000_0001_E240),
    };
    let mut buffer = [0u8; 16];
    assert_eq!(command.to_payload(&mut buffer).unwrap(), 11);
    let back = Pgn126720::from_payload(&buffer[..11]).unwrap();
    assert_eq!(back, command);
    assert_eq!(back.scope(), Some(ConfigScope::Oem));
    assert!(back.is_command());
}

#[test]
/// Port blocks follow the counters; the count bounds the decoded blocks.
fn test_comm_stats_ports() {
    let mut report = Pgn130816::new();
    report.rx_frames = 1200;
    report.late_cts = 2;
    report.port_count = 2;
    report.ports[0] = PortErrors {
        port: 0,
        port_errors: 3,
    };
    report.ports[1] = PortErrors {
        port: 1,
        port_errors: 0,
    };

    let mut buffer = [0u8; 64];
    let len = report.to_payload(&mut buffer).unwrap();
    assert_eq!(len, 23 + 2 * 3);

    let back = Pgn130816::from_payload(&buffer[..len]).unwrap();
    assert_eq!(back.rx_frames, 1200);
    assert_eq!(back.late_cts, 2);
    assert_eq!(back.port_count, 2);
    assert_eq!(back.ports[0].port_errors, 3);

    // one block too many for the payload
    buffer[22] = 3;
    assert!(Pgn130816::from_payload(&buffer[..len]).is_err());
}

#[test]
/// The registry derives transports from the descriptors.
fn test_registry_transports() {
    assert_eq!(lookup(&[], 59904).unwrap().transport, Transport::Single);
    assert_eq!(lookup(&[], 65240).unwrap().transport, Transport::Multipacket);
    assert_eq!(lookup(&[], 126720).unwrap().transport, Transport::FastPacket);
    assert_eq!(lookup(&[], 130816).unwrap().transport, Transport::FastPacket);
    assert!(lookup(&[], 127245).is_none());
    assert_eq!(STACK_PGNS.len(), 6);
}

static APP_TABLE: [PgnInfo; 2] = [
    PgnInfo::raw(127245, 2, Transport::FastPacket),
    PgnInfo::raw(59904, 3, Transport::Single),
];

#[test]
/// Application entries shadow the built-ins; unknown PGNs go by length.
fn test_registry_lookup_order() {
    assert_eq!(lookup(&APP_TABLE, 59904).unwrap().priority, 3);
    assert_eq!(transport_for(&APP_TABLE, 127245, 4), Transport::FastPacket);
    assert_eq!(transport_for(&APP_TABLE, 65300, 8), Transport::Single);
    assert_eq!(transport_for(&APP_TABLE, 65300, 9), Transport::Multipacket);
    assert_eq!(transport_for(&APP_TABLE, 59904, 20), Transport::Multipacket);
}
