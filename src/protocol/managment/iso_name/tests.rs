use super::*;

#[test]
fn test_unique_number_extraction() {
    let name = IsoName::builder().unique_number(0x1ABCDE).build();
    assert_eq!(name.unique_number(), 0x1ABCDE);
}

#[test]
fn test_manufacturer_code_extraction() {
    let name = IsoName::builder().manufacturer_code(119).build();
    assert_eq!(name.manufacturer_code(), 119);
}

#[test]
fn test_self_configurable_bit() {
    let dynamic = IsoName::builder().arbitrary_address_capable(true).build();
    assert!(dynamic.is_arbitrary_address_capable());
    assert_eq!(dynamic.raw() & (1u64 << 63), 1u64 << 63);

    let fixed = IsoName::builder().arbitrary_address_capable(false).build();
    assert!(!fixed.is_arbitrary_address_capable());
    assert_eq!(fixed.raw() & (1u64 << 63), 0);
}

#[test]
fn test_device_instance() {
    let name = IsoName::builder().device_instance(0xAB).build();
    // lower 3 bits, upper 5 bits
    assert_eq!(name.device_instance(), 0xAB);
    assert_eq!(name.device_instance_lower(), 0x03);
    assert_eq!(name.device_instance_upper(), 0x15);
}

#[test]
fn test_all_fields() {
    let name = IsoName::builder()
        .unique_number(123456)
        .manufacturer_code(119)
        .device_instance(42)
        .device_function(140)
        .device_class(35)
        .system_instance(7)
        .industry_group(0)
        .arbitrary_address_capable(true)
        .build();

    assert_eq!(name.unique_number(), 123456);
    assert_eq!(name.manufacturer_code(), 119);
    assert_eq!(name.device_instance(), 42);
    assert_eq!(name.device_function(), 140);
    assert_eq!(name.device_class(), 35);
    assert_eq!(name.system_instance(), 7);
    assert_eq!(name.industry_group(), 0);
    assert!(!name.reserved());
    assert!(name.is_arbitrary_address_capable());
}

#[test]
/// The NAME travels least significant byte first.
fn test_wire_bytes() {
    let name = IsoName::from_raw(0x0102_0304_0506_0708);
    assert_eq!(name.to_le_bytes(), [8, 7, 6, 5, 4, 3, 2, 1]);
    assert_eq!(IsoName::from_le_bytes([8, 7, 6, 5, 4, 3, 2, 1]), name);
    assert_eq!(
        IsoName::from_payload(&[8, 7, 6, 5, 4, 3, 2, 1, 0xFF]),
        Some(name)
    );
    assert_eq!(IsoName::from_payload(&[8, 7, 6]), None);
}

#[test]
/// The lower NAME wins; the relation is a strict total order.
fn test_priority_order() {
    let low = IsoName::from_raw(0x0102030405060708);
    let high = IsoName::from_raw(0x0102030405060709);
    assert!(low.outranks(&high));
    assert!(!high.outranks(&low));
    assert!(!low.outranks(&low));
    assert!(low < high);

    // comparing from the most significant byte down gives the same answer
    let (a, b) = (low.to_le_bytes(), high.to_le_bytes());
    let by_bytes = a.iter().rev().cmp(b.iter().rev());
    assert_eq!(by_bytes, low.cmp(&high));
}

#[test]
fn test_reserved_bit() {
    let name = IsoName::builder().reserved(true).build();
    assert!(name.reserved());
    assert_eq!(name.to_le_bytes()[6] & 0x01, 0x01);
}

#[test]
/// Rebuilding from an existing NAME keeps untouched fields.
fn test_to_builder() {
    let name = IsoName::builder()
        .unique_number(77)
        .manufacturer_code(119)
        .device_function(140)
        .arbitrary_address_capable(true)
        .build();
    let updated = name.to_builder().unique_number(78).system_instance(3).build();
    assert_eq!(updated.unique_number(), 78);
    assert_eq!(updated.system_instance(), 3);
    assert_eq!(updated.manufacturer_code(), 119);
    assert_eq!(updated.device_function(), 140);
    assert!(updated.is_arbitrary_address_capable());
}

#[test]
fn test_raw_conversion() {
    let raw_value = 0x8123456789ABCDEF;
    let name = IsoName::from_raw(raw_value);
    assert_eq!(name.raw(), raw_value);

    let converted: u64 = name.into();
    assert_eq!(converted, raw_value);
}

#[test]
/// Conversion through the address-claim record keeps every field but the reserved bit.
fn test_pgn60928_conversion() {
    let name = IsoName::builder()
        .unique_number(654321)
        .manufacturer_code(78)
        .device_instance_lower(7)
        .device_instance_upper(15)
        .device_function(200)
        .reserved(true)
        .device_class(20)
        .system_instance(10)
        .industry_group(4)
        .arbitrary_address_capable(false)
        .build();

    let pgn: Pgn60928 = name.into();
    assert_eq!(pgn.unique_number, 654321);
    assert_eq!(pgn.manufacturer_code, 78);
    assert_eq!(pgn.device_instance_lower, 7);
    assert_eq!(pgn.device_instance_upper, 15);
    assert_eq!(pgn.device_function, 200);
    assert_eq!(pgn.device_class, 20);
    assert_eq!(pgn.system_instance, 10);
    assert_eq!(pgn.industry_group, 4);
    assert_eq!(pgn.self_configurable, 0);

    let back: IsoName = pgn.into();
    assert_eq!(back, name.to_builder().reserved(false).build());
}
