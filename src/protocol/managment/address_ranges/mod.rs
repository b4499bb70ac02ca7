//! RV-C source address policy.
//!
//! ```text
//!   0x40..=0x55   default (static) source addresses, one per product family
//!   128..=143     power components, dynamic
//!   144..=159     control / display, dynamic
//!   160..=175     sensors, dynamic
//!   176..=247     extended range, dynamic
//! ```
//!
//! A self-configurable node searches downward through the range of its device
//! function, then through the extended range, and gives up once it comes back to
//! the address it started from.
use crate::protocol::managment::iso_name::IsoName;

/// Device function codes that select an address range.
pub mod device_function {
    pub const INVERTER: u8 = 140;
    pub const CHARGER: u8 = 141;
    pub const INVERTER_CHARGER: u8 = 142;
    pub const BATTERY_MANAGEMENT_SYSTEM: u8 = 165;
    pub const ENERGY_MANAGEMENT_SYSTEM: u8 = 166;
    pub const BATTERY_MONITOR: u8 = 170;
    pub const USER_INTERFACE: u8 = 130;
    pub const SERVICE_TOOL: u8 = 131;
    pub const DIAGNOSTIC_TERMINAL: u8 = 132;
    pub const GATEWAY: u8 = 133;
    pub const SYSTEM_CLOCK: u8 = 134;
}

/// Inclusive range of dynamic addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AddressRange {
    pub start: u8,
    pub end: u8,
}

impl AddressRange {
    pub const fn contains(&self, address: u8) -> bool {
        address >= self.start && address <= self.end
    }
}

pub const POWER_COMPONENTS: AddressRange = AddressRange {
    start: 128,
    end: 143,
};
pub const CONTROL_DISPLAY: AddressRange = AddressRange {
    start: 144,
    end: 159,
};
pub const SENSORS: AddressRange = AddressRange {
    start: 160,
    end: 175,
};
pub const EXTENDED: AddressRange = AddressRange {
    start: 176,
    end: 247,
};

/// Default source addresses of statically addressed products.
pub mod default_address {
    pub const GENSTART_CONTROLLER: u8 = 0x40;
    pub const INVERTER: u8 = 0x41;
    pub const INVERTER2: u8 = 0x42;
    pub const CONTROL_PANEL: u8 = 0x43;
    pub const BATTERY_MONITOR: u8 = 0x44;
    pub const CHASSIS_BATTERY_MONITOR: u8 = 0x45;
    pub const CONVERTER: u8 = 0x46;
    pub const CONVERTER2: u8 = 0x47;
    pub const CHARGE_CONTROLLER: u8 = 0x48;
    pub const AC_LOAD_MONITOR: u8 = 0x49;
    pub const AC_FAULT_PROTECTION: u8 = 0x4A;
    pub const TRANSFER_SWITCH: u8 = 0x4B;
    pub const DC_LOAD: u8 = 0x4C;
    pub const AC_LOAD: u8 = 0x4D;
    pub const GENERIC_AC_SOURCE: u8 = 0x4E;
    pub const SOLAR_CHARGE_CONTROLLER: u8 = 0x4F;
    pub const BATTERY_MONITOR2: u8 = 0x50;
    pub const SERVICE_TOOL: u8 = 0x51;
    pub const SYSTEM_CLOCK: u8 = 0x52;
    pub const DATA_LOGGER: u8 = 0x53;
    pub const CHASSIS_BRIDGE: u8 = 0x54;
    pub const NETWORK_BRIDGE: u8 = 0x55;
}

/// Whether `address` lies in one of the dynamic ranges.
pub const fn is_dynamic(address: u8) -> bool {
    POWER_COMPONENTS.contains(address)
        || CONTROL_DISPLAY.contains(address)
        || SENSORS.contains(address)
        || EXTENDED.contains(address)
}

/// A known default source address, or a dynamic one.
pub const fn check_proper(address: u8) -> bool {
    (address >= default_address::GENSTART_CONTROLLER
        && address <= default_address::NETWORK_BRIDGE)
        || is_dynamic(address)
}

/// Replace an improper address by the last power-component address.
pub const fn check_and_set_proper(address: u8) -> u8 {
    if check_proper(address) {
        address
    } else {
        POWER_COMPONENTS.end
    }
}

/// Dynamic range assigned to a device function.
pub const fn range_for_function(function: u8) -> AddressRange {
    use device_function::*;
    match function {
        BATTERY_MONITOR => SENSORS,
        ENERGY_MANAGEMENT_SYSTEM
        | BATTERY_MANAGEMENT_SYSTEM
        | INVERTER_CHARGER
        | INVERTER
        | CHARGER => POWER_COMPONENTS,
        USER_INTERFACE | SERVICE_TOOL | DIAGNOSTIC_TERMINAL | GATEWAY | SYSTEM_CLOCK => {
            CONTROL_DISPLAY
        }
        _ => EXTENDED,
    }
}

/// Range searched by the node owning `name`.
///
/// A NAME with the reserved bit set is treated as unknown and searches the extended range.
pub const fn range_for(name: &IsoName) -> AddressRange {
    if name.reserved() {
        EXTENDED
    } else {
        range_for_function(name.device_function())
    }
}

/// Default source address of a statically addressed device function.
pub const fn static_address_for_function(function: u8) -> u8 {
    use device_function::*;
    match function {
        INVERTER_CHARGER | INVERTER => default_address::INVERTER,
        CHARGER => default_address::CHARGE_CONTROLLER,
        USER_INTERFACE | DIAGNOSTIC_TERMINAL => default_address::CONTROL_PANEL,
        SERVICE_TOOL => default_address::SERVICE_TOOL,
        GATEWAY => default_address::NETWORK_BRIDGE,
        SYSTEM_CLOCK => default_address::SYSTEM_CLOCK,
        BATTERY_MANAGEMENT_SYSTEM | ENERGY_MANAGEMENT_SYSTEM => default_address::BATTERY_MONITOR2,
        BATTERY_MONITOR => default_address::BATTERY_MONITOR,
        _ => EXTENDED.start,
    }
}

/// Address a node starts claiming with.
///
/// The persisted address wins; otherwise self-configurable nodes start at the top of
/// their range and static nodes at their default address. The result is always proper.
pub fn preferred_address(name: &IsoName, persisted: Option<u8>) -> u8 {
    let address = match persisted {
        Some(address) => address,
        None if name.is_arbitrary_address_capable() => range_for(name).end,
        None => static_address_for_function(name.device_function()),
    };
    check_and_set_proper(address)
}

/// Next candidate after losing `current`.
///
/// Walks down the function range, continues at the top of the extended range and
/// leaves the extended range towards `saved` (or the function range again).
pub fn next_dynamic(current: u8, saved: u8, name: &IsoName) -> u8 {
    let own = range_for(name);
    if current == EXTENDED.start {
        if !is_dynamic(saved) {
            saved
        } else {
            own.end
        }
    } else if current == own.start {
        EXTENDED.end
    } else if is_dynamic(current) {
        current - 1
    } else {
        own.end
    }
}
