//! Network management logic: address claiming, RV-C address ranges, the roster of
//! remote nodes, NAME field manipulation and NAME configuration.
pub mod address_claiming;
pub mod address_ranges;
pub mod iso_name;
pub mod name_config;
pub mod roster;
