//! NAME configuration (PGN 126720): remote edits of the writable NAME fields,
//! reports of the stored configurations and resets to the OEM or factory layer.
//!
//! Each scope stores a [`NameConfig`] record guarded by a concurrent access counter
//! (CAC): a command only applies when it quotes the counter currently stored, and
//! every accepted change increments it.
use crate::error::PersistError;
use crate::protocol::managment::iso_name::IsoName;
use crate::protocol::messages::{AckReason, AckStatus, ConfigScope, Pgn126720};
use crate::protocol::stack::hooks::{ParamType, Persistence};

/// Stored size of a [`NameConfig`].
pub const NAME_CONFIG_RECORD_LEN: usize = 9;

/// CAC reported for the factory layer, which is never writable through a counter.
const FACTORY_REPORTED_CAC: u8 = 0xFF;

/// One stored NAME configuration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NameConfig {
    pub cac: u8,
    pub name: IsoName,
}

impl NameConfig {
    pub fn to_bytes(&self) -> [u8; NAME_CONFIG_RECORD_LEN] {
        let mut bytes = [0u8; NAME_CONFIG_RECORD_LEN];
        bytes[0] = self.cac;
        bytes[1..].copy_from_slice(&self.name.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PersistError> {
        if bytes.len() != NAME_CONFIG_RECORD_LEN {
            return Err(PersistError::Malformed);
        }
        let name = IsoName::from_payload(&bytes[1..]).ok_or(PersistError::Malformed)?;
        Ok(Self {
            cac: bytes[0],
            name,
        })
    }

    pub fn load<P: Persistence + ?Sized>(
        store: &mut P,
        scope: ConfigScope,
    ) -> Result<Self, PersistError> {
        let mut buffer = [0u8; NAME_CONFIG_RECORD_LEN];
        let len = store.load(ParamType::NameConfig, scope, &mut buffer)?;
        Self::from_bytes(buffer.get(..len).ok_or(PersistError::Malformed)?)
    }

    pub fn save<P: Persistence + ?Sized>(
        &self,
        store: &mut P,
        scope: ConfigScope,
    ) -> Result<(), PersistError> {
        store.save(ParamType::NameConfig, scope, &self.to_bytes())
    }

    /// Copy the fields a configuration command may change.
    fn apply(&mut self, requested: &IsoName) {
        self.name = self
            .name
            .to_builder()
            .unique_number(requested.unique_number())
            .device_instance_lower(requested.device_instance_lower())
            .device_instance_upper(requested.device_instance_upper())
            .system_instance(requested.system_instance())
            .industry_group(requested.industry_group())
            .build();
    }
}

/// Circumstances of a received configuration command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOrigin {
    /// The command was sent to the global address.
    pub broadcast: bool,
    pub from_diagnostic_tool: bool,
    /// The application accepts configuration changes right now.
    pub allowed: bool,
}

/// Acknowledgment to send, and the NAME to adopt once it is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandReply {
    pub status: AckStatus,
    pub reason: AckReason,
    pub reload: Option<IsoName>,
}

impl CommandReply {
    const fn refuse(status: AckStatus, reason: AckReason) -> Self {
        Self {
            status,
            reason,
            reload: None,
        }
    }
}

/// Apply a configuration command (`message_count == 0`).
pub fn handle_command<P: Persistence + ?Sized>(
    command: &Pgn126720,
    origin: CommandOrigin,
    store: &mut P,
) -> CommandReply {
    if origin.broadcast {
        return CommandReply::refuse(AckStatus::Nak, AckReason::Protocol);
    }
    let scope = match command.scope() {
        Some(ConfigScope::User) => ConfigScope::User,
        Some(scope) if origin.from_diagnostic_tool => scope,
        _ => return CommandReply::refuse(AckStatus::Deny, AckReason::Security),
    };
    if !origin.allowed {
        return CommandReply::refuse(AckStatus::Deny, AckReason::WrongMode);
    }
    let Ok(mut stored) = NameConfig::load(store, scope) else {
        return CommandReply::refuse(AckStatus::Nak, AckReason::DataAccess);
    };
    if stored.cac != command.cac {
        return CommandReply::refuse(AckStatus::Nak, AckReason::Cac);
    }

    stored.apply(&command.name);
    stored.cac = stored.cac.wrapping_add(1);
    if stored.save(store, scope).is_err() {
        return CommandReply::refuse(AckStatus::Nak, AckReason::DataAccess);
    }
    #[cfg(feature = "defmt")]
    defmt::info!("NAME configuration {} updated, CAC {}", scope, stored.cac);

    CommandReply {
        status: AckStatus::Ack,
        reason: AckReason::DoNotCare,
        reload: (scope == ConfigScope::User).then_some(stored.name),
    }
}

/// Report of the configuration stored for `scope`, or `None` when nothing is stored.
pub fn report<P: Persistence + ?Sized>(
    scope: ConfigScope,
    message_count: u8,
    store: &mut P,
) -> Option<Pgn126720> {
    let stored = NameConfig::load(store, scope).ok()?;
    let cac = if scope == ConfigScope::Factory {
        FACTORY_REPORTED_CAC
    } else {
        stored.cac
    };
    Some(Pgn126720 {
        config_type: scope as u8,
        message_count,
        cac,
        name: stored.name,
    })
}

/// Copy the OEM (or factory) configuration down to the lower layers.
///
/// Factory resets OEM and User, OEM resets User. Counters of the overwritten layers
/// are incremented. Returns the NAME now active in the User layer.
pub fn reset<P: Persistence + ?Sized>(
    scope: ConfigScope,
    store: &mut P,
) -> Result<IsoName, PersistError> {
    let counter = |store: &mut P, scope| NameConfig::load(store, scope).map_or(0, |c| c.cac);

    let user_cac = counter(store, ConfigScope::User);
    match scope {
        ConfigScope::User => Err(PersistError::Unsupported),
        ConfigScope::Oem => {
            let mut source = NameConfig::load(store, ConfigScope::Oem)?;
            source.cac = user_cac.wrapping_add(1);
            source.save(store, ConfigScope::User)?;
            Ok(source.name)
        }
        ConfigScope::Factory => {
            let oem_cac = counter(store, ConfigScope::Oem);
            let mut source = NameConfig::load(store, ConfigScope::Factory)?;
            source.cac = oem_cac.wrapping_add(1);
            source.save(store, ConfigScope::Oem)?;
            source.cac = user_cac.wrapping_add(1);
            source.save(store, ConfigScope::User)?;
            Ok(source.name)
        }
    }
}
