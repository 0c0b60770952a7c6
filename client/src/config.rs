/*++

Licensed under the Apache-2.0 license.

File Name:

    config.rs

Abstract:

    Session configuration: message-unit header values, session open
    parameters, the key store to open and the service families to enable.

--*/

use std::path::Path;

use anyhow::{bail, Context};
use hsm_api::message::key_store::KEY_STORE_FLAGS_CREATE;
use hsm_api::message::SessionOpenArgs;
use hsm_api::{HsmApiError, HsmApiResult, MessageFlavor, MuParams, ServiceFamilies};
use serde_derive::{Deserialize, Serialize};

/// Services one session may have open at once, key store included.
pub const DEFAULT_MAX_SERVICES: usize = 16;

/// Message-unit header values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuConfig {
    pub version: u8,
    pub cmd_tag: u8,
    pub rsp_tag: u8,
}

impl Default for MuConfig {
    fn default() -> Self {
        let mu = MuParams::default();
        Self {
            version: mu.version,
            cmd_tag: mu.cmd_tag,
            rsp_tag: mu.rsp_tag,
        }
    }
}

/// Parameters sent with SESSION_OPEN
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionParams {
    pub mu_id: u8,
    pub interrupt_idx: u8,
    pub tz: u8,
    pub did: u8,
    pub priority: u8,
    pub operating_mode: u8,
}

/// Key store opened as the first child of every session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyStoreConfig {
    pub id: u32,
    pub password: u32,
    pub flags: u8,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            id: 0x0001,
            password: 0,
            flags: KEY_STORE_FLAGS_CREATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub mu: MuConfig,

    pub session: SessionParams,

    pub key_store: KeyStoreConfig,

    /// Service families to enable, by name; session and key store are
    /// always enabled
    pub families: Vec<String>,

    /// Engine firmware uses the PSA message layouts
    pub psa_compliant: bool,

    pub max_services: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mu: MuConfig::default(),
            session: SessionParams::default(),
            key_store: KeyStoreConfig::default(),
            families: ServiceFamilies::all()
                .iter_names()
                .map(|(name, _)| name.to_ascii_lowercase())
                .collect(),
            psa_compliant: false,
            max_services: DEFAULT_MAX_SERVICES,
        }
    }
}

impl SessionConfig {
    /// Parse and validate a TOML session configuration.
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let config: SessionConfig = toml::from_str(s).context("Failed to parse session config")?;
        if config.max_services == 0 {
            bail!("max_services must be at least 1");
        }
        for name in &config.families {
            if ServiceFamilies::from_config_name(name).is_none() {
                bail!("Unknown service family {name:?}");
            }
        }
        Ok(config)
    }

    pub fn service_families(&self) -> HsmApiResult<ServiceFamilies> {
        self.families
            .iter()
            .try_fold(ServiceFamilies::REQUIRED, |acc, name| {
                ServiceFamilies::from_config_name(name)
                    .map(|f| acc | f)
                    .ok_or(HsmApiError::Validation("unknown service family"))
            })
    }

    pub fn mu_params(&self) -> MuParams {
        MuParams {
            version: self.mu.version,
            cmd_tag: self.mu.cmd_tag,
            rsp_tag: self.mu.rsp_tag,
        }
    }

    pub fn flavor(&self) -> MessageFlavor {
        if self.psa_compliant {
            MessageFlavor::Psa
        } else {
            MessageFlavor::Legacy
        }
    }

    pub(crate) fn session_open_args(&self) -> SessionOpenArgs {
        let s = &self.session;
        SessionOpenArgs {
            mu_id: s.mu_id,
            interrupt_idx: s.interrupt_idx,
            tz: s.tz,
            did: s.did,
            priority: s.priority,
            operating_mode: s.operating_mode,
            session_handle: 0,
        }
    }
}

/// Load Session Configuration from file
pub fn load_session_config(path: &Path) -> anyhow::Result<SessionConfig> {
    let config_str = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read the config file {}", path.display()))?;

    SessionConfig::from_toml_str(&config_str)
        .with_context(|| format!("Failed to load config file {}", path.display()))
}
