// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

use std::env;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::interface::*;
use crate::map_err;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONF_NAME: &str = "mech.conf";

/// Smallest modulus accepted for RSA key generation
pub const MIN_RSA_GEN_BITS: u32 = 512;
/// Default ceiling for RSA key generation
pub const MAX_RSA_SIZE_BITS: u32 = 16384;

/// Which generation of the primitive library API to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// Pick by the linked library version at runtime
    Auto,
    /// Encoder/decoder and EVP_PKEY_CTX based API (OpenSSL 3.x style)
    Evp,
    /// Component setter API (OpenSSL 1.x style)
    Legacy,
}

fn default_backend() -> BackendChoice {
    BackendChoice::Auto
}

fn default_rsa_max_bits() -> u32 {
    MAX_RSA_SIZE_BITS
}

fn default_des_retries() -> u32 {
    16
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_backend")]
    pub backend: BackendChoice,
    #[serde(default = "default_rsa_max_bits")]
    pub rsa_max_bits: u32,
    #[serde(default = "default_des_retries")]
    pub des_weak_key_retries: u32,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            backend: default_backend(),
            rsa_max_bits: default_rsa_max_bits(),
            des_weak_key_retries: default_des_retries(),
        }
    }
}

impl Config {
    pub fn find_conf() -> Option<String> {
        /* First check for our own env var,
         * this has the highest precedence */
        if let Ok(var) = env::var("SOFTMECH_CONF") {
            return Some(var);
        }
        let datafile = match env::var("XDG_CONFIG_HOME") {
            Ok(xdg) => format!("{}/softmech/{}", xdg, DEFAULT_CONF_NAME),
            Err(_) => match env::var("HOME") {
                Ok(home) => {
                    format!("{}/.config/softmech/{}", home, DEFAULT_CONF_NAME)
                }
                Err(_) => return None,
            },
        };
        if Path::new(&datafile).is_file() {
            Some(datafile)
        } else {
            None
        }
    }

    pub fn from_toml_str(config_str: &str) -> Result<Config> {
        let mut conf: Config = toml::from_str(config_str)?;
        conf.validate()?;
        Ok(conf)
    }

    pub fn from_file(filename: &str) -> Result<Config> {
        let config_str =
            map_err!(fs::read_to_string(filename), CKR_ARGUMENTS_BAD)?;
        Self::from_toml_str(&config_str)
    }

    fn validate(&mut self) -> Result<()> {
        if self.rsa_max_bits < MIN_RSA_GEN_BITS {
            return Err(Error::ck_rv_with_errmsg(
                CKR_ARGUMENTS_BAD,
                format!("rsa_max_bits must be at least {}", MIN_RSA_GEN_BITS),
            ));
        }
        if self.des_weak_key_retries == 0 {
            self.des_weak_key_retries = 1;
        }
        Ok(())
    }

    /// Loads the configuration from the default locations, falling back
    /// to defaults when no file is found
    pub fn load() -> Result<Config> {
        match Self::find_conf() {
            Some(f) => Self::from_file(&f),
            None => Ok(Config::default()),
        }
    }
}

/// Process wide configuration, read once on first use
///
/// A broken configuration file is reported and ignored rather than
/// disabling every mechanism.
pub static CONFIG: Lazy<Config> = Lazy::new(|| match Config::load() {
    Ok(c) => c,
    Err(_e) => {
        #[cfg(feature = "log")]
        log::error!("Failed to load configuration: {}", _e);
        Config::default()
    }
});
