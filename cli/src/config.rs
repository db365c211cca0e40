//! Network selection and environment configuration.
//!
//! Networks are chosen by name and map to fixed algod endpoints.  An explicit
//! URL (and token) overrides the table, which is how a non-default localnet
//! port or a private node is reached.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

// ── Environment variables ─────────────────────────────────────────────────────

/// Employer account mnemonic used by the CLI.
pub const ENV_EMPLOYER_MNEMONIC: &str = "EMPLOYER_MNEMONIC";
/// Funded localnet account used by the demo.
pub const ENV_LOCALNET_MNEMONIC: &str = "LOCALNET_MNEMONIC";
pub const ENV_EMPLOYEE_1: &str = "EMPLOYEE_1";
pub const ENV_EMPLOYEE_2: &str = "EMPLOYEE_2";

/// Token of a default AlgoKit / sandbox localnet.
pub const LOCALNET_TOKEN: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

// ── Networks ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Localnet,
    Testnet,
    Mainnet,
}

impl Network {
    pub fn name(self) -> &'static str {
        match self {
            Network::Localnet => "localnet",
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
        }
    }

    pub fn algod_url(self) -> &'static str {
        match self {
            Network::Localnet => "http://localhost:4001",
            Network::Testnet => "https://testnet-api.algonode.cloud",
            Network::Mainnet => "https://mainnet-api.algonode.cloud",
        }
    }

    pub fn algod_token(self) -> &'static str {
        match self {
            Network::Localnet => LOCALNET_TOKEN,
            Network::Testnet | Network::Mainnet => "",
        }
    }

    pub fn endpoint(self) -> Endpoint {
        Endpoint {
            network: self.name().to_owned(),
            url: self.algod_url().to_owned(),
            token: self.algod_token().to_owned(),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "localnet" | "local" => Ok(Network::Localnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "mainnet" | "main" => Ok(Network::Mainnet),
            _ => bail!(
                "Unsupported network '{}'. Expected one of: localnet, testnet, mainnet",
                s
            ),
        }
    }
}

/// A resolved algod endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Label used in log lines, e.g. `"testnet"`.
    pub network: String,
    pub url: String,
    pub token: String,
}

impl Endpoint {
    /// Resolve the endpoint for `network`, applying optional overrides.
    ///
    /// A URL override without a token keeps the network's default token.
    pub fn resolve(network: Network, url: Option<&str>, token: Option<&str>) -> Self {
        let mut endpoint = network.endpoint();
        if let Some(url) = url.filter(|u| !u.is_empty()) {
            endpoint.url = url.to_owned();
        }
        if let Some(token) = token {
            endpoint.token = token.to_owned();
        }
        endpoint
    }
}

/// Read a required environment variable, with a hint on how to set it.
pub fn require_env(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| {
        format!(
            "Environment variable {} is not set. Export it or add it to a .env file.",
            name
        )
    })
}
