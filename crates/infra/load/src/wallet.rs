//! Wallet identities, generation and persistence.

use std::{fmt, fs, path::Path};

use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::WalletError;

/// Env var naming scheme for pool keys, indexed from 1.
pub const WALLET_KEY_ENV_PREFIX: &str = "WALLET_";
const WALLET_KEY_ENV_SUFFIX: &str = "_PRIVATE_KEY";

/// A signing identity owned by the process.
#[derive(Clone)]
pub struct Wallet {
    /// Local signer holding the private key.
    pub signer: PrivateKeySigner,
    /// Address derived from the key.
    pub address: Address,
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet").field("address", &self.address).finish_non_exhaustive()
    }
}

impl Wallet {
    /// Parses a hex private key, with or without `0x`.
    pub fn from_private_key(label: &str, private_key: &str) -> Result<Self, WalletError> {
        let signer: PrivateKeySigner = private_key.trim().parse().map_err(
            |e: alloy_signer_local::LocalSignerError| WalletError::InvalidKey {
                label: label.to_string(),
                reason: e.to_string(),
            },
        )?;
        Ok(Self::from(signer))
    }

    /// A fresh random wallet drawn from `rng`.
    pub fn new_random(rng: &mut ChaCha8Rng) -> Self {
        Self::from(PrivateKeySigner::random_with(rng))
    }

    /// The private key as `0x`-prefixed hex.
    pub fn private_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.signer.to_bytes()))
    }
}

impl From<PrivateKeySigner> for Wallet {
    fn from(signer: PrivateKeySigner) -> Self {
        let address = signer.address();
        Self { signer, address }
    }
}

/// One entry of a wallets file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletData {
    /// Checksummed address, informational.
    pub address: String,
    /// Hex private key.
    pub private_key: String,
}

/// On-disk wallets file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletsFile {
    /// Wallets in pool order.
    pub wallets: Vec<WalletData>,
}

/// Generates `count` random wallets, deterministic when `seed` is set.
pub fn generate_wallets(count: usize, seed: Option<u64>) -> Vec<Wallet> {
    let mut rng = match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => ChaCha8Rng::from_entropy(),
    };

    (0..count).map(|_| Wallet::new_random(&mut rng)).collect()
}

/// Writes wallets to `path` as pretty JSON.
pub fn save_wallets(wallets: &[Wallet], path: &Path) -> Result<(), WalletError> {
    let file = WalletsFile {
        wallets: wallets
            .iter()
            .map(|w| WalletData {
                address: w.address.to_string(),
                private_key: w.private_key_hex(),
            })
            .collect(),
    };

    fs::write(path, serde_json::to_string_pretty(&file)?)?;
    Ok(())
}

/// Reads wallets from a JSON wallets file, keeping file order.
pub fn load_wallets(path: &Path) -> Result<Vec<Wallet>, WalletError> {
    let json = fs::read_to_string(path)?;
    let file: WalletsFile = serde_json::from_str(&json)?;

    file.wallets
        .iter()
        .enumerate()
        .map(|(i, data)| Wallet::from_private_key(&format!("wallets[{i}]"), &data.private_key))
        .collect()
}

/// Collects `WALLET_<i>_PRIVATE_KEY` for `i` in `1..=count` through `lookup`.
///
/// Missing variables are skipped, so the result may hold fewer than `count` wallets.
pub fn wallets_from_env<F>(count: usize, lookup: F) -> Result<Vec<Wallet>, WalletError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut wallets = Vec::with_capacity(count);
    for i in 1..=count {
        let name = wallet_env_name(i);
        if let Some(key) = lookup(&name).filter(|k| !k.trim().is_empty()) {
            wallets.push(Wallet::from_private_key(&name, &key)?);
        }
    }
    Ok(wallets)
}

/// Every `WALLET_<n>_PRIVATE_KEY` among `vars`, ordered by `n`.
pub fn scan_env_wallets<I>(vars: I) -> Result<Vec<(usize, Wallet)>, WalletError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut found: Vec<_> = vars
        .into_iter()
        .filter_map(|(name, key)| {
            let index = name
                .strip_prefix(WALLET_KEY_ENV_PREFIX)?
                .strip_suffix(WALLET_KEY_ENV_SUFFIX)?
                .parse::<usize>()
                .ok()?;
            Some((index, name, key))
        })
        .collect();
    found.sort_by_key(|(index, _, _)| *index);

    found
        .into_iter()
        .map(|(index, name, key)| Ok((index, Wallet::from_private_key(&name, &key)?)))
        .collect()
}

/// Renders wallets as `.env` lines, numbered from 1.
pub fn env_lines(wallets: &[Wallet]) -> String {
    wallets
        .iter()
        .enumerate()
        .map(|(i, w)| format!("{}={}\n", wallet_env_name(i + 1), w.private_key_hex()))
        .collect()
}

fn wallet_env_name(index: usize) -> String {
    format!("{WALLET_KEY_ENV_PREFIX}{index}{WALLET_KEY_ENV_SUFFIX}")
}
