//! File-per-wallet store with atomic writes.
//!
//! Each wallet is `<id>.z` (the raw ledger) next to `<id>.json`
//! (mtime and copy holders).

use std::{
    collections::BTreeSet,
    fs::{self, File},
    io::{BufReader, BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Ledger, Wallet, WalletId};

use super::{StoreError, WalletStore};

const LEDGER_EXT: &str = "z";
const META_EXT: &str = "json";

#[derive(Debug, Serialize, Deserialize)]
struct Meta {
    mtime: DateTime<Utc>,
    #[serde(default)]
    copies: BTreeSet<String>,
}

/// Directory-backed store. Every save hits the disk.
#[derive(Debug)]
pub struct FileWalletStore {
    dir: PathBuf,
    writes: Mutex<()>,
}

impl FileWalletStore {
    /// Open a store rooted at `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            writes: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, id: &WalletId, ext: &str) -> PathBuf {
        self.dir.join(format!("{id}.{ext}"))
    }

    // Write to temp file first, then rename
    fn write_atomic(
        path: &Path,
        write: impl FnOnce(&mut BufWriter<File>) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut tmp_path = path.as_os_str().to_owned();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            write(&mut writer)?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn read_meta(&self, id: &WalletId) -> Result<Option<Meta>, StoreError> {
        match File::open(self.path(id, META_EXT)) {
            Ok(file) => serde_json::from_reader(BufReader::new(file))
                .map(Some)
                .map_err(|e| StoreError::Serialization(e.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl WalletStore for FileWalletStore {
    fn get(&self, id: &WalletId) -> Result<Option<Wallet>, StoreError> {
        let raw = match fs::read(self.path(id, LEDGER_EXT)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let ledger = Ledger::parse(raw).map_err(|source| StoreError::Corrupt { id: *id, source })?;

        let meta = match self.read_meta(id)? {
            Some(meta) => meta,
            None => {
                warn!(%id, "wallet metadata missing, using file time");
                let mtime = fs::metadata(self.path(id, LEDGER_EXT))?
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                Meta {
                    mtime,
                    copies: BTreeSet::new(),
                }
            }
        };

        Ok(Some(Wallet::from_parts(ledger, meta.mtime, meta.copies)))
    }

    fn save(&self, wallet: &Wallet) -> Result<(), StoreError> {
        let _guard = self.writes.lock();
        let id = wallet.id();

        let meta = Meta {
            mtime: wallet.mtime(),
            copies: wallet.copy_holders().clone(),
        };
        Self::write_atomic(&self.path(&id, META_EXT), |writer| {
            serde_json::to_writer_pretty(writer, &meta)
                .map_err(|e| StoreError::Serialization(e.to_string()))
        })?;
        Self::write_atomic(&self.path(&id, LEDGER_EXT), |writer| {
            writer.write_all(wallet.ledger().raw())?;
            Ok(())
        })?;
        Ok(())
    }

    fn ids(&self) -> Result<Vec<WalletId>, StoreError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(LEDGER_EXT) {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse().ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn contains(&self, id: &WalletId) -> Result<bool, StoreError> {
        Ok(self.path(id, LEDGER_EXT).exists())
    }
}
