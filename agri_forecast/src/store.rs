//! On-disk observation store and commodity rankings
//!
//! Files are replaced with write-to-temp-then-rename, so a concurrent
//! reader sees either the previous or the new contents in full. Writers
//! hold an exclusive lock on a lock file in the store directory for the
//! whole read-modify-write, so handles opened on the same directory (in
//! this process or another) never drop each other's rows.

use crate::data::{Observation, SeriesKey};
use crate::error::Result;
use fs2::FileExt;
use indexmap::IndexMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

const OBSERVATIONS_FILE: &str = "observations.csv";
const RANKINGS_FILE: &str = "top_commodities.json";
const LOCK_FILE: &str = ".store.lock";

/// Replace `path` atomically with `bytes`
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

/// Top commodities per `"{region}__{subregion}"`, highest count first
pub type Rankings = IndexMap<String, Vec<String>>;

/// Key of a (region, subregion) in [`Rankings`]; rows without a subregion
/// rank under `"{region}__"`
pub fn ranking_key(region: &str, subregion: Option<&str>) -> String {
    format!("{}__{}", region, subregion.unwrap_or_default())
}

/// Rank commodities by observation count per (region, subregion)
pub fn rank_commodities(observations: &[Observation], top_n: usize) -> Rankings {
    let mut groups: IndexMap<String, IndexMap<&str, usize>> = IndexMap::new();
    for obs in observations {
        *groups
            .entry(ranking_key(&obs.region, obs.subregion.as_deref()))
            .or_default()
            .entry(obs.commodity.as_str())
            .or_default() += 1;
    }

    groups
        .into_iter()
        .map(|(key, mut counts)| {
            // stable: ties stay in insertion order
            counts.sort_by(|_, a, _, b| b.cmp(a));
            let top = counts.keys().take(top_n).map(|c| c.to_string()).collect();
            (key, top)
        })
        .collect()
}

/// Persistent collection of ingested observations
#[derive(Debug)]
pub struct ObservationStore {
    dir: PathBuf,
}

impl ObservationStore {
    /// Open (and create if needed) a store rooted at `dir`
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn observations_path(&self) -> PathBuf {
        self.dir.join(OBSERVATIONS_FILE)
    }

    fn rankings_path(&self) -> PathBuf {
        self.dir.join(RANKINGS_FILE)
    }

    /// Exclusive writer lock, released when the returned file is dropped
    fn lock(&self) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(LOCK_FILE))?;
        file.lock_exclusive()?;
        Ok(file)
    }

    /// Every stored observation, in insertion order
    pub fn load_all(&self) -> Result<Vec<Observation>> {
        let path = self.observations_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let observations = reader
            .deserialize()
            .collect::<std::result::Result<Vec<Observation>, _>>()?;
        debug!(count = observations.len(), path = %path.display(), "Loaded observations");
        Ok(observations)
    }

    /// Add observations, then recompute and persist the commodity rankings
    /// over the full contents. Returns the new rankings.
    pub fn append(&self, new: &[Observation], top_n: usize) -> Result<Rankings> {
        let _lock = self.lock()?;

        let mut all = self.load_all()?;
        all.extend_from_slice(new);

        let mut writer = csv::Writer::from_writer(Vec::new());
        for obs in &all {
            writer.serialize(obs)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        write_atomically(&self.observations_path(), &bytes)?;

        let rankings = rank_commodities(&all, top_n);
        write_atomically(&self.rankings_path(), &serde_json::to_vec_pretty(&rankings)?)?;

        info!(
            added = new.len(),
            total = all.len(),
            rankings = rankings.len(),
            "Persisted observations"
        );
        Ok(rankings)
    }

    /// Observations of a key, optionally restricted to one subregion
    pub fn query(&self, key: &SeriesKey, subregion: Option<&str>) -> Result<Vec<Observation>> {
        let subregion = subregion.map(str::trim).filter(|s| !s.is_empty());
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|obs| key.matches(obs))
            .filter(|obs| subregion.map_or(true, |s| obs.subregion.as_deref() == Some(s)))
            .collect())
    }

    /// Distinct (region, commodity) keys in first-seen order
    pub fn keys(&self) -> Result<Vec<SeriesKey>> {
        let mut keys: IndexMap<(String, String), SeriesKey> = IndexMap::new();
        for obs in self.load_all()? {
            keys.entry((obs.region.clone(), obs.commodity.to_ascii_lowercase()))
                .or_insert_with(|| SeriesKey::new(obs.region, obs.commodity));
        }
        Ok(keys.into_values().collect())
    }

    /// Persisted commodity rankings; empty before the first ingest
    pub fn load_rankings(&self) -> Result<Rankings> {
        let path = self.rankings_path();
        if !path.exists() {
            return Ok(Rankings::new());
        }
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
