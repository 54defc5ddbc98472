//! Bulk download of a bucket prefix, with optional seeded sampling of
//! merged/mask image pairs.

use crate::error::{TrainingError, TrainingResult};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::storage::ObjectStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

const MASK_MARKER: &str = "mask";
const MERGED_SUFFIX: &str = "_merged";
const MASK_SUFFIX: &str = ".mask";

/// Keys under a prefix, split into directory markers and files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub directories: Vec<String>,
    pub files: Vec<String>,
}

impl Listing {
    /// Keys ending in `/` are directory markers; everything else is a file.
    #[must_use]
    pub fn from_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut listing = Self::default();
        for key in keys {
            if key.ends_with('/') {
                listing.directories.push(key);
            } else {
                listing.files.push(key);
            }
        }
        listing
    }
}

/// Keys chosen for download.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySelection {
    /// Every file under the prefix, in listing order. Only filled when no
    /// sample size is given.
    pub files: Vec<String>,
    /// Sampled merged keys.
    pub merged: Vec<String>,
    /// Masks paired with `merged`.
    pub masks: Vec<String>,
    /// Sampled merged keys whose mask is absent from the listing.
    pub unpaired: Vec<String>,
}

impl KeySelection {
    /// Unsampled files, or sampled merged keys followed by their masks.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.files.iter().chain(&self.merged).chain(&self.masks).cloned().collect()
    }
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub bucket: String,
    pub prefix: String,
    pub local_root: PathBuf,
    /// Number of merged/mask pairs to sample; `None` downloads everything.
    pub sample: Option<usize>,
    pub seed: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadReport {
    pub directories_created: Vec<PathBuf>,
    pub downloaded: Vec<String>,
    pub unpaired: Vec<String>,
}

/// Mask key paired with a merged key.
#[must_use]
pub fn mask_key_for(merged: &str) -> String {
    merged.replace(MERGED_SUFFIX, MASK_SUFFIX)
}

/// List every key under `prefix`, following continuation tokens until the
/// store reports no further pages.
pub async fn list_all(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
    progress: &dyn ProgressSink,
) -> TrainingResult<Listing> {
    let mut keys = Vec::new();
    let mut token: Option<String> = None;
    let mut page = 0;

    loop {
        let result = store.list_page(bucket, prefix, token.as_deref()).await?;
        page += 1;
        progress.on_event(ProgressEvent::Listed { page, keys: result.keys.len() });
        keys.extend(result.keys);

        match result.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    Ok(Listing::from_keys(keys))
}

/// Choose which file keys to fetch.
///
/// Without a sample size every file is selected. With `Some(n)`, `n` merged
/// keys (those not containing `"mask"`) are drawn without replacement from
/// a generator seeded with `seed`, and each is paired with its mask key when
/// that key is present in the listing.
pub fn select_keys(listing: &Listing, sample: Option<usize>, seed: u64) -> TrainingResult<KeySelection> {
    let Some(count) = sample else {
        return Ok(KeySelection { files: listing.files.clone(), ..KeySelection::default() });
    };

    let merged: Vec<&String> = listing.files.iter().filter(|k| !k.contains(MASK_MARKER)).collect();
    if count > merged.len() {
        return Err(TrainingError::Sampling(format!(
            "requested {count} samples but only {} merged files are available",
            merged.len()
        )));
    }

    let available: HashSet<&str> = listing.files.iter().map(String::as_str).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut selection = KeySelection::default();

    for idx in rand::seq::index::sample(&mut rng, merged.len(), count).into_vec() {
        let key = merged[idx].clone();
        let mask = mask_key_for(&key);
        if mask != key && available.contains(mask.as_str()) {
            selection.masks.push(mask);
        } else {
            warn!(key = %key, "no mask found for sampled file");
            selection.unpaired.push(key.clone());
        }
        selection.merged.push(key);
    }

    Ok(selection)
}

/// Local destination for `key`, refusing keys that would escape `root`.
pub fn local_path(root: &Path, key: &str) -> TrainingResult<PathBuf> {
    let relative = Path::new(key);
    let safe = relative.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe {
        return Err(TrainingError::Storage(format!("refusing to write key outside destination: {key}")));
    }
    Ok(root.join(relative))
}

/// List `prefix`, recreate its directory markers under `local_root`, then
/// fetch the selected keys one by one. The first failed fetch aborts.
pub async fn download_prefix(
    store: &dyn ObjectStore,
    request: &DownloadRequest,
    progress: &dyn ProgressSink,
) -> TrainingResult<DownloadReport> {
    let listing = list_all(store, &request.bucket, &request.prefix, progress).await?;
    info!(
        bucket = %request.bucket,
        prefix = %request.prefix,
        files = listing.files.len(),
        directories = listing.directories.len(),
        "listed prefix"
    );

    let mut report = DownloadReport::default();
    for dir in &listing.directories {
        let path = local_path(&request.local_root, dir)?;
        if !path.is_dir() {
            tokio::fs::create_dir_all(&path).await?;
            report.directories_created.push(path);
        }
    }

    let selection = select_keys(&listing, request.sample, request.seed)?;
    report.unpaired = selection.unpaired.clone();
    if !selection.unpaired.is_empty() {
        progress.on_event(ProgressEvent::Message {
            message: format!("{} sampled files have no matching mask", selection.unpaired.len()),
        });
    }

    let keys = selection.keys();
    let total = keys.len();
    progress.on_event(ProgressEvent::DownloadStarted { total });

    for (i, key) in keys.into_iter().enumerate() {
        let dest = local_path(&request.local_root, &key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        store.download(&request.bucket, &key, &dest).await?;
        progress.on_event(ProgressEvent::Downloaded { key: key.clone(), index: i + 1, total });
        report.downloaded.push(key);
    }

    progress.on_event(ProgressEvent::DownloadFinished { downloaded: report.downloaded.len() });
    info!(downloaded = report.downloaded.len(), "download complete");
    Ok(report)
}
