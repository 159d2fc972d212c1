//! Loads and hot-reloads the sampling configuration: a global ratio plus a
//! uid white-list, read from the YAML file also consulted by `facade` for
//! reporter settings.
//!
//! ```yaml
//! sampler:
//!   ratio: 10000       # basis points, 0..=10000
//!   white-list: [1, 2, 3]
//! reporter:
//!   logSpans: false
//!   localAgentHostPort: "127.0.0.1:6831"
//! ```
//!
//! `sampler` is optional; a missing or unparsable file keeps the previous
//! in-memory state (100% ratio, empty white-list on first load) rather than
//! failing a caller — see `error` module docs.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU8, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;

use crate::constants::{CMD_MAX, CONF_DEFAULT_PATH, CONF_ENV, FLOOR_INTERVAL_SECS, MAX_RATIO, RELOAD_INTERVAL_SECS};
use crate::error::TracingCtrlError;

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    sampler: Option<RawSampler>,
    reporter: Option<RawReporter>,
}

#[derive(Debug, Deserialize, Default)]
struct RawSampler {
    ratio: Option<u32>,
    #[serde(rename = "white-list", default)]
    white_list: Vec<u32>,
}

/// Reporter block shared with `facade`'s exporter setup.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct RawReporter {
    #[serde(rename = "logSpans", default)]
    pub log_spans: bool,
    #[serde(rename = "zipkinEndpoint")]
    pub zipkin_endpoint: Option<String>,
    #[serde(rename = "jaegerEndpoint")]
    pub jaeger_endpoint: Option<String>,
    #[serde(rename = "localAgentHostPort")]
    pub local_agent_host_port: Option<String>,
}

/// Conf-based root-sampling decision state.
///
/// `ratio` and the uid white-list reload at most once every
/// [`RELOAD_INTERVAL_SECS`]; `cmd_list` tracks, per command id, the unix
/// timestamp it last passed, so `check_pass` can guarantee every command
/// fires at least once per [`FLOOR_INTERVAL_SECS`] even when the ratio roll
/// misses.
pub struct SampleConfig {
    path: PathBuf,
    ratio: AtomicU32,
    cmd_list: Vec<AtomicI64>,
    idx: AtomicU8,
    uid_lists: [RwLock<HashSet<u32>>; 2],
    last_attempt: AtomicI64,
    last_mtime: Mutex<Option<SystemTime>>,
}

impl SampleConfig {
    pub fn load() -> Self {
        Self::load_from(config_path())
    }

    fn load_from(path: PathBuf) -> Self {
        let me = Self {
            path,
            ratio: AtomicU32::new(MAX_RATIO),
            cmd_list: (0..CMD_MAX).map(|_| AtomicI64::new(0)).collect(),
            idx: AtomicU8::new(0),
            uid_lists: [RwLock::new(HashSet::new()), RwLock::new(HashSet::new())],
            last_attempt: AtomicI64::new(0),
            last_mtime: Mutex::new(None),
        };
        me.reload_now();
        me
    }

    /// Reload if at least [`RELOAD_INTERVAL_SECS`] have passed since the
    /// last attempt and the file's mtime has actually changed.
    pub fn maybe_reload(&self) {
        let now = now_secs();
        let last = self.last_attempt.load(Ordering::Relaxed);
        if now - last < RELOAD_INTERVAL_SECS {
            return;
        }
        if self
            .last_attempt
            .compare_exchange_weak(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let mtime = std::fs::metadata(&self.path).and_then(|m| m.modified()).ok();
        {
            let mut guard = self.last_mtime.lock().unwrap();
            if *guard == mtime {
                return;
            }
            *guard = mtime;
        }
        self.reload_now();
    }

    fn reload_now(&self) {
        match self.read_config() {
            Ok(raw) => self.apply(raw),
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "keeping previous sampling config");
            }
        }
    }

    fn read_config(&self) -> Result<RawConfig, TracingCtrlError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| TracingCtrlError::ConfigRead {
            path: self.path.clone(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| TracingCtrlError::ConfigParse {
            path: self.path.clone(),
            source,
        })
    }

    fn apply(&self, raw: RawConfig) {
        let Some(sampler) = raw.sampler else {
            return;
        };
        if let Some(ratio) = sampler.ratio {
            self.ratio.store(ratio.min(MAX_RATIO), Ordering::Relaxed);
        }

        let next_idx = (self.idx.load(Ordering::Relaxed) + 1) % 2;
        {
            let mut next = self.uid_lists[next_idx as usize].write().unwrap();
            next.clear();
            next.extend(sampler.white_list);
        }
        self.idx.store(next_idx, Ordering::Relaxed);

        tracing::info!(path = %self.path.display(), ratio = self.ratio.load(Ordering::Relaxed), "sampling config reloaded");
    }

    /// The reporter block, re-read fresh (not cached, since `facade` only
    /// consults it once at startup).
    pub fn reporter(&self) -> Option<RawReporter> {
        self.read_config().ok().and_then(|raw| raw.reporter)
    }

    /// Conf-based root-sampling decision.
    ///
    /// Order matters: a non-root span never passes here; an allow-listed
    /// uid always passes regardless of `ratio`; only after both of those are
    /// ruled out does the ratio roll happen, with a floor guarantee that
    /// every cmd id fires at least once per [`FLOOR_INTERVAL_SECS`].
    pub fn check_pass(&self, uid: u32, cmd: u32, root: bool) -> bool {
        if !root {
            return false;
        }

        let now = now_secs();
        let cur = &self.uid_lists[self.idx.load(Ordering::Relaxed) as usize % 2];
        if uid > 0 && cur.read().unwrap().contains(&uid) {
            self.mark_cmd(cmd, now);
            return true;
        }

        let ratio = self.ratio.load(Ordering::Relaxed);
        if random_ratio() < ratio {
            self.mark_cmd(cmd, now);
            return true;
        }

        if cmd > 0 && (cmd as usize) < self.cmd_list.len() {
            let slot = &self.cmd_list[cmd as usize];
            let last = slot.load(Ordering::Relaxed);
            if now > last + FLOOR_INTERVAL_SECS {
                let _ = slot.compare_exchange_weak(last, now, Ordering::Relaxed, Ordering::Relaxed);
                return true;
            }
        }
        false
    }

    fn mark_cmd(&self, cmd: u32, now: i64) {
        if cmd > 0 && (cmd as usize) < self.cmd_list.len() {
            self.cmd_list[cmd as usize].store(now, Ordering::Relaxed);
        }
    }
}

fn config_path() -> PathBuf {
    match std::env::var(CONF_ENV) {
        Ok(p) if !p.is_empty() => PathBuf::from(p),
        _ => PathBuf::from(CONF_DEFAULT_PATH),
    }
}

fn now_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

fn random_ratio() -> u32 {
    rand::random::<u32>() % MAX_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_conf(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracing.yml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn non_root_never_passes() {
        let (_dir, path) = write_conf("sampler:\n  ratio: 10000\n");
        let conf = SampleConfig::load_from(path);
        assert!(!conf.check_pass(1, 1, false));
    }

    #[test]
    fn whitelisted_uid_passes_even_at_zero_ratio() {
        let (_dir, path) = write_conf("sampler:\n  ratio: 0\n  white-list: [42]\n");
        let conf = SampleConfig::load_from(path);
        assert!(conf.check_pass(42, 1, true));
    }

    #[test]
    fn full_ratio_always_passes() {
        let (_dir, path) = write_conf("sampler:\n  ratio: 10000\n");
        let conf = SampleConfig::load_from(path);
        for _ in 0..20 {
            assert!(conf.check_pass(0, 0, true));
        }
    }

    #[test]
    fn floor_guarantee_fires_after_window_elapses() {
        let (_dir, path) = write_conf("sampler:\n  ratio: 0\n");
        let conf = SampleConfig::load_from(path);
        // Simulate the floor window having already elapsed for cmd 7.
        conf.cmd_list[7].store(now_secs() - FLOOR_INTERVAL_SECS - 1, Ordering::Relaxed);
        assert!(conf.check_pass(0, 7, true));
    }

    // S6: first call at the window boundary fires, the next one immediately
    // after does not (the floor was just reset by the first pass).
    #[test]
    fn floor_guarantee_only_fires_once_per_window() {
        let (_dir, path) = write_conf("sampler:\n  ratio: 0\n");
        let conf = SampleConfig::load_from(path);
        conf.cmd_list[7].store(now_secs() - FLOOR_INTERVAL_SECS - 1, Ordering::Relaxed);
        assert!(conf.check_pass(0, 7, true));
        assert!(!conf.check_pass(0, 7, true));
    }

    #[test]
    fn missing_file_keeps_default_full_ratio() {
        let conf = SampleConfig::load_from(PathBuf::from("/nonexistent/tracing.yml"));
        assert!(conf.check_pass(0, 0, true));
    }
}
