//! Optimistic-concurrency file ledger.
//!
//! The ledger serializes writes to shared files without a single writer:
//! every write is a compare-and-swap against the hash the writer observed at
//! snapshot time. Conflicts are cheap, explicit results — the ledger never
//! retries on the caller's behalf. All operations on one path run inside a
//! per-path critical section; operations on different paths never contend.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};

use murmur_core::IgnoreLock;
use murmur_core::types::{AgentId, TaskId};

use crate::ast::AstService;
use crate::error::{Result, SwarmError};

/// Immutable snapshot of one file at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileVersion {
    /// Path relative to the workspace root.
    pub path: PathBuf,
    /// SHA-256 of the full content, hex-encoded.
    pub hash: String,
    /// Full content at snapshot time.
    pub content: String,
    /// Agent the snapshot was taken for.
    pub agent_id: AgentId,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

/// Advisory claim type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimType {
    /// Whole-file claim; at most one per path.
    Exclusive,
    /// Claim on a section of the file; any number may coexist.
    Section,
}

/// An advisory lock on a file. Claims coordinate cooperating workers; they
/// do not by themselves make writes safe — `attempt_write` does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileClaim {
    /// Claimed path.
    pub path: PathBuf,
    /// Holder agent.
    pub agent_id: AgentId,
    /// Task the holder is executing.
    pub task_id: TaskId,
    /// Hash the holder observed when claiming.
    pub base_version_hash: String,
    /// Exclusive or section claim.
    pub claim_type: ClaimType,
    /// When the claim was granted.
    pub claimed_at: DateTime<Utc>,
}

/// Outcome of one compare-and-swap write. Transient; never persisted.
#[derive(Debug, Clone)]
pub struct WriteResult {
    /// Whether the content reached disk.
    pub success: bool,
    /// Whether the write lost the hash comparison.
    pub conflict: bool,
    /// On success the new content hash; on conflict the *current* hash the
    /// caller did not expect, so it can re-snapshot and retry.
    pub final_hash: String,
    /// Error text for non-conflict failures.
    pub error: Option<String>,
}

/// Append-only audit record of one write attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteLogEntry {
    /// When the attempt happened.
    pub timestamp: DateTime<Utc>,
    /// Path written.
    pub path: PathBuf,
    /// Writing agent.
    pub agent_id: AgentId,
    /// Task the write belonged to.
    pub task_id: TaskId,
    /// Hash the writer expected.
    pub base_hash: String,
    /// Hash of the content the writer produced.
    pub new_hash: String,
    /// Whether the attempt was rejected as a conflict.
    pub conflict: bool,
}

/// Hash file content the way the ledger does everywhere.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

type PathLocks = Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>;

/// Per-repository store of file versions, claims, and the write log.
pub struct FileLedger {
    root: PathBuf,
    persist_dir: Option<PathBuf>,
    ast: Option<Arc<dyn AstService>>,
    // Striped lock table: created lazily per path, never removed for the
    // run's lifetime. Acquiring the lock for path P never blocks path Q.
    path_locks: PathLocks,
    versions: RwLock<HashMap<PathBuf, String>>,
    claims: RwLock<HashMap<PathBuf, Vec<FileClaim>>>,
    write_log: StdMutex<Vec<WriteLogEntry>>,
}

impl FileLedger {
    /// Create a ledger over `root`, restoring any state found in
    /// `persist_dir`. A missing or partially-written persistence directory
    /// yields an empty ledger, not an error.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, persist_dir: Option<PathBuf>) -> Self {
        let (versions, claims) = persist_dir
            .as_deref()
            .map(restore_state)
            .unwrap_or_default();

        Self {
            root: root.into(),
            persist_dir,
            ast: None,
            path_locks: Mutex::new(HashMap::new()),
            versions: RwLock::new(versions),
            claims: RwLock::new(claims),
            write_log: StdMutex::new(Vec::new()),
        }
    }

    /// Attach the code-intelligence index; successful writes are reported to
    /// it via `notify_file_changed`.
    #[must_use]
    pub fn with_ast_service(mut self, ast: Arc<dyn AstService>) -> Self {
        self.ast = Some(ast);
        self
    }

    /// Workspace root the ledger resolves paths against.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read the current on-disk content of `path` (empty string if absent),
    /// record its hash as the path's known version, and return the snapshot
    /// the caller embeds in a task's dispatch payload.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read, or if
    /// persistence fails.
    pub async fn snapshot_file(&self, path: &Path, agent_id: AgentId) -> Result<FileVersion> {
        let lock = self.path_lock(path).await;
        let _guard = lock.lock().await;

        let disk_path = self.resolve(path);
        let content = match fs::read_to_string(&disk_path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(error) => return Err(SwarmError::Io(error)),
        };
        let hash = content_hash(&content);

        {
            let mut versions = self.versions.write().await;
            versions.insert(path.to_path_buf(), hash.clone());
            self.persist_versions(&versions)?;
        }

        Ok(FileVersion {
            path: path.to_path_buf(),
            hash,
            content,
            agent_id,
            timestamp: Utc::now(),
        })
    }

    /// Grant an advisory claim. Returns `false` — without blocking — only
    /// when a *different* agent already holds an exclusive claim on the path.
    ///
    /// # Errors
    /// Returns an error only if persistence fails.
    pub async fn claim_file(
        &self,
        path: &Path,
        agent_id: AgentId,
        task_id: TaskId,
        claim_type: ClaimType,
    ) -> Result<bool> {
        let mut claims = self.claims.write().await;
        let holders = claims.entry(path.to_path_buf()).or_default();

        let blocked = holders.iter().any(|claim| {
            claim.claim_type == ClaimType::Exclusive && claim.agent_id != agent_id
        });
        if blocked {
            return Ok(false);
        }

        let base_version_hash = {
            let versions = self.versions.read().await;
            versions.get(path).cloned().unwrap_or_default()
        };

        holders.push(FileClaim {
            path: path.to_path_buf(),
            agent_id,
            task_id,
            base_version_hash,
            claim_type,
            claimed_at: Utc::now(),
        });
        self.persist_claims(&claims)?;
        Ok(true)
    }

    /// Remove one agent's claim on a path. Releasing a claim you don't hold
    /// is a no-op.
    ///
    /// # Errors
    /// Returns an error only if persistence fails.
    pub async fn release_claim(&self, path: &Path, agent_id: AgentId) -> Result<()> {
        let mut claims = self.claims.write().await;
        if let Some(holders) = claims.get_mut(path) {
            holders.retain(|claim| claim.agent_id != agent_id);
            if holders.is_empty() {
                claims.remove(path);
            }
        }
        self.persist_claims(&claims)?;
        Ok(())
    }

    /// Remove every claim held by an agent. Idempotent.
    ///
    /// # Errors
    /// Returns an error only if persistence fails.
    pub async fn release_all_claims(&self, agent_id: AgentId) -> Result<()> {
        let mut claims = self.claims.write().await;
        claims.retain(|_path, holders| {
            holders.retain(|claim| claim.agent_id != agent_id);
            !holders.is_empty()
        });
        self.persist_claims(&claims)?;
        Ok(())
    }

    /// The compare-and-swap core.
    ///
    /// The write reaches disk iff `base_hash` matches the ledger's current
    /// hash for the path (a previously-unknown path always accepts its first
    /// write). On a mismatch the disk is left untouched and the result
    /// carries the *current* hash so the caller can re-snapshot and retry or
    /// escalate to reconciliation. The ledger itself never retries.
    ///
    /// Disk writes go to a temporary file first and are renamed into place;
    /// the recorded hash is only updated after the rename succeeds, so a
    /// crash mid-write cannot record a hash the disk never held.
    ///
    /// # Errors
    /// Returns an error for I/O or persistence failures. A conflict is not
    /// an error.
    pub async fn attempt_write(
        &self,
        path: &Path,
        agent_id: AgentId,
        task_id: TaskId,
        content: &str,
        base_hash: &str,
    ) -> Result<WriteResult> {
        let lock = self.path_lock(path).await;
        let _guard = lock.lock().await;

        let current = {
            let versions = self.versions.read().await;
            versions.get(path).cloned()
        };
        let new_hash = content_hash(content);

        // Unknown path (or an empty recorded hash) acts as a wildcard.
        let matches = match current.as_deref() {
            None | Some("") => true,
            Some(current_hash) => current_hash == base_hash,
        };

        if !matches {
            let current_hash = current.unwrap_or_default();
            tracing::debug!(
                path = %path.display(),
                %task_id,
                "optimistic write rejected: base hash is stale"
            );
            self.append_log(WriteLogEntry {
                timestamp: Utc::now(),
                path: path.to_path_buf(),
                agent_id,
                task_id,
                base_hash: base_hash.to_owned(),
                new_hash,
                conflict: true,
            })?;
            return Ok(WriteResult {
                success: false,
                conflict: true,
                final_hash: current_hash,
                error: None,
            });
        }

        self.write_to_disk(path, content)?;

        {
            let mut versions = self.versions.write().await;
            versions.insert(path.to_path_buf(), new_hash.clone());
            self.persist_versions(&versions)?;
        }
        self.append_log(WriteLogEntry {
            timestamp: Utc::now(),
            path: path.to_path_buf(),
            agent_id,
            task_id,
            base_hash: base_hash.to_owned(),
            new_hash: new_hash.clone(),
            conflict: false,
        })?;

        if let Some(ast) = &self.ast {
            ast.notify_file_changed(path).await;
        }

        Ok(WriteResult {
            success: true,
            conflict: false,
            final_hash: new_hash,
            error: None,
        })
    }

    /// Every claim currently held, across all paths.
    pub async fn get_active_claims(&self) -> Vec<FileClaim> {
        let claims = self.claims.read().await;
        claims.values().flatten().cloned().collect()
    }

    /// The last recorded content hash for a path, if any.
    pub async fn get_version(&self, path: &Path) -> Option<String> {
        let versions = self.versions.read().await;
        versions.get(path).cloned()
    }

    /// The full write-attempt history, oldest first.
    #[must_use]
    pub fn get_write_log(&self) -> Vec<WriteLogEntry> {
        self.write_log.lock_ignore_poison().clone()
    }

    async fn path_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.path_locks.lock().await;
        let lock = locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())));
        Arc::clone(lock)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn write_to_disk(&self, path: &Path, content: &str) -> Result<()> {
        let disk_path = self.resolve(path);
        if let Some(parent) = disk_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = tmp_sibling(&disk_path);
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &disk_path)?;
        Ok(())
    }

    fn append_log(&self, entry: WriteLogEntry) -> Result<()> {
        if let Some(dir) = &self.persist_dir {
            append_jsonl(&dir.join("write_log.jsonl"), &entry)?;
        }
        self.write_log.lock_ignore_poison().push(entry);
        Ok(())
    }

    fn persist_versions(&self, versions: &HashMap<PathBuf, String>) -> Result<()> {
        if let Some(dir) = &self.persist_dir {
            write_json_atomic(&dir.join("versions.json"), versions)?;
        }
        Ok(())
    }

    fn persist_claims(&self, claims: &HashMap<PathBuf, Vec<FileClaim>>) -> Result<()> {
        if let Some(dir) = &self.persist_dir {
            write_json_atomic(&dir.join("claims.json"), claims)?;
        }
        Ok(())
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ledger".to_owned());
    name.push_str(".tmp");
    path.with_file_name(name)
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|error| SwarmError::LedgerPersist {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp_path = tmp_sibling(path);
    fs::write(&tmp_path, json).map_err(|error| SwarmError::LedgerPersist {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;
    fs::rename(&tmp_path, path).map_err(|error| SwarmError::LedgerPersist {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;
    Ok(())
}

fn append_jsonl<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    use std::io::Write as _;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|error| SwarmError::LedgerPersist {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;
    }
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|error| SwarmError::LedgerPersist {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;
    file.write_all(line.as_bytes())
        .map_err(|error| SwarmError::LedgerPersist {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;
    Ok(())
}

type RestoredState = (HashMap<PathBuf, String>, HashMap<PathBuf, Vec<FileClaim>>);

/// Load persisted versions and claims, tolerating a missing or
/// partially-written directory: anything unreadable restores as empty.
fn restore_state(dir: &Path) -> RestoredState {
    let versions = read_json_or_default(&dir.join("versions.json"));
    let claims = read_json_or_default(&dir.join("claims.json"));
    (versions, claims)
}

fn read_json_or_default<T: for<'de> Deserialize<'de> + Default>(path: &Path) -> T {
    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    %error,
                    "ledger state unreadable, restoring empty"
                );
                T::default()
            }
        },
        Err(_) => T::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_root() -> TempDir {
        match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("create temp dir failed: {error}"),
        }
    }

    #[tokio::test]
    async fn snapshot_of_absent_file_is_empty() {
        let root = temp_root();
        let ledger = FileLedger::new(root.path(), None);
        let agent = AgentId::new();

        let version = match ledger.snapshot_file(Path::new("x.py"), agent).await {
            Ok(version) => version,
            Err(error) => panic!("snapshot failed: {error}"),
        };
        assert_eq!(version.content, "");
        assert_eq!(version.hash, content_hash(""));
        assert_eq!(
            ledger.get_version(Path::new("x.py")).await,
            Some(content_hash(""))
        );
    }

    #[tokio::test]
    async fn write_succeeds_against_matching_base() {
        let root = temp_root();
        let ledger = FileLedger::new(root.path(), None);
        let agent = AgentId::new();
        let task = TaskId::new();
        let path = Path::new("x.py");

        let snapshot = match ledger.snapshot_file(path, agent).await {
            Ok(version) => version,
            Err(error) => panic!("snapshot failed: {error}"),
        };
        let result = match ledger
            .attempt_write(path, agent, task, "def f():\n    pass\n", &snapshot.hash)
            .await
        {
            Ok(result) => result,
            Err(error) => panic!("write failed: {error}"),
        };

        assert!(result.success);
        assert!(!result.conflict);
        assert_eq!(result.final_hash, content_hash("def f():\n    pass\n"));

        let on_disk = match fs::read_to_string(root.path().join(path)) {
            Ok(content) => content,
            Err(error) => panic!("read back failed: {error}"),
        };
        assert_eq!(on_disk, "def f():\n    pass\n");
    }

    #[tokio::test]
    async fn stale_base_conflicts_and_leaves_disk_untouched() {
        let root = temp_root();
        let ledger = FileLedger::new(root.path(), None);
        let first = AgentId::new();
        let second = AgentId::new();
        let task = TaskId::new();
        let path = Path::new("x.py");

        let snapshot = match ledger.snapshot_file(path, first).await {
            Ok(version) => version,
            Err(error) => panic!("snapshot failed: {error}"),
        };
        let base = snapshot.hash;

        let winner = match ledger
            .attempt_write(path, first, task, "first\n", &base)
            .await
        {
            Ok(result) => result,
            Err(error) => panic!("first write failed: {error}"),
        };
        assert!(winner.success);

        // Second writer still holds the pre-write hash.
        let loser = match ledger
            .attempt_write(path, second, task, "second\n", &base)
            .await
        {
            Ok(result) => result,
            Err(error) => panic!("second write errored: {error}"),
        };
        assert!(!loser.success);
        assert!(loser.conflict);
        assert_eq!(loser.final_hash, content_hash("first\n"));

        let on_disk = match fs::read_to_string(root.path().join(path)) {
            Ok(content) => content,
            Err(error) => panic!("read back failed: {error}"),
        };
        assert_eq!(on_disk, "first\n");

        let log = ledger.get_write_log();
        assert_eq!(log.len(), 2);
        assert!(!log[0].conflict);
        assert!(log[1].conflict);
    }

    #[tokio::test]
    async fn first_write_to_unknown_path_always_succeeds() {
        let root = temp_root();
        let ledger = FileLedger::new(root.path(), None);
        let result = match ledger
            .attempt_write(
                Path::new("new.py"),
                AgentId::new(),
                TaskId::new(),
                "content",
                "whatever-the-caller-thought",
            )
            .await
        {
            Ok(result) => result,
            Err(error) => panic!("write failed: {error}"),
        };
        assert!(result.success);
    }

    #[tokio::test]
    async fn exclusive_claims_block_other_agents_only() {
        let root = temp_root();
        let ledger = FileLedger::new(root.path(), None);
        let holder = AgentId::new();
        let other = AgentId::new();
        let path = Path::new("x.py");

        let granted = match ledger
            .claim_file(path, holder, TaskId::new(), ClaimType::Exclusive)
            .await
        {
            Ok(granted) => granted,
            Err(error) => panic!("claim failed: {error}"),
        };
        assert!(granted);

        let denied = match ledger
            .claim_file(path, other, TaskId::new(), ClaimType::Exclusive)
            .await
        {
            Ok(granted) => granted,
            Err(error) => panic!("claim failed: {error}"),
        };
        assert!(!denied);

        // The holder itself may stack claims.
        let again = match ledger
            .claim_file(path, holder, TaskId::new(), ClaimType::Section)
            .await
        {
            Ok(granted) => granted,
            Err(error) => panic!("claim failed: {error}"),
        };
        assert!(again);

        if let Err(error) = ledger.release_all_claims(holder).await {
            panic!("release failed: {error}");
        }
        let granted_after = match ledger
            .claim_file(path, other, TaskId::new(), ClaimType::Exclusive)
            .await
        {
            Ok(granted) => granted,
            Err(error) => panic!("claim failed: {error}"),
        };
        assert!(granted_after);
    }

    #[tokio::test]
    async fn releasing_unheld_claim_is_a_no_op() {
        let root = temp_root();
        let ledger = FileLedger::new(root.path(), None);
        if let Err(error) = ledger
            .release_claim(Path::new("x.py"), AgentId::new())
            .await
        {
            panic!("release errored: {error}");
        }
        assert!(ledger.get_active_claims().await.is_empty());
    }

    #[tokio::test]
    async fn different_paths_do_not_contend() {
        let root = temp_root();
        let ledger = Arc::new(FileLedger::new(root.path(), None));
        let agent = AgentId::new();
        let task = TaskId::new();

        let ledger_a = Arc::clone(&ledger);
        let ledger_b = Arc::clone(&ledger);
        let (left, right) = tokio::join!(
            ledger_a.attempt_write(Path::new("a.py"), agent, task, "a", ""),
            ledger_b.attempt_write(Path::new("b.py"), agent, task, "b", ""),
        );
        match (left, right) {
            (Ok(left), Ok(right)) => {
                assert!(left.success);
                assert!(right.success);
            }
            (left, right) => panic!("concurrent writes failed: {left:?} {right:?}"),
        }
    }

    #[tokio::test]
    async fn state_survives_restart() {
        let root = temp_root();
        let persist = temp_root();
        let agent = AgentId::new();
        let path = Path::new("x.py");

        {
            let ledger = FileLedger::new(root.path(), Some(persist.path().to_path_buf()));
            if let Err(error) = ledger
                .attempt_write(path, agent, TaskId::new(), "persisted\n", "")
                .await
            {
                panic!("write failed: {error}");
            }
        }

        let restored = FileLedger::new(root.path(), Some(persist.path().to_path_buf()));
        assert_eq!(
            restored.get_version(path).await,
            Some(content_hash("persisted\n"))
        );
    }

    #[tokio::test]
    async fn corrupt_persistence_restores_empty() {
        let root = temp_root();
        let persist = temp_root();
        if let Err(error) = fs::write(persist.path().join("versions.json"), "{not json") {
            panic!("seed corrupt file failed: {error}");
        }

        let ledger = FileLedger::new(root.path(), Some(persist.path().to_path_buf()));
        assert_eq!(ledger.get_version(Path::new("x.py")).await, None);
    }
}
