//! Pipeline adapters binding the engine to the host callback model.
//!
//! The host feeds one record at a time and signals group and stream
//! boundaries - exactly the three hooks of [`RecordStream`]. Network
//! retrieval and transmission are external collaborators behind the
//! [`GraphSource`] and [`GraphTransport`] traits; everything here is thin
//! glue around the flattening engine and the record assembler.

use tracing::{error, info, warn};

use crate::appearance::AppearanceCache;
use crate::assemble::{assemble, record_to_node};
use crate::flatten::Flattener;
use crate::graph::GraphNode;
use crate::record::{AttrValue, FlatRecord};
use crate::util::{Error, Result};

/// Attribute carrying the remote target URL on inbound records.
pub const SOURCE_URL_ATTR: &str = "source_url";

/// Per-record lifecycle contract with the host environment.
///
/// Zero or more `on_record` calls are followed by exactly one
/// `on_group_end` per group; `on_stream_end` closes the run. Each hook
/// returns the records to emit downstream.
pub trait RecordStream {
    /// Process one incoming record.
    fn on_record(&mut self, record: FlatRecord) -> Vec<FlatRecord>;
    /// Close the current group.
    fn on_group_end(&mut self) -> Vec<FlatRecord>;
    /// Close the run.
    fn on_stream_end(&mut self) -> Vec<FlatRecord>;
}

/// Stream-level metadata from the remote store.
#[derive(Clone, Debug, Default)]
pub struct StreamInfo {
    /// Stream display name.
    pub name: String,
    /// Stream description.
    pub description: String,
    /// Public visibility flag.
    pub is_public: bool,
}

/// Branch-level metadata from the remote store.
#[derive(Clone, Debug, Default)]
pub struct BranchInfo {
    /// Branch id.
    pub id: String,
    /// Branch name.
    pub name: String,
    /// Branch description.
    pub description: String,
    /// Number of commits on the branch.
    pub commit_count: i64,
    /// Id of the most recent commit, if any.
    pub last_commit: Option<String>,
}

/// Commit-level metadata from the remote store.
#[derive(Clone, Debug, Default)]
pub struct CommitInfo {
    /// Commit message.
    pub message: String,
    /// Root object id referenced by the commit.
    pub referenced_object: Option<String>,
    /// Application that produced the commit.
    pub source_application: String,
    /// Total transitive child object count.
    pub total_children_count: i64,
    /// Author display name.
    pub author_name: String,
    /// Author id.
    pub author_id: String,
    /// Branch the commit landed on.
    pub branch_name: String,
    /// Creation timestamp, as reported by the store.
    pub created_at: String,
}

/// Remote retrieval collaborator.
///
/// Any error is fatal to that request only; the adapter rejects the
/// triggering record and the run continues.
pub trait GraphSource {
    /// Fetch stream metadata.
    fn fetch_stream_info(&mut self, stream_id: &str) -> Result<StreamInfo>;
    /// Fetch branch metadata.
    fn fetch_branch_info(&mut self, stream_id: &str, branch: &str) -> Result<BranchInfo>;
    /// Fetch commit metadata.
    fn fetch_commit(&mut self, stream_id: &str, commit_id: &str) -> Result<CommitInfo>;
    /// Fetch an object graph by root object id.
    fn fetch_object(&mut self, object_id: &str) -> Result<GraphNode>;
}

/// Remote transmission collaborator for the outbound direction.
pub trait GraphTransport {
    /// Send a root object graph; returns the stored object id.
    fn send(&mut self, target: &TargetRef, root: &GraphNode) -> Result<String>;
    /// Create a commit referencing a stored object; returns the commit id.
    fn commit(&mut self, target: &TargetRef, object_id: &str, message: &str) -> Result<String>;
}

/// Parsed remote target: stream plus optional branch/commit/object parts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetRef {
    /// Store host name.
    pub host: String,
    /// Stream id.
    pub stream_id: String,
    /// Branch name, when the URL names one.
    pub branch_name: Option<String>,
    /// Commit id, when the URL names one.
    pub commit_id: Option<String>,
    /// Object id, when the URL names one.
    pub object_id: Option<String>,
}

impl TargetRef {
    /// Parse a store URL of the form
    /// `https://host/streams/<id>[/branches/<name>|/commits/<id>|/objects/<id>]`.
    pub fn parse(url: &str) -> Result<Self> {
        let stripped = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .unwrap_or(url);
        let mut segments = stripped.split('/').filter(|s| !s.is_empty());

        let host = segments
            .next()
            .ok_or_else(|| Error::invalid(format!("empty target url: {url}")))?
            .to_string();

        let mut target = TargetRef {
            host,
            ..TargetRef::default()
        };

        while let Some(segment) = segments.next() {
            let value = segments.next();
            match (segment, value) {
                ("streams", Some(id)) => target.stream_id = id.to_string(),
                ("branches", Some(name)) => target.branch_name = Some(name.to_string()),
                ("commits", Some(id)) => target.commit_id = Some(id.to_string()),
                ("objects", Some(id)) => target.object_id = Some(id.to_string()),
                _ => {
                    return Err(Error::invalid(format!(
                        "unrecognized target url segment '{segment}' in {url}"
                    )))
                }
            }
        }

        if target.stream_id.is_empty() {
            return Err(Error::invalid(format!("no stream id in target url: {url}")));
        }
        Ok(target)
    }
}

/// Inbound adapter: expands records naming a remote target into the
/// flattened contents of that target.
pub struct GraphReader<S> {
    source: S,
    cache: AppearanceCache,
}

impl<S: GraphSource> GraphReader<S> {
    /// Create a reader over a retrieval collaborator.
    ///
    /// The reader owns a fresh appearance cache; one reader is one
    /// conversion run.
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: AppearanceCache::new(),
        }
    }

    fn stream_record(&mut self, target: &TargetRef) -> FlatRecord {
        let mut record = FlatRecord::new("Graph.Stream", target.stream_id.clone(), None);
        match self.source.fetch_stream_info(&target.stream_id) {
            Ok(info) => {
                record.set("name", info.name);
                record.set("description", info.description);
                record.set("is_public", info.is_public);
            }
            Err(e) => {
                error!(stream = %target.stream_id, %e, "stream fetch failed");
                record.reject(e.to_string());
            }
        }
        record
    }

    fn branch_record(&mut self, target: &TargetRef, branch: &str) -> FlatRecord {
        let mut record = FlatRecord::new("Graph.Branch", branch, None);
        match self.source.fetch_branch_info(&target.stream_id, branch) {
            Ok(info) => {
                record.id = info.id;
                record.set("name", info.name);
                record.set("description", info.description);
                record.set("commit_count", info.commit_count);
                match info.last_commit {
                    Some(id) => record.set("last_commit", id),
                    None => record.set_null("last_commit", crate::record::AttrType::String),
                }
            }
            Err(e) => {
                error!(branch, %e, "branch fetch failed");
                record.reject(e.to_string());
            }
        }
        record
    }

    /// Fetch a commit, emit its summary record, and flatten the graph it
    /// references.
    fn commit_records(&mut self, target: &TargetRef, commit_id: &str) -> Vec<FlatRecord> {
        let mut out = Vec::new();
        let mut record = FlatRecord::new("Graph.Commit", commit_id, None);

        match self.source.fetch_commit(&target.stream_id, commit_id) {
            Ok(info) => {
                record.set("commit.message", info.message);
                record.set("commit.source_application", info.source_application);
                record.set("commit.total_children_count", info.total_children_count);
                record.set("commit.author_name", info.author_name);
                record.set("commit.author_id", info.author_id);
                record.set("commit.branch_name", info.branch_name);
                record.set("commit.created_at", info.created_at);
                if let Some(object_id) = info.referenced_object {
                    record.set("commit.referenced_object", object_id.clone());
                    out.extend(self.object_records(&object_id));
                }
            }
            Err(e) => {
                error!(commit = commit_id, %e, "commit fetch failed");
                record.reject(e.to_string());
            }
        }

        out.push(record);
        out
    }

    fn object_records(&mut self, object_id: &str) -> Vec<FlatRecord> {
        match self.source.fetch_object(object_id) {
            Ok(root) => {
                let mut flattener = Flattener::new(&mut self.cache);
                flattener.flatten(&root);
                flattener.into_batch()
            }
            Err(e) => {
                error!(object = object_id, %e, "object fetch failed");
                let mut record = FlatRecord::new("Base", object_id, None);
                record.reject(e.to_string());
                vec![record]
            }
        }
    }
}

impl<S: GraphSource> RecordStream for GraphReader<S> {
    fn on_record(&mut self, mut record: FlatRecord) -> Vec<FlatRecord> {
        let url = match record.get(SOURCE_URL_ATTR).and_then(AttrValue::as_str) {
            Some(url) => url.to_string(),
            None => {
                warn!("no {SOURCE_URL_ATTR} attribute found");
                record.reject(format!("No {SOURCE_URL_ATTR} attribute"));
                return vec![record];
            }
        };

        let target = match TargetRef::parse(&url) {
            Ok(target) => target,
            Err(e) => {
                record.reject(e.to_string());
                return vec![record];
            }
        };

        let mut out = vec![self.stream_record(&target)];
        if let Some(commit_id) = target.commit_id.clone() {
            out.extend(self.commit_records(&target, &commit_id));
        }
        if let Some(branch) = target.branch_name.clone() {
            out.push(self.branch_record(&target, &branch));
        }
        if let Some(object_id) = target.object_id.clone() {
            out.extend(self.object_records(&object_id));
        }
        out
    }

    fn on_group_end(&mut self) -> Vec<FlatRecord> {
        Vec::new()
    }

    fn on_stream_end(&mut self) -> Vec<FlatRecord> {
        Vec::new()
    }
}

/// Outbound adapter: accumulates one group's records, then assembles,
/// transmits, and commits them as a single graph.
pub struct GraphWriter<T> {
    transport: T,
    group_tag: String,
    pending: Vec<GraphNode>,
    target: Option<TargetRef>,
    commits: usize,
}

impl<T: GraphTransport> GraphWriter<T> {
    /// Create a writer over a transmission collaborator.
    pub fn new(transport: T, group_tag: impl Into<String>) -> Self {
        Self {
            transport,
            group_tag: group_tag.into(),
            pending: Vec::new(),
            target: None,
            commits: 0,
        }
    }

    /// Number of groups closed so far.
    pub fn num_commits(&self) -> usize {
        self.commits
    }
}

impl<T: GraphTransport> RecordStream for GraphWriter<T> {
    /// Convert and stage one record; the record itself passes through,
    /// annotated with the conversion outcome.
    fn on_record(&mut self, mut record: FlatRecord) -> Vec<FlatRecord> {
        let url = match record.get(SOURCE_URL_ATTR).and_then(AttrValue::as_str) {
            Some(url) => url.to_string(),
            None => {
                warn!("no {SOURCE_URL_ATTR} attribute found");
                record.reject(format!("No {SOURCE_URL_ATTR} attribute"));
                return vec![record];
            }
        };

        match record_to_node(&record) {
            Ok(node) => {
                // The group targets the first convertible record's URL.
                if self.target.is_none() {
                    match TargetRef::parse(&url) {
                        Ok(target) => self.target = Some(target),
                        Err(e) => {
                            record.reject(e.to_string());
                            return vec![record];
                        }
                    }
                }
                self.pending.push(node);
                record.set("converted", true);
            }
            Err(e) => {
                warn!(id = %record.id, %e, "record conversion failed");
                record.reject(e.to_string());
            }
        }
        vec![record]
    }

    /// Close the group: one commit per group, accumulator reset either way.
    fn on_group_end(&mut self) -> Vec<FlatRecord> {
        self.commits += 1;
        let mut summary = FlatRecord::new("Graph.Commit", format!("commit-{}", self.commits), None);

        let pending = std::mem::take(&mut self.pending);
        let target = self.target.take();

        if pending.is_empty() {
            summary.reject("No records converted, so no commit to send");
            return vec![summary];
        }
        let Some(target) = target else {
            summary.reject("No target URL found, so no commit to send");
            return vec![summary];
        };

        let count = pending.len() as i64;
        let message = format!("{count} records committed to {}", target.stream_id);
        summary.set("message", message.clone());
        summary.set("records", count);

        let root = assemble(pending, &self.group_tag);
        match self
            .transport
            .send(&target, &root)
            .and_then(|object_id| self.transport.commit(&target, &object_id, &message))
        {
            Ok(commit_id) => {
                summary.set("status", "Success");
                summary.set("commit", commit_id);
                info!(stream = %target.stream_id, "group committed");
            }
            Err(e) => {
                error!(%e, "commit failed");
                summary.set("status", "Fail");
                summary.reject(e.to_string());
            }
        }
        vec![summary]
    }

    fn on_stream_end(&mut self) -> Vec<FlatRecord> {
        info!(commits = self.commits, "writer closed");
        Vec::new()
    }
}
