//! Revision identity.

/// Identity of one revision as reported by the log output and the
/// metadata template.
///
/// The change-id is the stable, human-facing identifier that survives
/// rewrites; the commit-id addresses one concrete snapshot. The short
/// forms come from the graph output itself; the full commit-id, author and
/// declared parents arrive later from the `--no-graph` metadata query and
/// are merged in post-hoc.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Revision {
    /// Short change-id token as printed in the graph.
    pub change_id: String,
    /// Short commit-id token as printed in the graph.
    pub commit_id: String,
    /// Full commit-id, when the metadata query supplied it.
    pub full_commit_id: Option<String>,
    /// Author, when the metadata query supplied it.
    pub author: Option<String>,
    /// Position of the revision in the original log output.
    pub index: usize,
    /// Whether the working copy (`@`) sits on this revision.
    pub is_working_copy: bool,
    /// Whether the log marked the revision hidden.
    pub hidden: bool,
    /// Declared parent change-ids; resolved (or silently dropped) by the
    /// graph builder.
    pub parents: Vec<String>,
}

/// Change-id of the virtual root revision.
const ROOT_CHANGE_ID: &str = "zzzzzzzz";

impl Revision {
    /// Create a revision identity from the tokens found in the graph
    /// output.
    pub fn new(change_id: impl Into<String>, commit_id: impl Into<String>, index: usize) -> Self {
        Self {
            change_id: change_id.into(),
            commit_id: commit_id.into(),
            index,
            ..Self::default()
        }
    }

    /// Whether this is the virtual root revision.
    pub fn is_root(&self) -> bool {
        self.change_id == ROOT_CHANGE_ID
    }
}
