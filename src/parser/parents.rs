//! Revision metadata parsing.
//!
//! The graph output carries only the short id tokens. Parents, full
//! commit-ids and authors come from a second, `--no-graph` templated
//! invocation that prints one pipe-delimited record per revision:
//!
//! ```text
//! <change_id>|<full_commit_id>|<author>|<parent change ids, space separated>
//! ```
//!
//! Records that do not match the shape are skipped; a parent with no
//! corresponding row is later dropped by the graph builder. Neither case
//! is an error.

use crate::model::Row;

/// One revision's metadata record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionMeta {
    /// Short change-id, the join key against parsed rows.
    pub change_id: String,
    /// Full commit-id.
    pub full_commit_id: String,
    /// Author as formatted by the template.
    pub author: String,
    /// Declared parent change-ids.
    pub parents: Vec<String>,
}

/// Parse the metadata listing. Malformed lines are skipped.
pub fn parse_revision_meta(text: &str) -> Vec<RevisionMeta> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split('|');
            let change_id = fields.next()?.trim();
            let full_commit_id = fields.next()?.trim();
            let author = fields.next()?.trim();
            let parents = fields.next()?;
            if change_id.is_empty() {
                return None;
            }
            Some(RevisionMeta {
                change_id: change_id.to_string(),
                full_commit_id: full_commit_id.to_string(),
                author: author.to_string(),
                parents: parents
                    .split_whitespace()
                    .map(str::to_string)
                    .collect(),
            })
        })
        .collect()
}

/// Merge metadata records into parsed rows by change-id. Rows with no
/// record keep their defaults.
pub fn annotate_rows(rows: &mut [Row], meta: &[RevisionMeta]) {
    for row in rows.iter_mut() {
        if let Some(m) = meta.iter().find(|m| m.change_id == row.revision.change_id) {
            row.revision.full_commit_id = Some(m.full_commit_id.clone());
            row.revision.author = Some(m.author.clone());
            row.revision.parents = m.parents.clone();
        }
    }
}

/// Flag rows whose change-id appears in a command's reported output, so
/// the renderer can mark them as affected by the last operation.
pub fn mark_affected(rows: &mut [Row], command_output: &str) {
    for row in rows.iter_mut() {
        let id = &row.revision.change_id;
        if !id.is_empty() && command_output.contains(id.as_str()) {
            row.is_affected = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Revision;

    #[test]
    fn parses_records_with_parents() {
        let meta = parse_revision_meta(
            "xvq|1a2b3c4d5e6f|alice@example.com|wqp\n\
             wqp|5e6f7a8b9c0d|bob@example.com|zzzzzzzz\n\
             zzzzzzzz|000000000000|root|\n",
        );
        assert_eq!(meta.len(), 3);
        assert_eq!(meta[0].change_id, "xvq");
        assert_eq!(meta[0].parents, vec!["wqp".to_string()]);
        assert!(meta[2].parents.is_empty());
    }

    #[test]
    fn multiple_parents_split_on_whitespace() {
        let meta = parse_revision_meta("mrg|abc123|a@b|one two\n");
        assert_eq!(meta[0].parents, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let meta = parse_revision_meta(
            "not a record\n\
             xvq|1a2b|a@b|\n\
             missing|fields\n",
        );
        assert_eq!(meta.len(), 1);
        assert_eq!(meta[0].change_id, "xvq");
    }

    #[test]
    fn annotate_fills_matching_rows_only() {
        let mut rows = vec![
            Row::new(Revision::new("xvq", "1a2b", 0)),
            Row::new(Revision::new("wqp", "5e6f", 1)),
        ];
        let meta = parse_revision_meta("xvq|1a2b3c4d|alice@example.com|wqp\n");
        annotate_rows(&mut rows, &meta);
        assert_eq!(rows[0].revision.parents, vec!["wqp".to_string()]);
        assert_eq!(
            rows[0].revision.full_commit_id.as_deref(),
            Some("1a2b3c4d")
        );
        assert!(rows[1].revision.parents.is_empty());
    }

    #[test]
    fn mark_affected_matches_change_ids_in_output() {
        let mut rows = vec![
            Row::new(Revision::new("xvq", "1a2b", 0)),
            Row::new(Revision::new("wqp", "5e6f", 1)),
        ];
        mark_affected(&mut rows, "Rebased 1 commits onto xvq");
        assert!(rows[0].is_affected);
        assert!(!rows[1].is_affected);
    }
}
