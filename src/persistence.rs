//! Text serialization of the graph, verified against the dataset on load.
//!
//! The format is line-oriented and tab-separated in the header:
//!
//! ```text
//! MethodDescription\tsmall_world_rand
//! NN\t<uint>
//! <internal-id>:<object-id>: <friend-id> <friend-id> ...
//! ...
//! <blank line>
//! LineQty\t<total line count, including this line>
//! ```
//!
//! Loading makes two passes over the buffered lines: the first validates
//! every entry against the bound dataset and registers the nodes, the
//! second installs the friend lists (duplicates are not re-deduplicated).
//! Any mismatch with the dataset — an unknown internal id, an object id
//! that moved, a line count that changed — aborts the load.

use crate::config::{QueryParams, METHOD_NAME};
use crate::error::{IndexError, Result};
use crate::nsw::graph::SmallWorldIndex;
use crate::space::Space;
use std::fs;
use std::path::Path;

impl<'a, S: Space> SmallWorldIndex<'a, S> {
    /// Write the graph to `path`, one entry line per node in object-id
    /// order.
    pub fn save_index(&self, path: &Path) -> Result<()> {
        let n = self.data.len();
        let mut out = String::new();
        let mut line_count = 0usize;

        out.push_str(&format!("MethodDescription\t{}\n", self.str_desc()));
        line_count += 1;
        out.push_str(&format!("NN\t{}\n", self.params.nn));
        line_count += 1;

        for (object_id, internal_id) in self.registry.entries() {
            if internal_id as usize >= n {
                return Err(IndexError::Invariant(format!(
                    "node {internal_id} (object {object_id}) out of range for {n} objects"
                )));
            }
            out.push_str(&format!("{internal_id}:{object_id}:"));
            for friend in self.friends(internal_id) {
                if friend as usize >= n {
                    return Err(IndexError::Invariant(format!(
                        "friend id {friend} of node {internal_id} out of range for {n} objects"
                    )));
                }
                out.push_str(&format!(" {friend}"));
            }
            out.push('\n');
            line_count += 1;
        }

        // The empty line marks the end of the entries.
        out.push('\n');
        line_count += 1;
        out.push_str(&format!("LineQty\t{}\n", line_count + 1));

        fs::write(path, out)?;
        tracing::info!(nodes = self.registry.len(), path = %path.display(), "saved index");
        Ok(())
    }

    /// Rebuild the graph from `path`, cross-checking every entry against
    /// the bound dataset. Replaces any graph currently held.
    pub fn load_index(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)?;
        let lines: Vec<&str> = content.lines().collect();
        let n = self.data.len();

        self.reset_graph();
        let mut seen = vec![false; n];

        for pass in 0..2 {
            let mut cursor = 0usize;
            let mut counted = 1usize;

            let method = read_field(&lines, cursor, "MethodDescription")?;
            if method != METHOD_NAME {
                return Err(IndexError::Config(format!(
                    "index file was created by method '{method}', expected '{METHOD_NAME}'"
                )));
            }
            cursor += 1;
            counted += 1;

            let nn: u32 = parse_field(read_field(&lines, cursor, "NN")?, "NN", cursor + 1)?;
            cursor += 1;
            counted += 1;

            let mut entries = 0usize;
            loop {
                let line = *lines.get(cursor).ok_or_else(|| IndexError::Format {
                    line: cursor + 1,
                    msg: "unexpected end of file before the entry terminator".into(),
                })?;
                cursor += 1;
                counted += 1;
                if line.is_empty() {
                    break;
                }

                let (internal_id, object_id, friend_list) = parse_entry(line, cursor)?;
                if internal_id as usize >= n {
                    return Err(IndexError::DataMutation(format!(
                        "entry for node {internal_id} (object {object_id}), dataset has {n} objects"
                    )));
                }
                if self.data[internal_id as usize].id() != object_id {
                    return Err(IndexError::DataMutation(format!(
                        "node {internal_id} maps to object {} in the dataset, index file says {object_id}",
                        self.data[internal_id as usize].id()
                    )));
                }

                if pass == 0 {
                    seen[internal_id as usize] = true;
                    self.registry.insert(object_id, internal_id);
                    if self.entry_point.is_none() {
                        self.entry_point = Some(internal_id);
                    }
                } else {
                    let mut friends = self.nodes[internal_id as usize].friends.lock();
                    for token in friend_list.split_whitespace() {
                        let friend: u32 = token.parse().map_err(|_| IndexError::Format {
                            line: cursor,
                            msg: format!("bad friend id '{token}'"),
                        })?;
                        if friend as usize >= n {
                            return Err(IndexError::Invariant(format!(
                                "friend id {friend} out of range for {n} objects"
                            )));
                        }
                        if !seen[friend as usize] {
                            return Err(IndexError::Invariant(format!(
                                "friend id {friend} has no entry line"
                            )));
                        }
                        friends.push(friend);
                    }
                }
                entries += 1;
            }

            let expected: usize =
                parse_field(read_field(&lines, cursor, "LineQty")?, "LineQty", cursor + 1)?;
            if counted != expected {
                return Err(IndexError::DataMutation(format!(
                    "file declares {expected} lines, read {counted}"
                )));
            }

            if pass == 0 {
                if entries != n {
                    return Err(IndexError::DataMutation(format!(
                        "index file describes {entries} nodes, dataset has {n}"
                    )));
                }
                self.params.nn = nn;
                self.params.ef_construction = self.params.ef_construction.max(nn);
                self.query_params = QueryParams::defaults_for(nn);
            }
        }

        tracing::info!(nodes = self.registry.len(), path = %path.display(), "loaded index");
        Ok(())
    }
}

/// Read a `key\tvalue` header line, returning the value.
fn read_field<'l>(lines: &[&'l str], cursor: usize, key: &str) -> Result<&'l str> {
    let line = *lines.get(cursor).ok_or_else(|| IndexError::Format {
        line: cursor + 1,
        msg: format!("unexpected end of file, expected field '{key}'"),
    })?;
    match line.split_once('\t') {
        Some((name, value)) if name == key => Ok(value),
        _ => Err(IndexError::Format {
            line: cursor + 1,
            msg: format!("expected field '{key}', got '{line}'"),
        }),
    }
}

fn parse_field<T: std::str::FromStr>(value: &str, key: &str, line: usize) -> Result<T> {
    value.trim().parse().map_err(|_| IndexError::Format {
        line,
        msg: format!("cannot parse value '{value}' of field '{key}'"),
    })
}

/// Split `<iid>:<oid>: f1 f2 ...` into its three parts.
fn parse_entry(line: &str, line_no: usize) -> Result<(u32, i64, &str)> {
    let bad = |msg: String| IndexError::Format { line: line_no, msg };
    let (iid, rest) = line
        .split_once(':')
        .ok_or_else(|| bad(format!("missing ':' in entry '{line}'")))?;
    let (oid, friends) = rest
        .split_once(':')
        .ok_or_else(|| bad(format!("missing second ':' in entry '{line}'")))?;
    let internal_id: u32 = iid
        .trim()
        .parse()
        .map_err(|_| bad(format!("bad internal id '{iid}'")))?;
    let object_id: i64 = oid
        .trim()
        .parse()
        .map_err(|_| bad(format!("bad object id '{oid}'")))?;
    Ok((internal_id, object_id, friends))
}
