//! Edge-list export: serialize a graph collection as CSV-like lines.
//!
//! ```text
//! graph collection → write_edge_list() → "source,target,edge_id" lines
//!   → read_edge_list() → GraphSession::upsert() in another collection/store
//! ```
//!
//! Each edge is written once, from its source's entry. Vertices are visited
//! in ascending key order through paged scans.

use std::io::{BufRead, Write};
use crate::graph::GraphSession;
use crate::model::{Edge, Key};
use crate::storage::Store;
use crate::{Error, Result};

/// Vertices fetched per scan page.
const PAGE_SIZE: usize = 1024;

/// Write every edge of the graph, one `source,target,edge_id` line each.
/// Returns the number of edges written.
pub fn write_edge_list<S: Store>(graph: &GraphSession<'_, S>, writer: &mut dyn Write) -> Result<usize> {
    writeln!(writer, "# kvgraph edge list")?;
    writeln!(writer, "# source,target,edge_id")?;

    let mut written = 0;
    let mut cursor = Some(Key::MIN);
    while let Some(min_key) = cursor {
        let page = graph.session().scan(min_key, PAGE_SIZE)?;
        for n in graph.neighborhoods(&page.keys)?.into_iter().flatten() {
            for ship in n.outgoing() {
                writeln!(writer, "{},{},{}", n.center(), ship.neighbor, ship.edge_id)?;
                written += 1;
            }
        }
        cursor = match page.keys.last() {
            Some(&last) if page.len() == PAGE_SIZE => last.checked_add(1),
            _ => None,
        };
    }
    Ok(written)
}

/// Parse an edge list produced by [`write_edge_list`]. Blank lines and
/// lines starting with `#` are skipped.
pub fn read_edge_list(reader: impl BufRead) -> Result<Vec<Edge>> {
    let mut edges = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        edges.push(parse_edge(line).ok_or_else(|| Error::Parse {
            line: number + 1,
            reason: format!("expected source,target,edge_id, got {line:?}"),
        })?);
    }
    Ok(edges)
}

fn parse_edge(line: &str) -> Option<Edge> {
    let mut fields = line.split(',').map(|f| f.trim().parse::<Key>());
    let source = fields.next()?.ok()?;
    let target = fields.next()?.ok()?;
    let id = fields.next()?.ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(Edge::new(source, target, id))
}
