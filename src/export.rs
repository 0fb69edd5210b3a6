//! Snapshot export: a renderer-facing JSON document and a Cypher DUMP.
//!
//! ```text
//! GraphSnapshot → export_json()        → nodes + typed edges, no layout
//!               → export_cypher_dump() → CREATE / MATCH…CREATE statements
//! ```
//!
//! Edges are identified by record ids, never by the snapshot's dense
//! node indices, so exports from different versions line up.

use std::io::Write;

use serde::Serialize;
use serde_json::{Value, json};

use crate::graph::{GraphSnapshot, Placeholder};
use crate::model::*;
use crate::Result;

// ============================================================================
// JSON
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotExport<'g> {
    pub version: u64,
    pub nodes: Vec<NodeExport<'g>>,
    pub edges: Vec<EdgeExport<'g>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeExport<'g> {
    #[serde(flatten)]
    pub node: &'g PersonNode,
    #[serde(skip_serializing_if = "no_placeholders")]
    pub placeholders: &'g [Placeholder],
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeExport<'g> {
    pub source: &'g RecordId,
    pub target: &'g RecordId,
    pub kind: &'g EdgeKind,
    pub attrs: &'g EdgeAttrs,
    pub declared_by: Vec<&'g RecordId>,
}

fn no_placeholders(p: &&[Placeholder]) -> bool {
    p.is_empty()
}

impl<'g> SnapshotExport<'g> {
    pub fn new(g: &'g GraphSnapshot) -> Self {
        let nodes = g.nodes().map(|node| NodeExport { node, placeholders: g.placeholders(node.id) }).collect();
        let edges = g
            .edges()
            .map(|e| EdgeExport {
                source: g.record(e.source),
                target: g.record(e.target),
                kind: &e.kind,
                attrs: &e.attrs,
                declared_by: e.declared_by.iter().map(|n| g.record(*n)).collect(),
            })
            .collect();
        Self { version: g.version(), nodes, edges }
    }
}

pub fn export_json(g: &GraphSnapshot) -> Result<Value> {
    Ok(serde_json::to_value(SnapshotExport::new(g))?)
}

pub fn write_json(g: &GraphSnapshot, writer: &mut dyn Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, &SnapshotExport::new(g))?;
    writeln!(writer)?;
    Ok(())
}

// ============================================================================
// Cypher
// ============================================================================

/// Export a snapshot as a Cypher DUMP script.
///
/// One `CREATE` per node keyed by `cr_id`, then one `MATCH … CREATE` per
/// directed edge. Spouse and sibling pairs appear once per direction,
/// as they are stored.
pub fn export_cypher_dump(g: &GraphSnapshot, writer: &mut dyn Write) -> Result<()> {
    writeln!(writer, "// kinship-graph Cypher DUMP")?;
    writeln!(writer, "// Snapshot version: {}", g.version())?;
    writeln!(writer, "// Nodes: {}", g.node_count())?;
    writeln!(writer, "// Relationships: {}", g.edge_count())?;
    writeln!(writer)?;

    for node in g.nodes() {
        let label = match (node.kind, node.observed) {
            (_, false) => "Unobserved",
            (EntityKind::Person, true) => "Person",
            (EntityKind::Organization, true) => "Organization",
        };
        let mut props = vec![("cr_id", json!(node.record))];
        if let Some(name) = &node.name {
            props.push(("name", json!(name)));
        }
        if node.sex != Sex::Unknown {
            props.push(("sex", json!(node.sex)));
        }
        if let Some(born) = &node.birth {
            props.push(("born", json!(born.text)));
        }
        if let Some(died) = &node.death {
            props.push(("died", json!(died.text)));
        }
        if node.is_root {
            props.push(("root", json!(true)));
        }
        writeln!(writer, "CREATE (:{label} {{{}}});", format_properties(&props))?;
    }

    writeln!(writer)?;
    writeln!(writer, "// Relationships")?;

    for e in g.edges() {
        let (rel_type, props) = relationship(e);
        let props_part = if props.is_empty() { String::new() } else { format!(" {{{}}}", format_properties(&props)) };
        writeln!(
            writer,
            "MATCH (a {{cr_id: {}}}), (b {{cr_id: {}}}) CREATE (a)-[:{rel_type}{props_part}]->(b);",
            format_value(&json!(g.record(e.source))),
            format_value(&json!(g.record(e.target))),
        )?;
    }
    Ok(())
}

fn relationship(e: &Edge) -> (String, Vec<(&'static str, Value)>) {
    let mut props = Vec::new();
    let rel_type = match &e.kind {
        EdgeKind::Parent(role) => {
            props.push(("role", json!(role)));
            "PARENT_OF".to_owned()
        }
        EdgeKind::Spouse => "SPOUSE_OF".to_owned(),
        EdgeKind::Sibling => "SIBLING_OF".to_owned(),
        EdgeKind::Custom(type_id) => {
            props.push(("type", json!(type_id)));
            "RELATED_TO".to_owned()
        }
    };
    match &e.attrs {
        EdgeAttrs::Spouse(meta) => {
            let dates = [("marriage_date", &meta.marriage), ("divorce_date", &meta.divorce)];
            for (key, date) in dates {
                if let Some(date) = date {
                    props.push((key, json!(date.text)));
                }
            }
            if let Some(status) = meta.status {
                props.push(("status", json!(status.as_str())));
            }
            if let Some(order) = meta.order {
                props.push(("order", json!(order)));
            }
            if let Some(location) = &meta.location {
                props.push(("location", json!(location)));
            }
        }
        EdgeAttrs::Custom(meta) => {
            for (key, date) in [("from", &meta.from), ("to", &meta.to)] {
                if let Some(date) = date {
                    props.push((key, json!(date.text)));
                }
            }
            if let Some(notes) = &meta.notes {
                props.push(("notes", json!(notes)));
            }
        }
        EdgeAttrs::None => {}
    }
    (rel_type, props)
}

/// Format properties as a Cypher map body (`key: value, ...`).
fn format_properties(props: &[(&str, Value)]) -> String {
    props.iter().map(|(k, v)| format!("{k}: {}", format_value(v))).collect::<Vec<_>>().join(", ")
}

/// Format a JSON value as a Cypher literal.
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(m) => {
            let inner: Vec<String> = m.iter().map(|(k, v)| format!("{k}: {}", format_value(v))).collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}
