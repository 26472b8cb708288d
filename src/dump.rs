//! Human-readable views of a tree: one line per leaf, indented by depth.

use crate::node::{NodeId, NodeKind, Tree};
use crate::scalars::format_mac;
use crate::value::Scalar;

/// Format seconds since midnight as HH:MM:SS.
pub fn format_seconds_as_tod(seconds: u64) -> String {
    let secs = seconds % 86_400;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn hex_string(b: &[u8]) -> String {
    b.iter().map(|x| format!("{:02x}", x)).collect::<Vec<_>>().join(" ")
}

/// Classic offset / hex / ASCII dump, 16 bytes per line.
pub fn hexdump(data: &[u8]) -> Vec<String> {
    data.chunks(16)
        .enumerate()
        .map(|(i, chunk)| {
            let ascii: String = chunk
                .iter()
                .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
                .collect();
            format!("{:08x}  {:<47}  |{}|", i * 16, hex_string(chunk), ascii)
        })
        .collect()
}

/// Dump `id` and everything below it.
pub fn to_human(tree: &Tree, id: NodeId) -> Vec<String> {
    let mut lines = Vec::new();
    dump_node(tree, id, 0, &mut lines);
    lines
}

fn label_of(tree: &Tree, id: NodeId) -> String {
    tree.node(id).name().unwrap_or("").to_string()
}

fn dump_node(tree: &Tree, id: NodeId, depth: usize, out: &mut Vec<String>) {
    let pad = "  ".repeat(depth);
    let node = tree.node(id);
    let name = label_of(tree, id);
    match &node.kind {
        NodeKind::Null => out.push(format!("{}{} = <nil>", pad, name)),
        NodeKind::Number(n) => {
            let value = tree.resolve(id, &n.value).ok().and_then(|v| v.as_number());
            let Some(x) = value else {
                out.push(format!("{}{} = <unresolved>", pad, name));
                return;
            };
            let text = if node.is_a("Ipv4") {
                std::net::Ipv4Addr::from(x as u32).to_string()
            } else if node.is_a("TimeT") {
                format!("0x{:x} (day {}, {} UTC)", x, x / 86_400, format_seconds_as_tod(x))
            } else if let Some(labels) = &n.labels {
                let label = labels.get(&x).map(String::as_str).unwrap_or("???");
                format!("{} (0x{:x}) [ {} ]", x, x, label)
            } else {
                format!("{} (0x{:x})", x, x)
            };
            out.push(format!("{}{} = {}", pad, name, text));
        }
        NodeKind::Str(s) => {
            let bytes = match tree.resolve(id, &s.value) {
                Ok(Scalar::Bytes(b)) => b,
                _ => Vec::new(),
            };
            if node.is_a("MacAddr") && bytes.len() == 6 {
                out.push(format!("{}{} = {}", pad, name, format_mac(&bytes)));
            } else if bytes.is_empty() {
                out.push(format!("{}{} = <empty>", pad, name));
            } else {
                out.push(format!("{}{} =", pad, name));
                out.extend(hexdump(&bytes).into_iter().map(|l| format!("{}  {}", pad, l)));
            }
        }
        NodeKind::Structure(s) => {
            let head = if name.is_empty() {
                s.ty.name().to_string()
            } else {
                format!("{} = {}", name, s.ty.name())
            };
            out.push(format!("{}{}", pad, head));
            for &c in tree.children(s.body) {
                dump_node(tree, c, depth + 1, out);
            }
        }
        NodeKind::Blob(children) => {
            let mut depth = depth;
            if !name.is_empty() {
                out.push(format!("{}{} =", pad, name));
                depth += 1;
            }
            for &c in children {
                dump_node(tree, c, depth, out);
            }
        }
        NodeKind::Vector(v) => {
            let elements = tree.children(v.body);
            out.push(format!("{}{} = [{}]", pad, name, elements.len()));
            for &c in elements {
                dump_node(tree, c, depth + 1, out);
            }
        }
        NodeKind::Choice(_) => match tree.selected(id) {
            Some(c) => {
                out.push(format!("{}{} =", pad, name));
                dump_node(tree, c, depth + 1, out);
            }
            None => out.push(format!("{}{} = <empty>", pad, name)),
        },
        NodeKind::Filter(f) => dump_node(tree, f.inner, depth, out),
    }
}
