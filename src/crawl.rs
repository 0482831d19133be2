//! Flat crawl-node bookkeeping for the simulated site map.
//!
//! Nodes are kept in discovery order. The only structure is the optional
//! parent pointer, which refers to the deepest known ancestor path at the
//! time the node was inserted.

use crate::types::{CrawlNode, NodeStatus};
use std::collections::HashMap;
use url::Url;

#[derive(Debug, Clone, Default)]
pub struct CrawlMap {
    nodes: Vec<CrawlNode>,
    index: HashMap<String, usize>,
}

/// Reduce a path or URL to `/a/b` form: leading slash, no trailing slash
/// (except for the root), query and fragment removed.
pub fn normalize_path(raw: &str) -> String {
    let raw = raw.trim();
    let path = match Url::parse(raw) {
        Ok(url) if url.has_host() => url.path().to_string(),
        _ => raw
            .split(|c: char| c == '?' || c == '#')
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

fn depth_of(path: &str) -> u32 {
    path.split('/').filter(|s| !s.is_empty()).count() as u32
}

impl CrawlMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[CrawlNode] {
        &self.nodes
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(&normalize_path(path))
    }

    pub fn get(&self, path: &str) -> Option<&CrawlNode> {
        self.index.get(&normalize_path(path)).map(|&i| &self.nodes[i])
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
    }

    /// Insert a pending node. Returns `None` when the path is already known.
    pub fn insert(&mut self, raw: &str) -> Option<CrawlNode> {
        let path = normalize_path(raw);
        if self.index.contains_key(&path) {
            return None;
        }

        let node = CrawlNode {
            id: uuid::Uuid::new_v4().to_string(),
            depth: depth_of(&path),
            parent: self.find_parent(&path),
            status: NodeStatus::Pending,
            path: path.clone(),
        };

        self.index.insert(path, self.nodes.len());
        self.nodes.push(node.clone());
        Some(node)
    }

    /// Flag the node at `location` as vulnerable, inserting it first if the
    /// crawler never reported it. Returns the node whenever its status
    /// changed, `None` if it was already flagged.
    pub fn mark_vuln(&mut self, location: &str) -> Option<CrawlNode> {
        self.insert(location);
        let &i = self.index.get(&normalize_path(location))?;
        let node = &mut self.nodes[i];
        if node.status == NodeStatus::Vuln {
            return None;
        }
        node.status = NodeStatus::Vuln;
        Some(node.clone())
    }

    /// Promote every pending node to visited; vulnerable nodes stay flagged.
    pub fn mark_visited_all(&mut self) {
        for node in &mut self.nodes {
            if node.status == NodeStatus::Pending {
                node.status = NodeStatus::Visited;
            }
        }
    }

    pub fn count_by_status(&self, status: NodeStatus) -> usize {
        self.nodes.iter().filter(|n| n.status == status).count()
    }

    fn find_parent(&self, path: &str) -> Option<String> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return None;
        }

        for len in (0..segments.len()).rev() {
            let candidate = if len == 0 {
                "/".to_string()
            } else {
                format!("/{}", segments[..len].join("/"))
            };
            if let Some(&i) = self.index.get(&candidate) {
                return Some(self.nodes[i].id.clone());
            }
        }
        None
    }
}
