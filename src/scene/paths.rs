//! DAG path helpers.
//!
//! DAG node paths are `|`-separated and absolute (`|group|child`); dependency
//! nodes (render globals, AOV nodes, ...) go by bare name. Namespaces prefix
//! individual path segments (`|rig:root|rig:spine`).

/// Whether a node path names a DAG node.
pub fn is_dag(path: &str) -> bool {
    path.starts_with('|')
}

/// Last path segment, namespace included (`|a|ns:b` -> `ns:b`).
pub fn leaf(path: &str) -> &str {
    path.rsplit('|').next().unwrap_or(path)
}

/// Last path segment with any namespace stripped (`|a|ns:b` -> `b`).
pub fn base_name(path: &str) -> &str {
    let l = leaf(path);
    l.rsplit(':').next().unwrap_or(l)
}

/// Parent path, if the node is not a hierarchy root.
pub fn parent(path: &str) -> Option<&str> {
    if !is_dag(path) {
        return None;
    }
    match path.rfind('|') {
        Some(0) | None => None,
        Some(i) => Some(&path[..i]),
    }
}

/// Ancestor paths from the immediate parent upward (`|a|b|c` -> `|a|b`, `|a`).
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(parent(path), |p| parent(p))
}

/// Whether `candidate` lies strictly below `root` in the hierarchy.
pub fn is_descendant_of(candidate: &str, root: &str) -> bool {
    candidate.len() > root.len()
        && candidate.starts_with(root)
        && candidate.as_bytes()[root.len()] == b'|'
}

/// Prefix every path segment with a namespace (`|a|b` + `chr` -> `|chr:a|chr:b`).
/// Bare dependency-node names pass through unchanged.
pub fn with_namespace(path: &str, namespace: &str) -> String {
    if !is_dag(path) {
        return path.to_owned();
    }
    let mut out = String::with_capacity(path.len() + namespace.len() * 4);
    for segment in path.split('|').skip(1) {
        out.push('|');
        out.push_str(namespace);
        out.push(':');
        out.push_str(segment);
    }
    out
}

/// Whether the node's leaf name sits in the given namespace.
pub fn in_namespace(path: &str, namespace: &str) -> bool {
    match leaf(path).split_once(':') {
        Some((ns, _)) => ns == namespace,
        None => false,
    }
}

/// Join a directory and a file name with forward slashes, normalizing any
/// host-native separators already present.
pub fn slash_join(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches(['/', '\\']);
    format!("{dir}/{name}").replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_and_ancestors_walk_upward() {
        assert_eq!(parent("|a|b|c"), Some("|a|b"));
        assert_eq!(parent("|a"), None);
        assert_eq!(parent("persp"), None);

        let anc: Vec<&str> = ancestors("|a|b|c").collect();
        assert_eq!(anc, vec!["|a|b", "|a"]);
    }

    #[test]
    fn descendant_check_requires_segment_boundary() {
        assert!(is_descendant_of("|grp|child", "|grp"));
        assert!(is_descendant_of("|grp|a|b", "|grp"));
        assert!(!is_descendant_of("|grpX", "|grp"));
        assert!(!is_descendant_of("|grp", "|grp"));
    }

    #[test]
    fn namespace_prefixes_every_segment() {
        assert_eq!(with_namespace("|a|b", "chr"), "|chr:a|chr:b");
        assert_eq!(with_namespace("node", "chr"), "node");
    }

    #[test]
    fn leaf_and_base_name_strip_hierarchy_and_namespace() {
        assert_eq!(leaf("|a|ns:b"), "ns:b");
        assert_eq!(base_name("|a|ns:b"), "b");
        assert_eq!(base_name("persp"), "persp");
        assert!(in_namespace("|a|ns:b", "ns"));
        assert!(!in_namespace("|a|b", "ns"));
    }

    #[test]
    fn slash_join_normalizes_separators() {
        assert_eq!(
            slash_join("C:\\work\\proj", "renders\\beauty.exr"),
            "C:/work/proj/renders/beauty.exr"
        );
        assert_eq!(slash_join("/work/proj/", "a.exr"), "/work/proj/a.exr");
    }
}
