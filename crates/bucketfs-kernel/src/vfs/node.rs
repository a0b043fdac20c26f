//! Owned file/directory tree.
//!
//! Every non-root node is owned by exactly one parent's `children` map, so
//! detaching a node hands its whole subtree to the caller and dropping it
//! destroys the subtree. There are no back-pointers and no hard links.

use std::collections::BTreeMap;
use std::time::SystemTime;

use bytes::Bytes;

use super::error::{VfsError, VfsResult};
use super::path;
use super::types::{DirEntry, FileAttr, FileType};

/// Payload of a node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// `content` is `None` until the file is written or hydrated.
    File { content: Option<Bytes> },
    Directory { children: BTreeMap<String, Node> },
}

/// A file or directory in the tree.
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    ctime: SystemTime,
    mtime: SystemTime,
    kind: NodeKind,
}

impl Node {
    /// Empty file stub (no content loaded).
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::File { content: None })
    }

    /// Empty directory.
    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(
            name,
            NodeKind::Directory {
                children: BTreeMap::new(),
            },
        )
    }

    /// The unnamed root directory.
    pub fn root() -> Self {
        Self::directory("")
    }

    fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        let now = SystemTime::now();
        Self {
            name: name.into(),
            ctime: now,
            mtime: now,
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn file_type(&self) -> FileType {
        match self.kind {
            NodeKind::File { .. } => FileType::File,
            NodeKind::Directory { .. } => FileType::Directory,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }

    pub fn mtime(&self) -> SystemTime {
        self.mtime
    }

    /// File content, if loaded. Always `None` for directories.
    pub fn content(&self) -> Option<&Bytes> {
        match &self.kind {
            NodeKind::File { content } => content.as_ref(),
            NodeKind::Directory { .. } => None,
        }
    }

    /// Byte length for files, entry count for directories.
    pub fn size(&self) -> u64 {
        match &self.kind {
            NodeKind::File { content } => content.as_ref().map_or(0, |c| c.len() as u64),
            NodeKind::Directory { children } => children.len() as u64,
        }
    }

    pub fn attr(&self) -> FileAttr {
        FileAttr {
            kind: self.file_type(),
            size: self.size(),
            ctime: self.ctime,
            mtime: self.mtime,
        }
    }

    /// Bump `mtime` to now. Never moves it backwards.
    pub fn touch(&mut self) {
        self.mtime = self.mtime.max(SystemTime::now());
    }

    /// Replace file content and bump `mtime`. No-op on directories.
    pub fn set_content(&mut self, bytes: Bytes) {
        if let NodeKind::File { content } = &mut self.kind {
            *content = Some(bytes);
            self.touch();
        }
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    // ========================================================================
    // Children
    // ========================================================================

    pub fn children(&self) -> Option<&BTreeMap<String, Node>> {
        match &self.kind {
            NodeKind::Directory { children } => Some(children),
            NodeKind::File { .. } => None,
        }
    }

    fn children_mut(&mut self) -> Option<&mut BTreeMap<String, Node>> {
        match &mut self.kind {
            NodeKind::Directory { children } => Some(children),
            NodeKind::File { .. } => None,
        }
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children()?.get(name)
    }

    /// Directory listing, name-ordered. Empty for files.
    pub fn entries(&self) -> Vec<DirEntry> {
        self.children()
            .map(|children| {
                children
                    .values()
                    .map(|child| DirEntry::new(child.name.clone(), child.file_type()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Insert a child under its own name, returning any node it replaced.
    /// Files cannot hold children; the child is handed back unchanged.
    pub fn attach(&mut self, child: Node) -> Result<Option<Node>, Node> {
        match self.children_mut() {
            Some(children) => Ok(children.insert(child.name.clone(), child)),
            None => Err(child),
        }
    }

    /// Remove and return a child.
    pub fn detach(&mut self, name: &str) -> Option<Node> {
        self.children_mut()?.remove(name)
    }

    /// Get or create a child directory, replacing a file of the same name.
    pub fn ensure_directory(&mut self, name: &str) -> Option<&mut Node> {
        let children = self.children_mut()?;
        let child = children
            .entry(name.to_string())
            .or_insert_with(|| Node::directory(name));
        if !child.is_dir() {
            *child = Node::directory(name);
        }
        Some(child)
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Walk a path from this node.
    pub fn lookup(&self, path: &str) -> Option<&Node> {
        let mut node = self;
        for segment in path::segments(path) {
            node = node.children()?.get(segment)?;
        }
        Some(node)
    }

    /// Walk a path from this node, mutably.
    pub fn lookup_mut(&mut self, path: &str) -> Option<&mut Node> {
        let mut node = self;
        for segment in path::segments(path) {
            node = node.children_mut()?.get_mut(segment)?;
        }
        Some(node)
    }

    /// Resolve a path that must be a directory.
    pub fn lookup_dir(&self, path: &str) -> VfsResult<&Node> {
        match self.lookup(path) {
            Some(node) if node.is_dir() => Ok(node),
            Some(_) => Err(VfsError::not_a_directory(path)),
            None => Err(VfsError::not_found(path)),
        }
    }

    /// Resolve a path that must be a directory, mutably.
    pub fn lookup_dir_mut(&mut self, path: &str) -> VfsResult<&mut Node> {
        match self.lookup_mut(path) {
            Some(node) if node.is_dir() => Ok(node),
            Some(_) => Err(VfsError::not_a_directory(path)),
            None => Err(VfsError::not_found(path)),
        }
    }

    /// Insert a file at `path`, creating missing directories on the way.
    ///
    /// Used by hydration: the file gets `ctime = mtime = modified`. Fails if
    /// an intermediate segment is a file or the target is a directory.
    pub fn insert_file_at(
        &mut self,
        file_path: &str,
        content: Bytes,
        modified: SystemTime,
    ) -> VfsResult<()> {
        let (parent_path, name) =
            path::split_parent(file_path).ok_or_else(|| VfsError::invalid_path(file_path))?;

        let mut dir = self;
        for segment in path::segments(&parent_path) {
            let children = dir
                .children_mut()
                .ok_or_else(|| VfsError::not_a_directory(file_path))?;
            dir = children
                .entry(segment.to_string())
                .or_insert_with(|| Node::directory(segment));
        }

        let children = dir
            .children_mut()
            .ok_or_else(|| VfsError::not_a_directory(file_path))?;
        if children.get(&name).is_some_and(Node::is_dir) {
            return Err(VfsError::is_a_directory(file_path));
        }

        let mut file = Node::file(name.clone());
        file.kind = NodeKind::File {
            content: Some(content),
        };
        file.ctime = modified;
        file.mtime = modified;
        children.insert(name, file);
        Ok(())
    }

    /// Every file in this subtree as `(path, content)`, where this node
    /// lives at `base`.
    pub fn files(&self, base: &str) -> Vec<(String, Option<Bytes>)> {
        let mut out = Vec::new();
        let mut stack = vec![(path::normalize(base), self)];
        while let Some((node_path, node)) = stack.pop() {
            match &node.kind {
                NodeKind::File { content } => out.push((node_path, content.clone())),
                NodeKind::Directory { children } => {
                    for child in children.values().rev() {
                        stack.push((path::join(&node_path, &child.name), child));
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample_tree() -> Node {
        let mut root = Node::root();
        let now = SystemTime::now();
        root.insert_file_at("/a.txt", Bytes::from_static(b"a"), now)
            .unwrap();
        root.insert_file_at("/dir/b.txt", Bytes::from_static(b"bb"), now)
            .unwrap();
        root.insert_file_at("/dir/sub/c.txt", Bytes::from_static(b"ccc"), now)
            .unwrap();
        root
    }

    #[test]
    fn test_lookup() {
        let root = sample_tree();
        assert!(root.lookup("/").unwrap().is_dir());
        assert!(root.lookup("/dir").unwrap().is_dir());
        assert_eq!(root.lookup("/dir/b.txt").unwrap().size(), 2);
        assert!(root.lookup("/missing").is_none());
        assert!(root.lookup("/a.txt/nested").is_none());
    }

    #[test]
    fn test_lookup_dir_errors() {
        let mut root = sample_tree();
        assert!(matches!(
            root.lookup_dir("/a.txt"),
            Err(VfsError::NotADirectory(_))
        ));
        assert!(matches!(
            root.lookup_dir_mut("/nope"),
            Err(VfsError::NotFound(_))
        ));
    }

    #[test]
    fn test_entries_sorted() {
        let root = sample_tree();
        let names: Vec<_> = root.entries().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a.txt", "dir"]);
        assert!(root.lookup("/a.txt").unwrap().entries().is_empty());
    }

    #[test]
    fn test_insert_file_at_conflicts() {
        let mut root = sample_tree();
        let now = SystemTime::now();
        assert!(matches!(
            root.insert_file_at("/a.txt/x", Bytes::new(), now),
            Err(VfsError::NotADirectory(_))
        ));
        assert!(matches!(
            root.insert_file_at("/dir", Bytes::new(), now),
            Err(VfsError::IsADirectory(_))
        ));
        assert!(matches!(
            root.insert_file_at("/", Bytes::new(), now),
            Err(VfsError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_insert_uses_remote_mtime() {
        let mut root = Node::root();
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        root.insert_file_at("/x", Bytes::from_static(b"x"), modified)
            .unwrap();
        let attr = root.lookup("/x").unwrap().attr();
        assert_eq!(attr.mtime, modified);
        assert_eq!(attr.ctime, modified);
    }

    #[test]
    fn test_touch_is_monotonic() {
        let mut node = Node::file("f");
        let future = SystemTime::now() + Duration::from_secs(3600);
        node.mtime = future;
        node.touch();
        assert_eq!(node.mtime(), future);
    }

    #[test]
    fn test_detach_and_attach() {
        let mut root = sample_tree();
        let mut dir = root.detach("dir").unwrap();
        assert!(root.lookup("/dir/b.txt").is_none());

        dir.set_name("moved");
        assert!(root.attach(dir).unwrap().is_none());
        assert_eq!(
            root.lookup("/moved/sub/c.txt").unwrap().content().unwrap(),
            &Bytes::from_static(b"ccc")
        );

        let mut file = Node::file("f");
        assert!(file.attach(Node::file("g")).is_err());
    }

    #[test]
    fn test_files_walk() {
        let root = sample_tree();
        let files: Vec<_> = root
            .lookup("/dir")
            .unwrap()
            .files("/dir")
            .into_iter()
            .map(|(p, _)| p)
            .collect();
        assert_eq!(files, vec!["/dir/b.txt", "/dir/sub/c.txt"]);
    }

    #[test]
    fn test_ensure_directory_replaces_file() {
        let mut root = sample_tree();
        let dir = root.ensure_directory("a.txt").unwrap();
        assert!(dir.is_dir());
        assert!(root.lookup("/a.txt").unwrap().is_dir());
    }
}
