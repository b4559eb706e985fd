use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use anyhow::{anyhow, ensure};

use crate::{
    api::{self, CommentId, Error, Vote},
    Comment,
};

/// Arena of comments indexed by id
///
/// Cloning is cheap: nodes are shared and copied on write, so a clone taken
/// before a mutation keeps pointing at the untouched nodes.
#[derive(Clone, Debug, Default)]
pub struct CommentTree {
    roots: Arc<Vec<CommentId>>,
    nodes: Arc<HashMap<CommentId, Arc<Comment>>>,

    /// Bumped on every mutation
    version: u64,
}

impl PartialEq for CommentTree {
    fn eq(&self, other: &CommentTree) -> bool {
        self.roots == other.roots && self.nodes == other.nodes
    }
}

impl Eq for CommentTree {}

impl CommentTree {
    pub fn new() -> CommentTree {
        CommentTree::default()
    }

    /// Builds a tree from a store listing, including the reply previews
    pub fn from_records(records: Vec<api::Comment>) -> CommentTree {
        let mut res = CommentTree::new();
        let roots = records
            .into_iter()
            .map(|r| res.add_record_subtree(r))
            .collect();
        res.roots = Arc::new(roots);
        res
    }

    fn add_record_subtree(&mut self, c: api::Comment) -> CommentId {
        let (node, previews) = Comment::from_record(c);
        let id = node.id;
        Arc::make_mut(&mut self.nodes).insert(id, Arc::new(node));
        for p in previews {
            self.add_record_subtree(p);
        }
        id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &CommentId) -> Option<&Arc<Comment>> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &CommentId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Top-level comments, in display order
    pub fn roots(&self) -> &[CommentId] {
        &self.roots
    }

    /// Loaded replies of `id`, empty if `id` is not in the tree
    pub fn replies(&self, id: &CommentId) -> &[CommentId] {
        self.nodes
            .get(id)
            .map(|c| &c.replies as &[CommentId])
            .unwrap_or(&[])
    }

    /// Depth-first walk: each comment is followed by its replies, then by
    /// its next sibling
    pub fn walk(&self) -> impl Iterator<Item = &Arc<Comment>> + '_ {
        let mut stack = self.roots.iter().rev().copied().collect::<Vec<_>>();
        std::iter::from_fn(move || loop {
            let id = stack.pop()?;
            if let Some(c) = self.nodes.get(&id) {
                stack.extend(c.replies.iter().rev().copied());
                return Some(c);
            }
        })
    }

    /// Nested export, for rendering
    pub fn to_records(&self) -> Vec<api::Comment> {
        self.roots
            .iter()
            .filter_map(|id| self.export(id))
            .collect()
    }

    fn export(&self, id: &CommentId) -> Option<api::Comment> {
        let c = self.nodes.get(id)?;
        Some(c.to_record(c.replies.iter().filter_map(|r| self.export(r)).collect()))
    }
}

impl CommentTree {
    fn bump(&mut self) {
        self.version += 1;
    }

    fn node_mut(&mut self, id: &CommentId) -> Result<&mut Comment, Error> {
        let node = Arc::make_mut(&mut self.nodes)
            .get_mut(id)
            .ok_or(Error::NotFound(*id))?;
        Ok(Arc::make_mut(node))
    }

    /// Runs `f` on comment `id`, copying it first if it is shared
    pub fn update(&mut self, id: &CommentId, f: impl FnOnce(&mut Comment)) -> Result<(), Error> {
        if !self.contains(id) {
            return Err(Error::NotFound(*id));
        }
        f(self.node_mut(id)?);
        self.bump();
        Ok(())
    }

    pub fn set_votes(&mut self, id: &CommentId, votes: Vec<Vote>) -> Result<(), Error> {
        self.update(id, |c| c.votes = votes)
    }

    /// Inserts `c` first among its siblings and counts it in its parent's
    /// replies
    pub fn insert_head(&mut self, c: Comment) -> Result<(), Error> {
        debug_assert!(!self.contains(&c.id), "inserting comment {} twice", c.id);
        let id = c.id;
        match c.parent_id {
            None => Arc::make_mut(&mut self.roots).insert(0, id),
            Some(p) => {
                let parent = self.node_mut(&p)?;
                parent.replies.insert(0, id);
                parent.reply_count += 1;
            }
        }
        Arc::make_mut(&mut self.nodes).insert(id, Arc::new(c));
        self.bump();
        Ok(())
    }

    /// Swaps provisional comment `provisional` for the store's record, at the
    /// same position in its parent's list
    ///
    /// Replies already loaded under the provisional comment move over to the
    /// confirmed one.
    pub fn replace_provisional(
        &mut self,
        provisional: &CommentId,
        c: api::Comment,
    ) -> Result<(), Error> {
        let (parent, carried) = {
            let p = self.get(provisional).ok_or(Error::NotFound(*provisional))?;
            (p.parent_id, p.replies.clone())
        };
        let new_id = c.id;
        if self.contains(&c.id) {
            // Already loaded through another path, drop the duplicate
            self.detach(provisional, parent)?;
            Arc::make_mut(&mut self.nodes).remove(provisional);
        } else {
            let list = match parent {
                None => Arc::make_mut(&mut self.roots),
                Some(p) => &mut self.node_mut(&p)?.replies,
            };
            let pos = list
                .iter()
                .position(|i| i == provisional)
                .ok_or(Error::NotFound(*provisional))?;
            list[pos] = new_id;
            Arc::make_mut(&mut self.nodes).remove(provisional);
            self.add_record_subtree(c);
        }
        self.adopt(&new_id, carried)?;
        self.bump();
        Ok(())
    }

    /// Moves `children` under `parent`, ahead of its current replies
    fn adopt(&mut self, parent: &CommentId, children: Vec<CommentId>) -> Result<(), Error> {
        let mut moved = Vec::with_capacity(children.len());
        for child in children {
            if self.replies(parent).contains(&child) {
                continue;
            }
            self.node_mut(&child)?.parent_id = Some(*parent);
            moved.push(child);
        }
        if moved.is_empty() {
            return Ok(());
        }
        let p = self.node_mut(parent)?;
        moved.append(&mut p.replies);
        p.replies = moved;
        p.reply_count = p.reply_count.max(p.replies.len() as u64);
        Ok(())
    }

    /// Removes `id` and everything below it, uncounting it from its parent
    pub fn remove_subtree(&mut self, id: &CommentId) -> Result<(), Error> {
        let parent = self.get(id).ok_or(Error::NotFound(*id))?.parent_id;
        self.detach(id, parent)?;
        let nodes = Arc::make_mut(&mut self.nodes);
        let mut stack = vec![*id];
        while let Some(i) = stack.pop() {
            if let Some(c) = nodes.remove(&i) {
                stack.extend(c.replies.iter().copied());
            }
        }
        self.bump();
        Ok(())
    }

    fn detach(&mut self, id: &CommentId, parent: Option<CommentId>) -> Result<(), Error> {
        match parent {
            None => Arc::make_mut(&mut self.roots).retain(|i| i != id),
            Some(p) => {
                let p = self.node_mut(&p)?;
                if let Some(pos) = p.replies.iter().position(|i| i == id) {
                    p.replies.remove(pos);
                    p.reply_count = p.reply_count.saturating_sub(1);
                }
            }
        }
        Ok(())
    }

    /// Overwrites an existing comment with the store's record, keeping its
    /// loaded replies
    pub fn splice(&mut self, mut c: api::Comment) -> Result<(), Error> {
        let id = c.id;
        if !self.contains(&id) {
            return Err(Error::NotFound(id));
        }
        let previews = std::mem::take(&mut c.replies);
        self.node_mut(&id)?.splice(c);
        if !previews.is_empty() {
            self.merge_replies(&id, previews)?;
        }
        self.bump();
        Ok(())
    }

    /// Appends the replies of `parent` that are not loaded yet
    pub fn merge_replies(
        &mut self,
        parent: &CommentId,
        records: Vec<api::Comment>,
    ) -> Result<(), Error> {
        if !self.contains(parent) {
            return Err(Error::NotFound(*parent));
        }
        let mut new_ids = Vec::new();
        for r in records {
            if !self.contains(&r.id) {
                new_ids.push(self.add_record_subtree(r));
            }
        }
        let p = self.node_mut(parent)?;
        p.replies.extend(new_ids);
        p.reply_count = p.reply_count.max(p.replies.len() as u64);
        self.bump();
        Ok(())
    }

    /// Puts back a tree cloned earlier, keeping the version increasing
    pub fn restore(&mut self, snapshot: CommentTree) {
        let version = self.version.max(snapshot.version) + 1;
        *self = snapshot;
        self.version = version;
    }

    /// Checks the parent/child links and reply counts
    pub fn check_consistency(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        let mut stack = Vec::new();
        for r in self.roots.iter() {
            let c = self
                .nodes
                .get(r)
                .ok_or_else(|| anyhow!("root {r} is not in the arena"))?;
            ensure!(c.parent_id.is_none(), "root {r} has a parent");
            stack.push(c);
        }
        while let Some(c) = stack.pop() {
            ensure!(seen.insert(c.id), "comment {} is reachable twice", c.id);
            ensure!(
                c.reply_count >= c.replies.len() as u64,
                "comment {} counts {} replies but has {} loaded",
                c.id,
                c.reply_count,
                c.replies.len()
            );
            for r in c.replies.iter() {
                let child = self
                    .nodes
                    .get(r)
                    .ok_or_else(|| anyhow!("reply {r} of {} is not in the arena", c.id))?;
                ensure!(
                    child.parent_id == Some(c.id),
                    "reply {r} is listed under {} but points to {:?}",
                    c.id,
                    child.parent_id
                );
                stack.push(child);
            }
        }
        ensure!(
            seen.len() == self.nodes.len(),
            "{} comments are not reachable from the roots",
            self.nodes.len() - seen.len()
        );
        Ok(())
    }
}
