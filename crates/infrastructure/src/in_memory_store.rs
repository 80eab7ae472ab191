use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use fleet_core::traits::{
    join_path, CoordinationStore, CreateMode, Node, Op, Stat, StoreError, StoreResult,
};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// 内存协调存储实现
///
/// 在进程内模拟 ZooKeeper 的层级命名空间：节点版本号、按会话归属的临时节点、
/// 以及全有或全无的多操作事务。适用于嵌入式部署与测试场景。
///
/// 同一棵树可以被多个会话句柄共享，通过 [`InMemoryCoordinationStore::session`]
/// 创建新的会话。关闭某个句柄只删除该会话创建的临时节点。
#[derive(Debug)]
pub struct InMemoryCoordinationStore {
    /// 所有会话共享的节点树
    tree: Arc<RwLock<Tree>>,
    /// 会话编号分配器
    session_ids: Arc<AtomicU64>,
    session_id: u64,
    closed: AtomicBool,
}

#[derive(Debug, Clone)]
struct ZNode {
    data: Vec<u8>,
    version: i32,
    /// 临时节点所属会话
    owner: Option<u64>,
    children: BTreeSet<String>,
}

impl ZNode {
    fn new(data: Vec<u8>, owner: Option<u64>) -> Self {
        Self {
            data,
            version: 0,
            owner,
            children: BTreeSet::new(),
        }
    }

    fn stat(&self) -> Stat {
        Stat {
            version: self.version,
            num_children: self.children.len(),
            ephemeral: self.owner.is_some(),
        }
    }
}

#[derive(Debug)]
struct Tree {
    nodes: BTreeMap<String, ZNode>,
}

impl Tree {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), ZNode::new(Vec::new(), None));
        Self { nodes }
    }

    fn node(&self, path: &str) -> StoreResult<&ZNode> {
        self.nodes
            .get(path)
            .ok_or_else(|| StoreError::no_node(path))
    }

    fn create(&mut self, path: &str, data: Vec<u8>, owner: Option<u64>) -> StoreResult<()> {
        let (parent, name) = split_path(path)?;
        if self.nodes.contains_key(path) {
            return Err(StoreError::node_exists(path));
        }
        let parent_node = self
            .nodes
            .get_mut(parent)
            .ok_or_else(|| StoreError::no_node(path))?;
        if parent_node.owner.is_some() {
            return Err(StoreError::Other(format!("临时节点不能拥有子节点: {parent}")));
        }
        parent_node.children.insert(name.to_string());
        self.nodes.insert(path.to_string(), ZNode::new(data, owner));
        Ok(())
    }

    fn delete(&mut self, path: &str) -> StoreResult<()> {
        let (parent, name) = split_path(path)?;
        let node = self.node(path)?;
        if !node.children.is_empty() {
            return Err(StoreError::not_empty(path));
        }
        self.nodes.remove(path);
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.remove(name);
        }
        Ok(())
    }

    fn set_data(&mut self, path: &str, data: Vec<u8>, version: Option<i32>) -> StoreResult<()> {
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| StoreError::no_node(path))?;
        if let Some(expected) = version {
            if node.version != expected {
                return Err(StoreError::bad_version(path));
            }
        }
        node.data = data;
        node.version += 1;
        Ok(())
    }

    fn check(&self, path: &str, version: Option<i32>) -> StoreResult<()> {
        let node = self.node(path)?;
        match version {
            Some(expected) if node.version != expected => Err(StoreError::bad_version(path)),
            _ => Ok(()),
        }
    }

    /// 在树上直接执行一个操作，并记录撤销该操作所需的信息
    fn apply(&mut self, op: Op, undo: &mut Vec<Undo>) -> StoreResult<()> {
        match op {
            Op::Check { path, version } => self.check(&path, version),
            Op::Create { path, data } => {
                self.create(&path, data, None)?;
                undo.push(Undo::Remove(path));
                Ok(())
            }
            Op::Delete { path } => {
                let node = self.node(&path)?.clone();
                self.delete(&path)?;
                undo.push(Undo::Restore(path, node));
                Ok(())
            }
            Op::SetData {
                path,
                data,
                version,
            } => {
                let node = self.node(&path)?;
                let (old_data, old_version) = (node.data.clone(), node.version);
                self.set_data(&path, data, version)?;
                undo.push(Undo::Reset {
                    path,
                    data: old_data,
                    version: old_version,
                });
                Ok(())
            }
        }
    }

    /// 按逆序撤销已执行的操作
    fn rollback(&mut self, undo: Vec<Undo>) {
        for entry in undo.into_iter().rev() {
            match entry {
                Undo::Remove(path) => {
                    self.nodes.remove(&path);
                    if let Ok((parent, name)) = split_path(&path) {
                        if let Some(parent_node) = self.nodes.get_mut(parent) {
                            parent_node.children.remove(name);
                        }
                    }
                }
                Undo::Restore(path, node) => {
                    if let Ok((parent, name)) = split_path(&path) {
                        if let Some(parent_node) = self.nodes.get_mut(parent) {
                            parent_node.children.insert(name.to_string());
                        }
                    }
                    self.nodes.insert(path, node);
                }
                Undo::Reset {
                    path,
                    data,
                    version,
                } => {
                    if let Some(node) = self.nodes.get_mut(&path) {
                        node.data = data;
                        node.version = version;
                    }
                }
            }
        }
    }

    /// 删除会话拥有的全部临时节点，返回删除数量
    fn expire_session(&mut self, session_id: u64) -> usize {
        let owned: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.owner == Some(session_id))
            .map(|(path, _)| path.clone())
            .collect();
        for path in &owned {
            // 临时节点没有子节点，删除不会失败
            let _ = self.delete(path);
        }
        owned.len()
    }
}

/// 事务内单个操作的逆操作
#[derive(Debug)]
enum Undo {
    /// 撤销创建
    Remove(String),
    /// 撤销删除，恢复原节点
    Restore(String, ZNode),
    /// 撤销写入
    Reset {
        path: String,
        data: Vec<u8>,
        version: i32,
    },
}

/// 拆分为 (父路径, 节点名)，同时校验路径格式
fn split_path(path: &str) -> StoreResult<(&str, &str)> {
    validate_path(path)?;
    if path == "/" {
        return Err(StoreError::Other("不能操作根节点".to_string()));
    }
    let idx = path.rfind('/').unwrap_or(0);
    let parent = if idx == 0 { "/" } else { &path[..idx] };
    Ok((parent, &path[idx + 1..]))
}

fn validate_path(path: &str) -> StoreResult<()> {
    if path == "/" {
        return Ok(());
    }
    if !path.starts_with('/') || path.ends_with('/') || path.contains("//") {
        return Err(StoreError::Other(format!("无效路径: {path}")));
    }
    Ok(())
}

impl InMemoryCoordinationStore {
    /// 创建一棵新的空树及其第一个会话
    pub fn new() -> Self {
        let session_ids = Arc::new(AtomicU64::new(1));
        let session_id = session_ids.fetch_add(1, Ordering::SeqCst);
        Self {
            tree: Arc::new(RwLock::new(Tree::new())),
            session_ids,
            session_id,
            closed: AtomicBool::new(false),
        }
    }

    /// 在同一棵树上打开一个新会话
    pub fn session(&self) -> Self {
        let session_id = self.session_ids.fetch_add(1, Ordering::SeqCst);
        debug!("Opened in-memory coordination session {}", session_id);
        Self {
            tree: Arc::clone(&self.tree),
            session_ids: Arc::clone(&self.session_ids),
            session_id,
            closed: AtomicBool::new(false),
        }
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 模拟会话过期：删除临时节点，但句柄仍可继续使用
    pub async fn expire(&self) -> usize {
        let removed = self.tree.write().await.expire_session(self.session_id);
        info!(
            "Expired coordination session {}, removed {} ephemeral nodes",
            self.session_id, removed
        );
        removed
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            return Err(StoreError::ConnectionLoss(format!(
                "会话 {} 已关闭",
                self.session_id
            )));
        }
        Ok(())
    }
}

impl Default for InMemoryCoordinationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoordinationStore for InMemoryCoordinationStore {
    async fn ensure_path(&self, path: &str, exclude_last: bool) -> StoreResult<()> {
        self.ensure_open()?;
        validate_path(path)?;

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let depth = if exclude_last {
            segments.len().saturating_sub(1)
        } else {
            segments.len()
        };

        let mut tree = self.tree.write().await;
        let mut current = "/".to_string();
        for segment in &segments[..depth] {
            current = join_path(&current, segment);
            match tree.create(&current, Vec::new(), None) {
                Ok(()) | Err(StoreError::NodeExists { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn get_data(&self, path: &str) -> StoreResult<Vec<u8>> {
        self.ensure_open()?;
        let tree = self.tree.read().await;
        Ok(tree.node(path)?.data.clone())
    }

    async fn get_node(&self, path: &str) -> StoreResult<Node> {
        self.ensure_open()?;
        let tree = self.tree.read().await;
        let node = tree.node(path)?;
        Ok(Node {
            bytes: node.data.clone(),
            stat: node.stat(),
        })
    }

    async fn set_data(&self, path: &str, data: Vec<u8>) -> StoreResult<()> {
        self.ensure_open()?;
        self.tree.write().await.set_data(path, data, None)
    }

    async fn get_children(&self, path: &str) -> StoreResult<Vec<String>> {
        self.ensure_open()?;
        let tree = self.tree.read().await;
        Ok(tree.node(path)?.children.iter().cloned().collect())
    }

    async fn stat(&self, path: &str) -> StoreResult<Option<Stat>> {
        self.ensure_open()?;
        let tree = self.tree.read().await;
        Ok(tree.nodes.get(path).map(ZNode::stat))
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        self.ensure_open()?;
        self.tree.write().await.delete(path)
    }

    async fn create_with_mode(
        &self,
        path: &str,
        data: Vec<u8>,
        mode: CreateMode,
    ) -> StoreResult<()> {
        self.ensure_open()?;
        let owner = match mode {
            CreateMode::Persistent => None,
            CreateMode::Ephemeral => Some(self.session_id),
        };
        self.tree.write().await.create(path, data, owner)
    }

    async fn transaction(&self, ops: Vec<Op>) -> StoreResult<()> {
        self.ensure_open()?;
        let op_count = ops.len();

        // 持有写锁直到提交或回滚完成
        let mut tree = self.tree.write().await;
        let mut undo = Vec::with_capacity(op_count);
        for op in ops {
            let path = op.path().to_string();
            if let Err(e) = tree.apply(op, &mut undo) {
                debug!("Transaction aborted at {}: {}", path, e);
                tree.rollback(undo);
                return Err(e);
            }
        }

        debug!("Committed transaction with {} operations", op_count);
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let removed = self.tree.write().await.expire_session(self.session_id);
        info!(
            "Closed coordination session {}, removed {} ephemeral nodes",
            self.session_id, removed
        );
        Ok(())
    }
}
