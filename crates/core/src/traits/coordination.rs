//! 协调存储接口定义
//!
//! 此模块定义了 master 所依赖的外部协调存储（ZooKeeper 风格）的最小契约：
//! - 有序的层级路径命名空间
//! - 节点数据的读写与版本号
//! - 多路径原子事务
//! - 与会话绑定的临时节点
//!
//! ## 失败语义
//!
//! 所有操作都返回 [`StoreResult`]，失败被归类为 [`StoreError`]：
//! 节点缺失、节点已存在、节点非空、版本不匹配、连接丢失以及其他通用失败。
//! master 模型在自身边界处将这些错误转换为领域错误，不会原样向外抛出。
//!
//! ## 事务
//!
//! [`CoordinationStore::transaction`] 要么全部提交，要么全部不生效。
//! 事务失败时返回第一个失败操作对应的错误，调用方据此判断是哪一个前置条件被破坏。

use async_trait::async_trait;
use thiserror::Error;

/// 协调存储错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("节点不存在: {path}")]
    NoNode { path: String },

    #[error("节点已存在: {path}")]
    NodeExists { path: String },

    #[error("节点非空: {path}")]
    NotEmpty { path: String },

    #[error("节点版本不匹配: {path}")]
    BadVersion { path: String },

    #[error("连接丢失: {0}")]
    ConnectionLoss(String),

    #[error("协调存储错误: {0}")]
    Other(String),
}

impl StoreError {
    pub fn no_node<S: Into<String>>(path: S) -> Self {
        Self::NoNode { path: path.into() }
    }

    pub fn node_exists<S: Into<String>>(path: S) -> Self {
        Self::NodeExists { path: path.into() }
    }

    pub fn not_empty<S: Into<String>>(path: S) -> Self {
        Self::NotEmpty { path: path.into() }
    }

    pub fn bad_version<S: Into<String>>(path: S) -> Self {
        Self::BadVersion { path: path.into() }
    }

    pub fn is_no_node(&self) -> bool {
        matches!(self, StoreError::NoNode { .. })
    }

    pub fn is_node_exists(&self) -> bool {
        matches!(self, StoreError::NodeExists { .. })
    }

    pub fn is_not_empty(&self) -> bool {
        matches!(self, StoreError::NotEmpty { .. })
    }

    pub fn is_bad_version(&self) -> bool {
        matches!(self, StoreError::BadVersion { .. })
    }
}

/// 协调存储的Result类型
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// 节点元数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// 数据版本，每次 set_data 递增，创建时为 0
    pub version: i32,
    /// 子节点数量
    pub num_children: usize,
    /// 是否为临时节点
    pub ephemeral: bool,
}

/// 节点数据与元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub bytes: Vec<u8>,
    pub stat: Stat,
}

/// 节点创建模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreateMode {
    #[default]
    Persistent,
    /// 随创建者会话结束而删除
    Ephemeral,
}

/// 事务中的单个操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// 断言节点存在；给定版本时同时断言版本一致
    Check { path: String, version: Option<i32> },
    Create { path: String, data: Vec<u8> },
    Delete { path: String },
    /// 给定版本时为条件写
    SetData {
        path: String,
        data: Vec<u8>,
        version: Option<i32>,
    },
}

impl Op {
    pub fn check<S: Into<String>>(path: S) -> Self {
        Op::Check {
            path: path.into(),
            version: None,
        }
    }

    pub fn check_version<S: Into<String>>(path: S, version: i32) -> Self {
        Op::Check {
            path: path.into(),
            version: Some(version),
        }
    }

    pub fn create<S: Into<String>>(path: S, data: Vec<u8>) -> Self {
        Op::Create {
            path: path.into(),
            data,
        }
    }

    /// 创建无数据节点
    pub fn create_empty<S: Into<String>>(path: S) -> Self {
        Op::Create {
            path: path.into(),
            data: Vec::new(),
        }
    }

    pub fn delete<S: Into<String>>(path: S) -> Self {
        Op::Delete { path: path.into() }
    }

    pub fn set<S: Into<String>>(path: S, data: Vec<u8>) -> Self {
        Op::SetData {
            path: path.into(),
            data,
            version: None,
        }
    }

    pub fn set_versioned<S: Into<String>>(path: S, data: Vec<u8>, version: i32) -> Self {
        Op::SetData {
            path: path.into(),
            data,
            version: Some(version),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Op::Check { path, .. }
            | Op::Create { path, .. }
            | Op::Delete { path }
            | Op::SetData { path, .. } => path,
        }
    }
}

/// 协调存储客户端接口
///
/// 客户端句柄是进程内共享的依赖，由调用方显式创建与关闭，
/// 以便测试替换为内存实现。实现必须是 `Send + Sync`。
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// 幂等地创建路径上所有缺失的节点（mkdir -p）
    ///
    /// `exclude_last` 为 true 时只创建父节点。
    async fn ensure_path(&self, path: &str, exclude_last: bool) -> StoreResult<()>;

    async fn get_data(&self, path: &str) -> StoreResult<Vec<u8>>;

    /// 读取数据及其元数据
    async fn get_node(&self, path: &str) -> StoreResult<Node>;

    /// 无条件覆盖节点数据
    async fn set_data(&self, path: &str, data: Vec<u8>) -> StoreResult<()>;

    /// 列出直接子节点名称，按名称排序
    async fn get_children(&self, path: &str) -> StoreResult<Vec<String>>;

    /// 节点不存在时返回 `None`
    async fn stat(&self, path: &str) -> StoreResult<Option<Stat>>;

    async fn delete(&self, path: &str) -> StoreResult<()>;

    async fn create_with_mode(&self, path: &str, data: Vec<u8>, mode: CreateMode)
        -> StoreResult<()>;

    /// 原子地执行一组操作
    async fn transaction(&self, ops: Vec<Op>) -> StoreResult<()>;

    /// 关闭会话，释放该会话创建的全部临时节点
    async fn close(&self) -> StoreResult<()>;

    /// 广度优先列出 `path` 及其全部后代的完整路径，父节点总在子节点之前
    async fn list_recursive(&self, path: &str) -> StoreResult<Vec<String>> {
        let mut tree = vec![path.to_string()];
        let mut cursor = 0;
        while cursor < tree.len() {
            let parent = tree[cursor].clone();
            for child in self.get_children(&parent).await? {
                tree.push(join_path(&parent, &child));
            }
            cursor += 1;
        }
        Ok(tree)
    }
}

/// 拼接父路径与子节点名
pub fn join_path(parent: &str, child: &str) -> String {
    if parent == "/" {
        format!("/{child}")
    } else {
        format!("{parent}/{child}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/", "config"), "/config");
        assert_eq!(join_path("/config", "agents"), "/config/agents");
    }

    #[test]
    fn test_op_path() {
        assert_eq!(Op::check("/a").path(), "/a");
        assert_eq!(Op::create_empty("/b").path(), "/b");
        assert_eq!(Op::delete("/c").path(), "/c");
        assert_eq!(Op::set_versioned("/d", vec![], 2).path(), "/d");
    }

    #[test]
    fn test_store_error_predicates() {
        assert!(StoreError::no_node("/x").is_no_node());
        assert!(StoreError::node_exists("/x").is_node_exists());
        assert!(StoreError::not_empty("/x").is_not_empty());
        assert!(StoreError::bad_version("/x").is_bad_version());
        assert!(!StoreError::ConnectionLoss("gone".into()).is_no_node());
        assert_eq!(StoreError::no_node("/x").to_string(), "节点不存在: /x");
    }
}
