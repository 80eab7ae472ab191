use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{FleetError, FleetResult};

/// Job标识：名称、版本与内容哈希
///
/// 字符串形式为 `name:version:hash`，短形式 `name:version` 用作短别名键。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId {
    name: String,
    version: String,
    hash: Option<String>,
}

impl JobId {
    pub fn new<N: Into<String>, V: Into<String>, H: Into<String>>(
        name: N,
        version: V,
        hash: H,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            hash: Some(hash.into()),
        }
    }

    /// 不带哈希的标识，仅用于短别名
    pub fn without_hash<N: Into<String>, V: Into<String>>(name: N, version: V) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            hash: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    /// `name:version`
    pub fn to_short_string(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hash {
            Some(hash) => write!(f, "{}:{}:{}", self.name, self.version, hash),
            None => write!(f, "{}:{}", self.name, self.version),
        }
    }
}

impl FromStr for JobId {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let non_empty = parts.iter().all(|p| !p.is_empty());
        match parts.as_slice() {
            [name, version] if non_empty => Ok(Self::without_hash(*name, *version)),
            [name, version, hash] if non_empty => Ok(Self::new(*name, *version, *hash)),
            _ => Err(FleetError::InvalidJobId(s.to_string())),
        }
    }
}

impl TryFrom<String> for JobId {
    type Error = FleetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.to_string()
    }
}

/// 端口映射
///
/// `external_port` 存在即表示静态端口，部署时在目标 agent 上独占。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub internal_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_port: Option<u16>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    PortMapping::TCP.to_string()
}

impl PortMapping {
    pub const TCP: &'static str = "tcp";
    pub const UDP: &'static str = "udp";

    /// 动态端口，由 agent 分配外部端口
    pub fn dynamic(internal_port: u16) -> Self {
        Self {
            internal_port,
            external_port: None,
            protocol: default_protocol(),
        }
    }

    /// 静态端口
    pub fn fixed(internal_port: u16, external_port: u16) -> Self {
        Self {
            internal_port,
            external_port: Some(external_port),
            protocol: default_protocol(),
        }
    }

    pub fn with_protocol<S: Into<String>>(mut self, protocol: S) -> Self {
        self.protocol = protocol.into();
        self
    }
}

/// 容器内可执行健康检查的端点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub port_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_path: Option<String>,
    #[serde(default = "default_health_check_timeout")]
    pub timeout: u32,
}

fn default_health_check_timeout() -> u32 {
    HealthCheck::DEFAULT_TIMEOUT_SECONDS
}

impl HealthCheck {
    pub const DEFAULT_TIMEOUT_SECONDS: u32 = 120;

    pub fn new<P: Into<String>, U: Into<String>>(port_name: P, url_path: U) -> Self {
        Self {
            port_name: port_name.into(),
            url_path: Some(url_path.into()),
            timeout: Self::DEFAULT_TIMEOUT_SECONDS,
        }
    }

    pub fn with_timeout(mut self, timeout: u32) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Job定义
///
/// 创建后不可变；"修改" job 即注册一个新的 [`JobId`]。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub ports: BTreeMap<String, PortMapping>,
    /// 容器路径 -> 宿主机路径
    #[serde(default)]
    pub volumes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
}

impl Job {
    pub fn builder<N: Into<String>, V: Into<String>, I: Into<String>>(
        name: N,
        version: V,
        image: I,
    ) -> JobBuilder {
        JobBuilder::new(name, version, image)
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// 该 job 独占的静态外部端口，同一端口的多个协议只占用一次
    pub fn static_ports(&self) -> BTreeSet<u16> {
        self.ports
            .values()
            .filter_map(|mapping| mapping.external_port)
            .collect()
    }
}

/// 构建 [`Job`] 并根据内容计算 id 哈希
#[derive(Debug, Clone)]
pub struct JobBuilder {
    name: String,
    version: String,
    image: String,
    command: Vec<String>,
    env: BTreeMap<String, String>,
    ports: BTreeMap<String, PortMapping>,
    volumes: BTreeMap<String, String>,
    health_check: Option<HealthCheck>,
}

/// 参与哈希计算的内容，不含 id 本身
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JobContent<'a> {
    name: &'a str,
    version: &'a str,
    image: &'a str,
    command: &'a [String],
    env: &'a BTreeMap<String, String>,
    ports: &'a BTreeMap<String, PortMapping>,
    volumes: &'a BTreeMap<String, String>,
    health_check: &'a Option<HealthCheck>,
}

impl JobBuilder {
    pub fn new<N: Into<String>, V: Into<String>, I: Into<String>>(
        name: N,
        version: V,
        image: I,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            image: image.into(),
            command: Vec::new(),
            env: BTreeMap::new(),
            ports: BTreeMap::new(),
            volumes: BTreeMap::new(),
            health_check: None,
        }
    }

    pub fn command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn port<S: Into<String>>(mut self, name: S, mapping: PortMapping) -> Self {
        self.ports.insert(name.into(), mapping);
        self
    }

    pub fn volume<C: Into<String>, H: Into<String>>(mut self, container: C, host: H) -> Self {
        self.volumes.insert(container.into(), host.into());
        self
    }

    pub fn health_check(mut self, health_check: HealthCheck) -> Self {
        self.health_check = Some(health_check);
        self
    }

    pub fn build(self) -> FleetResult<Job> {
        if self.name.is_empty() || self.name.contains(':') {
            return Err(FleetError::InvalidJobId(format!("无效的job名称: {}", self.name)));
        }
        if self.version.is_empty() || self.version.contains(':') {
            return Err(FleetError::InvalidJobId(format!(
                "无效的job版本: {}",
                self.version
            )));
        }

        let content = JobContent {
            name: &self.name,
            version: &self.version,
            image: &self.image,
            command: &self.command,
            env: &self.env,
            ports: &self.ports,
            volumes: &self.volumes,
            health_check: &self.health_check,
        };
        let canonical = serde_json::to_vec(&content)
            .map_err(|e| FleetError::serialization(format!("计算job哈希失败: {e}")))?;
        let hash = hex::encode(Sha256::digest(&canonical));

        Ok(Job {
            id: JobId::new(self.name, self.version, hash),
            image: self.image,
            command: self.command,
            env: self.env,
            ports: self.ports,
            volumes: self.volumes,
            health_check: self.health_check,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_parse_and_display() {
        let id: JobId = "web:1.0:abc123".parse().unwrap();
        assert_eq!(id.name(), "web");
        assert_eq!(id.version(), "1.0");
        assert_eq!(id.hash(), Some("abc123"));
        assert_eq!(id.to_string(), "web:1.0:abc123");
        assert_eq!(id.to_short_string(), "web:1.0");

        let short: JobId = "web:1.0".parse().unwrap();
        assert_eq!(short.hash(), None);
        assert_eq!(short.to_string(), "web:1.0");
    }

    #[test]
    fn test_job_id_rejects_malformed() {
        assert!("web".parse::<JobId>().is_err());
        assert!("web::abc".parse::<JobId>().is_err());
        assert!("a:b:c:d".parse::<JobId>().is_err());
    }

    #[test]
    fn test_job_id_serializes_as_string() {
        let id = JobId::new("web", "1.0", "abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"web:1.0:abc\"");
        let back: JobId = serde_json::from_str("\"web:1.0:abc\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_hash_depends_on_content() {
        let a = Job::builder("web", "1", "nginx:1.25").build().unwrap();
        let b = Job::builder("web", "1", "nginx:1.25").build().unwrap();
        let c = Job::builder("web", "1", "nginx:1.26").build().unwrap();
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.id.hash().map(str::len), Some(64));
    }

    #[test]
    fn test_static_ports() {
        let job = Job::builder("web", "1", "nginx")
            .port("http", PortMapping::fixed(80, 8080))
            .port("admin", PortMapping::dynamic(8081))
            .build()
            .unwrap();
        assert_eq!(job.static_ports(), BTreeSet::from([8080]));
    }

    #[test]
    fn test_static_ports_dedup_across_protocols() {
        let job = Job::builder("dns", "1", "coredns")
            .port("dns-tcp", PortMapping::fixed(53, 53))
            .port("dns-udp", PortMapping::fixed(53, 53).with_protocol("udp"))
            .port("metrics", PortMapping::fixed(9153, 9153))
            .build()
            .unwrap();
        assert_eq!(job.static_ports(), BTreeSet::from([53, 9153]));
    }

    #[test]
    fn test_missing_optional_fields_decode() {
        let json = r#"{"id":"web:1:abc","image":"nginx","ports":{"http":{"internalPort":80}}}"#;
        let job: Job = serde_json::from_str(json).unwrap();
        assert!(job.command.is_empty());
        assert!(job.health_check.is_none());
        assert_eq!(job.ports["http"].protocol, "tcp");
        assert_eq!(job.ports["http"].external_port, None);
    }

    #[test]
    fn test_health_check_default_timeout() {
        let json = r#"{"portName":"http-admin","urlPath":"/healthcheck"}"#;
        let check: HealthCheck = serde_json::from_str(json).unwrap();
        assert_eq!(check.timeout, HealthCheck::DEFAULT_TIMEOUT_SECONDS);
    }

    #[test]
    fn test_invalid_name_rejected() {
        assert!(Job::builder("we:b", "1", "nginx").build().is_err());
        assert!(Job::builder("web", "", "nginx").build().is_err());
    }
}
