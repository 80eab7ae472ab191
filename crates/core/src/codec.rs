//! 实体与存储字节之间的编解码

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{FleetError, FleetResult};

/// 可存放在协调存储节点上的描述符
pub trait Descriptor: Serialize + DeserializeOwned {
    fn to_json_bytes(&self) -> FleetResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            FleetError::serialization(format!(
                "序列化 {} 失败: {e}",
                std::any::type_name::<Self>()
            ))
        })
    }

    fn parse(bytes: &[u8]) -> FleetResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            FleetError::serialization(format!(
                "解析 {} 失败: {e}",
                std::any::type_name::<Self>()
            ))
        })
    }
}

impl<T> Descriptor for T where T: Serialize + DeserializeOwned {}
