use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::unknown_fields::UnknownFields;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheControl {
    Ephemeral {
        #[serde(default)]
        ttl: Option<CacheControlTtl>,
        #[serde(flatten)]
        unknown_fields: UnknownFields,
    },
    #[serde(untagged)]
    Unknown(Value),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheControlTtl {
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(untagged)]
    Unknown(String),
}

impl CacheControl {
    pub fn ephemeral(ttl: Option<CacheControlTtl>) -> Self {
        Self::Ephemeral {
            ttl,
            unknown_fields: UnknownFields::default(),
        }
    }
}

impl From<crate::ir::CacheControl> for CacheControl {
    fn from(value: crate::ir::CacheControl) -> Self {
        let ttl = match value.ttl {
            crate::ir::CacheControlTtl::FiveMinutes => CacheControlTtl::FiveMinutes,
            crate::ir::CacheControlTtl::OneHour => CacheControlTtl::OneHour,
        };
        Self::ephemeral(Some(ttl))
    }
}

impl From<CacheControl> for Option<crate::ir::CacheControl> {
    fn from(value: CacheControl) -> Self {
        match value {
            CacheControl::Ephemeral { ttl, .. } => Some(crate::ir::CacheControl {
                ttl: match ttl {
                    Some(CacheControlTtl::OneHour) => crate::ir::CacheControlTtl::OneHour,
                    _ => crate::ir::CacheControlTtl::FiveMinutes,
                },
            }),
            CacheControl::Unknown(_) => None,
        }
    }
}
