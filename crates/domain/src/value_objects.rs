//! 调度相关的枚举值
//!
//! 所有枚举在线路与配置中都以大写下划线形式出现（如 `SHARDING_BROADCAST`）。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use taskmesh_core::SchedulerError;

macro_rules! tagged_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => ($tag:literal, $title:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $tag)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $tag),+
                }
            }

            pub fn title(&self) -> &'static str {
                match self {
                    $($name::$variant => $title),+
                }
            }
        }

        impl FromStr for $name {
            type Err = SchedulerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($tag => Ok($name::$variant),)+
                    other => Err(SchedulerError::Validation(format!(
                        "未知的{}: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

tagged_enum! {
    /// 执行器路由策略
    pub enum RouteStrategy {
        First => ("FIRST", "第一个"),
        Last => ("LAST", "最后一个"),
        Round => ("ROUND", "轮询"),
        Random => ("RANDOM", "随机"),
        ConsistentHash => ("CONSISTENT_HASH", "一致性HASH"),
        LeastFrequentlyUsed => ("LEAST_FREQUENTLY_USED", "最不经常使用"),
        LeastRecentlyUsed => ("LEAST_RECENTLY_USED", "最近最久未使用"),
        Failover => ("FAILOVER", "故障转移"),
        Busyover => ("BUSYOVER", "忙碌转移"),
        ShardingBroadcast => ("SHARDING_BROADCAST", "分片广播"),
    }
}

tagged_enum! {
    /// 阻塞处理策略，任务已有运行中的实例时生效
    pub enum BlockStrategy {
        SerialExecution => ("SERIAL_EXECUTION", "单机串行"),
        DiscardLater => ("DISCARD_LATER", "丢弃后续调度"),
        CoverEarly => ("COVER_EARLY", "覆盖之前调度"),
    }
}

impl Default for BlockStrategy {
    fn default() -> Self {
        BlockStrategy::SerialExecution
    }
}

tagged_enum! {
    pub enum GlueType {
        Bean => ("BEAN", "BEAN"),
        GlueGroovy => ("GLUE_GROOVY", "GLUE(Java)"),
        GlueShell => ("GLUE_SHELL", "GLUE(Shell)"),
        GluePython => ("GLUE_PYTHON", "GLUE(Python)"),
        GluePhp => ("GLUE_PHP", "GLUE(PHP)"),
        GlueNodejs => ("GLUE_NODEJS", "GLUE(Nodejs)"),
        GluePowershell => ("GLUE_POWERSHELL", "GLUE(PowerShell)"),
    }
}

impl Default for GlueType {
    fn default() -> Self {
        GlueType::Bean
    }
}

impl GlueType {
    /// 以子进程方式运行的脚本类型
    pub fn is_script(&self) -> bool {
        self.script_command().is_some()
    }

    pub fn script_command(&self) -> Option<&'static str> {
        match self {
            GlueType::GlueShell => Some("bash"),
            GlueType::GluePython => Some("python"),
            GlueType::GluePhp => Some("php"),
            GlueType::GlueNodejs => Some("node"),
            GlueType::GluePowershell => Some("powershell"),
            GlueType::Bean | GlueType::GlueGroovy => None,
        }
    }

    pub fn script_suffix(&self) -> Option<&'static str> {
        match self {
            GlueType::GlueShell => Some(".sh"),
            GlueType::GluePython => Some(".py"),
            GlueType::GluePhp => Some(".php"),
            GlueType::GlueNodejs => Some(".js"),
            GlueType::GluePowershell => Some(".ps1"),
            GlueType::Bean | GlueType::GlueGroovy => None,
        }
    }
}

tagged_enum! {
    pub enum TriggerType {
        Manual => ("MANUAL", "手动触发"),
        Cron => ("CRON", "Cron触发"),
        Retry => ("RETRY", "失败重试触发"),
        Parent => ("PARENT", "父任务触发"),
        Api => ("API", "API触发"),
        Misfire => ("MISFIRE", "调度过期补偿"),
    }
}

tagged_enum! {
    /// 执行器地址来源
    pub enum AddressType {
        Auto => ("AUTO", "自动注册"),
        Manual => ("MANUAL", "手动录入"),
    }
}

impl Default for AddressType {
    fn default() -> Self {
        AddressType::Auto
    }
}

tagged_enum! {
    pub enum ScheduleType {
        None => ("NONE", "无"),
        Cron => ("CRON", "CRON"),
        FixRate => ("FIX_RATE", "固定速度"),
    }
}

impl Default for ScheduleType {
    fn default() -> Self {
        ScheduleType::None
    }
}

tagged_enum! {
    /// 调度过期策略
    pub enum MisfireStrategy {
        DoNothing => ("DO_NOTHING", "忽略"),
        FireOnceNow => ("FIRE_ONCE_NOW", "立即执行一次"),
    }
}

impl Default for MisfireStrategy {
    fn default() -> Self {
        MisfireStrategy::DoNothing
    }
}

tagged_enum! {
    pub enum RegistryType {
        Executor => ("EXECUTOR", "执行器"),
        Admin => ("ADMIN", "调度中心"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_strategy_tags() {
        assert_eq!(
            "SHARDING_BROADCAST".parse::<RouteStrategy>().unwrap(),
            RouteStrategy::ShardingBroadcast
        );
        assert_eq!(RouteStrategy::ConsistentHash.as_str(), "CONSISTENT_HASH");
        assert_eq!(RouteStrategy::ALL.len(), 10);
        assert!("UNKNOWN".parse::<RouteStrategy>().is_err());
    }

    #[test]
    fn test_serde_uses_tags() {
        let json = serde_json::to_string(&BlockStrategy::DiscardLater).unwrap();
        assert_eq!(json, "\"DISCARD_LATER\"");

        let parsed: GlueType = serde_json::from_str("\"GLUE_SHELL\"").unwrap();
        assert_eq!(parsed, GlueType::GlueShell);
    }

    #[test]
    fn test_glue_type_script_info() {
        assert!(GlueType::GluePython.is_script());
        assert_eq!(GlueType::GlueShell.script_suffix(), Some(".sh"));
        assert!(!GlueType::Bean.is_script());
        assert!(!GlueType::GlueGroovy.is_script());
    }
}
